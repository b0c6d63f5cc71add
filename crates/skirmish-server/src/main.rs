use std::time::Duration;

use skirmish_server::config::ServerConfig;
use skirmish_server::{build_app, init_tracing, spawn_tick_loop};

#[tokio::main]
async fn main() {
    init_tracing();
    tracing::info!("Skirmish server starting");

    let config = ServerConfig::load();
    config.validate();
    let addr = config.listen_addr.clone();
    let tick = Duration::from_millis(config.tick_interval_ms);

    let (app, state) = build_app(config);
    let ticker = spawn_tick_loop(std::sync::Arc::clone(&state.orchestrator), tick);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(error) => {
            tracing::error!(%addr, %error, "failed to bind");
            std::process::exit(1);
        },
    };
    tracing::info!(%addr, "listening");

    let serve = axum::serve(listener, app).with_graceful_shutdown(async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "failed to listen for shutdown signal");
        }
    });
    if let Err(error) = serve.await {
        tracing::error!(%error, "server error");
    }

    ticker.abort();
    let orchestrator = state.orchestrator;
    match tokio::task::spawn_blocking(move || orchestrator.shutdown()).await {
        Ok(retired) => tracing::info!(instances = retired, "Shutdown complete"),
        Err(error) => tracing::error!(%error, "shutdown failed"),
    }
}
