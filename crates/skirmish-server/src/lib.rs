pub mod api;
pub mod auth;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod factory;
pub mod health;
pub mod orchestrator;
pub mod priority;
pub mod registry;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::middleware;
use axum::routing::{delete, get, post, put};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use config::ServerConfig;
use orchestrator::Orchestrator;
use state::AppState;

/// Build the Axum router and application state from a config.
pub fn build_app(config: ServerConfig) -> (Router<()>, AppState) {
    let state = AppState::new(config);

    // Admin routes (behind bearer auth middleware)
    let admin_routes = Router::new()
        .route("/instances/{name}/start", post(api::start_instance))
        .route("/instances/{name}/stop", post(api::stop_instance))
        .route("/instances/{name}/bounds", put(api::set_bounds))
        .route("/players/{player}/tier", put(api::set_tier))
        .route("/templates", get(api::list_templates).post(api::put_template))
        .route("/templates/{name}", delete(api::delete_template))
        .route("/templates/{name}/instances", post(api::create_instance))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            bearer_auth_layer,
        ));

    let player_routes = Router::new()
        .route("/instances", get(api::list_instances))
        .route("/instances/{name}", get(api::get_instance))
        .route("/join", post(api::join))
        .route("/spectate", post(api::spectate))
        .route("/leave", post(api::leave))
        .route("/eliminate", post(api::eliminate));

    let app = Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .nest("/api/v1", player_routes.merge(admin_routes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state.clone());

    (app, state)
}

/// Background task advancing every instance by one lifecycle second per
/// `period`. Ticks run on the blocking pool since recycling provisions
/// play-spaces.
pub fn spawn_tick_loop(
    orchestrator: Arc<Orchestrator>,
    period: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            let orchestrator = Arc::clone(&orchestrator);
            if let Err(e) = tokio::task::spawn_blocking(move || orchestrator.tick()).await {
                tracing::error!(error = %e, "Lifecycle tick failed");
            }
        }
    })
}

/// Install the global subscriber. `LOG_FORMAT=json` selects JSON lines,
/// anything else compact text. Filtering follows `RUST_LOG` (default `info`).
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

/// Middleware wrapper that injects AuthConfig into request extensions for the
/// bearer auth middleware.
async fn bearer_auth_layer(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut request: axum::extract::Request,
    next: middleware::Next,
) -> Result<axum::response::Response, axum::http::StatusCode> {
    request.extensions_mut().insert(state.auth.clone());
    auth::bearer_auth_middleware(request.headers().clone(), request, next).await
}
