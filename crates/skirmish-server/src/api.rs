use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};

use skirmish_core::instance::{InstanceId, InstanceSnapshot};
use skirmish_core::player::{PlayerId, PriorityTier};
use skirmish_core::template::Template;

use crate::error::AppError;
use crate::orchestrator::Orchestrator;
use crate::state::AppState;

/// Run an orchestrator call that may provision play-spaces off the async runtime.
async fn blocking<T, F>(state: &AppState, f: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce(&Orchestrator) -> T + Send + 'static,
{
    let orchestrator = Arc::clone(&state.orchestrator);
    tokio::task::spawn_blocking(move || f(&orchestrator))
        .await
        .map_err(|e| AppError::Unavailable(format!("orchestrator task failed: {e}")))
}

fn resolve(state: &AppState, name: &str) -> Result<InstanceSnapshot, AppError> {
    state
        .orchestrator
        .instance_by_name(name)
        .ok_or_else(|| AppError::NotFound(format!("instance not found: {name}")))
}

/// GET /api/v1/instances — every instance, refilling an empty lobby pool first.
pub async fn list_instances(
    State(state): State<AppState>,
) -> Result<Json<Vec<InstanceSnapshot>>, AppError> {
    blocking(&state, |o| o.ensure_lobby_pool_non_empty()).await?;
    Ok(Json(state.orchestrator.snapshot()))
}

/// GET /api/v1/instances/:name
pub async fn get_instance(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<InstanceSnapshot>, AppError> {
    resolve(&state, &name).map(Json)
}

#[derive(Debug, Deserialize)]
pub struct JoinBody {
    pub player: PlayerId,
    /// Display name of the instance. Omitted = any open lobby.
    #[serde(default)]
    pub instance: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct JoinResponse {
    pub instance: InstanceId,
    pub name: String,
    pub evicted: Option<PlayerId>,
}

/// POST /api/v1/join
pub async fn join(
    State(state): State<AppState>,
    Json(body): Json<JoinBody>,
) -> Result<Json<JoinResponse>, AppError> {
    let target = match body.instance {
        Some(name) => resolve(&state, &name)?.id,
        None => blocking(&state, |o| o.find_random_available())
            .await?
            .ok_or_else(|| AppError::Unavailable("no lobby instance available".to_string()))?,
    };
    let admission = state.orchestrator.admit(body.player, target)?;
    let name = state
        .orchestrator
        .instance(admission.instance)
        .map(|s| s.display_name)
        .unwrap_or_default();
    Ok(Json(JoinResponse {
        instance: admission.instance,
        name,
        evicted: admission.evicted,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SpectateBody {
    pub player: PlayerId,
    pub instance: String,
}

/// POST /api/v1/spectate
pub async fn spectate(
    State(state): State<AppState>,
    Json(body): Json<SpectateBody>,
) -> Result<StatusCode, AppError> {
    let target = resolve(&state, &body.instance)?;
    state.orchestrator.spectate(body.player, target.id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct LeaveBody {
    pub player: PlayerId,
}

#[derive(Debug, Serialize)]
pub struct LeaveResponse {
    pub removed: bool,
}

/// POST /api/v1/leave — idempotent.
pub async fn leave(
    State(state): State<AppState>,
    Json(body): Json<LeaveBody>,
) -> Json<LeaveResponse> {
    let removed = state.orchestrator.remove(body.player);
    Json(LeaveResponse { removed })
}

#[derive(Debug, Deserialize)]
pub struct EliminateBody {
    pub player: PlayerId,
    #[serde(default)]
    pub killer: Option<PlayerId>,
}

/// POST /api/v1/eliminate
pub async fn eliminate(
    State(state): State<AppState>,
    Json(body): Json<EliminateBody>,
) -> Result<StatusCode, AppError> {
    if !state.orchestrator.eliminate(body.player, body.killer) {
        return Err(AppError::Conflict(
            "player is not a living member of an active match".to_string(),
        ));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/instances/:name/start — admin force start.
pub async fn start_instance(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, AppError> {
    let target = resolve(&state, &name)?;
    if !state.orchestrator.start_match(target.id) {
        return Err(AppError::Conflict(format!(
            "instance {name} is in {} phase",
            target.phase
        )));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub replacement: Option<String>,
}

/// POST /api/v1/instances/:name/stop
pub async fn stop_instance(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<StopResponse>, AppError> {
    let target = resolve(&state, &name)?;
    let replacement = blocking(&state, move |o| o.stop(target.id)).await??;
    let replacement = replacement
        .and_then(|id| state.orchestrator.instance(id))
        .map(|s| s.display_name);
    Ok(Json(StopResponse { replacement }))
}

#[derive(Debug, Deserialize)]
pub struct BoundsBody {
    pub min_players: usize,
    pub max_players: usize,
}

/// PUT /api/v1/instances/:name/bounds
pub async fn set_bounds(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(body): Json<BoundsBody>,
) -> Result<Json<InstanceSnapshot>, AppError> {
    let target = resolve(&state, &name)?;
    state
        .orchestrator
        .set_player_bounds(target.id, body.min_players, body.max_players)?;
    resolve(&state, &name).map(Json)
}

#[derive(Debug, Deserialize)]
pub struct TierBody {
    pub tier: PriorityTier,
}

/// PUT /api/v1/players/:player/tier
pub async fn set_tier(
    State(state): State<AppState>,
    Path(player): Path<PlayerId>,
    Json(body): Json<TierBody>,
) -> StatusCode {
    state.ranks.set(player, body.tier);
    tracing::info!(player = %player, tier = %body.tier, "Player tier set");
    StatusCode::NO_CONTENT
}

/// GET /api/v1/templates
pub async fn list_templates(State(state): State<AppState>) -> Json<Vec<Template>> {
    Json(state.orchestrator.templates())
}

#[derive(Debug, Serialize)]
pub struct TemplateResponse {
    pub name: String,
    pub replaced: bool,
    pub complete: bool,
}

/// POST /api/v1/templates — register (or replace) and persist a template.
pub async fn put_template(
    State(state): State<AppState>,
    Json(template): Json<Template>,
) -> Result<(StatusCode, Json<TemplateResponse>), AppError> {
    let name = template.name.clone();
    let complete = template.is_complete();
    let replaced = state.orchestrator.register_template(template.clone())?;
    state.templates.save(&template);
    let status = if replaced {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((
        status,
        Json(TemplateResponse {
            name,
            replaced,
            complete,
        }),
    ))
}

/// DELETE /api/v1/templates/:name
pub async fn delete_template(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, AppError> {
    if !state.orchestrator.unregister_template(&name) {
        return Err(AppError::NotFound(format!("template not found: {name}")));
    }
    state.templates.delete(&name);
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/templates/:name/instances — explicit instance creation.
pub async fn create_instance(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<(StatusCode, Json<InstanceSnapshot>), AppError> {
    let id = blocking(&state, move |o| o.create_instance(&name)).await??;
    let snapshot = state
        .orchestrator
        .instance(id)
        .ok_or_else(|| AppError::NotFound("instance retired before it could be read".to_string()))?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}
