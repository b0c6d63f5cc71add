use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use skirmish_core::error::ProvisioningError;
use skirmish_core::instance::BoundsError;
use skirmish_core::notice::RejectReason;
use skirmish_core::template::TemplateError;

/// Failures of admin-initiated orchestrator operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminError {
    UnknownInstance,
    UnknownTemplate(String),
    Template(TemplateError),
    Bounds(BoundsError),
    Provisioning(ProvisioningError),
}

impl std::fmt::Display for AdminError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownInstance => write!(f, "unknown instance"),
            Self::UnknownTemplate(name) => write!(f, "unknown template: {name}"),
            Self::Template(e) => write!(f, "invalid template: {e}"),
            Self::Bounds(e) => write!(f, "invalid bounds: {e}"),
            Self::Provisioning(e) => write!(f, "provisioning failed: {e}"),
        }
    }
}

impl std::error::Error for AdminError {}

impl From<TemplateError> for AdminError {
    fn from(e: TemplateError) -> Self {
        Self::Template(e)
    }
}

impl From<BoundsError> for AdminError {
    fn from(e: BoundsError) -> Self {
        Self::Bounds(e)
    }
}

impl From<ProvisioningError> for AdminError {
    fn from(e: ProvisioningError) -> Self {
        Self::Provisioning(e)
    }
}

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Unavailable(String),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest(m) | Self::NotFound(m) | Self::Conflict(m) | Self::Unavailable(m) => {
                write!(f, "{m}")
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            Self::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            Self::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
            Self::Unavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m.clone()),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<RejectReason> for AppError {
    fn from(reason: RejectReason) -> Self {
        match reason {
            RejectReason::UnknownInstance => Self::NotFound(reason.to_string()),
            _ => Self::Conflict(reason.to_string()),
        }
    }
}

impl From<AdminError> for AppError {
    fn from(e: AdminError) -> Self {
        match e {
            AdminError::UnknownInstance | AdminError::UnknownTemplate(_) => {
                Self::NotFound(e.to_string())
            },
            AdminError::Template(_) | AdminError::Bounds(_) => Self::BadRequest(e.to_string()),
            AdminError::Provisioning(_) => Self::Unavailable(e.to_string()),
        }
    }
}
