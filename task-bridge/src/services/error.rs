use crate::models::Provider;
use service_core::error::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Not authenticated")]
    Unauthenticated,

    #[error("No session to elevate")]
    SessionNotFound,

    #[error("Forbidden: {action} on {resource}")]
    Forbidden { resource: String, action: String },

    #[error("Policy mismatch: {action} on {resource} denied on re-check")]
    PolicyMismatch { resource: String, action: String },

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Token exchange with {provider} failed")]
    ExchangeFailed { provider: Provider },

    #[error("Invalid identity token: {0}")]
    InvalidIdentityToken(String),

    #[error("Session has no default task list")]
    MissingDefaultList,

    #[error("Generated session id collided with an existing session")]
    SessionIdCollision,
}

impl From<WorkflowError> for AppError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::Unauthenticated => {
                AppError::Unauthorized(anyhow::anyhow!("Not authenticated"))
            }
            WorkflowError::SessionNotFound => {
                AppError::Unauthorized(anyhow::anyhow!("Sign in with the primary provider first"))
            }
            WorkflowError::Forbidden { .. } => AppError::Forbidden(anyhow::anyhow!("Forbidden")),
            WorkflowError::PolicyMismatch { .. } => {
                AppError::Forbidden(anyhow::anyhow!("Forbidden: policy mismatch"))
            }
            // Upstream detail was logged where it happened; callers get a generic message.
            WorkflowError::UpstreamUnavailable(_) => {
                AppError::BadGateway("upstream provider unavailable".to_string())
            }
            WorkflowError::ExchangeFailed { .. } | WorkflowError::InvalidIdentityToken(_) => {
                AppError::AuthError(anyhow::anyhow!("Authentication failed"))
            }
            WorkflowError::MissingDefaultList => {
                AppError::Conflict(anyhow::anyhow!("No default task list for this session"))
            }
            WorkflowError::SessionIdCollision => AppError::InternalError(anyhow::anyhow!(
                "Session id collision"
            )),
        }
    }
}
