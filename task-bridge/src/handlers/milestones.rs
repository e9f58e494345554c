use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use service_core::error::AppError;

use crate::middleware::session::CurrentSession;
use crate::models::{Milestone, TaskCreated};
use crate::AppState;

pub async fn list_milestones(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
) -> Result<Json<Vec<Milestone>>, AppError> {
    let milestones = state.workflow.list_milestones(current.id()).await?;
    Ok(Json(milestones))
}

pub async fn create_task(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    Path(number): Path<u64>,
) -> Result<(StatusCode, Json<TaskCreated>), AppError> {
    let created = state
        .workflow
        .create_task_from_milestone(current.id(), number)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}
