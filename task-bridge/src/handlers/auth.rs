use axum::{
    extract::{Query, State},
    response::Redirect,
    Extension, Json,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use serde::Serialize;
use service_core::error::AppError;

use crate::middleware::session::{session_cookie, CurrentSession};
use crate::models::{Provider, Role};
use crate::services::{CallbackParams, WorkflowError};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub email: String,
    pub role: Role,
    pub default_list_id: Option<String>,
    pub linked_providers: Vec<Provider>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ElevationResponse {
    pub role: Role,
}

pub async fn login(State(state): State<AppState>) -> Redirect {
    Redirect::to(state.linker.primary().authorization_url().as_str())
}

pub async fn login_github(State(state): State<AppState>) -> Redirect {
    Redirect::to(state.linker.secondary().authorization_url().as_str())
}

/// Primary callback: creates the session and hands its id back as a cookie.
pub async fn callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<(CookieJar, String), AppError> {
    let session_id = state.linker.complete_primary(&params).await?;
    let session = state
        .sessions
        .get(&session_id)
        .ok_or(WorkflowError::SessionNotFound)?;

    let jar = jar.add(session_cookie(&session_id, state.secure_cookies));
    Ok((jar, format!("Signed in as {}", session.email())))
}

/// Secondary callback: links the provider to the caller's existing session.
pub async fn callback_github(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    Query(params): Query<CallbackParams>,
) -> Result<Json<ElevationResponse>, AppError> {
    let role = state
        .linker
        .complete_secondary(current.id(), &params)
        .await?;
    Ok(Json(ElevationResponse { role }))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
) -> Result<Json<MeResponse>, AppError> {
    let session = current
        .id()
        .and_then(|id| state.sessions.get(id))
        .ok_or(WorkflowError::Unauthenticated)?;

    Ok(Json(MeResponse {
        email: session.email().to_string(),
        role: session.role(),
        default_list_id: session.default_list_id().map(str::to_string),
        linked_providers: session.tokens().linked(),
        created_at: session.created_at(),
    }))
}
