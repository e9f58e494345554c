use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use service_core::middleware::{
    metrics::metrics_middleware, security_headers::security_headers_middleware,
    tracing::{request_id_middleware, REQUEST_ID_HEADER},
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

use crate::config::Settings;
use crate::handlers::{
    app::{health_check, index},
    auth::{callback, callback_github, login, login_github, me},
    milestones::{create_task, list_milestones},
};
use crate::middleware::session::session_middleware;
use crate::models::Provider;
use crate::services::upstream::build_client;
use crate::services::{
    GithubMilestones, GoogleTasks, IdentityLinker, OAuthFlow, PolicyGate, RbacPolicy,
    SessionStore, TaskListProvider, WorkflowOrchestrator,
};
use crate::AppState;

/// Wire the production services from configuration.
pub fn build_state(settings: &Settings) -> anyhow::Result<AppState> {
    let client = build_client(Duration::from_secs(settings.upstream.timeout_secs))?;

    let sessions = Arc::new(SessionStore::new());
    let gate = PolicyGate::new(Arc::new(RbacPolicy::from_settings(&settings.policy)));
    let tasks: Arc<dyn TaskListProvider> =
        Arc::new(GoogleTasks::new(client.clone(), settings.tasks.clone()));
    let milestones = Arc::new(GithubMilestones::new(
        client.clone(),
        settings.milestones.clone(),
    ));

    let primary = OAuthFlow::new(
        Provider::Google,
        settings.google.clone(),
        &settings.server.public_url,
        client.clone(),
    )?;
    let secondary = OAuthFlow::new(
        Provider::Github,
        settings.github.clone(),
        &settings.server.public_url,
        client,
    )?;

    let linker = Arc::new(IdentityLinker::new(
        primary,
        secondary,
        sessions.clone(),
        tasks.clone(),
        gate.clone(),
        settings.tasks.default_list_title.clone(),
    ));
    let workflow = Arc::new(WorkflowOrchestrator::new(
        sessions.clone(),
        gate,
        milestones,
        tasks,
        settings.milestones.send_credentials,
    ));

    Ok(AppState::new(
        sessions,
        linker,
        workflow,
        settings.server.secure_cookies,
    ))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/metrics", get(crate::handlers::metrics::metrics))
        .route("/login", get(login))
        .route("/callback", get(callback))
        .route("/login/github", get(login_github))
        .route("/callback/github", get(callback_github))
        .route("/me", get(me))
        .route("/milestones", get(list_milestones))
        .route("/milestones/:number/task", post(create_task))
        .layer(from_fn(session_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri().path(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}
