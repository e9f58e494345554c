pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
pub mod utils;

use services::{IdentityLinker, SessionStore, WorkflowOrchestrator};
use std::sync::Arc;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionStore>,
    pub linker: Arc<IdentityLinker>,
    pub workflow: Arc<WorkflowOrchestrator>,
    pub secure_cookies: bool,
}

impl AppState {
    pub fn new(
        sessions: Arc<SessionStore>,
        linker: Arc<IdentityLinker>,
        workflow: Arc<WorkflowOrchestrator>,
        secure_cookies: bool,
    ) -> Self {
        Self {
            sessions,
            linker,
            workflow,
            secure_cookies,
        }
    }
}
