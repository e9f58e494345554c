//! Milestone-to-task pipeline.
//!
//! Every upstream call here is preceded by a policy decision for the exact
//! resource/action pair it performs. A deny returns before the call is made.

use secrecy::ExposeSecret;
use std::sync::Arc;

use super::error::WorkflowError;
use super::milestones::MilestoneSource;
use super::policy::{
    PolicyGate, CREATE_CUSTOM_LIST_ACTION, MILESTONES_RESOURCE, READ_ACTION, TASK_CREATE_RESOURCE,
};
use super::session_store::SessionStore;
use super::tasks::TaskListProvider;
use crate::models::{Milestone, Provider, Role, Session, SessionId, TaskCreated};

pub struct WorkflowOrchestrator {
    sessions: Arc<SessionStore>,
    gate: PolicyGate,
    milestones: Arc<dyn MilestoneSource>,
    tasks: Arc<dyn TaskListProvider>,
    send_milestone_credentials: bool,
}

impl WorkflowOrchestrator {
    pub fn new(
        sessions: Arc<SessionStore>,
        gate: PolicyGate,
        milestones: Arc<dyn MilestoneSource>,
        tasks: Arc<dyn TaskListProvider>,
        send_milestone_credentials: bool,
    ) -> Self {
        Self {
            sessions,
            gate,
            milestones,
            tasks,
            send_milestone_credentials,
        }
    }

    fn session(&self, session_id: Option<&SessionId>) -> Result<Session, WorkflowError> {
        session_id
            .and_then(|id| self.sessions.get(id))
            .ok_or(WorkflowError::Unauthenticated)
    }

    /// GitHub credential for milestone reads, or `None` for anonymous access.
    fn milestone_token(&self, session: &Session) -> Option<String> {
        if !self.send_milestone_credentials {
            return None;
        }
        session
            .tokens()
            .get(Provider::Github)
            .map(|bundle| bundle.access_token.expose_secret().clone())
    }

    pub async fn list_milestones(
        &self,
        session_id: Option<&SessionId>,
    ) -> Result<Vec<Milestone>, WorkflowError> {
        let session = self.session(session_id)?;

        self.gate
            .require(session.role(), MILESTONES_RESOURCE, READ_ACTION)
            .await?;

        let token = self.milestone_token(&session);
        let milestones = self
            .milestones
            .list_milestones(token.as_deref())
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to fetch milestones");
                WorkflowError::from(e)
            })?;

        tracing::info!(
            session = session.id().short(),
            count = milestones.len(),
            "Milestones listed"
        );

        Ok(milestones)
    }

    /// Create a task titled after milestone `number`.
    ///
    /// Premium sessions get a fresh list named after the milestone, after a
    /// second policy check on the same pair; a deny there is a
    /// `PolicyMismatch`. Every other role writes into the session's default
    /// list. A list created before a failed task write is left in place.
    pub async fn create_task_from_milestone(
        &self,
        session_id: Option<&SessionId>,
        number: u64,
    ) -> Result<TaskCreated, WorkflowError> {
        let session = self.session(session_id)?;
        let role = session.role();

        self.gate
            .require(role, TASK_CREATE_RESOURCE, CREATE_CUSTOM_LIST_ACTION)
            .await?;

        let tasks_token = session
            .tokens()
            .get(Provider::Google)
            .map(|bundle| bundle.access_token.expose_secret().clone())
            .ok_or(WorkflowError::Unauthenticated)?;

        let milestone = self
            .milestones
            .get_milestone(number, self.milestone_token(&session).as_deref())
            .await
            .map_err(|e| {
                tracing::error!(milestone = number, error = %e, "Failed to fetch milestone");
                WorkflowError::from(e)
            })?;

        let list_id = if role == Role::Premium {
            let recheck = self
                .gate
                .enforce(role, TASK_CREATE_RESOURCE, CREATE_CUSTOM_LIST_ACTION)
                .await;
            if !recheck.allow {
                tracing::warn!(
                    session = session.id().short(),
                    role = %role,
                    "Premium re-check denied after initial allow"
                );
                return Err(WorkflowError::PolicyMismatch {
                    resource: TASK_CREATE_RESOURCE.to_string(),
                    action: CREATE_CUSTOM_LIST_ACTION.to_string(),
                });
            }

            let list = self
                .tasks
                .create_task_list(&tasks_token, &milestone.title)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to create milestone list");
                    WorkflowError::from(e)
                })?;
            list.id
        } else {
            session
                .default_list_id()
                .ok_or(WorkflowError::MissingDefaultList)?
                .to_string()
        };

        self.tasks
            .create_task(&tasks_token, &list_id, &milestone.title)
            .await
            .map_err(|e| {
                tracing::error!(list_id = %list_id, error = %e, "Failed to create task");
                WorkflowError::from(e)
            })?;

        tracing::info!(
            session = session.id().short(),
            milestone = number,
            list_id = %list_id,
            "Task created from milestone"
        );

        Ok(TaskCreated {
            title: milestone.title,
            list_id,
        })
    }
}
