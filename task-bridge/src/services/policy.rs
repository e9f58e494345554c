//! Policy decision and enforcement.
//!
//! [`PolicyDecision`] is the decision point: it answers allow/deny for a
//! `(role, resource, action)` triple. [`PolicyGate`] is the enforcement point
//! every side-effecting step goes through. It audits each decision and turns
//! an unavailable decision engine into a deny.

use async_trait::async_trait;
use metrics::counter;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

use super::error::WorkflowError;
use crate::config::PolicySettings;
use crate::models::Role;

pub const MILESTONES_RESOURCE: &str = "repo:milestones";
pub const READ_ACTION: &str = "read";
pub const TASK_CREATE_RESOURCE: &str = "milestone:task_create";
pub const CREATE_CUSTOM_LIST_ACTION: &str = "create_custom_list";
pub const DEFAULT_LIST_RESOURCE: &str = "tasklist:default";
pub const CREATE_ACTION: &str = "create";

const WILDCARD: &str = "*";

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Policy engine unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait PolicyDecision: Send + Sync {
    async fn decide(&self, role: &str, resource: &str, action: &str) -> Result<bool, PolicyError>;
}

/// Outcome of one enforcement, echoing the query that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub allow: bool,
    pub role: String,
    pub resource: String,
    pub action: String,
}

#[derive(Clone)]
pub struct PolicyGate {
    pdp: Arc<dyn PolicyDecision>,
}

impl PolicyGate {
    pub fn new(pdp: Arc<dyn PolicyDecision>) -> Self {
        Self { pdp }
    }

    /// Evaluate the triple afresh and audit the result. Never cached.
    pub async fn enforce(&self, role: Role, resource: &str, action: &str) -> Decision {
        let allow = match self.pdp.decide(role.as_str(), resource, action).await {
            Ok(allow) => allow,
            Err(e) => {
                tracing::warn!(
                    role = %role,
                    resource,
                    action,
                    error = %e,
                    "Policy engine failed; denying"
                );
                false
            }
        };

        let decision = Decision {
            allow,
            role: role.as_str().to_string(),
            resource: resource.to_string(),
            action: action.to_string(),
        };

        tracing::info!(
            target: "audit",
            role = %decision.role,
            resource = %decision.resource,
            action = %decision.action,
            allow = decision.allow,
            "{}",
            if allow { "permit operation" } else { "deny operation" }
        );

        counter!(
            "policy_decisions_total",
            "resource" => resource.to_string(),
            "action" => action.to_string(),
            "outcome" => if allow { "allow" } else { "deny" }
        )
        .increment(1);

        decision
    }

    /// [`enforce`](Self::enforce), mapping a deny to `WorkflowError::Forbidden`.
    pub async fn require(
        &self,
        role: Role,
        resource: &str,
        action: &str,
    ) -> Result<Decision, WorkflowError> {
        let decision = self.enforce(role, resource, action).await;
        if decision.allow {
            Ok(decision)
        } else {
            Err(WorkflowError::Forbidden {
                resource: resource.to_string(),
                action: action.to_string(),
            })
        }
    }
}

/// Role-based policy evaluated in-process from configured rules.
///
/// A role is granted its own rules plus those of every role it inherits
/// from, transitively. `*` as the action grants every action on a resource.
#[derive(Debug, Default)]
pub struct RbacPolicy {
    grants: HashMap<String, HashSet<(String, String)>>,
    parents: HashMap<String, Vec<String>>,
}

impl RbacPolicy {
    pub fn from_settings(settings: &PolicySettings) -> Self {
        let mut policy = Self::default();
        for rule in &settings.rules {
            policy
                .grants
                .entry(rule.role.clone())
                .or_default()
                .insert((rule.resource.clone(), rule.action.clone()));
        }
        for link in &settings.inherits {
            policy
                .parents
                .entry(link.role.clone())
                .or_default()
                .push(link.parent.clone());
        }

        tracing::info!(
            roles = policy.grants.len(),
            inherits = settings.inherits.len(),
            "Policy loaded"
        );

        policy
    }

    pub fn allows(&self, role: &str, resource: &str, action: &str) -> bool {
        let mut pending = vec![role];
        let mut visited = HashSet::new();

        while let Some(current) = pending.pop() {
            if !visited.insert(current) {
                continue;
            }

            if let Some(grants) = self.grants.get(current) {
                let granted = grants
                    .iter()
                    .any(|(res, act)| res == resource && (act == action || act == WILDCARD));
                if granted {
                    return true;
                }
            }

            if let Some(parents) = self.parents.get(current) {
                pending.extend(parents.iter().map(String::as_str));
            }
        }

        false
    }
}

#[async_trait]
impl PolicyDecision for RbacPolicy {
    async fn decide(&self, role: &str, resource: &str, action: &str) -> Result<bool, PolicyError> {
        Ok(self.allows(role, resource, action))
    }
}
