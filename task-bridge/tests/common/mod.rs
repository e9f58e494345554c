#![allow(dead_code)]

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use task_bridge::config::{PolicyRule, PolicySettings, RoleInheritance};
use task_bridge::models::{
    IdentityClaims, Milestone, Provider, SessionId, SessionTokens, Task, TaskList, TokenBundle,
};
use task_bridge::services::policy::PolicyError;
use task_bridge::services::upstream::UpstreamError;
use task_bridge::services::{
    MilestoneSource, PolicyDecision, PolicyGate, RbacPolicy, SessionStore, TaskListProvider,
    WorkflowOrchestrator,
};

/// Everything the doubles observed, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Decision {
        role: String,
        resource: String,
        action: String,
        allow: bool,
    },
    ListMilestones,
    GetMilestone(u64),
    ListTaskLists,
    CreateTaskList(String),
    CreateTask { list_id: String, title: String },
}

impl Event {
    pub fn is_upstream_write(&self) -> bool {
        matches!(self, Event::CreateTaskList(_) | Event::CreateTask { .. })
    }

    pub fn is_upstream_call(&self) -> bool {
        !matches!(self, Event::Decision { .. })
    }
}

#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<Event>>>);

impl EventLog {
    pub fn push(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    pub fn upstream_calls(&self) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(Event::is_upstream_call)
            .collect()
    }
}

pub fn decision(role: &str, resource: &str, action: &str, allow: bool) -> Event {
    Event::Decision {
        role: role.to_string(),
        resource: resource.to_string(),
        action: action.to_string(),
        allow,
    }
}

/// Rules the service ships with: free reads milestones and creates tasks,
/// premium and admin inherit.
pub fn default_policy_settings() -> PolicySettings {
    let rule = |role: &str, resource: &str, action: &str| PolicyRule {
        role: role.to_string(),
        resource: resource.to_string(),
        action: action.to_string(),
    };
    let inherit = |role: &str, parent: &str| RoleInheritance {
        role: role.to_string(),
        parent: parent.to_string(),
    };

    PolicySettings {
        rules: vec![
            rule("free", "repo:milestones", "read"),
            rule("free", "milestone:task_create", "create_custom_list"),
            rule("free", "tasklist:default", "create"),
        ],
        inherits: vec![inherit("premium", "free"), inherit("admin", "premium")],
    }
}

type Rule = dyn Fn(&str, &str, &str, usize) -> Result<bool, PolicyError> + Send + Sync;

/// Policy double that records every query. The rule also sees how many
/// queries came before, so answers can change between calls.
pub struct RecordingPolicy {
    log: EventLog,
    calls: AtomicUsize,
    rule: Box<Rule>,
}

impl RecordingPolicy {
    pub fn new(
        log: EventLog,
        rule: impl Fn(&str, &str, &str, usize) -> Result<bool, PolicyError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            log,
            calls: AtomicUsize::new(0),
            rule: Box::new(rule),
        }
    }

    pub fn rbac(log: EventLog) -> Self {
        let policy = RbacPolicy::from_settings(&default_policy_settings());
        Self::new(log, move |role, resource, action, _| {
            Ok(policy.allows(role, resource, action))
        })
    }

    pub fn deny_all(log: EventLog) -> Self {
        Self::new(log, |_, _, _, _| Ok(false))
    }
}

#[async_trait]
impl PolicyDecision for RecordingPolicy {
    async fn decide(&self, role: &str, resource: &str, action: &str) -> Result<bool, PolicyError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let answer = (self.rule)(role, resource, action, call);
        self.log.push(decision(
            role,
            resource,
            action,
            matches!(answer, Ok(true)),
        ));
        answer
    }
}

pub struct RecordingMilestones {
    log: EventLog,
    milestones: Vec<Milestone>,
    unavailable: bool,
}

impl RecordingMilestones {
    pub fn new(log: EventLog, milestones: Vec<Milestone>) -> Self {
        Self {
            log,
            milestones,
            unavailable: false,
        }
    }

    pub fn unavailable(log: EventLog) -> Self {
        Self {
            log,
            milestones: Vec::new(),
            unavailable: true,
        }
    }
}

#[async_trait]
impl MilestoneSource for RecordingMilestones {
    async fn list_milestones(&self, _token: Option<&str>) -> Result<Vec<Milestone>, UpstreamError> {
        self.log.push(Event::ListMilestones);
        if self.unavailable {
            return Err(UpstreamError::Status {
                status: 503,
                body: "maintenance".to_string(),
            });
        }
        Ok(self.milestones.clone())
    }

    async fn get_milestone(
        &self,
        number: u64,
        _token: Option<&str>,
    ) -> Result<Milestone, UpstreamError> {
        self.log.push(Event::GetMilestone(number));
        if self.unavailable {
            return Err(UpstreamError::Status {
                status: 503,
                body: "maintenance".to_string(),
            });
        }
        self.milestones
            .iter()
            .find(|m| m.number == number)
            .cloned()
            .ok_or(UpstreamError::Status {
                status: 404,
                body: "Not Found".to_string(),
            })
    }
}

pub struct RecordingTasks {
    log: EventLog,
    existing: Vec<TaskList>,
    fail_task_create: bool,
    created_lists: AtomicUsize,
}

impl RecordingTasks {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            existing: Vec::new(),
            fail_task_create: false,
            created_lists: AtomicUsize::new(0),
        }
    }

    pub fn with_existing(mut self, lists: Vec<TaskList>) -> Self {
        self.existing = lists;
        self
    }

    pub fn failing_task_create(mut self) -> Self {
        self.fail_task_create = true;
        self
    }
}

#[async_trait]
impl TaskListProvider for RecordingTasks {
    async fn list_task_lists(&self, _token: &str) -> Result<Vec<TaskList>, UpstreamError> {
        self.log.push(Event::ListTaskLists);
        Ok(self.existing.clone())
    }

    async fn create_task_list(&self, _token: &str, title: &str) -> Result<TaskList, UpstreamError> {
        self.log.push(Event::CreateTaskList(title.to_string()));
        let n = self.created_lists.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(TaskList {
            id: format!("created-{}", n),
            title: title.to_string(),
        })
    }

    async fn create_task(
        &self,
        _token: &str,
        list_id: &str,
        title: &str,
    ) -> Result<Task, UpstreamError> {
        self.log.push(Event::CreateTask {
            list_id: list_id.to_string(),
            title: title.to_string(),
        });
        if self.fail_task_create {
            return Err(UpstreamError::Status {
                status: 500,
                body: "backend error".to_string(),
            });
        }
        Ok(Task {
            id: Some("task-1".to_string()),
            title: title.to_string(),
        })
    }
}

pub fn sample_milestones() -> Vec<Milestone> {
    vec![
        Milestone {
            number: 3,
            title: "v3.0".to_string(),
        },
        Milestone {
            number: 1,
            title: "v1.0".to_string(),
        },
        Milestone {
            number: 2,
            title: "v2.0".to_string(),
        },
    ]
}

pub fn identity(email: &str) -> IdentityClaims {
    IdentityClaims {
        email: email.to_string(),
        sub: Some("1234567890".to_string()),
        name: None,
    }
}

/// Unsigned identity token carrying `email`.
pub fn id_token(email: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"email":"{}","sub":"42"}}"#, email));
    format!("{}.{}.sig", header, payload)
}

/// A primary-authenticated session, optionally with a default list.
pub fn free_session(store: &SessionStore, default_list: Option<&str>) -> SessionId {
    let mut tokens = SessionTokens::default();
    tokens.insert(Provider::Google, TokenBundle::new("google-access"));
    let id = store.create(identity("ada@example.com"), tokens).unwrap();
    if let Some(list_id) = default_list {
        store.attach_default_list(&id, list_id).unwrap();
    }
    id
}

pub fn premium_session(store: &SessionStore) -> SessionId {
    let id = free_session(store, Some("default-list"));
    store
        .elevate(&id, Provider::Github, TokenBundle::new("github-access"))
        .unwrap();
    id
}

pub struct Harness {
    pub log: EventLog,
    pub sessions: Arc<SessionStore>,
    pub workflow: WorkflowOrchestrator,
}

pub fn harness(
    policy: impl FnOnce(EventLog) -> RecordingPolicy,
    milestones: impl FnOnce(EventLog) -> RecordingMilestones,
    tasks: impl FnOnce(EventLog) -> RecordingTasks,
) -> Harness {
    let log = EventLog::default();
    let sessions = Arc::new(SessionStore::new());
    let gate = PolicyGate::new(Arc::new(policy(log.clone())));
    let workflow = WorkflowOrchestrator::new(
        sessions.clone(),
        gate,
        Arc::new(milestones(log.clone())),
        Arc::new(tasks(log.clone())),
        false,
    );

    Harness {
        log,
        sessions,
        workflow,
    }
}

pub fn default_harness() -> Harness {
    harness(
        RecordingPolicy::rbac,
        |log| RecordingMilestones::new(log, sample_milestones()),
        RecordingTasks::new,
    )
}
