use serde::{Deserialize, Serialize};

/// A milestone as returned by the project-tracking provider.
///
/// Only the fields this service reads; the rest of the upstream payload is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub number: u64,
    pub title: String,
}

/// A task list in the task-list provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskList {
    pub id: String,
    #[serde(default)]
    pub title: String,
}

/// A task as created in the task-list provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
}

/// Result of turning a milestone into a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskCreated {
    pub title: String,
    pub list_id: String,
}
