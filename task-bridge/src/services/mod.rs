pub mod error;
pub mod metrics;
pub mod milestones;
pub mod oauth;
pub mod policy;
pub mod session_store;
pub mod tasks;
pub mod upstream;
pub mod workflow;

pub use error::WorkflowError;
pub use milestones::{GithubMilestones, MilestoneSource};
pub use oauth::{CallbackParams, IdentityLinker, OAuthFlow};
pub use policy::{PolicyDecision, PolicyGate, RbacPolicy};
pub use session_store::SessionStore;
pub use tasks::{GoogleTasks, TaskListProvider};
pub use workflow::WorkflowOrchestrator;
