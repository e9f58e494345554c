pub mod milestone;
pub mod session;

pub use milestone::{Milestone, Task, TaskCreated, TaskList};
pub use session::{
    IdentityClaims, Provider, Role, Session, SessionId, SessionTokens, TokenBundle, WorkflowState,
};
