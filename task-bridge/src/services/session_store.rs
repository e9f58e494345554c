//! Process-lifetime session registry.
//!
//! Sessions are keyed by a random 240-bit identifier and live until the
//! process exits. `DashMap` shards the map so mutations of different sessions
//! do not contend; writes to the same session are last-write-wins per field.

use dashmap::{mapref::entry::Entry, DashMap};
use rand::RngCore;

use super::error::WorkflowError;
use crate::models::{IdentityClaims, Provider, Role, Session, SessionId, SessionTokens, TokenBundle};

/// 30 random bytes = 240 bits of entropy, hex encoded to 60 characters.
const SESSION_ID_BYTES: usize = 30;

#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<SessionId, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a `free` session for a freshly authenticated identity.
    pub fn create(
        &self,
        identity: IdentityClaims,
        tokens: SessionTokens,
    ) -> Result<SessionId, WorkflowError> {
        self.create_with_id(generate_session_id(), identity, tokens)
    }

    fn create_with_id(
        &self,
        id: SessionId,
        identity: IdentityClaims,
        tokens: SessionTokens,
    ) -> Result<SessionId, WorkflowError> {
        match self.sessions.entry(id.clone()) {
            Entry::Occupied(_) => {
                tracing::error!(session = id.short(), "Session id collision");
                Err(WorkflowError::SessionIdCollision)
            }
            Entry::Vacant(slot) => {
                tracing::info!(
                    session = id.short(),
                    email = %identity.email,
                    "Session created"
                );
                slot.insert(Session::new(id.clone(), identity, tokens));
                Ok(id)
            }
        }
    }

    /// Snapshot of the session, or `None` for an unknown id.
    pub fn get(&self, id: &SessionId) -> Option<Session> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    /// Merge a secondary provider's token and raise the role to premium.
    ///
    /// Never creates a session: an unknown id yields `SessionNotFound`.
    pub fn elevate(
        &self,
        id: &SessionId,
        provider: Provider,
        bundle: TokenBundle,
    ) -> Result<Role, WorkflowError> {
        let mut session = self
            .sessions
            .get_mut(id)
            .ok_or(WorkflowError::SessionNotFound)?;

        session.merge_token(provider, bundle);
        session.elevate_to(Role::Premium);

        tracing::info!(
            session = id.short(),
            provider = %provider,
            role = %session.role(),
            "Session elevated"
        );

        Ok(session.role())
    }

    /// Record the session's default destination list. Overwrites any previous value.
    pub fn attach_default_list(
        &self,
        id: &SessionId,
        list_id: impl Into<String>,
    ) -> Result<(), WorkflowError> {
        let mut session = self
            .sessions
            .get_mut(id)
            .ok_or(WorkflowError::SessionNotFound)?;
        session.set_default_list(list_id.into());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

fn generate_session_id() -> SessionId {
    let mut bytes = [0u8; SESSION_ID_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    SessionId::new(hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn identity(email: &str) -> IdentityClaims {
        IdentityClaims {
            email: email.to_string(),
            sub: Some("sub-1".to_string()),
            name: None,
        }
    }

    #[test]
    fn test_create_starts_free() {
        let store = SessionStore::new();
        let id = store
            .create(identity("ada@example.com"), SessionTokens::default())
            .unwrap();

        let session = store.get(&id).unwrap();
        assert_eq!(session.role(), Role::Free);
        assert_eq!(session.email(), "ada@example.com");
        assert_eq!(session.default_list_id(), None);
    }

    #[test]
    fn test_session_id_has_240_bits() {
        let store = SessionStore::new();
        let id = store
            .create(identity("ada@example.com"), SessionTokens::default())
            .unwrap();
        assert_eq!(id.as_str().len(), SESSION_ID_BYTES * 2);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_ids_are_unique() {
        let store = SessionStore::new();
        let a = store
            .create(identity("a@example.com"), SessionTokens::default())
            .unwrap();
        let b = store
            .create(identity("b@example.com"), SessionTokens::default())
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_collision_is_rejected_not_overwritten() {
        let store = SessionStore::new();
        let id = SessionId::new("fixed");
        store
            .create_with_id(id.clone(), identity("first@example.com"), SessionTokens::default())
            .unwrap();

        let result = store.create_with_id(
            id.clone(),
            identity("second@example.com"),
            SessionTokens::default(),
        );

        assert!(matches!(result, Err(WorkflowError::SessionIdCollision)));
        assert_eq!(store.get(&id).unwrap().email(), "first@example.com");
    }

    #[test]
    fn test_get_unknown_is_none() {
        let store = SessionStore::new();
        assert!(store.get(&SessionId::new("missing")).is_none());
    }

    #[test]
    fn test_elevate_merges_token_and_sets_premium() {
        let store = SessionStore::new();
        let id = store
            .create(identity("ada@example.com"), SessionTokens::default())
            .unwrap();

        let role = store
            .elevate(&id, Provider::Github, TokenBundle::new("gh-token"))
            .unwrap();

        assert_eq!(role, Role::Premium);
        let session = store.get(&id).unwrap();
        assert_eq!(session.role(), Role::Premium);
        assert!(session.tokens().get(Provider::Github).is_some());
    }

    #[test]
    fn test_elevate_unknown_session_creates_nothing() {
        let store = SessionStore::new();
        let result = store.elevate(
            &SessionId::new("missing"),
            Provider::Github,
            TokenBundle::new("gh-token"),
        );

        assert!(matches!(result, Err(WorkflowError::SessionNotFound)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_elevation_is_monotonic() {
        let store = SessionStore::new();
        let id = store
            .create(identity("ada@example.com"), SessionTokens::default())
            .unwrap();

        store
            .elevate(&id, Provider::Github, TokenBundle::new("first"))
            .unwrap();
        store
            .elevate(&id, Provider::Github, TokenBundle::new("second"))
            .unwrap();
        store.attach_default_list(&id, "list-1").unwrap();

        assert_eq!(store.get(&id).unwrap().role(), Role::Premium);
    }

    #[test]
    fn test_attach_default_list_is_idempotent() {
        let store = SessionStore::new();
        let id = store
            .create(identity("ada@example.com"), SessionTokens::default())
            .unwrap();

        store.attach_default_list(&id, "list-1").unwrap();
        store.attach_default_list(&id, "list-1").unwrap();
        assert_eq!(store.get(&id).unwrap().default_list_id(), Some("list-1"));

        store.attach_default_list(&id, "list-2").unwrap();
        assert_eq!(store.get(&id).unwrap().default_list_id(), Some("list-2"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_mutations_keep_session_consistent() {
        let store = Arc::new(SessionStore::new());
        let mut google = SessionTokens::default();
        google.insert(Provider::Google, TokenBundle::new("google-token"));
        let shared = store.create(identity("ada@example.com"), google).unwrap();
        let others: Vec<SessionId> = (0..4)
            .map(|n| {
                store
                    .create(identity(&format!("user{}@example.com", n)), SessionTokens::default())
                    .unwrap()
            })
            .collect();

        let mut handles = Vec::new();
        for n in 0..200 {
            let store = store.clone();
            let id = if n % 10 == 0 {
                others[(n / 10) % others.len()].clone()
            } else {
                shared.clone()
            };
            handles.push(tokio::spawn(async move {
                if n % 2 == 0 {
                    store
                        .elevate(&id, Provider::Github, TokenBundle::new(format!("gh-{}", n)))
                        .map(|_| ())
                } else {
                    store.attach_default_list(&id, format!("list-{}", n))
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let session = store.get(&shared).unwrap();
        assert_eq!(session.role(), Role::Premium);
        assert_eq!(session.tokens().linked(), vec![Provider::Google, Provider::Github]);
        let list = session.default_list_id().unwrap();
        let written = list
            .strip_prefix("list-")
            .and_then(|n| n.parse::<usize>().ok())
            .unwrap();
        assert!(written % 2 == 1 && written % 10 != 0);

        for other in &others {
            let session = store.get(other).unwrap();
            assert_eq!(session.role(), Role::Premium);
            assert_eq!(session.default_list_id(), None);
        }
        assert_eq!(store.len(), 1 + others.len());
    }
}
