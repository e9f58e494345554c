use chrono::{DateTime, Utc};
use secrecy::Secret;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Session role, ordered from least to most privileged.
///
/// Within one session the role only ever moves up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Anonymous,
    Free,
    Premium,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Anonymous => "anonymous",
            Role::Free => "free",
            Role::Premium => "premium",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    Github,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::Github => "github",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credentials returned by one provider's token endpoint.
#[derive(Debug, Clone)]
pub struct TokenBundle {
    pub access_token: Secret<String>,
    pub id_token: Option<Secret<String>>,
    pub refresh_token: Option<Secret<String>>,
}

impl TokenBundle {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: Secret::new(access_token.into()),
            id_token: None,
            refresh_token: None,
        }
    }
}

/// One optional credential slot per provider.
#[derive(Debug, Clone, Default)]
pub struct SessionTokens {
    pub google: Option<TokenBundle>,
    pub github: Option<TokenBundle>,
}

impl SessionTokens {
    pub fn get(&self, provider: Provider) -> Option<&TokenBundle> {
        match provider {
            Provider::Google => self.google.as_ref(),
            Provider::Github => self.github.as_ref(),
        }
    }

    pub fn insert(&mut self, provider: Provider, bundle: TokenBundle) {
        match provider {
            Provider::Google => self.google = Some(bundle),
            Provider::Github => self.github = Some(bundle),
        }
    }

    pub fn linked(&self) -> Vec<Provider> {
        [Provider::Google, Provider::Github]
            .into_iter()
            .filter(|p| self.get(*p).is_some())
            .collect()
    }
}

/// Claims read from the primary provider's identity token.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IdentityClaims {
    pub email: String,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct WorkflowState {
    pub default_list_id: Option<String>,
}

/// Opaque session identifier carried in the `sessionID` cookie.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log lines; the full id is a bearer credential.
    pub fn short(&self) -> &str {
        let end = self.0.len().min(8);
        self.0.get(..end).unwrap_or_default()
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({}…)", self.short())
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    identity: IdentityClaims,
    role: Role,
    tokens: SessionTokens,
    workflow_state: WorkflowState,
    created_at: DateTime<Utc>,
}

impl Session {
    pub(crate) fn new(id: SessionId, identity: IdentityClaims, tokens: SessionTokens) -> Self {
        Self {
            id,
            identity,
            role: Role::Free,
            tokens,
            workflow_state: WorkflowState::default(),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn email(&self) -> &str {
        &self.identity.email
    }

    pub fn identity(&self) -> &IdentityClaims {
        &self.identity
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn tokens(&self) -> &SessionTokens {
        &self.tokens
    }

    pub fn default_list_id(&self) -> Option<&str> {
        self.workflow_state.default_list_id.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Raise the role to at least `target`. Never lowers it.
    pub(crate) fn elevate_to(&mut self, target: Role) {
        self.role = self.role.max(target);
    }

    pub(crate) fn merge_token(&mut self, provider: Provider, bundle: TokenBundle) {
        self.tokens.insert(provider, bundle);
    }

    pub(crate) fn set_default_list(&mut self, list_id: String) {
        self.workflow_state.default_list_id = Some(list_id);
    }
}
