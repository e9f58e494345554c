//! OAuth2 authorization-code flows and the identity linking built on them.
//!
//! Both providers run the same [`OAuthFlow`]; only the [`OAuthProviderSettings`]
//! differ. Per attempt the flow moves through
//! `Unauthenticated -> AuthorizationRequested -> CodeReceived ->
//! TokenExchanged | ExchangeFailed`. A failed exchange is terminal: the user
//! restarts from the authorization redirect, nothing is retried.

use reqwest::{Client, Url};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use service_core::observability::TracedClientExt;
use std::collections::HashMap;
use std::sync::Arc;

use super::error::WorkflowError;
use super::policy::{PolicyGate, CREATE_ACTION, DEFAULT_LIST_RESOURCE};
use super::session_store::SessionStore;
use super::tasks::TaskListProvider;
use super::upstream::{observe, read_json, UpstreamError};
use crate::config::{OAuthProviderSettings, TokenRequestEncoding};
use crate::models::{Provider, Role, SessionId, SessionTokens, TaskList, TokenBundle};
use crate::utils::jwt::decode_identity_claims;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Unauthenticated,
    AuthorizationRequested,
    CodeReceived,
    TokenExchanged,
    ExchangeFailed,
}

/// Query string of the provider's redirect back to us.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub error: Option<String>,
    pub state: Option<String>,
}

impl CallbackParams {
    pub fn with_code(code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

pub struct OAuthFlow {
    provider: Provider,
    settings: OAuthProviderSettings,
    authorize_url: Url,
    redirect_uri: String,
    client: Client,
}

impl OAuthFlow {
    pub fn new(
        provider: Provider,
        settings: OAuthProviderSettings,
        public_url: &str,
        client: Client,
    ) -> anyhow::Result<Self> {
        let authorize_url = Url::parse(&settings.authorize_url).map_err(|e| {
            anyhow::anyhow!("Invalid {} authorize_url '{}': {}", provider, settings.authorize_url, e)
        })?;
        let redirect_uri = format!(
            "{}{}",
            public_url.trim_end_matches('/'),
            settings.redirect_path
        );

        Ok(Self {
            provider,
            settings,
            authorize_url,
            redirect_uri,
            client,
        })
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    fn record(&self, from: FlowState, to: FlowState) {
        tracing::info!(
            provider = %self.provider,
            from = ?from,
            to = ?to,
            "OAuth flow transition"
        );
    }

    /// URL the browser is redirected to in order to start the flow.
    pub fn authorization_url(&self) -> Url {
        let scope = self.settings.scopes.join(" ");
        let mut url = self.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.settings.client_id)
            .append_pair("scope", &scope)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &self.redirect_uri);

        self.record(FlowState::Unauthenticated, FlowState::AuthorizationRequested);
        url
    }

    /// Exchange the callback's authorization code for tokens.
    pub async fn exchange(&self, params: &CallbackParams) -> Result<TokenBundle, WorkflowError> {
        let code = match params.code.as_deref() {
            Some(code) if !code.is_empty() => code,
            _ => {
                tracing::warn!(
                    provider = %self.provider,
                    error = ?params.error,
                    "Callback without authorization code"
                );
                self.record(FlowState::AuthorizationRequested, FlowState::ExchangeFailed);
                return Err(self.failed());
            }
        };
        self.record(FlowState::AuthorizationRequested, FlowState::CodeReceived);

        let client_secret = self.settings.client_secret.expose_secret();
        let fields = [
            ("code", code),
            ("client_id", self.settings.client_id.as_str()),
            ("client_secret", client_secret.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        let request = self
            .client
            .traced_post(&self.settings.token_url)
            .header("Accept", "application/json");
        let request = match self.settings.token_request {
            TokenRequestEncoding::Form => request.form(&fields),
            TokenRequestEncoding::Json => {
                let body: HashMap<&str, &str> = fields.iter().copied().collect();
                request.json(&body)
            }
        };

        let result = match request.send().await {
            Ok(response) => observe(
                self.token_endpoint(),
                read_json::<TokenResponse>(response).await,
            ),
            Err(e) => observe(self.token_endpoint(), Err(UpstreamError::from(e))),
        };

        let tokens = result.map_err(|e| {
            tracing::error!(provider = %self.provider, error = %e, "Token exchange failed");
            self.record(FlowState::CodeReceived, FlowState::ExchangeFailed);
            self.failed()
        })?;

        self.record(FlowState::CodeReceived, FlowState::TokenExchanged);

        Ok(TokenBundle {
            access_token: Secret::new(tokens.access_token),
            id_token: tokens.id_token.map(Secret::new),
            refresh_token: tokens.refresh_token.map(Secret::new),
        })
    }

    /// Metric label for this provider's token endpoint.
    fn token_endpoint(&self) -> &'static str {
        match self.provider {
            Provider::Google => "google_oauth",
            Provider::Github => "github_oauth",
        }
    }

    fn failed(&self) -> WorkflowError {
        WorkflowError::ExchangeFailed {
            provider: self.provider,
        }
    }
}

/// Turns completed OAuth flows into sessions.
///
/// The primary flow creates a session; the secondary flow can only elevate
/// one that already exists.
pub struct IdentityLinker {
    primary: OAuthFlow,
    secondary: OAuthFlow,
    sessions: Arc<SessionStore>,
    tasks: Arc<dyn TaskListProvider>,
    gate: PolicyGate,
    default_list_title: String,
}

impl IdentityLinker {
    pub fn new(
        primary: OAuthFlow,
        secondary: OAuthFlow,
        sessions: Arc<SessionStore>,
        tasks: Arc<dyn TaskListProvider>,
        gate: PolicyGate,
        default_list_title: String,
    ) -> Self {
        Self {
            primary,
            secondary,
            sessions,
            tasks,
            gate,
            default_list_title,
        }
    }

    pub fn primary(&self) -> &OAuthFlow {
        &self.primary
    }

    pub fn secondary(&self) -> &OAuthFlow {
        &self.secondary
    }

    /// Finish the primary flow: exchange, read identity, resolve the default
    /// list, then create the session.
    pub async fn complete_primary(
        &self,
        params: &CallbackParams,
    ) -> Result<SessionId, WorkflowError> {
        let bundle = self.primary.exchange(params).await?;

        let id_token = bundle.id_token.as_ref().ok_or_else(|| {
            tracing::error!(provider = %self.primary.provider(), "Token response has no id_token");
            WorkflowError::InvalidIdentityToken("missing id_token".to_string())
        })?;
        let identity = decode_identity_claims(id_token.expose_secret()).map_err(|e| {
            tracing::error!(error = %e, "Failed to decode identity token");
            WorkflowError::InvalidIdentityToken(e.to_string())
        })?;

        let default_list = self
            .resolve_default_list(&identity.email, bundle.access_token.expose_secret())
            .await?;

        let mut tokens = SessionTokens::default();
        tokens.insert(self.primary.provider(), bundle);
        let session_id = self.sessions.create(identity, tokens)?;

        if let Some(list) = default_list {
            self.sessions.attach_default_list(&session_id, list.id)?;
        }

        Ok(session_id)
    }

    /// Use the user's first existing list, or create one when they have none.
    async fn resolve_default_list(
        &self,
        email: &str,
        access_token: &str,
    ) -> Result<Option<TaskList>, WorkflowError> {
        let lists = self
            .tasks
            .list_task_lists(access_token)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to list task lists");
                WorkflowError::from(e)
            })?;

        if let Some(existing) = lists.into_iter().next() {
            tracing::debug!(list_id = %existing.id, "Using existing task list as default");
            return Ok(Some(existing));
        }

        // New sessions start as free; gate the creation on that role.
        let decision = self
            .gate
            .enforce(Role::Free, DEFAULT_LIST_RESOURCE, CREATE_ACTION)
            .await;
        if !decision.allow {
            tracing::warn!(email, "Default list creation denied; session will have none");
            return Ok(None);
        }

        let title = self.default_list_title.replace("{email}", email);
        let created = self
            .tasks
            .create_task_list(access_token, &title)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to create default task list");
                WorkflowError::from(e)
            })?;

        tracing::info!(list_id = %created.id, "Default task list created");
        Ok(Some(created))
    }

    /// Finish the secondary flow for an existing session and elevate it.
    pub async fn complete_secondary(
        &self,
        session_id: Option<&SessionId>,
        params: &CallbackParams,
    ) -> Result<Role, WorkflowError> {
        let session_id = match session_id {
            Some(id) if self.sessions.get(id).is_some() => id,
            _ => {
                tracing::warn!(
                    provider = %self.secondary.provider(),
                    "Elevation attempted without a primary session"
                );
                return Err(WorkflowError::SessionNotFound);
            }
        };

        let bundle = self.secondary.exchange(params).await?;
        self.sessions
            .elevate(session_id, self.secondary.provider(), bundle)
    }
}
