use secrecy::Secret;
use serde::Deserialize;
use service_core::error::AppError;

#[derive(Deserialize, Clone, Debug)]
pub struct Settings {
    pub server: ServerSettings,
    /// Primary identity provider (creates sessions).
    pub google: OAuthProviderSettings,
    /// Secondary elevation provider (upgrades existing sessions).
    pub github: OAuthProviderSettings,
    pub tasks: TasksSettings,
    pub milestones: MilestonesSettings,
    #[serde(default)]
    pub upstream: UpstreamSettings,
    pub policy: PolicySettings,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Browser-facing base URL, used to build OAuth redirect URIs.
    pub public_url: String,
    /// Set the `Secure` attribute on the session cookie (HTTPS deployments).
    #[serde(default)]
    pub secure_cookies: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// How the token endpoint expects the authorization-code exchange body.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenRequestEncoding {
    Form,
    Json,
}

#[derive(Deserialize, Clone, Debug)]
pub struct OAuthProviderSettings {
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub authorize_url: String,
    pub token_url: String,
    pub scopes: Vec<String>,
    /// Callback path on this service, appended to `server.public_url`.
    pub redirect_path: String,
    pub token_request: TokenRequestEncoding,
}

#[derive(Deserialize, Clone, Debug)]
pub struct TasksSettings {
    pub api_base_url: String,
    /// Title of the list created when a user has none; `{email}` is substituted.
    #[serde(default = "default_list_title")]
    pub default_list_title: String,
}

fn default_list_title() -> String {
    "Tasks for {email}".to_string()
}

#[derive(Deserialize, Clone, Debug)]
pub struct MilestonesSettings {
    pub api_base_url: String,
    pub owner: String,
    pub repo: String,
    /// Send the session's GitHub token when listing milestones (private repos).
    #[serde(default)]
    pub send_credentials: bool,
}

#[derive(Deserialize, Clone, Debug)]
pub struct UpstreamSettings {
    pub timeout_secs: u64,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct PolicySettings {
    pub rules: Vec<PolicyRule>,
    #[serde(default)]
    pub inherits: Vec<RoleInheritance>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct PolicyRule {
    pub role: String,
    pub resource: String,
    pub action: String,
}

/// `role` is granted everything `parent` is granted.
#[derive(Deserialize, Clone, Debug)]
pub struct RoleInheritance {
    pub role: String,
    pub parent: String,
}

/// Settings that take space-separated lists when overridden from the environment.
const LIST_KEYS: &[&str] = &["google.scopes", "github.scopes"];

pub fn get_configuration() -> Result<Settings, AppError> {
    let base_path = std::env::current_dir()?;

    // Running from the crate directory or from the workspace root
    let configuration_directory = if base_path.ends_with("task-bridge") {
        base_path.join("config")
    } else {
        base_path.join("task-bridge").join("config")
    };

    service_core::config::load_layered(&configuration_directory, LIST_KEYS)
}
