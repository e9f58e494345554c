//! Project-tracking provider: milestones of one configured repository.

use async_trait::async_trait;
use reqwest::Client;
use service_core::observability::TracedClientExt;

use super::upstream::{join_url, observe, read_json, UpstreamError};
use crate::config::MilestonesSettings;
use crate::models::Milestone;

const GITHUB_ACCEPT: &str = "application/vnd.github+json";

#[async_trait]
pub trait MilestoneSource: Send + Sync {
    /// Milestones in the order the provider returns them.
    async fn list_milestones(&self, token: Option<&str>) -> Result<Vec<Milestone>, UpstreamError>;

    async fn get_milestone(
        &self,
        number: u64,
        token: Option<&str>,
    ) -> Result<Milestone, UpstreamError>;
}

/// GitHub REST milestones for `owner/repo`.
pub struct GithubMilestones {
    client: Client,
    settings: MilestonesSettings,
}

impl GithubMilestones {
    pub fn new(client: Client, settings: MilestonesSettings) -> Self {
        Self { client, settings }
    }

    async fn fetch<T: serde::de::DeserializeOwned>(
        &self,
        segments: &[&str],
        token: Option<&str>,
    ) -> Result<T, UpstreamError> {
        let url = join_url(&self.settings.api_base_url, segments)?;

        let mut request = self
            .client
            .traced_get(url.as_str())
            .header("Accept", GITHUB_ACCEPT);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(url = %url, error = %e, "Milestone request failed");
                return observe("github", Err(UpstreamError::from(e)));
            }
        };

        observe("github", read_json(response).await)
    }
}

#[async_trait]
impl MilestoneSource for GithubMilestones {
    async fn list_milestones(&self, token: Option<&str>) -> Result<Vec<Milestone>, UpstreamError> {
        self.fetch(
            &[
                "repos",
                self.settings.owner.as_str(),
                self.settings.repo.as_str(),
                "milestones",
            ],
            token,
        )
        .await
    }

    async fn get_milestone(
        &self,
        number: u64,
        token: Option<&str>,
    ) -> Result<Milestone, UpstreamError> {
        let number = number.to_string();
        self.fetch(
            &[
                "repos",
                self.settings.owner.as_str(),
                self.settings.repo.as_str(),
                "milestones",
                number.as_str(),
            ],
            token,
        )
        .await
    }
}
