//! Task-list provider: lists and tasks owned by the signed-in user.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use service_core::observability::TracedClientExt;

use super::upstream::{join_url, observe, read_json, UpstreamError};
use crate::config::TasksSettings;
use crate::models::{Task, TaskList};

#[async_trait]
pub trait TaskListProvider: Send + Sync {
    async fn list_task_lists(&self, token: &str) -> Result<Vec<TaskList>, UpstreamError>;

    async fn create_task_list(&self, token: &str, title: &str) -> Result<TaskList, UpstreamError>;

    async fn create_task(
        &self,
        token: &str,
        list_id: &str,
        title: &str,
    ) -> Result<Task, UpstreamError>;
}

#[derive(Debug, Deserialize)]
struct TaskListsPage {
    #[serde(default)]
    items: Vec<TaskList>,
}

#[derive(Debug, Serialize)]
struct TitleBody<'a> {
    title: &'a str,
}

/// Google Tasks REST API (`/users/@me/lists`, `/lists/{id}/tasks`).
pub struct GoogleTasks {
    client: Client,
    settings: TasksSettings,
}

impl GoogleTasks {
    pub fn new(client: Client, settings: TasksSettings) -> Self {
        Self { client, settings }
    }

    async fn post_title<T: serde::de::DeserializeOwned>(
        &self,
        segments: &[&str],
        token: &str,
        title: &str,
    ) -> Result<T, UpstreamError> {
        let url = join_url(&self.settings.api_base_url, segments)?;

        let response = self
            .client
            .traced_post(url.as_str())
            .bearer_auth(token)
            .json(&TitleBody { title })
            .send()
            .await;

        match response {
            Ok(response) => observe("google_tasks", read_json(response).await),
            Err(e) => {
                tracing::error!(url = %url, error = %e, "Task provider request failed");
                observe("google_tasks", Err(UpstreamError::from(e)))
            }
        }
    }
}

#[async_trait]
impl TaskListProvider for GoogleTasks {
    async fn list_task_lists(&self, token: &str) -> Result<Vec<TaskList>, UpstreamError> {
        let url = join_url(&self.settings.api_base_url, &["users", "@me", "lists"])?;

        let response = self
            .client
            .traced_get(url.as_str())
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(url = %url, error = %e, "Task list request failed");
                UpstreamError::from(e)
            });

        let page: TaskListsPage = match response {
            Ok(response) => observe("google_tasks", read_json(response).await)?,
            Err(e) => return observe("google_tasks", Err(e)),
        };
        Ok(page.items)
    }

    async fn create_task_list(&self, token: &str, title: &str) -> Result<TaskList, UpstreamError> {
        self.post_title(&["users", "@me", "lists"], token, title)
            .await
    }

    async fn create_task(
        &self,
        token: &str,
        list_id: &str,
        title: &str,
    ) -> Result<Task, UpstreamError> {
        self.post_title(&["lists", list_id, "tasks"], token, title)
            .await
    }
}
