//! Task backend boundary: a REST client and an in-memory stand-in.

use crate::error::TaskApiError;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};
use url::Url;

pub type TaskId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub pomodoro_count: u32,
}

#[async_trait]
pub trait TaskApi: Send + Sync {
    async fn list_tasks(&self) -> Result<Vec<Task>, TaskApiError>;

    async fn create_task(&self, text: &str) -> Result<Task, TaskApiError>;

    async fn delete_task(&self, id: TaskId) -> Result<(), TaskApiError>;

    /// Called once per completed focus phase for the selected task.
    async fn increment_pomodoro_count(&self, id: TaskId) -> Result<Task, TaskApiError>;
}

fn normalized_text(text: &str) -> Result<&str, TaskApiError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(TaskApiError::EmptyText);
    }
    Ok(text)
}

#[derive(Debug, Clone)]
pub struct HttpTaskApi {
    client: Client,
    base: Url,
    token: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateTaskRequest<'a> {
    text: &'a str,
}

impl HttpTaskApi {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, TaskApiError> {
        let base = Url::parse(base_url).map_err(|error| TaskApiError::Url(format!("{base_url}: {error}")))?;
        if base.cannot_be_a_base() {
            return Err(TaskApiError::Url(format!("{base_url} cannot be a base")));
        }
        Ok(Self {
            client: Client::new(),
            base,
            token: token.filter(|token| !token.trim().is_empty()),
        })
    }

    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url, TaskApiError> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| TaskApiError::Url("task api URL cannot be a base".to_string()))?;
            path.pop_if_empty();
            path.extend(segments);
        }
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, action: &str) -> Result<String, TaskApiError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|error| TaskApiError::Network(format!("{action}: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| TaskApiError::Network(format!("{action}: failed reading response: {error}")))?;

        if !status.is_success() {
            return Err(TaskApiError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        action: &str,
    ) -> Result<T, TaskApiError> {
        let body = self.send(request, action).await?;
        serde_json::from_str(&body)
            .map_err(|error| TaskApiError::Payload(format!("{action}: {error}; body={body}")))
    }
}

#[async_trait]
impl TaskApi for HttpTaskApi {
    async fn list_tasks(&self) -> Result<Vec<Task>, TaskApiError> {
        let url = self.endpoint(&["tasks"])?;
        self.send_json(self.client.get(url), "list tasks").await
    }

    async fn create_task(&self, text: &str) -> Result<Task, TaskApiError> {
        let text = normalized_text(text)?;
        let url = self.endpoint(&["tasks"])?;
        let request = self.client.post(url).json(&CreateTaskRequest { text });
        self.send_json(request, "create task").await
    }

    async fn delete_task(&self, id: TaskId) -> Result<(), TaskApiError> {
        let id = id.to_string();
        let url = self.endpoint(&["tasks", &id])?;
        self.send(self.client.delete(url), "delete task").await?;
        Ok(())
    }

    async fn increment_pomodoro_count(&self, id: TaskId) -> Result<Task, TaskApiError> {
        let id = id.to_string();
        let url = self.endpoint(&["tasks", &id, "pomodoro"])?;
        self.send_json(self.client.post(url), "increment pomodoro count")
            .await
    }
}

/// Task store used when no backend is configured.
#[derive(Debug, Default)]
pub struct InMemoryTaskApi {
    state: Mutex<InMemoryTasks>,
}

#[derive(Debug, Default)]
struct InMemoryTasks {
    tasks: Vec<Task>,
    next_id: TaskId,
}

impl InMemoryTaskApi {
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let next_id = tasks.iter().map(|task| task.id).max().unwrap_or(0);
        Self {
            state: Mutex::new(InMemoryTasks { tasks, next_id }),
        }
    }
}

#[async_trait]
impl TaskApi for InMemoryTaskApi {
    async fn list_tasks(&self) -> Result<Vec<Task>, TaskApiError> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(state.tasks.clone())
    }

    async fn create_task(&self, text: &str) -> Result<Task, TaskApiError> {
        let text = normalized_text(text)?;
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.next_id += 1;
        let task = Task {
            id: state.next_id,
            text: text.to_string(),
            completed: false,
            pomodoro_count: 0,
        };
        state.tasks.push(task.clone());
        Ok(task)
    }

    async fn delete_task(&self, id: TaskId) -> Result<(), TaskApiError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let before = state.tasks.len();
        state.tasks.retain(|task| task.id != id);
        if state.tasks.len() == before {
            return Err(TaskApiError::NotFound(id));
        }
        Ok(())
    }

    async fn increment_pomodoro_count(&self, id: TaskId) -> Result<Task, TaskApiError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let task = state
            .tasks
            .iter_mut()
            .find(|task| task.id == id)
            .ok_or(TaskApiError::NotFound(id))?;
        task.pomodoro_count += 1;
        Ok(task.clone())
    }
}
