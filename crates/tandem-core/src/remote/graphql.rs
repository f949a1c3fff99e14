//! GraphQL transport
//!
//! Speaks the four operations of the todo API over HTTP POST with a JSON
//! body and a static `x-api-key` header.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::error::{RemoteError, RemoteResult};
use super::TodoRemote;
use crate::config::Config;
use crate::models::Todo;
use crate::storage::todo_from_document;

pub const LIST_TODOS: &str = r#"query listTodos {
  listTodos {
    items {
      id
      name
      done
    }
  }
}"#;

pub const CREATE_TODO: &str = r#"mutation createTodo($createtodoinput: CreateTodoInput!) {
  createTodo(input: $createtodoinput) {
    id
    name
    done
  }
}"#;

pub const UPDATE_TODO: &str = r#"mutation updateToDo($updatetodoinput: UpdateTodoInput!) {
  updateTodo(input: $updatetodoinput) {
    id
  }
}"#;

pub const DELETE_TODO: &str = r#"mutation deleteToDo($deletetodoinput: DeleteTodoInput!) {
  deleteTodo(input: $deletetodoinput) {
    id
  }
}"#;

#[derive(Serialize)]
struct Request<'a> {
    query: &'a str,
    #[serde(rename = "operationName")]
    operation_name: &'a str,
    variables: Value,
}

#[derive(Deserialize)]
struct Response<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<ErrorMessage>,
}

#[derive(Deserialize)]
struct ErrorMessage {
    message: String,
}

#[derive(Deserialize)]
struct ListTodosData {
    #[serde(rename = "listTodos")]
    list_todos: Option<ItemList>,
}

#[derive(Deserialize)]
struct ItemList {
    #[serde(default)]
    items: Vec<Value>,
}

#[derive(Deserialize)]
struct CreateTodoData {
    #[serde(rename = "createTodo")]
    create_todo: Option<Value>,
}

#[derive(Deserialize)]
struct UpdateTodoData {
    #[serde(rename = "updateTodo")]
    update_todo: Option<IdOnly>,
}

#[derive(Deserialize)]
struct DeleteTodoData {
    #[serde(rename = "deleteTodo")]
    delete_todo: Option<IdOnly>,
}

#[derive(Deserialize)]
struct IdOnly {
    id: String,
}

/// HTTP client for the todo GraphQL API
#[derive(Debug, Clone)]
pub struct GraphqlRemote {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl GraphqlRemote {
    /// Create a transport for `endpoint`
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> RemoteResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("tandem/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            api_key,
        })
    }

    /// Create a transport from the configured endpoint and key
    pub fn from_config(config: &Config) -> RemoteResult<Self> {
        let endpoint = config.endpoint.clone().ok_or(RemoteError::NotConfigured)?;
        Self::new(endpoint, config.api_key.clone(), config.request_timeout())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        query: &str,
        operation_name: &str,
        variables: Value,
    ) -> RemoteResult<T> {
        debug!("GraphQL {} -> {}", operation_name, self.endpoint);

        let body = Request {
            query,
            operation_name,
            variables,
        };
        let mut request = self.http.post(&self.endpoint).json(&body);
        if let Some(ref key) = self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: Response<T> = response
            .json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))?;

        if !envelope.errors.is_empty() {
            return Err(RemoteError::GraphQl(
                envelope.errors.into_iter().map(|e| e.message).collect(),
            ));
        }

        envelope
            .data
            .ok_or_else(|| RemoteError::Decode(format!("{} returned no data", operation_name)))
    }
}

#[async_trait]
impl TodoRemote for GraphqlRemote {
    async fn list_todos(&self) -> RemoteResult<Vec<Todo>> {
        let data: ListTodosData = self.execute(LIST_TODOS, "listTodos", json!({})).await?;
        let items = data.list_todos.map(|list| list.items).unwrap_or_default();

        let mut todos = Vec::with_capacity(items.len());
        for item in &items {
            match todo_from_document(item) {
                Ok(todo) => todos.push(todo),
                Err(e) => warn!("Skipping remote item that fails validation: {}", e),
            }
        }
        Ok(todos)
    }

    async fn create_todo(&self, name: &str, done: bool) -> RemoteResult<Todo> {
        let data: CreateTodoData = self
            .execute(
                CREATE_TODO,
                "createTodo",
                json!({ "createtodoinput": { "name": name, "done": done } }),
            )
            .await?;
        let item = data
            .create_todo
            .ok_or_else(|| RemoteError::Decode("createTodo returned null".to_string()))?;
        todo_from_document(&item).map_err(|e| RemoteError::Decode(e.to_string()))
    }

    async fn update_todo(&self, id: &str, done: bool) -> RemoteResult<String> {
        let data: UpdateTodoData = self
            .execute(
                UPDATE_TODO,
                "updateToDo",
                json!({ "updatetodoinput": { "id": id, "done": done } }),
            )
            .await?;
        data.update_todo
            .map(|item| item.id)
            .ok_or_else(|| RemoteError::Decode(format!("updateTodo returned null for {}", id)))
    }

    async fn delete_todo(&self, id: &str) -> RemoteResult<String> {
        let data: DeleteTodoData = self
            .execute(
                DELETE_TODO,
                "deleteToDo",
                json!({ "deletetodoinput": { "id": id } }),
            )
            .await?;
        data.delete_todo
            .map(|item| item.id)
            .ok_or_else(|| RemoteError::Decode(format!("deleteTodo returned null for {}", id)))
    }
}
