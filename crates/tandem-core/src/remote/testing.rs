//! In-memory remote used by tests

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::error::{RemoteError, RemoteResult};
use super::TodoRemote;
use crate::models::Todo;

/// A mutation as received by [`FakeRemote`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Create { name: String, done: bool },
    Update { id: String, done: bool },
    Delete { id: String },
}

/// Remote backed by a vector, recording every mutation
#[derive(Default)]
pub struct FakeRemote {
    todos: Mutex<Vec<Todo>>,
    mutations: Mutex<Vec<Mutation>>,
    list_calls: AtomicUsize,
    next_id: AtomicU64,
    failing: AtomicBool,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_todos(todos: Vec<Todo>) -> Self {
        let fake = Self::new();
        *fake.todos.lock().unwrap() = todos;
        fake
    }

    /// Make every call fail with a transport-like error
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn todos(&self) -> Vec<Todo> {
        self.todos.lock().unwrap().clone()
    }

    pub fn mutations(&self) -> Vec<Mutation> {
        self.mutations.lock().unwrap().clone()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> RemoteResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(RemoteError::Status {
                status: 503,
                body: "unavailable".to_string(),
            })
        } else {
            Ok(())
        }
    }

    fn record(&self, mutation: Mutation) {
        self.mutations.lock().unwrap().push(mutation);
    }
}

#[async_trait]
impl TodoRemote for FakeRemote {
    async fn list_todos(&self) -> RemoteResult<Vec<Todo>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.todos())
    }

    async fn create_todo(&self, name: &str, done: bool) -> RemoteResult<Todo> {
        self.check()?;
        self.record(Mutation::Create {
            name: name.to_string(),
            done,
        });
        let id = format!("srv-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let todo = Todo::new(id, name, done);
        self.todos.lock().unwrap().push(todo.clone());
        Ok(todo)
    }

    async fn update_todo(&self, id: &str, done: bool) -> RemoteResult<String> {
        self.check()?;
        self.record(Mutation::Update {
            id: id.to_string(),
            done,
        });
        let mut todos = self.todos.lock().unwrap();
        match todos.iter_mut().find(|t| t.id == id) {
            Some(todo) => {
                todo.done = done;
                Ok(id.to_string())
            }
            None => Err(RemoteError::GraphQl(vec![format!(
                "The conditional request failed for {}",
                id
            )])),
        }
    }

    async fn delete_todo(&self, id: &str) -> RemoteResult<String> {
        self.check()?;
        self.record(Mutation::Delete { id: id.to_string() });
        let mut todos = self.todos.lock().unwrap();
        let before = todos.len();
        todos.retain(|t| t.id != id);
        if todos.len() == before {
            return Err(RemoteError::GraphQl(vec![format!(
                "The conditional request failed for {}",
                id
            )]));
        }
        Ok(id.to_string())
    }
}
