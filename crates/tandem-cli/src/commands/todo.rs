//! Todo command handlers

use anyhow::{bail, Context, Result};

use tandem_core::SyncEngine;

use crate::output::Output;

/// Add a todo
pub async fn add(engine: &SyncEngine, name: String, output: &Output) -> Result<()> {
    let online = engine.connectivity().is_online();
    let Some(todo) = engine
        .add_todo(&name)
        .await
        .context("Failed to add todo")?
    else {
        bail!("Todo name cannot be empty");
    };

    if output.is_quiet() || output.is_json() {
        output.print_todo(&todo);
    } else if online {
        output.success(&format!("Added {}", todo.id));
    } else {
        output.success(&format!("Added {} (offline, will be pushed later)", todo.id));
    }
    Ok(())
}

/// Flip a todo's completion flag
pub async fn toggle(engine: &SyncEngine, id: String, output: &Output) -> Result<()> {
    let todo = engine
        .toggle_todo(&id)
        .await
        .with_context(|| format!("Failed to toggle todo {}", id))?;

    if output.is_json() {
        output.print_todo(&todo);
    } else {
        output.success(&format!(
            "Marked {} as {}",
            todo.id,
            if todo.done { "done" } else { "not done" }
        ));
    }
    Ok(())
}

/// Delete a todo
pub async fn delete(engine: &SyncEngine, id: String, output: &Output) -> Result<()> {
    let todo = engine
        .delete_todo(&id)
        .await
        .with_context(|| format!("Failed to delete todo {}", id))?;

    if output.is_json() {
        output.print_todo(&todo);
    } else {
        output.success(&format!("Deleted {}", todo.id));
    }
    Ok(())
}

/// Which list `list` prints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListSource {
    Local,
    Remote,
}

/// List todos
pub async fn list(engine: &SyncEngine, source: ListSource, output: &Output) -> Result<()> {
    match source {
        ListSource::Local => {
            let todos = engine
                .store()
                .find_local()
                .await
                .context("Failed to read local todos")?;
            output.print_local_todos(&todos);
        }
        ListSource::Remote => {
            if !engine.connectivity().is_online() {
                bail!("Cannot list remote todos while offline");
            }
            let todos = engine
                .remote()
                .query()
                .await
                .context("Failed to fetch remote todos")?;
            output.print_todos(&todos);
        }
    }
    Ok(())
}
