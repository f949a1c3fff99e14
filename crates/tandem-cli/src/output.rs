//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use tandem_core::{LocalTodo, SyncReport, Todo};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Print a single todo
    pub fn print_todo(&self, todo: &Todo) {
        match self.format {
            OutputFormat::Human => println!("{}", todo_line(todo)),
            OutputFormat::Json => println!("{}", to_json(todo)),
            OutputFormat::Quiet => println!("{}", todo.id),
        }
    }

    /// Print todos from the remote query cache
    pub fn print_todos(&self, todos: &[Todo]) {
        match self.format {
            OutputFormat::Human => {
                if todos.is_empty() {
                    println!("No todos found.");
                    return;
                }
                for todo in todos {
                    println!("{}", todo_line(todo));
                }
                println!("\n{} todo(s)", todos.len());
            }
            OutputFormat::Json => println!("{}", to_json(todos)),
            OutputFormat::Quiet => {
                for todo in todos {
                    println!("{}", todo.id);
                }
            }
        }
    }

    /// Print local todos with their sync state
    pub fn print_local_todos(&self, todos: &[LocalTodo]) {
        match self.format {
            OutputFormat::Human => {
                if todos.is_empty() {
                    println!("No todos found.");
                    return;
                }
                for local in todos {
                    let marker = if local.is_pending() { " *" } else { "" };
                    println!("{}{}", todo_line(&local.todo), marker);
                }
                let pending = todos.iter().filter(|t| t.is_pending()).count();
                if pending > 0 {
                    println!("\n{} todo(s), {} not yet pushed (*)", todos.len(), pending);
                } else {
                    println!("\n{} todo(s)", todos.len());
                }
            }
            OutputFormat::Json => println!("{}", to_json(todos)),
            OutputFormat::Quiet => {
                for local in todos {
                    println!("{}", local.todo.id);
                }
            }
        }
    }

    /// Print the result of a sync sweep
    pub fn print_report(&self, report: &SyncReport) {
        match self.format {
            OutputFormat::Human => println!("✓ Sync complete: {}", report),
            OutputFormat::Json => println!("{}", to_json(report)),
            OutputFormat::Quiet => {}
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

/// One-line rendering: checkbox, id, name
pub fn todo_line(todo: &Todo) -> String {
    format!(
        "[{}] {} | {}",
        if todo.done { "x" } else { " " },
        todo.id,
        truncate(&todo.name, 60)
    )
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}
