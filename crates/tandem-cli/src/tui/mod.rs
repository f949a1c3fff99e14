//! Tandem TUI
//!
//! Terminal user interface showing the remote and local todo lists side
//! by side.
//!
//! ## Layout
//!
//! - Top: connectivity, "Refetching…" while a poll is in flight, and the
//!   error banner when the remote query fails
//! - Left: Remote list (query cache)
//! - Right: Local list (local store, `*` marks unpushed records)
//!
//! ## Keys
//!
//! - j/k or ↑/↓: Move selection up/down
//! - Tab: Switch list
//! - a: Add todo
//! - space/x: Toggle done
//! - d: Delete todo
//! - o: Flip online/offline
//! - r: Refetch now
//! - ?: Help
//! - q: Quit

mod app;
mod ui;

use std::fs::File;
use std::io::stdout;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::prelude::*;
use tandem_core::remote::PollerHandle;
use tandem_core::{Config, Intent, Session, SyncEngine};
use tokio::sync::{broadcast, oneshot};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use app::{App, InputMode};

/// Run the TUI application
pub async fn run(config: Config) -> Result<()> {
    // Initialize TUI logging (file-based, only if TANDEM_LOG is set)
    init_tui_logging(&config);

    let session = Session::open(config).await?;
    let engine = session.engine().clone();

    // Background reconciliation and polling
    let (stop_engine, engine_shutdown) = oneshot::channel();
    let engine_task = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.run(engine_shutdown).await })
    };
    let poller = session.spawn_poller();

    // Initial load pushes edits left from earlier sessions before pulling
    if engine.connectivity().is_online() {
        dispatch(&engine, Intent::Sync);
    }

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut app = App::new(engine.connectivity().is_online());
    app.update_query(engine.remote().state());
    if let Err(e) = reload_local(&mut app, &engine).await {
        app.set_status(format!("Failed to read local todos: {}", e));
    }

    let result = run_app(&mut terminal, &mut app, &engine, poller.as_ref()).await;

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    if let Some(poller) = poller {
        poller.shutdown().await;
    }
    let _ = stop_engine.send(());
    let _ = engine_task.await;
    info!("TUI exited");

    result
}

async fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    engine: &SyncEngine,
    poller: Option<&PollerHandle>,
) -> Result<()> {
    let mut query_rx = engine.remote().subscribe();
    let mut online_rx = engine.connectivity().subscribe();
    let mut changes = engine.store().subscribe();

    loop {
        app.check_status_timeout();

        terminal.draw(|frame| ui::draw(frame, app))?;

        tokio::select! {
            biased;

            // Remote query state (data, Refetching, errors)
            Ok(()) = query_rx.changed() => {
                let state = query_rx.borrow_and_update().clone();
                app.update_query(state);
            }

            // Connectivity transitions
            Ok(()) = online_rx.changed() => {
                app.online = *online_rx.borrow_and_update();
            }

            // Any local write, whoever made it
            event = changes.recv() => {
                if let Err(broadcast::error::RecvError::Closed) = event {
                    break;
                }
                if let Err(e) = reload_local(app, engine).await {
                    app.set_status(format!("Failed to read local todos: {}", e));
                }
            }

            // Poll for terminal events
            _ = tokio::time::sleep(Duration::from_millis(50)) => {
                if event::poll(Duration::from_millis(0))? {
                    if let Event::Key(key) = event::read()? {
                        // Only handle key press events (not release)
                        if key.kind != KeyEventKind::Press {
                            continue;
                        }

                        // If help is showing, any key dismisses it
                        if app.show_help {
                            app.show_help = false;
                            continue;
                        }

                        match app.input_mode {
                            InputMode::Normal => {
                                handle_normal_mode(app, engine, poller, key.code, key.modifiers).await
                            }
                            InputMode::Adding => handle_adding_mode(app, engine, key.code),
                        }
                    }
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

/// Handle key events in normal mode
async fn handle_normal_mode(
    app: &mut App,
    engine: &SyncEngine,
    poller: Option<&PollerHandle>,
    code: KeyCode,
    modifiers: KeyModifiers,
) {
    // Clear status message on navigation keys
    if matches!(
        code,
        KeyCode::Char('j') | KeyCode::Char('k') | KeyCode::Up | KeyCode::Down | KeyCode::Tab
    ) {
        app.status_message = None;
    }

    match code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
            app.should_quit = true;
        }

        KeyCode::Char('k') | KeyCode::Up => app.move_up(),
        KeyCode::Char('j') | KeyCode::Down => app.move_down(),
        KeyCode::Tab | KeyCode::BackTab => app.switch_list(),

        KeyCode::Char('a') => app.enter_add_mode(),

        KeyCode::Char(' ') | KeyCode::Char('x') => {
            if let Some(todo) = app.selected() {
                let id = todo.id.clone();
                app.set_status(format!("Toggling {}", id));
                dispatch(engine, Intent::Toggle(id));
            }
        }

        KeyCode::Char('d') => {
            if let Some(todo) = app.selected() {
                let id = todo.id.clone();
                app.set_status(format!("Deleted {}", id));
                dispatch(engine, Intent::Delete(id));
            }
        }

        KeyCode::Char('o') => {
            let online = engine.connectivity().toggle();
            app.set_status(if online { "Online" } else { "Offline" });
        }

        KeyCode::Char('r') => match poller {
            Some(poller) if engine.connectivity().is_online() => poller.poll_now().await,
            _ if engine.connectivity().is_online() => {
                let client = engine.remote().clone();
                tokio::spawn(async move {
                    let _ = client.refetch().await;
                });
            }
            _ => app.set_status("Offline, nothing to refetch"),
        },

        KeyCode::Char('?') => app.toggle_help(),

        _ => {}
    }
}

/// Handle key events while typing a new todo
fn handle_adding_mode(app: &mut App, engine: &SyncEngine, code: KeyCode) {
    match code {
        KeyCode::Esc => app.exit_input_mode(),
        KeyCode::Enter => {
            if let Some(name) = app.submit_input() {
                dispatch(engine, Intent::Add(name));
            }
        }
        KeyCode::Backspace => app.delete_char(),
        KeyCode::Left => app.cursor_left(),
        KeyCode::Right => app.cursor_right(),
        KeyCode::Char(c) => app.insert_char(c),
        _ => {}
    }
}

/// Run a user action in the background so the UI keeps drawing
fn dispatch(engine: &SyncEngine, intent: Intent) {
    let engine = engine.clone();
    tokio::spawn(async move { engine.dispatch(intent).await });
}

async fn reload_local(app: &mut App, engine: &SyncEngine) -> Result<()> {
    let local = engine.store().find_local().await?;
    app.set_local(local);
    Ok(())
}

/// Initialize logging for TUI mode
///
/// Only initializes if TANDEM_LOG environment variable is set.
/// Logs to file (config.log_file or default {data_dir}/debug.log).
fn init_tui_logging(config: &Config) {
    let Ok(log_level) = std::env::var("TANDEM_LOG") else {
        return;
    };

    let log_path = config.log_path();
    if let Err(e) = config.ensure_data_dir() {
        eprintln!("Warning: {}", e);
    }

    let log_file = match File::create(&log_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not create log file {:?}: {}", log_path, e);
            return;
        }
    };

    let env_filter = EnvFilter::new(format!(
        "tandem_core={},tandem_cli={}",
        log_level, log_level
    ));

    // Ignore error if already initialized
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(log_file)
        .try_init();

    info!("TUI logging initialized to {:?}", log_path);
    if config.endpoint.is_none() {
        warn!("No endpoint configured; the Remote list stays empty");
    }
}
