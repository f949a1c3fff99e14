//! Application state and logic

use std::time::{Duration, Instant};

use tandem_core::{LocalTodo, NetworkStatus, QueryState, Todo};

/// How long a status message stays visible
const STATUS_TIMEOUT: Duration = Duration::from_secs(3);

/// Input mode for the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Normal navigation mode
    Normal,
    /// Typing the name of a new todo
    Adding,
}

/// Which list has focus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveList {
    Remote,
    Local,
}

impl ActiveList {
    pub fn other(self) -> Self {
        match self {
            ActiveList::Remote => ActiveList::Local,
            ActiveList::Local => ActiveList::Remote,
        }
    }
}

/// Application state
pub struct App {
    /// Whether the app should exit
    pub should_quit: bool,
    /// Current input mode
    pub input_mode: InputMode,
    /// Name being typed in `Adding` mode
    pub input: String,
    /// Cursor position in `input` (in chars)
    pub cursor: usize,
    /// Which list has focus
    pub active_list: ActiveList,
    /// Todos from the remote query cache
    pub remote: Vec<Todo>,
    /// Todos from the local store
    pub local: Vec<LocalTodo>,
    pub remote_index: usize,
    pub local_index: usize,
    /// Last reported connectivity
    pub online: bool,
    /// Status of the remote query
    pub query_status: NetworkStatus,
    /// Message of the last failed query
    pub query_error: Option<String>,
    /// Status message to display temporarily
    pub status_message: Option<String>,
    /// When the status message was set (for auto-dismiss)
    pub status_message_time: Option<Instant>,
    /// Whether help overlay is visible
    pub show_help: bool,
}

impl App {
    pub fn new(online: bool) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Normal,
            input: String::new(),
            cursor: 0,
            active_list: ActiveList::Local,
            remote: Vec::new(),
            local: Vec::new(),
            remote_index: 0,
            local_index: 0,
            online,
            query_status: NetworkStatus::Idle,
            query_error: None,
            status_message: None,
            status_message_time: None,
            show_help: false,
        }
    }

    // ==================== Data ====================

    /// Take a new query state from the remote client
    pub fn update_query(&mut self, state: QueryState) {
        self.query_status = state.status;
        self.query_error = state.error;
        if let Some(data) = state.data {
            self.remote = data;
            self.remote_index = clamp(self.remote_index, self.remote.len());
        }
    }

    /// Replace the local list
    pub fn set_local(&mut self, local: Vec<LocalTodo>) {
        self.local = local;
        self.local_index = clamp(self.local_index, self.local.len());
    }

    /// A poll or refetch is in flight over cached data
    pub fn is_refetching(&self) -> bool {
        self.query_status == NetworkStatus::Polling
    }

    /// The last remote query failed
    pub fn has_query_error(&self) -> bool {
        self.query_status == NetworkStatus::Error && self.query_error.is_some()
    }

    /// Number of local records not yet pushed
    pub fn pending_count(&self) -> usize {
        self.local.iter().filter(|t| t.is_pending()).count()
    }

    /// The todo selected in the focused list
    pub fn selected(&self) -> Option<&Todo> {
        match self.active_list {
            ActiveList::Remote => self.remote.get(self.remote_index),
            ActiveList::Local => self.local.get(self.local_index).map(|t| &t.todo),
        }
    }

    // ==================== Navigation ====================

    pub fn move_up(&mut self) {
        let index = self.active_index_mut();
        *index = index.saturating_sub(1);
    }

    pub fn move_down(&mut self) {
        let len = self.active_len();
        let index = self.active_index_mut();
        if *index + 1 < len {
            *index += 1;
        }
    }

    /// Move focus to the other list
    pub fn switch_list(&mut self) {
        self.active_list = self.active_list.other();
    }

    fn active_len(&self) -> usize {
        match self.active_list {
            ActiveList::Remote => self.remote.len(),
            ActiveList::Local => self.local.len(),
        }
    }

    fn active_index_mut(&mut self) -> &mut usize {
        match self.active_list {
            ActiveList::Remote => &mut self.remote_index,
            ActiveList::Local => &mut self.local_index,
        }
    }

    // ==================== Status ====================

    /// Set a status message (will auto-dismiss after 3 seconds)
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
        self.status_message_time = Some(Instant::now());
    }

    /// Check and clear expired status message
    pub fn check_status_timeout(&mut self) {
        if let Some(time) = self.status_message_time {
            if time.elapsed() > STATUS_TIMEOUT {
                self.status_message = None;
                self.status_message_time = None;
            }
        }
    }

    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    // ==================== Input ====================

    pub fn enter_add_mode(&mut self) {
        self.input_mode = InputMode::Adding;
        self.input.clear();
        self.cursor = 0;
    }

    pub fn exit_input_mode(&mut self) {
        self.input_mode = InputMode::Normal;
        self.input.clear();
        self.cursor = 0;
    }

    /// Finish `Adding` mode, returning the typed name if it is not blank
    pub fn submit_input(&mut self) -> Option<String> {
        let name = self.input.trim().to_string();
        self.exit_input_mode();
        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    }

    pub fn insert_char(&mut self, c: char) {
        let at = self.byte_offset(self.cursor);
        self.input.insert(at, c);
        self.cursor += 1;
    }

    /// Delete the character before the cursor
    pub fn delete_char(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let at = self.byte_offset(self.cursor - 1);
        self.input.remove(at);
        self.cursor -= 1;
    }

    pub fn cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        if self.cursor < self.input.chars().count() {
            self.cursor += 1;
        }
    }

    fn byte_offset(&self, char_index: usize) -> usize {
        self.input
            .char_indices()
            .nth(char_index)
            .map(|(i, _)| i)
            .unwrap_or(self.input.len())
    }
}

fn clamp(index: usize, len: usize) -> usize {
    if len == 0 {
        0
    } else {
        index.min(len - 1)
    }
}
