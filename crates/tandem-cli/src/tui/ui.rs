//! UI rendering

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
    Frame,
};

use super::app::{ActiveList, App, InputMode};

/// Main UI rendering function
pub fn draw(frame: &mut Frame, app: &App) {
    // Banner, lists, status bar
    let outer_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(frame.area());

    draw_banner(frame, app, outer_chunks[0]);

    let list_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(outer_chunks[1]);

    draw_remote_list(frame, app, list_chunks[0]);
    draw_local_list(frame, app, list_chunks[1]);

    match app.input_mode {
        InputMode::Normal => draw_status_bar(frame, app, outer_chunks[2]),
        InputMode::Adding => draw_add_input(frame, app, outer_chunks[2]),
    }

    if app.show_help {
        draw_help_overlay(frame);
    }
}

/// Top line: connectivity, refetch indicator, query error
fn draw_banner(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![if app.online {
        Span::styled("● online", Style::default().fg(Color::Green))
    } else {
        Span::styled("○ offline", Style::default().fg(Color::DarkGray))
    }];

    if app.is_refetching() {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            "Refetching…",
            Style::default().fg(Color::Yellow),
        ));
    }

    if app.has_query_error() {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!(
                "Error: {}",
                app.query_error.as_deref().unwrap_or("query failed")
            ),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_remote_list(frame: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .remote
        .iter()
        .map(|todo| todo_item(todo.done, &todo.name, false))
        .collect();

    let title = format!(
        " Remote ({}) is {} ",
        app.remote.len(),
        if app.online { "online" } else { "offline" }
    );
    render_list(
        frame,
        area,
        items,
        title,
        app.active_list == ActiveList::Remote,
        app.remote_index,
    );
}

fn draw_local_list(frame: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .local
        .iter()
        .map(|local| todo_item(local.todo.done, &local.todo.name, local.is_pending()))
        .collect();

    let pending = app.pending_count();
    let title = if pending > 0 {
        format!(" Local ({}, {} unpushed) ", app.local.len(), pending)
    } else {
        format!(" Local ({}) ", app.local.len())
    };
    render_list(
        frame,
        area,
        items,
        title,
        app.active_list == ActiveList::Local,
        app.local_index,
    );
}

fn todo_item(done: bool, name: &str, pending: bool) -> ListItem<'static> {
    let mut spans = vec![
        Span::raw(if done { "[x] " } else { "[ ] " }),
        Span::styled(
            name.to_string(),
            if done {
                Style::default().add_modifier(Modifier::CROSSED_OUT | Modifier::DIM)
            } else {
                Style::default()
            },
        ),
    ];
    if pending {
        spans.push(Span::styled(" *", Style::default().fg(Color::Yellow)));
    }
    ListItem::new(Line::from(spans))
}

fn render_list(
    frame: &mut Frame,
    area: Rect,
    items: Vec<ListItem>,
    title: String,
    is_active: bool,
    selected: usize,
) {
    let is_empty = items.is_empty();

    let border_style = if is_active {
        Style::default().add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(border_style);

    let highlight_style = if is_active {
        Style::default()
            .add_modifier(Modifier::BOLD)
            .add_modifier(Modifier::REVERSED)
    } else {
        Style::default().add_modifier(Modifier::DIM)
    };

    let list = List::new(items)
        .block(block)
        .highlight_style(highlight_style);

    let mut state = ListState::default();
    if !is_empty {
        state.select(Some(selected));
    }

    frame.render_stateful_widget(list, area, &mut state);
}

/// Draw the status bar at the bottom
fn draw_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let content = if let Some(msg) = &app.status_message {
        msg.clone()
    } else {
        "a:add  space:toggle  d:del  o:online/offline  r:refetch  tab:switch  ?:help  q:quit"
            .to_string()
    };

    let paragraph = Paragraph::new(content).style(Style::default().add_modifier(Modifier::DIM));
    frame.render_widget(paragraph, area);
}

/// Draw the new-todo input line
fn draw_add_input(frame: &mut Frame, app: &App, area: Rect) {
    let prefix = "New todo: ";

    let line = Line::from(vec![
        Span::styled(prefix, Style::default().fg(Color::Yellow)),
        Span::raw(app.input.as_str()),
    ]);

    frame.render_widget(Paragraph::new(line), area);

    let cursor_x = area.x + prefix.len() as u16 + app.cursor as u16;
    frame.set_cursor_position((cursor_x, area.y));
}

/// Draw help overlay
fn draw_help_overlay(frame: &mut Frame) {
    let area = frame.area();

    let popup_width = 50.min(area.width.saturating_sub(4));
    let popup_height = 18.min(area.height.saturating_sub(4));
    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;
    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    frame.render_widget(Clear, popup_area);

    let help_text = vec![
        Line::from(vec![Span::styled(
            "Keyboard Shortcuts",
            Style::default().add_modifier(Modifier::BOLD),
        )]),
        Line::from(""),
        Line::from("Navigation:"),
        Line::from("  j/k, ↑/↓    Move up/down"),
        Line::from("  Tab         Switch between Remote and Local"),
        Line::from(""),
        Line::from("Todos:"),
        Line::from("  a           Add todo"),
        Line::from("  space, x    Toggle done"),
        Line::from("  d           Delete todo"),
        Line::from(""),
        Line::from("  o           Go online / offline"),
        Line::from("  r           Refetch remote list"),
        Line::from("  q           Quit"),
        Line::from(""),
        Line::from(vec![Span::styled(
            "Press any key to close",
            Style::default().add_modifier(Modifier::DIM),
        )]),
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_style(Style::default().add_modifier(Modifier::BOLD));

    frame.render_widget(Paragraph::new(help_text).block(block), popup_area);
}
