//! UI rendering

use bitdesk_core::bridge::SaveStatus;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame,
};

use super::app::{App, Screen};

/// Main UI rendering function
pub fn draw(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(frame.area());

    draw_header(frame, app, chunks[0]);

    match app.screen() {
        Screen::Loading(message) => draw_loading(frame, message, chunks[1]),
        Screen::Error(error) => draw_error(frame, error, chunks[1]),
        Screen::Ready => draw_ready(frame, app, chunks[1]),
    }

    draw_toolbar(frame, app, chunks[2]);

    if app.show_help {
        draw_help_overlay(frame);
    }
}

/// Project name, id badge and save indicator
fn draw_header(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default().borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(10), Constraint::Length(12)])
        .split(inner);

    let title = Line::from(vec![
        Span::styled(
            app.target.name.as_str(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(
            app.id_badge(),
            Style::default().add_modifier(Modifier::DIM),
        ),
    ]);
    frame.render_widget(Paragraph::new(title), columns[0]);

    let (icon, style) = match app.save_status {
        SaveStatus::Saving => ("↻", Style::default().fg(Color::Yellow)),
        SaveStatus::Saved => ("✓", Style::default().fg(Color::Green)),
        SaveStatus::Unsaved => ("✗", Style::default().fg(Color::Red)),
    };
    let indicator = Paragraph::new(Span::styled(
        format!("{} {}", icon, app.save_label()),
        style,
    ))
    .alignment(Alignment::Right);
    frame.render_widget(indicator, columns[1]);
}

fn draw_loading(frame: &mut Frame, message: &str, area: Rect) {
    let paragraph = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(
            message.to_string(),
            Style::default().fg(Color::Yellow),
        )),
    ])
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::ALL));

    frame.render_widget(paragraph, area);
}

fn draw_error(frame: &mut Frame, error: &str, area: Rect) {
    let paragraph = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(
            "Failed to load project",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(error.to_string()),
        Line::from(""),
        Line::from(Span::styled(
            "press r to retry",
            Style::default().add_modifier(Modifier::DIM),
        )),
    ])
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true })
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Red)),
    );

    frame.render_widget(paragraph, area);
}

/// Editor URL and recent activity
fn draw_ready(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(1)])
        .split(area);

    let url = Paragraph::new(Line::from(vec![
        Span::styled("Editor: ", Style::default().add_modifier(Modifier::DIM)),
        Span::raw(app.target.editor_url.as_str()),
    ]))
    .block(Block::default().borders(Borders::ALL));
    frame.render_widget(url, chunks[0]);

    // Newest first, as many as fit
    let visible = chunks[1].height.saturating_sub(2) as usize;
    let items: Vec<ListItem> = app
        .activity
        .iter()
        .rev()
        .take(visible)
        .map(|line| ListItem::new(line.as_str()))
        .collect();

    let list = List::new(items).block(
        Block::default()
            .title(" Activity ")
            .borders(Borders::ALL),
    );
    frame.render_widget(list, chunks[1]);
}

fn draw_toolbar(frame: &mut Frame, app: &App, area: Rect) {
    let content = if let Some(msg) = &app.status_message {
        msg.clone()
    } else {
        "d:download  p:pair  b/j/y:view  s:settings  x:extensions  r:retry  o:open  ?:help  q:quit"
            .to_string()
    };

    let paragraph = Paragraph::new(content).style(Style::default().add_modifier(Modifier::DIM));

    frame.render_widget(paragraph, area);
}

/// Draw help overlay
fn draw_help_overlay(frame: &mut Frame) {
    let area = frame.area();

    // Calculate centered popup area
    let popup_width = 46.min(area.width.saturating_sub(4));
    let popup_height = 20.min(area.height.saturating_sub(4));
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
        Line::from("Device:"),
        Line::from("  d           Download (compile)"),
        Line::from("  p           Pair micro:bit"),
        Line::from(""),
        Line::from("Editor:"),
        Line::from("  b / j / y   Blocks / JavaScript / Python"),
        Line::from("  s           Settings"),
        Line::from("  x           Extensions"),
        Line::from("  P           Print"),
        Line::from("  h / g       High contrast / Green screen"),
        Line::from("  o           Open editor in browser"),
        Line::from(""),
        Line::from("  r           Retry loading"),
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
        .style(Style::default());

    let paragraph = Paragraph::new(help_text).block(block);

    frame.render_widget(paragraph, popup_area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::edit::EditTarget;
    use bitdesk_core::bridge::{BridgeEvent, Phase};
    use bitdesk_core::ProjectId;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    fn render(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 20)).unwrap();
        terminal.draw(|frame| draw(frame, app)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    fn app() -> App {
        App::new(EditTarget {
            id: ProjectId::parse("abcdefghij").unwrap(),
            name: "Dice".to_string(),
            editor_url: "https://makecode.microbit.org/?controller=1".to_string(),
        })
    }

    #[test]
    fn test_header_and_loading() {
        let screen = render(&app());
        assert!(screen.contains("Dice"));
        assert!(screen.contains("ID: abcdefgh..."));
        assert!(screen.contains("saved"));
        assert!(screen.contains("Loading editor..."));
    }

    #[test]
    fn test_error_screen() {
        let mut app = app();
        app.apply(BridgeEvent::PhaseChanged(Phase::Failed));
        app.apply(BridgeEvent::ImportFailed("bad format".to_string()));

        let screen = render(&app);
        assert!(screen.contains("bad format"));
        assert!(screen.contains("press r to retry"));
    }
}
