// ui/mod.rs

pub mod chat;
pub mod constants;
pub mod sidebar;
pub mod spinner;

use crate::app::App;
use constants::{KEY_HINTS, TITLE};
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::*,
};

pub const MIN_WIDTH: u16 = 60;
pub const MIN_HEIGHT: u16 = 20;

pub fn draw(f: &mut Frame, app: &mut App) {
    let size = f.area();

    if size.width < MIN_WIDTH || size.height < MIN_HEIGHT {
        let warning = Paragraph::new("Terminal too small. Please resize.")
            .style(Style::default().fg(Color::Red))
            .alignment(Alignment::Center);
        f.render_widget(warning, size);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(10),
            Constraint::Length(1),
        ])
        .split(size);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
        .split(chunks[1]);

    let chat = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(5)])
        .split(body[0]);

    render_header(f, app, chunks[0]);
    chat::draw_transcript(f, app, chat[0]);
    chat::draw_input(f, app, chat[1]);
    sidebar::draw_sidebar(f, app, body[1]);
    render_status(f, app, chunks[2]);
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let title = Line::from(vec![
        Span::styled(
            TITLE,
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("  v{} · {}", env!("CARGO_PKG_VERSION"), app.settings.model),
            Style::default().fg(Color::DarkGray),
        ),
    ]);
    let header = Paragraph::new(title)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(Color::DarkGray)),
        )
        .alignment(Alignment::Center);
    f.render_widget(header, area);
}

fn render_status(f: &mut Frame, app: &App, area: Rect) {
    let mut spans = match &app.status {
        Some(status) => vec![Span::styled(status.clone(), Style::default().fg(Color::Red))],
        None => vec![Span::styled(KEY_HINTS, Style::default().fg(Color::DarkGray))],
    };
    if app.settings.debug_mode {
        spans.push(Span::styled(
            format!("  [{}]", app.conversation.state()),
            Style::default().fg(Color::Yellow),
        ));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}
