use super::chat::parse_markdown;
use super::constants::{BRIEFING, BRIEFING_TITLE};
use crate::app::App;
use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::*,
};

pub fn draw_sidebar(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(BRIEFING_TITLE)
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Yellow));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let mut lines = briefing_lines(inner.width as usize);
    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        "Reset System (Clear Chat): Ctrl+R",
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(Span::styled(
        format!("Entries: {}", app.conversation.transcript().len()),
        Style::default().fg(Color::DarkGray),
    )));

    let briefing = Paragraph::new(lines).wrap(Wrap { trim: false });
    f.render_widget(briefing, inner);
}

/// The briefing wrapped to `width`, continuation lines indented under their rule.
pub fn briefing_lines(width: usize) -> Vec<Line<'static>> {
    let width = width.max(8);
    let base_style = Style::default().fg(Color::White);
    let mut lines = Vec::new();
    for paragraph in BRIEFING.lines() {
        if paragraph.is_empty() {
            lines.push(Line::default());
            continue;
        }
        let options = textwrap::Options::new(width).subsequent_indent("   ");
        for line in textwrap::wrap(paragraph, options) {
            lines.push(parse_markdown(&line, base_style));
        }
    }
    lines
}
