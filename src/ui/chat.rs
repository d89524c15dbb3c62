use super::constants::INPUT_PLACEHOLDER;
use super::spinner::spinner_frame;
use crate::app::App;
use crate::conversation::Conversation;
use crate::message::Role;
use crate::persona::Persona;
use ratatui::{
    Frame,
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::*,
};
use tui_textarea::TextArea;

pub fn new_input() -> TextArea<'static> {
    let mut input = TextArea::default();
    input.set_placeholder_text(INPUT_PLACEHOLDER);
    input.set_cursor_line_style(Style::default());
    input.set_block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(Color::White)),
    );
    input
}

pub fn draw_input(f: &mut Frame, app: &mut App, area: Rect) {
    let busy = app.conversation.is_busy();
    let title = if app.spinner.is_spinning() {
        format!(" {} ", spinner_frame(&app.spinner))
    } else if busy {
        " Receiving transmission ".to_string()
    } else {
        " Command ".to_string()
    };
    let border_color = if busy { Color::DarkGray } else { Color::White };

    app.input.set_block(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(border_color)),
    );
    f.render_widget(&app.input, area);
}

pub fn draw_transcript(f: &mut Frame, app: &mut App, area: Rect) {
    let block = Block::default()
        .title(" Terminal ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let all_lines = transcript_lines(&app.conversation, &app.persona, inner.width as usize);
    let visible = inner.height as usize;
    let first = app.scroll.resolve(all_lines.len(), visible);

    let visible_lines: Vec<Line> = all_lines.into_iter().skip(first).take(visible).collect();
    f.render_widget(Paragraph::new(visible_lines), inner);
}

/// Lay the transcript out as wrapped, styled lines, the reply in flight last.
pub fn transcript_lines(
    conversation: &Conversation,
    persona: &Persona,
    width: usize,
) -> Vec<Line<'static>> {
    let width = width.max(8);
    let mut lines = Vec::new();

    for message in conversation.transcript().all() {
        let (label, style, alignment) = match message.role {
            Role::User => ("You", Style::default().fg(Color::Cyan), Alignment::Right),
            Role::Assistant => {
                let style = if persona.is_victory(&message.content) {
                    Style::default()
                        .fg(Color::LightGreen)
                        .add_modifier(Modifier::BOLD)
                } else if persona.is_refusal(&message.content) {
                    Style::default().fg(Color::Red)
                } else {
                    Style::default().fg(Color::Green)
                };
                (persona.name, style, Alignment::Left)
            }
        };
        push_entry(&mut lines, label, &message.content, style, alignment, width);
    }

    if let Some(pending) = conversation.render() {
        push_entry(
            &mut lines,
            persona.name,
            &pending,
            Style::default().fg(Color::Green),
            Alignment::Left,
            width,
        );
    }

    lines
}

fn push_entry(
    lines: &mut Vec<Line<'static>>,
    label: &str,
    content: &str,
    style: Style,
    alignment: Alignment,
    width: usize,
) {
    lines.push(
        Line::from(Span::styled(
            format!("{label}:"),
            style.add_modifier(Modifier::BOLD),
        ))
        .alignment(alignment),
    );
    for line in textwrap::wrap(content, width) {
        lines.push(parse_markdown(&line, style).alignment(alignment));
    }
    lines.push(Line::default());
}

/// Minimal markdown: `**bold**`, `### heading` and `- ` bullets.
pub fn parse_markdown(line: &str, base_style: Style) -> Line<'static> {
    if let Some(heading) = line.trim_start().strip_prefix("###") {
        return Line::from(Span::styled(
            heading.trim().to_uppercase(),
            base_style.add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        ));
    }

    let mut spans = Vec::new();
    let mut rest = line;
    if let Some(item) = line.strip_prefix("- ") {
        spans.push(Span::styled("• ", base_style));
        rest = item;
    }

    let mut in_bold = false;
    for (i, part) in rest.split("**").enumerate() {
        if i > 0 {
            in_bold = !in_bold;
        }
        if part.is_empty() {
            continue;
        }
        let style = if in_bold {
            base_style.add_modifier(Modifier::BOLD)
        } else {
            base_style
        };
        spans.push(Span::styled(part.to_string(), style));
    }

    Line::from(spans)
}
