use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use interview_core::{EntryKind, Notice, Status};
use crate::app::{App, Field, TextInput};

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, transcript, role, answer, footer
    let [header_area, chat_area, role_area, answer_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_transcript(app, frame, chat_area);
    render_input(app, frame, role_area, Field::Role);
    render_input(app, frame, answer_area, Field::Answer);
    render_footer(app, frame, footer_area);

    if let Some(notice) = app.transcript.notice() {
        render_notice(notice, frame, area);
    }
}

fn status_color(status: Status) -> Color {
    match status {
        Status::Ready => Color::Gray,
        Status::Starting | Status::Thinking => Color::Yellow,
        Status::Active => Color::Green,
        Status::Error => Color::Red,
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let status = app.transcript.status();
    let role = app.controller.role().unwrap_or("no role selected");

    let mut spans = vec![
        Span::styled(" Interview Practice ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(format!("[{}] ", role), Style::default().fg(Color::White)),
        Span::styled(
            format!(" {} ", status.label()),
            Style::default().bg(status_color(status)).fg(Color::Black),
        ),
    ];

    if app.mic.is_listening() {
        spans.push(Span::styled(" ● listening ", Style::default().fg(Color::Red).bold()));
    }

    spans.push(Span::raw(" "));
    spans.push(Span::styled(
        chrono::Local::now().format("%H:%M").to_string(),
        Style::default().fg(Color::DarkGray),
    ));

    let header = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

/// Rough wrapped line count, used to keep the newest entry in view.
fn wrapped_height(text: &str, width: usize) -> usize {
    let width = width.max(1);
    text.lines()
        .map(|line| line.chars().count() / width + 1)
        .sum::<usize>()
        .max(1)
}

fn render_transcript(app: &mut App, frame: &mut Frame, area: Rect) {
    app.transcript_area = Some(area);
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Transcript ");

    let width = app.chat_width as usize;
    let mut lines: Vec<Line> = Vec::new();
    let mut total_lines: usize = 0;

    for entry in app.transcript.entries() {
        let time = entry.timestamp.format("%H:%M:%S").to_string();
        match entry.kind {
            EntryKind::You | EntryKind::Agent => {
                let color = if entry.kind == EntryKind::You { Color::Cyan } else { Color::Yellow };
                lines.push(Line::from(vec![
                    Span::styled(
                        entry.sender.clone(),
                        Style::default().fg(color).add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(format!("  {}", time), Style::default().fg(Color::DarkGray)),
                ]));
                for line in entry.text.lines() {
                    lines.push(Line::from(line.to_string()));
                }
                total_lines += 1 + wrapped_height(&entry.text, width);
            }
            EntryKind::System => {
                lines.push(
                    Line::from(Span::styled(
                        entry.text.clone(),
                        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                    ))
                    .centered(),
                );
                total_lines += wrapped_height(&entry.text, width);
            }
        }
        lines.push(Line::default());
        total_lines += 1;
    }

    if app.transcript.is_typing() {
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            "Interviewer",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(Span::styled(
            format!("typing{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
        total_lines += 2;
    }

    // Paragraph scroll is u16; anything past that stays pinned at the limit.
    let max_scroll = u16::try_from(total_lines.saturating_sub(app.chat_height as usize))
        .unwrap_or(u16::MAX);
    if app.follow_tail || app.scroll >= max_scroll {
        app.scroll = max_scroll;
        app.follow_tail = true;
    }

    let chat = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: true })
        .scroll((app.scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect, field: Field) {
    let (input, title, disabled): (&TextInput, &str, bool) = match field {
        Field::Role => (
            &app.role_input,
            if app.start_task.is_some() { " Role (starting...) " } else { " Role (Enter to start) " },
            app.start_task.is_some(),
        ),
        Field::Answer => (
            &app.answer_input,
            if app.send_task.is_some() { " Answer (waiting for interviewer) " } else { " Answer (Enter to send) " },
            false,
        ),
    };

    let focused = app.focus == field;
    let border_color = match (focused, disabled) {
        (_, true) => Color::DarkGray,
        (true, false) => Color::Yellow,
        (false, false) => Color::Gray,
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Calculate visible portion of input with horizontal scrolling
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = input.cursor();
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = input
        .value()
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let paragraph = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(block);
    frame.render_widget(paragraph, area);

    if focused && app.transcript.notice().is_none() {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut hints = vec![
        Span::styled(" Tab ", key_style),
        Span::styled(" switch ", label_style),
        Span::styled(" Enter ", key_style),
        Span::styled(if app.focus == Field::Role { " start " } else { " send " }, label_style),
        Span::styled(" ^R ", key_style),
        Span::styled(if app.mic.is_listening() { " stop mic " } else { " mic " }, label_style),
        Span::styled(" ^N ", key_style),
        Span::styled(" local question ", label_style),
        Span::styled(" ^S ", key_style),
        Span::styled(" hush ", label_style),
        Span::styled(" PgUp/PgDn ", key_style),
        Span::styled(" scroll ", label_style),
        Span::styled(" ^Q ", key_style),
        Span::styled(" quit ", label_style),
    ];

    let unavailable = [
        ("mic", app.mic.availability()),
        ("voice", app.voice.availability()),
    ];
    for (name, availability) in unavailable {
        if let Some(reason) = availability.reason() {
            hints.push(Span::styled(
                format!(" {}: {} ", name, reason),
                Style::default().fg(Color::DarkGray),
            ));
        }
    }

    frame.render_widget(Paragraph::new(Line::from(hints)), area);
}

fn render_notice(notice: &Notice, frame: &mut Frame, area: Rect) {
    let width = area.width.saturating_sub(4).min(64);
    let text_height = wrapped_height(&notice.message, width.saturating_sub(4) as usize);
    let height = u16::try_from(text_height + 4).unwrap_or(u16::MAX).min(area.height);

    let [popup] = Layout::horizontal([Constraint::Length(width)])
        .flex(Flex::Center)
        .areas(area);
    let [popup] = Layout::vertical([Constraint::Length(height)])
        .flex(Flex::Center)
        .areas(popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta))
        .title(format!(" ⚠ {} ", notice.title))
        .title_bottom(Line::from(" Enter / Esc: got it ").centered());

    let body = Paragraph::new(notice.message.as_str())
        .wrap(Wrap { trim: false })
        .block(block);

    frame.render_widget(Clear, popup);
    frame.render_widget(body, popup);
}
