use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use crate::app::{App, Field};
use crate::tui::AppEvent;

pub async fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Paste(text) => {
            if app.transcript.notice().is_none() {
                app.focused_input().insert_str(&text);
            }
        }
        AppEvent::Resize => {}
        AppEvent::Tick => {
            app.tick_animation();
            app.poll_microphone();
        }
    }

    app.poll_tasks().await;
}

fn handle_key(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    // Global keys that work in any mode
    if ctrl && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('q')) {
        app.should_quit = true;
        return;
    }

    // A notice blocks everything else until dismissed
    if app.transcript.notice().is_some() {
        if matches!(key.code, KeyCode::Esc | KeyCode::Enter | KeyCode::Char(' ')) {
            app.dismiss_notice();
        }
        return;
    }

    if ctrl {
        match key.code {
            KeyCode::Char('r') => app.toggle_microphone(),
            KeyCode::Char('n') => app.next_local_question(),
            KeyCode::Char('s') => app.stop_speaking(),
            KeyCode::Char('u') => app.focused_input().clear(),
            KeyCode::Char('a') => app.focused_input().home(),
            KeyCode::Char('e') => app.focused_input().end(),
            _ => {}
        }
        return;
    }

    match key.code {
        KeyCode::Tab | KeyCode::BackTab => app.toggle_focus(),
        KeyCode::Enter => match app.focus {
            Field::Role => app.start_interview(),
            Field::Answer => app.send_answer(),
        },
        KeyCode::PageUp => {
            let page = app.half_page();
            app.scroll_up(page);
        }
        KeyCode::PageDown => {
            let page = app.half_page();
            app.scroll_down(page);
        }
        KeyCode::Up => app.scroll_up(1),
        KeyCode::Down => app.scroll_down(1),
        KeyCode::Esc => app.stop_speaking(),
        KeyCode::Backspace => app.focused_input().backspace(),
        KeyCode::Delete => app.focused_input().delete(),
        KeyCode::Left => app.focused_input().left(),
        KeyCode::Right => app.focused_input().right(),
        KeyCode::Home => app.focused_input().home(),
        KeyCode::End => app.focused_input().end(),
        KeyCode::Char(c) => app.focused_input().insert(c),
        _ => {}
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let in_transcript = app
        .transcript_area
        .map(|r| point_in_rect(mouse.column, mouse.row, r))
        .unwrap_or(false);

    if !in_transcript {
        return;
    }

    match mouse.kind {
        MouseEventKind::ScrollUp => app.scroll_up(3),
        MouseEventKind::ScrollDown => app.scroll_down(3),
        _ => {}
    }
}
