/*
 * This file is part of ThinkFan UI.
 *
 * Copyright (C) 2025 ThinkFan UI contributors
 *
 * ThinkFan UI is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * ThinkFan UI is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with ThinkFan UI. If not, see <https://www.gnu.org/licenses/>.
 */

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

use crate::app::{App, Page};
use crate::editor::CANVAS_SIZE;
use crate::fan::FanSpeed;
use crate::handlers::*;

// Canvas units around a handle that still count as a hit
const HIT_RADIUS: f64 = 40.0;

/// Main event handler that processes keyboard input. Returns true to quit.
pub fn handle_key_event(app: &mut App, key_event: KeyEvent) -> anyhow::Result<bool> {
    let KeyEvent { code, modifiers, kind, .. } = key_event;
    if kind == KeyEventKind::Release {
        return Ok(false);
    }

    // Handle popup states first (highest priority)
    if let Some(quit) = handle_popup_events(app, code, modifiers)? {
        app.sync_editor();
        return Ok(quit);
    }

    // Handle page-specific events
    let consumed = match app.page {
        Page::Editor => handle_editor_events(app, code, modifiers)?,
        Page::Status => handle_status_events(app, code, modifiers)?,
    };
    app.sync_editor();
    if consumed {
        return Ok(false);
    }

    // Handle global events
    handle_global_events(app, code, modifiers)
}

/// Handle all popup-related events. `Some(quit)` when a popup consumed the key.
fn handle_popup_events(app: &mut App, code: KeyCode, modifiers: KeyModifiers) -> anyhow::Result<Option<bool>> {
    // Error popup
    if app.show_error_popup {
        if matches!(code, KeyCode::Esc | KeyCode::Enter) {
            app.show_error_popup = false;
            app.error_message.clear();
            app.error_detail = None;
        }
        return Ok(Some(false));
    }

    // Quit with unsaved changes
    if app.show_discard_popup {
        match code {
            KeyCode::Char('y') | KeyCode::Enter => return Ok(Some(true)),
            KeyCode::Char('n') | KeyCode::Esc => app.show_discard_popup = false,
            _ => {}
        }
        return Ok(Some(false));
    }

    // Save preview
    if app.show_preview_popup {
        match code {
            KeyCode::Esc => cancel_preview(app),
            KeyCode::Enter | KeyCode::Char('y') => confirm_save(app),
            KeyCode::Up => scroll_preview(app, -1),
            KeyCode::Down => scroll_preview(app, 1),
            KeyCode::PageUp => scroll_preview(app, -10),
            KeyCode::PageDown => scroll_preview(app, 10),
            _ => {}
        }
        return Ok(Some(false));
    }

    // Generation wizard
    if app.show_wizard_popup {
        match code {
            KeyCode::Esc => cancel_wizard(app),
            KeyCode::Enter => confirm_wizard(app),
            KeyCode::Up => wizard_move(app, -1),
            KeyCode::Down => wizard_move(app, 1),
            KeyCode::Char(' ') => wizard_toggle(app),
            _ => {}
        }
        return Ok(Some(false));
    }

    // Per-range editor
    if app.show_range_popup {
        let step = if modifiers.contains(KeyModifiers::SHIFT) { 5 } else { 1 };
        match code {
            KeyCode::Esc => cancel_range_form(app),
            KeyCode::Enter => apply_range_form(app),
            KeyCode::Tab | KeyCode::BackTab => range_form_next_field(app),
            KeyCode::Up | KeyCode::Right | KeyCode::Char('+') => range_form_adjust(app, step),
            KeyCode::Down | KeyCode::Left | KeyCode::Char('-') => range_form_adjust(app, -step),
            _ => {}
        }
        return Ok(Some(false));
    }

    Ok(None)
}

/// Handle status page events. Returns true when the key was consumed.
fn handle_status_events(app: &mut App, code: KeyCode, _modifiers: KeyModifiers) -> anyhow::Result<bool> {
    match code {
        KeyCode::Char('a') => set_fan_mode(app, FanSpeed::Auto),
        KeyCode::Char('f') => set_fan_mode(app, FanSpeed::FullSpeed),
        KeyCode::Char('D') => set_fan_mode(app, FanSpeed::Disengaged),
        KeyCode::Char(c @ '0'..='7') => {
            let level = c.to_digit(10).unwrap_or(0) as u8;
            set_fan_mode(app, FanSpeed::Level(level));
        }
        KeyCode::Char('+' | '=') | KeyCode::Up => adjust_manual_level(app, 1),
        KeyCode::Char('-') | KeyCode::Down => adjust_manual_level(app, -1),
        KeyCode::Tab => toggle_page(app),
        _ => return Ok(false),
    }
    Ok(true)
}

/// Handle curve editor events. Returns true when the key was consumed.
fn handle_editor_events(app: &mut App, code: KeyCode, modifiers: KeyModifiers) -> anyhow::Result<bool> {
    let step: i8 = if modifiers.contains(KeyModifiers::SHIFT) { 5 } else { 1 };
    match code {
        KeyCode::Left => editor_nudge(app, -step, 0),
        KeyCode::Right => editor_nudge(app, step, 0),
        KeyCode::Up => editor_nudge(app, 0, 1),
        KeyCode::Down => editor_nudge(app, 0, -1),
        KeyCode::Enter => editor_commit(app),
        KeyCode::Esc if app.editor.is_dragging() => editor_cancel(app),
        KeyCode::Esc => toggle_page(app),
        KeyCode::Tab if !app.editor.is_dragging() => app.editor.select_next(),
        KeyCode::BackTab if !app.editor.is_dragging() => app.editor.select_prev(),
        KeyCode::Char('e') => editor_toggle_endpoint(app),
        KeyCode::Char('r') => start_range_form(app),
        KeyCode::Char('+' | '=') => editor_add_range(app),
        KeyCode::Char('x') | KeyCode::Delete => editor_remove_range(app),
        KeyCode::Char('[') => editor_cycle_curve(app, false),
        KeyCode::Char(']') => editor_cycle_curve(app, true),
        KeyCode::Char('o') => load_config(app),
        KeyCode::Char('s') => start_save(app),
        KeyCode::Char('g') => start_wizard(app),
        _ => return Ok(false),
    }
    Ok(true)
}

/// Handle global events (lowest priority)
fn handle_global_events(app: &mut App, code: KeyCode, modifiers: KeyModifiers) -> anyhow::Result<bool> {
    match (code, modifiers) {
        (KeyCode::Char('q'), _) | (KeyCode::Esc, _) => return Ok(request_quit(app)),
        (KeyCode::Char('c'), m) if m.contains(KeyModifiers::CONTROL) => return Ok(request_quit(app)),
        (KeyCode::Char('R'), _) => app.refresh(),
        (KeyCode::Char('v'), _) => toggle_page(app),
        _ => {}
    }
    Ok(false)
}

/// Quits right away unless there are unsaved curve edits.
fn request_quit(app: &mut App) -> bool {
    if app.is_dirty() {
        app.show_discard_popup = true;
        return false;
    }
    true
}

/// Mouse dragging on the curve canvas.
pub fn handle_mouse_event(app: &mut App, event: MouseEvent) -> anyhow::Result<()> {
    if app.page != Page::Editor || app.has_popup() {
        return Ok(());
    }
    let Some((x, y)) = cell_to_canvas(app.editor_area.get(), event.column, event.row) else {
        if matches!(event.kind, MouseEventKind::Up(MouseButton::Left)) && app.editor.is_dragging() {
            editor_commit(app);
        }
        return Ok(());
    };
    match event.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            if let Some((id, endpoint)) = app.editor.handle_at(x, y, HIT_RADIUS) {
                app.editor.begin_drag(id, endpoint);
            }
        }
        MouseEventKind::Drag(MouseButton::Left) if app.editor.is_dragging() => {
            app.editor.drag_to(x, y);
            app.status = app.editor.tooltip().unwrap_or_default().replace('\n', " | ");
        }
        MouseEventKind::Up(MouseButton::Left) if app.editor.is_dragging() => {
            app.editor.drag_to(x, y);
            editor_commit(app);
        }
        _ => {}
    }
    app.sync_editor();
    Ok(())
}

/// Maps a terminal cell inside the bordered canvas area to canvas units.
fn cell_to_canvas(area: Rect, column: u16, row: u16) -> Option<(f64, f64)> {
    let cells_w = area.width.saturating_sub(2);
    let cells_h = area.height.saturating_sub(2);
    if cells_w < 2 || cells_h < 2 {
        return None;
    }
    let (left, top) = (area.x + 1, area.y + 1);
    if column < left || row < top || column >= left + cells_w || row >= top + cells_h {
        return None;
    }
    let x = (column - left) as f64 / (cells_w - 1) as f64 * CANVAS_SIZE;
    let y = (row - top) as f64 / (cells_h - 1) as f64 * CANVAS_SIZE;
    Some((x, y))
}
