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

use crate::app::{App, PreviewSource, RangeField};
use ratatui::layout::Rect;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

/// Helper function to create a centered rectangle for popups
pub fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

/// Clears `area`, draws a titled frame and splits the inside into body and
/// a two-line footer with `help`.
fn popup_frame(f: &mut Frame, area: Rect, title: &str, border: Color, help: &str) -> Rect {
    f.render_widget(Clear, area);
    let block = Block::default()
        .title(format!(" {} ", title))
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(border));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(2)])
        .split(inner);
    let instructions = Paragraph::new(help).alignment(Alignment::Center).style(Style::default().fg(Color::Gray));
    f.render_widget(instructions, chunks[1]);
    chunks[0]
}

/// Render the error popup
pub fn render_error_popup(f: &mut Frame, app: &App, size: Rect) {
    let area = centered_rect(60, 35, size);
    let body = popup_frame(f, area, "Error", Color::Red, "Press Enter to dismiss");

    let mut lines = vec![Line::from(app.error_message.as_str()).style(Style::default().add_modifier(Modifier::BOLD))];
    if let Some(detail) = &app.error_detail {
        lines.push(Line::from(""));
        lines.extend(detail.lines().map(|l| Line::from(l.to_string()).style(Style::default().fg(Color::Gray))));
    }
    let text = Paragraph::new(lines).wrap(Wrap { trim: true }).alignment(Alignment::Center);
    f.render_widget(text, body);
}

/// Render the configuration preview shown before saving
pub fn render_preview_popup(f: &mut Frame, app: &App, size: Rect) {
    let area = centered_rect(80, 80, size);
    let title = match app.preview_source {
        PreviewSource::Model => format!("Save {}?", app.settings.config_path.display()),
        PreviewSource::Generated => format!("Replace {} with generated config?", app.settings.config_path.display()),
    };
    let body = popup_frame(f, area, &title, Color::Yellow, "↑/↓ scroll  |  Enter save  |  Esc cancel");

    let lines: Vec<Line> = app
        .preview_text
        .lines()
        .map(|l| {
            let style = if l.trim_start().starts_with('#') {
                Style::default().fg(Color::DarkGray)
            } else if l.trim_start().starts_with("- [") {
                Style::default().fg(Color::Cyan)
            } else {
                Style::default()
            };
            Line::from(l.to_string()).style(style)
        })
        .collect();
    f.render_widget(Paragraph::new(lines).scroll((app.preview_scroll, 0)), body);
}

/// Render the sensor checklist of the generation wizard
pub fn render_wizard_popup(f: &mut Frame, app: &App, size: Rect) {
    let area = centered_rect(60, 60, size);
    let body = popup_frame(f, area, "Generate thinkfan config", Color::Cyan, "Space toggle  |  Enter preview  |  Esc cancel");

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(2), Constraint::Min(3)])
        .split(body);
    let header = Paragraph::new("Select the sensors thinkfan should watch. Each gets its own curve.")
        .wrap(Wrap { trim: true })
        .alignment(Alignment::Center);
    f.render_widget(header, chunks[0]);

    let mut items: Vec<ListItem> = app
        .wizard_channels
        .iter()
        .map(|(ch, checked)| {
            let mark = if *checked { "[x]" } else { "[ ]" };
            ListItem::new(format!("{} {:<24} {} (temp{})", mark, ch.label, ch.device, ch.channel))
        })
        .collect();
    if items.is_empty() {
        items.push(ListItem::new("(no temperature inputs found)").style(Style::default().fg(Color::Gray)));
    }

    let mut state = ListState::default();
    if !app.wizard_channels.is_empty() {
        state.select(Some(app.wizard_idx.min(app.wizard_channels.len() - 1)));
    }
    let list = List::new(items).highlight_style(Style::default().bg(Color::Blue).fg(Color::White));
    f.render_stateful_widget(list, chunks[1], &mut state);
}

/// Render the per-range editor
pub fn render_range_popup(f: &mut Frame, app: &App, size: Rect) {
    let Some(form) = &app.range_form else { return };
    let area = centered_rect(40, 30, size);
    let body = popup_frame(f, area, "Edit range", Color::Cyan, "Tab field  |  ↑/↓ change  |  Enter apply  |  Esc cancel");

    let field = |label: &str, value: String, focused: bool| {
        let style = if focused {
            Style::default().bg(Color::Blue).fg(Color::White).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        Line::from(vec![Span::raw(format!("{:<12}", label)), Span::styled(format!(" {} ", value), style)])
    };
    let lines = vec![
        field("Level", form.level.to_string(), form.field == RangeField::Level),
        field("Min °C", form.min_temp.to_string(), form.field == RangeField::Min),
        field("Max °C", form.max_temp.to_string(), form.field == RangeField::Max),
    ];
    f.render_widget(Paragraph::new(lines), body);
}

/// Render the quit confirmation shown when curves are unsaved
pub fn render_discard_popup(f: &mut Frame, size: Rect) {
    let area = centered_rect(50, 25, size);
    let body = popup_frame(f, area, "Unsaved changes", Color::Yellow, "y quit  |  n stay");
    let message = Paragraph::new("The fan curves have unsaved changes. Quit anyway?")
        .wrap(Wrap { trim: true })
        .alignment(Alignment::Center);
    f.render_widget(message, body);
}
