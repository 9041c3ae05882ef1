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

use crate::app::App;
use crate::level::MAX_NUMERIC_LEVEL;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::prelude::*;
use ratatui::widgets::{Block, BorderType, Borders, Gauge, List, ListItem, Paragraph, Wrap};

/// Render the status view: temperatures, fans and fan mode controls
pub fn render_main_view(f: &mut Frame, app: &App, size: Rect) {
    // Layout: header | columns | control | status
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(5),
            Constraint::Length(7),
            Constraint::Length(1),
        ])
        .split(size);

    render_header(f, app, chunks[0]);
    render_columns(f, app, chunks[1]);
    render_control_block(f, app, chunks[2]);
    render_status_bar(f, app, chunks[3]);
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let header_cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(80), Constraint::Percentage(20)])
        .split(area);

    let header_text = format!(
        " ThinkFan UI    |    Config: {}    |    Fan: {} ",
        app.settings.config_path.display(),
        app.settings.fan_path.display()
    );
    let header = Paragraph::new(header_text).style(Style::default().fg(Color::Yellow));
    f.render_widget(header, header_cols[0]);

    let (text, color) = if app.is_dirty() { ("● unsaved", Color::Yellow) } else { ("saved", Color::Gray) };
    let indicator = Paragraph::new(text).alignment(Alignment::Right).style(Style::default().fg(color));
    f.render_widget(indicator, header_cols[1]);
}

fn render_columns(f: &mut Frame, app: &App, area: Rect) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);
    render_temps_column(f, app, cols[0]);
    render_fans_column(f, app, cols[1]);
}

/// Labels worth drawing attention to on a laptop
fn is_highlighted(label: &str) -> bool {
    let upper = label.to_ascii_uppercase();
    upper.contains("CPU") || upper.contains("GPU") || upper.starts_with("PACKAGE") || upper == "TCTL"
}

fn render_temps_column(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .title(format!(" TEMP ({}) ", app.temps.len()));

    if app.sensors_missing {
        let text = "lm-sensors is not installed. Install it to see temperatures.";
        let paragraph = Paragraph::new(text)
            .block(block)
            .wrap(Wrap { trim: true })
            .style(Style::default().fg(Color::Gray));
        f.render_widget(paragraph, area);
        return;
    }

    let header_style = Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
    let mut items: Vec<ListItem> = Vec::with_capacity(app.temps.len() + 1);
    items.push(ListItem::new(format!("{:<24} {:<22} {:>7}", "Device", "Sensor", "°C")).style(header_style));
    items.extend(app.temps.iter().map(|t| {
        let style = if is_highlighted(&t.label) {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        ListItem::new(format!("{:<24} {:<22} {:>5.1}", t.device, t.label, t.celsius)).style(style)
    }));

    f.render_widget(List::new(items).block(block), area);
}

fn render_fans_column(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .title(" FANS ");

    let mut lines: Vec<Line> = Vec::new();
    match &app.fan_status {
        Some(status) => {
            lines.push(Line::from(format!("thinkpad_acpi: {}", status.status)));
            let rpm = status.speed_rpm.map(|r| r.to_string()).unwrap_or_else(|| "?".to_string());
            lines.push(Line::from(format!("Speed: {} RPM", rpm)));
            lines.push(Line::from(format!("Level: {}", status.level)).style(Style::default().fg(Color::Green)));
        }
        None => lines.push(
            Line::from(format!("{} is not available", app.settings.fan_path.display()))
                .style(Style::default().fg(Color::Red)),
        ),
    }
    if !app.fans.is_empty() {
        lines.push(Line::from(""));
        for fan in &app.fans {
            lines.push(Line::from(format!("{} {}: {:.0} RPM", fan.device, fan.label, fan.rpm)));
        }
    }

    f.render_widget(Paragraph::new(lines).block(block).wrap(Wrap { trim: false }), area);
}

fn render_control_block(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .title(" FAN MODE ");
    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1), Constraint::Min(1)])
        .split(inner);

    let current = app.fan_status.as_ref().map(|s| s.level.as_str()).unwrap_or("?");
    let modes = Line::from(vec![
        Span::raw("Current: "),
        Span::styled(current.to_string(), Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
        Span::raw("    [a] auto  [f] full speed  [D] disengaged  [0-7] manual"),
    ]);
    f.render_widget(Paragraph::new(modes), rows[0]);

    let ratio = app.manual_level as f64 / MAX_NUMERIC_LEVEL as f64;
    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(Color::Cyan))
        .ratio(ratio.clamp(0.0, 1.0))
        .label(format!("Manual level {} / {}", app.manual_level, MAX_NUMERIC_LEVEL));
    f.render_widget(gauge, rows[1]);
}

fn render_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let status = Paragraph::new(app.status.as_str()).style(Style::default().fg(Color::Gray));
    f.render_widget(status, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highlighted_labels() {
        assert!(is_highlighted("CPU"));
        assert!(is_highlighted("gpu"));
        assert!(is_highlighted("Package id 0"));
        assert!(is_highlighted("Tctl"));
        assert!(!is_highlighted("Composite"));
    }
}
