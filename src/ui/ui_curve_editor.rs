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
use crate::editor::{Endpoint, SegmentKind, CANVAS_SIZE};
use crate::level::{Level, MAX_NUMERIC_LEVEL};
use crate::mapper::CoordinateMapper;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::canvas::{Canvas, Line as CanvasLine, Points},
    widgets::{Block, BorderType, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};

/// Render the curve editor: curve and range list on the left, canvas on the right
pub fn render_curve_editor(f: &mut Frame, app: &App, size: Rect) {
    // Vertical split: main content | bottom bar
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(10), Constraint::Length(3)])
        .split(size);

    let layout = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(28), Constraint::Percentage(72)])
        .split(main_layout[0]);

    render_range_panel(f, app, layout[0]);
    render_canvas(f, app, layout[1]);
    render_bottom_bar(f, app, main_layout[1]);
}

fn render_range_panel(f: &mut Frame, app: &App, area: Rect) {
    let keys = app.model.curve_keys();
    let active = app.model.active_key().unwrap_or("-");
    let title = if keys.len() > 1 {
        format!(" Curve: {} ({}/{}) [ ] ", active, keys.iter().position(|k| k == active).map_or(0, |i| i + 1), keys.len())
    } else {
        format!(" Curve: {} ", active)
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .title(title)
        .border_style(Style::default().fg(Color::Cyan));

    let ranges = app.model.ranges(None);
    if ranges.is_empty() {
        let empty = Paragraph::new("No ranges\n\nPress '+' to add one")
            .block(block)
            .style(Style::default().fg(Color::Gray));
        f.render_widget(empty, area);
        return;
    }

    let selected = app.editor.selected();
    let items: Vec<ListItem> = ranges
        .iter()
        .map(|r| {
            let marker = match selected {
                Some((id, Endpoint::Min)) if id == r.id() => "◀ ",
                Some((id, Endpoint::Max)) if id == r.id() => " ▶",
                _ => "  ",
            };
            ListItem::new(format!("{} {:>3} - {:<3}°C  {}", marker, r.min_temp, r.max_temp, r.level))
        })
        .collect();

    let mut state = ListState::default();
    state.select(selected.and_then(|(id, _)| ranges.iter().position(|r| r.id() == id)));
    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(Color::Blue).fg(Color::White));
    f.render_stateful_widget(list, area, &mut state);
}

fn level_color(level: &Level) -> Color {
    match level {
        Level::Disengaged => Color::Red,
        Level::Auto => Color::Green,
        Level::Custom(_) => Color::Magenta,
        Level::Numeric(n) if *n >= 6 => Color::LightRed,
        Level::Numeric(n) if *n >= 3 => Color::Yellow,
        Level::Numeric(_) => Color::Cyan,
    }
}

fn render_canvas(f: &mut Frame, app: &App, area: Rect) {
    app.editor_area.set(area);

    let title = if app.editor.is_dragging() { " Fan curve (dragging) " } else { " Fan curve " };
    let mapper = *app.editor.mapper();
    let segments = app.editor.segments();
    let handles = app.editor.handles().to_vec();
    let selected = app.editor.selected();
    let tooltip = app.editor.tooltip();

    // canvas y grows upward, editor y grows downward
    let flip = |y: f64| CANVAS_SIZE - y;

    let canvas = Canvas::default()
        .block(Block::default().borders(Borders::ALL).border_type(BorderType::Rounded).title(title))
        .marker(Marker::Braille)
        .x_bounds([0.0, CANVAS_SIZE])
        .y_bounds([0.0, CANVAS_SIZE])
        .paint(move |ctx| {
            // level grid
            let mut levels: Vec<Level> = (0..=MAX_NUMERIC_LEVEL).map(Level::Numeric).collect();
            levels.push(Level::Disengaged);
            for level in &levels {
                let (_, y) = mapper.to_canvas(0.0, CoordinateMapper::level_to_percent(level));
                let y = flip(y).min(CANVAS_SIZE - 1.0);
                ctx.draw(&CanvasLine::new(0.0, y, CANVAS_SIZE, y, Color::DarkGray));
                ctx.print(2.0, y, Span::styled(level.to_string(), Style::default().fg(Color::DarkGray)));
            }
            // temperature grid every 20°C
            for temp in (20..120).step_by(20) {
                let (x, _) = mapper.to_canvas(temp as f64, 0.0);
                ctx.draw(&CanvasLine::new(x, 0.0, x, CANVAS_SIZE, Color::DarkGray));
                ctx.print(x + 4.0, 8.0, Span::styled(format!("{}°", temp), Style::default().fg(Color::DarkGray)));
            }
            ctx.layer();

            for s in &segments {
                let color = match s.kind {
                    SegmentKind::Range => Color::White,
                    SegmentKind::Connector => Color::Gray,
                };
                ctx.draw(&CanvasLine::new(s.from.x, flip(s.from.y), s.to.x, flip(s.to.y), color));
            }
            ctx.layer();

            for h in &handles {
                let color = level_color(&h.level);
                ctx.draw(&Points { coords: &[(h.min.x, flip(h.min.y)), (h.max.x, flip(h.max.y))], color });
            }
            if let Some((id, endpoint)) = selected {
                if let Some(h) = handles.iter().find(|h| h.id == id) {
                    let p = h.point(endpoint);
                    ctx.print(p.x, flip(p.y), Span::styled("◆", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)));
                    if let Some(text) = &tooltip {
                        let label = text.replace('\n', "  ");
                        let x = if p.x > CANVAS_SIZE * 0.7 { p.x - 250.0 } else { p.x + 20.0 };
                        let y = (flip(p.y) + 40.0).min(CANVAS_SIZE - 20.0);
                        ctx.print(x, y, Span::styled(label, Style::default().fg(Color::Yellow)));
                    }
                }
            }
        });
    f.render_widget(canvas, area);
}

fn render_bottom_bar(f: &mut Frame, app: &App, area: Rect) {
    let dirty = if app.is_dirty() {
        Span::styled(" ● unsaved ", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    } else {
        Span::styled(" saved ", Style::default().fg(Color::Gray))
    };
    let line = Line::from(vec![dirty, Span::raw(" "), Span::styled(app.status.as_str(), Style::default().fg(Color::Gray))]);
    let bar = Paragraph::new(line).block(Block::default().borders(Borders::ALL).border_type(BorderType::Rounded));
    f.render_widget(bar, area);
}
