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

//! Drag engine of the curve editor.
//!
//! Each range of the active curve has two handles on the canvas. A drag
//! moves one handle in flight; nothing reaches the model until
//! [`CurveEditor::commit_drag`].

use tracing::debug;

use crate::level::Level;
use crate::mapper::{CoordinateMapper, DataBounds};
use crate::model::{CurveModel, RangeId, TEMP_MAX, TEMP_MIN};

/// Size of the virtual editor canvas.
pub const CANVAS_SIZE: f64 = 1000.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endpoint {
    Min,
    Max,
}

impl Endpoint {
    pub fn toggle(self) -> Self {
        match self {
            Endpoint::Min => Endpoint::Max,
            Endpoint::Max => Endpoint::Min,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RangeHandles {
    pub id: RangeId,
    pub min: Point,
    pub max: Point,
    pub level: Level,
}

impl RangeHandles {
    pub fn point(&self, endpoint: Endpoint) -> Point {
        match endpoint {
            Endpoint::Min => self.min,
            Endpoint::Max => self.max,
        }
    }

    fn point_mut(&mut self, endpoint: Endpoint) -> &mut Point {
        match endpoint {
            Endpoint::Min => &mut self.min,
            Endpoint::Max => &mut self.max,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SegmentKind {
    /// From the min handle to the max handle of one range.
    Range,
    /// From the max handle of one range to the min handle of the next.
    Connector,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    pub from: Point,
    pub to: Point,
    pub kind: SegmentKind,
}

#[derive(Clone, Copy, Debug)]
struct Drag {
    index: usize,
    endpoint: Endpoint,
    origin: Point,
}

#[derive(Debug)]
pub struct CurveEditor {
    mapper: CoordinateMapper,
    handles: Vec<RangeHandles>,
    drag: Option<Drag>,
    selected: usize,
    endpoint: Endpoint,
}

impl Default for CurveEditor {
    fn default() -> Self {
        Self::new(CoordinateMapper::new(CANVAS_SIZE, CANVAS_SIZE, DataBounds::default()))
    }
}

impl CurveEditor {
    pub fn new(mapper: CoordinateMapper) -> Self {
        Self { mapper, handles: Vec::new(), drag: None, selected: 0, endpoint: Endpoint::Min }
    }

    pub fn mapper(&self) -> &CoordinateMapper {
        &self.mapper
    }

    pub fn handles(&self) -> &[RangeHandles] {
        &self.handles
    }

    /// Recreates the handles from the active curve. Drops any drag.
    pub fn rebuild(&mut self, model: &CurveModel) {
        self.drag = None;
        self.handles = model
            .ranges(None)
            .into_iter()
            .map(|r| {
                let percent = CoordinateMapper::level_to_percent(&r.level);
                let (x0, y) = self.mapper.to_canvas(r.min_temp as f64, percent);
                let (x1, _) = self.mapper.to_canvas(r.max_temp as f64, percent);
                RangeHandles {
                    id: r.id(),
                    min: Point { x: x0, y },
                    max: Point { x: x1, y },
                    level: r.level.clone(),
                }
            })
            .collect();
        if self.selected >= self.handles.len() {
            self.selected = self.handles.len().saturating_sub(1);
        }
    }

    // ------------------------------------------------------------------
    // Keyboard selection
    // ------------------------------------------------------------------

    pub fn selected(&self) -> Option<(RangeId, Endpoint)> {
        self.handles.get(self.selected).map(|h| (h.id, self.endpoint))
    }

    pub fn select(&mut self, id: RangeId) {
        if let Some(index) = self.handles.iter().position(|h| h.id == id) {
            self.selected = index;
        }
    }

    pub fn select_next(&mut self) {
        if !self.handles.is_empty() && self.drag.is_none() {
            self.selected = (self.selected + 1) % self.handles.len();
        }
    }

    pub fn select_prev(&mut self) {
        if !self.handles.is_empty() && self.drag.is_none() {
            self.selected = (self.selected + self.handles.len() - 1) % self.handles.len();
        }
    }

    pub fn toggle_endpoint(&mut self) {
        if self.drag.is_none() {
            self.endpoint = self.endpoint.toggle();
        }
    }

    // ------------------------------------------------------------------
    // Dragging
    // ------------------------------------------------------------------

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn begin_drag(&mut self, id: RangeId, endpoint: Endpoint) -> bool {
        let Some(index) = self.handles.iter().position(|h| h.id == id) else {
            return false;
        };
        self.selected = index;
        self.endpoint = endpoint;
        self.drag = Some(Drag { index, endpoint, origin: self.handles[index].point(endpoint) });
        true
    }

    /// Moves the dragged handle, clamped to the canvas.
    pub fn drag_to(&mut self, x: f64, y: f64) {
        let Some(drag) = self.drag else { return };
        let (x, y) = self.mapper.clamp_canvas(x, y);
        *self.handles[drag.index].point_mut(drag.endpoint) = Point { x, y };
    }

    /// Moves the dragged handle by a data-space delta.
    pub fn nudge(&mut self, dtemp: f64, dpercent: f64) {
        let Some(drag) = self.drag else { return };
        let p = self.handles[drag.index].point(drag.endpoint);
        let (temp, percent) = self.mapper.to_data(p.x, p.y);
        let (x, y) = self.mapper.to_canvas(temp + dtemp, percent + dpercent);
        self.drag_to(x, y);
    }

    pub fn cancel_drag(&mut self) {
        if let Some(drag) = self.drag.take() {
            *self.handles[drag.index].point_mut(drag.endpoint) = drag.origin;
        }
    }

    /// Writes the dragged handle back to the model.
    ///
    /// The temperature is rounded to whole degrees and the level quantized
    /// from the height; a purely horizontal drag keeps the current level.
    /// Moving min past max pins max to the new min and vice versa.
    pub fn commit_drag(&mut self, model: &mut CurveModel) -> bool {
        let Some(drag) = self.drag.take() else {
            return false;
        };
        let handle = &self.handles[drag.index];
        let id = handle.id;
        let point = handle.point(drag.endpoint);
        let (temp, percent) = self.mapper.to_data(point.x, point.y);
        let temp = temp.round().clamp(TEMP_MIN as f64, TEMP_MAX as f64) as u8;

        let Some(range) = model.range(id) else {
            debug!(%id, "dragged range no longer exists");
            self.rebuild(model);
            return false;
        };
        let level = if (point.y - drag.origin.y).abs() < 1e-6 {
            range.level.clone()
        } else {
            CoordinateMapper::percent_to_level(percent)
        };
        let (mut min, mut max) = (range.min_temp, range.max_temp);
        match drag.endpoint {
            Endpoint::Min => {
                min = temp;
                if min > max {
                    max = min;
                }
            }
            Endpoint::Max => {
                max = temp;
                if max < min {
                    min = max;
                }
            }
        }

        let applied = model.update_range(id, min, max, level);
        self.rebuild(model);
        self.select(id);
        applied
    }

    /// Range lines and connectors from the current handle positions,
    /// including a drag in flight. Connectors follow the min handles from
    /// left to right.
    pub fn segments(&self) -> Vec<Segment> {
        let mut out: Vec<Segment> = self
            .handles
            .iter()
            .map(|h| Segment { from: h.min, to: h.max, kind: SegmentKind::Range })
            .collect();
        let mut order: Vec<&RangeHandles> = self.handles.iter().collect();
        order.sort_by(|a, b| a.min.x.total_cmp(&b.min.x));
        out.extend(order.windows(2).map(|pair| Segment {
            from: pair[0].max,
            to: pair[1].min,
            kind: SegmentKind::Connector,
        }));
        out
    }

    /// Nearest handle within `radius` canvas units of `(x, y)`.
    pub fn handle_at(&self, x: f64, y: f64, radius: f64) -> Option<(RangeId, Endpoint)> {
        self.handles
            .iter()
            .flat_map(|h| [(h.id, Endpoint::Min, h.min), (h.id, Endpoint::Max, h.max)])
            .map(|(id, endpoint, p)| (id, endpoint, (p.x - x).hypot(p.y - y)))
            .filter(|(_, _, d)| *d <= radius)
            .min_by(|a, b| a.2.total_cmp(&b.2))
            .map(|(id, endpoint, _)| (id, endpoint))
    }

    /// Tooltip text for the selected handle.
    pub fn tooltip(&self) -> Option<String> {
        let handle = self.handles.get(self.selected)?;
        let p = handle.point(self.endpoint);
        Some(self.mapper.tooltip(p.x, p.y))
    }
}
