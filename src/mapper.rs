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

//! Data space (temperature, percent) to editor canvas space and back.

use crate::level::{Level, MAX_NUMERIC_LEVEL};

/// Percent at or above which a point means `Disengaged`.
pub const DISENGAGED_PERCENT: f64 = 110.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DataBounds {
    pub temp_min: f64,
    pub temp_max: f64,
    pub percent_min: f64,
    pub percent_max: f64,
}

impl Default for DataBounds {
    fn default() -> Self {
        // percent runs past 100 so Disengaged has room above level 7
        Self { temp_min: 0.0, temp_max: 120.0, percent_min: 0.0, percent_max: 120.0 }
    }
}

/// Affine transform with y growing downward on the canvas.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoordinateMapper {
    width: f64,
    height: f64,
    bounds: DataBounds,
}

impl CoordinateMapper {
    pub fn new(width: f64, height: f64, bounds: DataBounds) -> Self {
        Self { width, height, bounds }
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn bounds(&self) -> DataBounds {
        self.bounds
    }

    fn degenerate(&self) -> bool {
        !(self.width > 0.0
            && self.height > 0.0
            && self.bounds.temp_max > self.bounds.temp_min
            && self.bounds.percent_max > self.bounds.percent_min)
    }

    pub fn to_canvas(&self, temp: f64, percent: f64) -> (f64, f64) {
        if self.degenerate() {
            return (0.0, 0.0);
        }
        let b = &self.bounds;
        let x = (temp - b.temp_min) / (b.temp_max - b.temp_min) * self.width;
        let y = self.height - (percent - b.percent_min) / (b.percent_max - b.percent_min) * self.height;
        (x, y)
    }

    pub fn to_data(&self, x: f64, y: f64) -> (f64, f64) {
        if self.degenerate() {
            return (0.0, 0.0);
        }
        let b = &self.bounds;
        let temp = b.temp_min + x / self.width * (b.temp_max - b.temp_min);
        let percent = b.percent_min + (self.height - y) / self.height * (b.percent_max - b.percent_min);
        (temp, percent)
    }

    /// Quantizes a vertical position to a level. Never yields `Auto`.
    pub fn percent_to_level(percent: f64) -> Level {
        if percent >= DISENGAGED_PERCENT {
            return Level::Disengaged;
        }
        let steps = (percent / 100.0 * MAX_NUMERIC_LEVEL as f64).round();
        Level::Numeric(steps.clamp(0.0, MAX_NUMERIC_LEVEL as f64) as u8)
    }

    pub fn level_to_percent(level: &Level) -> f64 {
        match level {
            Level::Disengaged => 120.0,
            Level::Numeric(n) => *n as f64 / MAX_NUMERIC_LEVEL as f64 * 100.0,
            Level::Auto | Level::Custom(_) => 50.0,
        }
    }

    pub fn clamp_canvas(&self, x: f64, y: f64) -> (f64, f64) {
        if self.degenerate() {
            return (0.0, 0.0);
        }
        (x.clamp(0.0, self.width), y.clamp(0.0, self.height))
    }

    pub fn tooltip(&self, x: f64, y: f64) -> String {
        let (temp, percent) = self.to_data(x, y);
        format!("{}°C\nLevel: {}", temp.round() as i64, Self::percent_to_level(percent))
    }
}
