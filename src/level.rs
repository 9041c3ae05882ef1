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

use std::fmt;

/// Highest numeric level the embedded controller understands.
pub const MAX_NUMERIC_LEVEL: u8 = 7;

/// Fan level of one temperature band.
///
/// The on-disk sentinel `127` for `Disengaged` is a codec concern and never
/// appears here.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Level {
    Numeric(u8),
    Auto,
    Disengaged,
    /// Daemon-specific value from an extended config (e.g. a raw PWM value).
    Custom(String),
}

impl Level {
    /// Numeric level clamped to `0..=7`.
    pub fn numeric(n: u8) -> Self {
        Level::Numeric(n.min(MAX_NUMERIC_LEVEL))
    }

    pub fn as_numeric(&self) -> Option<u8> {
        match self {
            Level::Numeric(n) => Some(*n),
            _ => None,
        }
    }

    /// Level for a range appended after one with `self`: one step up while
    /// numeric and below the maximum, otherwise the maximum.
    pub fn next_after(&self) -> Level {
        match self {
            Level::Numeric(n) if *n < MAX_NUMERIC_LEVEL => Level::Numeric(n + 1),
            _ => Level::Numeric(MAX_NUMERIC_LEVEL),
        }
    }

    /// Choices offered by the per-range level selector.
    pub fn all_standard() -> Vec<Level> {
        let mut out = vec![Level::Auto];
        out.extend((0..=MAX_NUMERIC_LEVEL).map(Level::Numeric));
        out.push(Level::Disengaged);
        out
    }

    /// Parses the selector text form (`auto`, `0`..`7`, `Disengaged`).
    pub fn from_label(s: &str) -> Option<Level> {
        let t = s.trim();
        if t.eq_ignore_ascii_case("auto") {
            return Some(Level::Auto);
        }
        if t.eq_ignore_ascii_case("disengaged") {
            return Some(Level::Disengaged);
        }
        match t.parse::<u8>() {
            Ok(n) if n <= MAX_NUMERIC_LEVEL => Some(Level::Numeric(n)),
            _ => None,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Numeric(n) => write!(f, "{}", n),
            Level::Auto => f.write_str("auto"),
            Level::Disengaged => f.write_str("Disengaged"),
            Level::Custom(s) => f.write_str(s),
        }
    }
}
