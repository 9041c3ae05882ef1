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

//! In-memory fan curves: named lists of temperature bands, each mapped to a
//! fan level.

use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

use crate::level::Level;

pub const TEMP_MIN: u8 = 0;
pub const TEMP_MAX: u8 = 120;
pub const DEFAULT_CURVE: &str = "Default";

// add_range: new band starts this far below the last band's upper limit
const ADD_OVERLAP: u8 = 5;
const ADD_WIDTH: u8 = 10;
const ADD_MIN_CEILING: u8 = 115;
const ADD_FALLBACK: (u8, u8, u8) = (40, 50, 1);

/// Stable identity of a range inside a [`CurveModel`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RangeId(u64);

impl RangeId {
    pub const UNASSIGNED: RangeId = RangeId(0);
}

impl fmt::Display for RangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TempRange {
    id: RangeId,
    pub min_temp: u8,
    pub max_temp: u8,
    pub level: Level,
}

impl TempRange {
    pub fn new(min_temp: u8, max_temp: u8, level: Level) -> Self {
        Self { id: RangeId::UNASSIGNED, min_temp, max_temp, level }
    }

    pub fn id(&self) -> RangeId {
        self.id
    }

    pub fn triple(&self) -> (u8, u8, Level) {
        (self.min_temp, self.max_temp, self.level.clone())
    }
}

impl fmt::Display for TempRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Level {}: {}-{}°C", self.level, self.min_temp, self.max_temp)
    }
}

/// Curve name → bands. Names iterate in sorted order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CurveSet {
    curves: BTreeMap<String, Vec<TempRange>>,
}

impl CurveSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, ranges: Vec<TempRange>) {
        self.curves.insert(name.into(), ranges);
    }

    /// Appends to `name`, creating the curve on first use.
    pub fn push(&mut self, name: &str, range: TempRange) {
        self.curves.entry(name.to_string()).or_default().push(range);
    }

    /// Registers an empty curve if `name` is unknown.
    pub fn ensure(&mut self, name: &str) {
        self.curves.entry(name.to_string()).or_default();
    }

    pub fn get(&self, name: &str) -> Option<&[TempRange]> {
        self.curves.get(name).map(|v| v.as_slice())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.curves.contains_key(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.curves.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<TempRange>)> {
        self.curves.iter()
    }

    pub fn len(&self) -> usize {
        self.curves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.curves.is_empty()
    }

    /// Bands of `name` as triples, ascending by `min_temp` then `max_temp`.
    pub fn sorted_triples(&self, name: &str) -> Vec<(u8, u8, Level)> {
        let mut out: Vec<_> = self
            .get(name)
            .unwrap_or_default()
            .iter()
            .map(TempRange::triple)
            .collect();
        out.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        out
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut Vec<TempRange>> {
        self.curves.get_mut(name)
    }
}

pub fn default_ranges() -> Vec<TempRange> {
    vec![
        TempRange::new(0, 55, Level::Numeric(0)),
        TempRange::new(50, 65, Level::Numeric(2)),
        TempRange::new(60, 75, Level::Numeric(4)),
        TempRange::new(70, 85, Level::Numeric(7)),
        TempRange::new(80, 120, Level::Disengaged),
    ]
}

/// Owner of all curves. Every mutation fires the subscribed listeners once.
pub struct CurveModel {
    curves: CurveSet,
    active: Option<String>,
    next_id: u64,
    revision: u64,
    listeners: Vec<Box<dyn FnMut()>>,
}

impl fmt::Debug for CurveModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CurveModel")
            .field("curves", &self.curves)
            .field("active", &self.active)
            .field("revision", &self.revision)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Default for CurveModel {
    fn default() -> Self {
        Self::new()
    }
}

impl CurveModel {
    pub fn new() -> Self {
        let mut model = Self {
            curves: CurveSet::new(),
            active: None,
            next_id: 1,
            revision: 0,
            listeners: Vec::new(),
        };
        model.create_default();
        model
    }

    /// Listener runs after every mutating operation. Consumers re-read state.
    pub fn subscribe<F: FnMut() + 'static>(&mut self, listener: F) {
        self.listeners.push(Box::new(listener));
    }

    /// Incremented once per notification.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn create_default(&mut self) {
        let mut set = CurveSet::new();
        set.insert(DEFAULT_CURVE, default_ranges());
        self.adopt(set);
        debug!("fan curve reset to default");
        self.notify();
    }

    /// Bands of `key` (or the active curve) in ascending `min_temp` order.
    pub fn ranges(&self, key: Option<&str>) -> Vec<&TempRange> {
        let Some(key) = key.or(self.active.as_deref()) else { return Vec::new() };
        let mut out: Vec<&TempRange> = self.curves.get(key).unwrap_or_default().iter().collect();
        out.sort_by_key(|r| r.min_temp);
        out
    }

    pub fn range(&self, id: RangeId) -> Option<&TempRange> {
        self.curves.iter().flat_map(|(_, v)| v.iter()).find(|r| r.id == id)
    }

    pub fn curve_keys(&self) -> Vec<String> {
        self.curves.keys().cloned().collect()
    }

    pub fn active_key(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn set_active_curve(&mut self, key: &str) {
        if !self.curves.contains(key) {
            return;
        }
        self.active = Some(key.to_string());
        self.notify();
    }

    /// Swaps in a whole new set; an empty one falls back to the default curve.
    pub fn replace_all(&mut self, set: CurveSet) {
        if set.is_empty() {
            self.create_default();
            return;
        }
        self.adopt(set);
        debug!(curves = self.curves.len(), active = ?self.active, "fan curves replaced");
        self.notify();
    }

    pub fn add_range(&mut self, key: Option<&str>) -> Option<RangeId> {
        let key = key.map(str::to_string).or_else(|| self.active.clone())?;
        if !self.curves.contains(&key) {
            return None;
        }
        let (min_temp, max_temp, level) = match self.ranges(Some(&key)).last() {
            Some(last) => {
                let new_min = last.max_temp.saturating_sub(ADD_OVERLAP).clamp(TEMP_MIN, ADD_MIN_CEILING);
                let new_max = new_min.saturating_add(ADD_WIDTH).min(TEMP_MAX);
                (new_min, new_max, last.level.next_after())
            }
            None => (ADD_FALLBACK.0, ADD_FALLBACK.1, Level::Numeric(ADD_FALLBACK.2)),
        };
        let mut range = TempRange::new(min_temp, max_temp, level);
        let id = self.assign_id(&mut range);
        if let Some(ranges) = self.curves.get_mut(&key) {
            ranges.push(range);
        }
        self.notify();
        Some(id)
    }

    /// In-place edit of a band of the active curve. Bounds are not checked.
    pub fn update_range(&mut self, id: RangeId, min_temp: u8, max_temp: u8, level: Level) -> bool {
        let Some(range) = self.active_ranges_mut().and_then(|v| v.iter_mut().find(|r| r.id == id)) else {
            return false;
        };
        range.min_temp = min_temp;
        range.max_temp = max_temp;
        range.level = level;
        self.notify();
        true
    }

    pub fn remove_range(&mut self, id: RangeId) -> bool {
        let Some(ranges) = self.active_ranges_mut() else { return false };
        let Some(pos) = ranges.iter().position(|r| r.id == id) else { return false };
        ranges.remove(pos);
        self.notify();
        true
    }

    /// Snapshot for serialization.
    pub fn to_curve_set(&self) -> CurveSet {
        self.curves.clone()
    }

    fn active_ranges_mut(&mut self) -> Option<&mut Vec<TempRange>> {
        let key = self.active.clone()?;
        self.curves.get_mut(&key)
    }

    fn adopt(&mut self, mut set: CurveSet) {
        for ranges in set.curves.values_mut() {
            for range in ranges.iter_mut() {
                range.id = RangeId(self.next_id);
                self.next_id += 1;
            }
        }
        self.active = set.keys().next().cloned();
        self.curves = set;
    }

    fn assign_id(&mut self, range: &mut TempRange) -> RangeId {
        range.id = RangeId(self.next_id);
        self.next_id += 1;
        range.id
    }

    fn notify(&mut self) {
        self.revision += 1;
        for listener in self.listeners.iter_mut() {
            listener();
        }
    }
}

/// Finding reported by [`validate_ranges`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RangeIssue {
    Inverted { id: RangeId, min_temp: u8, max_temp: u8 },
    OutOfBounds { id: RangeId, max_temp: u8 },
    /// No band covers `from..=to`.
    Gap { from: u8, to: u8 },
    /// `shadowed` ends no later than the band before it and is never reached.
    Shadowed { shadowed: RangeId, by: RangeId },
}

impl fmt::Display for RangeIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeIssue::Inverted { min_temp, max_temp, .. } => {
                write!(f, "range {}-{}°C has min above max", min_temp, max_temp)
            }
            RangeIssue::OutOfBounds { max_temp, .. } => {
                write!(f, "upper limit {}°C exceeds {}°C", max_temp, TEMP_MAX)
            }
            RangeIssue::Gap { from, to } => write!(f, "no level covers {}-{}°C", from, to),
            RangeIssue::Shadowed { .. } => f.write_str("a range ends before the range preceding it"),
        }
    }
}

/// Opt-in consistency check. Overlap between neighbours is allowed (thinkfan
/// uses it as hysteresis).
pub fn validate_ranges(ranges: &[&TempRange]) -> Vec<RangeIssue> {
    let mut sorted: Vec<&TempRange> = ranges.to_vec();
    sorted.sort_by_key(|r| r.min_temp);

    let mut issues = Vec::new();
    for r in &sorted {
        if r.min_temp > r.max_temp {
            issues.push(RangeIssue::Inverted { id: r.id, min_temp: r.min_temp, max_temp: r.max_temp });
        }
        if r.max_temp > TEMP_MAX {
            issues.push(RangeIssue::OutOfBounds { id: r.id, max_temp: r.max_temp });
        }
    }
    for w in sorted.windows(2) {
        let (a, b) = (w[0], w[1]);
        if b.min_temp > a.max_temp.saturating_add(1) {
            issues.push(RangeIssue::Gap { from: a.max_temp + 1, to: b.min_temp - 1 });
        }
        if b.max_temp <= a.max_temp {
            issues.push(RangeIssue::Shadowed { shadowed: b.id, by: a.id });
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn counting_model() -> (CurveModel, Rc<Cell<usize>>) {
        let mut model = CurveModel::new();
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        model.subscribe(move || c.set(c.get() + 1));
        (model, count)
    }

    fn triples(model: &CurveModel) -> Vec<(u8, u8, Level)> {
        model.ranges(None).iter().map(|r| r.triple()).collect()
    }

    #[test]
    fn test_create_default_literal() {
        let model = CurveModel::new();
        assert_eq!(model.curve_keys(), vec![DEFAULT_CURVE.to_string()]);
        assert_eq!(model.active_key(), Some(DEFAULT_CURVE));
        assert_eq!(
            triples(&model),
            vec![
                (0, 55, Level::Numeric(0)),
                (50, 65, Level::Numeric(2)),
                (60, 75, Level::Numeric(4)),
                (70, 85, Level::Numeric(7)),
                (80, 120, Level::Disengaged),
            ]
        );
    }

    #[test]
    fn test_ranges_sorted_independent_of_insertion() {
        let mut model = CurveModel::new();
        let mut set = CurveSet::new();
        set.insert(
            "cpu",
            vec![
                TempRange::new(60, 70, Level::Numeric(3)),
                TempRange::new(0, 50, Level::Numeric(0)),
                TempRange::new(45, 62, Level::Numeric(1)),
            ],
        );
        model.replace_all(set);
        let mins: Vec<u8> = model.ranges(None).iter().map(|r| r.min_temp).collect();
        assert_eq!(mins, vec![0, 45, 60]);
    }

    #[test]
    fn test_curve_keys_sorted_and_first_key_active() {
        let (mut model, count) = counting_model();
        let mut set = CurveSet::new();
        set.insert("Tctl", default_ranges());
        set.insert("Package id 0", default_ranges());
        set.insert("Composite", default_ranges());
        model.replace_all(set);
        assert_eq!(model.curve_keys(), vec!["Composite", "Package id 0", "Tctl"]);
        assert_eq!(model.active_key(), Some("Composite"));
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_replace_all_empty_falls_back_to_default() {
        let (mut model, count) = counting_model();
        model.replace_all(CurveSet::new());
        assert_eq!(model.curve_keys(), vec![DEFAULT_CURVE.to_string()]);
        assert_eq!(model.ranges(None).len(), 5);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_set_active_curve() {
        let (mut model, count) = counting_model();
        let mut set = CurveSet::new();
        set.insert("a", default_ranges());
        set.insert("b", vec![TempRange::new(0, 10, Level::Auto)]);
        model.replace_all(set);
        count.set(0);

        model.set_active_curve("missing");
        assert_eq!(model.active_key(), Some("a"));
        assert_eq!(count.get(), 0);

        model.set_active_curve("b");
        assert_eq!(model.active_key(), Some("b"));
        assert_eq!(model.ranges(None).len(), 1);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_add_range_after_disengaged_caps_level() {
        let (mut model, count) = counting_model();
        let id = model.add_range(None).unwrap();
        let added = model.range(id).unwrap();
        assert_eq!(added.triple(), (115, 120, Level::Numeric(7)));
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_add_range_increments_numeric_level() {
        let mut model = CurveModel::new();
        let mut set = CurveSet::new();
        set.insert("x", vec![TempRange::new(0, 30, Level::Numeric(2))]);
        model.replace_all(set);
        let id = model.add_range(Some("x")).unwrap();
        assert_eq!(model.range(id).unwrap().triple(), (25, 35, Level::Numeric(3)));
    }

    #[test]
    fn test_add_range_low_max_clamps_min_to_zero() {
        let mut model = CurveModel::new();
        let mut set = CurveSet::new();
        set.insert("x", vec![TempRange::new(0, 3, Level::Numeric(7))]);
        model.replace_all(set);
        let id = model.add_range(None).unwrap();
        assert_eq!(model.range(id).unwrap().triple(), (0, 10, Level::Numeric(7)));
    }

    #[test]
    fn test_add_range_empty_curve_uses_fallback() {
        let mut model = CurveModel::new();
        let mut set = CurveSet::new();
        set.insert("empty", Vec::new());
        model.replace_all(set);
        let id = model.add_range(None).unwrap();
        assert_eq!(model.range(id).unwrap().triple(), (40, 50, Level::Numeric(1)));
    }

    #[test]
    fn test_add_range_unknown_curve_is_noop() {
        let (mut model, count) = counting_model();
        assert!(model.add_range(Some("nope")).is_none());
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_update_range_in_place_keeps_identity() {
        let (mut model, count) = counting_model();
        let id = model.ranges(None)[1].id();
        assert!(model.update_range(id, 52, 66, Level::Numeric(3)));
        let r = model.range(id).unwrap();
        assert_eq!(r.triple(), (52, 66, Level::Numeric(3)));
        assert_eq!(r.id(), id);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_update_range_absent_is_silent_noop() {
        let (mut model, count) = counting_model();
        let before = triples(&model);
        assert!(!model.update_range(RangeId(9_999), 1, 2, Level::Auto));
        assert!(!model.update_range(RangeId::UNASSIGNED, 1, 2, Level::Auto));
        assert_eq!(triples(&model), before);
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_update_range_only_touches_active_curve() {
        let (mut model, count) = counting_model();
        let mut set = CurveSet::new();
        set.insert("a", default_ranges());
        set.insert("b", default_ranges());
        model.replace_all(set);
        let other = model.ranges(Some("b"))[0].id();
        count.set(0);
        assert!(!model.update_range(other, 1, 2, Level::Auto));
        assert!(!model.remove_range(other));
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_update_range_does_not_reject_inverted_bounds() {
        let mut model = CurveModel::new();
        let id = model.ranges(None)[0].id();
        assert!(model.update_range(id, 90, 10, Level::Numeric(0)));
        assert_eq!(model.range(id).unwrap().min_temp, 90);
    }

    #[test]
    fn test_remove_every_range_leaves_empty_curve() {
        let (mut model, count) = counting_model();
        let ids: Vec<RangeId> = model.ranges(None).iter().map(|r| r.id()).collect();
        for id in &ids {
            assert!(model.remove_range(*id));
        }
        assert!(model.ranges(None).is_empty());
        assert_eq!(model.curve_keys(), vec![DEFAULT_CURVE.to_string()]);
        assert_eq!(count.get(), ids.len());
        assert!(!model.remove_range(ids[0]));
        assert_eq!(count.get(), ids.len());
    }

    #[test]
    fn test_empty_inactive_curve_not_repopulated() {
        let mut model = CurveModel::new();
        let mut set = CurveSet::new();
        set.insert("a", default_ranges());
        set.insert("b", Vec::new());
        model.replace_all(set);
        assert!(model.ranges(Some("b")).is_empty());
        assert_eq!(model.curve_keys().len(), 2);
    }

    #[test]
    fn test_ids_unique_across_replacements() {
        let mut model = CurveModel::new();
        let first: Vec<RangeId> = model.ranges(None).iter().map(|r| r.id()).collect();
        model.create_default();
        let second: Vec<RangeId> = model.ranges(None).iter().map(|r| r.id()).collect();
        assert!(first.iter().all(|id| !second.contains(id)));
    }

    #[test]
    fn test_revision_tracks_notifications() {
        let mut model = CurveModel::new();
        let start = model.revision();
        model.add_range(None);
        model.set_active_curve("missing");
        assert_eq!(model.revision(), start + 1);
    }

    #[test]
    fn test_validate_default_curve_is_clean() {
        let model = CurveModel::new();
        assert!(validate_ranges(&model.ranges(None)).is_empty());
    }

    #[test]
    fn test_validate_reports_gap_inverted_and_shadowed() {
        let a = TempRange::new(0, 40, Level::Numeric(0));
        let b = TempRange::new(50, 45, Level::Numeric(1));
        let c = TempRange::new(55, 121, Level::Numeric(2));
        let d = TempRange::new(60, 70, Level::Numeric(3));
        let issues = validate_ranges(&[&a, &b, &c, &d]);
        assert!(issues.contains(&RangeIssue::Gap { from: 41, to: 49 }));
        assert!(issues.iter().any(|i| matches!(i, RangeIssue::Inverted { min_temp: 50, .. })));
        assert!(issues.iter().any(|i| matches!(i, RangeIssue::OutOfBounds { max_temp: 121, .. })));
        assert!(issues.iter().any(|i| matches!(i, RangeIssue::Shadowed { .. })));
    }
}
