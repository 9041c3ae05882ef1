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

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use ratatui::layout::Rect;
use tracing::{debug, warn};

use crate::config::Settings;
use crate::editor::CurveEditor;
use crate::error::AppError;
use crate::fan::{self, FanSink, FanStatus, ProcFanSink};
use crate::level::Level;
use crate::model::{CurveModel, RangeId};
use crate::privilege::{Pkexec, PrivilegeEscalator, PrivilegedWriter};
use crate::sensors::{self, CommandRunner, FanReading, SensorChannel, SystemRunner, TemperatureReading};

pub const STATUS_HELP: &str =
    "v: curve editor | a: auto | f: full speed | 0-7/+/-: level | R: refresh | q: quit";
pub const EDITOR_HELP: &str =
    "←→↑↓: move | Enter: apply | Tab: range | e: min/max | r: edit | +/x: add/del | [ ]: curve | o: open | s: save | g: generate | v: status";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Page {
    Status,
    Editor,
}

/// External collaborators, boxed so tests can swap them.
pub struct Services {
    pub runner: Box<dyn CommandRunner>,
    pub fan: Box<dyn FanSink>,
    pub escalator: Box<dyn PrivilegeEscalator>,
    pub writer: Box<dyn PrivilegedWriter>,
}

impl Services {
    pub fn system(settings: &Settings) -> Self {
        Self {
            runner: Box::new(SystemRunner),
            fan: Box::new(ProcFanSink::new(&settings.fan_path)),
            escalator: Box::new(Pkexec::new(Box::new(SystemRunner), &settings.helper_path)),
            writer: Box::new(Pkexec::new(Box::new(SystemRunner), &settings.helper_path)),
        }
    }
}

/// Field focused in the per-range form.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RangeField {
    Level,
    Min,
    Max,
}

/// Per-range editor state: a working copy of one range.
#[derive(Clone, Debug, PartialEq)]
pub struct RangeForm {
    pub id: RangeId,
    pub min_temp: u8,
    pub max_temp: u8,
    pub level: Level,
    pub field: RangeField,
}

/// What the preview dialog will save on confirmation.
#[derive(Clone, Debug, PartialEq)]
pub enum PreviewSource {
    /// Serialized curve model.
    Model,
    /// Fresh document from the generation wizard.
    Generated,
}

pub struct App {
    pub settings: Settings,
    pub services: Services,
    pub page: Page,
    pub last_refresh: Instant,
    pub refresh_interval: Duration,
    pub status: String,
    // readings
    pub temps: Vec<TemperatureReading>,
    pub fans: Vec<FanReading>,
    pub fan_status: Option<FanStatus>,
    pub sensors_missing: bool,
    pub manual_level: u8,
    // curves
    pub model: CurveModel,
    pub editor: CurveEditor,
    pub dirty: Rc<Cell<bool>>,
    pub editor_revision: u64,
    /// Screen area of the curve canvas from the last draw, for mouse input.
    pub editor_area: Cell<Rect>,
    // error popup
    pub show_error_popup: bool,
    pub error_message: String,
    pub error_detail: Option<String>,
    // preview popup
    pub show_preview_popup: bool,
    pub preview_text: String,
    pub preview_source: PreviewSource,
    pub preview_scroll: u16,
    // generation wizard
    pub show_wizard_popup: bool,
    pub wizard_channels: Vec<(SensorChannel, bool)>,
    pub wizard_idx: usize,
    // per-range editor
    pub show_range_popup: bool,
    pub range_form: Option<RangeForm>,
    // quit with unsaved changes
    pub show_discard_popup: bool,
}

impl App {
    pub fn new(settings: Settings, services: Services) -> Self {
        let dirty = Rc::new(Cell::new(false));
        let mut model = CurveModel::new();
        let flag = Rc::clone(&dirty);
        model.subscribe(move || flag.set(true));

        let mut editor = CurveEditor::default();
        editor.rebuild(&model);
        let editor_revision = model.revision();

        Self {
            refresh_interval: Duration::from_millis(settings.refresh_ms),
            settings,
            services,
            page: Page::Status,
            last_refresh: Instant::now() - Duration::from_secs(10),
            status: STATUS_HELP.to_string(),
            temps: Vec::new(),
            fans: Vec::new(),
            fan_status: None,
            sensors_missing: false,
            manual_level: 0,
            model,
            editor,
            dirty,
            editor_revision,
            editor_area: Cell::new(Rect::default()),
            show_error_popup: false,
            error_message: String::new(),
            error_detail: None,
            show_preview_popup: false,
            preview_text: String::new(),
            preview_source: PreviewSource::Model,
            preview_scroll: 0,
            show_wizard_popup: false,
            wizard_channels: Vec::new(),
            wizard_idx: 0,
            show_range_popup: false,
            range_form: None,
            show_discard_popup: false,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// Rebuilds the editor handles when the model changed since the last call.
    pub fn sync_editor(&mut self) {
        if self.model.revision() != self.editor_revision {
            self.editor.rebuild(&self.model);
            self.editor_revision = self.model.revision();
        }
    }

    pub fn show_error(&mut self, err: &AppError) {
        warn!(error = %err, "showing error");
        self.show_error_popup = true;
        self.error_message = err.to_string();
        self.error_detail = err.detail().map(str::to_string);
    }

    pub fn has_popup(&self) -> bool {
        self.show_error_popup
            || self.show_preview_popup
            || self.show_wizard_popup
            || self.show_range_popup
            || self.show_discard_popup
    }

    /// Polls sensors and the fan file.
    pub fn refresh(&mut self) {
        match sensors::query_sensors(self.services.runner.as_ref(), &self.settings.sensors_command) {
            Ok(Some(report)) => {
                let snapshot = sensors::read_snapshot(&report);
                self.temps = snapshot.temperatures;
                self.fans = snapshot.fans;
                self.sensors_missing = false;
            }
            Ok(None) => {
                self.temps.clear();
                self.fans.clear();
                self.sensors_missing = true;
            }
            Err(e) => {
                debug!(error = %e, "sensor refresh failed");
                self.status = format!("Error: {}", e);
            }
        }
        self.fan_status = match fan::read_status(self.services.fan.as_ref()) {
            Ok(status) => Some(status),
            Err(e) => {
                debug!(error = %e, "fan status unavailable");
                None
            }
        };
        self.last_refresh = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_utils::{create_test_app, sensors_json};
    use std::io;

    #[test]
    fn test_new_app_has_default_curve_and_is_clean() {
        let app = create_test_app();
        assert_eq!(app.page, Page::Status);
        assert_eq!(app.model.curve_keys(), vec!["Default"]);
        assert_eq!(app.editor.handles().len(), 5);
        assert!(!app.is_dirty());
        assert!(!app.has_popup());
    }

    #[test]
    fn test_model_mutation_marks_dirty_and_syncs_editor() {
        let mut app = create_test_app();
        app.model.add_range(None);
        assert!(app.is_dirty());
        assert_eq!(app.editor.handles().len(), 5);
        app.sync_editor();
        assert_eq!(app.editor.handles().len(), 6);
    }

    #[test]
    fn test_show_error_keeps_detail() {
        let mut app = create_test_app();
        app.show_error(&AppError::FanDriver {
            path: "/proc/acpi/ibm/fan".into(),
            source: io::Error::from_raw_os_error(libc::EINVAL),
        });
        assert!(app.show_error_popup);
        assert!(app.error_detail.as_deref().unwrap().contains("fan_control=1"));
    }

    #[test]
    fn test_refresh_reads_sensors_and_fan() {
        let mut app = create_test_app();
        app.refresh();
        assert_eq!(app.temps.len(), 2);
        assert_eq!(app.fans.len(), 1);
        assert_eq!(app.fan_status.as_ref().unwrap().level, "auto");
        assert!(!app.sensors_missing);
        assert!(!sensors_json().is_empty());
    }
}
