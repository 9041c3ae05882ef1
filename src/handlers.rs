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

use tracing::{info, warn};

use crate::app::{App, Page, PreviewSource, RangeField, RangeForm, EDITOR_HELP, STATUS_HELP};
use crate::codec;
use crate::editor::Endpoint;
use crate::fan::{self, FanSpeed};
use crate::level::{Level, MAX_NUMERIC_LEVEL};
use crate::model::{validate_ranges, TEMP_MAX, TEMP_MIN};
use crate::privilege;
use crate::sensors;

// Keyboard drag step sizes
const TEMP_STEP: f64 = 1.0;
const LEVEL_STEP: f64 = 100.0 / MAX_NUMERIC_LEVEL as f64;

// ============================================================================
// Pages
// ============================================================================

pub fn toggle_page(app: &mut App) {
    app.page = match app.page {
        Page::Status => Page::Editor,
        Page::Editor => Page::Status,
    };
    app.status = match app.page {
        Page::Status => STATUS_HELP.to_string(),
        Page::Editor => EDITOR_HELP.to_string(),
    };
}

/// Another launch asked this instance to come forward.
pub fn on_activation(app: &mut App) {
    app.page = Page::Status;
    app.status = "ThinkFan UI is already running".to_string();
}

// ============================================================================
// Fan control
// ============================================================================

/// One-time write check of the fan file at startup.
pub fn check_fan_access(app: &mut App) {
    let path = app.services.fan.path();
    if privilege::can_write(&path) {
        return;
    }
    warn!(path = %path.display(), "fan control file is not writable");
    match app.services.escalator.grant_fan_access(&path) {
        Ok(()) => app.status = "Fan control enabled".to_string(),
        Err(e) => app.show_error(&e),
    }
}

pub fn set_fan_mode(app: &mut App, speed: FanSpeed) {
    match fan::set_fan_speed(app.services.fan.as_ref(), app.services.escalator.as_ref(), speed) {
        Ok(()) => {
            if let FanSpeed::Level(n) = speed {
                app.manual_level = n;
            }
            app.status = format!("Fan level set to {}", speed);
            app.refresh();
        }
        Err(e) => app.show_error(&e),
    }
}

pub fn adjust_manual_level(app: &mut App, delta: i8) {
    let next = (app.manual_level as i16 + delta as i16).clamp(0, MAX_NUMERIC_LEVEL as i16) as u8;
    set_fan_mode(app, FanSpeed::Level(next));
}

// ============================================================================
// Loading and saving thinkfan.conf
// ============================================================================

/// Loads the configured thinkfan file. A parse error leaves the model as is.
pub fn load_config(app: &mut App) {
    let path = app.settings.config_path.clone();
    match codec::load_file(&path) {
        Ok(set) => {
            let curves = set.len();
            app.model.replace_all(set);
            app.dirty.set(false);
            app.sync_editor();
            app.status = if curves == 0 {
                format!("No levels in {}, using the default curve", path.display())
            } else {
                format!("Loaded {} curve(s) from {}", curves, path.display())
            };
        }
        Err(e) => app.show_error(&e),
    }
}

/// Serializes the model and shows it for confirmation.
pub fn start_save(app: &mut App) {
    if app.settings.strict_ranges {
        let ranges = app.model.ranges(None);
        let issues = validate_ranges(&ranges);
        if !issues.is_empty() {
            let text: Vec<String> = issues.iter().map(|i| i.to_string()).collect();
            app.show_error_popup = true;
            app.error_message = "The active curve has problems and was not saved".to_string();
            app.error_detail = Some(text.join("\n"));
            return;
        }
    }
    let existing = codec::read_existing(&app.settings.config_path);
    app.preview_text = codec::serialize(&app.model.to_curve_set(), existing.as_deref());
    app.preview_source = PreviewSource::Model;
    app.preview_scroll = 0;
    app.show_preview_popup = true;
}

pub fn cancel_preview(app: &mut App) {
    app.show_preview_popup = false;
    app.preview_text.clear();
}

pub fn confirm_save(app: &mut App) {
    let path = app.settings.config_path.clone();
    let result = codec::save_via_helper(app.services.writer.as_ref(), &path, &app.preview_text);
    app.show_preview_popup = false;
    match result {
        Ok(()) => {
            if app.preview_source == PreviewSource::Generated {
                match codec::parse(&app.preview_text) {
                    Ok(set) => app.model.replace_all(set),
                    Err(e) => {
                        app.show_error(&e);
                        app.preview_text.clear();
                        return;
                    }
                }
                app.sync_editor();
            }
            app.dirty.set(false);
            app.status = format!("Saved {}", path.display());
            info!(path = %path.display(), "configuration saved");
        }
        Err(e) => app.show_error(&e),
    }
    app.preview_text.clear();
}

pub fn scroll_preview(app: &mut App, delta: i16) {
    app.preview_scroll = (app.preview_scroll as i16 + delta).max(0) as u16;
}

// ============================================================================
// Generation wizard
// ============================================================================

pub fn start_wizard(app: &mut App) {
    match sensors::query_sensors(app.services.runner.as_ref(), &app.settings.sensors_command) {
        Ok(Some(report)) => {
            app.wizard_channels = sensors::discover_temperature_inputs(&report)
                .into_iter()
                .map(|ch| {
                    let checked = ch.is_primary_cpu();
                    (ch, checked)
                })
                .collect();
            app.wizard_idx = 0;
            app.show_wizard_popup = true;
        }
        Ok(None) => {
            app.show_error_popup = true;
            app.error_message = "lm-sensors is not installed".to_string();
            app.error_detail = Some("Install the lm-sensors package to detect temperature sensors.".to_string());
        }
        Err(e) => app.show_error(&e),
    }
}

pub fn wizard_move(app: &mut App, delta: i32) {
    if app.wizard_channels.is_empty() {
        return;
    }
    let len = app.wizard_channels.len() as i32;
    app.wizard_idx = (app.wizard_idx as i32 + delta).clamp(0, len - 1) as usize;
}

pub fn wizard_toggle(app: &mut App) {
    if let Some((_, checked)) = app.wizard_channels.get_mut(app.wizard_idx) {
        *checked = !*checked;
    }
}

pub fn cancel_wizard(app: &mut App) {
    app.show_wizard_popup = false;
    app.wizard_channels.clear();
}

/// Builds a fresh configuration for the checked sensors and previews it.
pub fn confirm_wizard(app: &mut App) {
    let selected: Vec<_> = app.wizard_channels.iter().filter(|(_, c)| *c).map(|(ch, _)| ch.clone()).collect();
    if selected.is_empty() {
        app.status = "Select at least one sensor".to_string();
        return;
    }
    app.preview_text = codec::generate(&selected, &app.settings.fan_path);
    app.preview_source = PreviewSource::Generated;
    app.preview_scroll = 0;
    app.show_wizard_popup = false;
    app.show_preview_popup = true;
}

// ============================================================================
// Curve editor
// ============================================================================

pub fn editor_begin_drag(app: &mut App) {
    if let Some((id, endpoint)) = app.editor.selected() {
        app.editor.begin_drag(id, endpoint);
    }
}

pub fn editor_nudge(app: &mut App, dtemp: i8, dlevel: i8) {
    if !app.editor.is_dragging() {
        editor_begin_drag(app);
    }
    app.editor.nudge(dtemp as f64 * TEMP_STEP, dlevel as f64 * LEVEL_STEP);
    app.status = app.editor.tooltip().unwrap_or_default().replace('\n', " | ");
}

pub fn editor_commit(app: &mut App) {
    if app.editor.commit_drag(&mut app.model) {
        app.editor_revision = app.model.revision();
    }
    app.status = EDITOR_HELP.to_string();
}

pub fn editor_cancel(app: &mut App) {
    app.editor.cancel_drag();
    app.status = EDITOR_HELP.to_string();
}

pub fn editor_add_range(app: &mut App) {
    if let Some(id) = app.model.add_range(None) {
        app.sync_editor();
        app.editor.select(id);
    }
}

pub fn editor_remove_range(app: &mut App) {
    if let Some((id, _)) = app.editor.selected() {
        app.model.remove_range(id);
        app.sync_editor();
    }
}

pub fn editor_cycle_curve(app: &mut App, forward: bool) {
    let keys = app.model.curve_keys();
    if keys.len() < 2 {
        return;
    }
    let current = app.model.active_key().and_then(|k| keys.iter().position(|c| c == k)).unwrap_or(0);
    let next = if forward { (current + 1) % keys.len() } else { (current + keys.len() - 1) % keys.len() };
    app.model.set_active_curve(&keys[next]);
    app.sync_editor();
}

// ============================================================================
// Per-range editor
// ============================================================================

pub fn start_range_form(app: &mut App) {
    let Some((id, _)) = app.editor.selected() else { return };
    let Some(range) = app.model.range(id) else { return };
    app.range_form = Some(RangeForm {
        id,
        min_temp: range.min_temp,
        max_temp: range.max_temp,
        level: range.level.clone(),
        field: RangeField::Level,
    });
    app.show_range_popup = true;
}

pub fn range_form_next_field(app: &mut App) {
    if let Some(form) = app.range_form.as_mut() {
        form.field = match form.field {
            RangeField::Level => RangeField::Min,
            RangeField::Min => RangeField::Max,
            RangeField::Max => RangeField::Level,
        };
    }
}

/// Steps the focused field. A change that would put min above max is
/// reverted.
pub fn range_form_adjust(app: &mut App, delta: i16) {
    let Some(form) = app.range_form.as_mut() else { return };
    let step = |v: u8| (v as i16 + delta).clamp(TEMP_MIN as i16, TEMP_MAX as i16) as u8;
    match form.field {
        RangeField::Level => {
            let choices = Level::all_standard();
            let current = choices.iter().position(|l| *l == form.level);
            let next = match current {
                Some(i) => (i as i16 + delta).clamp(0, choices.len() as i16 - 1) as usize,
                None => 0,
            };
            form.level = choices[next].clone();
        }
        RangeField::Min => {
            let candidate = step(form.min_temp);
            if candidate <= form.max_temp {
                form.min_temp = candidate;
            } else {
                app.status = "Minimum cannot exceed maximum".to_string();
            }
        }
        RangeField::Max => {
            let candidate = step(form.max_temp);
            if candidate >= form.min_temp {
                form.max_temp = candidate;
            } else {
                app.status = "Maximum cannot be below minimum".to_string();
            }
        }
    }
}

pub fn apply_range_form(app: &mut App) {
    if let Some(form) = app.range_form.take() {
        app.model.update_range(form.id, form.min_temp, form.max_temp, form.level);
        app.sync_editor();
        app.editor.select(form.id);
    }
    app.show_range_popup = false;
}

pub fn cancel_range_form(app: &mut App) {
    app.range_form = None;
    app.show_range_popup = false;
}

/// Switches the selected handle between the min and max end.
pub fn editor_toggle_endpoint(app: &mut App) {
    app.editor.toggle_endpoint();
    if let Some((_, endpoint)) = app.editor.selected() {
        app.status = match endpoint {
            Endpoint::Min => "Editing lower limit".to_string(),
            Endpoint::Max => "Editing upper limit".to_string(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::privilege::{MockPrivilegeEscalator, MockPrivilegedWriter};
    use crate::test_utils::test_utils::{create_test_app, create_test_app_with, fake_services};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_toggle_page() {
        let mut app = create_test_app();
        toggle_page(&mut app);
        assert_eq!(app.page, Page::Editor);
        assert_eq!(app.status, EDITOR_HELP);
        toggle_page(&mut app);
        assert_eq!(app.page, Page::Status);
    }

    #[test]
    fn test_load_config_replaces_model() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "levels:\n  # curve: CPU\n  - [1, 0, 60]\n  # curve: GPU\n  - [3, 0, 70]\n").unwrap();
        let mut app = create_test_app();
        app.settings.config_path = file.path().to_path_buf();
        load_config(&mut app);
        assert_eq!(app.model.curve_keys(), vec!["CPU", "GPU"]);
        assert_eq!(app.model.active_key(), Some("CPU"));
        assert!(!app.is_dirty());
        assert_eq!(app.editor.handles().len(), 1);
    }

    #[test]
    fn test_load_config_parse_error_keeps_model() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "levels:\n  - [1, 0, 60\n").unwrap();
        let mut app = create_test_app();
        app.settings.config_path = file.path().to_path_buf();
        let before = app.model.to_curve_set();
        load_config(&mut app);
        assert!(app.show_error_popup);
        assert!(app.error_message.contains("line 2"));
        assert_eq!(app.model.to_curve_set().sorted_triples("Default"), before.sorted_triples("Default"));
    }

    #[test]
    fn test_save_goes_through_preview_and_writer() {
        let mut services = fake_services();
        let mut writer = MockPrivilegedWriter::new();
        writer
            .expect_write_privileged()
            .withf(|_, text| text.contains("levels:") && text.contains("- [0, 0, 55]"))
            .times(1)
            .returning(|_, _| Ok(()));
        services.writer = Box::new(writer);
        let mut app = create_test_app_with(services);
        app.settings.config_path = "/nonexistent/thinkfan.conf".into();
        app.model.add_range(None);
        assert!(app.is_dirty());

        start_save(&mut app);
        assert!(app.show_preview_popup);
        assert!(app.preview_text.contains("sensors:"));
        confirm_save(&mut app);
        assert!(!app.show_preview_popup);
        assert!(!app.is_dirty());
    }

    #[test]
    fn test_generated_text_that_fails_to_parse_is_reported() {
        let mut app = create_test_app();
        app.model.add_range(None);
        let before = app.model.to_curve_set();
        app.preview_source = PreviewSource::Generated;
        app.preview_text = "levels:\n  - [1, 0, 60\n".to_string();
        app.show_preview_popup = true;
        confirm_save(&mut app);
        assert!(app.show_error_popup);
        assert!(app.is_dirty());
        assert!(!app.status.starts_with("Saved"));
        assert!(app.preview_text.is_empty());
        assert_eq!(app.model.to_curve_set().sorted_triples("Default"), before.sorted_triples("Default"));
    }

    #[test]
    fn test_helper_failure_shows_stderr() {
        let mut services = fake_services();
        let mut writer = MockPrivilegedWriter::new();
        writer
            .expect_write_privileged()
            .returning(|_, _| Err(AppError::HelperFailed { code: 127, stderr: "Not authorized".into() }));
        services.writer = Box::new(writer);
        let mut app = create_test_app_with(services);
        app.model.add_range(None);
        start_save(&mut app);
        confirm_save(&mut app);
        assert!(app.show_error_popup);
        assert!(app.error_message.contains("Not authorized"));
        assert!(app.is_dirty());
    }

    #[test]
    fn test_strict_ranges_blocks_save() {
        let mut app = create_test_app();
        app.settings.strict_ranges = true;
        let id = app.model.ranges(None)[0].id();
        app.model.update_range(id, 60, 40, Level::Numeric(0));
        start_save(&mut app);
        assert!(!app.show_preview_popup);
        assert!(app.show_error_popup);
        assert!(app.error_detail.is_some());
    }

    #[test]
    fn test_set_fan_mode_permission_error_escalates() {
        let mut services = fake_services();
        let mut esc = MockPrivilegeEscalator::new();
        esc.expect_grant_fan_access()
            .times(1)
            .returning(|_| Err(AppError::Escalation("authentication dismissed".into())));
        services.escalator = Box::new(esc);
        let mut sink = crate::fan::MockFanSink::new();
        sink.expect_path().return_const(std::path::PathBuf::from("/proc/acpi/ibm/fan"));
        sink.expect_write_level()
            .times(1)
            .returning(|_| Err(std::io::Error::from(std::io::ErrorKind::PermissionDenied)));
        services.fan = Box::new(sink);
        let mut app = create_test_app_with(services);
        set_fan_mode(&mut app, FanSpeed::FullSpeed);
        assert!(app.show_error_popup);
        assert!(app.error_message.contains("dismissed"));
    }

    #[test]
    fn test_manual_level_adjust_clamps() {
        let mut app = create_test_app();
        app.manual_level = 7;
        adjust_manual_level(&mut app, 1);
        assert_eq!(app.manual_level, 7);
        adjust_manual_level(&mut app, -1);
        assert_eq!(app.manual_level, 6);
    }

    #[test]
    fn test_wizard_prechecks_primary_cpu_and_previews() {
        let mut app = create_test_app();
        start_wizard(&mut app);
        assert!(app.show_wizard_popup);
        let checked: Vec<_> =
            app.wizard_channels.iter().filter(|(_, c)| *c).map(|(ch, _)| ch.label.clone()).collect();
        assert_eq!(checked, vec!["Package id 0"]);

        confirm_wizard(&mut app);
        assert!(app.show_preview_popup);
        assert_eq!(app.preview_source, PreviewSource::Generated);
        confirm_save(&mut app);
        assert_eq!(app.model.curve_keys(), vec!["Package id 0"]);
    }

    #[test]
    fn test_wizard_requires_a_selection() {
        let mut app = create_test_app();
        start_wizard(&mut app);
        wizard_toggle(&mut app);
        for (_, checked) in app.wizard_channels.iter_mut() {
            *checked = false;
        }
        confirm_wizard(&mut app);
        assert!(app.show_wizard_popup);
        assert!(!app.show_preview_popup);
    }

    #[test]
    fn test_range_form_rejects_min_above_max() {
        let mut app = create_test_app();
        start_range_form(&mut app);
        let form = app.range_form.clone().unwrap();
        assert_eq!((form.min_temp, form.max_temp), (0, 55));

        range_form_next_field(&mut app);
        range_form_adjust(&mut app, 60);
        assert_eq!(app.range_form.as_ref().unwrap().min_temp, 0);

        range_form_adjust(&mut app, 10);
        range_form_next_field(&mut app);
        range_form_adjust(&mut app, -50);
        assert_eq!(app.range_form.as_ref().unwrap().max_temp, 55);

        apply_range_form(&mut app);
        let r = app.model.range(form.id).unwrap();
        assert_eq!((r.min_temp, r.max_temp), (10, 55));
    }

    #[test]
    fn test_range_form_level_selector() {
        let mut app = create_test_app();
        start_range_form(&mut app);
        range_form_adjust(&mut app, 1);
        assert_eq!(app.range_form.as_ref().unwrap().level, Level::Numeric(1));
        range_form_adjust(&mut app, -5);
        assert_eq!(app.range_form.as_ref().unwrap().level, Level::Auto);
        cancel_range_form(&mut app);
        assert_eq!(app.model.ranges(None)[0].level, Level::Numeric(0));
    }

    #[test]
    fn test_keyboard_drag_commits_once() {
        let mut app = create_test_app();
        let id = app.model.ranges(None)[0].id();
        let revision = app.model.revision();
        editor_toggle_endpoint(&mut app);
        editor_nudge(&mut app, 3, 0);
        editor_nudge(&mut app, 2, 0);
        assert_eq!(app.model.revision(), revision);
        editor_commit(&mut app);
        assert_eq!(app.model.revision(), revision + 1);
        assert_eq!(app.model.range(id).unwrap().max_temp, 60);
    }

    #[test]
    fn test_add_and_remove_range_via_editor() {
        let mut app = create_test_app();
        editor_add_range(&mut app);
        assert_eq!(app.editor.handles().len(), 6);
        editor_remove_range(&mut app);
        assert_eq!(app.editor.handles().len(), 5);
    }

    #[test]
    fn test_cycle_curve() {
        let mut app = create_test_app();
        editor_cycle_curve(&mut app, true);
        assert_eq!(app.model.active_key(), Some("Default"));
    }

    #[test]
    fn test_on_activation_returns_to_status() {
        let mut app = create_test_app();
        app.page = Page::Editor;
        on_activation(&mut app);
        assert_eq!(app.page, Page::Status);
    }
}
