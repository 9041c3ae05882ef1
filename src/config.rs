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

//! Application settings (not the thinkfan configuration itself).

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::codec::DEFAULT_CONFIG_PATH;
use crate::error::{AppError, Result};
use crate::fan::DEFAULT_FAN_PATH;

const APP_DIR: &str = "thinkfan-ui";

fn default_config_path() -> PathBuf { PathBuf::from(DEFAULT_CONFIG_PATH) }
fn default_fan_path() -> PathBuf { PathBuf::from(DEFAULT_FAN_PATH) }
fn default_helper_path() -> PathBuf { PathBuf::from("/usr/bin/thinkfan-save-helper") }
fn default_sensors_command() -> Vec<String> { vec!["sensors".to_string(), "-j".to_string()] }
fn default_refresh_ms() -> u64 { 1000 }

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// thinkfan configuration edited by the curve editor.
    #[serde(default = "default_config_path")]
    pub config_path: PathBuf,
    #[serde(default = "default_fan_path")]
    pub fan_path: PathBuf,
    /// Privileged writer started through pkexec.
    #[serde(default = "default_helper_path")]
    pub helper_path: PathBuf,
    #[serde(default = "default_sensors_command")]
    pub sensors_command: Vec<String>,
    #[serde(default = "default_refresh_ms")]
    pub refresh_ms: u64,
    /// Refuse to save curves with inverted or shadowed ranges.
    #[serde(default)]
    pub strict_ranges: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_path: default_config_path(),
            fan_path: default_fan_path(),
            helper_path: default_helper_path(),
            sensors_command: default_sensors_command(),
            refresh_ms: default_refresh_ms(),
            strict_ranges: false,
        }
    }
}

pub fn settings_path() -> PathBuf {
    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        return Path::new(&xdg).join(APP_DIR).join("settings.json");
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join(APP_DIR).join("settings.json");
    }
    PathBuf::from("/etc").join(APP_DIR).join("settings.json")
}

fn is_safe_program(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= 256
        && s.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '_' | '-' | '.' | '+'))
}

pub fn validate_settings(settings: &Settings) -> Result<()> {
    for (field, path) in [
        ("config_path", &settings.config_path),
        ("fan_path", &settings.fan_path),
        ("helper_path", &settings.helper_path),
    ] {
        if !path.is_absolute() {
            return Err(AppError::InvalidSetting { field, reason: format!("{} is not absolute", path.display()) });
        }
    }
    match settings.sensors_command.first() {
        Some(program) if is_safe_program(program) => {}
        Some(program) => {
            return Err(AppError::InvalidSetting {
                field: "sensors_command",
                reason: format!("unsupported program name {:?}", program),
            })
        }
        None => return Err(AppError::InvalidSetting { field: "sensors_command", reason: "empty".into() }),
    }
    if !(100..=60_000).contains(&settings.refresh_ms) {
        return Err(AppError::InvalidSetting {
            field: "refresh_ms",
            reason: format!("{} is outside 100..=60000", settings.refresh_ms),
        });
    }
    Ok(())
}

/// Loads and validates settings from `path`. A missing file yields defaults.
pub fn load_settings_from(path: &Path) -> Result<Settings> {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Settings::default()),
        Err(e) => return Err(e.into()),
    };
    let settings: Settings = serde_json::from_str(&data)?;
    validate_settings(&settings)?;
    Ok(settings)
}

/// Settings from the user's config dir, falling back to defaults on any error.
pub fn load_settings() -> Settings {
    let path = settings_path();
    load_settings_from(&path).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "ignoring invalid settings");
        Settings::default()
    })
}

pub fn save_settings_to(path: &Path, settings: &Settings) -> Result<()> {
    validate_settings(settings)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json).map_err(|source| AppError::FileWrite { path: path.to_path_buf(), source })
}
