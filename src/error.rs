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

//! Error type shared by the library modules.

use std::io;
use std::path::PathBuf;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    // ============================================================================
    // I/O
    // ============================================================================
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: io::Error,
    },

    // ============================================================================
    // thinkfan.conf
    // ============================================================================
    #[error("thinkfan.conf line {line}: {reason}")]
    ConfigSyntax {
        line: usize,
        reason: String,
    },

    // ============================================================================
    // Sensors
    // ============================================================================
    #[error("Failed to parse sensor report: {0}")]
    SensorJson(#[from] serde_json::Error),

    #[error("Sensor command failed: {0}")]
    SensorCommand(String),

    // ============================================================================
    // Fan control file
    // ============================================================================
    #[error("Missing permissions! Failed to set fan speed via {0}")]
    FanPermissionDenied(PathBuf),

    #[error("{0} does not exist!")]
    FanNotFound(PathBuf),

    #[error("\"thinkpad_acpi\" does not seem to be set up correctly ({path}): {source}")]
    FanDriver {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Invalid fan level: {0}")]
    InvalidFanLevel(String),

    // ============================================================================
    // Privilege escalation
    // ============================================================================
    #[error("Privilege escalation failed: {0}")]
    Escalation(String),

    #[error("Save helper exited with code {code}: {stderr}")]
    HelperFailed {
        code: i32,
        stderr: String,
    },

    #[error("Refusing to write {0}: only the thinkfan configuration may be written")]
    HelperRefused(PathBuf),

    // ============================================================================
    // Settings / instance
    // ============================================================================
    #[error("Invalid setting {field}: {reason}")]
    InvalidSetting {
        field: &'static str,
        reason: String,
    },
}

impl AppError {
    /// Extra text shown in the detail area of an error dialog.
    pub fn detail(&self) -> Option<&'static str> {
        match self {
            AppError::FanDriver { .. } => Some(
                "Please check that /etc/modprobe.d/thinkpad_acpi.conf contains \"options thinkpad_acpi fan_control=1\"",
            ),
            AppError::FanPermissionDenied(_) => {
                Some("Write access to the fan control file was requested once and still failed.")
            }
            _ => None,
        }
    }

    /// Missing-resource conditions are shown as empty state, not as errors.
    pub fn is_recoverable_missing(&self) -> bool {
        matches!(self, AppError::Io(e) if e.kind() == io::ErrorKind::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_syntax_display() {
        let err = AppError::ConfigSyntax { line: 7, reason: "unbalanced '['".into() };
        assert_eq!(err.to_string(), "thinkfan.conf line 7: unbalanced '['");
    }

    #[test]
    fn test_helper_failed_display_contains_stderr() {
        let err = AppError::HelperFailed { code: 1, stderr: "nope".into() };
        assert!(err.to_string().contains("nope"));
        assert!(err.to_string().contains("code 1"));
    }

    #[test]
    fn test_driver_error_has_modprobe_detail() {
        let err = AppError::FanDriver {
            path: PathBuf::from("/proc/acpi/ibm/fan"),
            source: io::Error::new(io::ErrorKind::InvalidInput, "EINVAL"),
        };
        assert!(err.detail().unwrap().contains("fan_control=1"));
    }

    #[test]
    fn test_recoverable_missing() {
        let missing = AppError::Io(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(missing.is_recoverable_missing());
        let denied = AppError::Io(io::Error::new(io::ErrorKind::PermissionDenied, "no"));
        assert!(!denied.is_recoverable_missing());
    }
}
