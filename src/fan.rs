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

//! The thinkpad_acpi fan control file.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{info, warn};

use crate::error::{AppError, Result};
use crate::level::MAX_NUMERIC_LEVEL;
use crate::privilege::PrivilegeEscalator;

pub const DEFAULT_FAN_PATH: &str = "/proc/acpi/ibm/fan";

/// Value accepted by the `level` command of the fan file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FanSpeed {
    Level(u8),
    Auto,
    FullSpeed,
    Disengaged,
}

impl fmt::Display for FanSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FanSpeed::Level(n) => write!(f, "{}", n),
            FanSpeed::Auto => f.write_str("auto"),
            FanSpeed::FullSpeed => f.write_str("full-speed"),
            FanSpeed::Disengaged => f.write_str("disengaged"),
        }
    }
}

impl FromStr for FanSpeed {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(FanSpeed::Auto),
            "full-speed" | "full" => Ok(FanSpeed::FullSpeed),
            "disengaged" => Ok(FanSpeed::Disengaged),
            other => match other.parse::<u8>() {
                Ok(n) if n <= MAX_NUMERIC_LEVEL => Ok(FanSpeed::Level(n)),
                _ => Err(AppError::InvalidFanLevel(s.to_string())),
            },
        }
    }
}

/// Destination of fan level commands.
#[cfg_attr(test, mockall::automock)]
pub trait FanSink {
    fn path(&self) -> PathBuf;
    fn write_level(&self, speed: FanSpeed) -> io::Result<()>;
    fn read_status(&self) -> io::Result<String>;
}

pub struct ProcFanSink {
    path: PathBuf,
}

impl ProcFanSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl FanSink for ProcFanSink {
    fn path(&self) -> PathBuf {
        self.path.clone()
    }

    fn write_level(&self, speed: FanSpeed) -> io::Result<()> {
        let mut file = OpenOptions::new().write(true).truncate(true).open(&self.path)?;
        file.write_all(format!("level {}", speed).as_bytes())
    }

    fn read_status(&self) -> io::Result<String> {
        fs::read_to_string(&self.path)
    }
}

/// Parsed content of the fan file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FanStatus {
    pub status: String,
    pub speed_rpm: Option<u32>,
    pub level: String,
}

pub fn parse_status(text: &str) -> FanStatus {
    let mut out = FanStatus::default();
    for line in text.lines() {
        let Some((key, value)) = line.split_once(':') else { continue };
        let value = value.trim();
        match key.trim() {
            "status" => out.status = value.to_string(),
            "speed" => out.speed_rpm = value.parse().ok(),
            "level" => out.level = value.to_string(),
            _ => {}
        }
    }
    out
}

pub fn read_status(sink: &dyn FanSink) -> Result<FanStatus> {
    let path = sink.path();
    sink.read_status().map(|text| parse_status(&text)).map_err(|e| classify(&path, e))
}

fn classify(path: &Path, err: io::Error) -> AppError {
    match err.kind() {
        io::ErrorKind::PermissionDenied => AppError::FanPermissionDenied(path.to_path_buf()),
        io::ErrorKind::NotFound => AppError::FanNotFound(path.to_path_buf()),
        _ => AppError::FanDriver { path: path.to_path_buf(), source: err },
    }
}

/// Writes `level <speed>`. On a permission error, asks `escalator` for access
/// once and retries once.
pub fn set_fan_speed(sink: &dyn FanSink, escalator: &dyn PrivilegeEscalator, speed: FanSpeed) -> Result<()> {
    let path = sink.path();
    match sink.write_level(speed) {
        Ok(()) => {
            info!(%speed, "fan level set");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            warn!(path = %path.display(), "no write access to fan control file, escalating");
            escalator.grant_fan_access(&path)?;
            sink.write_level(speed).map_err(|e| classify(&path, e))?;
            info!(%speed, "fan level set after escalation");
            Ok(())
        }
        Err(e) => Err(classify(&path, e)),
    }
}
