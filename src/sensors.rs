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

//! lm-sensors readings via `sensors -j`.

use std::io;
use std::process::Command;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{AppError, Result};

lazy_static! {
    static ref TEMP_INPUT: Regex = Regex::new(r"^temp(\d+)_input$").expect("valid regex");
    static ref FAN_INPUT: Regex = Regex::new(r"^fan(\d+)_input$").expect("valid regex");
}

/// Chips and labels thinkfan users most often want as the main CPU sensor.
const PRIMARY_CPU_CHIPS: &[&str] = &["coretemp", "k10temp"];
const PRIMARY_CPU_LABELS: &[&str] = &["Package id 0", "Tctl", "Tdie"];

/// Captured result of an external command.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Runs external programs. Mocked in tests.
#[cfg_attr(test, mockall::automock)]
pub trait CommandRunner {
    fn run(&self, program: &str, args: &[String]) -> io::Result<CommandOutput>;
}

pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> io::Result<CommandOutput> {
        debug!(program, ?args, "running command");
        let output = Command::new(program).args(args).output()?;
        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// A `tempN_input` metric found in a sensors report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SensorChannel {
    /// Chip name, e.g. `coretemp-isa-0000`.
    pub device: String,
    pub label: String,
    /// The `N` of `tempN_input`.
    pub channel: u32,
}

impl SensorChannel {
    pub fn is_primary_cpu(&self) -> bool {
        PRIMARY_CPU_CHIPS.iter().any(|chip| self.device.starts_with(chip))
            && PRIMARY_CPU_LABELS.contains(&self.label.as_str())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TemperatureReading {
    pub device: String,
    pub label: String,
    pub celsius: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FanReading {
    pub device: String,
    pub label: String,
    pub rpm: f64,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SensorSnapshot {
    pub temperatures: Vec<TemperatureReading>,
    pub fans: Vec<FanReading>,
}

/// Runs the sensors command and parses its JSON.
///
/// Returns `Ok(None)` when the program is not installed.
pub fn query_sensors(runner: &dyn CommandRunner, command: &[String]) -> Result<Option<Value>> {
    let Some((program, args)) = command.split_first() else {
        return Err(AppError::SensorCommand("empty sensors command".to_string()));
    };
    let output = match runner.run(program, args) {
        Ok(output) => output,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!(program = program.as_str(), "sensors command not found; is lm-sensors installed?");
            return Ok(None);
        }
        Err(e) => return Err(AppError::SensorCommand(format!("{}: {}", program, e))),
    };
    if !output.success {
        return Err(AppError::SensorCommand(if output.stderr.is_empty() {
            format!("{} exited with {:?}", program, output.code)
        } else {
            output.stderr
        }));
    }
    Ok(Some(serde_json::from_str(&output.stdout)?))
}

/// Walks `device -> label -> metric` and yields matching metric values.
fn metrics<'a>(report: &'a Value, pattern: &'a Regex) -> impl Iterator<Item = (&'a str, &'a str, u32, &'a Value)> + 'a {
    report.as_object().into_iter().flat_map(move |devices| {
        devices.iter().flat_map(move |(device, labels)| {
            labels.as_object().into_iter().flat_map(move |labels| {
                labels.iter().flat_map(move |(label, metrics)| {
                    metrics.as_object().into_iter().flat_map(move |metrics| {
                        metrics.iter().filter_map(move |(key, value)| {
                            let channel = pattern.captures(key)?.get(1)?.as_str().parse().ok()?;
                            Some((device.as_str(), label.as_str(), channel, value))
                        })
                    })
                })
            })
        })
    })
}

/// Every `tempN_input` in the report, ordered by device and then label name.
pub fn discover_temperature_inputs(report: &Value) -> Vec<SensorChannel> {
    metrics(report, &TEMP_INPUT)
        .map(|(device, label, channel, _)| SensorChannel {
            device: device.to_string(),
            label: label.to_string(),
            channel,
        })
        .collect()
}

pub fn read_snapshot(report: &Value) -> SensorSnapshot {
    let temperatures = metrics(report, &TEMP_INPUT)
        .filter_map(|(device, label, _, v)| {
            Some(TemperatureReading { device: device.to_string(), label: label.to_string(), celsius: v.as_f64()? })
        })
        .collect();
    let fans = metrics(report, &FAN_INPUT)
        .filter_map(|(device, label, _, v)| {
            Some(FanReading { device: device.to_string(), label: label.to_string(), rpm: v.as_f64()? })
        })
        .collect();
    SensorSnapshot { temperatures, fans }
}
