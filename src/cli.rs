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

//! Command Line Interface
//!
//! Headless access to the fan, the sensors and the thinkfan configuration.

use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::app::Services;
use crate::codec;
use crate::config::Settings;
use crate::fan::{self, FanSpeed};
use crate::model::CurveModel;
use crate::sensors;

#[derive(Parser, Debug)]
#[command(name = "thinkfan-ui")]
#[command(version)]
#[command(about = "ThinkFan UI - fan status and thinkfan curve editor for ThinkPads")]
#[command(long_about = "ThinkFan UI - fan status and thinkfan curve editor for ThinkPads

EXAMPLES:
    thinkfan-ui                        Launch the terminal UI (default)
    thinkfan-ui status                 Show temperatures and fan state
    thinkfan-ui set auto               Hand the fan back to the firmware
    thinkfan-ui set 5                  Pin the fan to level 5
    thinkfan-ui sensors                List temperature inputs for thinkfan
    thinkfan-ui export                 Print the curves as thinkfan.conf

ENVIRONMENT VARIABLES:
    THINKFAN_UI_LOG=debug  Log filter (tracing EnvFilter syntax)

FILES:
    ~/.config/thinkfan-ui/settings.json   Application settings
    /etc/thinkfan.conf                    thinkfan configuration")]
pub struct Cli {
    /// Write a log file while the terminal UI runs
    #[arg(long)]
    pub logging: bool,

    /// thinkfan configuration to edit
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// thinkpad_acpi fan control file
    #[arg(long, value_name = "PATH")]
    pub fan: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Show temperatures and fan state
    Status,
    /// Set the fan mode: 0-7, auto, full-speed or disengaged
    Set {
        level: String,
    },
    /// List temperature inputs found by lm-sensors
    Sensors,
    /// Print the configuration as it would be saved
    Export,
}

impl Cli {
    /// Command-line paths override the stored settings.
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(path) = &self.config {
            settings.config_path = path.clone();
        }
        if let Some(path) = &self.fan {
            settings.fan_path = path.clone();
        }
    }
}

pub fn run_command(command: &Commands, settings: &Settings, services: &Services, out: &mut dyn Write) -> anyhow::Result<()> {
    match command {
        Commands::Status => print_status(settings, services, out),
        Commands::Set { level } => {
            let speed: FanSpeed = level.parse()?;
            fan::set_fan_speed(services.fan.as_ref(), services.escalator.as_ref(), speed)?;
            writeln!(out, "Fan level set to {}", speed)?;
            Ok(())
        }
        Commands::Sensors => {
            match sensors::query_sensors(services.runner.as_ref(), &settings.sensors_command)? {
                Some(report) => {
                    for ch in sensors::discover_temperature_inputs(&report) {
                        let mark = if ch.is_primary_cpu() { "*" } else { " " };
                        writeln!(out, "{} {:<28} {:<24} temp{}_input", mark, ch.device, ch.label, ch.channel)?;
                    }
                }
                None => writeln!(out, "lm-sensors is not installed")?,
            }
            Ok(())
        }
        Commands::Export => {
            let set = codec::load_file(&settings.config_path)?;
            let existing = codec::read_existing(&settings.config_path);
            let set = if set.is_empty() { CurveModel::new().to_curve_set() } else { set };
            write!(out, "{}", codec::serialize(&set, existing.as_deref()))?;
            Ok(())
        }
    }
}

fn print_status(settings: &Settings, services: &Services, out: &mut dyn Write) -> anyhow::Result<()> {
    match sensors::query_sensors(services.runner.as_ref(), &settings.sensors_command)? {
        Some(report) => {
            let snapshot = sensors::read_snapshot(&report);
            for t in &snapshot.temperatures {
                writeln!(out, "{:<28} {:<24} {:>6.1} °C", t.device, t.label, t.celsius)?;
            }
            for fan in &snapshot.fans {
                writeln!(out, "{:<28} {:<24} {:>6.0} RPM", fan.device, fan.label, fan.rpm)?;
            }
        }
        None => writeln!(out, "lm-sensors is not installed")?,
    }
    match fan::read_status(services.fan.as_ref()) {
        Ok(status) => {
            let rpm = status.speed_rpm.map(|r| r.to_string()).unwrap_or_else(|| "?".to_string());
            writeln!(out, "fan: {} | level {} | {} RPM", status.status, status.level, rpm)?;
        }
        Err(e) => writeln!(out, "fan: {}", e)?,
    }
    Ok(())
}
