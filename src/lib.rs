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

//! ThinkFan UI - ThinkPad fan monitor and thinkfan curve editor
//!
//! This library reads lm-sensors output and the thinkpad_acpi fan file,
//! drives the fan level, and edits the `levels:` section of thinkfan.conf
//! through a drag-based curve editor.

pub mod app;
pub mod cli;
pub mod codec;
pub mod config;
pub mod editor;
pub mod error;
pub mod events;
pub mod fan;
pub mod handlers;
pub mod helper;
pub mod instance;
pub mod level;
pub mod logger;
pub mod mapper;
pub mod model;
pub mod privilege;
pub mod sensors;
pub mod ui;

#[cfg(test)]
pub mod test_utils;
