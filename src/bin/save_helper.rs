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

//! Privileged writer for /etc/thinkfan.conf, started through pkexec.

use std::path::Path;

use thinkfan_ui::codec::DEFAULT_CONFIG_PATH;
use thinkfan_ui::helper;

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    std::process::exit(helper::run(&args, Path::new(DEFAULT_CONFIG_PATH)));
}
