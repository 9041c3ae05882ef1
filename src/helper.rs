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

//! Logic of the privileged save helper. It runs as root under pkexec and
//! writes exactly one file.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Component, Path, PathBuf};

use crate::error::{AppError, Result};

/// Resolves `.` and `..` without touching the filesystem. Relative paths
/// stay relative.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Accepts `requested` only if it names `allowed`.
pub fn check_target(requested: &Path, allowed: &Path) -> Result<PathBuf> {
    let normalized = normalize(requested);
    if !normalized.is_absolute() || normalized != normalize(allowed) {
        return Err(AppError::HelperRefused(requested.to_path_buf()));
    }
    Ok(normalized)
}

pub fn write_config(requested: &Path, allowed: &Path, content: &str) -> Result<()> {
    let target = check_target(requested, allowed)?;
    fs::write(&target, content).map_err(|source| AppError::FileWrite { path: target.clone(), source })?;
    // thinkfan reads it as root, the editor as the user
    let _ = fs::set_permissions(&target, fs::Permissions::from_mode(0o644));
    Ok(())
}

/// Entry point shared with the binary: `<path> <content>`. Returns the exit
/// code and prints diagnostics to stderr.
pub fn run(args: &[String], allowed: &Path) -> i32 {
    let [path, content] = args else {
        eprintln!("usage: thinkfan-save-helper <path> <content>");
        return 1;
    };
    match write_config(Path::new(path), allowed, content) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{}", e);
            1
        }
    }
}
