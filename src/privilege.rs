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

//! Privileged operations through pkexec.

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{AppError, Result};
use crate::sensors::{CommandOutput, CommandRunner};

const PKEXEC: &str = "pkexec";
/// pkexec exit status when the authentication dialog was dismissed.
const PKEXEC_DISMISSED: i32 = 126;

/// Writes the thinkfan configuration with elevated rights.
#[cfg_attr(test, mockall::automock)]
pub trait PrivilegedWriter {
    fn write_privileged(&self, path: &Path, text: &str) -> Result<()>;
}

/// Makes the fan control file writable for the current user.
#[cfg_attr(test, mockall::automock)]
pub trait PrivilegeEscalator {
    fn grant_fan_access(&self, path: &Path) -> Result<()>;
}

/// Runs the save helper and permission changes via pkexec.
pub struct Pkexec {
    runner: Box<dyn CommandRunner>,
    helper: PathBuf,
}

impl Pkexec {
    pub fn new(runner: Box<dyn CommandRunner>, helper: impl Into<PathBuf>) -> Self {
        Self { runner, helper: helper.into() }
    }

    fn run(&self, args: Vec<String>) -> Result<CommandOutput> {
        self.runner
            .run(PKEXEC, &args)
            .map_err(|e| AppError::Escalation(format!("failed to start {}: {}", PKEXEC, e)))
    }
}

impl PrivilegedWriter for Pkexec {
    fn write_privileged(&self, path: &Path, text: &str) -> Result<()> {
        let output = self.run(vec![
            self.helper.display().to_string(),
            path.display().to_string(),
            text.to_string(),
        ])?;
        if output.success {
            return Ok(());
        }
        Err(AppError::HelperFailed { code: output.code.unwrap_or(-1), stderr: output.stderr })
    }
}

impl PrivilegeEscalator for Pkexec {
    fn grant_fan_access(&self, path: &Path) -> Result<()> {
        let target = path.display().to_string();
        // SAFETY: getuid has no preconditions and cannot fail.
        let uid = unsafe { libc::getuid() };

        let chown = self.run(vec!["chown".into(), uid.to_string(), target.clone()])?;
        if chown.success {
            info!(path = %path.display(), uid, "fan control file now owned by user");
            return Ok(());
        }
        if chown.code == Some(PKEXEC_DISMISSED) {
            return Err(AppError::Escalation("authentication dismissed".into()));
        }

        warn!(stderr = %chown.stderr, "chown failed, falling back to chmod");
        let chmod = self.run(vec!["chmod".into(), "666".into(), target])?;
        if chmod.success {
            info!(path = %path.display(), "fan control file made world-writable");
            return Ok(());
        }
        Err(AppError::Escalation(if chmod.stderr.is_empty() {
            format!("chmod exited with {:?}", chmod.code)
        } else {
            chmod.stderr
        }))
    }
}

/// Whether the current user may write `path`. A missing file counts as
/// writable: there is nothing to escalate for.
pub fn can_write(path: &Path) -> bool {
    if !path.exists() {
        return true;
    }
    let Ok(c_path) = CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    // SAFETY: c_path is a valid NUL-terminated string for the duration of the call.
    unsafe { libc::access(c_path.as_ptr(), libc::W_OK) == 0 }
}
