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

//! Single-instance guard over a Unix domain socket.

use std::env;
use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::Result;

const SOCKET_NAME: &str = "thinkfan-ui-5b1c0f52-8e0d-4c36-9a51-0d2f6ac3e7a4.sock";
const ACTIVATE: &str = "activate";

pub fn socket_path() -> PathBuf {
    let dir = env::var_os("XDG_RUNTIME_DIR").map(PathBuf::from).unwrap_or_else(env::temp_dir);
    dir.join(SOCKET_NAME)
}

#[derive(Debug)]
pub enum InstanceRole {
    /// This process owns the socket.
    Primary(InstanceGuard),
    /// Another instance is running and was asked to come forward.
    Secondary,
}

/// Listening socket of the primary instance. Removes the socket file on drop.
#[derive(Debug)]
pub struct InstanceGuard {
    listener: UnixListener,
    path: PathBuf,
}

/// Connects to a running instance or becomes the primary one.
pub fn acquire(path: &Path) -> Result<InstanceRole> {
    match UnixStream::connect(path) {
        Ok(mut stream) => {
            stream.write_all(format!("{}\n", ACTIVATE).as_bytes())?;
            info!(socket = %path.display(), "another instance is running, asked it to activate");
            return Ok(InstanceRole::Secondary);
        }
        Err(e) => debug!(error = %e, "no running instance"),
    }

    // Stale socket left by a crashed instance
    if path.exists() {
        warn!(socket = %path.display(), "removing stale instance socket");
        fs::remove_file(path)?;
    }
    let listener = UnixListener::bind(path)?;
    listener.set_nonblocking(true)?;
    Ok(InstanceRole::Primary(InstanceGuard { listener, path: path.to_path_buf() }))
}

impl InstanceGuard {
    /// Drains pending connections; true if any asked for activation.
    pub fn poll_activation(&self) -> bool {
        let mut activated = false;
        loop {
            match self.listener.accept() {
                Ok((stream, _)) => activated |= read_activation(stream),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!(error = %e, "instance socket accept failed");
                    break;
                }
            }
        }
        activated
    }
}

fn read_activation(stream: UnixStream) -> bool {
    if stream.set_nonblocking(false).is_err() || stream.set_read_timeout(Some(Duration::from_millis(200))).is_err() {
        return false;
    }
    let mut line = String::new();
    match BufReader::new(stream).read_line(&mut line) {
        Ok(_) => line.trim() == ACTIVATE,
        Err(e) => {
            debug!(error = %e, "could not read from instance socket");
            false
        }
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}
