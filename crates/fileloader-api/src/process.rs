//! # Process Supervision
//!
//! Pid file ownership and the optional switch to an unprivileged account
//! once the listener is bound.
//!
//! A pid file naming a live process blocks startup. One naming a process
//! that no longer exists is stale and gets replaced.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};

/// A pid file written by this process.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
    pid: u32,
}

impl PidFile {
    /// Claim `path` for the current process.
    pub fn acquire(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let pid = std::process::id();

        match fs::read_to_string(&path) {
            Ok(raw) => match parse_pid(&raw) {
                Some(existing) if is_running(existing) => {
                    bail!("already running with pid {existing} ({})", path.display());
                }
                Some(existing) => {
                    tracing::warn!(path = %path.display(), pid = existing, "removing stale pid file");
                    remove(&path)?;
                }
                None => {
                    tracing::warn!(path = %path.display(), "removing malformed pid file");
                    remove(&path)?;
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read pid file {}", path.display()));
            }
        }

        fs::write(&path, format!("{pid}\n"))
            .with_context(|| format!("failed to write pid file {}", path.display()))?;
        Ok(Self { path, pid })
    }

    /// Path of the pid file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the file if it still names this process.
    pub fn release(self) {
        let current = fs::read_to_string(&self.path)
            .ok()
            .and_then(|raw| parse_pid(&raw));
        if current != Some(self.pid) {
            tracing::warn!(path = %self.path.display(), "pid file taken over, leaving it");
            return;
        }
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to remove pid file");
        }
    }
}

fn parse_pid(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|&pid| pid > 0)
}

fn is_running(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

fn remove(path: &Path) -> anyhow::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("failed to remove pid file {}", path.display())),
    }
}

#[cfg(unix)]
pub use nix::unistd::User;

/// Look up a local account by name.
#[cfg(unix)]
pub fn resolve_user(name: &str) -> anyhow::Result<User> {
    User::from_name(name)
        .with_context(|| format!("failed to look up user {name}"))?
        .with_context(|| format!("unknown user {name}"))
}

/// Switch the process to `user`. Group first, while still privileged.
#[cfg(unix)]
pub fn drop_privileges(user: &User) -> anyhow::Result<()> {
    tracing::info!(user = %user.name, uid = %user.uid, gid = %user.gid, "changing user");
    nix::unistd::setgid(user.gid)
        .with_context(|| format!("failed to set gid {}", user.gid))?;
    nix::unistd::setuid(user.uid)
        .with_context(|| format!("failed to set uid {}", user.uid))?;
    Ok(())
}
