//! Host process lifecycle management
//!
//! Finds, launches and stops the host application process.
//!
//! # Termination
//! - Send SIGTERM to every matching process (polite close, unix only)
//! - Wait up to the grace period for them to exit
//! - Forcefully kill anything still alive
//!
//! # Interrupts
//! A Ctrl+C during a run would otherwise leave a pending command in the queue
//! directory, which the listener would execute on its next scan. The handler
//! installed by [`init_interrupt_handler`] purges the queue before exiting.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use log::{debug, info, warn};
use sysinfo::{Pid, ProcessesToUpdate, System};

use crate::command_queue::purge_dir;
use crate::error::{AutomationError, Result};
use crate::poll::{SystemClock, poll_until};

/// PIDs of all processes whose name matches `name` (case-insensitive).
pub fn find_pids(name: &str) -> Vec<u32> {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);
    matching_pids(&system, name)
}

fn matching_pids(system: &System, name: &str) -> Vec<u32> {
    let wanted = name.to_lowercase();
    system
        .processes()
        .iter()
        .filter(|(_, process)| process.name().to_string_lossy().to_lowercase() == wanted)
        .map(|(pid, _)| pid.as_u32())
        .collect()
}

/// Start the host with `project` open.
///
/// The host is not attached to this process: it keeps running if the
/// orchestrator exits, and is stopped explicitly with [`terminate`].
pub fn launch(executable: &Path, project: &Path) -> Result<Child> {
    if !executable.exists() {
        return Err(AutomationError::HostNotFound {
            path: executable.to_path_buf(),
        });
    }
    info!("Launching {} with {}", executable.display(), project.display());
    let child = Command::new(executable)
        .arg(project)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    debug!("Host started with PID {}", child.id());
    Ok(child)
}

/// Stop every process called `name`; returns how many were found.
///
/// Sends SIGTERM first (unix), waits up to `grace`, then kills survivors.
pub fn terminate(name: &str, grace: Duration) -> usize {
    let pids = find_pids(name);
    if pids.is_empty() {
        debug!("No {} process to terminate", name);
        return 0;
    }
    info!("Terminating {} {} process(es)...", pids.len(), name);

    for &pid in &pids {
        if let Err(e) = request_exit(pid) {
            warn!("Failed to send SIGTERM to PID {}: {}", pid, e);
        }
    }

    let mut system = System::new();
    let gone = poll_until(&SystemClock, Duration::from_millis(250), grace, || {
        system.refresh_processes(ProcessesToUpdate::All, true);
        pids.iter()
            .all(|&pid| system.process(Pid::from_u32(pid)).is_none())
    });
    if gone.satisfied {
        info!("Host exited gracefully");
        return pids.len();
    }

    for &pid in &pids {
        if let Some(process) = system.process(Pid::from_u32(pid)) {
            warn!("PID {} did not exit, killing it", pid);
            if !process.kill() {
                warn!("Failed to kill PID {}", pid);
            }
        }
    }
    pids.len()
}

#[cfg(unix)]
fn request_exit(pid: u32) -> std::result::Result<(), nix::Error> {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid as NixPid;

    let raw = i32::try_from(pid).map_err(|_| nix::Error::EINVAL)?;
    kill(NixPid::from_raw(raw), Signal::SIGTERM)
}

#[cfg(not(unix))]
fn request_exit(_pid: u32) -> std::result::Result<(), std::io::Error> {
    // No polite close signal; the forced kill below handles it
    Ok(())
}

/// Purge the queue directory and exit when the user interrupts the run.
///
/// Call this once at program start.
pub fn init_interrupt_handler(queue_dir: PathBuf) -> Result<()> {
    ctrlc::set_handler(move || {
        info!("Interrupted, cleaning up the command queue...");
        match purge_dir(&queue_dir) {
            Ok(0) => {}
            Ok(n) => info!("Removed {} pending command(s)", n),
            Err(e) => warn!("Failed to purge {}: {}", queue_dir.display(), e),
        }
        std::process::exit(130);
    })
    .map_err(|e| AutomationError::Io(std::io::Error::other(e)))
}
