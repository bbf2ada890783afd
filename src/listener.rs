//! Installation of the queue listener into the host's startup scripts.
//!
//! The listener only loads when the host starts, so a fresh install needs a
//! host restart before the queue is serviced.

use std::path::{Path, PathBuf};

use log::info;

use crate::error::{AutomationError, Result};
use crate::script_template::{LISTENER_SCRIPT, LISTENER_SOURCE};

const QUEUE_FOLDER_PLACEHOLDER: &str = "{QUEUE_FOLDER}";

/// What [`install`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerInstall {
    /// The listener was written to this path
    Installed(PathBuf),
    /// A listener already exists here and `force` was not set
    AlreadyPresent(PathBuf),
}

/// Listener source with the queue directory baked in as its fallback.
pub fn listener_source(queue_dir: &Path) -> String {
    // The script is JavaScript; forward slashes work on every host platform
    let folder = queue_dir.display().to_string().replace('\\', "/");
    LISTENER_SOURCE.replace(QUEUE_FOLDER_PLACEHOLDER, &folder)
}

/// Write the listener into `startup_dir`, overwriting only when `force` is set.
pub fn install(startup_dir: &Path, queue_dir: &Path, force: bool) -> Result<ListenerInstall> {
    if !startup_dir.is_dir() {
        return Err(AutomationError::config(
            "startup_scripts_dir",
            format!("{} is not a directory", startup_dir.display()),
        ));
    }
    let target = startup_dir.join(LISTENER_SCRIPT);
    if target.exists() && !force {
        info!("Listener already installed at {}", target.display());
        return Ok(ListenerInstall::AlreadyPresent(target));
    }

    std::fs::write(&target, listener_source(queue_dir))?;
    info!("Installed listener to {}", target.display());
    info!("Restart the host to load it");
    Ok(ListenerInstall::Installed(target))
}
