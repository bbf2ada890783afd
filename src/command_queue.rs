//! command_queue.rs - Delivers generated scripts to the running host through a queue directory.
//!
//! The host has no RPC surface. A listener script installed in the host's
//! startup folder watches a shared directory; this module is the other half
//! of that mailbox:
//!
//! ```text
//! cmd_1a2b3c4d.tmp  --rename-->  cmd_1a2b3c4d.jsx  (pending)
//!                                  |-- deleted by host            => Consumed
//!                                  |-- renamed to .error by host  => Failed
//!                                  `-- still there after max_wait => Orphaned
//! ```
//!
//! Exactly one orchestrator writes and one listener consumes, and both
//! hand-offs are single `rename`/`unlink` calls, so no locking is needed.
//! Commands are strictly sequential: `submit` does not return until the
//! command reached a terminal state, and no queue file survives any path.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use log::{debug, error, warn};

use crate::config::Timeouts;
use crate::error::Result;
use crate::poll::{Clock, SystemClock, poll_until};
use crate::script_template::CompiledScript;

/// Extension of a published, pending command.
pub const SCRIPT_EXTENSION: &str = "jsx";
/// Extension the host listener renames a failed command to.
pub const ERROR_EXTENSION: &str = "error";
/// Extension used while a command is still being written.
pub const STAGING_EXTENSION: &str = "tmp";

/// Error detail reported by the host for a failed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostError {
    /// Script line the host reported, if any
    pub line: Option<u32>,
    /// Host exception text
    pub message: String,
}

impl HostError {
    /// Parse the listener's `"<line> <message>"` format.
    ///
    /// A missing or non-numeric leading token leaves `line` empty and keeps the
    /// whole text as the message.
    pub fn parse(raw: &str) -> Self {
        let text = raw.trim();
        if let Some((head, rest)) = text.split_once(char::is_whitespace) {
            if let Ok(line) = head.parse::<u32>() {
                return Self {
                    line: Some(line),
                    message: rest.trim().to_string(),
                };
            }
        }
        Self {
            line: None,
            message: text.to_string(),
        }
    }
}

impl std::fmt::Display for HostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.line {
            Some(line) => write!(f, "line {}: {}", line, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Terminal state of a submitted command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The host deleted the command file: executed without error.
    Consumed { waited: Duration },
    /// The host renamed the command to its `.error` sibling.
    Failed { error: HostError, waited: Duration },
    /// Nobody picked the command up within the wait window.
    Orphaned { waited: Duration },
}

impl CommandOutcome {
    /// Returns true only for `Consumed`
    pub fn is_consumed(&self) -> bool {
        matches!(self, Self::Consumed { .. })
    }

    /// Time spent waiting for the terminal state
    pub fn waited(&self) -> Duration {
        match self {
            Self::Consumed { waited } | Self::Failed { waited, .. } | Self::Orphaned { waited } => {
                *waited
            }
        }
    }
}

/// An on-disk unit of work.
#[derive(Debug, Clone)]
pub struct QueuedCommand {
    /// Random identifier, also the file stem (`cmd_xxxxxxxx`)
    pub id: String,
    /// Published path of the script
    pub path: PathBuf,
    /// When the command was published
    pub submitted_at: Instant,
}

impl QueuedCommand {
    /// Path of the error sibling the listener would create for this command
    pub fn error_path(&self) -> PathBuf {
        self.path.with_extension(ERROR_EXTENSION)
    }

    fn staging_path(&self) -> PathBuf {
        self.path.with_extension(STAGING_EXTENSION)
    }
}

/// Anything that can execute a compiled script in the host.
///
/// The production implementation is [`CommandQueue`]; tests substitute
/// recording channels so interpreter behaviour is observable without a host.
pub trait HostChannel {
    /// Deliver `script` and wait for its terminal state.
    fn execute(&mut self, script: &CompiledScript) -> Result<CommandOutcome>;
}

impl<H: HostChannel + ?Sized> HostChannel for &mut H {
    fn execute(&mut self, script: &CompiledScript) -> Result<CommandOutcome> {
        (**self).execute(script)
    }
}

impl<H: HostChannel + ?Sized> HostChannel for Box<H> {
    fn execute(&mut self, script: &CompiledScript) -> Result<CommandOutcome> {
        (**self).execute(script)
    }
}

/// Filesystem single-slot mailbox towards the host listener.
#[derive(Debug)]
pub struct CommandQueue<C: Clock = SystemClock> {
    dir: PathBuf,
    poll_interval: Duration,
    max_wait: Duration,
    clock: C,
    warnings: Vec<String>,
    submitted: usize,
}

impl CommandQueue<SystemClock> {
    /// Create a queue on the wall clock using the configured timings.
    pub fn new(dir: impl Into<PathBuf>, timeouts: &Timeouts) -> Self {
        Self::with_clock(dir, timeouts.queue_poll_interval, timeouts.queue_max_wait, SystemClock)
    }
}

impl<C: Clock> CommandQueue<C> {
    /// Create a queue with explicit timings and clock.
    pub fn with_clock(
        dir: impl Into<PathBuf>,
        poll_interval: Duration,
        max_wait: Duration,
        clock: C,
    ) -> Self {
        Self {
            dir: dir.into(),
            poll_interval,
            max_wait,
            clock,
            warnings: Vec::new(),
            submitted: 0,
        }
    }

    /// Queue directory shared with the host listener
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Warnings recorded for orphaned commands, oldest first
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Number of commands submitted so far
    pub fn submitted(&self) -> usize {
        self.submitted
    }

    /// Publish `script_text` and wait for the host to consume or reject it.
    ///
    /// Transport failures (`Failed`, `Orphaned`) are returned as values; only
    /// local I/O problems (cannot create the directory, cannot write the slot)
    /// are errors, and even then no queue file is left behind.
    pub fn submit(&mut self, script_text: &str) -> io::Result<CommandOutcome> {
        fs::create_dir_all(&self.dir)?;

        let id = new_command_id();
        let command = QueuedCommand {
            path: self.dir.join(format!("{}.{}", id, SCRIPT_EXTENSION)),
            id,
            submitted_at: self.clock.now(),
        };

        if let Err(e) = self.publish(&command, script_text) {
            error!("Error queueing command {}: {}", command.id, e);
            remove_quietly(&command.staging_path());
            remove_quietly(&command.path);
            return Err(e);
        }
        self.submitted += 1;
        debug!("Queued command {} ({} bytes)", command.id, script_text.len());

        let error_path = command.error_path();
        let poll = poll_until(&self.clock, self.poll_interval, self.max_wait, || {
            error_path.exists() || !command.path.exists()
        });

        if error_path.exists() {
            let error = read_host_error(&error_path);
            remove_quietly(&error_path);
            remove_quietly(&command.path);
            warn!("Command {} failed in host: {}", command.id, error);
            return Ok(CommandOutcome::Failed {
                error,
                waited: poll.waited,
            });
        }

        if poll.satisfied {
            debug!("Command {} consumed after {:?}", command.id, poll.waited);
            return Ok(CommandOutcome::Consumed {
                waited: poll.waited,
            });
        }

        let message = format!(
            "Command {} was not processed within {:?}; make sure the host listener script is installed",
            command.id, self.max_wait
        );
        warn!("{}", message);
        self.warnings.push(message);
        remove_quietly(&command.path);
        Ok(CommandOutcome::Orphaned {
            waited: poll.waited,
        })
    }

    /// Remove every pending, staging or error file from the queue directory.
    ///
    /// Run once before the first command of a session so a command left over
    /// from a killed run is never executed; the directory is otherwise empty
    /// at rest.
    pub fn purge(&self) -> io::Result<usize> {
        purge_dir(&self.dir)
    }

    fn publish(&self, command: &QueuedCommand, script_text: &str) -> io::Result<()> {
        let staging = command.staging_path();
        {
            let mut file = fs::File::create(&staging)?;
            file.write_all(script_text.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&staging, &command.path)
    }
}

impl<C: Clock> HostChannel for CommandQueue<C> {
    fn execute(&mut self, script: &CompiledScript) -> Result<CommandOutcome> {
        debug!("Submitting {} (run {})", script.name, script.run_id);
        Ok(self.submit(&script.text)?)
    }
}

/// Error detail from a listener `.error` file.
///
/// An unreadable file still yields a failure, naming the I/O problem.
fn read_host_error(path: &Path) -> HostError {
    match fs::read_to_string(path) {
        Ok(raw) => HostError::parse(&raw),
        Err(e) => {
            warn!("Cannot read host error file {:?}: {}", path, e);
            HostError {
                line: None,
                message: format!("error detail unreadable ({}): {}", path.display(), e),
            }
        }
    }
}

/// Remove queue files (`.jsx`, `.tmp`, `.error`) from `dir`.
pub fn purge_dir(dir: &Path) -> io::Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_queue_file = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| [SCRIPT_EXTENSION, STAGING_EXTENSION, ERROR_EXTENSION].contains(&e));
        if is_queue_file && path.is_file() {
            fs::remove_file(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}

fn new_command_id() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("cmd_{}", &hex[..8])
}

fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!("Failed to remove queue file {:?}: {}", path, e);
        }
    }
}
