//! Runtime settings: where the host lives and how long to wait for it.
//!
//! Resolution order is defaults, then an optional JSON settings file, then
//! `HOSTBRIDGE_*` environment variables. Durations are written in the
//! settings file as milliseconds.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AutomationError, Result};

/// Serde helper storing a `Duration` as integer milliseconds.
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

/// Every bounded wait in the crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Interval between checks of a queued command
    #[serde(with = "millis")]
    pub queue_poll_interval: Duration,
    /// How long a queued command may stay pending before it is orphaned
    #[serde(with = "millis")]
    pub queue_max_wait: Duration,

    /// Overall readiness deadline; every stage budget is carved from it
    #[serde(with = "millis")]
    pub readiness_deadline: Duration,
    #[serde(with = "millis")]
    pub process_timeout: Duration,
    #[serde(with = "millis")]
    pub process_poll_interval: Duration,
    #[serde(with = "millis")]
    pub window_poll_interval: Duration,
    /// Pause after the window appears so the initial layout settles
    #[serde(with = "millis")]
    pub window_settle: Duration,
    /// Fixed pause for plugin/extension loading (no signal exists for it)
    #[serde(with = "millis")]
    pub plugin_settle: Duration,
    /// Ping attempts before the host is declared unresponsive
    pub responsive_retries: u32,
    #[serde(with = "millis")]
    pub responsive_backoff: Duration,

    /// Checks for the saved project file after a save command
    pub save_verify_retries: u32,
    #[serde(with = "millis")]
    pub save_verify_interval: Duration,
    /// Pause between saving and shutting the host down
    #[serde(with = "millis")]
    pub save_settle: Duration,
    /// Grace period between the polite and the forced host shutdown
    #[serde(with = "millis")]
    pub terminate_grace: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            queue_poll_interval: Duration::from_millis(100),
            queue_max_wait: Duration::from_secs(10),
            readiness_deadline: Duration::from_secs(120),
            process_timeout: Duration::from_secs(30),
            process_poll_interval: Duration::from_millis(500),
            window_poll_interval: Duration::from_secs(1),
            window_settle: Duration::from_secs(3),
            plugin_settle: Duration::from_secs(5),
            responsive_retries: 3,
            responsive_backoff: Duration::from_secs(3),
            save_verify_retries: 10,
            save_verify_interval: Duration::from_millis(500),
            save_settle: Duration::from_secs(10),
            terminate_grace: Duration::from_secs(10),
        }
    }
}

impl Timeouts {
    /// Total time allowed for the saved project file to appear.
    pub fn save_verify_budget(&self) -> Result<Duration> {
        self.save_verify_interval
            .checked_mul(self.save_verify_retries)
            .ok_or_else(|| {
                AutomationError::config(
                    "timeouts.save_verify_retries",
                    format!(
                        "{} checks every {}ms overflows the save wait",
                        self.save_verify_retries,
                        self.save_verify_interval.as_millis()
                    ),
                )
            })
    }
}

/// Host and filesystem settings for an automation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Folder shared with the host for result documents and logs
    pub cache_dir: PathBuf,
    /// Queue directory watched by the host listener
    pub queue_dir: PathBuf,
    /// Optional folder whose scripts override the built-in ones
    pub scripts_dir: Option<PathBuf>,
    /// Host application executable
    pub host_executable: PathBuf,
    /// Process name as listed by the OS
    pub host_process_name: String,
    /// Substring of the host's main window title
    pub host_window_title: String,
    /// Host folder that runs scripts at start-up (listener install target)
    pub startup_scripts_dir: Option<PathBuf>,
    /// Command-line render tool
    pub render_executable: PathBuf,
    /// Memory usage bounds passed to the render tool (percent)
    pub render_memory: (u32, u32),
    /// Name of the top-level folder generated items are placed under
    pub project_folder: String,
    /// File name of the working copy of the source project
    pub working_project_name: String,
    pub timeouts: Timeouts,
}

impl Default for Settings {
    fn default() -> Self {
        let base = std::env::temp_dir().join("hostbridge");
        let (host_executable, host_process_name, render_executable) = if cfg!(windows) {
            (
                PathBuf::from(r"C:\Program Files\Adobe\Adobe After Effects 2025\Support Files\AfterFX.exe"),
                "AfterFX.exe".to_string(),
                PathBuf::from(r"C:\Program Files\Adobe\Adobe After Effects 2025\Support Files\aerender.exe"),
            )
        } else {
            (
                PathBuf::from("/Applications/Adobe After Effects 2025/Adobe After Effects 2025.app/Contents/MacOS/After Effects"),
                "After Effects".to_string(),
                PathBuf::from("/Applications/Adobe After Effects 2025/aerender"),
            )
        };
        Self {
            cache_dir: base.join("cache"),
            queue_dir: base.join("queue"),
            scripts_dir: None,
            host_executable,
            host_process_name,
            host_window_title: "Adobe After Effects".to_string(),
            startup_scripts_dir: None,
            render_executable,
            render_memory: (20, 40),
            project_folder: "hostbridge".to_string(),
            working_project_name: "hostbridge.aep".to_string(),
            timeouts: Timeouts::default(),
        }
    }
}

impl Settings {
    /// Resolve settings from an optional file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok());
        settings.cache_dir = absolute(&settings.cache_dir)?;
        settings.queue_dir = absolute(&settings.queue_dir)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file; missing keys keep their defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| {
            AutomationError::config(
                "settings",
                format!("cannot read {}: {}", path.as_ref().display(), e),
            )
        })?;
        serde_json::from_str(&content).map_err(|e| {
            AutomationError::config(
                "settings",
                format!("invalid JSON in {}: {}", path.as_ref().display(), e),
            )
        })
    }

    /// Apply `HOSTBRIDGE_*` overrides from `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("HOSTBRIDGE_CACHE_DIR") {
            self.cache_dir = PathBuf::from(v);
        }
        if let Some(v) = get("HOSTBRIDGE_QUEUE_DIR") {
            self.queue_dir = PathBuf::from(v);
        }
        if let Some(v) = get("HOSTBRIDGE_SCRIPTS_DIR") {
            self.scripts_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = get("HOSTBRIDGE_HOST_EXECUTABLE") {
            self.host_executable = PathBuf::from(v);
        }
        if let Some(v) = get("HOSTBRIDGE_HOST_PROCESS") {
            self.host_process_name = v;
        }
        if let Some(v) = get("HOSTBRIDGE_WINDOW_TITLE") {
            self.host_window_title = v;
        }
        if let Some(v) = get("HOSTBRIDGE_STARTUP_DIR") {
            self.startup_scripts_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = get("HOSTBRIDGE_RENDER_EXECUTABLE") {
            self.render_executable = PathBuf::from(v);
        }
        if let Some(v) = get("HOSTBRIDGE_PROJECT_FOLDER") {
            self.project_folder = v;
        }
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        if self.cache_dir.as_os_str().is_empty() {
            return Err(AutomationError::config("cache_dir", "must be specified"));
        }
        if self.queue_dir.as_os_str().is_empty() {
            return Err(AutomationError::config("queue_dir", "must be specified"));
        }
        if self.queue_dir == self.cache_dir {
            return Err(AutomationError::config(
                "queue_dir",
                "must differ from cache_dir (the listener executes every .jsx in it)",
            ));
        }
        if self.project_folder.trim().is_empty() {
            return Err(AutomationError::config("project_folder", "must not be empty"));
        }
        if self.host_process_name.trim().is_empty() {
            return Err(AutomationError::config("host_process_name", "must not be empty"));
        }
        if self.working_project_name.trim().is_empty() {
            return Err(AutomationError::config("working_project_name", "must not be empty"));
        }
        let (low, high) = self.render_memory;
        if low > high || high > 100 {
            return Err(AutomationError::config(
                "render_memory",
                format!("invalid bounds ({}, {})", low, high),
            ));
        }
        let t = &self.timeouts;
        if t.queue_max_wait.is_zero() || t.readiness_deadline.is_zero() {
            return Err(AutomationError::config("timeouts", "maximum waits must be non-zero"));
        }
        if t.responsive_retries == 0 {
            return Err(AutomationError::config("timeouts.responsive_retries", "must be at least 1"));
        }
        t.save_verify_budget()?;
        Ok(())
    }

    /// Subfolder of the cache that receives per-run host logs
    pub fn logs_dir(&self) -> PathBuf {
        self.cache_dir.join("logs")
    }

    /// Name of the project folder that receives imported resources
    pub fn resource_folder(&self) -> String {
        format!("{}-cache", self.project_folder)
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
