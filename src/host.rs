//! Host application lifecycle as seen by the interpreter.

use std::path::Path;
use std::process::Child;
use std::time::Duration;

use log::{debug, info};

use crate::command_queue::HostChannel;
use crate::config::Settings;
use crate::error::Result;
use crate::host_process;
use crate::readiness::{LiveProbe, ReadinessGate};
use crate::script_runner::ScriptRunner;

/// Start, wait for and stop the host.
pub trait HostLifecycle {
    /// Start the host with `project` open.
    fn launch(&mut self, project: &Path) -> Result<()>;

    /// Block until the host executes queued commands; returns the time waited.
    fn await_ready<H: HostChannel>(&mut self, runner: &mut ScriptRunner<H>) -> Result<Duration>;

    /// Shut the host down.
    fn terminate(&mut self) -> Result<()>;
}

impl<L: HostLifecycle + ?Sized> HostLifecycle for &mut L {
    fn launch(&mut self, project: &Path) -> Result<()> {
        (**self).launch(project)
    }

    fn await_ready<H: HostChannel>(&mut self, runner: &mut ScriptRunner<H>) -> Result<Duration> {
        (**self).await_ready(runner)
    }

    fn terminate(&mut self) -> Result<()> {
        (**self).terminate()
    }
}

/// The real host process on this machine.
#[derive(Debug)]
pub struct LiveHost {
    settings: Settings,
    child: Option<Child>,
}

impl LiveHost {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            child: None,
        }
    }
}

impl HostLifecycle for LiveHost {
    fn launch(&mut self, project: &Path) -> Result<()> {
        let child = host_process::launch(&self.settings.host_executable, project)?;
        self.child = Some(child);
        Ok(())
    }

    fn await_ready<H: HostChannel>(&mut self, runner: &mut ScriptRunner<H>) -> Result<Duration> {
        let probe = LiveProbe::new(
            self.settings.host_process_name.as_str(),
            self.settings.host_window_title.as_str(),
            runner,
        );
        let mut gate = ReadinessGate::new(probe, self.settings.timeouts.clone());
        gate.bring_up().into_result()
    }

    fn terminate(&mut self) -> Result<()> {
        let stopped = host_process::terminate(
            &self.settings.host_process_name,
            self.settings.timeouts.terminate_grace,
        );
        info!("Stopped {} host process(es)", stopped);

        if let Some(mut child) = self.child.take() {
            // Reap our own child so it does not linger as a zombie
            match child.try_wait() {
                Ok(Some(status)) => debug!("Host exited with {}", status),
                Ok(None) => {
                    child.kill()?;
                    child.wait()?;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AutomationError;
    use std::path::PathBuf;

    #[test]
    fn test_live_host_missing_executable() {
        let mut settings = Settings::default();
        settings.host_executable = PathBuf::from("/nonexistent/host");
        let mut host = LiveHost::new(settings);
        assert!(matches!(
            host.launch(Path::new("/tmp/work.aep")),
            Err(AutomationError::HostNotFound { .. })
        ));
    }

    #[test]
    fn test_terminate_without_launch() {
        let mut settings = Settings::default();
        settings.host_process_name = "hostbridge-definitely-not-running".to_string();
        settings.timeouts.terminate_grace = Duration::ZERO;
        assert!(LiveHost::new(settings).terminate().is_ok());
    }
}
