//! Offline rendering through the host's command-line render tool.
//!
//! Rendering happens after the host has saved the working project and been
//! shut down; the render tool opens the saved file itself. Its stdout is
//! streamed into the log line by line, stderr is collected and becomes the
//! detail of a `Render` error when the tool exits non-zero.

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use log::{debug, info, warn};

use crate::error::{AutomationError, Result};

/// One render invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderJob {
    pub project: PathBuf,
    pub comp: String,
    pub output: PathBuf,
    /// Memory usage bounds in percent (`-mem_usage low high`)
    pub memory: (u32, u32),
}

impl RenderJob {
    /// Render `comp` to `<output_dir>/<file_name>`, defaulting to `<comp>.mp4`.
    pub fn new(
        project: impl Into<PathBuf>,
        comp: impl Into<String>,
        output_dir: &Path,
        file_name: Option<&str>,
    ) -> Self {
        let comp = comp.into();
        let output = match file_name {
            Some(name) if !name.trim().is_empty() => output_dir.join(name),
            _ => output_dir.join(format!("{}.mp4", comp)),
        };
        Self {
            project: project.into(),
            comp,
            output,
            memory: (20, 40),
        }
    }

    pub fn with_memory(mut self, low: u32, high: u32) -> Self {
        self.memory = (low, high);
        self
    }

    /// Arguments passed to the render tool.
    pub fn args(&self) -> Vec<String> {
        vec![
            "-project".to_string(),
            self.project.display().to_string(),
            "-comp".to_string(),
            self.comp.clone(),
            "-output".to_string(),
            self.output.display().to_string(),
            "-mem_usage".to_string(),
            self.memory.0.to_string(),
            self.memory.1.to_string(),
        ]
    }
}

/// Runs render jobs; the interpreter only talks to this trait.
pub trait Renderer {
    /// Render and return the output file path.
    fn render(&mut self, job: &RenderJob) -> Result<PathBuf>;
}

impl<R: Renderer + ?Sized> Renderer for &mut R {
    fn render(&mut self, job: &RenderJob) -> Result<PathBuf> {
        (**self).render(job)
    }
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn render(&mut self, job: &RenderJob) -> Result<PathBuf> {
        (**self).render(job)
    }
}

/// Spawns the host's command-line renderer.
#[derive(Debug, Clone)]
pub struct AerenderRenderer {
    executable: PathBuf,
}

impl AerenderRenderer {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }
}

impl Renderer for AerenderRenderer {
    fn render(&mut self, job: &RenderJob) -> Result<PathBuf> {
        if !self.executable.exists() {
            return Err(AutomationError::HostNotFound {
                path: self.executable.clone(),
            });
        }
        if let Some(parent) = job.output.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!("Rendering {} to {}...", job.comp, job.output.display());
        let args = job.args();
        debug!("{} {}", self.executable.display(), args.join(" "));

        let mut child = Command::new(&self.executable)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Drain stderr on its own thread so a chatty tool cannot block on a full pipe
        let stderr_handle = child.stderr.take().map(|mut stderr| {
            thread::spawn(move || {
                let mut text = String::new();
                let _ = stderr.read_to_string(&mut text);
                text
            })
        });

        if let Some(stdout) = child.stdout.take() {
            for line in BufReader::new(stdout).lines().map_while(std::result::Result::ok) {
                let line = line.trim_end();
                if !line.is_empty() {
                    info!("[render] {}", line);
                }
            }
        }

        let status = child.wait()?;
        let stderr = stderr_handle
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if status.success() {
            info!("Render finished: {}", job.output.display());
            Ok(job.output.clone())
        } else {
            warn!("Render tool exited with {}", status);
            let detail = match stderr.trim() {
                "" => format!("render tool exited with {}", status),
                text => text.to_string(),
            };
            Err(AutomationError::render(&job.project, &job.comp, detail))
        }
    }
}
