//! Media duration probing for imported resources.

use std::io;
use std::path::Path;
use std::process::Command;

use log::debug;

use crate::error::Result;

/// Reports the playable length of a media file in seconds.
pub trait DurationProbe {
    fn duration(&self, path: &Path) -> Result<f64>;
}

impl<P: DurationProbe + ?Sized> DurationProbe for &P {
    fn duration(&self, path: &Path) -> Result<f64> {
        (**self).duration(path)
    }
}

impl<P: DurationProbe + ?Sized> DurationProbe for Box<P> {
    fn duration(&self, path: &Path) -> Result<f64> {
        (**self).duration(path)
    }
}

/// Asks `ffprobe` for the container duration.
#[derive(Debug, Clone)]
pub struct FfprobeDurationProbe {
    program: String,
}

impl Default for FfprobeDurationProbe {
    fn default() -> Self {
        Self {
            program: "ffprobe".to_string(),
        }
    }
}

impl FfprobeDurationProbe {
    /// Use a specific ffprobe binary.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl DurationProbe for FfprobeDurationProbe {
    fn duration(&self, path: &Path) -> Result<f64> {
        let output = Command::new(&self.program)
            .args(["-v", "error", "-show_entries", "format=duration"])
            .args(["-of", "default=noprint_wrappers=1:nokey=1"])
            .arg(path)
            .output()?;
        if !output.status.success() {
            return Err(io::Error::other(format!(
                "{} failed for {}: {}",
                self.program,
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            ))
            .into());
        }
        let seconds = parse_duration(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("no duration reported for {}", path.display()),
            )
        })?;
        debug!("{} lasts {:.3}s", path.display(), seconds);
        Ok(seconds)
    }
}

/// First line of ffprobe output that is a non-negative number.
fn parse_duration(stdout: &str) -> Option<f64> {
    stdout
        .lines()
        .filter_map(|line| line.trim().parse::<f64>().ok())
        .find(|secs| secs.is_finite() && *secs >= 0.0)
}
