//! Keyboard automation for host features that have no scripting API.
//!
//! Replacing a layer's source and the fit-to-frame commands are only reachable
//! through menu shortcuts, so the interpreter sends them as hotkeys to the
//! focused host window.

use std::process::Command;

use log::debug;

use crate::error::{AutomationError, Result};

/// Replace the selected layer's source with the selected project item
pub const REPLACE_SOURCE: &[&str] = &["ctrl", "alt", "slash"];
pub const FIT_TO_SCREEN: &[&str] = &["ctrl", "alt", "f"];
pub const FIT_TO_WIDTH: &[&str] = &["ctrl", "alt", "shift", "h"];
pub const FIT_TO_HEIGHT: &[&str] = &["ctrl", "alt", "shift", "g"];

/// Sends key chords to the host window.
pub trait UiDriver {
    /// Press `keys` together, e.g. `["ctrl", "alt", "f"]`.
    fn hotkey(&mut self, keys: &[&str]) -> Result<()>;
}

impl<U: UiDriver + ?Sized> UiDriver for &mut U {
    fn hotkey(&mut self, keys: &[&str]) -> Result<()> {
        (**self).hotkey(keys)
    }
}

impl<U: UiDriver + ?Sized> UiDriver for Box<U> {
    fn hotkey(&mut self, keys: &[&str]) -> Result<()> {
        (**self).hotkey(keys)
    }
}

/// Drives the host window through `xdotool`.
#[derive(Debug, Clone)]
pub struct XdotoolDriver {
    window_title: String,
}

impl XdotoolDriver {
    pub fn new(window_title: impl Into<String>) -> Self {
        Self {
            window_title: window_title.into(),
        }
    }
}

impl UiDriver for XdotoolDriver {
    fn hotkey(&mut self, keys: &[&str]) -> Result<()> {
        let chord = keys.join("+");
        debug!("Sending hotkey {} to '{}'", chord, self.window_title);
        let output = Command::new("xdotool")
            .args(["search", "--name", &self.window_title])
            .args(["windowactivate", "--sync", "key", "--clearmodifiers", &chord])
            .output()?;
        if output.status.success() {
            Ok(())
        } else {
            Err(AutomationError::script(
                format!("hotkey {}", chord),
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ))
        }
    }
}

/// Window detection through the X11 command-line tools.
///
/// A missing tool counts as "not visible"; the readiness gate then keeps
/// polling until its budget runs out.
pub mod window {
    use std::process::{Command, Stdio};

    use log::debug;

    /// Any window listed by `wmctrl -l` whose title contains `title`.
    pub fn visible_wmctrl(title: &str) -> bool {
        match Command::new("wmctrl").arg("-l").stderr(Stdio::null()).output() {
            Ok(output) if output.status.success() => {
                listing_contains(&String::from_utf8_lossy(&output.stdout), title)
            }
            Ok(_) => false,
            Err(e) => {
                debug!("wmctrl unavailable: {}", e);
                false
            }
        }
    }

    /// `xdotool search --name` finds at least one window.
    pub fn visible_xdotool(title: &str) -> bool {
        match Command::new("xdotool")
            .args(["search", "--name", title])
            .stderr(Stdio::null())
            .output()
        {
            Ok(output) => {
                output.status.success() && !String::from_utf8_lossy(&output.stdout).trim().is_empty()
            }
            Err(e) => {
                debug!("xdotool unavailable: {}", e);
                false
            }
        }
    }

    /// `wmctrl -l` lines are `<id> <desktop> <host> <title>`.
    pub(crate) fn listing_contains(listing: &str, title: &str) -> bool {
        listing
            .lines()
            .filter_map(window_title)
            .any(|window| window.contains(title))
    }

    fn window_title(line: &str) -> Option<&str> {
        let mut rest = line.trim_start();
        for _ in 0..3 {
            rest = rest.split_once(char::is_whitespace)?.1.trim_start();
        }
        Some(rest)
    }
}
