//! Host Readiness State Machine
//!
//! The host gives no "ready" event, so bring-up is modeled as a strictly
//! forward sequence of gates, each with its own budget carved from a single
//! overall deadline.
//!
//! # Design Principles
//!
//! - **Single Source of Truth**: The `ReadinessContext` owns the current stage
//! - **Validated Transitions**: Only forward transitions to the next stage are allowed
//! - **Fail Fast**: A stage timeout ends the sequence; nothing is retried here
//! - **Injectable Time**: Every wait goes through a [`Clock`]
//!
//! # Stage Flow
//!
//! ```text
//! NotStarted
//!     ↓  process appears in the OS process list
//! ProcessRunning
//!     ↓  main window detected (primary, then fallback detection) + settle pause
//! WindowVisible
//!     ↓  fixed plugin-loading pause
//! PluginsSettled
//!     ↓  welcome screen dismissed (best effort), no-op script executed
//! Responsive
//!     ↓
//! Ready
//! ```

use std::fmt;
use std::time::Duration;

use log::{info, warn};
use thiserror::Error;

use crate::command_queue::HostChannel;
use crate::config::Timeouts;
use crate::error::{AutomationError, Result};
use crate::host_process;
use crate::poll::{Clock, SystemClock, poll_until};
use crate::script_runner::ScriptRunner;
use crate::scripts::session::{CloseHomeScreenArgs, PingArgs};
use crate::ui::window;

/// Bring-up stages in sequential order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ReadinessStage {
    /// Host has not been observed yet
    NotStarted = 0,

    /// The host executable shows up in the OS process list
    ProcessRunning = 1,

    /// A top-level window matching the host title is visible
    WindowVisible = 2,

    /// Plugin/extension loading is assumed finished
    PluginsSettled = 3,

    /// The host executed a queued no-op script
    Responsive = 4,

    /// Terminal: the host accepts commands
    Ready = 5,
}

impl ReadinessStage {
    /// Returns the numeric order of this stage (0-5)
    #[inline]
    pub const fn order(self) -> u8 {
        self as u8
    }

    /// Returns true for the terminal stage
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Returns the next stage in the sequence, or None at Ready
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::NotStarted => Some(Self::ProcessRunning),
            Self::ProcessRunning => Some(Self::WindowVisible),
            Self::WindowVisible => Some(Self::PluginsSettled),
            Self::PluginsSettled => Some(Self::Responsive),
            Self::Responsive => Some(Self::Ready),
            Self::Ready => None,
        }
    }

    /// Returns a human-readable description of this stage
    pub const fn description(self) -> &'static str {
        match self {
            Self::NotStarted => "Not started",
            Self::ProcessRunning => "Process running",
            Self::WindowVisible => "Window visible",
            Self::PluginsSettled => "Plugins settled",
            Self::Responsive => "Responsive",
            Self::Ready => "Ready",
        }
    }

    /// Returns all stages in order
    pub const fn all_stages() -> &'static [Self] {
        &[
            Self::NotStarted,
            Self::ProcessRunning,
            Self::WindowVisible,
            Self::PluginsSettled,
            Self::Responsive,
            Self::Ready,
        ]
    }
}

impl fmt::Display for ReadinessStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur during state transitions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReadinessTransitionError {
    /// Attempted to skip one or more stages
    #[error("Cannot skip from {from} to {to} (must transition through intermediate stages)")]
    SkippedStage {
        from: ReadinessStage,
        to: ReadinessStage,
    },

    /// Attempted to go backwards (not allowed)
    #[error("Cannot go backwards from {from} to {to} (bring-up is forward-only)")]
    BackwardTransition {
        from: ReadinessStage,
        to: ReadinessStage,
    },

    /// Attempted to transition from the terminal stage
    #[error("Cannot transition from terminal stage {from}")]
    FromTerminalState { from: ReadinessStage },

    /// Attempted to transition to the same stage
    #[error("Already at stage {stage}")]
    AlreadyAtStage { stage: ReadinessStage },
}

impl From<ReadinessTransitionError> for AutomationError {
    fn from(err: ReadinessTransitionError) -> Self {
        AutomationError::ReadinessTransition(err.to_string())
    }
}

/// Context for tracking bring-up state.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use hostbridge::readiness::{ReadinessContext, ReadinessStage};
///
/// let mut ctx = ReadinessContext::new();
/// ctx.advance(Duration::from_secs(2)).unwrap();
/// assert_eq!(ctx.current_stage(), ReadinessStage::ProcessRunning);
///
/// // Cannot skip stages
/// assert!(ctx.transition_to(ReadinessStage::Responsive, Duration::ZERO).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct ReadinessContext {
    current: ReadinessStage,

    /// Stages reached, with the elapsed bring-up time at which each was reached
    stage_history: Vec<(ReadinessStage, Duration)>,
}

impl Default for ReadinessContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadinessContext {
    pub fn new() -> Self {
        Self {
            current: ReadinessStage::NotStarted,
            stage_history: Vec::with_capacity(ReadinessStage::all_stages().len()),
        }
    }

    #[inline]
    pub fn current_stage(&self) -> ReadinessStage {
        self.current
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.current == ReadinessStage::Ready
    }

    pub fn stage_history(&self) -> &[(ReadinessStage, Duration)] {
        &self.stage_history
    }

    /// Advance to the next stage in sequence.
    ///
    /// # Errors
    ///
    /// - `FromTerminalState` if already Ready
    pub fn advance(
        &mut self,
        elapsed: Duration,
    ) -> std::result::Result<ReadinessStage, ReadinessTransitionError> {
        let Some(next_stage) = self.current.next() else {
            return Err(ReadinessTransitionError::FromTerminalState { from: self.current });
        };
        self.stage_history.push((next_stage, elapsed));
        self.current = next_stage;
        Ok(next_stage)
    }

    /// Transition to a specific stage (must be the next stage in sequence).
    ///
    /// # Errors
    ///
    /// - `FromTerminalState` if current is Ready
    /// - `AlreadyAtStage` if target is the current stage
    /// - `BackwardTransition` if target is before current
    /// - `SkippedStage` if target is not the immediate next stage
    pub fn transition_to(
        &mut self,
        target: ReadinessStage,
        elapsed: Duration,
    ) -> std::result::Result<ReadinessStage, ReadinessTransitionError> {
        if self.current.is_terminal() {
            return Err(ReadinessTransitionError::FromTerminalState { from: self.current });
        }
        if target == self.current {
            return Err(ReadinessTransitionError::AlreadyAtStage { stage: target });
        }
        if target.order() < self.current.order() {
            return Err(ReadinessTransitionError::BackwardTransition {
                from: self.current,
                to: target,
            });
        }
        if self.current.next() != Some(target) {
            return Err(ReadinessTransitionError::SkippedStage {
                from: self.current,
                to: target,
            });
        }
        self.advance(elapsed)
    }
}

/// Observations the readiness gate needs from the outside world.
pub trait HostProbe {
    /// Is the host executable in the process list?
    fn process_running(&mut self) -> bool;

    /// Primary window detection
    fn window_visible(&mut self) -> bool;

    /// Fallback window detection, tried when the primary method misses
    fn window_visible_fallback(&mut self) -> bool {
        false
    }

    /// Get past any startup/welcome screen. Best effort.
    fn dismiss_welcome(&mut self) -> Result<()> {
        Ok(())
    }

    /// Submit a no-op script; true when the host executed it.
    fn ping(&mut self) -> bool;
}

/// Outcome of one bring-up attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessReport {
    /// Last stage reached
    pub reached: ReadinessStage,
    /// Stage whose gate timed out, if any
    pub failed_stage: Option<ReadinessStage>,
    /// Total time spent
    pub elapsed: Duration,
    /// Stages reached with their elapsed times
    pub history: Vec<(ReadinessStage, Duration)>,
}

impl ReadinessReport {
    pub fn is_ready(&self) -> bool {
        self.reached == ReadinessStage::Ready
    }

    /// Escalate a failed bring-up into `HostNotResponsive`.
    pub fn into_result(self) -> Result<Duration> {
        match self.failed_stage {
            None if self.is_ready() => Ok(self.elapsed),
            failed => Err(AutomationError::HostNotResponsive {
                waited: self.elapsed,
                stage: failed.unwrap_or(self.reached),
            }),
        }
    }
}

/// Drives a [`HostProbe`] through the readiness stages.
pub struct ReadinessGate<P: HostProbe, C: Clock = SystemClock> {
    probe: P,
    clock: C,
    timeouts: Timeouts,
}

impl<P: HostProbe> ReadinessGate<P, SystemClock> {
    pub fn new(probe: P, timeouts: Timeouts) -> Self {
        Self::with_clock(probe, timeouts, SystemClock)
    }
}

impl<P: HostProbe, C: Clock> ReadinessGate<P, C> {
    pub fn with_clock(probe: P, timeouts: Timeouts, clock: C) -> Self {
        Self {
            probe,
            clock,
            timeouts,
        }
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    pub fn into_probe(self) -> P {
        self.probe
    }

    /// Run the whole bring-up sequence once.
    pub fn bring_up(&mut self) -> ReadinessReport {
        let start = self.clock.now();
        let deadline = self.timeouts.readiness_deadline;
        let mut ctx = ReadinessContext::new();

        info!("Waiting for the host to be ready (deadline {:?})", deadline);

        let failed = self.run_stages(&mut ctx, start, deadline).err();
        let elapsed = self.clock.elapsed_since(start);

        match failed {
            None => info!("Host is ready (took {:.1}s)", elapsed.as_secs_f64()),
            Some(stage) => warn!(
                "Host not ready: {} not reached after {:.1}s",
                stage.description().to_lowercase(),
                elapsed.as_secs_f64()
            ),
        }

        ReadinessReport {
            reached: ctx.current_stage(),
            failed_stage: failed,
            elapsed,
            history: ctx.stage_history().to_vec(),
        }
    }

    /// Fails with the stage that could not be reached.
    fn run_stages(
        &mut self,
        ctx: &mut ReadinessContext,
        start: std::time::Instant,
        deadline: Duration,
    ) -> std::result::Result<(), ReadinessStage> {
        let t = self.timeouts.clone();
        let remaining = |clock: &C| deadline.saturating_sub(clock.elapsed_since(start));

        // NotStarted -> ProcessRunning
        let budget = t.process_timeout.min(remaining(&self.clock));
        let probe = &mut self.probe;
        let poll = poll_until(&self.clock, t.process_poll_interval, budget, || {
            probe.process_running()
        });
        if !poll.satisfied {
            return Err(ReadinessStage::ProcessRunning);
        }
        info!("Host process found after {:.1}s", poll.waited.as_secs_f64());
        self.enter(ctx, start)?;

        // ProcessRunning -> WindowVisible
        let budget = remaining(&self.clock);
        let probe = &mut self.probe;
        let poll = poll_until(&self.clock, t.window_poll_interval, budget, || {
            probe.window_visible() || probe.window_visible_fallback()
        });
        if !poll.satisfied {
            return Err(ReadinessStage::WindowVisible);
        }
        info!("Host window visible after {:.1}s", poll.waited.as_secs_f64());
        if !self.pause(t.window_settle, remaining(&self.clock)) {
            return Err(ReadinessStage::WindowVisible);
        }
        self.enter(ctx, start)?;

        // WindowVisible -> PluginsSettled
        info!("Waiting for plugins and UI to initialize...");
        if !self.pause(t.plugin_settle, remaining(&self.clock)) {
            return Err(ReadinessStage::PluginsSettled);
        }
        self.enter(ctx, start)?;

        // PluginsSettled -> Responsive
        if let Err(e) = self.probe.dismiss_welcome() {
            warn!("Could not dismiss the welcome screen: {}", e);
        }
        let retries = t.responsive_retries.max(1);
        let mut responsive = false;
        for attempt in 1..=retries {
            if remaining(&self.clock).is_zero() {
                break;
            }
            if self.probe.ping() {
                info!("Host is responsive (attempt {})", attempt);
                responsive = true;
                break;
            }
            info!("Attempt {}/{}: still loading...", attempt, retries);
            if attempt < retries && !self.pause(t.responsive_backoff, remaining(&self.clock)) {
                break;
            }
        }
        if !responsive || self.clock.elapsed_since(start) > deadline {
            return Err(ReadinessStage::Responsive);
        }
        self.enter(ctx, start)?;

        // Responsive -> Ready
        self.enter(ctx, start)?;
        for (stage, at) in ctx.stage_history() {
            info!("  {} at {:.1}s", stage, at.as_secs_f64());
        }
        Ok(())
    }

    /// Advance `ctx`; an invalid transition fails the stage being entered.
    fn enter(
        &self,
        ctx: &mut ReadinessContext,
        start: std::time::Instant,
    ) -> std::result::Result<(), ReadinessStage> {
        let current = ctx.current_stage();
        ctx.advance(self.clock.elapsed_since(start))
            .map(|_| ())
            .map_err(|e| {
                warn!("{}", e);
                current.next().unwrap_or(current)
            })
    }

    /// Sleep `wanted`, clipped to `remaining`; false when the budget ran out.
    fn pause(&self, wanted: Duration, remaining: Duration) -> bool {
        self.clock.sleep(wanted.min(remaining));
        wanted <= remaining
    }
}

/// Live implementation backed by the OS process list, window listing tools
/// and the script runner.
pub struct LiveProbe<'a, H: HostChannel> {
    process_name: String,
    window_title: String,
    runner: &'a mut ScriptRunner<H>,
}

impl<'a, H: HostChannel> LiveProbe<'a, H> {
    pub fn new(
        process_name: impl Into<String>,
        window_title: impl Into<String>,
        runner: &'a mut ScriptRunner<H>,
    ) -> Self {
        Self {
            process_name: process_name.into(),
            window_title: window_title.into(),
            runner,
        }
    }
}

impl<H: HostChannel> HostProbe for LiveProbe<'_, H> {
    fn process_running(&mut self) -> bool {
        !host_process::find_pids(&self.process_name).is_empty()
    }

    fn window_visible(&mut self) -> bool {
        window::visible_wmctrl(&self.window_title)
    }

    fn window_visible_fallback(&mut self) -> bool {
        window::visible_xdotool(&self.window_title)
    }

    fn dismiss_welcome(&mut self) -> Result<()> {
        self.runner.run(&CloseHomeScreenArgs)?.ensure_success()
    }

    fn ping(&mut self) -> bool {
        match self.runner.run(&PingArgs) {
            // A host-reported error still proves the host executes commands
            Ok(output) => !matches!(
                output.outcome,
                crate::command_queue::CommandOutcome::Orphaned { .. }
            ),
            Err(e) => {
                warn!("Ping failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // ReadinessStage Tests
    // =========================================================================

    #[test]
    fn test_stage_order_is_sequential() {
        for (i, stage) in ReadinessStage::all_stages().iter().enumerate() {
            assert_eq!(stage.order() as usize, i, "Stage {:?} should have order {}", stage, i);
        }
    }

    #[test]
    fn test_stage_next_forms_chain() {
        let mut current = ReadinessStage::NotStarted;
        let mut count = 0;
        while let Some(next) = current.next() {
            current = next;
            count += 1;
        }
        assert_eq!(current, ReadinessStage::Ready);
        assert_eq!(count, 5);
    }

    // =========================================================================
    // ReadinessContext Tests
    // =========================================================================

    #[test]
    fn test_context_rejects_skip_and_backward() {
        let mut ctx = ReadinessContext::new();
        assert_eq!(
            ctx.transition_to(ReadinessStage::WindowVisible, Duration::ZERO),
            Err(ReadinessTransitionError::SkippedStage {
                from: ReadinessStage::NotStarted,
                to: ReadinessStage::WindowVisible,
            })
        );
        ctx.transition_to(ReadinessStage::ProcessRunning, Duration::ZERO)
            .unwrap();
        assert!(matches!(
            ctx.transition_to(ReadinessStage::NotStarted, Duration::ZERO),
            Err(ReadinessTransitionError::BackwardTransition { .. })
        ));
        assert!(matches!(
            ctx.transition_to(ReadinessStage::ProcessRunning, Duration::ZERO),
            Err(ReadinessTransitionError::AlreadyAtStage { .. })
        ));
    }

    #[test]
    fn test_context_terminal() {
        let mut ctx = ReadinessContext::new();
        for _ in 0..5 {
            ctx.advance(Duration::ZERO).unwrap();
        }
        assert!(ctx.is_ready());
        assert!(matches!(
            ctx.advance(Duration::ZERO),
            Err(ReadinessTransitionError::FromTerminalState { .. })
        ));
        assert_eq!(ctx.stage_history().len(), 5);
    }

    #[test]
    fn test_transition_error_converts() {
        let err: AutomationError = ReadinessTransitionError::AlreadyAtStage {
            stage: ReadinessStage::Ready,
        }
        .into();
        assert!(err.to_string().contains("Already at stage Ready"));
    }

    #[test]
    fn test_report_into_result() {
        let report = ReadinessReport {
            reached: ReadinessStage::ProcessRunning,
            failed_stage: Some(ReadinessStage::WindowVisible),
            elapsed: Duration::from_secs(12),
            history: vec![],
        };
        match report.into_result() {
            Err(AutomationError::HostNotResponsive { waited, stage }) => {
                assert_eq!(waited, Duration::from_secs(12));
                assert_eq!(stage, ReadinessStage::WindowVisible);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_pause_budget() {
        struct Never;
        impl HostProbe for Never {
            fn process_running(&mut self) -> bool {
                false
            }
            fn window_visible(&mut self) -> bool {
                false
            }
            fn ping(&mut self) -> bool {
                false
            }
        }
        let clock = crate::poll::ManualClock::new();
        let gate = ReadinessGate::with_clock(Never, Timeouts::default(), &clock);
        assert!(gate.pause(Duration::from_secs(1), Duration::from_secs(5)));
        assert!(!gate.pause(Duration::from_secs(5), Duration::from_secs(2)));
        assert_eq!(clock.elapsed(), Duration::from_secs(3));
    }
}
