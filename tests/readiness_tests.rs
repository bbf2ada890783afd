//! Readiness state machine tests on a virtual clock

use std::time::Duration;

use hostbridge::config::Timeouts;
use hostbridge::error::{AutomationError, Result};
use hostbridge::poll::ManualClock;
use hostbridge::readiness::{HostProbe, ReadinessGate, ReadinessStage};

/// Probe whose answers are scripted per check.
#[derive(Default)]
struct FakeProbe {
    process_after: Option<u32>,
    window_primary: bool,
    window_fallback: bool,
    pings: Vec<bool>,
    welcome_fails: bool,

    process_checks: u32,
    window_checks: u32,
    dismissals: u32,
    ping_calls: u32,
}

impl HostProbe for FakeProbe {
    fn process_running(&mut self) -> bool {
        self.process_checks += 1;
        self.process_after.is_some_and(|n| self.process_checks > n)
    }

    fn window_visible(&mut self) -> bool {
        self.window_checks += 1;
        self.window_primary
    }

    fn window_visible_fallback(&mut self) -> bool {
        self.window_fallback
    }

    fn dismiss_welcome(&mut self) -> Result<()> {
        self.dismissals += 1;
        if self.welcome_fails {
            Err(AutomationError::script("close_home_screen.jsx", "no welcome screen"))
        } else {
            Ok(())
        }
    }

    fn ping(&mut self) -> bool {
        let answer = self.pings.get(self.ping_calls as usize).copied().unwrap_or(false);
        self.ping_calls += 1;
        answer
    }
}

fn healthy() -> FakeProbe {
    FakeProbe {
        process_after: Some(0),
        window_primary: true,
        pings: vec![true],
        ..FakeProbe::default()
    }
}

#[test]
fn test_process_timeout_never_checks_window() {
    let clock = ManualClock::new();
    let timeouts = Timeouts::default();
    let mut gate = ReadinessGate::with_clock(FakeProbe::default(), timeouts.clone(), &clock);

    let report = gate.bring_up();

    assert_eq!(report.failed_stage, Some(ReadinessStage::ProcessRunning));
    assert_eq!(report.reached, ReadinessStage::NotStarted);
    assert_eq!(report.elapsed, timeouts.process_timeout);
    assert_eq!(gate.probe().window_checks, 0);
    assert_eq!(gate.probe().ping_calls, 0);

    match report.into_result() {
        Err(AutomationError::HostNotResponsive { waited, stage }) => {
            assert_eq!(waited, timeouts.process_timeout);
            assert_eq!(stage, ReadinessStage::ProcessRunning);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_all_stages_in_order() {
    let clock = ManualClock::new();
    let probe = FakeProbe {
        process_after: Some(2),
        window_primary: false,
        window_fallback: true,
        pings: vec![false, true],
        ..FakeProbe::default()
    };
    let mut gate = ReadinessGate::with_clock(probe, Timeouts::default(), &clock);

    let report = gate.bring_up();

    assert!(report.is_ready(), "{:?}", report);
    let stages: Vec<ReadinessStage> = report.history.iter().map(|(stage, _)| *stage).collect();
    assert_eq!(
        stages,
        vec![
            ReadinessStage::ProcessRunning,
            ReadinessStage::WindowVisible,
            ReadinessStage::PluginsSettled,
            ReadinessStage::Responsive,
            ReadinessStage::Ready,
        ]
    );
    assert!(report.history.windows(2).all(|w| w[0].1 <= w[1].1));
    assert!(report.elapsed <= Timeouts::default().readiness_deadline);

    let probe = gate.into_probe();
    assert_eq!(probe.process_checks, 3);
    assert_eq!(probe.dismissals, 1);
    assert_eq!(probe.ping_calls, 2);
}

#[test]
fn test_unanswered_pings_fail_responsive() {
    let clock = ManualClock::new();
    let probe = FakeProbe {
        pings: vec![],
        ..healthy()
    };
    let timeouts = Timeouts::default();
    let retries = timeouts.responsive_retries;
    let mut gate = ReadinessGate::with_clock(probe, timeouts, &clock);

    let report = gate.bring_up();

    assert_eq!(report.failed_stage, Some(ReadinessStage::Responsive));
    assert_eq!(report.reached, ReadinessStage::PluginsSettled);
    assert_eq!(gate.probe().ping_calls, retries);
}

#[test]
fn test_welcome_failure_is_not_fatal() {
    let clock = ManualClock::new();
    let probe = FakeProbe {
        welcome_fails: true,
        ..healthy()
    };
    let mut gate = ReadinessGate::with_clock(probe, Timeouts::default(), &clock);
    assert!(gate.bring_up().is_ready());
}

#[test]
fn test_overall_deadline_bounds_the_fixed_pauses() {
    let clock = ManualClock::new();
    let timeouts = Timeouts {
        readiness_deadline: Duration::from_secs(5),
        window_settle: Duration::from_secs(3),
        plugin_settle: Duration::from_secs(5),
        ..Timeouts::default()
    };
    let mut gate = ReadinessGate::with_clock(healthy(), timeouts, &clock);

    let report = gate.bring_up();

    assert_eq!(report.failed_stage, Some(ReadinessStage::PluginsSettled));
    assert_eq!(report.reached, ReadinessStage::WindowVisible);
    assert_eq!(report.elapsed, Duration::from_secs(5));
    assert_eq!(gate.probe().ping_calls, 0);
}
