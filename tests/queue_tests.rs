//! Command queue transport tests
//!
//! A background thread stands in for the host listener: it watches the queue
//! directory and either deletes (consumes) or renames (rejects) each command.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use hostbridge::command_queue::{CommandOutcome, CommandQueue, ERROR_EXTENSION, SCRIPT_EXTENSION};
use hostbridge::poll::{ManualClock, SystemClock};

fn published(dir: &Path) -> Option<PathBuf> {
    fs::read_dir(dir).ok()?.flatten().map(|e| e.path()).find(|p| {
        p.extension().and_then(|e| e.to_str()) == Some(SCRIPT_EXTENSION)
    })
}

/// Fake listener: handles the first command it sees, then exits.
fn spawn_listener(dir: PathBuf, reject_with: Option<&'static str>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if let Some(path) = published(&dir) {
                let text = fs::read_to_string(&path).unwrap_or_default();
                match reject_with {
                    None => fs::remove_file(&path).unwrap(),
                    Some(error) => {
                        // Overwrite the command with the error text, then rename it:
                        // the .jsx disappears and the .error sibling appears at once
                        fs::write(&path, error).unwrap();
                        fs::rename(&path, path.with_extension(ERROR_EXTENSION)).unwrap();
                    }
                }
                return text;
            }
            thread::sleep(Duration::from_millis(5));
        }
        String::new()
    })
}

fn live_queue(dir: &Path) -> CommandQueue<SystemClock> {
    CommandQueue::with_clock(
        dir,
        Duration::from_millis(10),
        Duration::from_secs(5),
        SystemClock,
    )
}

fn is_empty(dir: &Path) -> bool {
    fs::read_dir(dir).map(|mut d| d.next().is_none()).unwrap_or(true)
}

#[test]
fn test_deleted_command_is_consumed() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("queue");
    fs::create_dir_all(&dir).unwrap();

    let listener = spawn_listener(dir.clone(), None);
    let mut queue = live_queue(&dir);
    let outcome = queue.submit("app.project.save();").unwrap();

    assert!(matches!(outcome, CommandOutcome::Consumed { .. }));
    assert_eq!(listener.join().unwrap(), "app.project.save();");
    assert!(is_empty(&dir));
    assert!(queue.warnings().is_empty());
    assert_eq!(queue.submitted(), 1);
}

#[test]
fn test_error_sibling_is_failure_with_host_detail() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("queue");
    fs::create_dir_all(&dir).unwrap();

    let listener = spawn_listener(dir.clone(), Some("7 ReferenceError: comp is undefined"));
    let mut queue = live_queue(&dir);
    let outcome = queue.submit("comp.layers.add();").unwrap();
    listener.join().unwrap();

    match outcome {
        CommandOutcome::Failed { error, .. } => {
            assert_eq!(error.line, Some(7));
            assert_eq!(error.message, "ReferenceError: comp is undefined");
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert!(is_empty(&dir), "error sibling must be removed");
}

#[test]
fn test_untouched_command_is_orphaned_and_removed() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("queue");
    let clock = ManualClock::new();
    let mut queue = CommandQueue::with_clock(
        &dir,
        Duration::from_millis(100),
        Duration::from_millis(1),
        &clock,
    );

    let outcome = queue.submit("alert('nobody listens');").unwrap();

    assert!(matches!(outcome, CommandOutcome::Orphaned { .. }));
    assert_eq!(outcome.waited(), Duration::from_millis(1));
    assert!(is_empty(&dir), "orphaned command must not linger");
    assert_eq!(queue.warnings().len(), 1);
}

#[test]
fn test_queue_directory_created_on_demand() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("nested").join("queue");
    let clock = ManualClock::new();
    let mut queue = CommandQueue::with_clock(&dir, Duration::from_millis(10), Duration::from_millis(10), &clock);

    queue.submit("1;").unwrap();
    assert!(dir.is_dir());
}

#[test]
fn test_purge_clears_stale_commands() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("queue");
    fs::create_dir_all(&dir).unwrap();
    // Left behind by an earlier run that was killed mid-command
    fs::write(dir.join("cmd_deadbeef.jsx"), "app.quit();").unwrap();
    fs::write(dir.join("cmd_cafebabe.error"), "3 Error: stale").unwrap();
    fs::write(dir.join("notes.txt"), "not a queue file").unwrap();

    let queue = live_queue(&dir);
    assert_eq!(queue.purge().unwrap(), 2);
    assert!(published(&dir).is_none());
    assert!(dir.join("notes.txt").exists());
}

#[test]
fn test_purge_of_missing_directory_is_noop() {
    let tmp = tempfile::tempdir().unwrap();
    let queue = live_queue(&tmp.path().join("never-created"));
    assert_eq!(queue.purge().unwrap(), 0);
}
