//! Tests for the worker loop and the command executor.

use super::*;
use crate::error::{DocketError, Result};
use crate::locks::{AcquireOutcome, RepoLock};
use crate::runs::{RunLog, RunMetadata};
use crate::task::{TaskFile, TaskStatus, TaskStore};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

struct Fixture {
    _temp_dir: TempDir,
    root: PathBuf,
    store: TaskStore,
}

impl Fixture {
    fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().to_path_buf();
        let lock = RepoLock::new(root.join("locks").join("repo.lock"), Duration::from_secs(60));
        let store = TaskStore::new(root.join("tasks"), lock);
        Self {
            _temp_dir: temp_dir,
            root,
            store,
        }
    }

    fn runs_dir(&self) -> PathBuf {
        self.root.join("runs")
    }

    fn worker(&self, executor: Arc<dyn TaskExecutor>) -> Worker {
        Worker::new(self.store.clone(), self.runs_dir(), executor)
            .with_task_timeout(Duration::from_secs(10))
            .with_poll_interval(Duration::from_millis(10))
    }

    fn add_task(&self, id: &str, action: &str, target: &str, created: &str) {
        write_task(self.store.dir(), id, action, target, created);
    }

    fn status(&self, id: &str) -> TaskStatus {
        self.store.get(id).unwrap().unwrap().status()
    }
}

fn write_task(dir: &Path, id: &str, action: &str, target: &str, created: &str) {
    std::fs::create_dir_all(dir).unwrap();
    let content = format!(
        "---\nType: agent-task\nID: {id}\nStatus: pending\nAction: {action}\nTarget: {target}\nInitiator: tester\nCreated: {created}\n---\n"
    );
    std::fs::write(dir.join(format!("{}.md", id)), content).unwrap();
}

/// Records what it was asked to run and whether the lock was held meanwhile.
#[derive(Default)]
struct StubExecutor {
    seen: Mutex<Vec<String>>,
    lock_path: Mutex<Option<PathBuf>>,
    lock_held_during_run: AtomicBool,
}

impl TaskExecutor for StubExecutor {
    fn execute(
        &self,
        task: &TaskFile,
        run_log: &RunLog,
        _timeout: Duration,
    ) -> Result<ExecutionOutput> {
        if let Some(path) = self.lock_path.lock().unwrap().as_ref() {
            self.lock_held_during_run
                .store(path.exists(), Ordering::SeqCst);
        }
        assert_eq!(task.status(), TaskStatus::InProgress);
        self.seen.lock().unwrap().push(task.id().to_string());
        run_log.append(&format!("working on {}", task.frontmatter.target))?;
        Ok(ExecutionOutput {
            output: Some(format!("did {}", task.frontmatter.target)),
            commit_ref: None,
        })
    }
}

// ============================================================================
// Worker loop
// ============================================================================

#[test]
fn test_end_to_end_single_task() {
    let fixture = Fixture::new();
    let stub = Arc::new(StubExecutor::default());
    *stub.lock_path.lock().unwrap() = Some(fixture.store.lock().path().to_path_buf());
    let worker = fixture.worker(stub.clone());

    // Empty queue: nothing happens.
    assert_eq!(worker.poll_once().unwrap(), PollOutcome::Idle);
    assert!(!fixture.runs_dir().exists());

    fixture.add_task("T1", "demo", "X", "2026-01-13T10:00:00Z");
    assert_eq!(
        worker.poll_once().unwrap(),
        PollOutcome::Processed {
            task_id: "T1".to_string(),
            status: TaskStatus::Complete
        }
    );

    assert!(stub.lock_held_during_run.load(Ordering::SeqCst));
    assert!(!fixture.store.lock().path().exists());
    assert_eq!(fixture.status("T1"), TaskStatus::Complete);

    let run = RunLog::load_of(fixture.runs_dir(), "T1").unwrap().unwrap();
    assert_eq!(run.frontmatter.status, TaskStatus::Complete);
    assert!(run.frontmatter.duration_ms.is_some());
    assert!(run.frontmatter.completed.is_some());
    assert_eq!(run.frontmatter.output.as_deref(), Some("did X"));
    assert_eq!(run.frontmatter.action, "demo");
    assert!(run.log_lines().iter().any(|l| l.ends_with("working on X")));

    // Nothing new: no-op.
    assert_eq!(worker.poll_once().unwrap(), PollOutcome::Idle);
    assert_eq!(*stub.seen.lock().unwrap(), vec!["T1".to_string()]);
}

#[test]
fn test_oldest_pending_task_runs_first() {
    let fixture = Fixture::new();
    let stub = Arc::new(StubExecutor::default());
    let worker = fixture.worker(stub.clone());

    fixture.add_task("T1", "demo", "a", "2026-01-13T10:00:00Z");
    fixture.add_task("T2", "demo", "b", "2026-01-12T10:00:00Z");
    fixture.add_task("T3", "demo", "c", "2026-01-14T10:00:00Z");

    for _ in 0..3 {
        assert!(matches!(
            worker.poll_once().unwrap(),
            PollOutcome::Processed { .. }
        ));
    }

    assert_eq!(*stub.seen.lock().unwrap(), vec!["T2", "T1", "T3"]);
}

#[test]
fn test_executor_error_marks_task_failed() {
    let fixture = Fixture::new();
    let executor = |_: &TaskFile, _: &RunLog, _: Duration| -> Result<ExecutionOutput> {
        Err(DocketError::TaskFailed("card not found".to_string()))
    };
    let worker = fixture.worker(Arc::new(executor));
    fixture.add_task("T1", "demo", "X", "2026-01-13T10:00:00Z");

    assert_eq!(
        worker.poll_once().unwrap(),
        PollOutcome::Processed {
            task_id: "T1".to_string(),
            status: TaskStatus::Failed
        }
    );

    assert_eq!(fixture.status("T1"), TaskStatus::Failed);
    let run = RunLog::status_of(fixture.runs_dir(), "T1").unwrap().unwrap();
    assert_eq!(run.status, TaskStatus::Failed);
    assert!(run.error.unwrap().contains("card not found"));
    assert!(!fixture.store.lock().path().exists());
}

#[test]
fn test_executor_panic_marks_task_failed() {
    let fixture = Fixture::new();
    let executor = |_: &TaskFile, _: &RunLog, _: Duration| -> Result<ExecutionOutput> {
        panic!("executor blew up")
    };
    let worker = fixture.worker(Arc::new(executor));
    fixture.add_task("T1", "demo", "X", "2026-01-13T10:00:00Z");

    let outcome = worker.poll_once().unwrap();

    assert!(matches!(
        outcome,
        PollOutcome::Processed {
            status: TaskStatus::Failed,
            ..
        }
    ));
    let run = RunLog::status_of(fixture.runs_dir(), "T1").unwrap().unwrap();
    assert!(run.error.unwrap().contains("executor blew up"));
    assert!(!fixture.store.lock().path().exists());
}

#[test]
fn test_busy_lock_leaves_task_pending() {
    let fixture = Fixture::new();
    let stub = Arc::new(StubExecutor::default());
    let worker = fixture.worker(stub.clone());
    fixture.add_task("T1", "demo", "X", "2026-01-13T10:00:00Z");

    let AcquireOutcome::Granted { token } = fixture.store.lock().acquire("pete", "editing").unwrap()
    else {
        panic!("expected to acquire");
    };

    assert_eq!(worker.poll_once().unwrap(), PollOutcome::Contended);
    assert_eq!(fixture.status("T1"), TaskStatus::Pending);
    assert!(stub.seen.lock().unwrap().is_empty());

    fixture.store.lock().release(&token);
    assert!(matches!(
        worker.poll_once().unwrap(),
        PollOutcome::Processed { .. }
    ));
}

#[test]
fn test_claim_and_execution_share_one_lock_hold() {
    let fixture = Fixture::new();
    let lock = fixture.store.lock().clone();
    let executor = move |task: &TaskFile, _: &RunLog, _: Duration| -> Result<ExecutionOutput> {
        // A writer arriving mid-task is turned away; the holder is the claim's.
        let holder = match lock.acquire("pete", "editing card")? {
            AcquireOutcome::Held { holder: Some(holder) } => holder,
            other => {
                return Err(DocketError::TaskFailed(format!("writer got in: {:?}", other)));
            }
        };
        assert_eq!(holder.holder_id, format!("agent-runner:{}", task.id()));
        Ok(ExecutionOutput::default())
    };
    let worker = fixture.worker(Arc::new(executor));
    fixture.add_task("T1", "demo", "X", "2026-01-13T10:00:00Z");

    assert_eq!(
        worker.poll_once().unwrap(),
        PollOutcome::Processed {
            task_id: "T1".to_string(),
            status: TaskStatus::Complete
        }
    );
    assert!(!fixture.store.lock().path().exists());

    let run = RunLog::status_of(fixture.runs_dir(), "T1").unwrap().unwrap();
    assert_eq!(run.status, TaskStatus::Complete);
    assert_eq!(run.error, None);
}

#[test]
fn test_executor_ignoring_timeout_is_abandoned() {
    let fixture = Fixture::new();
    let release = Arc::new(AtomicBool::new(false));
    let executor = {
        let release = Arc::clone(&release);
        move |_: &TaskFile, run_log: &RunLog, _: Duration| -> Result<ExecutionOutput> {
            while !release.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(5));
            }
            // Too late: the run is finalized by now.
            assert!(run_log.append("still here").is_err());
            Ok(ExecutionOutput::default())
        }
    };
    let worker = Worker::new(fixture.store.clone(), fixture.runs_dir(), Arc::new(executor))
        .with_task_timeout(Duration::from_millis(100));
    fixture.add_task("T1", "demo", "X", "2026-01-13T10:00:00Z");

    let started = std::time::Instant::now();
    assert_eq!(
        worker.poll_once().unwrap(),
        PollOutcome::Processed {
            task_id: "T1".to_string(),
            status: TaskStatus::Failed
        }
    );
    assert!(started.elapsed() < Duration::from_secs(5));

    assert_eq!(fixture.status("T1"), TaskStatus::Failed);
    assert!(!fixture.store.lock().path().exists());
    let run = RunLog::status_of(fixture.runs_dir(), "T1").unwrap().unwrap();
    assert!(run.error.unwrap().contains("timed out"));

    release.store(true, Ordering::SeqCst);
}

#[test]
fn test_run_stops_on_shutdown() {
    let fixture = Fixture::new();
    let stub = Arc::new(StubExecutor::default());
    let worker = Arc::new(fixture.worker(stub.clone()));
    fixture.add_task("T1", "demo", "X", "2026-01-13T10:00:00Z");
    fixture.add_task("T2", "demo", "Y", "2026-01-13T11:00:00Z");

    let shutdown = Arc::new(AtomicBool::new(false));
    let handle = {
        let worker = Arc::clone(&worker);
        let shutdown = Arc::clone(&shutdown);
        std::thread::spawn(move || worker.run(&shutdown))
    };

    for _ in 0..500 {
        if stub.seen.lock().unwrap().len() == 2 {
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    shutdown.store(true, Ordering::SeqCst);
    handle.join().unwrap().unwrap();

    assert_eq!(*stub.seen.lock().unwrap(), vec!["T1", "T2"]);
    assert_eq!(fixture.status("T2"), TaskStatus::Complete);
}

#[test]
fn test_huge_poll_interval_still_honors_shutdown() {
    let fixture = Fixture::new();
    let worker = Arc::new(
        fixture
            .worker(Arc::new(StubExecutor::default()))
            .with_poll_interval(Duration::from_millis(u64::MAX)),
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    let handle = {
        let worker = Arc::clone(&worker);
        let shutdown = Arc::clone(&shutdown);
        std::thread::spawn(move || worker.run(&shutdown))
    };

    std::thread::sleep(Duration::from_millis(50));
    shutdown.store(true, Ordering::SeqCst);
    handle.join().unwrap().unwrap();
}

// ============================================================================
// Command executor
// ============================================================================

#[cfg(unix)]
mod command_executor {
    use super::*;

    fn run_action(command: &str, timeout: Duration) -> (TempDir, Result<ExecutionOutput>) {
        let temp_dir = TempDir::new().unwrap();
        write_task(temp_dir.path(), "T1", "demo", "BRIK 001", "2026-01-13T10:00:00Z");
        let task = TaskFile::load(temp_dir.path().join("T1.md")).unwrap();
        let run_log = RunLog::start(
            temp_dir.path().join("runs"),
            "T1",
            &RunMetadata::from(&task),
        )
        .unwrap();

        let actions = BTreeMap::from([("demo".to_string(), command.to_string())]);
        let executor = CommandExecutor::new(actions, temp_dir.path());
        let result = executor.execute(&task, &run_log, timeout);
        (temp_dir, result)
    }

    fn log_lines(temp_dir: &TempDir) -> Vec<String> {
        RunLog::load_of(temp_dir.path().join("runs"), "T1")
            .unwrap()
            .unwrap()
            .log_lines()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_captures_output_and_commit() {
        let (temp_dir, result) = run_action(
            r#"sh -c 'echo "working on $1"; echo "commit: abc1234def"; echo done' _ {target}"#,
            Duration::from_secs(10),
        );

        let output = result.unwrap();
        assert_eq!(output.output.as_deref(), Some("done"));
        assert_eq!(output.commit_ref.as_deref(), Some("abc1234def"));

        let lines = log_lines(&temp_dir);
        assert!(lines.iter().any(|l| l.ends_with("working on BRIK 001")));
        assert!(lines.iter().any(|l| l.contains("$ sh -c")));
    }

    #[test]
    fn test_run_log_records_quoted_command_line() {
        let (temp_dir, result) = run_action("echo {target}", Duration::from_secs(10));
        result.unwrap();

        let lines = log_lines(&temp_dir);
        assert!(lines.iter().any(|l| l.ends_with("$ echo 'BRIK 001'")));
    }

    #[test]
    fn test_nonzero_exit_fails_with_stderr() {
        let (temp_dir, result) = run_action(
            r#"sh -c 'echo "no such card" >&2; exit 3'"#,
            Duration::from_secs(10),
        );

        let err = result.unwrap_err();
        assert!(matches!(err, DocketError::TaskFailed(_)));
        assert!(err.to_string().contains("no such card"));
        assert!(
            log_lines(&temp_dir)
                .iter()
                .any(|l| l.ends_with("stderr: no such card"))
        );
    }

    #[test]
    fn test_timeout_kills_action() {
        let started = std::time::Instant::now();
        let (_temp_dir, result) = run_action("sh -c 'sleep 30'", Duration::from_millis(300));

        let err = result.unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_unknown_action_fails() {
        let temp_dir = TempDir::new().unwrap();
        write_task(temp_dir.path(), "T1", "other", "X", "2026-01-13T10:00:00Z");
        let task = TaskFile::load(temp_dir.path().join("T1.md")).unwrap();
        let run_log = RunLog::start(temp_dir.path(), "RUN", &RunMetadata::from(&task)).unwrap();

        let executor = CommandExecutor::new(BTreeMap::new(), temp_dir.path());
        let err = executor
            .execute(&task, &run_log, Duration::from_secs(1))
            .unwrap_err();

        assert!(err.to_string().contains("no command configured"));
    }

    #[test]
    fn test_missing_program_fails() {
        let (_temp_dir, result) =
            run_action("definitely-not-a-real-program-xyz", Duration::from_secs(5));
        assert!(result.unwrap_err().to_string().contains("failed to start"));
    }
}
