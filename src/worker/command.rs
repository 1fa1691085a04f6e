//! Runs a task's action as an external command.

use super::executor::{ExecutionOutput, TaskExecutor};
use super::template::render;
use crate::error::{DocketError, Result};
use crate::runs::RunLog;
use crate::task::TaskFile;
use regex::Regex;
use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::LazyLock;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

static COMMIT_LINE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^commit:\s*([0-9a-fA-F]{7,40})\s*$").expect("Invalid commit line regex")
});

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Executes actions configured as command templates.
///
/// Each action maps to a command line such as
/// `scripts/enrich.sh --card {target} --task {task_id}`. The line is split
/// with shell quoting rules, then `{task_id}`, `{action}`, `{target}` and
/// `{initiator}` are substituted per argument. stdout and stderr stream into
/// the run log line by line. On success the last non-empty stdout line is the
/// run's output, and a `commit: <sha>` line is reported as its commit.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    actions: BTreeMap<String, String>,
    working_dir: PathBuf,
}

impl CommandExecutor {
    pub fn new<P: AsRef<Path>>(actions: BTreeMap<String, String>, working_dir: P) -> Self {
        Self {
            actions,
            working_dir: working_dir.as_ref().to_path_buf(),
        }
    }

    /// Build the argv for `task` from its action template.
    fn command_line(&self, task: &TaskFile) -> Result<Vec<String>> {
        let header = &task.frontmatter;
        let template = self.actions.get(&header.action).ok_or_else(|| {
            DocketError::TaskFailed(format!(
                "no command configured for action '{}'",
                header.action
            ))
        })?;

        let words = shell_words::split(template).map_err(|e| {
            DocketError::TaskFailed(format!(
                "failed to parse command for action '{}': {}",
                header.action, e
            ))
        })?;
        if words.is_empty() {
            return Err(DocketError::TaskFailed(format!(
                "command for action '{}' is empty",
                header.action
            )));
        }

        let variables = BTreeMap::from([
            ("task_id", header.id.clone()),
            ("action", header.action.clone()),
            ("target", header.target.clone()),
            ("initiator", header.initiator.clone()),
        ]);
        words
            .iter()
            .map(|word| render(word, &variables))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| DocketError::TaskFailed(e.to_string()))
    }
}

impl TaskExecutor for CommandExecutor {
    fn execute(
        &self,
        task: &TaskFile,
        run_log: &RunLog,
        timeout: Duration,
    ) -> Result<ExecutionOutput> {
        let argv = self.command_line(task)?;
        let command_line = shell_words::join(&argv);
        run_log.note(&format!("$ {}", command_line));

        let mut command = Command::new(&argv[0]);
        command
            .args(&argv[1..])
            .current_dir(&self.working_dir)
            .env("DOCKET_TASK_ID", &task.frontmatter.id)
            .env("DOCKET_TARGET", &task.frontmatter.target)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let mut child = command.spawn().map_err(|e| {
            DocketError::TaskFailed(format!("failed to start '{}': {}", argv[0], e))
        })?;
        debug!(
            task = %task.frontmatter.id,
            pid = child.id(),
            command = %command_line,
            "action started"
        );

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (status, stdout_lines, stderr_lines) = thread::scope(|scope| {
            let out = scope.spawn(|| stream_lines(stdout, run_log, ""));
            let err = scope.spawn(|| stream_lines(stderr, run_log, "stderr: "));
            let status = wait_with_timeout(&mut child, timeout);
            (
                status,
                out.join().unwrap_or_default(),
                err.join().unwrap_or_default(),
            )
        });

        let Some(exit) = status? else {
            run_log.note(&format!("killed after {:?} timeout", timeout));
            return Err(DocketError::TaskFailed(format!(
                "action '{}' timed out after {:?}",
                task.frontmatter.action, timeout
            )));
        };

        if !exit.success() {
            let detail = stderr_lines
                .iter()
                .rev()
                .find(|line| !line.trim().is_empty())
                .map(|line| format!(": {}", line.trim()))
                .unwrap_or_default();
            return Err(DocketError::TaskFailed(format!(
                "action '{}' exited with {}{}",
                task.frontmatter.action, exit, detail
            )));
        }

        Ok(ExecutionOutput {
            output: stdout_lines
                .iter()
                .rev()
                .find(|line| !line.trim().is_empty())
                .map(|line| line.trim().to_string()),
            commit_ref: stdout_lines.iter().rev().find_map(|line| {
                COMMIT_LINE_REGEX
                    .captures(line.trim())
                    .map(|caps| caps[1].to_string())
            }),
        })
    }
}

/// Copy each line of `pipe` into the run log and return them.
fn stream_lines<R: Read>(pipe: Option<R>, run_log: &RunLog, prefix: &str) -> Vec<String> {
    let Some(pipe) = pipe else {
        return Vec::new();
    };

    let mut lines = Vec::new();
    for line in BufReader::new(pipe).lines() {
        match line {
            Ok(line) => {
                run_log.note(&format!("{}{}", prefix, line));
                lines.push(line);
            }
            Err(e) => {
                warn!(error = %e, "failed to read action output");
                break;
            }
        }
    }
    lines
}

/// Wait for `child`, killing it once `timeout` elapses.
///
/// Returns `None` if the child was killed.
fn wait_with_timeout(
    child: &mut Child,
    timeout: Duration,
) -> Result<Option<std::process::ExitStatus>> {
    let start = Instant::now();

    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(Some(status)),
            Ok(None) if start.elapsed() >= timeout => {
                kill_process(child);
                return Ok(None);
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                kill_process(child);
                return Err(DocketError::TaskFailed(format!(
                    "failed to check action status: {}",
                    e
                )));
            }
        }
    }
}

/// Kill the child and everything it spawned, then reap it.
fn kill_process(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        if let Ok(pgid) = i32::try_from(child.id()) {
            let _ = killpg(Pid::from_raw(pgid), Signal::SIGKILL);
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}
