//! Execution adapter for the external convolution program.
//!
//! [`ConvRunner::run`] never fails: launch errors, non-zero exits,
//! crashes and timeouts are all normalised into an [`ExecutionResult`]
//! so scenarios can inspect every outcome the same way.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::interrupt::InterruptFlag;

/// Text placed in `stderr` when a run exceeds its timeout.
pub const TIMEOUT_MARKER: &str = "Timeout";

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long to wait for the output pipes to drain once the child is gone.
/// A descendant that outlives the child can hold them open indefinitely.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Whether a run is expected to succeed or to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Expectation {
    #[default]
    Success,
    /// Inverted mode: a non-zero exit or a crash is the passing condition.
    Failure,
}

/// How the process ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ExecutionStatus {
    /// Exited normally with this code.
    Exited { code: i32 },
    /// Terminated without an exit code (e.g. killed by a signal).
    Crashed { signal: Option<i32> },
    /// Killed after exceeding the timeout.
    TimedOut,
    /// Killed because the run was interrupted.
    Interrupted,
    /// Could not be started at all.
    LaunchError { message: String },
}

/// Observed result of one invocation. Immutable once produced.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub expectation: Expectation,
    /// `status` judged against `expectation`.
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub elapsed_ms: u64,
}

impl ExecutionResult {
    fn new(
        status: ExecutionStatus,
        expectation: Expectation,
        stdout: String,
        stderr: String,
        elapsed: Duration,
    ) -> Self {
        let success = judge(&status, expectation);
        Self {
            status,
            expectation,
            success,
            stdout,
            stderr,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn timed_out(&self) -> bool {
        self.status == ExecutionStatus::TimedOut
    }

    pub fn was_interrupted(&self) -> bool {
        self.status == ExecutionStatus::Interrupted
    }

    /// Short human-readable description of the failure cause.
    pub fn describe(&self) -> String {
        let detail = self.stderr.trim();
        let status = match &self.status {
            ExecutionStatus::Exited { code } => format!("exit code {code}"),
            ExecutionStatus::Crashed { signal: Some(sig) } => format!("terminated by signal {sig}"),
            ExecutionStatus::Crashed { signal: None } => "terminated abnormally".to_string(),
            ExecutionStatus::TimedOut => "timed out".to_string(),
            ExecutionStatus::Interrupted => "interrupted".to_string(),
            ExecutionStatus::LaunchError { message } => format!("launch failed: {message}"),
        };
        if detail.is_empty() {
            status
        } else {
            format!("{status}: {detail}")
        }
    }
}

fn judge(status: &ExecutionStatus, expectation: Expectation) -> bool {
    match (expectation, status) {
        (Expectation::Success, ExecutionStatus::Exited { code }) => *code == 0,
        (Expectation::Failure, ExecutionStatus::Exited { code }) => *code != 0,
        (Expectation::Failure, ExecutionStatus::Crashed { .. }) => true,
        _ => false,
    }
}

/// Command-line arguments understood by the external program.
///
/// `-f`/`-g` name the input/kernel files, `-H -W`/`-kH -kW` request
/// generated operands of that shape (written to the file when both are
/// given), `-o` names the output file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvInvocation {
    pub input_file: Option<PathBuf>,
    pub kernel_file: Option<PathBuf>,
    pub input_shape: Option<(usize, usize)>,
    pub kernel_shape: Option<(usize, usize)>,
    pub output_file: Option<PathBuf>,
}

impl ConvInvocation {
    /// File mode: both operands read from existing files.
    pub fn files(input: &Path, kernel: &Path, output: &Path) -> Self {
        Self {
            input_file: Some(input.to_path_buf()),
            kernel_file: Some(kernel.to_path_buf()),
            output_file: Some(output.to_path_buf()),
            ..Self::default()
        }
    }

    /// Generation mode: both operands generated from shapes only.
    pub fn shapes(input: (usize, usize), kernel: (usize, usize)) -> Self {
        Self {
            input_shape: Some(input),
            kernel_shape: Some(kernel),
            ..Self::default()
        }
    }

    /// Mixed mode: operands generated from shapes and written to files.
    pub fn mixed(
        input: &Path,
        input_shape: (usize, usize),
        kernel: &Path,
        kernel_shape: (usize, usize),
    ) -> Self {
        Self {
            input_file: Some(input.to_path_buf()),
            kernel_file: Some(kernel.to_path_buf()),
            input_shape: Some(input_shape),
            kernel_shape: Some(kernel_shape),
            output_file: None,
        }
    }

    #[must_use]
    pub fn with_output(mut self, output: &Path) -> Self {
        self.output_file = Some(output.to_path_buf());
        self
    }

    /// Render the flag list in the order `-f -H -W -g -kH -kW -o`.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(ref f) = self.input_file {
            args.push("-f".to_string());
            args.push(f.display().to_string());
        }
        if let Some((h, w)) = self.input_shape {
            args.extend(["-H".to_string(), h.to_string(), "-W".to_string(), w.to_string()]);
        }
        if let Some(ref g) = self.kernel_file {
            args.push("-g".to_string());
            args.push(g.display().to_string());
        }
        if let Some((kh, kw)) = self.kernel_shape {
            args.extend([
                "-kH".to_string(),
                kh.to_string(),
                "-kW".to_string(),
                kw.to_string(),
            ]);
        }
        if let Some(ref o) = self.output_file {
            args.push("-o".to_string());
            args.push(o.display().to_string());
        }
        args
    }
}

/// Runs the external program with a timeout and an interrupt flag.
#[derive(Debug, Clone)]
pub struct ConvRunner {
    executable: PathBuf,
    timeout: Duration,
    interrupt: InterruptFlag,
}

impl ConvRunner {
    pub fn new(executable: impl Into<PathBuf>, timeout_secs: u64) -> Self {
        Self {
            executable: executable.into(),
            timeout: Duration::from_secs(timeout_secs.max(1)),
            interrupt: InterruptFlag::new(),
        }
    }

    #[must_use]
    pub fn with_interrupt(mut self, interrupt: InterruptFlag) -> Self {
        self.interrupt = interrupt;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn interrupt(&self) -> &InterruptFlag {
        &self.interrupt
    }

    /// Run with a typed invocation.
    pub fn invoke(&self, invocation: &ConvInvocation, expectation: Expectation) -> ExecutionResult {
        self.run(&invocation.to_args(), expectation)
    }

    /// Run with raw arguments. Never panics or returns an error.
    pub fn run(&self, args: &[String], expectation: Expectation) -> ExecutionResult {
        let start = Instant::now();
        info!(exe = %self.executable.display(), ?args, "launching");

        let mut command = Command::new(&self.executable);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // own process group, so a timeout can kill everything it spawned
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(exe = %self.executable.display(), error = %e, "launch failed");
                let message = e.to_string();
                return ExecutionResult::new(
                    ExecutionStatus::LaunchError {
                        message: message.clone(),
                    },
                    expectation,
                    String::new(),
                    message,
                    start.elapsed(),
                );
            }
        };

        let stdout_reader = spawn_reader(child.stdout.take());
        let stderr_reader = spawn_reader(child.stderr.take());

        let status = self.wait_for_child(&mut child, start);
        let stdout = collect_output(stdout_reader);
        let mut stderr = collect_output(stderr_reader);

        let status = match status {
            Ok(s) => s,
            Err(e) => ExecutionStatus::LaunchError {
                message: format!("wait failed: {e}"),
            },
        };
        if status == ExecutionStatus::TimedOut {
            stderr = TIMEOUT_MARKER.to_string();
        }
        debug!(?status, elapsed_ms = start.elapsed().as_millis(), "finished");
        ExecutionResult::new(status, expectation, stdout, stderr, start.elapsed())
    }

    fn wait_for_child(
        &self,
        child: &mut Child,
        start: Instant,
    ) -> std::io::Result<ExecutionStatus> {
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(classify_exit(status));
            }
            if self.interrupt.is_triggered() {
                warn!(pid = child.id(), "interrupted, killing child");
                kill_and_reap(child);
                return Ok(ExecutionStatus::Interrupted);
            }
            if start.elapsed() >= self.timeout {
                warn!(
                    pid = child.id(),
                    timeout_secs = self.timeout.as_secs(),
                    "timeout exceeded, killing child"
                );
                kill_and_reap(child);
                return Ok(ExecutionStatus::TimedOut);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

/// Run `executable` once with the default expectation of success.
pub fn run(executable: &Path, args: &[String], timeout_secs: u64) -> ExecutionResult {
    ConvRunner::new(executable, timeout_secs).run(args, Expectation::Success)
}

fn kill_and_reap(child: &mut Child) {
    kill_process_group(child);
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(unix)]
fn kill_process_group(child: &Child) {
    let Ok(pgid) = libc::pid_t::try_from(child.id()) else {
        return;
    };
    // SAFETY: kill(2) takes no pointers; a negative pid targets the group
    // created at spawn, whose leader is the still unreaped child.
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc != 0 {
        debug!(pgid, error = %std::io::Error::last_os_error(), "killpg failed");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_child: &Child) {}

fn classify_exit(status: ExitStatus) -> ExecutionStatus {
    match status.code() {
        Some(code) => ExecutionStatus::Exited { code },
        None => ExecutionStatus::Crashed {
            signal: exit_signal(status),
        },
    }
}

#[cfg(unix)]
fn exit_signal(status: ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: ExitStatus) -> Option<i32> {
    None
}

fn spawn_reader<R>(source: Option<R>) -> Option<Receiver<String>>
where
    R: Read + Send + 'static,
{
    source.map(|mut pipe| {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
        });
        rx
    })
}

/// Output of a reader thread, or empty if the pipe stays open past
/// [`DRAIN_GRACE`].
fn collect_output(reader: Option<Receiver<String>>) -> String {
    reader
        .and_then(|rx| match rx.recv_timeout(DRAIN_GRACE) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(error = %e, "output pipe still open after exit, giving up on it");
                None
            }
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_file_mode() {
        let inv = ConvInvocation::files(Path::new("f.txt"), Path::new("g.txt"), Path::new("o.txt"));
        assert_eq!(inv.to_args(), ["-f", "f.txt", "-g", "g.txt", "-o", "o.txt"]);
    }

    #[test]
    fn args_generation_mode() {
        let inv = ConvInvocation::shapes((5, 7), (3, 3)).with_output(Path::new("o.txt"));
        assert_eq!(
            inv.to_args(),
            ["-H", "5", "-W", "7", "-kH", "3", "-kW", "3", "-o", "o.txt"]
        );
    }

    #[test]
    fn args_generation_without_output() {
        let inv = ConvInvocation::shapes((3, 3), (3, 3));
        assert!(!inv.to_args().contains(&"-o".to_string()));
    }

    #[test]
    fn args_mixed_mode() {
        let inv = ConvInvocation::mixed(Path::new("f"), (4, 6), Path::new("g"), (3, 3))
            .with_output(Path::new("o"));
        assert_eq!(
            inv.to_args(),
            ["-f", "f", "-H", "4", "-W", "6", "-g", "g", "-kH", "3", "-kW", "3", "-o", "o"]
        );
    }

    #[test]
    fn judge_success_expectation() {
        assert!(judge(&ExecutionStatus::Exited { code: 0 }, Expectation::Success));
        assert!(!judge(&ExecutionStatus::Exited { code: 2 }, Expectation::Success));
        assert!(!judge(&ExecutionStatus::Crashed { signal: Some(11) }, Expectation::Success));
        assert!(!judge(&ExecutionStatus::TimedOut, Expectation::Success));
    }

    #[test]
    fn judge_inverted_expectation() {
        assert!(judge(&ExecutionStatus::Exited { code: 1 }, Expectation::Failure));
        assert!(judge(&ExecutionStatus::Crashed { signal: Some(11) }, Expectation::Failure));
        assert!(!judge(&ExecutionStatus::Exited { code: 0 }, Expectation::Failure));
        assert!(!judge(&ExecutionStatus::TimedOut, Expectation::Failure));
        assert!(!judge(
            &ExecutionStatus::LaunchError {
                message: "x".to_string()
            },
            Expectation::Failure
        ));
    }

    #[test]
    fn missing_executable_is_launch_error() {
        let result = run(Path::new("/definitely/not/here/conv"), &[], 5);
        assert!(!result.success);
        assert!(matches!(result.status, ExecutionStatus::LaunchError { .. }));
        assert!(!result.stderr.is_empty());
        assert!(result.describe().contains("launch failed"));
    }

    #[cfg(unix)]
    #[test]
    fn captures_stdout_and_exit_code() {
        let args = vec!["-c".to_string(), "echo hello; echo oops >&2; exit 3".to_string()];
        let result = ConvRunner::new("/bin/sh", 5).run(&args, Expectation::Success);
        assert_eq!(result.status, ExecutionStatus::Exited { code: 3 });
        assert!(!result.success);
        assert_eq!(result.stdout.trim(), "hello");
        assert_eq!(result.stderr.trim(), "oops");

        let inverted = ConvRunner::new("/bin/sh", 5).run(&args, Expectation::Failure);
        assert!(inverted.success);
    }

    #[cfg(unix)]
    #[test]
    fn timeout_kills_child() {
        let args = vec!["-c".to_string(), "exec sleep 5".to_string()];
        let result = ConvRunner::new("/bin/sh", 1)
            .with_timeout(Duration::from_millis(200))
            .run(&args, Expectation::Success);
        assert!(result.timed_out());
        assert!(!result.success);
        assert_eq!(result.stderr, TIMEOUT_MARKER);
        assert!(result.elapsed_ms < 5000);
    }

    #[cfg(unix)]
    #[test]
    fn timeout_kills_forked_descendants() {
        // the shell forks sleep instead of exec'ing it
        let args = vec!["-c".to_string(), "sleep 5; true".to_string()];
        let start = Instant::now();
        let result = ConvRunner::new("/bin/sh", 1)
            .with_timeout(Duration::from_millis(300))
            .run(&args, Expectation::Success);
        assert!(result.timed_out());
        assert!(
            start.elapsed() < Duration::from_secs(3),
            "run took {:?} past a 300ms timeout",
            start.elapsed()
        );
    }

    #[cfg(unix)]
    #[test]
    fn background_descendant_does_not_block_collection() {
        // exits at once but leaves a background grandchild holding stdout
        let args = vec!["-c".to_string(), "(sleep 5 &) ; echo done".to_string()];
        let start = Instant::now();
        let result = ConvRunner::new("/bin/sh", 10).run(&args, Expectation::Success);
        assert!(result.success);
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn interrupt_kills_child() {
        let flag = InterruptFlag::new();
        flag.trigger();
        let args = vec!["-c".to_string(), "exec sleep 5".to_string()];
        let result = ConvRunner::new("/bin/sh", 30)
            .with_interrupt(flag)
            .run(&args, Expectation::Success);
        assert!(result.was_interrupted());
        assert!(!result.success);
    }
}
