use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use phaseforge_core::executor::{InvokeOutcome, InvokeRequest, InvokeResult, PhaseInvoker};

use super::tail;

const STDERR_TAIL_CHARS: usize = 2000;

/// Runs a local program per phase.
///
/// The composed input is written to stdin and stdout becomes the output.
/// Phase metadata is passed as `PHASEFORGE_*` environment variables.
pub struct CommandInvoker {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl CommandInvoker {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Option<Duration>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    async fn run(&self, request: &InvokeRequest) -> InvokeOutcome {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .env("PHASEFORGE_MODEL", &request.model)
            .env("PHASEFORGE_PHASE_ID", request.phase_id.to_string())
            .env(
                "PHASEFORGE_FILE_PATH",
                request.file_path.as_deref().unwrap_or_default(),
            )
            .env(
                "PHASEFORGE_OUTPUT_TYPE",
                request.output_type.map(|t| t.as_str()).unwrap_or_default(),
            )
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the wait future (cancellation, timeout) kills the child.
            .kill_on_drop(true);

        let started = Instant::now();
        let mut child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) => {
                return InvokeOutcome::failure(format!("failed to spawn '{}': {}", self.program, e))
            }
        };

        if let Some(mut stdin) = child.stdin.take() {
            let input = request.composed_input.clone();
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(input.as_bytes()).await {
                    tracing::debug!("command stdin closed early: {}", e);
                }
            });
        }

        let waited = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(r) => r,
                Err(_) => {
                    return InvokeOutcome::failure(format!(
                        "command timed out after {}s",
                        limit.as_secs_f64()
                    ))
                }
            },
            None => child.wait_with_output().await,
        };

        let output = match waited {
            Ok(o) => o,
            Err(e) => return InvokeOutcome::failure(format!("command failed: {}", e)),
        };

        if output.status.success() {
            return InvokeOutcome::Success(InvokeResult::new(
                String::from_utf8_lossy(&output.stdout),
                started.elapsed(),
            ));
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let code = output
            .status
            .code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        InvokeOutcome::failure(format!(
            "command exited with {}: {}",
            code,
            tail(stderr.trim_end(), STDERR_TAIL_CHARS)
        ))
    }
}

#[async_trait]
impl PhaseInvoker for CommandInvoker {
    fn name(&self) -> &str {
        "command"
    }

    async fn invoke(&self, request: InvokeRequest) -> InvokeOutcome {
        tracing::debug!(program = %self.program, phase = %request.phase_id, "spawning phase command");
        tokio::select! {
            biased;
            _ = request.cancel.cancelled() => InvokeOutcome::Aborted,
            outcome = self.run(&request) => outcome,
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use phaseforge_core::executor::CancelSignal;
    use phaseforge_core::phase::PhaseId;

    fn sh(script: &str, timeout: Option<Duration>) -> CommandInvoker {
        CommandInvoker::new("sh", vec!["-c".into(), script.into()], timeout)
    }

    fn request(input: &str, cancel: CancelSignal) -> InvokeRequest {
        InvokeRequest {
            model: "local".into(),
            phase_id: PhaseId(3),
            composed_input: input.into(),
            file_path: None,
            output_type: None,
            cancel,
        }
    }

    #[tokio::test]
    async fn stdin_in_stdout_out() {
        let invoker = sh("cat; printf ' [%s/%s]' \"$PHASEFORGE_PHASE_ID\" \"$PHASEFORGE_MODEL\"", None);
        match invoker.invoke(request("hello", CancelSignal::new())).await {
            InvokeOutcome::Success(r) => assert_eq!(r.output, "hello [3/local]"),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn non_zero_exit_reports_stderr() {
        let invoker = sh("echo 'quota exceeded' >&2; exit 3", None);
        assert_eq!(
            invoker.invoke(request("", CancelSignal::new())).await,
            InvokeOutcome::failure("command exited with 3: quota exceeded")
        );
    }

    #[tokio::test]
    async fn timeout_is_a_failure() {
        let invoker = sh("sleep 5", Some(Duration::from_millis(100)));
        match invoker.invoke(request("", CancelSignal::new())).await {
            InvokeOutcome::Failure { message } => assert!(message.contains("timed out")),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn cancellation_aborts_the_child() {
        let invoker = sh("sleep 5", None);
        let cancel = CancelSignal::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.request_cancel();
        });

        let started = Instant::now();
        assert_eq!(invoker.invoke(request("", cancel)).await, InvokeOutcome::Aborted);
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn missing_program_is_a_failure() {
        let invoker = CommandInvoker::new("/definitely/not/a/program", vec![], None);
        match invoker.invoke(request("", CancelSignal::new())).await {
            InvokeOutcome::Failure { message } => assert!(message.contains("failed to spawn")),
            other => panic!("unexpected outcome {:?}", other),
        }
    }
}
