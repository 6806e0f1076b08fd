//! Command execution
//!
//! [`CommandExecutor`] is the seam between the pipeline and the outside
//! world. [`RealExecutor`] spawns the command inside a [`Sandbox`] with a
//! timeout and capped output; [`MockExecutor`](crate::mock_executor::MockExecutor)
//! returns canned results. Which one runs is fixed at construction through
//! [`Executor`].
//!
//! Neither implementation will run a command the validator has not marked
//! `safe`.

use std::future::Future;
use std::io;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::timeout_at;
use tracing::{debug, info, warn};

use crate::builder::BuiltCommand;
use crate::config::{ExecutorConfig, ExecutorMode};
use crate::error::{ErrorCode, PipelineError, Result};
use crate::mock_executor::MockExecutor;
use crate::output_parser::{classify_stderr, parse_output, OutputData};
use crate::sandbox::{read_capped, terminate, CapturedOutput, ProcessGroup, Sandbox};

/// Shell convention for "command not found"
const EXIT_COMMAND_NOT_FOUND: i32 = 127;

/// Outcome of running one command
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<OutputData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<String>,
    /// User-facing error message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    #[serde(default)]
    pub retryable: bool,
    /// Output hit the size cap
    #[serde(default)]
    pub truncated: bool,
}

impl ExecutionResult {
    pub fn succeeded(data: OutputData, raw_output: Option<String>, truncated: bool) -> Self {
        Self {
            success: true,
            data: Some(data),
            raw_output,
            error: None,
            error_code: None,
            retryable: false,
            truncated,
        }
    }

    pub fn failed(err: &PipelineError, raw_output: Option<String>) -> Self {
        Self {
            success: false,
            data: None,
            raw_output,
            error: Some(err.user_message()),
            error_code: Some(err.code()),
            retryable: err.is_retryable(),
            truncated: false,
        }
    }

    /// The refusal returned for any command without the `safe` mark
    pub(crate) fn refused() -> Self {
        Self::failed(
            &PipelineError::UnsafeCommand {
                pattern: "not validated".to_string(),
            },
            None,
        )
    }
}

/// Runs validated commands
pub trait CommandExecutor: Send + Sync {
    fn execute(&self, command: &BuiltCommand) -> impl Future<Output = ExecutionResult> + Send;
}

/// Spawns real processes in a sandbox
#[derive(Clone, Debug, Default)]
pub struct RealExecutor {
    config: ExecutorConfig,
}

impl RealExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    async fn run(&self, command: &BuiltCommand) -> Result<ExecutionResult> {
        let program = command
            .program()
            .ok_or_else(|| PipelineError::InvalidArgument(command.raw.clone()))?;

        let sandbox = Sandbox::new(&self.config)?;
        let mut child = match sandbox.command(program, command.args()).spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(PipelineError::BinaryNotFound(program.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let group = ProcessGroup::of(&child);
        let cap = self.config.max_output_bytes;
        let mut stdout_task = spawn_reader(child.stdout.take(), cap);
        let mut stderr_task = spawn_reader(child.stderr.take(), cap);

        // One deadline covers the child and both streams; descendants may
        // keep the pipes open after the child itself has exited
        let deadline = tokio::time::Instant::now() + self.config.timeout();
        let finished = timeout_at(deadline, async {
            let status = child.wait().await?;
            let stdout = join_reader(&mut stdout_task).await?;
            let stderr = join_reader(&mut stderr_task).await?;
            Ok::<_, io::Error>((status, stdout, stderr))
        })
        .await;

        let (status, stdout, stderr) = match finished {
            Ok(outcome) => outcome?,
            Err(_) => {
                warn!(
                    program,
                    timeout_secs = self.config.timeout_secs,
                    "command timed out, terminating"
                );
                stdout_task.abort();
                stderr_task.abort();
                let status = terminate(&mut child, &group, self.config.grace_period()).await?;
                debug!(?status, "timed out command reaped");
                return Err(PipelineError::ExecutionTimeout(self.config.timeout_secs));
            }
        };

        if status.code() == Some(EXIT_COMMAND_NOT_FOUND) {
            return Err(PipelineError::BinaryNotFound(program.to_string()));
        }

        if !status.success() {
            let stderr_text = stderr.text();
            return Err(match classify_stderr(&stderr_text) {
                Some(kind) => PipelineError::ClassifiedRuntime {
                    kind,
                    stderr: stderr_text,
                },
                None => PipelineError::UnclassifiedRuntime {
                    code: status.code(),
                    stderr: stderr_text,
                },
            });
        }

        // Parse the kept bytes; the marker only goes into the raw copy
        let data = parse_output(command, &String::from_utf8_lossy(&stdout.bytes));
        Ok(ExecutionResult::succeeded(
            data,
            Some(stdout.text()),
            stdout.truncated || stderr.truncated,
        ))
    }
}

impl CommandExecutor for RealExecutor {
    async fn execute(&self, command: &BuiltCommand) -> ExecutionResult {
        if !command.safe {
            warn!(intent = %command.intent, "refusing to execute unvalidated command");
            return ExecutionResult::refused();
        }

        let started = Instant::now();
        let result = match self.run(command).await {
            Ok(result) => result,
            Err(err) => {
                let raw = match &err {
                    PipelineError::ClassifiedRuntime { stderr, .. }
                    | PipelineError::UnclassifiedRuntime { stderr, .. } => Some(stderr.clone()),
                    _ => None,
                };
                warn!(intent = %command.intent, error = %err, "command failed");
                ExecutionResult::failed(&err, raw)
            }
        };

        info!(
            intent = %command.intent,
            success = result.success,
            truncated = result.truncated,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "executed command"
        );
        result
    }
}

fn spawn_reader<R>(stream: Option<R>, cap: usize) -> JoinHandle<io::Result<CapturedOutput>>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        match stream {
            Some(stream) => read_capped(stream, cap).await,
            None => Ok(CapturedOutput::default()),
        }
    })
}

async fn join_reader(
    task: &mut JoinHandle<io::Result<CapturedOutput>>,
) -> io::Result<CapturedOutput> {
    task.await.map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
}

/// The executor a pipeline is built with
pub enum Executor {
    Real(RealExecutor),
    Mock(MockExecutor),
}

impl Executor {
    pub fn from_config(config: &ExecutorConfig) -> Self {
        match config.mode {
            ExecutorMode::Real => Executor::Real(RealExecutor::new(config.clone())),
            ExecutorMode::Mock => Executor::Mock(MockExecutor::new()),
        }
    }

    pub fn is_mock(&self) -> bool {
        matches!(self, Executor::Mock(_))
    }
}

impl CommandExecutor for Executor {
    async fn execute(&self, command: &BuiltCommand) -> ExecutionResult {
        match self {
            Executor::Real(real) => real.execute(command).await,
            Executor::Mock(mock) => mock.execute(command).await,
        }
    }
}
