use std::sync::Arc;
use std::time::Duration;

use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;
use terminal_agent_core::tool::{Error as ToolError, Tool, ToolResult};

use super::truncate::{OUTPUT_BUDGET, keep_last};
use crate::environment::{Environment, EnvironmentError, ExecOutput};

/// Input of [`RunShellTool`].
#[derive(Deserialize, JsonSchema)]
pub struct RunShellParameters {
    #[schemars(description = "The shell command to run.")]
    command: String,
}

/// A tool for running shell commands in the environment.
pub struct RunShellTool {
    environment: Arc<dyn Environment>,
    timeout: Duration,
    parameter_schema: Value,
}

impl RunShellTool {
    /// Creates a shell tool whose commands are killed after `timeout`.
    pub fn new(environment: Arc<dyn Environment>, timeout: Duration) -> Self {
        Self {
            environment,
            timeout,
            parameter_schema: schema_for!(RunShellParameters).to_value(),
        }
    }
}

impl Tool for RunShellTool {
    type Input = RunShellParameters;

    fn name(&self) -> &str {
        "run_shell"
    }

    fn description(&self) -> &str {
        r#"
Runs a shell command in the container and returns the exit code
followed by stdout and stderr.
Output longer than 8000 characters is cut down to its last 8000 characters."#
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: RunShellParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let environment = Arc::clone(&self.environment);
        let timeout = self.timeout;
        async move {
            let output =
                environment.exec(&input.command, timeout).await.map_err(
                    |err| {
                        let reason = match err {
                            EnvironmentError::Timeout(_) => {
                                format!("command timed out: {err}")
                            }
                            _ => err.to_string(),
                        };
                        ToolError::execution_error().with_reason(reason)
                    },
                )?;
            Ok(format_output(&output))
        }
    }
}

fn format_output(output: &ExecOutput) -> String {
    let combined = format!("{}{}", output.stdout, output.stderr);
    let combined = keep_last(&combined, OUTPUT_BUDGET);
    if combined.is_empty() {
        format!("[exit {}]", output.return_code)
    } else {
        format!("[exit {}]\n{combined}", output.return_code)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::tools::tests::{dispatch, local_sandbox};

    fn shell_tool(env: Arc<dyn Environment>) -> RunShellTool {
        RunShellTool::new(env, Duration::from_secs(5))
    }

    #[test]
    fn test_format_output() {
        let output = ExecOutput {
            stdout: "out\n".to_owned(),
            stderr: "err\n".to_owned(),
            return_code: 1,
        };
        assert_eq!(format_output(&output), "[exit 1]\nout\nerr\n");
        assert_eq!(format_output(&ExecOutput::default()), "[exit 0]");
    }

    #[tokio::test]
    async fn test_exit_code_without_output() {
        let (_sandbox, env) = local_sandbox();
        let result =
            dispatch(shell_tool(env), json!({ "command": "exit 7" })).await;
        assert_eq!(result, "[exit 7]");
    }

    #[tokio::test]
    async fn test_long_output_keeps_the_tail() {
        let (_sandbox, env) = local_sandbox();
        // 1000 lines of 10 characters each.
        let command = "i=0; while [ $i -lt 1000 ]; do \
                       printf '%09d\\n' $i; i=$((i+1)); done";
        let result =
            dispatch(shell_tool(env), json!({ "command": command })).await;

        let all: String = (0..1000).map(|i| format!("{i:09}\n")).collect();
        let tail = &all[all.len() - OUTPUT_BUDGET..];
        assert_eq!(
            result,
            format!("[exit 0]\n[truncated, showing last 8000 chars]\n{tail}")
        );
    }

    #[tokio::test]
    async fn test_timeout_becomes_an_error_result() {
        let (_sandbox, env) = local_sandbox();
        let tool = RunShellTool::new(env, Duration::from_millis(100));
        let result = dispatch(tool, json!({ "command": "sleep 5" })).await;
        assert!(
            result.starts_with("[error] command timed out:"),
            "unexpected result: {result}"
        );
    }
}
