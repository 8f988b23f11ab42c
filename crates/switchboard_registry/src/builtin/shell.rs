use std::sync::Arc;
use switchboard_core::{
    AppError, CallScope, ErrorCode, Interrupt, ParamMap, ParamSpec, ParamValue, Tool, ToolEntry,
};
use tokio::process::Command;

/// Runs a command through the configured shell.
///
/// The child is spawned with `kill_on_drop`, so when the registry cancels
/// the call the process is killed rather than left running.
pub struct ShellTool {
    name: String,
    shell: String,
    blocked: Vec<String>,
}

impl ShellTool {
    pub fn new() -> Self {
        Self {
            name: "shell".to_string(),
            shell: "sh".to_string(),
            blocked: default_blocked_commands(),
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_shell(mut self, shell: &str) -> Self {
        self.shell = shell.to_string();
        self
    }

    pub fn with_blocked(mut self, blocked: Vec<String>) -> Self {
        self.blocked = blocked;
        self
    }

    fn check_command(&self, command: &str) -> Result<(), AppError> {
        match self.blocked.iter().find(|b| command.contains(b.as_str())) {
            Some(pattern) => Err(AppError::invalid_params(format!(
                "command contains blocked pattern: '{}'",
                pattern
            ))),
            None => Ok(()),
        }
    }
}

impl Default for ShellTool {
    fn default() -> Self {
        Self::new()
    }
}

fn default_blocked_commands() -> Vec<String> {
    vec![
        "rm -rf /".to_string(),
        "rm -rf /*".to_string(),
        "mkfs".to_string(),
        "dd if=".to_string(),
        ":(){ :|:& };:".to_string(),
        "sudo rm".to_string(),
        "> /dev/sda".to_string(),
    ]
}

/// Options: `shell` (default `sh`), `blocked` (list of substrings, replaces
/// the default list when present).
pub fn build(entry: &ToolEntry) -> Result<Arc<dyn Tool>, AppError> {
    let mut tool = ShellTool::new().named(&entry.name);
    if let Some(shell) = entry.option_str("shell") {
        if shell.trim().is_empty() {
            return Err(AppError::invalid_params("shell option must not be empty"));
        }
        tool = tool.with_shell(shell);
    }
    if entry.options.contains_key("blocked") {
        tool = tool.with_blocked(entry.option_strings("blocked"));
    }
    Ok(Arc::new(tool))
}

#[async_trait::async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Execute a shell command on the local host"
    }

    fn schema(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::string("command")
            .required()
            .describe("The shell command to execute")]
    }

    async fn execute(&self, scope: &CallScope, params: ParamMap) -> Result<ParamMap, AppError> {
        let command = params
            .get("command")
            .and_then(ParamValue::as_str)
            .unwrap_or_default();
        self.check_command(command)?;

        let child = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AppError::wrap(ErrorCode::Internal, "failed to spawn command", e))?;

        let output = tokio::select! {
            output = child.wait_with_output() => output
                .map_err(|e| AppError::wrap(ErrorCode::Internal, "command execution error", e))?,
            _ = scope.cancelled() => {
                return Err(AppError::wrap(
                    ErrorCode::Internal,
                    "command cancelled",
                    Interrupt::Cancelled,
                ));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let code = i64::from(output.status.code().unwrap_or(-1));

        if !output.status.success() {
            return Err(AppError::internal(format!("command exited with status {}", code))
                .with_extra("exit_code", code)
                .with_extra("stderr", stderr));
        }

        let mut result = ParamMap::new();
        result.insert("stdout".to_string(), ParamValue::String(stdout));
        result.insert("stderr".to_string(), ParamValue::String(stderr));
        result.insert("exit_code".to_string(), ParamValue::Int(code));
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn command(cmd: &str) -> ParamMap {
        let mut p = ParamMap::new();
        p.insert("command".into(), cmd.into());
        p
    }

    #[tokio::test]
    async fn test_shell_captures_stdout() {
        let out = ShellTool::new()
            .execute(&CallScope::new(), command("echo hello"))
            .await
            .unwrap();
        assert_eq!(out["stdout"].as_str().map(str::trim), Some("hello"));
        assert_eq!(out["exit_code"], ParamValue::Int(0));
    }

    #[tokio::test]
    async fn test_shell_nonzero_exit_is_error() {
        let err = ShellTool::new()
            .execute(&CallScope::new(), command("echo oops >&2; exit 3"))
            .await
            .unwrap_err();
        assert_eq!(err.extra()["exit_code"], serde_json::json!(3));
        assert!(err.extra()["stderr"].as_str().unwrap().contains("oops"));
    }

    #[tokio::test]
    async fn test_shell_blocked_pattern() {
        let err = ShellTool::new()
            .execute(&CallScope::new(), command("sudo rm -rf /tmp/x"))
            .await
            .unwrap_err();
        assert!(err.is_code(ErrorCode::InvalidParams));
    }

    #[tokio::test]
    async fn test_shell_honours_cancellation() {
        let scope = CallScope::new();
        let canceller = scope.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });
        let started = std::time::Instant::now();
        let err = ShellTool::new()
            .execute(&scope, command("sleep 10"))
            .await
            .unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(switchboard_core::error::find_cause::<Interrupt>(&err).is_some());
    }

    #[test]
    fn test_build_options() {
        let entry = ToolEntry::new("sh", "shell")
            .with_option("shell", "bash")
            .with_option("blocked", serde_json::json!(["curl"]));
        let tool = build(&entry).unwrap();
        assert_eq!(tool.name(), "sh");

        let empty = ToolEntry::new("sh", "shell").with_option("shell", " ");
        assert!(build(&empty).is_err());
    }
}
