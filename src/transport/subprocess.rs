//! Subprocess transport backed by the Claude Code CLI

use async_trait::async_trait;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{ClaudeError, Result};
use crate::transport::Transport;
use crate::types::{ClaudeCodeOptions, McpServerConfig, McpServers};

const DEFAULT_MAX_BUFFER_SIZE: usize = 1024 * 1024; // 1 MiB

/// Environment variable overriding CLI discovery
pub const CLI_PATH_ENV: &str = "CLAUDE_CODE_CLI_PATH";

/// Prompt input mode
#[derive(Debug)]
pub enum PromptInput {
    /// One-shot prompt passed on the command line (`--print -- <prompt>`)
    String(String),
    /// Streaming mode fed over stdin (`--input-format stream-json`)
    Stream,
}

impl From<String> for PromptInput {
    fn from(s: String) -> Self {
        PromptInput::String(s)
    }
}

impl From<&str> for PromptInput {
    fn from(s: &str) -> Self {
        PromptInput::String(s.to_string())
    }
}

/// Transport that launches and supervises the `claude` CLI subprocess
pub struct SubprocessTransport {
    prompt: PromptInput,
    options: ClaudeCodeOptions,
    cli_path: PathBuf,
    process: Arc<Mutex<Option<Child>>>,
    stdin: Option<ChildStdin>,
    stdout: Option<BufReader<ChildStdout>>,
    ready: Arc<AtomicBool>,
    max_buffer_size: usize,
    reader_task: Option<JoinHandle<()>>,
    stderr_task: Option<JoinHandle<()>>,
    stderr_output: Arc<std::sync::Mutex<String>>,
    exit_error: Arc<std::sync::Mutex<Option<ClaudeError>>>,
    cancellation_token: CancellationToken,
}

impl SubprocessTransport {
    /// Create a new subprocess transport
    ///
    /// # Arguments
    /// * `prompt` - One-shot prompt or streaming mode
    /// * `options` - Session configuration
    /// * `cli_path` - Explicit CLI path, bypassing discovery
    ///
    /// # Errors
    /// Returns [`ClaudeError::CliNotFound`] when no CLI can be located
    pub fn new(
        prompt: PromptInput,
        options: ClaudeCodeOptions,
        cli_path: Option<PathBuf>,
    ) -> Result<Self> {
        let cli_path = match cli_path {
            Some(path) => path,
            None => Self::find_cli()?,
        };
        let max_buffer_size = options.max_buffer_size.unwrap_or(DEFAULT_MAX_BUFFER_SIZE);

        Ok(Self {
            prompt,
            options,
            cli_path,
            process: Arc::new(Mutex::new(None)),
            stdin: None,
            stdout: None,
            ready: Arc::new(AtomicBool::new(false)),
            max_buffer_size,
            reader_task: None,
            stderr_task: None,
            stderr_output: Arc::new(std::sync::Mutex::new(String::new())),
            exit_error: Arc::new(std::sync::Mutex::new(None)),
            cancellation_token: CancellationToken::new(),
        })
    }

    /// Locate the Claude Code CLI binary.
    ///
    /// Order: `CLAUDE_CODE_CLI_PATH` override, `claude` on `PATH`, then
    /// well-known install locations.
    pub fn find_cli() -> Result<PathBuf> {
        if let Ok(path) = env::var(CLI_PATH_ENV) {
            if !path.trim().is_empty() {
                return Ok(PathBuf::from(path));
            }
        }

        if let Ok(path) = which::which("claude") {
            return Ok(path);
        }

        let home = env::var("HOME").unwrap_or_else(|_| String::from("/root"));
        let locations = [
            PathBuf::from(&home).join(".npm-global/bin/claude"),
            PathBuf::from("/usr/local/bin/claude"),
            PathBuf::from(&home).join(".local/bin/claude"),
            PathBuf::from(&home).join("node_modules/.bin/claude"),
            PathBuf::from(&home).join(".yarn/bin/claude"),
        ];
        for path in locations {
            if path.is_file() {
                return Ok(path);
            }
        }

        let node_installed = which::which("node").is_ok();
        Err(ClaudeError::cli_not_found(node_installed))
    }

    /// Translate the configuration into the CLI argument vector
    fn build_args(&self) -> Result<Vec<String>> {
        let mut args: Vec<String> = vec![
            "--output-format".into(),
            "stream-json".into(),
            "--verbose".into(),
        ];

        let opts = &self.options;
        if let Some(ref system_prompt) = opts.system_prompt {
            args.push("--system-prompt".into());
            args.push(system_prompt.clone());
        }
        if let Some(ref append) = opts.append_system_prompt {
            args.push("--append-system-prompt".into());
            args.push(append.clone());
        }
        if !opts.allowed_tools.is_empty() {
            args.push("--allowedTools".into());
            args.push(join_tool_names(&opts.allowed_tools));
        }
        if !opts.disallowed_tools.is_empty() {
            args.push("--disallowedTools".into());
            args.push(join_tool_names(&opts.disallowed_tools));
        }
        if let Some(max_turns) = opts.max_turns {
            args.push("--max-turns".into());
            args.push(max_turns.to_string());
        }
        if let Some(ref model) = opts.model {
            args.push("--model".into());
            args.push(model.clone());
        }
        if let Some(ref tool) = opts.permission_prompt_tool_name {
            args.push("--permission-prompt-tool".into());
            args.push(tool.clone());
        }
        if let Some(mode) = opts.permission_mode {
            args.push("--permission-mode".into());
            args.push(mode.as_str().into());
        }
        if opts.continue_conversation {
            args.push("--continue".into());
        }
        if let Some(ref session_id) = opts.resume {
            args.push("--resume".into());
            args.push(session_id.as_str().into());
        }
        if let Some(ref settings) = opts.settings {
            args.push("--settings".into());
            args.push(settings.clone());
        }
        for dir in &opts.add_dirs {
            args.push("--add-dir".into());
            args.push(dir.to_string_lossy().into_owned());
        }

        match &opts.mcp_servers {
            McpServers::Dict(servers) if !servers.is_empty() => {
                args.push("--mcp-config".into());
                args.push(mcp_config_json(servers)?);
            }
            McpServers::Json(json) => {
                args.push("--mcp-config".into());
                args.push(json.clone());
            }
            McpServers::Path(path) => {
                args.push("--mcp-config".into());
                args.push(path.to_string_lossy().into_owned());
            }
            McpServers::Dict(_) | McpServers::None => {}
        }

        for (flag, value) in &opts.extra_args {
            args.push(format!("--{flag}"));
            if let Some(v) = value {
                if !v.trim().is_empty() {
                    args.push(v.clone());
                }
            }
        }

        match &self.prompt {
            PromptInput::Stream => {
                args.push("--input-format".into());
                args.push("stream-json".into());
            }
            PromptInput::String(prompt) => {
                args.push("--print".into());
                args.push("--".into());
                args.push(prompt.clone());
            }
        }

        Ok(args)
    }

    fn latched_exit_error(&self) -> Option<ClaudeError> {
        self.exit_error
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(clone_exit_error))
    }
}

/// Re-materialize a latched error so it can be raised more than once
fn clone_exit_error(err: &ClaudeError) -> ClaudeError {
    match err {
        ClaudeError::Process {
            message,
            exit_code,
            stderr,
        } => ClaudeError::Process {
            message: message.clone(),
            exit_code: *exit_code,
            stderr: stderr.clone(),
        },
        ClaudeError::JsonDecode(msg) => ClaudeError::JsonDecode(msg.clone()),
        other => ClaudeError::Connection(other.to_string()),
    }
}

fn join_tool_names(tools: &[crate::types::ToolName]) -> String {
    tools
        .iter()
        .map(crate::types::ToolName::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

/// Serialize the MCP server map for `--mcp-config`, dropping any `instance`
/// key from each server entry
fn mcp_config_json(servers: &HashMap<String, McpServerConfig>) -> Result<String> {
    let mut cleaned = serde_json::Map::new();
    for (name, config) in servers {
        let mut value = serde_json::to_value(config).map_err(|e| {
            ClaudeError::connection(format!("Failed to serialize MCP configuration: {e}"))
        })?;
        if let Some(obj) = value.as_object_mut() {
            obj.remove("instance");
        }
        cleaned.insert(name.clone(), value);
    }
    let config = serde_json::json!({ "mcpServers": cleaned });
    serde_json::to_string(&config)
        .map_err(|e| ClaudeError::connection(format!("Failed to serialize MCP configuration: {e}")))
}

/// Accumulate one stdout line into `buffer` and attempt to decode a complete
/// JSON envelope.
///
/// Returns `Ok(Some(value))` when the buffer holds a full envelope (buffer is
/// reset), `Ok(None)` while a partial message is pending, and an error when
/// the accumulator would exceed `max_buffer_size` (buffer is reset).
fn assemble_json(
    buffer: &mut String,
    line: &str,
    max_buffer_size: usize,
) -> Result<Option<serde_json::Value>> {
    if buffer.len() + line.len() > max_buffer_size {
        buffer.clear();
        return Err(ClaudeError::json_decode(format!(
            "JSON message exceeded maximum buffer size of {max_buffer_size} bytes"
        )));
    }
    buffer.push_str(line);
    match serde_json::from_str::<serde_json::Value>(buffer) {
        Ok(value) => {
            buffer.clear();
            Ok(Some(value))
        }
        // Partial message, wait for more data
        Err(_) => Ok(None),
    }
}

#[async_trait]
impl Transport for SubprocessTransport {
    async fn connect(&mut self) -> Result<()> {
        {
            let guard = self.process.lock().await;
            if guard.is_some() {
                return Ok(());
            }
        }

        let args = self.build_args()?;
        let mut cmd = Command::new(&self.cli_path);
        cmd.args(&args);

        let mut process_env: HashMap<String, String> = env::vars().collect();
        for (key, value) in &self.options.env {
            process_env.insert(key.clone(), value.clone());
        }
        process_env.insert("CLAUDE_CODE_ENTRYPOINT".to_string(), "sdk-rust".to_string());
        if let Some(ref cwd) = self.options.cwd {
            process_env.insert("PWD".to_string(), cwd.to_string_lossy().into_owned());
            cmd.current_dir(cwd);
        }
        if let Some(ref user) = self.options.user {
            process_env.insert("USER".to_string(), user.clone());
        }
        cmd.envs(process_env);

        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(cli = %self.cli_path.display(), ?args, "Launching Claude Code CLI");

        let mut child = cmd
            .spawn()
            .map_err(|e| ClaudeError::connection(format!("Failed to start Claude Code CLI: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ClaudeError::connection("Failed to get stdin handle"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ClaudeError::connection("Failed to get stdout handle"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ClaudeError::connection("Failed to get stderr handle"))?;

        // Drain stderr continuously so the child cannot block on a full pipe;
        // the captured text feeds process-exit errors.
        let stderr_output = self.stderr_output.clone();
        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Ok(mut captured) = stderr_output.lock() {
                    captured.push_str(&line);
                    captured.push('\n');
                }
            }
        });

        self.stdin = Some(stdin);
        self.stdout = Some(BufReader::new(stdout));
        *self.process.lock().await = Some(child);
        self.stderr_task = Some(stderr_task);
        self.ready.store(true, Ordering::SeqCst);

        // One-shot mode never writes to stdin
        if matches!(self.prompt, PromptInput::String(_)) {
            if let Some(mut stdin) = self.stdin.take() {
                let _ = stdin.shutdown().await;
            }
        }

        Ok(())
    }

    async fn write(&mut self, data: &str) -> Result<()> {
        if !self.is_ready() {
            return Err(ClaudeError::connection(
                "Transport is not ready for writing",
            ));
        }
        if let Some(err) = self.latched_exit_error() {
            return Err(ClaudeError::connection(format!(
                "Cannot write to process: {err}"
            )));
        }
        {
            let mut guard = self.process.lock().await;
            if let Some(child) = guard.as_mut() {
                if matches!(child.try_wait(), Ok(Some(_))) {
                    self.ready.store(false, Ordering::SeqCst);
                    return Err(ClaudeError::connection("Cannot write to terminated process"));
                }
            }
        }

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| ClaudeError::connection("stdin not available"))?;

        let write_result = async {
            stdin.write_all(data.as_bytes()).await?;
            stdin.flush().await?;
            std::io::Result::Ok(())
        }
        .await;

        if let Err(e) = write_result {
            self.ready.store(false, Ordering::SeqCst);
            let err = ClaudeError::connection(format!("Failed to write to process stdin: {e}"));
            if let Ok(mut latched) = self.exit_error.lock() {
                latched.get_or_insert(ClaudeError::connection(format!(
                    "Failed to write to process stdin: {e}"
                )));
            }
            return Err(err);
        }
        Ok(())
    }

    async fn end_input(&mut self) -> Result<()> {
        if let Some(mut stdin) = self.stdin.take() {
            stdin
                .shutdown()
                .await
                .map_err(|e| ClaudeError::connection(format!("Failed to close stdin: {e}")))?;
        }
        Ok(())
    }

    fn read_messages(&mut self) -> mpsc::UnboundedReceiver<Result<serde_json::Value>> {
        let (tx, rx) = mpsc::unbounded_channel();

        let stdout = self.stdout.take();
        let process = self.process.clone();
        let stderr_task = self.stderr_task.take();
        let stderr_output = self.stderr_output.clone();
        let exit_error = self.exit_error.clone();
        let ready = self.ready.clone();
        let max_buffer_size = self.max_buffer_size;
        let cancel_token = self.cancellation_token.clone();

        let task = tokio::spawn(async move {
            let Some(mut stdout) = stdout else {
                let _ = tx.send(Err(ClaudeError::connection(
                    "Not connected - stdout not available",
                )));
                return;
            };

            let mut json_buffer = String::new();
            loop {
                let mut line = String::new();
                tokio::select! {
                    () = cancel_token.cancelled() => {
                        tracing::debug!("Reader cancelled");
                        return;
                    }
                    result = stdout.read_line(&mut line) => match result {
                        Ok(0) => break, // EOF
                        Ok(_) => {
                            let trimmed = line.trim();
                            if trimmed.is_empty() {
                                continue;
                            }
                            match assemble_json(&mut json_buffer, trimmed, max_buffer_size) {
                                Ok(Some(value)) => {
                                    tracing::trace!(
                                        msg_type = value.get("type").and_then(|v| v.as_str()).unwrap_or("unknown"),
                                        "Received envelope from CLI"
                                    );
                                    if tx.send(Ok(value)).is_err() {
                                        // Receiver dropped, stop reading
                                        return;
                                    }
                                }
                                Ok(None) => {}
                                Err(e) => {
                                    ready.store(false, Ordering::SeqCst);
                                    if let Ok(mut latched) = exit_error.lock() {
                                        latched.get_or_insert(clone_exit_error(&e));
                                    }
                                    let _ = tx.send(Err(e));
                                    break;
                                }
                            }
                        }
                        Err(e) => {
                            let _ = tx.send(Err(ClaudeError::Io(e)));
                            break;
                        }
                    }
                }
            }

            ready.store(false, Ordering::SeqCst);

            // Reap the child; close() takes over if we get cancelled first.
            let status = {
                let mut guard = process.lock().await;
                let Some(child) = guard.as_mut() else {
                    return;
                };
                let status = tokio::select! {
                    status = child.wait() => status,
                    () = cancel_token.cancelled() => return,
                };
                guard.take();
                status
            };

            if let Ok(status) = status {
                if !status.success() {
                    if let Some(task) = stderr_task {
                        let _ = task.await;
                    }
                    let exit_code = status.code().unwrap_or(-1);
                    let stderr = stderr_output
                        .lock()
                        .ok()
                        .map(|captured| captured.trim_end().to_string())
                        .filter(|s| !s.is_empty());
                    let err = ClaudeError::process("Command failed", exit_code, stderr);
                    if let Ok(mut latched) = exit_error.lock() {
                        latched.get_or_insert(clone_exit_error(&err));
                    }
                    let _ = tx.send(Err(err));
                }
            }
        });

        self.reader_task = Some(task);
        rx
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn close(&mut self) -> Result<()> {
        self.ready.store(false, Ordering::SeqCst);
        self.cancellation_token.cancel();

        if let Some(mut stdin) = self.stdin.take() {
            let _ = stdin.shutdown().await;
        }

        if let Some(task) = self.reader_task.take() {
            // Brief window for a graceful exit before moving on
            tokio::select! {
                _ = task => {}
                () = tokio::time::sleep(std::time::Duration::from_millis(100)) => {}
            }
        }

        self.stdout = None;

        if let Some(mut child) = self.process.lock().await.take() {
            match tokio::time::timeout(std::time::Duration::from_secs(5), child.wait()).await {
                Ok(Ok(_status)) => {}
                Ok(Err(e)) => return Err(ClaudeError::Io(e)),
                Err(_) => {
                    let _ = child.kill().await;
                    let _ = child.wait().await;
                }
            }
        }

        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }

        match self.latched_exit_error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Drop for SubprocessTransport {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
        // kill_on_drop handles the child itself
    }
}
