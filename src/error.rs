//! Error types for the Claude Code SDK

use thiserror::Error;

/// Main error type for the Claude Code SDK
#[derive(Error, Debug)]
pub enum ClaudeError {
    /// Claude Code CLI not found or not installed
    #[error("Claude Code CLI not found: {0}")]
    CliNotFound(String),

    /// Connection error when communicating with the CLI
    #[error("Connection error: {0}")]
    Connection(String),

    /// CLI process exited with a non-zero code
    #[error("Process error (exit code {exit_code}): {message}")]
    Process {
        /// Error message
        message: String,
        /// Process exit code
        exit_code: i32,
        /// Captured standard error output
        stderr: Option<String>,
    },

    /// JSON framing error: buffer overflow or unrecoverable decode failure
    #[error("JSON decode error: {0}")]
    JsonDecode(String),

    /// Typed-message parsing rejected an envelope
    #[error("Message parse error: {message}")]
    MessageParse {
        /// Error message
        message: String,
        /// Offending payload, retained for diagnostics
        data: Option<serde_json::Value>,
    },

    /// Control request did not receive a response in time
    #[error("Control request timed out after {timeout_secs} seconds: {request_type}")]
    ControlTimeout {
        /// Timeout duration in seconds
        timeout_secs: u64,
        /// Subtype of the request that timed out
        request_type: String,
    },

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for SDK operations
pub type Result<T> = std::result::Result<T, ClaudeError>;

impl ClaudeError {
    /// CLI not found, with an install hint that depends on whether Node.js
    /// is available
    #[must_use]
    pub fn cli_not_found(node_installed: bool) -> Self {
        if node_installed {
            Self::CliNotFound(
                "Claude Code CLI not found. Install with:\n\
                 npm install -g @anthropic-ai/claude-code"
                    .to_string(),
            )
        } else {
            Self::CliNotFound(
                "Claude Code requires Node.js. Install Node.js, then:\n\
                 npm install -g @anthropic-ai/claude-code"
                    .to_string(),
            )
        }
    }

    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a process error
    pub fn process(msg: impl Into<String>, exit_code: i32, stderr: Option<String>) -> Self {
        Self::Process {
            message: msg.into(),
            exit_code,
            stderr,
        }
    }

    /// Create a JSON decode error
    pub fn json_decode(msg: impl Into<String>) -> Self {
        Self::JsonDecode(msg.into())
    }

    /// Create a message parse error
    pub fn message_parse(msg: impl Into<String>, data: Option<serde_json::Value>) -> Self {
        Self::MessageParse {
            message: msg.into(),
            data,
        }
    }

    /// Create a control timeout error
    pub fn control_timeout(timeout_secs: u64, request_type: impl Into<String>) -> Self {
        Self::ControlTimeout {
            timeout_secs,
            request_type: request_type.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_not_found_mentions_node_when_missing() {
        let err = ClaudeError::cli_not_found(false);
        assert!(err.to_string().contains("Node.js"));

        let err = ClaudeError::cli_not_found(true);
        assert!(err.to_string().contains("npm install -g"));
    }

    #[test]
    fn process_error_carries_exit_code_and_stderr() {
        let err = ClaudeError::process("Command failed", 2, Some("boom".to_string()));
        match err {
            ClaudeError::Process {
                exit_code, stderr, ..
            } => {
                assert_eq!(exit_code, 2);
                assert_eq!(stderr.as_deref(), Some("boom"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn message_parse_retains_payload() {
        let payload = serde_json::json!({"type": "bogus"});
        let err = ClaudeError::message_parse("Unknown message type: bogus", Some(payload.clone()));
        match err {
            ClaudeError::MessageParse { data, .. } => assert_eq!(data, Some(payload)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn control_timeout_names_request_subtype() {
        let err = ClaudeError::control_timeout(60, "interrupt");
        assert!(err.to_string().contains("interrupt"));
        assert!(err.to_string().contains("60"));
    }
}
