//! Transport layer for communicating with the Claude Code CLI
//!
//! The [`Transport`] trait is the seam between the control plane and the
//! process that actually hosts the conversation. [`SubprocessTransport`] is
//! the production implementation; tests substitute their own.

pub mod subprocess;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;

/// Full-duplex newline-JSON transport to the Claude Code CLI
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establish the connection (launch the subprocess)
    ///
    /// # Errors
    /// Returns an error if the connection cannot be established
    async fn connect(&mut self) -> Result<()>;

    /// Write one already-serialized line (terminated by `\n`)
    ///
    /// # Errors
    /// Returns a connection error when the transport is not ready, the
    /// process has exited, or a prior exit error is latched
    async fn write(&mut self, data: &str) -> Result<()>;

    /// Close the input side of the connection (stdin)
    ///
    /// # Errors
    /// Returns an error if closing fails
    async fn end_input(&mut self) -> Result<()>;

    /// Start the read loop and return the envelope channel
    ///
    /// A background task reads stdout and delivers one decoded JSON envelope
    /// per item. The channel closes on EOF; framing and process failures are
    /// delivered as `Err` items.
    fn read_messages(&mut self) -> mpsc::UnboundedReceiver<Result<serde_json::Value>>;

    /// Whether the transport accepts writes
    fn is_ready(&self) -> bool;

    /// Tear down the connection and release resources
    ///
    /// Idempotent. Re-raises a latched exit error so callers observe process
    /// failure.
    ///
    /// # Errors
    /// Returns the latched exit error, if any
    async fn close(&mut self) -> Result<()>;
}

pub use subprocess::{PromptInput, SubprocessTransport};
