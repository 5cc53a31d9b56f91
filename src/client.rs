//! `ClaudeSDKClient` for interactive, stateful conversations
//!
//! The client is a thin façade over the transport and the control protocol
//! handler: it validates options, picks the connection mode, and exposes the
//! conversation stream plus the control conveniences.
//!
//! # Example
//!
//! ```no_run
//! use claude_code_sdk::{ClaudeCodeOptions, ClaudeSDKClient, Message};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> claude_code_sdk::Result<()> {
//!     let mut client = ClaudeSDKClient::new(ClaudeCodeOptions::default());
//!     client.connect().await?;
//!
//!     client.query("What is Rust?").await?;
//!
//!     {
//!         let mut stream = std::pin::pin!(client.receive_response());
//!         while let Some(message) = stream.next().await {
//!             match message? {
//!                 Message::Assistant { message, .. } => println!("{message:?}"),
//!                 Message::Result { .. } => break,
//!                 _ => {}
//!             }
//!         }
//!     }
//!
//!     client.disconnect().await
//! }
//! ```

use futures::Stream;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::control::Query;
use crate::error::{ClaudeError, Result};
use crate::transport::{PromptInput, SubprocessTransport, Transport};
use crate::types::{ClaudeCodeOptions, Message, PermissionMode};

/// Client for bidirectional communication with the Claude Code CLI
pub struct ClaudeSDKClient {
    options: ClaudeCodeOptions,
    query: Option<Query>,
    message_rx: Option<mpsc::UnboundedReceiver<Result<Message>>>,
    input_task: Option<JoinHandle<()>>,
    connected: bool,
}

impl ClaudeSDKClient {
    /// Create a disconnected client
    #[must_use]
    pub fn new(options: ClaudeCodeOptions) -> Self {
        Self {
            options,
            query: None,
            message_rx: None,
            input_task: None,
            connected: false,
        }
    }

    /// Connect in streaming mode with an input stream that never emits.
    /// User messages are then sent with [`query`](Self::query).
    ///
    /// No-op when already connected.
    ///
    /// # Errors
    /// Fails on option validation, CLI discovery, or process launch
    pub async fn connect(&mut self) -> Result<()> {
        self.connect_internal(None, Some(Box::pin(futures::stream::pending::<Value>())))
            .await
    }

    /// Connect in one-shot mode: the prompt is passed on the command line and
    /// the control protocol is unavailable.
    ///
    /// No-op when already connected.
    ///
    /// # Errors
    /// Fails on option validation, CLI discovery, or process launch
    pub async fn connect_with_prompt(&mut self, prompt: impl Into<String>) -> Result<()> {
        self.connect_internal(Some(prompt.into()), None).await
    }

    /// Connect in streaming mode fed by the caller's input stream. Each item
    /// must be a complete input envelope; stdin closes when the stream ends.
    ///
    /// No-op when already connected.
    ///
    /// # Errors
    /// Fails on option validation, CLI discovery, or process launch
    pub async fn connect_with_stream<S>(&mut self, stream: S) -> Result<()>
    where
        S: Stream<Item = Value> + Send + 'static,
    {
        self.connect_internal(None, Some(Box::pin(stream))).await
    }

    async fn connect_internal(
        &mut self,
        prompt: Option<String>,
        stream: Option<std::pin::Pin<Box<dyn Stream<Item = Value> + Send>>>,
    ) -> Result<()> {
        if self.connected {
            return Ok(());
        }

        let streaming = stream.is_some();
        if self.options.can_use_tool.is_some() && !streaming {
            return Err(ClaudeError::connection(
                "canUseTool callback requires streaming mode. \
                 Connect without a prompt string instead.",
            ));
        }
        if self.options.can_use_tool.is_some() && self.options.permission_prompt_tool_name.is_some()
        {
            return Err(ClaudeError::connection(
                "canUseTool callback cannot be used with permission_prompt_tool_name.",
            ));
        }

        let mut effective_options = self.options.clone();
        if effective_options.can_use_tool.is_some() {
            // "stdio" routes permission prompts back over the control protocol
            effective_options.permission_prompt_tool_name = Some("stdio".to_string());
        }

        let prompt_input = match prompt {
            Some(prompt) => PromptInput::String(prompt),
            None => PromptInput::Stream,
        };
        let can_use_tool = effective_options.can_use_tool.clone();
        let hooks = effective_options.hooks.clone();
        let mut transport = SubprocessTransport::new(prompt_input, effective_options, None)?;
        transport.connect().await?;

        let mut query = Query::new(Box::new(transport), streaming, can_use_tool, hooks);
        query.start().await;
        query.initialize().await?;
        self.message_rx = query.take_message_receiver();

        if let Some(stream) = stream {
            let input = query.input_handle();
            self.input_task = Some(tokio::spawn(async move {
                if let Err(e) = input.stream_input(stream).await {
                    tracing::warn!(error = %e, "Input stream terminated with error");
                }
            }));
        }

        self.query = Some(query);
        self.connected = true;
        Ok(())
    }

    /// Hand the conversation receiver to a consumer that outlives `&mut self`
    pub(crate) fn take_message_receiver(
        &mut self,
    ) -> Option<mpsc::UnboundedReceiver<Result<Message>>> {
        self.message_rx.take()
    }

    fn require_query(&self) -> Result<&Query> {
        if !self.connected {
            return Err(ClaudeError::connection(
                "Not connected. Call connect() first.",
            ));
        }
        self.query
            .as_ref()
            .ok_or_else(|| ClaudeError::connection("Not connected. Call connect() first."))
    }

    /// The raw conversation stream, in arrival order
    pub fn receive_messages(&mut self) -> impl Stream<Item = Result<Message>> + '_ {
        async_stream::stream! {
            let Some(rx) = self.message_rx.as_mut() else {
                yield Err(ClaudeError::connection("Not connected. Call connect() first."));
                return;
            };
            while let Some(item) = rx.recv().await {
                yield item;
            }
        }
    }

    /// Conversation stream that completes after the first [`Message::Result`]
    /// (one turn)
    pub fn receive_response(&mut self) -> impl Stream<Item = Result<Message>> + '_ {
        async_stream::stream! {
            let Some(rx) = self.message_rx.as_mut() else {
                yield Err(ClaudeError::connection("Not connected. Call connect() first."));
                return;
            };
            while let Some(item) = rx.recv().await {
                let is_result = matches!(&item, Ok(Message::Result { .. }));
                yield item;
                if is_result {
                    break;
                }
            }
        }
    }

    /// Send a user prompt on the default session
    ///
    /// # Errors
    /// Fails when disconnected or on write failure
    pub async fn query(&self, prompt: impl Into<String>) -> Result<()> {
        self.query_with_session(prompt, "default").await
    }

    /// Send a user prompt on a specific session
    ///
    /// # Errors
    /// Fails when disconnected or on write failure
    pub async fn query_with_session(
        &self,
        prompt: impl Into<String>,
        session_id: impl AsRef<str>,
    ) -> Result<()> {
        let query = self.require_query()?;
        let record = json!({
            "type": "user",
            "message": {
                "role": "user",
                "content": prompt.into(),
            },
            "parent_tool_use_id": null,
            "session_id": session_id.as_ref(),
        });
        query.write_input(&record).await
    }

    /// Interrupt the current turn
    ///
    /// # Errors
    /// Fails when disconnected, outside streaming mode, or on timeout
    pub async fn interrupt(&self) -> Result<()> {
        self.require_query()?.interrupt().await
    }

    /// Switch the permission mode mid-session
    ///
    /// # Errors
    /// Fails when disconnected, outside streaming mode, or on timeout
    pub async fn set_permission_mode(&self, mode: PermissionMode) -> Result<()> {
        self.require_query()?.set_permission_mode(mode).await
    }

    /// Server info captured from the `initialize` exchange. `None` for
    /// one-shot connections.
    ///
    /// # Errors
    /// Fails when disconnected
    pub fn get_server_info(&self) -> Result<Option<Value>> {
        Ok(self.require_query()?.initialization_result())
    }

    /// Whether the client is connected
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Disconnect and release the CLI process. Idempotent.
    ///
    /// # Errors
    /// Re-raises a latched process exit error
    pub async fn disconnect(&mut self) -> Result<()> {
        if !self.connected {
            return Ok(());
        }
        self.connected = false;
        if let Some(task) = self.input_task.take() {
            task.abort();
        }
        match self.query.as_mut() {
            Some(query) => query.close().await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::FnPermissionCallback;
    use crate::types::{PermissionResult, PermissionResultAllow};
    use std::sync::Arc;

    fn allow_all_options() -> ClaudeCodeOptions {
        let callback = FnPermissionCallback::new(|_tool, _input, _ctx| {
            Box::pin(
                async move { Ok(PermissionResult::Allow(PermissionResultAllow::default())) },
            )
        });
        ClaudeCodeOptions::builder()
            .can_use_tool(Arc::new(callback))
            .build()
    }

    #[tokio::test]
    async fn can_use_tool_rejects_one_shot_mode_before_launch() {
        let mut client = ClaudeSDKClient::new(allow_all_options());
        let err = client.connect_with_prompt("hi").await.unwrap_err();
        assert!(matches!(err, ClaudeError::Connection(_)));
        assert!(err.to_string().contains("streaming"));
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn can_use_tool_conflicts_with_permission_prompt_tool_name() {
        let mut options = allow_all_options();
        options.permission_prompt_tool_name = Some("mcp__auth__prompt".to_string());
        let mut client = ClaudeSDKClient::new(options);
        let err = client.connect().await.unwrap_err();
        assert!(err.to_string().contains("permission_prompt_tool_name"));
    }

    #[tokio::test]
    async fn operations_fail_when_disconnected() {
        let client = ClaudeSDKClient::new(ClaudeCodeOptions::default());
        assert!(client.query("hello").await.is_err());
        assert!(client.interrupt().await.is_err());
        assert!(client.get_server_info().is_err());
    }

    #[tokio::test]
    async fn disconnect_without_connect_is_a_no_op() {
        let mut client = ClaudeSDKClient::new(ClaudeCodeOptions::default());
        assert!(client.disconnect().await.is_ok());
        assert!(client.disconnect().await.is_ok());
    }
}
