//! # Claude Code SDK for Rust
//!
//! SDK for driving the Claude Code CLI from Rust: it launches the CLI as a
//! subprocess, speaks its newline-delimited JSON protocol, surfaces a typed
//! conversation stream, and services the bidirectional control protocol for
//! permission callbacks, hooks, and MCP passthrough.
//!
//! ## Quick start
//!
//! One-shot queries go through [`query()`]:
//!
//! ```no_run
//! use claude_code_sdk::{query, Message};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> claude_code_sdk::Result<()> {
//!     let stream = query("What is 2 + 2?", None).await?;
//!     let mut stream = std::pin::pin!(stream);
//!
//!     while let Some(message) = stream.next().await {
//!         if let Message::Assistant { message, .. } = message? {
//!             println!("Claude: {message:?}");
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Interactive sessions use [`ClaudeSDKClient`]:
//!
//! ```no_run
//! use claude_code_sdk::{ClaudeCodeOptions, ClaudeSDKClient, Message};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> claude_code_sdk::Result<()> {
//!     let options = ClaudeCodeOptions::builder().max_turns(10).build();
//!     let mut client = ClaudeSDKClient::new(options);
//!     client.connect().await?;
//!
//!     client.query("Hello, Claude!").await?;
//!     {
//!         let mut stream = std::pin::pin!(client.receive_response());
//!         while let Some(message) = stream.next().await {
//!             println!("{:?}", message?);
//!         }
//!     }
//!
//!     client.disconnect().await
//! }
//! ```
//!
//! ## Permission callbacks
//!
//! Streaming connections can route tool permission prompts back into the
//! process via `can_use_tool`:
//!
//! ```no_run
//! use claude_code_sdk::callbacks::FnPermissionCallback;
//! use claude_code_sdk::types::{PermissionResult, PermissionResultAllow, PermissionResultDeny};
//! use claude_code_sdk::ClaudeCodeOptions;
//! use std::sync::Arc;
//!
//! let callback = FnPermissionCallback::new(|tool_name, _input, _ctx| {
//!     Box::pin(async move {
//!         if tool_name == "Read" {
//!             Ok(PermissionResult::Allow(PermissionResultAllow::default()))
//!         } else {
//!             Ok(PermissionResult::Deny(PermissionResultDeny {
//!                 message: format!("{tool_name} is not allowed"),
//!                 interrupt: false,
//!             }))
//!         }
//!     })
//! });
//!
//! let options = ClaudeCodeOptions::builder()
//!     .can_use_tool(Arc::new(callback))
//!     .build();
//! ```
//!
//! ## Architecture
//!
//! - [`transport`]: subprocess lifecycle and newline-JSON framing
//! - [`message`]: typed parsing of conversation envelopes
//! - [`control`]: message routing, request correlation, callback dispatch
//! - [`client`]: the connect/disconnect façade
//! - [`query()`]: the one-shot convenience layer
//!
//! ## Logging
//!
//! The crate instruments itself with [`tracing`](https://crates.io/crates/tracing);
//! attach a subscriber (for example `tracing_subscriber::fmt::init()`) to see
//! protocol-level events.
//!
//! ## Requirements
//!
//! - Node.js and the Claude Code CLI:
//!   `npm install -g @anthropic-ai/claude-code`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod callbacks;
pub mod client;
pub mod control;
pub mod error;
pub mod message;
pub mod query;
pub mod transport;
pub mod types;

pub use callbacks::{FnHookCallback, FnPermissionCallback, HookCallback, PermissionCallback};
pub use client::ClaudeSDKClient;
pub use error::{ClaudeError, Result};
pub use message::parse_message;
pub use query::query;
pub use transport::{PromptInput, SubprocessTransport, Transport};
pub use types::{
    ClaudeCodeOptions, ContentBlock, HookContext, HookDecision, HookEvent, HookMatcher, HookOutput,
    McpServerConfig, McpServers, Message, PermissionMode, PermissionResult, PermissionResultAllow,
    PermissionResultDeny, PermissionUpdate, RequestId, SessionId, ToolName, ToolPermissionContext,
    UserContent,
};

/// SDK version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
