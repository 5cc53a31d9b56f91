//! Type definitions for the Claude Code SDK
//!
//! Identifiers, conversation messages, configuration options, and the
//! permission and hook types carried over the control protocol.

pub mod hooks;
pub mod identifiers;
pub mod mcp;
pub mod messages;
pub mod options;
pub mod permissions;

pub use hooks::{HookContext, HookDecision, HookEvent, HookMatcher, HookOutput};
pub use identifiers::{RequestId, SessionId, ToolName};
pub use mcp::{
    McpHttpServerConfig, McpServerConfig, McpServers, McpSseServerConfig, McpStdioServerConfig,
};
pub use messages::{
    AssistantMessageContent, ContentBlock, Message, UserContent, UserMessageContent,
};
pub use options::ClaudeCodeOptions;
pub use permissions::{
    CanUseToolCallback, PermissionBehavior, PermissionMode, PermissionResult,
    PermissionResultAllow, PermissionResultDeny, PermissionRuleValue, PermissionUpdate,
    PermissionUpdateDestination, ToolPermissionContext,
};
