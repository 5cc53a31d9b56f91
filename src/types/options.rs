//! Configuration options translated into CLI arguments

use std::collections::HashMap;
use std::path::PathBuf;
use typed_builder::TypedBuilder;

use super::hooks::{HookEvent, HookMatcher};
use super::identifiers::{SessionId, ToolName};
use super::mcp::McpServers;
use super::permissions::{CanUseToolCallback, PermissionMode};

/// Options for a Claude Code session
///
/// Each populated field maps to one CLI flag pair; see the transport for the
/// exact translation.
///
/// # Example
///
/// ```no_run
/// use claude_code_sdk::ClaudeCodeOptions;
///
/// let options = ClaudeCodeOptions::builder()
///     .system_prompt("You are a concise assistant")
///     .max_turns(5)
///     .build();
/// ```
#[derive(Clone, Default, TypedBuilder)]
#[builder(
    builder_method(doc = "Create a new builder for ClaudeCodeOptions"),
    builder_type(doc = "Builder for ClaudeCodeOptions", vis = "pub"),
    build_method(doc = "Build the ClaudeCodeOptions")
)]
pub struct ClaudeCodeOptions {
    /// System prompt override
    #[builder(default, setter(strip_option, into))]
    pub system_prompt: Option<String>,

    /// Text appended to the default system prompt
    #[builder(default, setter(strip_option, into))]
    pub append_system_prompt: Option<String>,

    /// Tools Claude is allowed to use
    #[builder(default, setter(into))]
    pub allowed_tools: Vec<ToolName>,

    /// Tools Claude is not allowed to use
    #[builder(default, setter(into))]
    pub disallowed_tools: Vec<ToolName>,

    /// Maximum number of turns before stopping
    #[builder(default, setter(strip_option))]
    pub max_turns: Option<u32>,

    /// Model to use
    #[builder(default, setter(strip_option, into))]
    pub model: Option<String>,

    /// Tool name used for permission prompts. Set to `"stdio"` automatically
    /// when a `can_use_tool` callback is configured.
    #[builder(default, setter(strip_option, into))]
    pub permission_prompt_tool_name: Option<String>,

    /// Permission mode for tool execution
    #[builder(default, setter(strip_option))]
    pub permission_mode: Option<PermissionMode>,

    /// Continue from the previous conversation
    #[builder(default)]
    pub continue_conversation: bool,

    /// Session ID to resume
    #[builder(default, setter(strip_option, into))]
    pub resume: Option<SessionId>,

    /// Settings file path or JSON
    #[builder(default, setter(strip_option, into))]
    pub settings: Option<String>,

    /// Additional directories added to the context
    #[builder(default, setter(into))]
    pub add_dirs: Vec<PathBuf>,

    /// MCP server configuration forwarded to the CLI
    #[builder(default)]
    pub mcp_servers: McpServers,

    /// Extra CLI flags. The key is the flag name without leading dashes; a
    /// non-blank value is passed as the flag's argument.
    #[builder(default)]
    pub extra_args: HashMap<String, Option<String>>,

    /// Environment variables overlaid on the inherited environment
    #[builder(default)]
    pub env: HashMap<String, String>,

    /// Working directory for the CLI process
    #[builder(default, setter(strip_option, into))]
    pub cwd: Option<PathBuf>,

    /// User identifier exported as `USER` to the child
    #[builder(default, setter(strip_option, into))]
    pub user: Option<String>,

    /// Maximum accumulation buffer for a single JSON message (default 1 MiB)
    #[builder(default, setter(strip_option))]
    pub max_buffer_size: Option<usize>,

    /// Permission callback consulted before tool execution. Requires
    /// streaming mode.
    #[builder(default, setter(strip_option))]
    pub can_use_tool: Option<CanUseToolCallback>,

    /// Hook callbacks registered per lifecycle event
    #[builder(default, setter(strip_option))]
    pub hooks: Option<HashMap<HookEvent, Vec<HookMatcher>>>,
}

impl std::fmt::Debug for ClaudeCodeOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaudeCodeOptions")
            .field("system_prompt", &self.system_prompt)
            .field("append_system_prompt", &self.append_system_prompt)
            .field("allowed_tools", &self.allowed_tools)
            .field("disallowed_tools", &self.disallowed_tools)
            .field("max_turns", &self.max_turns)
            .field("model", &self.model)
            .field(
                "permission_prompt_tool_name",
                &self.permission_prompt_tool_name,
            )
            .field("permission_mode", &self.permission_mode)
            .field("continue_conversation", &self.continue_conversation)
            .field("resume", &self.resume)
            .field("settings", &self.settings)
            .field("add_dirs", &self.add_dirs)
            .field("mcp_servers", &self.mcp_servers)
            .field("extra_args", &self.extra_args)
            .field("env", &self.env)
            .field("cwd", &self.cwd)
            .field("user", &self.user)
            .field("max_buffer_size", &self.max_buffer_size)
            .field(
                "can_use_tool",
                &self.can_use_tool.as_ref().map(|_| "<callback>"),
            )
            .field(
                "hooks",
                &self
                    .hooks
                    .as_ref()
                    .map(|h| format!("[{} hook events]", h.len())),
            )
            .finish()
    }
}
