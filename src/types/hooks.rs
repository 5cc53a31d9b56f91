//! Hook types for lifecycle event callbacks

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Lifecycle events the CLI can invoke hooks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HookEvent {
    /// Before a tool is used
    PreToolUse,
    /// After a tool is used
    PostToolUse,
    /// When the user submits a prompt
    UserPromptSubmit,
    /// When the conversation stops
    Stop,
    /// When a subagent stops
    SubagentStop,
    /// Before compacting the conversation
    PreCompact,
}

impl HookEvent {
    /// Event name used in the `initialize` payload
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreToolUse => "PreToolUse",
            Self::PostToolUse => "PostToolUse",
            Self::UserPromptSubmit => "UserPromptSubmit",
            Self::Stop => "Stop",
            Self::SubagentStop => "SubagentStop",
            Self::PreCompact => "PreCompact",
        }
    }
}

/// Hook decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookDecision {
    /// Block the action
    Block,
}

/// Output returned by hook callbacks. Only the fields a callback sets are
/// serialized into the control response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HookOutput {
    /// Decision to block the action
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<HookDecision>,
    /// System message to inject
    #[serde(skip_serializing_if = "Option::is_none", rename = "systemMessage")]
    pub system_message: Option<String>,
    /// Event-specific output data
    #[serde(skip_serializing_if = "Option::is_none", rename = "hookSpecificOutput")]
    pub hook_specific_output: Option<serde_json::Value>,
}

/// Context passed to hook callbacks
#[derive(Clone, Default)]
pub struct HookContext {
    /// Reserved cancellation signal. The current CLI never fires it.
    pub signal: Option<CancellationToken>,
}

impl HookContext {
    /// Check whether cancellation has been requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.signal
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}

impl std::fmt::Debug for HookContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookContext")
            .field("signal", &self.signal.as_ref().map(|_| "<token>"))
            .finish()
    }
}

/// Matcher binding hook callbacks to an event
#[derive(Clone, Default)]
pub struct HookMatcher {
    /// Matcher pattern, typically a tool name like `"Bash"` or `"Write|Edit"`
    pub matcher: Option<String>,
    /// Callbacks to invoke when the matcher fires
    pub hooks: Vec<Arc<dyn crate::callbacks::HookCallback>>,
}

impl HookMatcher {
    /// Create a matcher for the given pattern
    #[must_use]
    pub fn new(matcher: Option<&str>) -> Self {
        Self {
            matcher: matcher.map(str::to_string),
            hooks: Vec::new(),
        }
    }

    /// Append a callback
    #[must_use]
    pub fn add_hook(mut self, hook: Arc<dyn crate::callbacks::HookCallback>) -> Self {
        self.hooks.push(hook);
        self
    }
}

impl std::fmt::Debug for HookMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookMatcher")
            .field("matcher", &self.matcher)
            .field("hooks", &format!("[{} callbacks]", self.hooks.len()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hook_event_wire_names() {
        assert_eq!(HookEvent::PreToolUse.as_str(), "PreToolUse");
        assert_eq!(HookEvent::PostToolUse.as_str(), "PostToolUse");
        assert_eq!(HookEvent::UserPromptSubmit.as_str(), "UserPromptSubmit");
        assert_eq!(HookEvent::Stop.as_str(), "Stop");
        assert_eq!(HookEvent::SubagentStop.as_str(), "SubagentStop");
        assert_eq!(HookEvent::PreCompact.as_str(), "PreCompact");
    }

    #[test]
    fn hook_output_serialization_omits_unset_fields() {
        let output = HookOutput::default();
        assert_eq!(serde_json::to_string(&output).unwrap(), "{}");
    }

    #[test]
    fn hook_output_uses_camel_case_field_names() {
        let output = HookOutput {
            decision: Some(HookDecision::Block),
            system_message: Some("stop".to_string()),
            hook_specific_output: None,
        };
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["decision"], "block");
        assert_eq!(json["systemMessage"], "stop");
        assert!(json.get("hookSpecificOutput").is_none());
    }
}
