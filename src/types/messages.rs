//! Typed conversation messages and content blocks

use serde::{Deserialize, Serialize};

use super::identifiers::SessionId;

/// Content block variants carried by user and assistant messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text
    Text {
        /// Text content
        text: String,
    },
    /// Extended thinking
    Thinking {
        /// Thinking content
        thinking: String,
        /// Signature for verification
        signature: String,
    },
    /// Tool invocation requested by the model
    ToolUse {
        /// Tool use ID
        id: String,
        /// Tool name
        name: String,
        /// Tool input parameters
        input: serde_json::Value,
    },
    /// Result of a tool invocation
    ToolResult {
        /// ID of the tool use this result answers
        tool_use_id: String,
        /// Result content, arbitrary JSON
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<serde_json::Value>,
        /// Whether the result is an error. Absent is not the same as `false`.
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

/// User content: a bare string or an ordered sequence of blocks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserContent {
    /// Plain string content
    Text(String),
    /// Structured content blocks
    Blocks(Vec<ContentBlock>),
}

/// Payload of a user message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMessageContent {
    /// Message role, always `"user"`
    pub role: String,
    /// Message content
    pub content: UserContent,
}

/// Payload of an assistant message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessageContent {
    /// Model that produced the message
    pub model: String,
    /// Ordered content blocks
    pub content: Vec<ContentBlock>,
}

/// Conversation messages emitted by the CLI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// User message (echoed input or tool results)
    User {
        /// Message content
        message: UserMessageContent,
        /// Parent tool use ID for nested conversations
        #[serde(skip_serializing_if = "Option::is_none")]
        parent_tool_use_id: Option<String>,
        /// Session ID
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<SessionId>,
    },
    /// Assistant message
    Assistant {
        /// Message content
        message: AssistantMessageContent,
        /// Parent tool use ID for nested conversations
        #[serde(skip_serializing_if = "Option::is_none")]
        parent_tool_use_id: Option<String>,
        /// Session ID
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<SessionId>,
    },
    /// System message; the attribute bag is retained verbatim
    System {
        /// System message subtype
        subtype: String,
        /// Full payload as received
        #[serde(flatten)]
        data: serde_json::Value,
    },
    /// Terminal result message with turn metrics
    Result {
        /// Result subtype (`success`, `error_max_turns`, ...)
        subtype: String,
        /// Total duration in milliseconds
        duration_ms: u64,
        /// API call duration in milliseconds
        duration_api_ms: u64,
        /// Whether this is an error result
        is_error: bool,
        /// Number of conversation turns
        num_turns: u32,
        /// Session ID
        session_id: SessionId,
        /// Total cost in USD
        #[serde(skip_serializing_if = "Option::is_none")]
        total_cost_usd: Option<f64>,
        /// Token usage statistics
        #[serde(skip_serializing_if = "Option::is_none")]
        usage: Option<serde_json::Value>,
        /// Result text for the success subtype
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<String>,
    },
}
