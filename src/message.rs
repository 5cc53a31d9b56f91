//! Parsing of raw CLI envelopes into typed [`Message`] values

use serde_json::Value;

use crate::error::{ClaudeError, Result};
use crate::types::{
    AssistantMessageContent, ContentBlock, Message, SessionId, UserContent, UserMessageContent,
};

/// Convert a raw JSON envelope from the CLI into a typed [`Message`].
///
/// The parser performs no I/O and does not mutate its input. Rejected
/// envelopes produce [`ClaudeError::MessageParse`] carrying the offending
/// payload.
///
/// # Errors
///
/// Returns an error when the `type` field is missing, not a string, or
/// unknown, or when a variant's required fields are absent or mistyped.
pub fn parse_message(data: &Value) -> Result<Message> {
    let Some(obj) = data.as_object() else {
        return Err(ClaudeError::message_parse(
            "Message payload was not an object",
            Some(data.clone()),
        ));
    };
    let Some(message_type) = obj.get("type").and_then(Value::as_str) else {
        return Err(ClaudeError::message_parse(
            "Message missing 'type' field",
            Some(data.clone()),
        ));
    };
    match message_type {
        "user" => parse_user_message(data),
        "assistant" => parse_assistant_message(data),
        "system" => parse_system_message(data),
        "result" => parse_result_message(data),
        other => Err(ClaudeError::message_parse(
            format!("Unknown message type: {other}"),
            Some(data.clone()),
        )),
    }
}

fn parse_user_message(data: &Value) -> Result<Message> {
    let message = data.get("message").and_then(Value::as_object).ok_or_else(|| {
        ClaudeError::message_parse("User message missing 'message' object", Some(data.clone()))
    })?;
    let content = match message.get("content") {
        Some(Value::String(text)) => UserContent::Text(text.clone()),
        Some(Value::Array(items)) => {
            let mut blocks = Vec::with_capacity(items.len());
            for item in items {
                blocks.push(parse_content_block(item, data)?);
            }
            UserContent::Blocks(blocks)
        }
        _ => {
            return Err(ClaudeError::message_parse(
                "User message content must be a string or an array of blocks",
                Some(data.clone()),
            ));
        }
    };
    Ok(Message::User {
        message: UserMessageContent {
            role: "user".to_string(),
            content,
        },
        parent_tool_use_id: get_optional_string(data, "parent_tool_use_id"),
        session_id: get_optional_string(data, "session_id").map(SessionId::from),
    })
}

fn parse_assistant_message(data: &Value) -> Result<Message> {
    let message = data.get("message").and_then(Value::as_object).ok_or_else(|| {
        ClaudeError::message_parse(
            "Assistant message missing 'message' object",
            Some(data.clone()),
        )
    })?;
    let Some(items) = message.get("content").and_then(Value::as_array) else {
        return Err(ClaudeError::message_parse(
            "Assistant message missing content blocks",
            Some(data.clone()),
        ));
    };
    let mut blocks = Vec::with_capacity(items.len());
    for item in items {
        blocks.push(parse_content_block(item, data)?);
    }
    let Some(model) = message.get("model").and_then(Value::as_str) else {
        return Err(ClaudeError::message_parse(
            "Assistant message missing model",
            Some(data.clone()),
        ));
    };
    Ok(Message::Assistant {
        message: AssistantMessageContent {
            model: model.to_string(),
            content: blocks,
        },
        parent_tool_use_id: get_optional_string(data, "parent_tool_use_id"),
        session_id: get_optional_string(data, "session_id").map(SessionId::from),
    })
}

fn parse_system_message(data: &Value) -> Result<Message> {
    let Some(subtype) = data.get("subtype").and_then(Value::as_str) else {
        return Err(ClaudeError::message_parse(
            "System message missing subtype",
            Some(data.clone()),
        ));
    };
    // The attribute bag holds everything but the discriminators, which live
    // in their own fields and flatten back on serialization.
    let mut bag = data.clone();
    if let Some(obj) = bag.as_object_mut() {
        obj.remove("type");
        obj.remove("subtype");
    }
    Ok(Message::System {
        subtype: subtype.to_string(),
        data: bag,
    })
}

fn parse_result_message(data: &Value) -> Result<Message> {
    let subtype = require_string(data, "subtype")?;
    let duration_ms = require_u64(data, "duration_ms")?;
    let duration_api_ms = require_u64(data, "duration_api_ms")?;
    let is_error = require_bool(data, "is_error")?;
    let num_turns = u32::try_from(require_u64(data, "num_turns")?).map_err(|_| {
        ClaudeError::message_parse("Result message num_turns out of range", Some(data.clone()))
    })?;
    let session_id = SessionId::from(require_string(data, "session_id")?);
    Ok(Message::Result {
        subtype,
        duration_ms,
        duration_api_ms,
        is_error,
        num_turns,
        session_id,
        total_cost_usd: data.get("total_cost_usd").and_then(Value::as_f64),
        usage: data.get("usage").filter(|v| v.is_object()).cloned(),
        result: get_optional_string(data, "result"),
    })
}

fn parse_content_block(block: &Value, envelope: &Value) -> Result<ContentBlock> {
    let Some(obj) = block.as_object() else {
        return Err(ClaudeError::message_parse(
            "Content block was not an object",
            Some(envelope.clone()),
        ));
    };
    let Some(block_type) = obj.get("type").and_then(Value::as_str) else {
        return Err(ClaudeError::message_parse(
            "Content block missing type",
            Some(envelope.clone()),
        ));
    };
    let missing = |field: &str| {
        ClaudeError::message_parse(
            format!("Content block '{block_type}' missing '{field}'"),
            Some(envelope.clone()),
        )
    };
    match block_type {
        "text" => Ok(ContentBlock::Text {
            text: obj
                .get("text")
                .and_then(Value::as_str)
                .ok_or_else(|| missing("text"))?
                .to_string(),
        }),
        "thinking" => Ok(ContentBlock::Thinking {
            thinking: obj
                .get("thinking")
                .and_then(Value::as_str)
                .ok_or_else(|| missing("thinking"))?
                .to_string(),
            signature: obj
                .get("signature")
                .and_then(Value::as_str)
                .ok_or_else(|| missing("signature"))?
                .to_string(),
        }),
        "tool_use" => Ok(ContentBlock::ToolUse {
            id: obj
                .get("id")
                .and_then(Value::as_str)
                .ok_or_else(|| missing("id"))?
                .to_string(),
            name: obj
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| missing("name"))?
                .to_string(),
            input: obj.get("input").cloned().unwrap_or(Value::Null),
        }),
        "tool_result" => Ok(ContentBlock::ToolResult {
            tool_use_id: obj
                .get("tool_use_id")
                .and_then(Value::as_str)
                .ok_or_else(|| missing("tool_use_id"))?
                .to_string(),
            content: obj.get("content").cloned(),
            is_error: obj.get("is_error").and_then(Value::as_bool),
        }),
        other => Err(ClaudeError::message_parse(
            format!("Unknown content block type: {other}"),
            Some(envelope.clone()),
        )),
    }
}

fn get_optional_string(data: &Value, key: &str) -> Option<String> {
    data.get(key).and_then(Value::as_str).map(str::to_string)
}

fn require_string(data: &Value, key: &str) -> Result<String> {
    data.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            ClaudeError::message_parse(
                format!("Result message missing required field '{key}'"),
                Some(data.clone()),
            )
        })
}

fn require_u64(data: &Value, key: &str) -> Result<u64> {
    data.get(key).and_then(Value::as_u64).ok_or_else(|| {
        ClaudeError::message_parse(
            format!("Result message missing required field '{key}'"),
            Some(data.clone()),
        )
    })
}

fn require_bool(data: &Value, key: &str) -> Result<bool> {
    data.get(key).and_then(Value::as_bool).ok_or_else(|| {
        ClaudeError::message_parse(
            format!("Result message missing required field '{key}'"),
            Some(data.clone()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_user_message_with_string_content() {
        let data = json!({
            "type": "user",
            "message": {"role": "user", "content": "Hello, Claude!"},
            "session_id": "s1"
        });
        let msg = parse_message(&data).unwrap();
        match msg {
            Message::User {
                message,
                session_id,
                ..
            } => {
                assert_eq!(message.content, UserContent::Text("Hello, Claude!".into()));
                assert_eq!(session_id, Some(SessionId::from("s1")));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn parses_user_message_with_tool_result_blocks() {
        let data = json!({
            "type": "user",
            "message": {"role": "user", "content": [
                {"type": "tool_result", "tool_use_id": "tool_1", "content": "file.txt"}
            ]}
        });
        let msg = parse_message(&data).unwrap();
        match msg {
            Message::User { message, .. } => match message.content {
                UserContent::Blocks(blocks) => {
                    assert_eq!(blocks.len(), 1);
                    match &blocks[0] {
                        ContentBlock::ToolResult {
                            tool_use_id,
                            is_error,
                            ..
                        } => {
                            assert_eq!(tool_use_id, "tool_1");
                            assert_eq!(*is_error, None);
                        }
                        other => panic!("unexpected block: {other:?}"),
                    }
                }
                other => panic!("unexpected content: {other:?}"),
            },
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn parses_assistant_message_with_mixed_blocks() {
        let data = json!({
            "type": "assistant",
            "message": {
                "model": "claude-sonnet-4-5",
                "content": [
                    {"type": "text", "text": "Let me check."},
                    {"type": "thinking", "thinking": "hmm", "signature": "sig"},
                    {"type": "tool_use", "id": "tool_1", "name": "Bash", "input": {"command": "ls"}}
                ]
            }
        });
        let msg = parse_message(&data).unwrap();
        match msg {
            Message::Assistant { message, .. } => {
                assert_eq!(message.model, "claude-sonnet-4-5");
                assert_eq!(message.content.len(), 3);
                assert!(matches!(message.content[0], ContentBlock::Text { .. }));
                assert!(matches!(message.content[1], ContentBlock::Thinking { .. }));
                assert!(matches!(message.content[2], ContentBlock::ToolUse { .. }));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn assistant_message_requires_model() {
        let data = json!({
            "type": "assistant",
            "message": {"content": []}
        });
        let err = parse_message(&data).unwrap_err();
        assert!(err.to_string().contains("model"));
    }

    #[test]
    fn assistant_content_must_be_an_array() {
        let data = json!({
            "type": "assistant",
            "message": {"model": "m", "content": "not blocks"}
        });
        assert!(parse_message(&data).is_err());
    }

    #[test]
    fn parses_system_message_retaining_payload() {
        let data = json!({
            "type": "system",
            "subtype": "init",
            "cwd": "/work",
            "tools": ["Bash", "Read"]
        });
        let msg = parse_message(&data).unwrap();
        match msg {
            Message::System { subtype, data } => {
                assert_eq!(subtype, "init");
                assert_eq!(data["cwd"], "/work");
                assert_eq!(data["tools"][1], "Read");
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn parses_result_message_with_optional_fields() {
        let data = json!({
            "type": "result",
            "subtype": "success",
            "duration_ms": 12,
            "duration_api_ms": 10,
            "is_error": false,
            "num_turns": 1,
            "session_id": "s1",
            "total_cost_usd": 0.005,
            "usage": {"input_tokens": 10, "output_tokens": 20},
            "result": "hello"
        });
        let msg = parse_message(&data).unwrap();
        match msg {
            Message::Result {
                subtype,
                duration_ms,
                duration_api_ms,
                is_error,
                num_turns,
                session_id,
                total_cost_usd,
                usage,
                result,
            } => {
                assert_eq!(subtype, "success");
                assert_eq!(duration_ms, 12);
                assert_eq!(duration_api_ms, 10);
                assert!(!is_error);
                assert_eq!(num_turns, 1);
                assert_eq!(session_id.as_str(), "s1");
                assert_eq!(total_cost_usd, Some(0.005));
                assert_eq!(usage.unwrap()["input_tokens"], 10);
                assert_eq!(result.as_deref(), Some("hello"));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn result_message_requires_all_metrics() {
        let data = json!({
            "type": "result",
            "subtype": "success",
            "duration_ms": 12,
            "is_error": false,
            "num_turns": 1,
            "session_id": "s1"
        });
        let err = parse_message(&data).unwrap_err();
        assert!(err.to_string().contains("duration_api_ms"));
    }

    #[test]
    fn missing_type_field_is_rejected() {
        let err = parse_message(&json!({"subtype": "init"})).unwrap_err();
        match err {
            ClaudeError::MessageParse { message, data } => {
                assert!(message.contains("'type'"));
                assert!(data.is_some());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_string_type_field_is_rejected() {
        assert!(parse_message(&json!({"type": 42})).is_err());
    }

    #[test]
    fn unknown_type_is_named_in_the_error() {
        let err = parse_message(&json!({"type": "telemetry"})).unwrap_err();
        assert!(err.to_string().contains("telemetry"));
    }

    #[test]
    fn unknown_content_block_type_is_rejected() {
        let data = json!({
            "type": "assistant",
            "message": {
                "model": "m",
                "content": [{"type": "video", "url": "x"}]
            }
        });
        let err = parse_message(&data).unwrap_err();
        assert!(err.to_string().contains("video"));
    }

    #[test]
    fn tool_result_is_error_is_tri_state() {
        let data = json!({
            "type": "user",
            "message": {"role": "user", "content": [
                {"type": "tool_result", "tool_use_id": "t1", "content": "oops", "is_error": true},
                {"type": "tool_result", "tool_use_id": "t2", "content": "fine"}
            ]}
        });
        let msg = parse_message(&data).unwrap();
        let Message::User { message, .. } = msg else {
            panic!("expected user message");
        };
        let UserContent::Blocks(blocks) = message.content else {
            panic!("expected blocks");
        };
        assert!(
            matches!(&blocks[0], ContentBlock::ToolResult { is_error: Some(true), .. })
        );
        assert!(matches!(&blocks[1], ContentBlock::ToolResult { is_error: None, .. }));
    }

    #[test]
    fn parser_does_not_mutate_input() {
        let data = json!({
            "type": "system",
            "subtype": "init",
            "extra": {"nested": [1, 2, 3]}
        });
        let before = data.clone();
        let _ = parse_message(&data).unwrap();
        assert_eq!(data, before);
    }
}
