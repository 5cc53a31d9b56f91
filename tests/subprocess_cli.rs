//! Subprocess transport integration tests
//!
//! Runs the transport and control plane against small shell scripts standing
//! in for the CLI, covering framing, process exit handling, and stderr
//! capture without requiring a Claude Code installation.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use claude_code_sdk::control::Query;
use claude_code_sdk::types::ClaudeCodeOptions;
use claude_code_sdk::{ClaudeError, Message, PromptInput, SubprocessTransport, Transport};

/// Write an executable script under the target temp dir
fn fake_cli(name: &str, body: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("claude-code-sdk-test-{}-{name}", std::process::id()));
    fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

async fn run_one_shot(script: PathBuf) -> Vec<claude_code_sdk::Result<Message>> {
    let mut transport = SubprocessTransport::new(
        PromptInput::from("hi"),
        ClaudeCodeOptions::default(),
        Some(script.clone()),
    )
    .unwrap();
    transport.connect().await.unwrap();

    let mut query = Query::new(Box::new(transport), false, None, None);
    query.start().await;
    assert!(query.initialize().await.unwrap().is_none());

    let mut rx = query.take_message_receiver().unwrap();
    let mut items = Vec::new();
    while let Some(item) = tokio::time::timeout(std::time::Duration::from_secs(10), rx.recv())
        .await
        .expect("CLI script did not finish")
    {
        items.push(item);
    }

    let _ = fs::remove_file(script);
    items
}

#[tokio::test]
async fn one_shot_conversation_is_parsed_in_order() {
    let script = fake_cli(
        "success",
        r#"echo '{"type": "assistant", "message": {"model": "claude-sonnet-4-5", "content": [{"type": "text", "text": "hello"}]}}'
echo
echo '{"type": "result", "subtype": "success", "duration_ms": 12, "duration_api_ms": 10, "is_error": false, "num_turns": 1, "session_id": "s1"}'
"#,
    );

    let items = run_one_shot(script).await;
    assert_eq!(items.len(), 2);

    match items[0].as_ref().unwrap() {
        Message::Assistant { message, .. } => {
            assert_eq!(message.model, "claude-sonnet-4-5");
        }
        other => panic!("unexpected message: {other:?}"),
    }
    match items[1].as_ref().unwrap() {
        Message::Result {
            subtype,
            duration_ms,
            duration_api_ms,
            is_error,
            num_turns,
            session_id,
            ..
        } => {
            assert_eq!(subtype, "success");
            assert_eq!(*duration_ms, 12);
            assert_eq!(*duration_api_ms, 10);
            assert!(!is_error);
            assert_eq!(*num_turns, 1);
            assert_eq!(session_id.as_str(), "s1");
        }
        other => panic!("unexpected message: {other:?}"),
    }
}

#[tokio::test]
async fn json_split_across_lines_is_assembled() {
    let script = fake_cli(
        "multiline",
        r#"printf '{"type": "system",\n "subtype": "init",\n "cwd": "/work"}\n'
echo '{"type": "result", "subtype": "success", "duration_ms": 1, "duration_api_ms": 1, "is_error": false, "num_turns": 1, "session_id": "s1"}'
"#,
    );

    let items = run_one_shot(script).await;
    assert_eq!(items.len(), 2);
    match items[0].as_ref().unwrap() {
        Message::System { subtype, data } => {
            assert_eq!(subtype, "init");
            assert_eq!(data["cwd"], "/work");
        }
        other => panic!("unexpected message: {other:?}"),
    }
}

#[tokio::test]
async fn non_zero_exit_surfaces_process_error_with_stderr() {
    let script = fake_cli(
        "failure",
        r#"echo 'boom' >&2
exit 2
"#,
    );

    let items = run_one_shot(script).await;
    assert_eq!(items.len(), 1);
    match items[0].as_ref().unwrap_err() {
        ClaudeError::Process {
            exit_code, stderr, ..
        } => {
            assert_eq!(*exit_code, 2);
            assert_eq!(stderr.as_deref(), Some("boom"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn write_after_exit_is_a_connection_error() {
    let script = fake_cli("exits-early", "exit 0\n");
    let mut transport = SubprocessTransport::new(
        PromptInput::Stream,
        ClaudeCodeOptions::default(),
        Some(script.clone()),
    )
    .unwrap();
    transport.connect().await.unwrap();

    let mut rx = transport.read_messages();
    // Drain until EOF so the child is reaped
    while rx.recv().await.is_some() {}

    let err = transport
        .write("{\"type\": \"user\"}\n")
        .await
        .unwrap_err();
    assert!(matches!(err, ClaudeError::Connection(_)));

    transport.close().await.unwrap();
    let _ = fs::remove_file(script);
}

#[tokio::test]
async fn oversized_message_is_a_json_decode_error() {
    // Options cap the buffer low so the script can exceed it cheaply
    let script = fake_cli(
        "oversized",
        r#"printf '{"type": "assistant", "payload": "'
head -c 2048 /dev/zero | tr '\0' 'x'
printf '"}\n'
"#,
    );
    let options = ClaudeCodeOptions::builder().max_buffer_size(1024).build();
    let mut transport =
        SubprocessTransport::new(PromptInput::from("hi"), options, Some(script.clone())).unwrap();
    transport.connect().await.unwrap();

    let mut rx = transport.read_messages();
    let item = tokio::time::timeout(std::time::Duration::from_secs(10), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(item, Err(ClaudeError::JsonDecode(_))));

    // The decode failure is latched and re-raised on close
    let err = transport.close().await.unwrap_err();
    assert!(matches!(err, ClaudeError::JsonDecode(_)));
    let _ = fs::remove_file(script);
}
