//! Control protocol handler
//!
//! [`Query`] owns the transport for the duration of a connection. It
//! de-multiplexes the inbound envelope stream into conversation messages,
//! control responses, and control requests; correlates outbound control
//! requests with their responses under a timeout; and dispatches inbound
//! `can_use_tool`, `hook_callback`, and `mcp_message` requests to
//! user-supplied callbacks off the router task.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::callbacks::HookCallback;
use crate::error::{ClaudeError, Result};
use crate::message::parse_message;
use crate::transport::Transport;
use crate::types::{
    CanUseToolCallback, HookContext, HookEvent, HookMatcher, Message, PermissionMode,
    PermissionResult, ToolPermissionContext,
};

/// Timeout applied to every outbound control request
pub const CONTROL_REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(60);

type PendingResponses = Arc<std::sync::Mutex<HashMap<String, oneshot::Sender<Result<Value>>>>>;
type HookRegistry = Arc<std::sync::Mutex<HashMap<String, Arc<dyn HookCallback>>>>;

/// Shared state the router and request handlers operate on
struct RouterContext {
    transport: Arc<Mutex<Box<dyn Transport>>>,
    can_use_tool: Option<CanUseToolCallback>,
    hook_callbacks: HookRegistry,
    pending: PendingResponses,
    message_tx: mpsc::UnboundedSender<Result<Message>>,
    cancel: CancellationToken,
}

/// Control protocol handler for one CLI connection
pub struct Query {
    transport: Arc<Mutex<Box<dyn Transport>>>,
    streaming_mode: bool,
    can_use_tool: Option<CanUseToolCallback>,
    hook_config: HashMap<HookEvent, Vec<HookMatcher>>,
    hook_callbacks: HookRegistry,
    next_callback_id: AtomicU64,
    request_counter: AtomicU64,
    pending: PendingResponses,
    message_tx: Option<mpsc::UnboundedSender<Result<Message>>>,
    message_rx: Option<mpsc::UnboundedReceiver<Result<Message>>>,
    initialization_result: std::sync::Mutex<Option<Value>>,
    reader_task: Option<JoinHandle<()>>,
    cancel: CancellationToken,
    closed: AtomicBool,
}

impl Query {
    /// Create a control handler over an already-connected transport
    pub fn new(
        transport: Box<dyn Transport>,
        streaming_mode: bool,
        can_use_tool: Option<CanUseToolCallback>,
        hooks: Option<HashMap<HookEvent, Vec<HookMatcher>>>,
    ) -> Self {
        let (message_tx, message_rx) = mpsc::unbounded_channel();
        Self {
            transport: Arc::new(Mutex::new(transport)),
            streaming_mode,
            can_use_tool,
            hook_config: hooks.unwrap_or_default(),
            hook_callbacks: Arc::new(std::sync::Mutex::new(HashMap::new())),
            next_callback_id: AtomicU64::new(0),
            request_counter: AtomicU64::new(0),
            pending: Arc::new(std::sync::Mutex::new(HashMap::new())),
            message_tx: Some(message_tx),
            message_rx: Some(message_rx),
            initialization_result: std::sync::Mutex::new(None),
            reader_task: None,
            cancel: CancellationToken::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Start the router task consuming the transport's envelope stream
    pub async fn start(&mut self) {
        let receiver = {
            let mut transport = self.transport.lock().await;
            transport.read_messages()
        };
        let Some(message_tx) = self.message_tx.take() else {
            return;
        };
        let ctx = RouterContext {
            transport: self.transport.clone(),
            can_use_tool: self.can_use_tool.clone(),
            hook_callbacks: self.hook_callbacks.clone(),
            pending: self.pending.clone(),
            message_tx,
            cancel: self.cancel.clone(),
        };
        self.reader_task = Some(tokio::spawn(run_router(ctx, receiver)));
    }

    /// Take the typed conversation stream. Yields messages in arrival order;
    /// closes after a terminal error or when the connection ends.
    pub fn take_message_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<Result<Message>>> {
        self.message_rx.take()
    }

    /// Send the `initialize` control request, minting callback IDs for every
    /// configured hook.
    ///
    /// A non-streaming connection skips initialization and returns `None`.
    ///
    /// # Errors
    /// Propagates control request failures
    pub async fn initialize(&self) -> Result<Option<Value>> {
        if !self.streaming_mode {
            return Ok(None);
        }

        let mut hooks_payload = serde_json::Map::new();
        for (event, matchers) in &self.hook_config {
            let mut matcher_configs = Vec::with_capacity(matchers.len());
            for matcher in matchers {
                let mut callback_ids = Vec::with_capacity(matcher.hooks.len());
                for hook in &matcher.hooks {
                    let id = format!(
                        "hook_{}",
                        self.next_callback_id.fetch_add(1, Ordering::SeqCst)
                    );
                    if let Ok(mut registry) = self.hook_callbacks.lock() {
                        registry.insert(id.clone(), hook.clone());
                    }
                    callback_ids.push(id);
                }
                matcher_configs.push(json!({
                    "matcher": matcher.matcher,
                    "hookCallbackIds": callback_ids,
                }));
            }
            hooks_payload.insert(event.as_str().to_string(), Value::Array(matcher_configs));
        }

        let mut request = json!({ "subtype": "initialize" });
        if !hooks_payload.is_empty() {
            request["hooks"] = Value::Object(hooks_payload);
        }

        let response = self.send_control_request(request).await?;
        if let Ok(mut stashed) = self.initialization_result.lock() {
            *stashed = Some(response.clone());
        }
        Ok(Some(response))
    }

    /// Result of the `initialize` exchange, if any
    #[must_use]
    pub fn initialization_result(&self) -> Option<Value> {
        self.initialization_result
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
    }

    /// Send a control request and await its correlated response.
    ///
    /// # Errors
    /// Fails outside streaming mode, on write failure, on a server-reported
    /// error, and after [`CONTROL_REQUEST_TIMEOUT`] without a response.
    pub async fn send_control_request(&self, request: Value) -> Result<Value> {
        if !self.streaming_mode {
            return Err(ClaudeError::connection(
                "Control requests require streaming mode",
            ));
        }

        let subtype = request
            .get("subtype")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let request_id = format!(
            "req_{}_{}",
            self.request_counter.fetch_add(1, Ordering::SeqCst) + 1,
            Uuid::new_v4()
        );

        let (tx, rx) = oneshot::channel();
        if let Ok(mut pending) = self.pending.lock() {
            pending.insert(request_id.clone(), tx);
        }

        let envelope = json!({
            "type": "control_request",
            "request_id": request_id,
            "request": request,
        });
        if let Err(e) = write_envelope(&self.transport, &envelope).await {
            self.remove_pending(&request_id);
            return Err(ClaudeError::connection(format!(
                "Failed to send control request: {e}"
            )));
        }

        match tokio::time::timeout(CONTROL_REQUEST_TIMEOUT, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_closed)) => Err(ClaudeError::connection(
                "Connection closed before control response",
            )),
            Err(_elapsed) => {
                self.remove_pending(&request_id);
                Err(ClaudeError::control_timeout(
                    CONTROL_REQUEST_TIMEOUT.as_secs(),
                    subtype,
                ))
            }
        }
    }

    fn remove_pending(&self, request_id: &str) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(request_id);
        }
    }

    /// Write one already-shaped input record (a user message envelope) to the
    /// CLI.
    ///
    /// # Errors
    /// Propagates serialization and transport failures
    pub async fn write_input(&self, record: &Value) -> Result<()> {
        write_envelope(&self.transport, record).await
    }

    /// Handle for feeding input independently of the owning `Query`
    #[must_use]
    pub fn input_handle(&self) -> InputHandle {
        InputHandle {
            transport: self.transport.clone(),
        }
    }

    /// Forward a caller-supplied input stream to the CLI, closing stdin when
    /// the stream completes.
    ///
    /// # Errors
    /// Propagates the first per-record write failure; the rest of the stream
    /// is not consumed.
    pub async fn stream_input<S>(&self, stream: S) -> Result<()>
    where
        S: futures::Stream<Item = Value> + Send,
    {
        self.input_handle().stream_input(stream).await
    }

    /// Interrupt the current turn
    ///
    /// # Errors
    /// Propagates control request failures
    pub async fn interrupt(&self) -> Result<()> {
        self.send_control_request(json!({ "subtype": "interrupt" }))
            .await?;
        Ok(())
    }

    /// Switch the permission mode mid-session
    ///
    /// # Errors
    /// Propagates control request failures
    pub async fn set_permission_mode(&self, mode: PermissionMode) -> Result<()> {
        self.send_control_request(json!({
            "subtype": "set_permission_mode",
            "mode": mode.as_str(),
        }))
        .await?;
        Ok(())
    }

    /// Shut the control plane down.
    ///
    /// Idempotent. Pending control requests complete exceptionally, the hook
    /// registry is cleared, in-flight handlers are cancelled, and the
    /// transport is closed (re-raising any latched exit error).
    ///
    /// # Errors
    /// Returns the transport's latched exit error, if any
    pub async fn close(&mut self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.cancel.cancel();
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }

        let drained: Vec<(String, oneshot::Sender<Result<Value>>)> = self
            .pending
            .lock()
            .map(|mut pending| pending.drain().collect())
            .unwrap_or_default();
        for (request_id, sender) in drained {
            tracing::debug!(%request_id, "Failing pending control request on close");
            let _ = sender.send(Err(ClaudeError::connection(
                "Connection closed before control response",
            )));
        }

        if let Ok(mut registry) = self.hook_callbacks.lock() {
            registry.clear();
        }

        let mut transport = self.transport.lock().await;
        transport.close().await
    }
}

/// Clonable handle that feeds input records through the shared transport
#[derive(Clone)]
pub struct InputHandle {
    transport: Arc<Mutex<Box<dyn Transport>>>,
}

impl InputHandle {
    /// Write one input record as a JSON line
    ///
    /// # Errors
    /// Propagates serialization and transport failures
    pub async fn write_input(&self, record: &Value) -> Result<()> {
        write_envelope(&self.transport, record).await
    }

    /// Serialize every stream item to the CLI, then close stdin
    ///
    /// # Errors
    /// Propagates the first per-record write failure; the rest of the stream
    /// is not consumed.
    pub async fn stream_input<S>(&self, stream: S) -> Result<()>
    where
        S: futures::Stream<Item = Value> + Send,
    {
        use futures::StreamExt;

        futures::pin_mut!(stream);
        while let Some(record) = stream.next().await {
            self.write_input(&record).await?;
        }
        let mut transport = self.transport.lock().await;
        transport.end_input().await
    }
}

/// Router: consumes the transport envelope stream until EOF or a terminal
/// transport error.
async fn run_router(ctx: RouterContext, mut receiver: mpsc::UnboundedReceiver<Result<Value>>) {
    // Set once a parse error has closed the conversation stream; the control
    // plane keeps servicing requests afterwards.
    let mut conversation_open = true;

    while let Some(item) = receiver.recv().await {
        match item {
            Ok(envelope) => route_envelope(&ctx, envelope, &mut conversation_open),
            Err(e) => {
                let _ = ctx.message_tx.send(Err(e));
                break;
            }
        }
    }

    fail_pending(&ctx.pending);
    // Dropping ctx.message_tx ends the conversation stream
}

fn route_envelope(ctx: &RouterContext, envelope: Value, conversation_open: &mut bool) {
    let envelope_type = envelope
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default();
    match envelope_type {
        "control_response" => handle_control_response(&ctx.pending, &envelope),
        "control_request" => {
            let handler = ControlRequestHandler {
                transport: ctx.transport.clone(),
                can_use_tool: ctx.can_use_tool.clone(),
                hook_callbacks: ctx.hook_callbacks.clone(),
            };
            let cancel = ctx.cancel.clone();
            // Handlers run off the router so a slow callback cannot stall it
            tokio::spawn(async move {
                tokio::select! {
                    () = cancel.cancelled() => {}
                    () = handler.handle(envelope) => {}
                }
            });
        }
        "control_cancel_request" => {
            tracing::debug!("Ignoring control_cancel_request (not supported)");
        }
        _ => {
            if !*conversation_open {
                return;
            }
            match parse_message(&envelope) {
                Ok(message) => {
                    if ctx.message_tx.send(Ok(message)).is_err() {
                        // Conversation consumer is gone; control plane stays up
                        *conversation_open = false;
                    }
                }
                Err(e) => {
                    let _ = ctx.message_tx.send(Err(e));
                    *conversation_open = false;
                }
            }
        }
    }
}

fn handle_control_response(pending: &PendingResponses, envelope: &Value) {
    let Some(response) = envelope.get("response").and_then(Value::as_object) else {
        return;
    };
    let Some(request_id) = response.get("request_id").and_then(Value::as_str) else {
        return;
    };
    let sender = pending
        .lock()
        .ok()
        .and_then(|mut pending| pending.remove(request_id));
    let Some(sender) = sender else {
        // Late arrival after a timeout already removed the slot
        tracing::debug!(request_id, "Dropping control_response with unknown request_id");
        return;
    };

    if response.get("subtype").and_then(Value::as_str) == Some("error") {
        let message = response
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        let _ = sender.send(Err(ClaudeError::connection(message)));
    } else {
        let payload = response
            .get("response")
            .filter(|v| v.is_object())
            .cloned()
            .unwrap_or_else(|| json!({}));
        let _ = sender.send(Ok(payload));
    }
}

fn fail_pending(pending: &PendingResponses) {
    let drained: Vec<(String, oneshot::Sender<Result<Value>>)> = pending
        .lock()
        .map(|mut pending| pending.drain().collect())
        .unwrap_or_default();
    for (_, sender) in drained {
        let _ = sender.send(Err(ClaudeError::connection(
            "Connection closed before control response",
        )));
    }
}

/// Per-request dispatcher for inbound control requests
struct ControlRequestHandler {
    transport: Arc<Mutex<Box<dyn Transport>>>,
    can_use_tool: Option<CanUseToolCallback>,
    hook_callbacks: HookRegistry,
}

impl ControlRequestHandler {
    async fn handle(&self, envelope: Value) {
        let request_id = envelope.get("request_id").cloned().unwrap_or(Value::Null);
        let Some(request) = envelope.get("request").and_then(Value::as_object) else {
            return;
        };
        let subtype = request
            .get("subtype")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let outcome = match subtype {
            "can_use_tool" => self.handle_can_use_tool(request).await,
            "hook_callback" => self.handle_hook_callback(request).await,
            "mcp_message" => Self::handle_mcp_message(request),
            other => Err(format!("Unsupported control request subtype: {other}")),
        };

        let response = match outcome {
            Ok(data) => json!({
                "type": "control_response",
                "response": {
                    "subtype": "success",
                    "request_id": request_id,
                    "response": data,
                },
            }),
            Err(message) => json!({
                "type": "control_response",
                "response": {
                    "subtype": "error",
                    "request_id": request_id,
                    "error": message,
                },
            }),
        };

        if let Err(e) = write_envelope(&self.transport, &response).await {
            tracing::warn!(error = %e, "Failed to write control response");
        }
    }

    async fn handle_can_use_tool(
        &self,
        request: &serde_json::Map<String, Value>,
    ) -> std::result::Result<Value, String> {
        let Some(callback) = self.can_use_tool.as_ref() else {
            return Err("canUseTool callback is not provided".to_string());
        };
        let tool_name = request
            .get("tool_name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let input = request.get("input").cloned().unwrap_or_else(|| json!({}));
        let context = ToolPermissionContext::new(Vec::new());

        match callback.call(tool_name, input, context).await {
            Ok(PermissionResult::Allow(allow)) => {
                let mut data = json!({ "allow": true });
                if let Some(updated_input) = allow.updated_input {
                    data["input"] = updated_input;
                }
                Ok(data)
            }
            Ok(PermissionResult::Deny(deny)) => {
                let mut data = json!({ "allow": false, "reason": deny.message });
                if deny.interrupt {
                    data["interrupt"] = json!(true);
                }
                Ok(data)
            }
            Err(e) => Err(e.to_string()),
        }
    }

    async fn handle_hook_callback(
        &self,
        request: &serde_json::Map<String, Value>,
    ) -> std::result::Result<Value, String> {
        let callback_id = request
            .get("callback_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let callback = self
            .hook_callbacks
            .lock()
            .ok()
            .and_then(|registry| registry.get(&callback_id).cloned());
        let Some(callback) = callback else {
            return Err(format!("No hook callback found for ID: {callback_id}"));
        };

        let input = request.get("input").cloned().unwrap_or_else(|| json!({}));
        let tool_use_id = request
            .get("tool_use_id")
            .and_then(Value::as_str)
            .map(str::to_string);

        match callback
            .call(input, tool_use_id, HookContext::default())
            .await
        {
            Ok(output) => Ok(serde_json::to_value(&output).unwrap_or_else(|_| json!({}))),
            Err(e) => Err(e.to_string()),
        }
    }

    fn handle_mcp_message(
        request: &serde_json::Map<String, Value>,
    ) -> std::result::Result<Value, String> {
        let id = request
            .get("message")
            .and_then(|m| m.get("id"))
            .cloned()
            .unwrap_or(Value::Null);
        Ok(json!({
            "mcp_response": {
                "jsonrpc": "2.0",
                "id": id,
                "error": {
                    "code": -32601,
                    "message": "SDK MCP servers are not supported in the Rust SDK.",
                },
            },
        }))
    }
}

/// Serialize and write one newline-terminated envelope. The transport mutex
/// serializes writers, so concurrent handlers never interleave lines.
async fn write_envelope(transport: &Arc<Mutex<Box<dyn Transport>>>, envelope: &Value) -> Result<()> {
    let line = serde_json::to_string(envelope)
        .map_err(|e| ClaudeError::connection(format!("Failed to encode message: {e}")))?;
    let mut transport = transport.lock().await;
    transport.write(&format!("{line}\n")).await
}
