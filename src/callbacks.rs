//! Trait-based callback definitions for permissions and hooks.
//!
//! Implement these traits on your own types, or wrap closures with
//! [`FnPermissionCallback`] and [`FnHookCallback`].
//!
//! # Example: Implementing `PermissionCallback`
//!
//! ```no_run
//! use claude_code_sdk::callbacks::PermissionCallback;
//! use claude_code_sdk::types::{
//!     PermissionResult, PermissionResultAllow, PermissionResultDeny, ToolPermissionContext,
//! };
//! use claude_code_sdk::Result;
//! use async_trait::async_trait;
//!
//! struct ReadOnly;
//!
//! #[async_trait]
//! impl PermissionCallback for ReadOnly {
//!     async fn call(
//!         &self,
//!         tool_name: String,
//!         _input: serde_json::Value,
//!         _context: ToolPermissionContext,
//!     ) -> Result<PermissionResult> {
//!         if tool_name == "Read" || tool_name == "Glob" {
//!             Ok(PermissionResult::Allow(PermissionResultAllow::default()))
//!         } else {
//!             Ok(PermissionResult::Deny(PermissionResultDeny {
//!                 message: "Only read operations allowed".to_string(),
//!                 interrupt: false,
//!             }))
//!         }
//!     }
//! }
//! ```

use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::Result;
use crate::types::{HookContext, HookOutput, PermissionResult, ToolPermissionContext};

/// Callback consulted when the CLI requests permission to use a tool
#[async_trait]
pub trait PermissionCallback: Send + Sync {
    /// Decide whether the given tool invocation may proceed.
    ///
    /// # Arguments
    ///
    /// * `tool_name` - Name of the tool being requested
    /// * `input` - Tool input parameters
    /// * `context` - Suggestions from the CLI and the reserved cancel signal
    async fn call(
        &self,
        tool_name: String,
        input: serde_json::Value,
        context: ToolPermissionContext,
    ) -> Result<PermissionResult>;
}

/// Callback invoked by the CLI at a registered lifecycle event
#[async_trait]
pub trait HookCallback: Send + Sync {
    /// Handle a hook event.
    ///
    /// # Arguments
    ///
    /// * `input` - Event payload supplied by the CLI
    /// * `tool_use_id` - Tool use ID for tool-related events
    /// * `context` - Hook execution context
    async fn call(
        &self,
        input: serde_json::Value,
        tool_use_id: Option<String>,
        context: HookContext,
    ) -> Result<HookOutput>;
}

#[async_trait]
impl<T: PermissionCallback + ?Sized> PermissionCallback for Arc<T> {
    async fn call(
        &self,
        tool_name: String,
        input: serde_json::Value,
        context: ToolPermissionContext,
    ) -> Result<PermissionResult> {
        (**self).call(tool_name, input, context).await
    }
}

#[async_trait]
impl<T: HookCallback + ?Sized> HookCallback for Arc<T> {
    async fn call(
        &self,
        input: serde_json::Value,
        tool_use_id: Option<String>,
        context: HookContext,
    ) -> Result<HookOutput> {
        (**self).call(input, tool_use_id, context).await
    }
}

type BoxedFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

/// Adapter turning a closure into a [`PermissionCallback`]
///
/// # Example
///
/// ```no_run
/// use claude_code_sdk::callbacks::{FnPermissionCallback, PermissionCallback};
/// use claude_code_sdk::types::{PermissionResult, PermissionResultAllow};
/// use std::sync::Arc;
///
/// let callback = FnPermissionCallback::new(|tool_name, _input, _ctx| {
///     Box::pin(async move {
///         println!("permission requested for {tool_name}");
///         Ok(PermissionResult::Allow(PermissionResultAllow::default()))
///     })
/// });
///
/// let shared: Arc<dyn PermissionCallback> = Arc::new(callback);
/// ```
pub struct FnPermissionCallback<F>
where
    F: Fn(String, serde_json::Value, ToolPermissionContext) -> BoxedFuture<PermissionResult>
        + Send
        + Sync,
{
    func: F,
}

impl<F> FnPermissionCallback<F>
where
    F: Fn(String, serde_json::Value, ToolPermissionContext) -> BoxedFuture<PermissionResult>
        + Send
        + Sync,
{
    /// Wrap a closure
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F> PermissionCallback for FnPermissionCallback<F>
where
    F: Fn(String, serde_json::Value, ToolPermissionContext) -> BoxedFuture<PermissionResult>
        + Send
        + Sync,
{
    async fn call(
        &self,
        tool_name: String,
        input: serde_json::Value,
        context: ToolPermissionContext,
    ) -> Result<PermissionResult> {
        (self.func)(tool_name, input, context).await
    }
}

/// Adapter turning a closure into a [`HookCallback`]
pub struct FnHookCallback<F>
where
    F: Fn(serde_json::Value, Option<String>, HookContext) -> BoxedFuture<HookOutput> + Send + Sync,
{
    func: F,
}

impl<F> FnHookCallback<F>
where
    F: Fn(serde_json::Value, Option<String>, HookContext) -> BoxedFuture<HookOutput> + Send + Sync,
{
    /// Wrap a closure
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F> HookCallback for FnHookCallback<F>
where
    F: Fn(serde_json::Value, Option<String>, HookContext) -> BoxedFuture<HookOutput> + Send + Sync,
{
    async fn call(
        &self,
        input: serde_json::Value,
        tool_use_id: Option<String>,
        context: HookContext,
    ) -> Result<HookOutput> {
        (self.func)(input, tool_use_id, context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PermissionResultAllow, PermissionResultDeny};

    struct TestHook;

    #[async_trait]
    impl HookCallback for TestHook {
        async fn call(
            &self,
            _input: serde_json::Value,
            _tool_use_id: Option<String>,
            _context: HookContext,
        ) -> Result<HookOutput> {
            Ok(HookOutput::default())
        }
    }

    struct DenyAll;

    #[async_trait]
    impl PermissionCallback for DenyAll {
        async fn call(
            &self,
            tool_name: String,
            _input: serde_json::Value,
            _context: ToolPermissionContext,
        ) -> Result<PermissionResult> {
            Ok(PermissionResult::Deny(PermissionResultDeny {
                message: format!("Denied: {tool_name}"),
                interrupt: false,
            }))
        }
    }

    #[tokio::test]
    async fn hook_callback_trait_object() {
        let hook: Arc<dyn HookCallback> = Arc::new(TestHook);
        let result = hook
            .call(serde_json::json!({}), None, HookContext::default())
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn permission_callback_returns_deny() {
        let perm = DenyAll;
        let result = perm
            .call(
                "Bash".to_string(),
                serde_json::json!({}),
                ToolPermissionContext::new(vec![]),
            )
            .await
            .unwrap();
        match result {
            PermissionResult::Deny(deny) => assert_eq!(deny.message, "Denied: Bash"),
            PermissionResult::Allow(_) => panic!("expected deny"),
        }
    }

    #[tokio::test]
    async fn fn_permission_callback_wraps_closure() {
        let callback = FnPermissionCallback::new(|_tool, _input, ctx| {
            Box::pin(async move {
                assert!(ctx.suggestions.is_empty());
                assert!(!ctx.is_cancelled());
                Ok(PermissionResult::Allow(PermissionResultAllow::default()))
            })
        });

        let result = callback
            .call(
                "Read".to_string(),
                serde_json::json!({}),
                ToolPermissionContext::new(vec![]),
            )
            .await;
        assert!(matches!(result, Ok(PermissionResult::Allow(_))));
    }

    #[tokio::test]
    async fn fn_hook_callback_wraps_closure() {
        let callback = FnHookCallback::new(|_input, tool_use_id, _ctx| {
            Box::pin(async move {
                assert_eq!(tool_use_id.as_deref(), Some("tool_1"));
                Ok(HookOutput::default())
            })
        });

        let result = callback
            .call(
                serde_json::json!({}),
                Some("tool_1".to_string()),
                HookContext::default(),
            )
            .await;
        assert!(result.is_ok());
    }
}
