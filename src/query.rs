//! One-shot query convenience

use futures::Stream;

use crate::client::ClaudeSDKClient;
use crate::error::Result;
use crate::types::{ClaudeCodeOptions, Message};

/// Run a single prompt against the Claude Code CLI and stream the
/// conversation until it completes.
///
/// This is the fire-and-forget path: the CLI runs in one-shot mode, so the
/// control protocol (permission callbacks, hooks, interrupts) is unavailable.
/// Use [`ClaudeSDKClient`] for interactive sessions.
///
/// # Example
///
/// ```no_run
/// use claude_code_sdk::{query, Message};
/// use futures::StreamExt;
///
/// #[tokio::main]
/// async fn main() -> claude_code_sdk::Result<()> {
///     let stream = query("What is 2 + 2?", None).await?;
///     let mut stream = std::pin::pin!(stream);
///
///     while let Some(message) = stream.next().await {
///         if let Message::Assistant { message, .. } = message? {
///             println!("{message:?}");
///         }
///     }
///     Ok(())
/// }
/// ```
///
/// # Errors
/// Fails on CLI discovery or process launch; stream items carry parse and
/// process failures.
pub async fn query(
    prompt: impl Into<String>,
    options: Option<ClaudeCodeOptions>,
) -> Result<impl Stream<Item = Result<Message>>> {
    let mut client = ClaudeSDKClient::new(options.unwrap_or_default());
    client.connect_with_prompt(prompt).await?;
    let receiver = client.take_message_receiver();

    Ok(async_stream::stream! {
        let mut client = client;
        let mut saw_error = false;
        if let Some(mut receiver) = receiver {
            while let Some(item) = receiver.recv().await {
                saw_error |= item.is_err();
                yield item;
            }
        }
        if let Err(e) = client.disconnect().await {
            // A latched exit error was already surfaced through the stream
            if !saw_error {
                yield Err(e);
            }
        }
    })
}
