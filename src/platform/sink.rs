//! Reply sink.
//!
//! Outbound side of the conversation: documents and text prompts. Labeled
//! actions attached to a text reply re-enter the engine as callback events
//! carrying the action's `data` string.

use std::path::Path;

use async_trait::async_trait;

use crate::error::PlatformError;
use crate::platform::ChatId;

/// A labeled action offered alongside a text reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyAction {
    /// Human-visible label.
    pub label: String,
    /// Opaque callback data delivered back when the action is invoked.
    pub data: String,
}

impl ReplyAction {
    pub fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: data.into(),
        }
    }
}

/// Destination for replies to a chat.
#[async_trait]
pub trait ReplySink: Send + Sync {
    /// Send a file as a document attachment.
    async fn send_document(
        &self,
        chat: ChatId,
        path: &Path,
        filename: &str,
    ) -> Result<(), PlatformError>;

    /// Send a text reply, optionally with labeled actions.
    async fn send_text(
        &self,
        chat: ChatId,
        text: &str,
        actions: &[ReplyAction],
    ) -> Result<(), PlatformError>;
}
