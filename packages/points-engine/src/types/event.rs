//! Raw events pulled from the chat source.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A file attached to a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub byte_size: u64,
}

impl Attachment {
    pub fn new(filename: impl Into<String>, byte_size: u64) -> Self {
        Self {
            filename: filename.into(),
            byte_size,
        }
    }
}

/// One message from the external event source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEvent {
    /// Message ID in the source system
    pub id: String,

    /// Author's stable external ID (the ambassador)
    pub author_id: String,

    pub created_at: DateTime<Utc>,

    /// Message text, scanned for URLs
    #[serde(default)]
    pub content: String,

    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl SourceEvent {
    pub fn new(
        id: impl Into<String>,
        author_id: impl Into<String>,
        created_at: DateTime<Utc>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            author_id: author_id.into(),
            created_at,
            content: content.into(),
            attachments: Vec::new(),
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}
