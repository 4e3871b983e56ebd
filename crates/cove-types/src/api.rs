use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ChannelId, Message, MessageId, ThreadId, UserId};

/// Temporal direction for a paginated history fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchDirection {
    Past,
    Future,
}

/// Query for one page of message history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRequest {
    pub direction: FetchDirection,
    pub page_size: u32,
    /// Cursor: the confirmed message id bounding the page, absent for the
    /// initial most-recent load.
    pub target_message_id: Option<MessageId>,
}

/// Pagination metadata returned with every page.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PageMeta {
    pub can_load_more_past: bool,
    pub can_load_more_future: bool,
}

/// One page of message history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePage {
    pub messages: Vec<MessageWire>,
    pub meta: PageMeta,
}

/// Wire shape of one message, as carried by both the fetch endpoint and
/// push event payloads. Only the fields the sync core consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageWire {
    pub id: MessageId,
    pub channel_id: ChannelId,
    #[serde(default)]
    pub thread_id: Option<ThreadId>,
    pub author_id: UserId,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub cooked: String,
    #[serde(default)]
    pub edited: bool,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub uploads: Vec<String>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted_by_id: Option<UserId>,
}

impl From<MessageWire> for Message {
    fn from(wire: MessageWire) -> Self {
        Message {
            id: Some(wire.id),
            staged_id: None,
            staged: false,
            channel_id: wire.channel_id,
            thread_id: wire.thread_id,
            author_id: wire.author_id,
            created_at: wire.created_at,
            content: wire.content,
            cooked: wire.cooked,
            edited: wire.edited,
            processed: false,
            deleted_at: wire.deleted_at,
            deleted_by_id: wire.deleted_by_id,
            reactions: Default::default(),
            version: 0,
            pinned: wire.pinned,
            uploads: wire.uploads,
            review_id: None,
            send_error: None,
            thread: None,
        }
    }
}
