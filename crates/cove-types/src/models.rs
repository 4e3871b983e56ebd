use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type MessageId = u64;
pub type ChannelId = u64;
pub type ThreadId = u64;
pub type UserId = u64;

/// Client-generated correlation id for a message that has been staged
/// locally but not yet confirmed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StagedId(pub String);

impl StagedId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Per-emoji reaction aggregate on one message.
///
/// The user set is authoritative; `count` and `reacted` are maintained
/// alongside it so the UI never has to walk the set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReactionState {
    pub count: u32,
    pub users: BTreeSet<UserId>,
    /// Whether the current user is in `users`.
    pub reacted: bool,
}

/// One chat message as held in a `MessageStore`.
///
/// Identity is the server-assigned `id` once confirmed, or `staged_id`
/// while the message is a local optimistic entry awaiting confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Option<MessageId>,
    pub staged_id: Option<StagedId>,
    pub staged: bool,
    pub channel_id: ChannelId,
    pub thread_id: Option<ThreadId>,
    pub author_id: UserId,
    pub created_at: DateTime<Utc>,
    /// Raw markdown as the author typed it.
    pub content: String,
    /// Server-rendered HTML. For a staged message this is an optimistic
    /// client render until reconciliation replaces it.
    pub cooked: String,
    pub edited: bool,
    pub processed: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by_id: Option<UserId>,
    pub reactions: BTreeMap<String, ReactionState>,
    /// Bumped when content is refreshed out-of-band so the UI re-renders
    /// without the message changing identity.
    pub version: u32,
    pub pinned: bool,
    pub uploads: Vec<String>,
    /// Set when a moderation flag event referenced this message.
    pub review_id: Option<u64>,
    /// Set when the server rejected the staged create; cleared on
    /// reconciliation.
    pub send_error: Option<String>,
    /// Thread rooted at this message, attached by a thread-created event.
    pub thread: Option<ThreadId>,
}

impl Message {
    /// Build a staged (optimistic) message for a local send.
    pub fn staged(
        staged_id: StagedId,
        channel_id: ChannelId,
        thread_id: Option<ThreadId>,
        author_id: UserId,
        content: &str,
    ) -> Self {
        Self {
            id: None,
            staged_id: Some(staged_id),
            staged: true,
            channel_id,
            thread_id,
            author_id,
            created_at: Utc::now(),
            content: content.to_owned(),
            cooked: content.to_owned(),
            edited: false,
            processed: false,
            deleted_at: None,
            deleted_by_id: None,
            reactions: BTreeMap::new(),
            version: 0,
            pinned: false,
            uploads: Vec::new(),
            review_id: None,
            send_error: None,
            thread: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Cached channel metadata. Created on first fetch, updated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelDescriptor {
    pub id: ChannelId,
    pub title: String,
    pub last_message_id: Option<MessageId>,
    pub membership_count: u32,
}

/// Cached thread metadata. Created on first fetch, updated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadDescriptor {
    pub id: ThreadId,
    pub channel_id: ChannelId,
    pub original_message_id: MessageId,
    pub title: Option<String>,
    pub reply_count: u32,
    pub pinned_count: u32,
    /// Short excerpt of the thread's root message, for channel-side
    /// previews; refreshed when the root message is updated.
    pub preview: Option<String>,
}
