use std::fmt;

use serde::{Deserialize, Serialize};

use crate::api::MessageWire;
use crate::models::{ChannelId, MessageId, ThreadId, UserId};

/// Logical push address one subscription binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Address {
    Channel(ChannelId),
    Thread(ChannelId, ThreadId),
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Channel(id) => write!(f, "channel:{id}"),
            Self::Thread(cid, tid) => write!(f, "channel:{cid}/thread:{tid}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionAction {
    Add,
    Remove,
}

/// Events delivered over the push subscription, tagged by `type`.
///
/// Unrecognized kinds decode to `Unknown` so a newer server never breaks
/// an older client; the subscription still advances its sequence counter
/// for them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// A message was created. Carries the sender's staged correlation id
    /// so the originating client can reconcile its optimistic entry.
    Sent {
        #[serde(default)]
        staged_id: Option<String>,
        message: MessageWire,
    },

    /// A message's content was edited.
    Edit { message: MessageWire },

    /// Server-side processing (oneboxing, mention resolution) finished
    /// and produced a new cooked rendering.
    Processed { id: MessageId, cooked: String },

    /// A reaction was added or removed.
    Reaction {
        id: MessageId,
        emoji: String,
        user_id: UserId,
        action: ReactionAction,
    },

    /// A message was deleted. `latest_not_deleted_id` is the fallback for
    /// read-pointer advancement.
    Delete {
        id: MessageId,
        deleted_by_id: UserId,
        #[serde(default)]
        latest_not_deleted_id: Option<MessageId>,
    },

    /// Several messages were deleted at once.
    BulkDelete {
        ids: Vec<MessageId>,
        deleted_by_id: UserId,
        #[serde(default)]
        latest_not_deleted_id: Option<MessageId>,
    },

    /// A deleted message was restored. Carries the full payload because a
    /// restore can be the first time this client hears of the message.
    Restore { message: MessageWire },

    /// A message was flagged for moderation review.
    Flag { id: MessageId, review_id: u64 },

    /// A thread was opened rooted at a message in this channel.
    ThreadCreated {
        thread_id: ThreadId,
        original_message_id: MessageId,
    },

    /// The thread's root message changed (thread-scoped).
    UpdateThreadOriginalMessage { message: MessageWire },

    /// A message was pinned in its thread (thread-scoped).
    Pin { id: MessageId },

    /// A message was unpinned in its thread (thread-scoped).
    Unpin { id: MessageId },

    /// Any event kind this client does not recognize.
    #[serde(other)]
    Unknown,
}
