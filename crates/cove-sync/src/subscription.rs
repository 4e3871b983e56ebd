//! Push event processing shared by channel and thread subscriptions.
//!
//! Channel and thread scopes consume the same core event set; instead of a
//! base-class hierarchy, `apply_common` handles the shared set and hands
//! anything scope-specific back to the owning view.

use chrono::Utc;
use tracing::{debug, warn};

use cove_types::api::MessageWire;
use cove_types::events::{Address, ChatEvent, ReactionAction};
use cove_types::models::{Message, MessageId, StagedId, UserId};

use crate::store::MessageStore;
use crate::traits::{DesyncReporter, Guardian};

/// Per-address sequence bookkeeping for one subscription.
///
/// `last_sequence` is the highest sequence number applied, recognized event
/// or not, and survives re-subscription as the resume token.
#[derive(Debug)]
pub struct SubscriptionState {
    address: Address,
    last_sequence: Option<u64>,
    desync_count: u32,
}

impl SubscriptionState {
    pub fn new(address: Address, resume_from: Option<u64>) -> Self {
        Self {
            address,
            last_sequence: resume_from,
            desync_count: 0,
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Token to pass back to `subscribe` on resume.
    pub fn resume_token(&self) -> Option<u64> {
        self.last_sequence
    }

    pub fn desync_count(&self) -> u32 {
        self.desync_count
    }

    /// Flag a gap if `sequence` is not the successor of the last applied
    /// number. The event is still applied afterwards; gaps are surfaced,
    /// not fatal.
    pub fn check_gap(&mut self, sequence: u64, reporter: Option<&dyn DesyncReporter>) {
        let Some(last) = self.last_sequence else {
            return;
        };
        let expected = last + 1;
        if sequence != expected {
            self.desync_count += 1;
            warn!(
                address = %self.address,
                expected,
                got = sequence,
                "push sequence gap"
            );
            if let Some(reporter) = reporter {
                reporter.desync(&self.address, expected, sequence);
            }
        }
    }

    /// Record the transport's numbering unconditionally, unknown event
    /// kinds included, so gap detection tracks the transport rather than
    /// the recognized event set.
    pub fn commit(&mut self, sequence: u64) {
        self.last_sequence = Some(sequence);
    }
}

/// Everything the shared handlers need from the owning scope.
pub(crate) struct ScopeContext<'a> {
    pub store: &'a mut MessageStore,
    pub current_user: UserId,
    pub guardian: &'a dyn Guardian,
}

/// Apply one event from the shared set. Returns the event back when it is
/// not in the shared set so the scope can handle (or ignore) it.
///
/// Handlers referencing a message that is not loaded locally are silent
/// no-ops, and every handler tolerates replay.
pub(crate) fn apply_common(ctx: &mut ScopeContext<'_>, event: ChatEvent) -> Option<ChatEvent> {
    match event {
        ChatEvent::Sent { staged_id, message } => {
            handle_sent(ctx, staged_id.as_deref(), &message);
            None
        }
        ChatEvent::Edit { message } => {
            if let Some(local) = ctx.store.find_message_mut(message.id) {
                local.content = message.content;
                local.cooked = message.cooked;
                local.uploads = message.uploads;
                local.edited = true;
            }
            None
        }
        ChatEvent::Processed { id, cooked } => {
            if let Some(local) = ctx.store.find_message_mut(id) {
                if local.cooked != cooked {
                    local.cooked = cooked;
                    local.version += 1;
                }
                local.processed = true;
            }
            None
        }
        ChatEvent::Reaction {
            id,
            emoji,
            user_id,
            action,
        } => {
            apply_reaction(ctx, id, &emoji, user_id, action);
            None
        }
        ChatEvent::Delete {
            id,
            deleted_by_id,
            latest_not_deleted_id,
        } => {
            apply_delete(ctx, id, deleted_by_id, latest_not_deleted_id);
            None
        }
        ChatEvent::BulkDelete {
            ids,
            deleted_by_id,
            latest_not_deleted_id,
        } => {
            for id in ids {
                apply_delete(ctx, id, deleted_by_id, latest_not_deleted_id);
            }
            None
        }
        ChatEvent::Restore { message } => {
            if let Some(local) = ctx.store.find_message_mut(message.id) {
                local.deleted_at = None;
                local.deleted_by_id = None;
            } else {
                // A restore can be the first this client hears of the
                // message, e.g. after a reconnect.
                let id = message.id;
                ctx.store.add_messages([Message::from(message)]);
                ctx.store.note_message(id);
            }
            None
        }
        ChatEvent::Flag { id, review_id } => {
            if let Some(local) = ctx.store.find_message_mut(id) {
                local.review_id = Some(review_id);
            }
            None
        }
        other => Some(other),
    }
}

/// Insert a sent message, reconciling against a local staged entry when
/// this client authored it.
fn handle_sent(ctx: &mut ScopeContext<'_>, staged_id: Option<&str>, wire: &MessageWire) {
    // Replay: already confirmed locally, nothing to do.
    if ctx.store.find_message(wire.id).is_some() {
        ctx.store.note_message(wire.id);
        return;
    }

    if wire.author_id == ctx.current_user
        && let Some(staged_id) = staged_id
    {
        let key = StagedId(staged_id.to_owned());
        if let Some(local) = ctx.store.find_staged_message_mut(&key) {
            // Mutate in place so the rendered message keeps its identity
            // and the UI does not flicker through a remove+insert.
            local.send_error = None;
            local.id = Some(wire.id);
            local.staged = false;
            // Server-side cooking wins over the optimistic client render.
            local.cooked = wire.cooked.clone();
            local.created_at = wire.created_at;
            local.channel_id = wire.channel_id;
            local.thread_id = wire.thread_id;
            ctx.store.resort();
            ctx.store.note_message(wire.id);
            debug!(id = wire.id, staged_id, "reconciled staged message");
            return;
        }
    }

    ctx.store.add_messages([Message::from(wire.clone())]);
    ctx.store.note_message(wire.id);
}

fn apply_reaction(
    ctx: &mut ScopeContext<'_>,
    id: MessageId,
    emoji: &str,
    user_id: UserId,
    action: ReactionAction,
) {
    let current_user = ctx.current_user;
    let Some(local) = ctx.store.find_message_mut(id) else {
        return;
    };
    match action {
        ReactionAction::Add => {
            let state = local.reactions.entry(emoji.to_owned()).or_default();
            // Set semantics keep replays idempotent.
            if state.users.insert(user_id) {
                state.count += 1;
            }
            if user_id == current_user {
                state.reacted = true;
            }
        }
        ReactionAction::Remove => {
            let mut now_empty = false;
            if let Some(state) = local.reactions.get_mut(emoji) {
                if state.users.remove(&user_id) {
                    state.count -= 1;
                }
                if user_id == current_user {
                    state.reacted = false;
                }
                now_empty = state.users.is_empty();
            }
            if now_empty {
                local.reactions.remove(emoji);
            }
        }
    }
}

/// Soft-delete when the actor is the author or the guardian grants
/// modification (the tombstone stays visible); detach entirely otherwise.
fn apply_delete(
    ctx: &mut ScopeContext<'_>,
    id: MessageId,
    deleted_by_id: UserId,
    fallback: Option<MessageId>,
) {
    let keep_tombstone = ctx
        .store
        .find_message(id)
        .map(|m| deleted_by_id == m.author_id || ctx.guardian.can_modify(deleted_by_id, m));

    match keep_tombstone {
        Some(true) => {
            if let Some(local) = ctx.store.find_message_mut(id) {
                local.deleted_at = Some(Utc::now());
                local.deleted_by_id = Some(deleted_by_id);
            }
        }
        Some(false) => {
            ctx.store.remove_message(id);
        }
        None => {}
    }

    ctx.store.reconcile_last_read(id, fallback);
}
