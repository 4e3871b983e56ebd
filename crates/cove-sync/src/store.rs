use cove_types::models::{Message, MessageId, StagedId};

/// Ordered, deduplicated collection of messages for exactly one scope
/// (one channel or one thread).
///
/// `add_messages` is the only insertion path; the collection is always
/// materialized ascending by `created_at` (confirmed id breaking ties) no
/// matter the insertion order, and adding a message twice is a no-op.
#[derive(Debug, Default)]
pub struct MessageStore {
    messages: Vec<Message>,
    last_message_id: Option<MessageId>,
    last_read_id: Option<MessageId>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only ordered view for rendering.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Merge a batch into the store. Confirmed messages deduplicate by id,
    /// staged messages by staged id. Returns how many were actually new.
    pub fn add_messages(&mut self, batch: impl IntoIterator<Item = Message>) -> usize {
        let mut added = 0;
        for message in batch {
            let duplicate = match (&message.id, &message.staged_id) {
                (Some(id), _) => self.find_message(*id).is_some(),
                (None, Some(staged_id)) => self.find_staged_message(staged_id).is_some(),
                // Neither identity: nothing to dedup against, refuse it.
                (None, None) => {
                    tracing::warn!("dropping message with no id and no staged id");
                    continue;
                }
            };
            if !duplicate {
                self.messages.push(message);
                added += 1;
            }
        }
        if added > 0 {
            self.resort();
        }
        added
    }

    /// Exact match by confirmed id. Absent means "not loaded locally",
    /// which callers treat as ignore, not as an error.
    pub fn find_message(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == Some(id))
    }

    pub fn find_message_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == Some(id))
    }

    /// Match by local staged correlation id only.
    pub fn find_staged_message(&self, staged_id: &StagedId) -> Option<&Message> {
        self.messages
            .iter()
            .find(|m| m.staged && m.staged_id.as_ref() == Some(staged_id))
    }

    pub fn find_staged_message_mut(&mut self, staged_id: &StagedId) -> Option<&mut Message> {
        self.messages
            .iter_mut()
            .find(|m| m.staged && m.staged_id.as_ref() == Some(staged_id))
    }

    /// Detach a message entirely (e.g. hard removal for viewers without
    /// delete visibility).
    pub fn remove_message(&mut self, id: MessageId) -> Option<Message> {
        let idx = self.messages.iter().position(|m| m.id == Some(id))?;
        Some(self.messages.remove(idx))
    }

    /// Detach a staged message the user chose to discard after a failed
    /// send.
    pub fn remove_staged(&mut self, staged_id: &StagedId) -> Option<Message> {
        let idx = self
            .messages
            .iter()
            .position(|m| m.staged && m.staged_id.as_ref() == Some(staged_id))?;
        Some(self.messages.remove(idx))
    }

    /// Detach everything and reset the read pointers. Used on scope
    /// teardown.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.last_message_id = None;
        self.last_read_id = None;
    }

    /// Oldest confirmed message id — the PAST pagination cursor. Staged
    /// messages have no server-ordered position and are never cursors.
    pub fn oldest_confirmed(&self) -> Option<MessageId> {
        self.messages.iter().find(|m| !m.staged).and_then(|m| m.id)
    }

    /// Newest confirmed message id — the FUTURE pagination cursor.
    pub fn newest_confirmed(&self) -> Option<MessageId> {
        self.messages
            .iter()
            .rev()
            .find(|m| !m.staged)
            .and_then(|m| m.id)
    }

    pub fn last_message_id(&self) -> Option<MessageId> {
        self.last_message_id
    }

    /// Advance the "most recent message" pointer, never backwards.
    pub fn note_message(&mut self, id: MessageId) {
        if self.last_message_id.is_none_or(|last| id > last) {
            self.last_message_id = Some(id);
        }
    }

    pub fn last_read_id(&self) -> Option<MessageId> {
        self.last_read_id
    }

    pub fn set_last_read(&mut self, id: MessageId) {
        self.last_read_id = Some(id);
    }

    /// If the read pointer referenced a now-deleted message, move it to
    /// the server-supplied fallback.
    pub fn reconcile_last_read(&mut self, deleted: MessageId, fallback: Option<MessageId>) {
        if self.last_read_id == Some(deleted) {
            self.last_read_id = fallback;
        }
    }

    /// Restore the sort invariant after in-place mutation of `created_at`
    /// (staged reconciliation adopts the server timestamp).
    pub(crate) fn resort(&mut self) {
        self.messages
            .sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    }
}
