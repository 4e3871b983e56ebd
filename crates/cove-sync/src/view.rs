//! Per-view session objects. A `ChannelView` or `ThreadView` is created
//! when the scope is opened, owns all of that scope's sync state, and is
//! closed on teardown — after which push deliveries and resolving fetches
//! are ignored.

use std::sync::Arc;

use tracing::{debug, warn};

use cove_types::api::FetchDirection;
use cove_types::events::{Address, ChatEvent};
use cove_types::models::{
    ChannelId, Message, MessageId, StagedId, ThreadDescriptor, ThreadId, UserId,
};

use crate::cache::ThreadCache;
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::pagination::PaginationLoader;
use crate::presence::PresenceTracker;
use crate::store::MessageStore;
use crate::subscription::{ScopeContext, SubscriptionState, apply_common};
use crate::traits::{
    DescriptorFetcher, DesyncReporter, Guardian, MessageFetcher, PushTransport, SubscriptionHandle,
};
use crate::viewport::ViewportCoordinator;

/// External collaborators injected into every view.
#[derive(Clone)]
pub struct ViewDeps {
    pub transport: Arc<dyn PushTransport>,
    pub fetcher: Arc<dyn MessageFetcher>,
    pub threads: Arc<dyn DescriptorFetcher<ThreadDescriptor>>,
    pub guardian: Arc<dyn Guardian>,
    pub desync: Option<Arc<dyn DesyncReporter>>,
}

/// State and behavior common to both scope kinds. Channel and thread views
/// layer their scoped event handling on top instead of subclassing.
struct ScopeCore {
    current_user: UserId,
    deps: ViewDeps,
    store: MessageStore,
    loader: PaginationLoader,
    subscription: SubscriptionState,
    viewport: ViewportCoordinator,
    presence: PresenceTracker,
    handle: Option<SubscriptionHandle>,
    closed: bool,
}

impl ScopeCore {
    async fn open(
        address: Address,
        current_user: UserId,
        config: &SyncConfig,
        deps: ViewDeps,
        resume_from: Option<u64>,
    ) -> Result<Self, SyncError> {
        let handle = deps
            .transport
            .subscribe(&address, resume_from)
            .await
            .map_err(|source| SyncError::Subscribe {
                address: address.to_string(),
                source,
            })?;
        debug!(%address, ?resume_from, "subscribed");

        Ok(Self {
            current_user,
            deps,
            store: MessageStore::new(),
            loader: PaginationLoader::new(config.page_size),
            subscription: SubscriptionState::new(address, resume_from),
            viewport: ViewportCoordinator::new(config.bottom_threshold_px),
            presence: PresenceTracker::new(config.idle_threshold()),
            handle: Some(handle),
            closed: false,
        })
    }

    /// Gap check for an incoming envelope. Returns false when the view is
    /// closed and the delivery must be dropped.
    fn begin_push(&mut self, sequence: u64) -> bool {
        if self.closed {
            return false;
        }
        self.subscription
            .check_gap(sequence, self.deps.desync.as_deref());
        true
    }

    fn apply_shared(&mut self, event: ChatEvent) -> Option<ChatEvent> {
        let mut ctx = ScopeContext {
            store: &mut self.store,
            current_user: self.current_user,
            guardian: self.deps.guardian.as_ref(),
        };
        apply_common(&mut ctx, event)
    }

    fn finish_push(&mut self, sequence: u64) {
        self.subscription.commit(sequence);
    }

    async fn load_initial(
        &mut self,
        address: &Address,
        target: Option<MessageId>,
    ) -> Result<(), SyncError> {
        if self.closed {
            return Err(SyncError::ViewClosed);
        }
        self.loader
            .load(address, &mut self.store, self.deps.fetcher.as_ref(), target)
            .await
    }

    async fn load_more(
        &mut self,
        address: &Address,
        direction: FetchDirection,
    ) -> Result<(), SyncError> {
        if self.closed {
            return Err(SyncError::ViewClosed);
        }
        self.loader
            .load_more(direction, address, &mut self.store, self.deps.fetcher.as_ref())
            .await
    }

    fn stage(&mut self, message: Message) -> StagedId {
        let staged_id = message
            .staged_id
            .clone()
            .unwrap_or_else(StagedId::generate);
        self.store.add_messages([message]);
        staged_id
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        // Invalidate in-flight fetches before detaching state.
        self.loader.reset();
        self.store.clear();
        if let Some(handle) = self.handle.take()
            && let Err(err) = self.deps.transport.unsubscribe(handle).await
        {
            warn!(address = %self.subscription.address(), error = %err, "unsubscribe failed");
        }
        debug!(address = %self.subscription.address(), "view closed");
    }
}

/// Synchronized view of one channel's message history.
pub struct ChannelView {
    channel_id: ChannelId,
    core: ScopeCore,
    threads: ThreadCache,
}

impl ChannelView {
    /// Open the channel scope: subscribe to its push address, optionally
    /// resuming from a previously applied sequence number.
    pub async fn open(
        channel_id: ChannelId,
        current_user: UserId,
        config: &SyncConfig,
        deps: ViewDeps,
        resume_from: Option<u64>,
    ) -> Result<Self, SyncError> {
        let core = ScopeCore::open(
            Address::Channel(channel_id),
            current_user,
            config,
            deps,
            resume_from,
        )
        .await?;
        Ok(Self {
            channel_id,
            core,
            threads: ThreadCache::new(),
        })
    }

    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    /// Apply one pushed envelope. Closed views drop deliveries silently.
    /// Returns how many messages the envelope added locally, for viewport
    /// accounting.
    pub async fn handle_push(&mut self, sequence: u64, event: ChatEvent) -> usize {
        if !self.core.begin_push(sequence) {
            return 0;
        }
        let before = self.core.store.len();

        if let Some(event) = self.core.apply_shared(event) {
            match event {
                ChatEvent::ThreadCreated {
                    thread_id,
                    original_message_id,
                } => {
                    self.attach_thread(thread_id, original_message_id).await;
                }
                // Thread-scoped and unknown kinds do not apply at channel
                // scope; the sequence number still advances below.
                other => debug!(?other, "ignored at channel scope"),
            }
        }

        self.core.finish_push(sequence);
        self.core.store.len().saturating_sub(before)
    }

    /// Resolve the thread (fetch-if-missing) and attach it to its
    /// originating message if that message is loaded locally.
    async fn attach_thread(&mut self, thread_id: ThreadId, original_message_id: MessageId) {
        let resolved = self
            .threads
            .find(thread_id, true, self.core.deps.threads.as_ref())
            .await;
        let thread_id = match resolved {
            Ok(Some(descriptor)) => descriptor.id,
            Ok(None) => return,
            Err(err) => {
                warn!(thread_id, error = %err, "thread resolution failed");
                return;
            }
        };
        // The message may have been unloaded while the fetch was in
        // flight; absent is a no-op.
        if let Some(message) = self.core.store.find_message_mut(original_message_id) {
            message.thread = Some(thread_id);
        }
    }

    /// Initial (or fresh) history load around the newest content, or
    /// around `target` when jumping to a specific message.
    pub async fn load_initial(&mut self, target: Option<MessageId>) -> Result<(), SyncError> {
        let address = Address::Channel(self.channel_id);
        self.core.load_initial(&address, target).await
    }

    pub async fn load_more(&mut self, direction: FetchDirection) -> Result<(), SyncError> {
        let address = Address::Channel(self.channel_id);
        self.core.load_more(&address, direction).await
    }

    /// Optimistic send: insert a staged message immediately. The returned
    /// staged id is the handle the UI keeps to show in-progress or error
    /// state; the confirming `sent` event reconciles it in place.
    pub fn stage_message(&mut self, content: &str, staged_id: StagedId) -> StagedId {
        let message = Message::staged(
            staged_id,
            self.channel_id,
            None,
            self.core.current_user,
            content,
        );
        self.core.stage(message)
    }

    /// Server rejected the staged create: mark it errored in place so the
    /// user can retry or discard.
    pub fn mark_send_failed(&mut self, staged_id: &StagedId, reason: &str) {
        if let Some(message) = self.core.store.find_staged_message_mut(staged_id) {
            message.send_error = Some(reason.to_owned());
        }
    }

    /// Drop an errored staged message the user chose to discard.
    pub fn discard_staged(&mut self, staged_id: &StagedId) -> Option<Message> {
        self.core.store.remove_staged(staged_id)
    }

    /// Teardown: unsubscribe, detach all messages, discard in-flight
    /// fetch results. Subsequent pushes are no-ops.
    pub async fn close(&mut self) {
        self.core.close().await;
    }

    pub fn is_closed(&self) -> bool {
        self.core.closed
    }

    // -- Read surface for the UI layer --

    pub fn store(&self) -> &MessageStore {
        &self.core.store
    }

    pub fn loader(&self) -> &PaginationLoader {
        &self.core.loader
    }

    pub fn viewport(&self) -> &ViewportCoordinator {
        &self.core.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut ViewportCoordinator {
        &mut self.core.viewport
    }

    pub fn presence_mut(&mut self) -> &mut PresenceTracker {
        &mut self.core.presence
    }

    pub fn thread_cache(&self) -> &ThreadCache {
        &self.threads
    }

    pub fn desync_count(&self) -> u32 {
        self.core.subscription.desync_count()
    }

    /// Sequence token to hand back to `open` when this channel is next
    /// visited, so re-subscription resumes instead of replaying.
    pub fn resume_token(&self) -> Option<u64> {
        self.core.subscription.resume_token()
    }
}

/// Synchronized view of one thread's replies.
pub struct ThreadView {
    channel_id: ChannelId,
    thread_id: ThreadId,
    descriptor: ThreadDescriptor,
    core: ScopeCore,
}

impl ThreadView {
    pub async fn open(
        descriptor: ThreadDescriptor,
        current_user: UserId,
        config: &SyncConfig,
        deps: ViewDeps,
        resume_from: Option<u64>,
    ) -> Result<Self, SyncError> {
        let address = Address::Thread(descriptor.channel_id, descriptor.id);
        let core = ScopeCore::open(address, current_user, config, deps, resume_from).await?;
        Ok(Self {
            channel_id: descriptor.channel_id,
            thread_id: descriptor.id,
            descriptor,
            core,
        })
    }

    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    pub fn descriptor(&self) -> &ThreadDescriptor {
        &self.descriptor
    }

    /// Apply one pushed envelope, including the thread-scoped kinds.
    pub async fn handle_push(&mut self, sequence: u64, event: ChatEvent) -> usize {
        if !self.core.begin_push(sequence) {
            return 0;
        }
        let before = self.core.store.len();

        if let Some(event) = self.core.apply_shared(event) {
            match event {
                ChatEvent::UpdateThreadOriginalMessage { message } => {
                    self.descriptor.preview = Some(excerpt(&message.content));
                    if let Some(local) = self.core.store.find_message_mut(message.id) {
                        local.content = message.content;
                        local.cooked = message.cooked;
                        local.edited = message.edited;
                    }
                }
                ChatEvent::Pin { id } => {
                    if let Some(local) = self.core.store.find_message_mut(id)
                        && !local.pinned
                    {
                        local.pinned = true;
                        self.descriptor.pinned_count += 1;
                    }
                }
                ChatEvent::Unpin { id } => {
                    if let Some(local) = self.core.store.find_message_mut(id)
                        && local.pinned
                    {
                        local.pinned = false;
                        self.descriptor.pinned_count =
                            self.descriptor.pinned_count.saturating_sub(1);
                    }
                }
                other => debug!(?other, "ignored at thread scope"),
            }
        }

        self.core.finish_push(sequence);
        let after = self.core.store.len();
        // Keep the descriptor's reply count in step with pushed inserts
        // and hard-detach deletes.
        if after >= before {
            self.descriptor.reply_count += (after - before) as u32;
        } else {
            self.descriptor.reply_count = self
                .descriptor
                .reply_count
                .saturating_sub((before - after) as u32);
        }
        after.saturating_sub(before)
    }

    pub async fn load_initial(&mut self, target: Option<MessageId>) -> Result<(), SyncError> {
        let address = Address::Thread(self.channel_id, self.thread_id);
        self.core.load_initial(&address, target).await
    }

    pub async fn load_more(&mut self, direction: FetchDirection) -> Result<(), SyncError> {
        let address = Address::Thread(self.channel_id, self.thread_id);
        self.core.load_more(&address, direction).await
    }

    pub fn stage_message(&mut self, content: &str, staged_id: StagedId) -> StagedId {
        let message = Message::staged(
            staged_id,
            self.channel_id,
            Some(self.thread_id),
            self.core.current_user,
            content,
        );
        self.core.stage(message)
    }

    pub fn mark_send_failed(&mut self, staged_id: &StagedId, reason: &str) {
        if let Some(message) = self.core.store.find_staged_message_mut(staged_id) {
            message.send_error = Some(reason.to_owned());
        }
    }

    pub async fn close(&mut self) {
        self.core.close().await;
    }

    pub fn is_closed(&self) -> bool {
        self.core.closed
    }

    pub fn store(&self) -> &MessageStore {
        &self.core.store
    }

    pub fn loader(&self) -> &PaginationLoader {
        &self.core.loader
    }

    pub fn viewport(&self) -> &ViewportCoordinator {
        &self.core.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut ViewportCoordinator {
        &mut self.core.viewport
    }

    pub fn presence_mut(&mut self) -> &mut PresenceTracker {
        &mut self.core.presence
    }

    pub fn desync_count(&self) -> u32 {
        self.core.subscription.desync_count()
    }

    pub fn resume_token(&self) -> Option<u64> {
        self.core.subscription.resume_token()
    }
}

/// Short single-line excerpt for thread previews.
fn excerpt(content: &str) -> String {
    const MAX: usize = 100;
    let line = content.lines().next().unwrap_or_default();
    if line.chars().count() <= MAX {
        line.to_owned()
    } else {
        let cut: String = line.chars().take(MAX).collect();
        format!("{cut}…")
    }
}
