//! Collaborator seams. The sync core consumes these; it never implements
//! transport, policy, or DOM measurement itself.

use async_trait::async_trait;

use cove_types::api::{MessagePage, PageRequest};
use cove_types::events::Address;
use cove_types::models::{Message, ThreadId, UserId};

use crate::error::BoxError;

/// Opaque handle returned by the push transport for one live subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionHandle(pub u64);

/// Push subscription primitive. Delivery is FIFO per address; the embedder
/// pumps `(sequence, event)` pairs into the owning view's `handle_push`.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Subscribe to one address, optionally resuming from the last applied
    /// sequence number so already-seen events are not re-delivered.
    async fn subscribe(
        &self,
        address: &Address,
        resume_from: Option<u64>,
    ) -> Result<SubscriptionHandle, BoxError>;

    async fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<(), BoxError>;
}

/// Request/response primitive for historical message pages.
#[async_trait]
pub trait MessageFetcher: Send + Sync {
    async fn fetch_page(
        &self,
        address: &Address,
        request: PageRequest,
    ) -> Result<MessagePage, BoxError>;
}

/// Fetch primitive for descriptor cache population. `Ok(None)` means the
/// entity does not exist (or is not visible), which is cached as absent by
/// not caching at all.
#[async_trait]
pub trait DescriptorFetcher<D>: Send + Sync {
    async fn fetch(&self, id: ThreadId) -> Result<Option<D>, BoxError>;
}

/// Capability policy collaborator. Decides whether a deleting actor's
/// delete leaves a tombstone visible to this client.
pub trait Guardian: Send + Sync {
    fn can_modify(&self, actor: UserId, message: &Message) -> bool;
}

/// DOM measurement primitive for the viewport coordinator.
pub trait ScrollMetrics {
    /// Total scrollable content height, in pixels.
    fn scroll_height(&self) -> f64;
    /// Current scroll offset from the top, in pixels.
    fn scroll_offset(&self) -> f64;
    /// Height of the visible viewport, in pixels.
    fn viewport_height(&self) -> f64;
    fn set_scroll_offset(&mut self, offset: f64);
}

/// Diagnostics collaborator notified on sequence gaps.
pub trait DesyncReporter: Send + Sync {
    fn desync(&self, address: &Address, expected: u64, got: u64);
}
