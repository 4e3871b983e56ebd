//! Client-side chat synchronization core.
//!
//! Keeps an in-memory view of one channel's or thread's message history
//! consistent with an authoritative push-delivered event stream, with
//! optimistic local sends, cursor-based pagination, and viewport-preserving
//! delivery. Rendering, transport, and capability policy are injected
//! collaborators (see [`traits`]).

pub mod cache;
pub mod config;
pub mod error;
pub mod pagination;
pub mod presence;
pub mod store;
pub mod subscription;
pub mod traits;
pub mod view;
pub mod viewport;

pub use cache::{ChannelCache, EntityCache, ThreadCache};
pub use config::SyncConfig;
pub use error::{BoxError, SyncError};
pub use pagination::PaginationLoader;
pub use presence::PresenceTracker;
pub use store::MessageStore;
pub use subscription::SubscriptionState;
pub use view::{ChannelView, ThreadView, ViewDeps};
pub use viewport::{ScrollDisposition, ViewportCoordinator};
