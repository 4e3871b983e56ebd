use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced by the sync core. Push event handling never errors;
/// only the async collaborator calls (subscribe, fetch) can fail.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("fetch failed: {source}")]
    Fetch {
        #[source]
        source: BoxError,
    },

    #[error("subscribe failed for {address}: {source}")]
    Subscribe {
        address: String,
        #[source]
        source: BoxError,
    },

    #[error("view is closed")]
    ViewClosed,
}
