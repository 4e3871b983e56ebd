use tracing::{debug, error, warn};

use cove_types::api::{FetchDirection, PageRequest};
use cove_types::events::Address;
use cove_types::models::Message;

use crate::error::SyncError;
use crate::store::MessageStore;
use crate::traits::MessageFetcher;

/// Cursor-based history loader for one scope.
///
/// `loading` is the sole concurrency guard: at most one fetch is in flight
/// per scope, and `load_more` in an exhausted direction is a no-op. The
/// generation counter discards results that resolve after the scope was
/// reset or torn down.
#[derive(Debug)]
pub struct PaginationLoader {
    loading: bool,
    can_load_more_past: bool,
    can_load_more_future: bool,
    fetched_once: bool,
    generation: u64,
    page_size: u32,
}

impl PaginationLoader {
    pub fn new(page_size: u32) -> Self {
        Self {
            loading: false,
            can_load_more_past: true,
            can_load_more_future: true,
            fetched_once: false,
            generation: 0,
            page_size,
        }
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn can_load_more_past(&self) -> bool {
        self.can_load_more_past
    }

    pub fn can_load_more_future(&self) -> bool {
        self.can_load_more_future
    }

    pub fn fetched_once(&self) -> bool {
        self.fetched_once
    }

    /// Invalidate any in-flight fetch and reset availability. Called on
    /// scope teardown or when a fresh load supersedes the current state.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.loading = false;
        self.can_load_more_past = true;
        self.can_load_more_future = true;
        self.fetched_once = false;
    }

    /// Full (re)initialization: reset, then fetch one page in the default
    /// most-recent direction (or around `target` when given).
    pub async fn load(
        &mut self,
        address: &Address,
        store: &mut MessageStore,
        fetcher: &dyn MessageFetcher,
        target: Option<u64>,
    ) -> Result<(), SyncError> {
        self.reset();
        let request = PageRequest {
            direction: FetchDirection::Past,
            page_size: self.page_size,
            target_message_id: target,
        };
        self.fetch_into(address, store, fetcher, request, true).await
    }

    /// Incremental fetch in one direction. Returns immediately when the
    /// direction is exhausted or a fetch is already in flight.
    pub async fn load_more(
        &mut self,
        direction: FetchDirection,
        address: &Address,
        store: &mut MessageStore,
        fetcher: &dyn MessageFetcher,
    ) -> Result<(), SyncError> {
        if self.loading {
            return Ok(());
        }
        let can_load = match direction {
            FetchDirection::Past => self.can_load_more_past,
            FetchDirection::Future => self.can_load_more_future,
        };
        if !can_load {
            return Ok(());
        }

        // Staged messages lack a server-ordered position and are never
        // valid cursors.
        let cursor = match direction {
            FetchDirection::Past => store.oldest_confirmed(),
            FetchDirection::Future => store.newest_confirmed(),
        };

        let request = PageRequest {
            direction,
            page_size: self.page_size,
            target_message_id: cursor,
        };
        self.fetch_into(address, store, fetcher, request, false).await
    }

    async fn fetch_into(
        &mut self,
        address: &Address,
        store: &mut MessageStore,
        fetcher: &dyn MessageFetcher,
        request: PageRequest,
        initial: bool,
    ) -> Result<(), SyncError> {
        let direction = request.direction;
        let generation = self.generation;
        self.loading = true;

        let result = fetcher.fetch_page(address, request).await;

        // The scope may have been reset while the fetch was in flight; a
        // completed fetch against a reset scope is discarded, not applied.
        if self.generation != generation {
            warn!(%address, "discarding stale page fetch");
            return Ok(());
        }
        self.loading = false;

        let page = result.map_err(|source| {
            error!(%address, ?direction, error = %source, "page fetch failed");
            SyncError::Fetch { source }
        })?;

        debug!(
            %address,
            ?direction,
            count = page.messages.len(),
            "page fetched"
        );

        let newest = page.messages.iter().map(|m| m.id).max();
        store.add_messages(page.messages.into_iter().map(Message::from));
        if let Some(newest) = newest {
            store.note_message(newest);
        }

        if initial {
            // Initial load learns both bounds from the response.
            self.can_load_more_past = page.meta.can_load_more_past;
            self.can_load_more_future = page.meta.can_load_more_future;
        } else {
            // Incremental loads update only their own direction.
            match direction {
                FetchDirection::Past => self.can_load_more_past = page.meta.can_load_more_past,
                FetchDirection::Future => {
                    self.can_load_more_future = page.meta.can_load_more_future;
                }
            }
        }
        self.fetched_once = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use cove_types::api::{MessagePage, MessageWire, PageMeta};

    use crate::error::BoxError;

    /// Scripted fetcher counting calls and replaying canned pages.
    #[derive(Default)]
    struct CountingFetcher {
        calls: AtomicUsize,
        pages: Mutex<Vec<MessagePage>>,
        fail: bool,
    }

    impl CountingFetcher {
        fn with_pages(pages: Vec<MessagePage>) -> Self {
            Self {
                pages: Mutex::new(pages),
                ..Default::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MessageFetcher for CountingFetcher {
        async fn fetch_page(
            &self,
            _address: &Address,
            _request: PageRequest,
        ) -> Result<MessagePage, BoxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err("boom".into());
            }
            let mut pages = self.pages.lock().unwrap();
            if pages.is_empty() {
                Ok(empty_page(false, false))
            } else {
                Ok(pages.remove(0))
            }
        }
    }

    fn wire(id: u64, at_secs: i64) -> MessageWire {
        MessageWire {
            id,
            channel_id: 1,
            thread_id: None,
            author_id: 9,
            created_at: Utc.timestamp_opt(at_secs, 0).unwrap(),
            content: String::new(),
            cooked: String::new(),
            edited: false,
            pinned: false,
            uploads: Vec::new(),
            deleted_at: None,
            deleted_by_id: None,
        }
    }

    fn page(ids: &[(u64, i64)], past: bool, future: bool) -> MessagePage {
        MessagePage {
            messages: ids.iter().map(|&(id, at)| wire(id, at)).collect(),
            meta: PageMeta {
                can_load_more_past: past,
                can_load_more_future: future,
            },
        }
    }

    fn empty_page(past: bool, future: bool) -> MessagePage {
        page(&[], past, future)
    }

    #[tokio::test]
    async fn initial_load_sets_flags_and_fetched_once() {
        let fetcher = CountingFetcher::with_pages(vec![page(&[(1, 10), (2, 20)], true, false)]);
        let mut loader = PaginationLoader::new(50);
        let mut store = MessageStore::new();

        loader
            .load(&Address::Channel(1), &mut store, &fetcher, None)
            .await
            .unwrap();

        assert!(loader.fetched_once());
        assert!(loader.can_load_more_past());
        assert!(!loader.can_load_more_future());
        assert_eq!(store.len(), 2);
        assert_eq!(store.last_message_id(), Some(2));
    }

    #[tokio::test]
    async fn exhausted_direction_is_a_no_op() {
        let fetcher = CountingFetcher::with_pages(vec![page(&[(1, 10)], false, false)]);
        let mut loader = PaginationLoader::new(50);
        let mut store = MessageStore::new();

        loader
            .load(&Address::Channel(1), &mut store, &fetcher, None)
            .await
            .unwrap();
        assert_eq!(fetcher.calls(), 1);

        loader
            .load_more(FetchDirection::Past, &Address::Channel(1), &mut store, &fetcher)
            .await
            .unwrap();
        // No further network fetch once the past is exhausted.
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn past_cursor_is_oldest_confirmed() {
        struct AssertCursor(AtomicUsize);

        #[async_trait]
        impl MessageFetcher for AssertCursor {
            async fn fetch_page(
                &self,
                _address: &Address,
                request: PageRequest,
            ) -> Result<MessagePage, BoxError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                assert_eq!(request.direction, FetchDirection::Past);
                assert_eq!(request.target_message_id, Some(3));
                Ok(MessagePage {
                    messages: vec![],
                    meta: PageMeta {
                        can_load_more_past: true,
                        can_load_more_future: false,
                    },
                })
            }
        }

        let fetcher = AssertCursor(AtomicUsize::new(0));
        let mut loader = PaginationLoader::new(50);
        let mut store = MessageStore::new();
        store.add_messages([
            Message::from(wire(3, 30)),
            Message::from(wire(7, 70)),
        ]);

        loader
            .load_more(FetchDirection::Past, &Address::Channel(1), &mut store, &fetcher)
            .await
            .unwrap();
        assert_eq!(fetcher.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fetch_failure_clears_loading_for_retry() {
        let fetcher = CountingFetcher {
            fail: true,
            ..Default::default()
        };
        let mut loader = PaginationLoader::new(50);
        let mut store = MessageStore::new();

        let err = loader
            .load(&Address::Channel(1), &mut store, &fetcher, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Fetch { .. }));
        assert!(!loader.loading());

        // Retry reaches the network again.
        let _ = loader
            .load(&Address::Channel(1), &mut store, &fetcher, None)
            .await;
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn in_flight_guard_suppresses_duplicate_requests() {
        let fetcher = CountingFetcher::default();
        let mut loader = PaginationLoader::new(50);
        loader.loading = true;
        let mut store = MessageStore::new();

        loader
            .load_more(FetchDirection::Past, &Address::Channel(1), &mut store, &fetcher)
            .await
            .unwrap();
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn duplicate_page_is_merged_not_duplicated() {
        let fetcher = CountingFetcher::with_pages(vec![
            page(&[(1, 10), (2, 20)], true, true),
            page(&[(1, 10), (2, 20)], false, true),
        ]);
        let mut loader = PaginationLoader::new(50);
        let mut store = MessageStore::new();
        let address = Address::Channel(1);

        loader.load(&address, &mut store, &fetcher, None).await.unwrap();
        loader
            .load_more(FetchDirection::Past, &address, &mut store, &fetcher)
            .await
            .unwrap();
        assert_eq!(store.len(), 2);
        assert!(!loader.can_load_more_past());
    }
}
