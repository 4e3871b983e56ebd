use std::collections::HashMap;

use tracing::debug;

use cove_types::models::{ChannelDescriptor, ThreadDescriptor, ThreadId};

use crate::error::SyncError;
use crate::traits::DescriptorFetcher;

/// A cache entry whose identity is stable for the cache's lifetime.
/// Subsequent fetches update the existing entry in place rather than
/// replacing it, so references handed out earlier stay valid.
pub trait CacheEntry {
    fn cache_id(&self) -> u64;
    /// Fold a freshly fetched copy into this entry.
    fn update_from(&mut self, fresh: Self);
}

impl CacheEntry for ThreadDescriptor {
    fn cache_id(&self) -> u64 {
        self.id
    }

    fn update_from(&mut self, fresh: Self) {
        self.title = fresh.title;
        self.reply_count = fresh.reply_count;
        self.pinned_count = fresh.pinned_count;
        self.preview = fresh.preview;
    }
}

impl CacheEntry for ChannelDescriptor {
    fn cache_id(&self) -> u64 {
        self.id
    }

    fn update_from(&mut self, fresh: Self) {
        self.title = fresh.title;
        self.last_message_id = fresh.last_message_id;
        self.membership_count = fresh.membership_count;
    }
}

/// Memoizes previously fetched descriptors for the lifetime of the view
/// process. Never evicts.
#[derive(Debug, Default)]
pub struct EntityCache<D> {
    entries: HashMap<u64, D>,
}

pub type ThreadCache = EntityCache<ThreadDescriptor>;
pub type ChannelCache = EntityCache<ChannelDescriptor>;

impl<D: CacheEntry> EntityCache<D> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn get(&self, id: u64) -> Option<&D> {
        self.entries.get(&id)
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut D> {
        self.entries.get_mut(&id)
    }

    /// Insert-if-absent; an existing entry is updated in place instead of
    /// being replaced.
    pub fn store(&mut self, descriptor: D) -> &mut D {
        let id = descriptor.cache_id();
        match self.entries.entry(id) {
            std::collections::hash_map::Entry::Occupied(occupied) => {
                let existing = occupied.into_mut();
                existing.update_from(descriptor);
                existing
            }
            std::collections::hash_map::Entry::Vacant(vacant) => vacant.insert(descriptor),
        }
    }

    /// Cached lookup with fetch-if-missing semantics. With
    /// `fetch_if_not_found` false, a miss resolves to `None` without
    /// touching the network.
    pub async fn find(
        &mut self,
        id: ThreadId,
        fetch_if_not_found: bool,
        fetcher: &dyn DescriptorFetcher<D>,
    ) -> Result<Option<&D>, SyncError> {
        if self.entries.contains_key(&id) {
            return Ok(self.entries.get(&id));
        }
        if !fetch_if_not_found {
            return Ok(None);
        }

        let fetched = fetcher
            .fetch(id)
            .await
            .map_err(|source| SyncError::Fetch { source })?;

        match fetched {
            Some(descriptor) => {
                debug!(id, "descriptor fetched and cached");
                Ok(Some(self.store(descriptor)))
            }
            None => Ok(None),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
