//! End-to-end lifecycle: open a channel view, load history, receive pushes
//! while the reader is mid-scroll, paginate backwards, reconcile an
//! optimistic send, and tear the view down.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use cove_sync::traits::{
    DescriptorFetcher, Guardian, MessageFetcher, PushTransport, ScrollMetrics, SubscriptionHandle,
};
use cove_sync::{ChannelView, SyncConfig, ViewDeps};
use cove_types::api::{FetchDirection, MessagePage, MessageWire, PageMeta, PageRequest};
use cove_types::events::{Address, ChatEvent};
use cove_types::models::{Message, StagedId, ThreadDescriptor, UserId};

const ME: UserId = 1;
const OTHER: UserId = 2;
const CHANNEL: u64 = 7;

#[derive(Default)]
struct RecordingTransport {
    subscribed: AtomicUsize,
    unsubscribed: AtomicUsize,
}

#[async_trait]
impl PushTransport for RecordingTransport {
    async fn subscribe(
        &self,
        _address: &Address,
        _resume_from: Option<u64>,
    ) -> Result<SubscriptionHandle, cove_sync::BoxError> {
        self.subscribed.fetch_add(1, Ordering::SeqCst);
        Ok(SubscriptionHandle(1))
    }

    async fn unsubscribe(&self, _handle: SubscriptionHandle) -> Result<(), cove_sync::BoxError> {
        self.unsubscribed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Serves a two-page history: ids 3..=4 on the initial load, 1..=2 when
/// paging into the past.
struct PagedHistory {
    calls: Mutex<Vec<PageRequest>>,
}

#[async_trait]
impl MessageFetcher for PagedHistory {
    async fn fetch_page(
        &self,
        _address: &Address,
        request: PageRequest,
    ) -> Result<MessagePage, cove_sync::BoxError> {
        let page = match request.target_message_id {
            None => MessagePage {
                messages: vec![wire(3, 30), wire(4, 40)],
                meta: PageMeta {
                    can_load_more_past: true,
                    can_load_more_future: false,
                },
            },
            Some(3) => MessagePage {
                messages: vec![wire(1, 10), wire(2, 20)],
                meta: PageMeta {
                    can_load_more_past: false,
                    can_load_more_future: false,
                },
            },
            Some(other) => panic!("unexpected cursor {other}"),
        };
        self.calls.lock().unwrap().push(request);
        Ok(page)
    }
}

struct NoThreads;

#[async_trait]
impl DescriptorFetcher<ThreadDescriptor> for NoThreads {
    async fn fetch(&self, _id: u64) -> Result<Option<ThreadDescriptor>, cove_sync::BoxError> {
        Ok(None)
    }
}

struct NoStaff;

impl Guardian for NoStaff {
    fn can_modify(&self, _actor: UserId, _message: &Message) -> bool {
        false
    }
}

struct FakePane {
    content_height: f64,
    offset: f64,
    viewport: f64,
}

impl ScrollMetrics for FakePane {
    fn scroll_height(&self) -> f64 {
        self.content_height
    }

    fn scroll_offset(&self) -> f64 {
        self.offset
    }

    fn viewport_height(&self) -> f64 {
        self.viewport
    }

    fn set_scroll_offset(&mut self, offset: f64) {
        self.offset = offset;
    }
}

fn wire(id: u64, at_secs: i64) -> MessageWire {
    MessageWire {
        id,
        channel_id: CHANNEL,
        thread_id: None,
        author_id: OTHER,
        created_at: Utc.timestamp_opt(at_secs, 0).unwrap(),
        content: format!("message {id}"),
        cooked: format!("<p>message {id}</p>"),
        edited: false,
        pinned: false,
        uploads: Vec::new(),
        deleted_at: None,
        deleted_by_id: None,
    }
}

fn make_deps(transport: Arc<RecordingTransport>, fetcher: Arc<PagedHistory>) -> ViewDeps {
    ViewDeps {
        transport,
        fetcher,
        threads: Arc::new(NoThreads),
        guardian: Arc::new(NoStaff),
        desync: None,
    }
}

#[tokio::test]
async fn channel_view_full_lifecycle() {
    let transport = Arc::new(RecordingTransport::default());
    let fetcher = Arc::new(PagedHistory {
        calls: Mutex::new(Vec::new()),
    });
    let mut view = ChannelView::open(
        CHANNEL,
        ME,
        &SyncConfig::default(),
        make_deps(transport.clone(), fetcher.clone()),
        None,
    )
    .await
    .unwrap();

    // Initial load brings in the newest page.
    view.load_initial(None).await.unwrap();
    assert!(view.loader().fetched_once());
    assert!(view.loader().can_load_more_past());
    assert!(!view.loader().can_load_more_future());
    assert_eq!(view.store().len(), 2);

    // Reader scrolls up into history; a pushed message arrives below.
    let mut pane = FakePane {
        content_height: 1000.0,
        offset: 50.0,
        viewport: 300.0,
    };
    let added = view
        .handle_push(
            1,
            ChatEvent::Sent {
                staged_id: None,
                message: wire(5, 50),
            },
        )
        .await;
    assert_eq!(added, 1);
    view.viewport_mut()
        .handle_incoming(added as u32, false, &mut pane, |p| p.content_height += 60.0);
    // Viewport held still, pending indicator up.
    assert_eq!(pane.offset, 110.0);
    assert_eq!(view.viewport().pending_below(), 1);

    // Page back into older history; cursor is the oldest confirmed id.
    view.load_more(FetchDirection::Past).await.unwrap();
    assert_eq!(view.store().len(), 5);
    assert!(!view.loader().can_load_more_past());
    let ids: Vec<_> = view
        .store()
        .messages()
        .iter()
        .map(|m| m.id.unwrap())
        .collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);

    // Exhausted direction stops issuing fetches.
    view.load_more(FetchDirection::Past).await.unwrap();
    assert_eq!(fetcher.calls.lock().unwrap().len(), 2);

    // Optimistic send confirmed by the push stream, in place.
    let staged_id = view.stage_message("on my way", StagedId("s-9".into()));
    assert_eq!(view.store().len(), 6);
    view.handle_push(
        2,
        ChatEvent::Sent {
            staged_id: Some(staged_id.as_str().to_owned()),
            message: MessageWire {
                author_id: ME,
                cooked: "<p>on my way</p>".into(),
                ..wire(6, 60)
            },
        },
    )
    .await;
    assert_eq!(view.store().len(), 6);
    let confirmed = view.store().find_message(6).unwrap();
    assert!(!confirmed.staged);
    assert_eq!(confirmed.content, "on my way");

    // Reader jumps back to the anchor.
    view.viewport_mut().clear_pending();
    assert!(!view.viewport().has_pending());

    // Teardown: store detached, subscription released, late push dropped.
    view.close().await;
    assert_eq!(transport.unsubscribed.load(Ordering::SeqCst), 1);
    assert_eq!(
        view.handle_push(
            3,
            ChatEvent::Sent {
                staged_id: None,
                message: wire(9, 90)
            }
        )
        .await,
        0
    );
    assert!(view.store().is_empty());
}
