use tracing::debug;

use crate::traits::ScrollMetrics;

/// How an incoming batch was rendered relative to the reader's scroll
/// position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScrollDisposition {
    /// Reader was at the newest content; the view followed the batch.
    Anchored,
    /// Reader was mid-history; the viewport was held still by offsetting
    /// the height the batch introduced.
    Preserved { height_delta: f64 },
}

/// Decides auto-scroll vs viewport preservation for incoming batches and
/// tracks the "new content below" indicator for one scope.
///
/// The pending count is authoritative; the boolean indicator is derived
/// from it.
#[derive(Debug)]
pub struct ViewportCoordinator {
    pending_below: u32,
    bottom_threshold_px: f64,
}

impl ViewportCoordinator {
    pub fn new(bottom_threshold_px: f64) -> Self {
        Self {
            pending_below: 0,
            bottom_threshold_px,
        }
    }

    /// Count of messages delivered below the reader's viewport since they
    /// last sat at the anchor.
    pub fn pending_below(&self) -> u32 {
        self.pending_below
    }

    /// Derived indicator for the "jump to new messages" affordance.
    pub fn has_pending(&self) -> bool {
        self.pending_below > 0
    }

    /// True when the reader counts as anchored at the newest content: no
    /// further future page to load and the scroll position within the
    /// bottom threshold of the end.
    pub fn at_anchor<M>(&self, pane: &M, can_load_more_future: bool) -> bool
    where
        M: ScrollMetrics + ?Sized,
    {
        if can_load_more_future {
            return false;
        }
        let distance_from_end =
            pane.scroll_height() - (pane.scroll_offset() + pane.viewport_height());
        distance_from_end <= self.bottom_threshold_px
    }

    /// Render an incoming batch of `count` new messages.
    ///
    /// `apply` performs the actual content mutation (store insert plus the
    /// pane's content update); measurements are taken around it so the
    /// height it introduces can be computed. Anchored readers follow the
    /// new content; everyone else keeps their viewport still and the
    /// pending count grows by the batch size.
    pub fn handle_incoming<M, F>(
        &mut self,
        count: u32,
        can_load_more_future: bool,
        pane: &mut M,
        apply: F,
    ) -> ScrollDisposition
    where
        M: ScrollMetrics + ?Sized,
        F: FnOnce(&mut M),
    {
        if self.at_anchor(pane, can_load_more_future) {
            apply(pane);
            let end = pane.scroll_height() - pane.viewport_height();
            pane.set_scroll_offset(end.max(0.0));
            return ScrollDisposition::Anchored;
        }

        let height_before = pane.scroll_height();
        let offset_before = pane.scroll_offset();
        apply(pane);
        let height_delta = pane.scroll_height() - height_before;
        pane.set_scroll_offset(offset_before + height_delta);

        self.pending_below = self.pending_below.saturating_add(count);
        debug!(count, pending = self.pending_below, "viewport preserved");
        ScrollDisposition::Preserved { height_delta }
    }

    /// Cleared only when the reader explicitly returns to the anchor
    /// (scroll to bottom, indicator dismissed) — never merely because new
    /// content stopped arriving.
    pub fn clear_pending(&mut self) {
        self.pending_below = 0;
    }
}
