use std::time::Duration;

use serde::Deserialize;

/// Tunables injected into each view at construction.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Messages per history page.
    pub page_size: u32,
    /// Seconds without input activity before the reader counts as idle.
    pub idle_threshold_secs: u64,
    /// Distance from the end, in pixels, within which the reader still
    /// counts as anchored at the newest content.
    pub bottom_threshold_px: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: 50,
            idle_threshold_secs: 60,
            bottom_threshold_px: 32.0,
        }
    }
}

impl SyncConfig {
    pub fn idle_threshold(&self) -> Duration {
        Duration::from_secs(self.idle_threshold_secs)
    }
}
