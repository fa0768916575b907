//! End-of-tick progress push onto the shared event bus.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use strand_core::{ProgressReporter, TorrentGateway};
use strand_events::{Event, EventBus, TorrentSnapshot};

/// `ProgressReporter` publishing one snapshot per live torrent. The push is
/// idempotent: subscribers always receive the full current picture.
pub struct EventProgressReporter {
    gateway: Arc<dyn TorrentGateway>,
    events: EventBus,
}

impl EventProgressReporter {
    /// Construct a reporter over the gateway and the shared bus.
    #[must_use]
    pub const fn new(gateway: Arc<dyn TorrentGateway>, events: EventBus) -> Self {
        Self { gateway, events }
    }
}

#[async_trait]
impl ProgressReporter for EventProgressReporter {
    async fn update(&self) -> Result<()> {
        let torrents = self.gateway.list().await?;
        let snapshots: Vec<TorrentSnapshot> = torrents
            .iter()
            .map(|torrent| {
                let totals = torrent.totals();
                TorrentSnapshot {
                    torrent_id: torrent.id,
                    name: torrent.name.clone(),
                    remote_status: torrent.remote_status_raw.clone(),
                    download_count: torrent.downloads.len(),
                    complete_count: totals.complete_count,
                    bytes_total: totals.bytes_total,
                    bytes_done: totals.bytes_done,
                    error: torrent.error.clone(),
                }
            })
            .collect();
        let _ = self.events.publish(Event::ProgressPushed { torrents: snapshots });
        Ok(())
    }
}
