#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::multiple_crate_versions)]

//! Event bus for the Strand engine.
//!
//! One mutex-guarded ring assigns sequential ids and keeps the most recent
//! events for replay; live delivery rides a `tokio::broadcast` channel. The
//! two are reconciled on the subscriber side: a consumer that falls behind
//! the channel is back-filled from the ring instead of silently skipping
//! ahead, so every subscriber observes an in-order, duplicate-free sequence
//! bounded only by the ring's capacity.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Identifier assigned to each event emitted by the platform.
pub type EventId = u64;

/// Events kept for replay when no capacity is given.
const DEFAULT_RING_CAPACITY: usize = 1_024;

/// Typed domain events surfaced across the system.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A torrent was submitted to the debrid provider and registered locally.
    TorrentQueued {
        /// Identifier of the torrent that was registered.
        torrent_id: Uuid,
        /// Display name taken from the submitted magnet or metainfo.
        name: String,
    },
    /// File selection was confirmed against the debrid provider.
    FilesSelected {
        /// Identifier of the torrent whose files were selected.
        torrent_id: Uuid,
    },
    /// Download rows were created for a cloud-finished torrent.
    DownloadsCreated {
        /// Identifier of the parent torrent.
        torrent_id: Uuid,
        /// Number of download rows produced.
        count: usize,
    },
    /// A download worker started transferring a file.
    DownloadStarted {
        /// Identifier of the download that started.
        download_id: Uuid,
        /// Identifier of the parent torrent.
        torrent_id: Uuid,
    },
    /// A download worker finished its transfer cleanly.
    DownloadFinished {
        /// Identifier of the download that finished.
        download_id: Uuid,
        /// Identifier of the parent torrent.
        torrent_id: Uuid,
    },
    /// A download reached a terminal error.
    DownloadFailed {
        /// Identifier of the download that failed.
        download_id: Uuid,
        /// Identifier of the parent torrent.
        torrent_id: Uuid,
        /// Human-readable failure detail.
        message: String,
    },
    /// A torrent reached its terminal state.
    TorrentCompleted {
        /// Identifier of the completed torrent.
        torrent_id: Uuid,
        /// Error recorded when the torrent failed; `None` on success.
        error: Option<String>,
    },
    /// A torrent was deleted by a retention policy or finish action.
    TorrentDeleted {
        /// Identifier of the deleted torrent.
        torrent_id: Uuid,
    },
    /// End-of-tick progress push carrying a snapshot per live torrent.
    ProgressPushed {
        /// Snapshots for every torrent known at the end of the tick.
        torrents: Vec<TorrentSnapshot>,
    },
}

impl Event {
    /// Machine-friendly discriminator for downstream consumers.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::TorrentQueued { .. } => "torrent_queued",
            Self::FilesSelected { .. } => "files_selected",
            Self::DownloadsCreated { .. } => "downloads_created",
            Self::DownloadStarted { .. } => "download_started",
            Self::DownloadFinished { .. } => "download_finished",
            Self::DownloadFailed { .. } => "download_failed",
            Self::TorrentCompleted { .. } => "torrent_completed",
            Self::TorrentDeleted { .. } => "torrent_deleted",
            Self::ProgressPushed { .. } => "progress_pushed",
        }
    }
}

/// Per-torrent progress snapshot carried by [`Event::ProgressPushed`].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct TorrentSnapshot {
    /// Identifier of the torrent.
    pub torrent_id: Uuid,
    /// Display name of the torrent.
    pub name: String,
    /// Raw status string reported by the debrid provider.
    pub remote_status: String,
    /// Number of child downloads.
    pub download_count: usize,
    /// Number of child downloads that reached their terminal state.
    pub complete_count: usize,
    /// Aggregate bytes expected across all child downloads.
    pub bytes_total: u64,
    /// Aggregate bytes transferred across all child downloads.
    pub bytes_done: u64,
    /// Error recorded on the torrent, if any.
    pub error: Option<String>,
}

/// An event together with its id and emission timestamp.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct EventEnvelope {
    /// Sequential identifier assigned by the bus.
    pub id: EventId,
    /// When the event was published.
    pub timestamp: DateTime<Utc>,
    /// The event payload.
    pub event: Event,
}

/// Bounded history of published events. Owns id assignment so the ring and
/// the broadcast channel can never disagree about ordering.
struct ReplayRing {
    entries: VecDeque<EventEnvelope>,
    next_id: EventId,
    capacity: usize,
}

impl ReplayRing {
    fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            next_id: 1,
            capacity,
        }
    }

    fn record(&mut self, event: Event) -> EventEnvelope {
        let envelope = EventEnvelope {
            id: self.next_id,
            timestamp: Utc::now(),
            event,
        };
        self.next_id += 1;
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(envelope.clone());
        envelope
    }

    fn since(&self, after: EventId) -> VecDeque<EventEnvelope> {
        self.entries
            .iter()
            .filter(|envelope| envelope.id > after)
            .cloned()
            .collect()
    }

    fn last_id(&self) -> Option<EventId> {
        self.entries.back().map(|envelope| envelope.id)
    }
}

/// Shared event bus.
#[derive(Clone)]
pub struct EventBus {
    ring: Arc<Mutex<ReplayRing>>,
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Construct a bus whose ring and broadcast channel both hold
    /// `capacity` events.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "event bus capacity must be positive");
        let (sender, _) = broadcast::channel(capacity);
        Self {
            ring: Arc::new(Mutex::new(ReplayRing::new(capacity))),
            sender,
        }
    }

    /// Construct a bus with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_RING_CAPACITY)
    }

    /// Publish an event, returning its assigned identifier. Delivery never
    /// blocks: subscribers that cannot keep up recover through the ring.
    #[must_use]
    pub fn publish(&self, event: Event) -> EventId {
        let envelope = lock_ring(&self.ring).record(event);
        let id = envelope.id;
        let _ = self.sender.send(envelope);
        id
    }

    /// Open a subscription. With `after`, ring entries newer than that id
    /// are replayed before live events; without it, only events published
    /// from now on are delivered.
    #[must_use]
    pub fn subscribe(&self, after: Option<EventId>) -> Subscription {
        let receiver = self.sender.subscribe();
        let (backlog, cursor) = {
            let ring = lock_ring(&self.ring);
            after.map_or_else(
                || (VecDeque::new(), ring.last_id().unwrap_or(0)),
                |after| (ring.since(after), after),
            )
        };
        Subscription {
            ring: Arc::clone(&self.ring),
            receiver,
            backlog,
            cursor,
        }
    }

    /// Ring entries newer than the given id, for polling consumers that do
    /// not hold a subscription.
    #[must_use]
    pub fn replay_since(&self, after: EventId) -> Vec<EventEnvelope> {
        lock_ring(&self.ring).since(after).into()
    }

    /// Identifier of the most recently published event, if any.
    #[must_use]
    pub fn last_event_id(&self) -> Option<EventId> {
        lock_ring(&self.ring).last_id()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

fn lock_ring(ring: &Mutex<ReplayRing>) -> MutexGuard<'_, ReplayRing> {
    // A panic while holding the ring lock leaves the ring itself intact, so
    // the poisoned guard is safe to reuse.
    ring.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One consumer's ordered view of the bus.
pub struct Subscription {
    ring: Arc<Mutex<ReplayRing>>,
    receiver: broadcast::Receiver<EventEnvelope>,
    backlog: VecDeque<EventEnvelope>,
    cursor: EventId,
}

impl Subscription {
    /// Receive the next event: replayed backlog first, then live delivery.
    /// Falling behind the channel back-fills the backlog from the ring, and
    /// anything already replayed is dropped on arrival, so the yielded
    /// sequence is in-order and duplicate-free. Returns `None` once the bus
    /// is gone and everything buffered has been drained.
    pub async fn next(&mut self) -> Option<EventEnvelope> {
        loop {
            if let Some(envelope) = self.backlog.pop_front() {
                self.cursor = envelope.id;
                return Some(envelope);
            }

            match self.receiver.recv().await {
                Ok(envelope) => {
                    if envelope.id <= self.cursor {
                        continue;
                    }
                    self.cursor = envelope.id;
                    return Some(envelope);
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    self.backlog = lock_ring(&self.ring).since(self.cursor);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    const RECV_TIMEOUT: Duration = Duration::from_secs(1);

    fn sample_snapshot(id: u128) -> TorrentSnapshot {
        TorrentSnapshot {
            torrent_id: Uuid::from_u128(id),
            name: format!("torrent-{id}"),
            remote_status: "downloading".to_string(),
            download_count: 2,
            complete_count: 1,
            bytes_total: 2_048,
            bytes_done: 1_024,
            error: None,
        }
    }

    fn deleted(id: u128) -> Event {
        Event::TorrentDeleted {
            torrent_id: Uuid::from_u128(id),
        }
    }

    #[test]
    fn event_kinds_cover_all_variants() {
        let torrent_id = Uuid::new_v4();
        let download_id = Uuid::new_v4();
        let events = [
            Event::TorrentQueued {
                torrent_id,
                name: "demo".to_string(),
            },
            Event::FilesSelected { torrent_id },
            Event::DownloadsCreated {
                torrent_id,
                count: 3,
            },
            Event::DownloadStarted {
                download_id,
                torrent_id,
            },
            Event::DownloadFinished {
                download_id,
                torrent_id,
            },
            Event::DownloadFailed {
                download_id,
                torrent_id,
                message: "boom".to_string(),
            },
            Event::TorrentCompleted {
                torrent_id,
                error: None,
            },
            Event::TorrentDeleted { torrent_id },
            Event::ProgressPushed {
                torrents: vec![sample_snapshot(1)],
            },
        ];

        let expected = [
            "torrent_queued",
            "files_selected",
            "downloads_created",
            "download_started",
            "download_finished",
            "download_failed",
            "torrent_completed",
            "torrent_deleted",
            "progress_pushed",
        ];
        for (event, kind) in events.iter().zip(expected) {
            assert_eq!(event.kind(), kind);
        }
    }

    #[test]
    fn snapshot_serialises_round_trip() {
        let snapshot = sample_snapshot(7);
        let json = serde_json::to_string(&Event::ProgressPushed {
            torrents: vec![snapshot.clone()],
        })
        .expect("serialise");
        let back: Event = serde_json::from_str(&json).expect("deserialise");
        match back {
            Event::ProgressPushed { torrents } => assert_eq!(torrents, vec![snapshot]),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn ids_are_sequential_and_replayed_from_the_ring() {
        let bus = EventBus::with_capacity(16);

        let mut last_id = 0;
        for i in 0..5 {
            last_id = bus.publish(deleted(i));
        }
        assert_eq!(last_id, 5);

        let mut subscription = bus.subscribe(Some(2));
        for expected_id in 3..=5 {
            let envelope = timeout(RECV_TIMEOUT, subscription.next())
                .await
                .expect("subscription stalled")
                .expect("subscription closed");
            assert_eq!(envelope.id, expected_id);
        }
    }

    #[tokio::test]
    async fn ring_drops_oldest_when_full() {
        let bus = EventBus::with_capacity(2);
        for i in 0..4 {
            let _ = bus.publish(deleted(i));
        }
        let replayed = bus.replay_since(0);
        assert_eq!(replayed.len(), 2, "ring keeps only the newest two");
        assert_eq!(replayed[0].id, 3);
        assert_eq!(replayed[1].id, 4);
    }

    #[tokio::test]
    async fn last_event_id_reflects_recent_publish() {
        let bus = EventBus::with_capacity(2);
        assert!(bus.last_event_id().is_none(), "no events published yet");
        let published = bus.publish(deleted(0));
        assert_eq!(bus.last_event_id(), Some(published));
    }

    #[tokio::test]
    async fn subscribe_without_cursor_sees_only_live_events() {
        let bus = EventBus::with_capacity(4);
        let _ = bus.publish(deleted(0));

        let mut subscription = bus.subscribe(None);
        let torrent_id = Uuid::new_v4();
        let _ = bus.publish(Event::FilesSelected { torrent_id });

        let envelope = timeout(RECV_TIMEOUT, subscription.next())
            .await
            .expect("subscription stalled")
            .expect("subscription closed");
        assert_eq!(envelope.event, Event::FilesSelected { torrent_id });
    }

    #[tokio::test]
    async fn lagged_subscriber_is_backfilled_without_duplicates() {
        let bus = EventBus::with_capacity(4);
        let mut subscription = bus.subscribe(None);

        // Overrun both the channel and the ring: only the last four survive.
        for i in 0..10 {
            let _ = bus.publish(deleted(i));
        }

        let mut received = Vec::new();
        for _ in 0..4 {
            let envelope = timeout(RECV_TIMEOUT, subscription.next())
                .await
                .expect("subscription stalled")
                .expect("subscription closed");
            received.push(envelope.id);
        }
        assert_eq!(received, vec![7, 8, 9, 10]);

        // Everything buffered was either yielded or recognised as a
        // duplicate; the subscription must now be idle.
        let idle = timeout(Duration::from_millis(50), subscription.next()).await;
        assert!(idle.is_err(), "no further events expected");
    }

    #[tokio::test]
    async fn subscription_ends_after_bus_is_dropped() {
        let mut subscription = {
            let bus = EventBus::with_capacity(1);
            let subscription = bus.subscribe(None);
            drop(bus);
            subscription
        };
        assert!(
            subscription.next().await.is_none(),
            "dropping the bus should end the subscription"
        );
    }
}
