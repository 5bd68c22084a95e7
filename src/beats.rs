//! Beat event feed for visualization consumers
//!
//! Every triggered kick, snare, or melody note becomes a [BeatEvent]
//! stamped with its scheduled audio time (not wall clock), a rotating slot
//! index that distributes events across twelve visual slots, and the mood
//! that was live when it was scheduled. The feed keeps a two-second
//! sliding window so memory stays bounded, and hands out read-only
//! snapshots; it owns no audio state.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::profile::Emotion;

/// Number of visual slots beat events rotate through.
pub const BEAT_SLOTS: u32 = 12;

/// How long an event stays in the feed, in audio-timeline milliseconds.
pub const BEAT_WINDOW_MS: u64 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeatKind {
    Kick,
    Snare,
    Melody,
}

/// A single triggered note, as seen by the visualization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeatEvent {
    pub id: u64,
    pub kind: BeatKind,
    /// Velocity of the trigger, 0..1
    pub intensity: f32,
    /// Round-robin slot in 0..BEAT_SLOTS
    pub slot_index: u32,
    /// Mood live at scheduling time
    pub mood: Emotion,
    /// Scheduled audio time in ms since engine start
    pub timestamp_ms: u64,
}

struct BeatFeed {
    events: VecDeque<BeatEvent>,
    next_id: u64,
}

/// Records beat events, maintains the sliding window, and broadcasts each
/// event to subscribers.
pub struct BeatBroadcaster {
    feed: Mutex<BeatFeed>,
    tx: broadcast::Sender<BeatEvent>,
}

impl BeatBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(100);
        Self {
            feed: Mutex::new(BeatFeed {
                events: VecDeque::new(),
                next_id: 0,
            }),
            tx,
        }
    }

    /// Record one triggered note. Assigns the next round-robin slot,
    /// prunes the window, and broadcasts the event.
    pub fn record(
        &self,
        kind: BeatKind,
        intensity: f32,
        mood: Emotion,
        timestamp_ms: u64,
    ) -> BeatEvent {
        let event = {
            let mut feed = match self.feed.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let event = BeatEvent {
                id: feed.next_id,
                kind,
                intensity,
                slot_index: (feed.next_id % BEAT_SLOTS as u64) as u32,
                mood,
                timestamp_ms,
            };
            feed.next_id += 1;
            feed.events.push_back(event);

            // Prune on every insert so the feed never grows unbounded.
            let cutoff = timestamp_ms.saturating_sub(BEAT_WINDOW_MS);
            while feed
                .events
                .front()
                .is_some_and(|e| e.timestamp_ms < cutoff)
            {
                feed.events.pop_front();
            }
            event
        };

        let _ = self.tx.send(event);
        event
    }

    /// Read-only snapshot of events still inside the window at `now_ms`.
    pub fn snapshot(&self, now_ms: u64) -> Vec<BeatEvent> {
        let feed = match self.feed.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let cutoff = now_ms.saturating_sub(BEAT_WINDOW_MS);
        feed.events
            .iter()
            .filter(|e| e.timestamp_ms >= cutoff)
            .copied()
            .collect()
    }

    /// Subscribe to live beat events.
    pub fn subscribe(&self) -> broadcast::Receiver<BeatEvent> {
        self.tx.subscribe()
    }
}

impl Default for BeatBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
