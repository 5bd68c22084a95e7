// BroadcastChannelManager: Centralized tokio broadcast channel management
// Single Responsibility: Broadcast channel lifecycle and subscription

use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

use crate::sequencer::ParameterSnapshot;
use crate::stabilizer::MoodEvent;

/// Manages the engine's tokio broadcast channels
///
/// This manager centralizes broadcast channel creation, storage, and
/// subscription handling so each event type has exactly one dispatch
/// point. Beat events have their own feed (the beat broadcaster owns a
/// sliding window as well); everything else goes through here.
///
/// # Channel Types
/// - Mood events: debounced stable-mood and presence transitions
/// - Parameters: {tempo, scale, reverb, timbre} snapshots per mood commit
pub struct BroadcastChannelManager {
    mood_events: Arc<Mutex<Option<broadcast::Sender<MoodEvent>>>>,
    parameters: Arc<Mutex<Option<broadcast::Sender<ParameterSnapshot>>>>,
}

impl BroadcastChannelManager {
    /// Create a new BroadcastChannelManager with all channels uninitialized
    ///
    /// Channels must be explicitly initialized via init_* methods before use.
    pub fn new() -> Self {
        Self {
            mood_events: Arc::new(Mutex::new(None)),
            parameters: Arc::new(Mutex::new(None)),
        }
    }

    // ========================================================================
    // MOOD EVENT CHANNEL
    // ========================================================================

    /// Initialize the mood event broadcast channel
    ///
    /// Returns the sender used by the engine to publish stable-mood and
    /// presence transitions. Buffer size 64: transitions are rare (at most
    /// a few per second even with a twitchy classifier).
    pub fn init_mood_events(&self) -> broadcast::Sender<MoodEvent> {
        let (tx, _) = broadcast::channel(64);
        *self.mood_events.lock().unwrap() = Some(tx.clone());
        tx
    }

    /// Subscribe to mood events
    ///
    /// Returns None if init_mood_events() has not been called yet. Each
    /// subscriber receives an independent copy of every event.
    pub fn subscribe_mood_events(&self) -> Option<broadcast::Receiver<MoodEvent>> {
        self.mood_events
            .lock()
            .unwrap()
            .as_ref()
            .map(|tx| tx.subscribe())
    }

    // ========================================================================
    // PARAMETER SNAPSHOT CHANNEL
    // ========================================================================

    /// Initialize the parameter snapshot broadcast channel
    ///
    /// Returns the sender the sequencing engine publishes one snapshot on
    /// per mood commit. Buffer size 16 is plenty: commits are gated by the
    /// stability threshold.
    pub fn init_parameters(&self) -> broadcast::Sender<ParameterSnapshot> {
        let (tx, _) = broadcast::channel(16);
        *self.parameters.lock().unwrap() = Some(tx.clone());
        tx
    }

    /// Subscribe to parameter snapshots
    ///
    /// Returns None if init_parameters() has not been called yet.
    pub fn subscribe_parameters(&self) -> Option<broadcast::Receiver<ParameterSnapshot>> {
        self.parameters
            .lock()
            .unwrap()
            .as_ref()
            .map(|tx| tx.subscribe())
    }
}

impl Default for BroadcastChannelManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Emotion;

    #[test]
    fn test_mood_event_channel_lifecycle() {
        let manager = BroadcastChannelManager::new();

        // Initially no subscription possible
        assert!(manager.subscribe_mood_events().is_none());

        // Initialize channel
        let _tx = manager.init_mood_events();

        // Now subscription works
        assert!(manager.subscribe_mood_events().is_some());
    }

    #[test]
    fn test_mood_event_multiple_subscribers() {
        let manager = BroadcastChannelManager::new();
        let tx = manager.init_mood_events();

        let mut rx1 = manager.subscribe_mood_events().unwrap();
        let mut rx2 = manager.subscribe_mood_events().unwrap();

        tx.send(MoodEvent::StableMoodChanged(Emotion::Happy)).unwrap();

        assert_eq!(
            rx1.try_recv().unwrap(),
            MoodEvent::StableMoodChanged(Emotion::Happy)
        );
        assert_eq!(
            rx2.try_recv().unwrap(),
            MoodEvent::StableMoodChanged(Emotion::Happy)
        );
    }

    #[test]
    fn test_parameters_channel_lifecycle() {
        let manager = BroadcastChannelManager::new();
        assert!(manager.subscribe_parameters().is_none());
        let _tx = manager.init_parameters();
        assert!(manager.subscribe_parameters().is_some());
    }

    #[test]
    fn test_default_implementation() {
        let manager = BroadcastChannelManager::default();
        assert!(manager.subscribe_mood_events().is_none());
        assert!(manager.subscribe_parameters().is_none());
    }
}
