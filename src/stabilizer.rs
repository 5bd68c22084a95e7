//! Mood stabilization state machine
//!
//! The classifier delivers a sample roughly every 200 ms, and its output
//! flickers: a face relaxes for a frame, a shadow drops confidence, the
//! label jumps for a single cycle. Driving the sequencing engine from that
//! raw stream would restart the music constantly. This module debounces the
//! stream on two timescales:
//!
//! - fast raw tracking: every accepted sample updates the current raw
//!   emotion and, on a label change, restarts the stability timer;
//! - slow committed output: only after the raw emotion has persisted
//!   uninterrupted for the stability threshold is it committed as the
//!   stable mood, emitting a single [MoodEvent::StableMoodChanged].
//!
//! Presence is debounced independently: loss requires a run of consecutive
//! missed samples (default 3), regain is immediate on the next accepted
//! sample.
//!
//! The machine is driven entirely by timestamps carried on the samples, so
//! tests can run without wall-clock sleeps.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::config::StabilizationConfig;
use crate::profile::Emotion;

/// One classifier observation. Ephemeral; not retained after processing.
#[derive(Debug, Clone, Copy)]
pub struct ClassificationSample {
    pub emotion: Emotion,
    /// Classifier confidence in [0, 1]
    pub confidence: f32,
    /// Whether a subject was detected at all. When false, emotion and
    /// confidence are ignored.
    pub has_subject: bool,
    pub at: Instant,
}

/// Events emitted by the stabilizer, in commit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MoodEvent {
    StableMoodChanged(Emotion),
    PresenceChanged(bool),
}

/// Phase of the two-timescale debounce.
///
/// Transition guards:
/// - `Tracking -> Stable`: the raw emotion has persisted for the threshold
///   and differs from the committed mood (commit + emit).
/// - `Stable -> Tracking`: an accepted sample carries a different raw
///   emotion than the committed mood (timer restart, no emission).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StabilityPhase {
    /// Raw emotion differs from the committed mood; timing its persistence
    Tracking,
    /// Raw emotion and committed mood agree
    Stable,
}

/// Raw-vs-committed mood bookkeeping. Mutated only by [MoodStabilizer].
#[derive(Debug, Clone, Copy)]
pub struct StabilityWindow {
    pub current_raw: Emotion,
    pub last_change: Instant,
    pub stable: Emotion,
}

/// Presence bookkeeping. Mutated only by [MoodStabilizer].
#[derive(Debug, Clone, Copy)]
pub struct PresenceState {
    pub is_present: bool,
    pub last_seen: Instant,
    pub consecutive_misses: u32,
}

/// Converts the raw classification stream into debounced mood and
/// presence events.
pub struct MoodStabilizer {
    stability_threshold: Duration,
    confidence_threshold: f32,
    miss_limit: u32,
    immediate_absence: bool,
    window: StabilityWindow,
    presence: PresenceState,
    phase: StabilityPhase,
}

impl MoodStabilizer {
    /// Create a stabilizer in the neutral, present state.
    ///
    /// `now` seeds the internal timestamps so the first samples measure
    /// elapsed time against creation rather than an arbitrary epoch.
    pub fn new(config: &StabilizationConfig, now: Instant) -> Self {
        Self {
            stability_threshold: Duration::from_secs_f32(
                config.stability_threshold_secs.max(0.0),
            ),
            confidence_threshold: config.confidence_threshold,
            miss_limit: config.presence_miss_limit.max(1),
            immediate_absence: config.immediate_absence,
            window: StabilityWindow {
                current_raw: Emotion::Neutral,
                last_change: now,
                stable: Emotion::Neutral,
            },
            presence: PresenceState {
                is_present: true,
                last_seen: now,
                consecutive_misses: 0,
            },
            phase: StabilityPhase::Stable,
        }
    }

    /// Process one classifier sample and return the events it commits.
    ///
    /// At most two events can result from a single sample (a presence
    /// regain plus a stable-mood commit); most samples produce none.
    pub fn on_sample(&mut self, sample: ClassificationSample) -> Vec<MoodEvent> {
        let mut events = Vec::new();

        if !sample.has_subject {
            self.on_missed_sample(&mut events);
            return events;
        }

        // Low-confidence noise is discarded outright: it must not reset the
        // stability timer or count as a presence observation.
        if sample.confidence < self.confidence_threshold {
            log::trace!(
                "[Stabilizer] Discarding low-confidence sample ({:.2} < {:.2})",
                sample.confidence,
                self.confidence_threshold
            );
            return events;
        }

        self.on_accepted_sample(sample, &mut events);
        events
    }

    fn on_missed_sample(&mut self, events: &mut Vec<MoodEvent>) {
        self.presence.consecutive_misses = self.presence.consecutive_misses.saturating_add(1);

        let limit = if self.immediate_absence { 1 } else { self.miss_limit };
        if self.presence.consecutive_misses >= limit && self.presence.is_present {
            self.presence.is_present = false;
            log::info!(
                "[Stabilizer] Presence lost after {} consecutive misses",
                self.presence.consecutive_misses
            );
            events.push(MoodEvent::PresenceChanged(false));
        }
        // Emotion state is untouched on a miss: the stable mood survives
        // an absent subject and resumes when they return.
    }

    fn on_accepted_sample(&mut self, sample: ClassificationSample, events: &mut Vec<MoodEvent>) {
        let was_present = self.presence.is_present;
        self.presence.is_present = true;
        self.presence.last_seen = sample.at;
        self.presence.consecutive_misses = 0;
        if !was_present {
            // Regain is not debounced: one good sample is enough.
            log::info!("[Stabilizer] Presence regained");
            events.push(MoodEvent::PresenceChanged(true));
        }

        if sample.emotion != self.window.current_raw {
            // Guard: Stable -> Tracking. A changing raw emotion restarts
            // the timer; nothing is committed this cycle.
            self.window.current_raw = sample.emotion;
            self.window.last_change = sample.at;
            self.phase = StabilityPhase::Tracking;
            return;
        }

        let elapsed = sample.at.saturating_duration_since(self.window.last_change);
        if elapsed >= self.stability_threshold && sample.emotion != self.window.stable {
            // Guard: Tracking -> Stable. Persisted past the threshold and
            // differs from the committed mood, so commit exactly once.
            self.window.stable = sample.emotion;
            self.phase = StabilityPhase::Stable;
            log::info!(
                "[Stabilizer] Stable mood committed: {} (held {:.2}s)",
                sample.emotion,
                elapsed.as_secs_f32()
            );
            events.push(MoodEvent::StableMoodChanged(sample.emotion));
        }
    }

    /// Adjust the stability threshold at runtime.
    ///
    /// The elapsed time accumulated for the current raw emotion is kept:
    /// lowering the threshold mid-run can commit on the next sample.
    pub fn set_stability_threshold(&mut self, threshold: Duration) {
        self.stability_threshold = threshold;
    }

    pub fn stability_threshold(&self) -> Duration {
        self.stability_threshold
    }

    /// Snapshot of the raw/committed mood window.
    pub fn window(&self) -> StabilityWindow {
        self.window
    }

    /// Snapshot of the presence state.
    pub fn presence(&self) -> PresenceState {
        self.presence
    }

    pub fn phase(&self) -> StabilityPhase {
        self.phase
    }

    /// The committed stable mood.
    pub fn stable_mood(&self) -> Emotion {
        self.window.stable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> StabilizationConfig {
        StabilizationConfig {
            stability_threshold_secs: 1.0,
            confidence_threshold: 0.3,
            presence_miss_limit: 3,
            immediate_absence: false,
        }
    }

    fn sample(emotion: Emotion, confidence: f32, has_subject: bool, at: Instant) -> ClassificationSample {
        ClassificationSample {
            emotion,
            confidence,
            has_subject,
            at,
        }
    }

    #[test]
    fn test_constant_emotion_commits_exactly_once() {
        let start = Instant::now();
        let mut stab = MoodStabilizer::new(&test_config(), start);

        // Six happy samples spaced 200ms apart: 1.2s of sustained happy.
        let mut commits = 0;
        for i in 0..6 {
            let at = start + Duration::from_millis(200 * (i + 1));
            let events = stab.on_sample(sample(Emotion::Happy, 0.9, true, at));
            commits += events
                .iter()
                .filter(|e| matches!(e, MoodEvent::StableMoodChanged(Emotion::Happy)))
                .count();
        }

        assert_eq!(commits, 1, "sustained mood must commit exactly once");
        assert_eq!(stab.stable_mood(), Emotion::Happy);
    }

    #[test]
    fn test_commit_happens_only_after_threshold() {
        let start = Instant::now();
        let mut stab = MoodStabilizer::new(&test_config(), start);

        // First sample switches raw to happy and restarts the timer, so the
        // run is measured from sample 1. Samples 2..4 are all under 1s.
        for i in 0..4 {
            let at = start + Duration::from_millis(200 * (i + 1));
            let events = stab.on_sample(sample(Emotion::Happy, 0.9, true, at));
            assert!(
                events.is_empty(),
                "no commit expected at {}ms",
                200 * (i + 1)
            );
        }

        // Sample 5 arrives 1.0s after the raw change: commit fires here.
        let at = start + Duration::from_millis(1200);
        let events = stab.on_sample(sample(Emotion::Happy, 0.9, true, at));
        assert_eq!(events, vec![MoodEvent::StableMoodChanged(Emotion::Happy)]);
    }

    #[test]
    fn test_flickering_emotion_never_commits() {
        let start = Instant::now();
        let mut stab = MoodStabilizer::new(&test_config(), start);

        // sad / happy / sad at 100ms spacing: the timer keeps resetting.
        let moods = [Emotion::Sad, Emotion::Happy, Emotion::Sad];
        for (i, mood) in moods.iter().enumerate() {
            let at = start + Duration::from_millis(100 * (i as u64 + 1));
            let events = stab.on_sample(sample(*mood, 0.9, true, at));
            assert!(events.is_empty(), "flicker must not emit events");
        }
        assert_eq!(stab.stable_mood(), Emotion::Neutral);
        assert_eq!(stab.phase(), StabilityPhase::Tracking);
    }

    #[test]
    fn test_emotion_change_resets_timer_even_near_threshold() {
        let start = Instant::now();
        let mut stab = MoodStabilizer::new(&test_config(), start);

        // Hold sad for 0.9s, just shy of the threshold.
        stab.on_sample(sample(Emotion::Sad, 0.9, true, start + Duration::from_millis(100)));
        stab.on_sample(sample(Emotion::Sad, 0.9, true, start + Duration::from_millis(900)));

        // One happy sample resets everything.
        stab.on_sample(sample(Emotion::Happy, 0.9, true, start + Duration::from_millis(1000)));

        // Sad again; elapsed restarts from here, so 0.9s later is no commit.
        let events =
            stab.on_sample(sample(Emotion::Sad, 0.9, true, start + Duration::from_millis(1100)));
        assert!(events.is_empty());
        let events =
            stab.on_sample(sample(Emotion::Sad, 0.9, true, start + Duration::from_millis(2000)));
        assert!(events.is_empty(), "0.9s after reset is still under threshold");

        let events =
            stab.on_sample(sample(Emotion::Sad, 0.9, true, start + Duration::from_millis(2200)));
        assert_eq!(events, vec![MoodEvent::StableMoodChanged(Emotion::Sad)]);
    }

    #[test]
    fn test_low_confidence_samples_are_inert() {
        let start = Instant::now();
        let mut stab = MoodStabilizer::new(&test_config(), start);

        // Build up 0.8s of happy.
        stab.on_sample(sample(Emotion::Happy, 0.9, true, start + Duration::from_millis(100)));
        stab.on_sample(sample(Emotion::Happy, 0.9, true, start + Duration::from_millis(900)));
        let window_before = stab.window();

        // A low-confidence angry sample must not touch anything.
        let events =
            stab.on_sample(sample(Emotion::Angry, 0.1, true, start + Duration::from_millis(1000)));
        assert!(events.is_empty());
        let window_after = stab.window();
        assert_eq!(window_after.current_raw, window_before.current_raw);
        assert_eq!(window_after.last_change, window_before.last_change);

        // The happy run is still alive: crossing 1s from the original
        // change commits happy, proving the timer was not reset.
        let events =
            stab.on_sample(sample(Emotion::Happy, 0.9, true, start + Duration::from_millis(1200)));
        assert_eq!(events, vec![MoodEvent::StableMoodChanged(Emotion::Happy)]);
    }

    #[test]
    fn test_presence_loss_debounced_over_three_misses() {
        let start = Instant::now();
        let mut stab = MoodStabilizer::new(&test_config(), start);

        // Neutral held for 2s (no commit: neutral is already stable).
        stab.on_sample(sample(Emotion::Neutral, 0.9, true, start + Duration::from_millis(200)));
        let events =
            stab.on_sample(sample(Emotion::Neutral, 0.9, true, start + Duration::from_secs(2)));
        assert!(events.is_empty(), "re-committing the same mood is a no-op");

        // Three misses at 200ms spacing: only the third flips presence.
        let e1 = stab.on_sample(sample(Emotion::Neutral, 0.0, false, start + Duration::from_millis(2200)));
        let e2 = stab.on_sample(sample(Emotion::Neutral, 0.0, false, start + Duration::from_millis(2400)));
        let e3 = stab.on_sample(sample(Emotion::Neutral, 0.0, false, start + Duration::from_millis(2600)));
        assert!(e1.is_empty());
        assert!(e2.is_empty());
        assert_eq!(e3, vec![MoodEvent::PresenceChanged(false)]);

        // A fourth miss must not re-emit.
        let e4 = stab.on_sample(sample(Emotion::Neutral, 0.0, false, start + Duration::from_millis(2800)));
        assert!(e4.is_empty(), "presence loss must emit exactly once");

        // Mood state survives the absence.
        assert_eq!(stab.stable_mood(), Emotion::Neutral);
    }

    #[test]
    fn test_presence_regain_is_immediate() {
        let start = Instant::now();
        let mut stab = MoodStabilizer::new(&test_config(), start);

        for i in 0..3 {
            stab.on_sample(sample(
                Emotion::Neutral,
                0.0,
                false,
                start + Duration::from_millis(200 * (i + 1)),
            ));
        }
        assert!(!stab.presence().is_present);

        let events =
            stab.on_sample(sample(Emotion::Neutral, 0.9, true, start + Duration::from_millis(800)));
        assert_eq!(events, vec![MoodEvent::PresenceChanged(true)]);
        assert_eq!(stab.presence().consecutive_misses, 0);
    }

    #[test]
    fn test_immediate_absence_mode() {
        let start = Instant::now();
        let mut config = test_config();
        config.immediate_absence = true;
        let mut stab = MoodStabilizer::new(&config, start);

        let events =
            stab.on_sample(sample(Emotion::Neutral, 0.0, false, start + Duration::from_millis(200)));
        assert_eq!(events, vec![MoodEvent::PresenceChanged(false)]);
    }

    #[test]
    fn test_runtime_threshold_change_keeps_elapsed_time() {
        let start = Instant::now();
        let mut stab = MoodStabilizer::new(&test_config(), start);

        // 0.6s of happy under a 1s threshold: nothing commits.
        stab.on_sample(sample(Emotion::Happy, 0.9, true, start + Duration::from_millis(100)));
        let events =
            stab.on_sample(sample(Emotion::Happy, 0.9, true, start + Duration::from_millis(700)));
        assert!(events.is_empty());

        // Lowering the threshold to 0.5s commits on the very next sample
        // because the accumulated 0.6s run was preserved.
        stab.set_stability_threshold(Duration::from_millis(500));
        let events =
            stab.on_sample(sample(Emotion::Happy, 0.9, true, start + Duration::from_millis(800)));
        assert_eq!(events, vec![MoodEvent::StableMoodChanged(Emotion::Happy)]);
    }

    #[test]
    fn test_regain_and_commit_in_one_sample() {
        let start = Instant::now();
        let mut stab = MoodStabilizer::new(&test_config(), start);

        // Build a happy run, lose presence, then return still happy past
        // the threshold: the returning sample emits both events.
        stab.on_sample(sample(Emotion::Happy, 0.9, true, start + Duration::from_millis(100)));
        for i in 0..3 {
            stab.on_sample(sample(
                Emotion::Happy,
                0.0,
                false,
                start + Duration::from_millis(300 + 200 * i),
            ));
        }
        assert!(!stab.presence().is_present);

        let events =
            stab.on_sample(sample(Emotion::Happy, 0.9, true, start + Duration::from_millis(1200)));
        assert_eq!(
            events,
            vec![
                MoodEvent::PresenceChanged(true),
                MoodEvent::StableMoodChanged(Emotion::Happy)
            ]
        );
    }
}
