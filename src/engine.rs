//! MoodEngine: top-level orchestration of the mood-to-music pipeline.
//!
//! Wires the stabilizer, sequencing engine, fade controller, beat feed,
//! and audio backend together behind one handle shared across the CLI and
//! embedding code. Sample delivery is cooperative and non-blocking: a
//! classifier sample updates the stabilizer and, at most, posts a command
//! to the scheduler thread; it never waits on audio scheduling.
//!
//! Ownership of mutable state is strict: the stabilizer owns mood and
//! presence state, the sequencer worker owns the live session. Everything
//! else observes through broadcast events or atomic snapshots.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use tokio::sync::broadcast;

use crate::audio::backend::{AudioBackend, CpalBackend, StartContext};
use crate::audio::AudioShared;
use crate::beats::{BeatBroadcaster, BeatEvent};
use crate::config::{AppConfig, MusicMode};
use crate::error::{log_audio_error, AudioError};
use crate::fade::FadeController;
use crate::managers::BroadcastChannelManager;
use crate::profile::Emotion;
use crate::sequencer::{ParameterSnapshot, SequencerEngine};
use crate::stabilizer::{ClassificationSample, MoodEvent, MoodStabilizer};

/// Volume slider range, matching the UI surface.
const MIN_VOLUME_DB: f32 = -60.0;
const MAX_VOLUME_DB: f32 = 0.0;

/// The engine handle. One per process; cheap to share via `Arc`.
pub struct MoodEngine {
    config: Arc<RwLock<AppConfig>>,
    shared: Arc<AudioShared>,
    backend: Arc<dyn AudioBackend>,
    broadcasts: BroadcastChannelManager,
    beats: Arc<BeatBroadcaster>,
    mood_tx: broadcast::Sender<MoodEvent>,
    params_tx: broadcast::Sender<ParameterSnapshot>,
    stabilizer: Mutex<MoodStabilizer>,
    fade: Mutex<FadeController>,
    sequencer: Mutex<Option<SequencerEngine>>,
    running: AtomicBool,
    /// Set after the first failed device init so the failure is reported
    /// exactly once; the engine does not retry on its own.
    start_failure_reported: AtomicBool,
}

impl MoodEngine {
    /// Create an engine with the default cpal output backend.
    pub fn new(config: AppConfig) -> Self {
        Self::with_backend(config, Arc::new(CpalBackend::new()))
    }

    /// Create an engine with an explicit backend (stub for tests/headless).
    pub fn with_backend(config: AppConfig, backend: Arc<dyn AudioBackend>) -> Self {
        let shared = Arc::new(AudioShared::new(
            config.audio.sample_rate,
            config.audio.master_volume_db,
        ));
        let broadcasts = BroadcastChannelManager::new();
        let mood_tx = broadcasts.init_mood_events();
        let params_tx = broadcasts.init_parameters();
        let stabilizer = MoodStabilizer::new(&config.stabilization, Instant::now());
        let fade = FadeController::new(Arc::clone(&shared));

        Self {
            config: Arc::new(RwLock::new(config)),
            shared,
            backend,
            broadcasts,
            beats: Arc::new(BeatBroadcaster::new()),
            mood_tx,
            params_tx,
            stabilizer: Mutex::new(stabilizer),
            fade: Mutex::new(fade),
            sequencer: Mutex::new(None),
            running: AtomicBool::new(false),
            start_failure_reported: AtomicBool::new(false),
        }
    }

    /// Start audio output and the scheduler, opening on the neutral mood.
    pub fn start(&self) -> Result<(), AudioError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(AudioError::AlreadyRunning);
        }

        let (audio_cfg, sequencer_cfg) = {
            let config = self.read_config()?;
            (config.audio.clone(), config.sequencer.clone())
        };

        let (notes_tx, notes_rx) = rtrb::RingBuffer::new(audio_cfg.command_queue_size.max(16));

        if let Err(err) = self.backend.start(StartContext {
            shared: Arc::clone(&self.shared),
            commands: notes_rx,
            voice_pool_size: audio_cfg.voice_pool_size,
        }) {
            // Acquisition failures are reported once; the engine then
            // stays in its waiting state rather than retrying.
            if !self.start_failure_reported.swap(true, Ordering::SeqCst) {
                log_audio_error(&err, "engine_start");
            }
            return Err(err);
        }

        let sequencer = SequencerEngine::spawn(
            Arc::clone(&self.shared),
            notes_tx,
            Arc::clone(&self.beats),
            self.params_tx.clone(),
            sequencer_cfg,
        );
        // Open on neutral so there is sound before the first stable mood.
        sequencer.apply_mood(Emotion::Neutral);

        *self.lock_sequencer()? = Some(sequencer);
        self.running.store(true, Ordering::SeqCst);
        log::info!("[Engine] Started");
        Ok(())
    }

    /// Stop the scheduler and close the audio backend.
    pub fn stop(&self) -> Result<(), AudioError> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(AudioError::NotRunning);
        }
        // Dropping the sequencer joins its worker before the backend goes
        // away, so no note is pushed at a dead ring.
        self.lock_sequencer()?.take();
        self.backend.stop()?;
        log::info!("[Engine] Stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    // ========================================================================
    // CLASSIFIER INPUT
    // ========================================================================

    /// Deliver one classifier observation.
    ///
    /// Called at the classifier's own cadence (~200 ms). In manual mode
    /// the stabilizer is bypassed entirely and the sample is dropped.
    /// `has_subject = false` means emotion and confidence are ignored; a
    /// transient classifier error should be delivered exactly this way.
    pub fn deliver_sample(&self, emotion: Emotion, confidence: f32, has_subject: bool) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }
        if self.mode() == MusicMode::Manual {
            return;
        }

        let sample = ClassificationSample {
            emotion,
            confidence,
            has_subject,
            at: Instant::now(),
        };

        let events = {
            let mut stabilizer = match self.stabilizer.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            stabilizer.on_sample(sample)
        };

        for event in events {
            self.dispatch(event);
        }
    }

    fn dispatch(&self, event: MoodEvent) {
        let _ = self.mood_tx.send(event);
        match event {
            MoodEvent::StableMoodChanged(emotion) => {
                if let Ok(guard) = self.lock_sequencer() {
                    if let Some(sequencer) = guard.as_ref() {
                        sequencer.apply_mood(emotion);
                    }
                }
            }
            MoodEvent::PresenceChanged(is_present) => {
                let mut fade = match self.fade.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                fade.on_presence_changed(is_present);
            }
        }
    }

    // ========================================================================
    // CONTROL SURFACE
    // ========================================================================

    pub fn mode(&self) -> MusicMode {
        self.config.read().map(|c| c.mode).unwrap_or(MusicMode::Dynamic)
    }

    /// Switch between dynamic (classifier-driven) and manual mode.
    ///
    /// Returning to dynamic mode re-applies the current stable mood so the
    /// music matches the stabilizer state again.
    pub fn set_mode(&self, mode: MusicMode) {
        if let Ok(mut config) = self.config.write() {
            if config.mode == mode {
                return;
            }
            config.mode = mode;
        }
        log::info!("[Engine] Mode set to {:?}", mode);

        if mode == MusicMode::Dynamic {
            let stable = {
                let stabilizer = match self.stabilizer.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                stabilizer.stable_mood()
            };
            if let Ok(guard) = self.lock_sequencer() {
                if let Some(sequencer) = guard.as_ref() {
                    sequencer.apply_mood(stable);
                }
            }
        }
    }

    /// Feed a user-chosen mood directly into the sequencer (manual mode).
    pub fn set_manual_mood(&self, emotion: Emotion) {
        if self.mode() != MusicMode::Manual {
            log::warn!("[Engine] Ignoring manual mood {} in dynamic mode", emotion);
            return;
        }
        if let Ok(guard) = self.lock_sequencer() {
            if let Some(sequencer) = guard.as_ref() {
                sequencer.apply_mood(emotion);
            }
        }
    }

    /// Set the master volume, clamped to the -60..0 dB slider range.
    pub fn set_master_volume_db(&self, db: f32) {
        let db = db.clamp(MIN_VOLUME_DB, MAX_VOLUME_DB);
        self.shared.master_gain_db.store(db);
        if let Ok(mut config) = self.config.write() {
            config.audio.master_volume_db = db;
        }
    }

    /// Adjust the stability threshold at runtime without resetting the
    /// current raw emotion's accumulated time.
    pub fn set_stability_threshold_secs(&self, secs: f32) {
        let secs = secs.max(0.0);
        {
            let mut stabilizer = match self.stabilizer.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            stabilizer.set_stability_threshold(Duration::from_secs_f32(secs));
        }
        if let Ok(mut config) = self.config.write() {
            config.stabilization.stability_threshold_secs = secs;
        }
        log::info!("[Engine] Stability threshold set to {:.1}s", secs);
    }

    // ========================================================================
    // OBSERVATION
    // ========================================================================

    pub fn subscribe_mood_events(&self) -> Option<broadcast::Receiver<MoodEvent>> {
        self.broadcasts.subscribe_mood_events()
    }

    pub fn subscribe_parameters(&self) -> Option<broadcast::Receiver<ParameterSnapshot>> {
        self.broadcasts.subscribe_parameters()
    }

    pub fn subscribe_beats(&self) -> broadcast::Receiver<BeatEvent> {
        self.beats.subscribe()
    }

    /// Read-only snapshot of the live beat window at the current audio time.
    pub fn beat_snapshot(&self) -> Vec<BeatEvent> {
        self.beats.snapshot(self.audio_time_ms())
    }

    /// Milliseconds of audio rendered since start.
    pub fn audio_time_ms(&self) -> u64 {
        self.shared.frame_to_ms(self.shared.current_frame())
    }

    /// The committed stable mood.
    pub fn stable_mood(&self) -> Emotion {
        let stabilizer = match self.stabilizer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        stabilizer.stable_mood()
    }

    /// Shared atomic state, for displays and diagnostics.
    pub fn audio_shared(&self) -> Arc<AudioShared> {
        Arc::clone(&self.shared)
    }

    fn read_config(&self) -> Result<std::sync::RwLockReadGuard<'_, AppConfig>, AudioError> {
        self.config.read().map_err(|_| AudioError::LockPoisoned {
            component: "config".to_string(),
        })
    }

    fn lock_sequencer(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, Option<SequencerEngine>>, AudioError> {
        self.sequencer.lock().map_err(|_| AudioError::LockPoisoned {
            component: "sequencer".to_string(),
        })
    }
}
