//! Generative sequencing engine
//!
//! Owns the live [session::PlaybackSession] and the scheduler thread that
//! keeps the audio clock fed. Mood changes arrive as commands on an mpsc
//! channel and are processed serially by the worker:
//!
//! - applying the currently active mood is a no-op (idempotent against
//!   redundant commits);
//! - a different mood bumps the session epoch (retiring every queued note
//!   of the old session), glides tempo and effects toward the new
//!   profile, builds a freshly randomized session aligned to beat 0 at
//!   the swap frame, sounds the new profile's signal chord outside the
//!   grid, and publishes a parameter snapshot for displays.
//!
//! The worker wakes on commands or every tick, advances the glides, and
//! schedules steps up to the lookahead horizon. Note commands go to the
//! mixer through the lock-free ring; beat events mirror the audible
//! triggers at their scheduled audio time.

pub mod patterns;
pub mod scheduler;
pub mod session;

use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rtrb::Producer;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::audio::transport::{frames_to_ms, secs_to_frames, ParamGlide};
use crate::audio::voice::{AmpEnvelope, VoiceCommand};
use crate::audio::AudioShared;
use crate::beats::BeatBroadcaster;
use crate::config::SequencerConfig;
use crate::profile::{profile_for, scale_name, Emotion};

use scheduler::{ScheduledNote, StepScheduler};
use session::PlaybackSession;

/// Published once per mood commit, for parameter displays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSnapshot {
    pub tempo_bpm: u32,
    pub scale_name: String,
    pub reverb_amount: f32,
    pub timbre_name: String,
}

enum SequencerCommand {
    ApplyMood(Emotion),
    Shutdown,
}

/// Handle to the scheduler thread.
pub struct SequencerEngine {
    command_tx: mpsc::Sender<SequencerCommand>,
    join: Option<JoinHandle<()>>,
}

impl SequencerEngine {
    /// Spawn the scheduler thread.
    ///
    /// `notes` is the producer half of the ring consumed by the audio
    /// backend's mixer; `params_tx` receives one snapshot per mood commit.
    pub fn spawn(
        shared: Arc<AudioShared>,
        notes: Producer<VoiceCommand>,
        beats: Arc<BeatBroadcaster>,
        params_tx: broadcast::Sender<ParameterSnapshot>,
        config: SequencerConfig,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::channel();

        let join = std::thread::spawn(move || {
            let mut worker = SequencerWorker::new(shared, notes, beats, params_tx, &config);
            worker.run(command_rx, Duration::from_millis(config.tick_ms.max(1)));
        });

        Self {
            command_tx,
            join: Some(join),
        }
    }

    /// Request a mood change. Redundant requests are dropped by the
    /// worker, so callers can forward every stable-mood event directly.
    pub fn apply_mood(&self, emotion: Emotion) {
        if self
            .command_tx
            .send(SequencerCommand::ApplyMood(emotion))
            .is_err()
        {
            log::warn!("[Sequencer] Worker gone; dropping mood change to {}", emotion);
        }
    }
}

impl Drop for SequencerEngine {
    fn drop(&mut self) {
        let _ = self.command_tx.send(SequencerCommand::Shutdown);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Per-mood effect glide targets with the silent defaults the optional
/// effects fall back to.
struct EffectGlides {
    cutoff_hz: ParamGlide,
    reverb_mix: ParamGlide,
    chorus_depth: ParamGlide,
    delay_feedback: ParamGlide,
    distortion: ParamGlide,
    phaser_depth: ParamGlide,
}

impl EffectGlides {
    fn new() -> Self {
        Self {
            cutoff_hz: ParamGlide::new(1500.0),
            reverb_mix: ParamGlide::new(0.5),
            chorus_depth: ParamGlide::new(0.2),
            delay_feedback: ParamGlide::new(0.3),
            distortion: ParamGlide::new(0.2),
            phaser_depth: ParamGlide::new(0.3),
        }
    }
}

struct SequencerWorker {
    shared: Arc<AudioShared>,
    notes: Producer<VoiceCommand>,
    beats: Arc<BeatBroadcaster>,
    params_tx: broadcast::Sender<ParameterSnapshot>,
    lookahead_ms: u64,
    tempo_glide_secs: f32,
    effect_glide_secs: f32,
    scheduler: StepScheduler,
    tempo_bpm: ParamGlide,
    effects: EffectGlides,
    current: Option<Emotion>,
    epoch: u64,
    rng: StdRng,
    out: Vec<ScheduledNote>,
}

impl SequencerWorker {
    fn new(
        shared: Arc<AudioShared>,
        notes: Producer<VoiceCommand>,
        beats: Arc<BeatBroadcaster>,
        params_tx: broadcast::Sender<ParameterSnapshot>,
        config: &SequencerConfig,
    ) -> Self {
        let rng = match config.melody_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let initial_bpm = shared.tempo_millibpm.load(Ordering::Relaxed) as f32 / 1000.0;
        Self {
            shared,
            notes,
            beats,
            params_tx,
            lookahead_ms: config.lookahead_ms,
            tempo_glide_secs: config.tempo_glide_secs,
            effect_glide_secs: config.effect_glide_secs,
            scheduler: StepScheduler::new(),
            tempo_bpm: ParamGlide::new(initial_bpm),
            effects: EffectGlides::new(),
            current: None,
            epoch: 0,
            rng,
            out: Vec::with_capacity(64),
        }
    }

    fn run(&mut self, command_rx: mpsc::Receiver<SequencerCommand>, tick: Duration) {
        loop {
            match command_rx.recv_timeout(tick) {
                Ok(SequencerCommand::ApplyMood(emotion)) => self.handle_apply(emotion),
                Ok(SequencerCommand::Shutdown) => break,
                Err(mpsc::RecvTimeoutError::Timeout) => {}
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
            // Drain any burst of queued commands before scheduling.
            while let Ok(cmd) = command_rx.try_recv() {
                match cmd {
                    SequencerCommand::ApplyMood(emotion) => self.handle_apply(emotion),
                    SequencerCommand::Shutdown => return,
                }
            }

            self.advance_glides(tick.as_secs_f32());
            self.schedule_pass();
        }
        log::debug!("[Sequencer] Worker shut down");
    }

    /// Apply a committed mood. No-op when the mood is already active.
    fn handle_apply(&mut self, emotion: Emotion) {
        if self.current == Some(emotion) {
            log::debug!("[Sequencer] Mood {} already active, ignoring", emotion);
            return;
        }

        let profile = profile_for(emotion);
        let now_frame = self.shared.current_frame();

        // Tempo and effects glide instead of stepping; the glide times are
        // long (tempo) and short (effects) by design.
        self.tempo_bpm
            .set_target(profile.tempo_bpm as f32, self.tempo_glide_secs);
        let fx = &profile.effects;
        let glide = self.effect_glide_secs;
        self.effects.cutoff_hz.set_target(fx.cutoff_hz, glide);
        self.effects.reverb_mix.set_target(fx.reverb_mix, glide);
        self.effects.chorus_depth.set_target(fx.chorus_depth, glide);
        self.effects
            .delay_feedback
            .set_target(fx.delay_feedback, glide);
        self.effects
            .distortion
            .set_target(fx.distortion.unwrap_or(0.2), glide);
        self.effects
            .phaser_depth
            .set_target(fx.phaser_depth.unwrap_or(0.3), glide);

        // Retire the old session before anything new is scheduled: bumping
        // the active epoch invalidates every queued note it had in flight.
        self.epoch += 1;
        self.shared
            .active_epoch
            .store(self.epoch, Ordering::Release);

        let session = PlaybackSession::build(emotion, profile, self.epoch, &mut self.rng);

        // Signal chord: audible confirmation outside the sequence grid.
        self.push_signal_chord(&session, now_frame);

        self.scheduler.install(session, now_frame);
        self.current = Some(emotion);

        let snapshot = ParameterSnapshot {
            tempo_bpm: profile.tempo_bpm,
            scale_name: scale_name(emotion).to_string(),
            reverb_amount: fx.reverb_mix,
            timbre_name: profile.timbre.name().to_string(),
        };
        let _ = self.params_tx.send(snapshot);

        log::info!(
            "[Sequencer] Mood committed: {} ({} BPM, epoch {})",
            emotion,
            profile.tempo_bpm,
            self.epoch
        );
    }

    fn push_signal_chord(&mut self, session: &PlaybackSession, now_frame: u64) {
        let sample_rate = self.shared.sample_rate_hz();
        let hold = secs_to_frames(0.5, sample_rate);
        for &pitch in session.signal_chord() {
            let cmd = VoiceCommand {
                start_frame: now_frame,
                epoch: session.epoch,
                waveform: session.lead_wave,
                freq_hz: pitch.freq_hz(),
                amp: 0.4,
                hold_frames: hold,
                env: AmpEnvelope::new(0.02, 0.1, 0.6, 0.8),
                drive: 0.0,
            };
            if self.notes.push(cmd).is_err() {
                log::warn!("[Sequencer] Command ring full, dropping signal chord note");
            }
        }
    }

    /// Advance glides by one tick and publish the audible parameters to
    /// the mixer's atomics.
    fn advance_glides(&mut self, dt_secs: f32) {
        let bpm = self.tempo_bpm.advance(dt_secs);
        self.shared
            .tempo_millibpm
            .store((bpm * 1000.0).round().max(1.0) as u32, Ordering::Relaxed);

        self.shared
            .cutoff_hz
            .store(self.effects.cutoff_hz.advance(dt_secs));
        self.shared
            .reverb_mix
            .store(self.effects.reverb_mix.advance(dt_secs));
        self.shared
            .delay_feedback
            .store(self.effects.delay_feedback.advance(dt_secs));
        // Modulation depths glide alongside even though the mix stage only
        // voices cutoff/reverb/delay; they still feed displays and tests.
        self.effects.chorus_depth.advance(dt_secs);
        self.effects.distortion.advance(dt_secs);
        self.effects.phaser_depth.advance(dt_secs);
    }

    /// One lookahead pass: schedule every step inside the horizon, hand
    /// the notes to the mixer, and mirror beat events at scheduled time.
    fn schedule_pass(&mut self) {
        let sample_rate = self.shared.sample_rate_hz();
        let now_frame = self.shared.current_frame();
        let horizon = now_frame + self.lookahead_ms * sample_rate as u64 / 1000;
        let tempo = self.shared.tempo_millibpm.load(Ordering::Relaxed);

        self.out.clear();
        self.scheduler
            .schedule_until(horizon, tempo, sample_rate, &mut self.out);

        let mood = self.current.unwrap_or(Emotion::Neutral);
        for note in self.out.drain(..) {
            if self.notes.push(note.command).is_err() {
                log::warn!(
                    "[Sequencer] Command ring full, dropping note at frame {}",
                    note.command.start_frame
                );
                continue;
            }
            if let Some((kind, intensity)) = note.beat {
                self.beats.record(
                    kind,
                    intensity,
                    mood,
                    frames_to_ms(note.command.start_frame, sample_rate),
                );
            }
        }
    }
}
