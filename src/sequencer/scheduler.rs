//! Step scheduler - turns session patterns into frame-stamped notes
//!
//! The scheduler walks the eighth-note grid ahead of the audio clock. Each
//! pass schedules every step that falls inside the lookahead horizon,
//! mapping step notes to [VoiceCommand]s via the per-track instrument
//! definitions and deriving the beat events that mirror the audible
//! triggers.
//!
//! Installing a new session replaces the old one in a single call: the
//! step counter restarts at beat 0 and the grid origin moves to the swap
//! frame, so all five tracks of the new session are phase-locked from the
//! first scheduled step. Cancellation of the retiring session's queued
//! notes is handled by the session epoch carried on every command.

use crate::audio::transport::samples_per_step;
use crate::audio::voice::{AmpEnvelope, VoiceCommand};
use crate::beats::BeatKind;
use crate::profile::{Pitch, Waveform};

use super::patterns::TrackKind;
use super::session::{PlaybackSession, StepNote};

/// Base frequency of the kick drum (C2).
const KICK_PITCH: Pitch = Pitch(36);

/// A note ready for the mixer, plus the beat event that mirrors it.
#[derive(Debug, Clone, Copy)]
pub struct ScheduledNote {
    pub command: VoiceCommand,
    pub beat: Option<(BeatKind, f32)>,
}

/// Walks the step grid for the live session.
pub struct StepScheduler {
    session: Option<PlaybackSession>,
    step: u64,
    next_frame: u64,
    scratch: Vec<StepNote>,
}

impl StepScheduler {
    pub fn new() -> Self {
        Self {
            session: None,
            step: 0,
            next_frame: 0,
            scratch: Vec::with_capacity(16),
        }
    }

    /// Make `session` the live session with beat 0 at `origin_frame`.
    ///
    /// The previous session is dropped here; its already-queued commands
    /// die by epoch mismatch in the mixer.
    pub fn install(&mut self, session: PlaybackSession, origin_frame: u64) {
        self.session = Some(session);
        self.step = 0;
        self.next_frame = origin_frame;
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    /// Schedule every step before `horizon_frame`, appending the resulting
    /// notes to `out`.
    ///
    /// Samples-per-step is re-derived from the glided tempo on every call,
    /// so tempo changes take effect at the next scheduled step without
    /// re-timing anything already handed to the mixer.
    pub fn schedule_until(
        &mut self,
        horizon_frame: u64,
        tempo_millibpm: u32,
        sample_rate: u32,
        out: &mut Vec<ScheduledNote>,
    ) {
        let Some(session) = &self.session else {
            return;
        };

        let step_frames = samples_per_step(tempo_millibpm, sample_rate);
        while self.next_frame < horizon_frame {
            self.scratch.clear();
            session.notes_for_step(self.step, &mut self.scratch);
            for note in &self.scratch {
                out.push(build_note(session, note, self.next_frame, step_frames));
            }
            self.step += 1;
            self.next_frame += step_frames;
        }
    }
}

impl Default for StepScheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a step note to its instrument voicing and beat event.
fn build_note(
    session: &PlaybackSession,
    note: &StepNote,
    start_frame: u64,
    step_frames: u64,
) -> ScheduledNote {
    let hold_frames = note.dur_steps as u64 * step_frames;
    let (waveform, freq_hz, env, gain, drive) = match note.track {
        TrackKind::Lead => (
            session.lead_wave,
            pitched(note),
            AmpEnvelope::new(0.05, 0.1, 0.3, 1.0),
            0.5,
            0.0,
        ),
        TrackKind::Bass => (
            Waveform::Sine,
            pitched(note),
            AmpEnvelope::new(0.1, 0.3, 0.8, 1.5),
            0.6,
            0.0,
        ),
        TrackKind::Pad => (
            Waveform::Sine,
            pitched(note),
            AmpEnvelope::new(1.5, 1.0, 0.8, 3.0),
            0.35,
            0.0,
        ),
        TrackKind::Kick => (
            Waveform::Kick,
            KICK_PITCH.freq_hz(),
            AmpEnvelope::new(0.001, 0.4, 0.01, 1.4),
            0.9,
            0.0,
        ),
        TrackKind::Snare => (
            Waveform::Noise,
            0.0,
            AmpEnvelope::new(0.001, 0.2, 0.02, 0.2),
            0.7,
            session.snare_drive,
        ),
    };

    let beat = match note.track {
        TrackKind::Kick => Some((BeatKind::Kick, note.velocity)),
        TrackKind::Snare => Some((BeatKind::Snare, note.velocity)),
        TrackKind::Lead => Some((BeatKind::Melody, note.velocity)),
        TrackKind::Bass | TrackKind::Pad => None,
    };

    ScheduledNote {
        command: VoiceCommand {
            start_frame,
            epoch: session.epoch,
            waveform,
            freq_hz,
            amp: note.velocity * gain,
            hold_frames,
            env,
            drive,
        },
        beat,
    }
}

fn pitched(note: &StepNote) -> f32 {
    note.pitch.map(|p| p.freq_hz()).unwrap_or(440.0)
}
