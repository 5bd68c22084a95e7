//! Playback sessions - the live set of five phase-locked tracks
//!
//! A [PlaybackSession] binds one mood's musical material to a session
//! epoch. Exactly one session is live at a time; the epoch is how retired
//! sessions' scheduled notes are cancelled before they can sound.
//!
//! Track timing on the shared eighth-note grid:
//! - lead, kick, snare: every step, one-bar (8 slot) patterns
//! - bass: every 4 steps (half notes), held for 2 steps
//! - pad: every 8 steps (whole notes), held for 4 steps

use rand::rngs::StdRng;

use crate::profile::{Emotion, MusicalProfile, Pitch, Waveform, C4, E4, G4};

use super::patterns::{self, TrackKind};

/// Steps between bass slots.
const BASS_INTERVAL: u64 = 4;
/// Steps between pad slots.
const PAD_INTERVAL: u64 = 8;

/// One note due on a step, before instrument mapping.
#[derive(Debug, Clone, Copy)]
pub struct StepNote {
    pub track: TrackKind,
    /// None for unpitched tracks (snare)
    pub pitch: Option<Pitch>,
    pub velocity: f32,
    /// Hold duration in grid steps
    pub dur_steps: u32,
}

/// The five concurrent pattern tracks of one mood, plus the voicing data
/// the instrument mapping needs.
#[derive(Debug, Clone)]
pub struct PlaybackSession {
    pub emotion: Emotion,
    pub epoch: u64,
    scale: Vec<Pitch>,
    melody: Vec<Option<usize>>,
    bass: Vec<Option<Pitch>>,
    /// Chord progression plus a trailing rest slot
    pads: Vec<Option<Vec<Pitch>>>,
    kick: Vec<Option<f32>>,
    snare: Vec<Option<f32>>,
    pub lead_wave: Waveform,
    /// Soft-clip drive applied to the snare voice
    pub snare_drive: f32,
    signal_chord: Vec<Pitch>,
}

impl PlaybackSession {
    /// Compose a session for a mood. The melody is freshly randomized on
    /// every call; everything else derives from the profile's fixed
    /// sequences and the mood's percussion templates.
    pub fn build(
        emotion: Emotion,
        profile: &MusicalProfile,
        epoch: u64,
        rng: &mut StdRng,
    ) -> Self {
        let mut pads: Vec<Option<Vec<Pitch>>> =
            profile.chords.iter().cloned().map(Some).collect();
        pads.push(None);

        let signal_chord = profile
            .chords
            .first()
            .cloned()
            .unwrap_or_else(|| vec![C4, E4, G4]);

        Self {
            emotion,
            epoch,
            scale: profile.scale.clone(),
            melody: patterns::melody_pattern(profile.scale.len(), rng),
            bass: profile.bass_line.clone(),
            pads,
            kick: patterns::kick_pattern(emotion),
            snare: patterns::snare_pattern(emotion),
            lead_wave: profile.timbre.oscillator,
            snare_drive: profile.effects.distortion_or_default(),
            signal_chord,
        }
    }

    /// Collect every note due on a grid step into `out`.
    ///
    /// Steps are counted from the session's clock origin (beat 0 at the
    /// swap), so all five tracks stay phase-locked by construction.
    pub fn notes_for_step(&self, step: u64, out: &mut Vec<StepNote>) {
        let slot = (step % self.melody.len() as u64) as usize;

        if let Some(degree) = self.melody[slot] {
            let pitch = self.scale[degree % self.scale.len()];
            out.push(StepNote {
                track: TrackKind::Lead,
                pitch: Some(pitch),
                velocity: patterns::trigger_intensity(self.emotion, TrackKind::Lead),
                dur_steps: 1,
            });
        }

        if let Some(velocity) = self.kick[slot] {
            out.push(StepNote {
                track: TrackKind::Kick,
                pitch: None,
                velocity,
                dur_steps: 1,
            });
        }

        if let Some(accent) = self.snare[slot] {
            out.push(StepNote {
                track: TrackKind::Snare,
                pitch: None,
                velocity: accent * patterns::trigger_intensity(self.emotion, TrackKind::Snare),
                dur_steps: 1,
            });
        }

        if step % BASS_INTERVAL == 0 {
            let idx = ((step / BASS_INTERVAL) % self.bass.len() as u64) as usize;
            if let Some(pitch) = self.bass[idx] {
                out.push(StepNote {
                    track: TrackKind::Bass,
                    pitch: Some(pitch),
                    velocity: patterns::trigger_intensity(self.emotion, TrackKind::Bass),
                    dur_steps: 2,
                });
            }
        }

        if step % PAD_INTERVAL == 0 {
            let idx = ((step / PAD_INTERVAL) % self.pads.len() as u64) as usize;
            if let Some(chord) = &self.pads[idx] {
                for &pitch in chord {
                    out.push(StepNote {
                        track: TrackKind::Pad,
                        pitch: Some(pitch),
                        velocity: patterns::trigger_intensity(self.emotion, TrackKind::Pad),
                        dur_steps: 4,
                    });
                }
            }
        }
    }

    /// The chord sounded outside the grid to confirm a mood change.
    pub fn signal_chord(&self) -> &[Pitch] {
        &self.signal_chord
    }
}
