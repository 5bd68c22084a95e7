//! Musical profile table - per-mood scale, harmony, tempo, and timbre data
//!
//! This module holds the static mapping from each classified emotion to the
//! musical material the sequencing engine plays for it. The table is pure
//! data: scales, chord progressions, bass lines, tempo, oscillator choice,
//! and effect settings. It is built once at startup and validated for
//! completeness (all seven moods present).

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Closed set of classified affect categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    Happy,
    Sad,
    Angry,
    Fearful,
    Disgusted,
    Surprised,
    Neutral,
}

impl Emotion {
    /// All seven moods, used for table validation and CLI listings.
    pub const ALL: [Emotion; 7] = [
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Angry,
        Emotion::Fearful,
        Emotion::Disgusted,
        Emotion::Surprised,
        Emotion::Neutral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Angry => "angry",
            Emotion::Fearful => "fearful",
            Emotion::Disgusted => "disgusted",
            Emotion::Surprised => "surprised",
            Emotion::Neutral => "neutral",
        }
    }

    /// Parse a mood from its lowercase name. Returns None for unknown names.
    pub fn from_name(name: &str) -> Option<Emotion> {
        Emotion::ALL.iter().copied().find(|e| e.as_str() == name)
    }
}

impl std::fmt::Display for Emotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pitch as a MIDI note number (A4 = 69 = 440 Hz).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pitch(pub u8);

impl Pitch {
    /// Frequency in Hz under twelve-tone equal temperament.
    pub fn freq_hz(&self) -> f32 {
        440.0 * 2f32.powf((self.0 as f32 - 69.0) / 12.0)
    }
}

// Natural pitches used by the profile table.
pub const C2: Pitch = Pitch(36);
pub const D2: Pitch = Pitch(38);
pub const E2: Pitch = Pitch(40);
pub const F2: Pitch = Pitch(41);
pub const G2: Pitch = Pitch(43);
pub const A2: Pitch = Pitch(45);
pub const C3: Pitch = Pitch(48);
pub const D3: Pitch = Pitch(50);
pub const E3: Pitch = Pitch(52);
pub const F3: Pitch = Pitch(53);
pub const G3: Pitch = Pitch(55);
pub const A3: Pitch = Pitch(57);
pub const B3: Pitch = Pitch(59);
pub const C4: Pitch = Pitch(60);
pub const D4: Pitch = Pitch(62);
pub const E4: Pitch = Pitch(64);
pub const F4: Pitch = Pitch(65);
pub const G4: Pitch = Pitch(67);
pub const A4: Pitch = Pitch(69);
pub const B4: Pitch = Pitch(71);
pub const C5: Pitch = Pitch(72);
pub const D5: Pitch = Pitch(74);
pub const E5: Pitch = Pitch(76);

/// Oscillator shape for a synthesized voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Waveform {
    Sine,
    Triangle,
    Sawtooth,
    Square,
    /// White noise burst (snare)
    Noise,
    /// Sine with an exponential pitch drop (kick drum)
    Kick,
}

/// Timbre parameters for the lead voice of a mood.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Timbre {
    pub oscillator: Waveform,
}

impl Timbre {
    pub fn name(&self) -> &'static str {
        match self.oscillator {
            Waveform::Sine => "sine",
            Waveform::Triangle => "triangle",
            Waveform::Sawtooth => "sawtooth",
            Waveform::Square => "square",
            Waveform::Noise => "noise",
            Waveform::Kick => "kick",
        }
    }
}

/// Per-mood effect settings. Optional fields are only present for moods
/// that use the effect at all.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EffectParams {
    /// Low-pass filter cutoff in Hz
    pub cutoff_hz: f32,
    /// Reverb wet mix, 0..1
    pub reverb_mix: f32,
    /// Chorus depth, 0..1
    pub chorus_depth: f32,
    /// Delay feedback, 0..1
    pub delay_feedback: f32,
    pub distortion: Option<f32>,
    pub phaser_depth: Option<f32>,
}

impl EffectParams {
    /// Distortion drive with the silent default applied.
    pub fn distortion_or_default(&self) -> f32 {
        self.distortion.unwrap_or(0.2)
    }
}

/// Complete musical definition of one mood.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MusicalProfile {
    /// Scale the melody draws from, low to high
    pub scale: Vec<Pitch>,
    /// Chord progression for the pad track
    pub chords: Vec<Vec<Pitch>>,
    /// Bass line; None slots are rests
    pub bass_line: Vec<Option<Pitch>>,
    pub tempo_bpm: u32,
    pub timbre: Timbre,
    pub effects: EffectParams,
}

fn timbre(oscillator: Waveform) -> Timbre {
    Timbre { oscillator }
}

fn build_profiles() -> HashMap<Emotion, MusicalProfile> {
    let mut table = HashMap::new();

    // Major scale, bright and fast
    table.insert(
        Emotion::Happy,
        MusicalProfile {
            scale: vec![C4, D4, E4, F4, G4, A4, B4, C5],
            chords: vec![vec![C4, E4, G4], vec![F4, A4, C5], vec![G4, B4, D5]],
            bass_line: vec![Some(C3), Some(G3), Some(F3), Some(G3)],
            tempo_bpm: 120,
            timbre: timbre(Waveform::Triangle),
            effects: EffectParams {
                cutoff_hz: 2000.0,
                reverb_mix: 0.3,
                chorus_depth: 0.3,
                delay_feedback: 0.2,
                distortion: None,
                phaser_depth: None,
            },
        },
    );

    // Natural minor, slow, washed in reverb
    table.insert(
        Emotion::Sad,
        MusicalProfile {
            scale: vec![A3, C4, D4, E4, G4, A4],
            chords: vec![vec![A3, C4, E4], vec![G3, B3, D4], vec![E3, G3, B3]],
            bass_line: vec![Some(A2), Some(E3), Some(G2), Some(D3)],
            tempo_bpm: 75,
            timbre: timbre(Waveform::Sine),
            effects: EffectParams {
                cutoff_hz: 800.0,
                reverb_mix: 0.8,
                chorus_depth: 0.4,
                delay_feedback: 0.5,
                distortion: None,
                phaser_depth: None,
            },
        },
    );

    // Phrygian mode, driving and distorted
    table.insert(
        Emotion::Angry,
        MusicalProfile {
            scale: vec![E3, G3, A3, B3, D4, E4],
            chords: vec![vec![E3, G3, B3, D4], vec![A3, C4, E4], vec![B3, D4, F4]],
            bass_line: vec![Some(E2), Some(F2), Some(D2), Some(E2)],
            tempo_bpm: 140,
            timbre: timbre(Waveform::Sawtooth),
            effects: EffectParams {
                cutoff_hz: 4000.0,
                reverb_mix: 0.2,
                chorus_depth: 0.1,
                delay_feedback: 0.1,
                distortion: Some(0.8),
                phaser_depth: None,
            },
        },
    );

    // Dorian mode, muted and swirling
    table.insert(
        Emotion::Fearful,
        MusicalProfile {
            scale: vec![D3, F3, G3, A3, C4, D4],
            chords: vec![vec![D3, F3, A3], vec![C3, E3, G3], vec![A2, C3, E3]],
            bass_line: vec![Some(D2), Some(A2), Some(C2), Some(G2)],
            tempo_bpm: 95,
            timbre: timbre(Waveform::Triangle),
            effects: EffectParams {
                cutoff_hz: 600.0,
                reverb_mix: 0.9,
                chorus_depth: 0.6,
                delay_feedback: 0.7,
                distortion: None,
                phaser_depth: Some(0.6),
            },
        },
    );

    // Altered scale, uneasy mid-tempo
    table.insert(
        Emotion::Disgusted,
        MusicalProfile {
            scale: vec![D3, E3, F3, G3, A3, C4, D4],
            chords: vec![vec![D3, F3, G3], vec![G3, C4, D4], vec![F3, A3, C4]],
            bass_line: vec![Some(D2), Some(G2), Some(F2), Some(A2)],
            tempo_bpm: 85,
            timbre: timbre(Waveform::Square),
            effects: EffectParams {
                cutoff_hz: 1200.0,
                reverb_mix: 0.5,
                chorus_depth: 0.3,
                delay_feedback: 0.3,
                distortion: Some(0.5),
                phaser_depth: None,
            },
        },
    );

    // Major pentatonic, open and sparkling
    table.insert(
        Emotion::Surprised,
        MusicalProfile {
            scale: vec![C4, D4, E4, G4, A4, C5],
            chords: vec![vec![C4, E4, G4, B4], vec![G4, B4, D5], vec![A4, C5, E5]],
            bass_line: vec![Some(C3), Some(G3), Some(A3), Some(E3)],
            tempo_bpm: 110,
            timbre: timbre(Waveform::Triangle),
            effects: EffectParams {
                cutoff_hz: 3000.0,
                reverb_mix: 0.4,
                chorus_depth: 0.5,
                delay_feedback: 0.4,
                distortion: None,
                phaser_depth: Some(0.4),
            },
        },
    );

    // Pentatonic, calm baseline state
    table.insert(
        Emotion::Neutral,
        MusicalProfile {
            scale: vec![C4, D4, E4, G4, A4],
            chords: vec![vec![C4, E4, G4], vec![G3, B3, D4], vec![A3, C4, E4]],
            bass_line: vec![Some(C3), Some(G2), Some(A2), Some(D3)],
            tempo_bpm: 95,
            timbre: timbre(Waveform::Sine),
            effects: EffectParams {
                cutoff_hz: 1500.0,
                reverb_mix: 0.5,
                chorus_depth: 0.2,
                delay_feedback: 0.3,
                distortion: None,
                phaser_depth: None,
            },
        },
    );

    table
}

static PROFILES: Lazy<HashMap<Emotion, MusicalProfile>> = Lazy::new(|| {
    let table = build_profiles();
    debug_assert!(
        Emotion::ALL.iter().all(|e| table.contains_key(e)),
        "profile table must cover every mood"
    );
    table
});

/// Resolve the profile for a mood.
///
/// Falls back to the neutral profile so that resolution can never fail,
/// even if the table were edited down.
pub fn profile_for(emotion: Emotion) -> &'static MusicalProfile {
    PROFILES.get(&emotion).unwrap_or_else(|| {
        log::warn!(
            "[Profile] No profile for mood '{}', falling back to neutral",
            emotion
        );
        &PROFILES[&Emotion::Neutral]
    })
}

/// Human-readable scale name for the parameter display.
pub fn scale_name(emotion: Emotion) -> &'static str {
    match emotion {
        Emotion::Happy => "major",
        Emotion::Sad => "minor",
        Emotion::Angry => "phrygian",
        Emotion::Fearful => "dorian",
        Emotion::Disgusted => "altered",
        Emotion::Surprised => "major pentatonic",
        Emotion::Neutral => "pentatonic",
    }
}
