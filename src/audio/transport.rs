//! Transport - sample-accurate step grid and parameter glides
//!
//! The sequencing engine runs on an eighth-note step grid derived from the
//! audio frame counter. Key properties:
//! - Sample-accurate timing using frame counter arithmetic
//! - Tempo expressed in milli-BPM so glides move smoothly between moods
//! - Pure functions (no side effects, deterministic output)
//! - Zero allocations in timing calculations

/// Steps per beat: the grid is eighth notes.
pub const STEPS_PER_BEAT: u32 = 2;

/// Converts milli-BPM (BPM x 1000) to samples per beat.
///
/// Formula: samples_per_beat = (sample_rate x 60 x 1000) / millibpm
///
/// # Examples
/// ```
/// use mood_mirror::audio::transport::samples_per_beat;
/// // At 120 BPM, 48kHz: 48000 * 60 / 120 = 24000 samples per beat
/// assert_eq!(samples_per_beat(120_000, 48000), 24000);
/// ```
#[inline]
pub fn samples_per_beat(millibpm: u32, sample_rate: u32) -> u64 {
    (sample_rate as u64 * 60_000) / millibpm.max(1) as u64
}

/// Samples between consecutive steps on the eighth-note grid.
#[inline]
pub fn samples_per_step(millibpm: u32, sample_rate: u32) -> u64 {
    (samples_per_beat(millibpm, sample_rate) / STEPS_PER_BEAT as u64).max(1)
}

/// Milliseconds on the audio timeline for a frame index.
#[inline]
pub fn frames_to_ms(frame: u64, sample_rate: u32) -> u64 {
    frame * 1000 / sample_rate.max(1) as u64
}

/// Frames for a duration in seconds at the given rate.
#[inline]
pub fn secs_to_frames(secs: f32, sample_rate: u32) -> u64 {
    (secs.max(0.0) * sample_rate as f32) as u64
}

/// Linear glide toward a target value over a fixed duration.
///
/// Used for tempo and effect parameters: the sequencing engine advances
/// the glide on every scheduler tick and publishes the current value.
/// Re-targeting mid-glide starts a fresh ramp from the current value.
#[derive(Debug, Clone, Copy)]
pub struct ParamGlide {
    current: f32,
    target: f32,
    remaining_secs: f32,
}

impl ParamGlide {
    pub fn new(initial: f32) -> Self {
        Self {
            current: initial,
            target: initial,
            remaining_secs: 0.0,
        }
    }

    /// Begin gliding toward `target` over `glide_secs`.
    ///
    /// A non-positive duration snaps immediately.
    pub fn set_target(&mut self, target: f32, glide_secs: f32) {
        self.target = target;
        if glide_secs <= 0.0 {
            self.current = target;
            self.remaining_secs = 0.0;
        } else {
            self.remaining_secs = glide_secs;
        }
    }

    /// Advance the glide by `dt_secs` and return the current value.
    pub fn advance(&mut self, dt_secs: f32) -> f32 {
        if self.remaining_secs <= 0.0 {
            self.current = self.target;
            return self.current;
        }
        if dt_secs >= self.remaining_secs {
            self.current = self.target;
            self.remaining_secs = 0.0;
        } else {
            let fraction = dt_secs / self.remaining_secs;
            self.current += (self.target - self.current) * fraction;
            self.remaining_secs -= dt_secs;
        }
        self.current
    }

    pub fn value(&self) -> f32 {
        self.current
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn is_settled(&self) -> bool {
        self.remaining_secs <= 0.0
    }
}
