//! Audio output layer - transport math, voices, lock-free mixer, backends
//!
//! Architecture:
//! - The sequencing engine pushes [voice::VoiceCommand]s into a lock-free
//!   SPSC ring, each tagged with a start frame and session epoch.
//! - The output callback (real-time thread) pops commands, activates them
//!   in a pre-allocated voice pool at their start frame, and mixes them
//!   through the shared effect/gain stages.
//! - All cross-thread state lives in [AudioShared] as atomics; the
//!   callback never locks, allocates, or blocks.

pub mod backend;
pub mod mixer;
pub mod render;
pub mod transport;
pub mod voice;

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// An f32 stored as atomic bits, for lock-free parameter sharing with the
/// audio callback.
#[derive(Debug)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Shared state between the sequencing engine, control surfaces, and the
/// real-time audio callback.
///
/// Everything here is atomic: the callback reads targets and advances the
/// frame counter; control threads only write targets.
#[derive(Debug)]
pub struct AudioShared {
    /// Total frames rendered since engine start (advanced by the callback)
    pub frame_counter: AtomicU64,
    /// Current glided tempo in milli-BPM (BPM x 1000)
    pub tempo_millibpm: AtomicU32,
    /// Epoch of the live playback session; queued commands from older
    /// epochs are discarded before they can sound
    pub active_epoch: AtomicU64,
    /// Output sample rate in Hz (written once at stream start)
    pub sample_rate: AtomicU32,
    /// Master volume in dB
    pub master_gain_db: AtomicF32,
    /// Presence fade target in dB
    pub fade_target_db: AtomicF32,
    /// Presence fade ramp duration in seconds (asymmetric; set per target)
    pub fade_ramp_secs: AtomicF32,
    /// Low-pass cutoff in Hz (glided by the sequencer)
    pub cutoff_hz: AtomicF32,
    /// Delay feedback 0..1 (glided by the sequencer)
    pub delay_feedback: AtomicF32,
    /// Reverb wet mix 0..1 (glided by the sequencer)
    pub reverb_mix: AtomicF32,
}

impl AudioShared {
    pub fn new(sample_rate: u32, master_gain_db: f32) -> Self {
        Self {
            frame_counter: AtomicU64::new(0),
            tempo_millibpm: AtomicU32::new(100_000),
            active_epoch: AtomicU64::new(0),
            sample_rate: AtomicU32::new(sample_rate),
            master_gain_db: AtomicF32::new(master_gain_db),
            fade_target_db: AtomicF32::new(0.0),
            fade_ramp_secs: AtomicF32::new(0.5),
            cutoff_hz: AtomicF32::new(1500.0),
            delay_feedback: AtomicF32::new(0.3),
            reverb_mix: AtomicF32::new(0.5),
        }
    }

    pub fn current_frame(&self) -> u64 {
        self.frame_counter.load(Ordering::Relaxed)
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate.load(Ordering::Relaxed)
    }

    /// Audio-timeline milliseconds for a frame index.
    pub fn frame_to_ms(&self, frame: u64) -> u64 {
        let sr = self.sample_rate_hz().max(1) as u64;
        frame * 1000 / sr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_f32_roundtrip() {
        let a = AtomicF32::new(0.5);
        assert_eq!(a.load(), 0.5);
        a.store(-33.98);
        assert_eq!(a.load(), -33.98);
    }

    #[test]
    fn test_frame_to_ms() {
        let shared = AudioShared::new(48000, -15.0);
        assert_eq!(shared.frame_to_ms(0), 0);
        assert_eq!(shared.frame_to_ms(48000), 1000);
        assert_eq!(shared.frame_to_ms(24000), 500);
    }
}
