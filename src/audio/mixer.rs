//! Mixer - real-time voice pool and output processing
//!
//! The mixer owns everything the output callback touches: the SPSC command
//! consumer, a fixed voice pool, the delay/filter effect state, and the
//! smoothed fade/master gain stages. `process` is called from the real-time
//! audio thread and is allocation-free: the pool and pending queue are
//! pre-allocated, command intake is bounded, and all parameter reads are
//! atomic loads from [AudioShared].
//!
//! Session cancellation happens here: every command carries the epoch of
//! the session that scheduled it, and any command whose epoch no longer
//! matches the active epoch is discarded before it can sound.

use std::sync::Arc;

use rtrb::Consumer;

use super::voice::{Voice, VoiceCommand};
use super::AudioShared;

/// Maximum commands waiting for their start frame.
const PENDING_CAPACITY: usize = 128;

/// Fade smoothing reaches ~95% of the target within the configured ramp.
const RAMP_SETTLE_FACTOR: f32 = 3.0;

/// Convert decibels to linear gain.
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

/// Convert linear gain to decibels, clamped at a silence floor instead of
/// negative infinity.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    20.0 * linear.max(1e-4).log10()
}

pub struct Mixer {
    shared: Arc<AudioShared>,
    commands: Consumer<VoiceCommand>,
    /// Commands accepted but not yet at their start frame
    pending: Vec<VoiceCommand>,
    /// Fixed pool of reusable voice slots
    voices: Vec<Voice>,
    delay_buf: Vec<f32>,
    delay_pos: usize,
    lp_state: f32,
    /// Smoothed presence fade gain in dB
    fade_db: f32,
    sample_rate: f32,
    /// Epoch observed on the previous block, to detect session swaps
    last_epoch: u64,
}

impl Mixer {
    /// Build a mixer with pre-allocated state for the given output rate.
    ///
    /// All buffers are sized here; `process` never allocates.
    pub fn new(
        shared: Arc<AudioShared>,
        commands: Consumer<VoiceCommand>,
        sample_rate: u32,
        voice_pool_size: usize,
    ) -> Self {
        // 250ms delay line, enough for an eighth note down to 120 BPM
        let delay_len = (sample_rate as usize / 4).max(1);
        Self {
            shared,
            commands,
            pending: Vec::with_capacity(PENDING_CAPACITY),
            voices: vec![Voice::idle(); voice_pool_size.max(1)],
            delay_buf: vec![0.0; delay_len],
            delay_pos: 0,
            lp_state: 0.0,
            fade_db: 0.0,
            sample_rate: sample_rate as f32,
            last_epoch: 0,
        }
    }

    /// Render one output buffer. `out` is interleaved with `channels`
    /// channels; the same mono mix is written to each.
    pub fn process(&mut self, out: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        let frames = out.len() / channels;
        let start_frame = self.shared.current_frame();
        let epoch = self
            .shared
            .active_epoch
            .load(std::sync::atomic::Ordering::Acquire);

        self.intake_commands(epoch);

        // On a session swap, notes of the retiring session that are still
        // holding get their release started; only their decay remains.
        if epoch != self.last_epoch {
            self.last_epoch = epoch;
            for voice in &mut self.voices {
                if voice.is_active() && voice.epoch() != epoch {
                    voice.release_now();
                }
            }
        }

        // Per-block parameter snapshot; targets change far slower than the
        // buffer rate.
        let cutoff = self.shared.cutoff_hz.load().clamp(40.0, 18_000.0);
        let lp_coeff = 1.0 - (-std::f32::consts::TAU * cutoff / self.sample_rate).exp();
        let feedback = self.shared.delay_feedback.load().clamp(0.0, 0.95);
        let wet = self.shared.reverb_mix.load().clamp(0.0, 1.0) * 0.5;
        let master = db_to_linear(self.shared.master_gain_db.load());
        let fade_target = self.shared.fade_target_db.load();
        let ramp_secs = self.shared.fade_ramp_secs.load().max(0.01);
        let fade_coeff = 1.0 - (-RAMP_SETTLE_FACTOR / (ramp_secs * self.sample_rate)).exp();

        for i in 0..frames {
            let frame = start_frame + i as u64;
            self.activate_due(frame, epoch);

            let mut mix = 0.0f32;
            for voice in &mut self.voices {
                mix += voice.next_sample(self.sample_rate);
            }

            // One-pole low-pass at the glided cutoff
            self.lp_state += lp_coeff * (mix - self.lp_state);

            // Single feedback delay doubling as a cheap reverb tail
            let delayed = self.delay_buf[self.delay_pos];
            self.delay_buf[self.delay_pos] = self.lp_state * 0.5 + delayed * feedback;
            self.delay_pos = (self.delay_pos + 1) % self.delay_buf.len();

            // Presence fade ramps in the log domain
            self.fade_db += fade_coeff * (fade_target - self.fade_db);
            let gain = db_to_linear(self.fade_db) * master;

            let sample = ((self.lp_state + delayed * wet) * gain).clamp(-1.0, 1.0);
            for ch in 0..channels {
                out[i * channels + ch] = sample;
            }
        }

        self.shared
            .frame_counter
            .fetch_add(frames as u64, std::sync::atomic::Ordering::Release);
    }

    /// Pull newly scheduled commands from the ring, dropping any from
    /// retired sessions. Bounded by ring and pending capacity.
    fn intake_commands(&mut self, epoch: u64) {
        self.pending.retain(|cmd| cmd.epoch == epoch);
        while self.pending.len() < PENDING_CAPACITY {
            match self.commands.pop() {
                Ok(cmd) => {
                    if cmd.epoch == epoch {
                        self.pending.push(cmd);
                    }
                }
                Err(_) => break,
            }
        }
    }

    /// Move pending commands whose start frame has arrived into free voice
    /// slots. Stale epochs are re-checked so a swap mid-buffer still
    /// silences the retiring session's queued notes.
    fn activate_due(&mut self, frame: u64, epoch: u64) {
        let mut i = 0;
        while i < self.pending.len() {
            let cmd = self.pending[i];
            if cmd.start_frame <= frame {
                self.pending.swap_remove(i);
                if cmd.epoch == epoch {
                    if let Some(slot) = self.voices.iter_mut().find(|v| !v.is_active()) {
                        slot.activate(cmd);
                    }
                    // Pool exhausted: the note is dropped. Never block.
                }
            } else {
                i += 1;
            }
        }
    }

    /// Number of currently sounding voices (diagnostics).
    pub fn active_voices(&self) -> usize {
        self.voices.iter().filter(|v| v.is_active()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::voice::AmpEnvelope;
    use crate::profile::Waveform;

    fn make_mixer(pool: usize) -> (Mixer, rtrb::Producer<VoiceCommand>, Arc<AudioShared>) {
        let shared = Arc::new(AudioShared::new(48000, 0.0));
        let (tx, rx) = rtrb::RingBuffer::new(64);
        let mixer = Mixer::new(Arc::clone(&shared), rx, 48000, pool);
        (mixer, tx, shared)
    }

    fn note(start_frame: u64, epoch: u64) -> VoiceCommand {
        VoiceCommand {
            start_frame,
            epoch,
            waveform: Waveform::Sine,
            freq_hz: 440.0,
            amp: 0.5,
            hold_frames: 4800,
            env: AmpEnvelope::new(0.001, 0.01, 0.8, 0.1),
            drive: 0.0,
        }
    }

    #[test]
    fn test_db_linear_roundtrip() {
        assert!((db_to_linear(0.0) - 1.0).abs() < 1e-6);
        assert!((db_to_linear(-20.0) - 0.1).abs() < 1e-6);
        assert!((linear_to_db(1.0)).abs() < 1e-6);
        // Floor clamp instead of -inf
        assert!(linear_to_db(0.0) > f32::NEG_INFINITY);
    }

    #[test]
    fn test_scheduled_note_sounds_at_start_frame() {
        let (mut mixer, mut tx, shared) = make_mixer(8);
        shared
            .active_epoch
            .store(1, std::sync::atomic::Ordering::Release);
        tx.push(note(256, 1)).unwrap();

        let mut buf = vec![0.0f32; 256];
        mixer.process(&mut buf, 1);
        assert!(
            buf.iter().all(|s| s.abs() < 1e-6),
            "nothing should sound before the start frame"
        );

        mixer.process(&mut buf, 1);
        assert_eq!(mixer.active_voices(), 1);
        assert!(
            buf.iter().any(|s| s.abs() > 1e-6),
            "note should sound once its frame arrives"
        );
    }

    #[test]
    fn test_stale_epoch_commands_never_sound() {
        let (mut mixer, mut tx, shared) = make_mixer(8);
        shared
            .active_epoch
            .store(2, std::sync::atomic::Ordering::Release);

        // Queued under epoch 1, but epoch 2 is live: must be discarded.
        tx.push(note(0, 1)).unwrap();
        let mut buf = vec![0.0f32; 512];
        mixer.process(&mut buf, 1);
        assert_eq!(mixer.active_voices(), 0);
        assert!(buf.iter().all(|s| s.abs() < 1e-6));
    }

    #[test]
    fn test_epoch_swap_drops_pending_notes() {
        let (mut mixer, mut tx, shared) = make_mixer(8);
        shared
            .active_epoch
            .store(1, std::sync::atomic::Ordering::Release);

        // Far-future note accepted under epoch 1
        tx.push(note(96000, 1)).unwrap();
        let mut buf = vec![0.0f32; 256];
        mixer.process(&mut buf, 1);

        // Session swap: epoch 2 goes live before the note's frame arrives
        shared
            .active_epoch
            .store(2, std::sync::atomic::Ordering::Release);
        for _ in 0..500 {
            mixer.process(&mut buf, 1);
        }
        assert_eq!(
            mixer.active_voices(),
            0,
            "stale pending notes must not fire after a session swap"
        );
    }

    #[test]
    fn test_epoch_swap_releases_sounding_voices() {
        let (mut mixer, mut tx, shared) = make_mixer(8);
        shared
            .active_epoch
            .store(1, std::sync::atomic::Ordering::Release);

        // A long-held note starts sounding under epoch 1.
        let mut long_note = note(0, 1);
        long_note.hold_frames = 480_000;
        tx.push(long_note).unwrap();
        let mut buf = vec![0.0f32; 256];
        mixer.process(&mut buf, 1);
        assert_eq!(mixer.active_voices(), 1);

        // After the swap, the voice is pushed into release and dies within
        // its release time instead of holding for ten seconds.
        shared
            .active_epoch
            .store(2, std::sync::atomic::Ordering::Release);
        for _ in 0..30 {
            mixer.process(&mut buf, 1); // ~0.16s at 48kHz, release is 0.1s
        }
        assert_eq!(
            mixer.active_voices(),
            0,
            "retired-session voices must release at the swap"
        );
    }

    #[test]
    fn test_pool_exhaustion_drops_instead_of_blocking() {
        let (mut mixer, mut tx, shared) = make_mixer(2);
        shared
            .active_epoch
            .store(1, std::sync::atomic::Ordering::Release);
        for _ in 0..6 {
            tx.push(note(0, 1)).unwrap();
        }

        let mut buf = vec![0.0f32; 64];
        mixer.process(&mut buf, 1);
        assert_eq!(mixer.active_voices(), 2, "pool caps concurrent voices");
    }

    #[test]
    fn test_frame_counter_advances_by_frames_not_samples() {
        let (mut mixer, _tx, shared) = make_mixer(4);
        let mut buf = vec![0.0f32; 128 * 2]; // stereo
        mixer.process(&mut buf, 2);
        assert_eq!(shared.current_frame(), 128);
    }
}
