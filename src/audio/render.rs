//! Offline rendering - synthesize a mood's pattern straight to samples
//!
//! Runs the same session build, step scheduling, and voice synthesis as
//! the live engine, but against a simulated clock, producing a mono buffer
//! suitable for WAV export. Used by the CLI to preview moods without an
//! audio device.

use std::path::Path;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::profile::{profile_for, Emotion};
use crate::sequencer::scheduler::StepScheduler;
use crate::sequencer::session::PlaybackSession;

use super::mixer::db_to_linear;
use super::voice::Voice;

/// Headroom applied to the offline mix.
const RENDER_GAIN_DB: f32 = -12.0;

/// Render `seconds` of a mood's pattern into a mono sample buffer.
///
/// `seed` fixes the melody draw for reproducible output; `None` draws a
/// fresh melody like the live engine does.
pub fn render_mood(
    emotion: Emotion,
    seconds: f32,
    seed: Option<u64>,
    sample_rate: u32,
) -> Vec<f32> {
    let profile = profile_for(emotion);
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let session = PlaybackSession::build(emotion, profile, 1, &mut rng);

    let total_frames = (seconds.max(0.0) * sample_rate as f32) as u64;
    let mut scheduler = StepScheduler::new();
    scheduler.install(session, 0);

    let mut notes = Vec::new();
    scheduler.schedule_until(
        total_frames,
        profile.tempo_bpm * 1000,
        sample_rate,
        &mut notes,
    );
    // Scheduling emits in step order, so activation can walk an index.
    let mut next_note = 0;

    let sr = sample_rate as f32;
    let lp_coeff = 1.0 - (-std::f32::consts::TAU * profile.effects.cutoff_hz / sr).exp();
    let feedback = profile.effects.delay_feedback.clamp(0.0, 0.95);
    let wet = profile.effects.reverb_mix * 0.5;
    let gain = db_to_linear(RENDER_GAIN_DB);

    let mut voices: Vec<Voice> = Vec::new();
    let mut delay_buf = vec![0.0f32; (sample_rate as usize / 4).max(1)];
    let mut delay_pos = 0usize;
    let mut lp_state = 0.0f32;

    let mut out = Vec::with_capacity(total_frames as usize);
    for frame in 0..total_frames {
        while next_note < notes.len() && notes[next_note].command.start_frame <= frame {
            let mut voice = Voice::idle();
            voice.activate(notes[next_note].command);
            voices.push(voice);
            next_note += 1;
        }

        let mut mix = 0.0f32;
        for voice in &mut voices {
            mix += voice.next_sample(sr);
        }
        voices.retain(|v| v.is_active());

        lp_state += lp_coeff * (mix - lp_state);
        let delayed = delay_buf[delay_pos];
        delay_buf[delay_pos] = lp_state * 0.5 + delayed * feedback;
        delay_pos = (delay_pos + 1) % delay_buf.len();

        out.push(((lp_state + delayed * wet) * gain).clamp(-1.0, 1.0));
    }
    out
}

/// Write a mono buffer as a 16-bit WAV file.
pub fn write_wav<P: AsRef<Path>>(
    path: P,
    samples: &[f32],
    sample_rate: u32,
) -> Result<(), hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
    }
    writer.finalize()
}
