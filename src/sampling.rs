//! Sampling task - fixed-cadence classifier polling with a cancel handle
//!
//! The classifier is an external collaborator polled at a fixed cadence
//! (~200 ms). This module wraps that polling interval in an explicit
//! scheduled task: a [SampleSource] supplies observations, the task
//! forwards them into the engine, and the returned handle cancels the
//! task cleanly. A source returning `None` (a transient classification
//! error for that cycle) is delivered as a missed sample so it feeds the
//! presence debounce instead of being fatal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::engine::MoodEngine;
use crate::profile::Emotion;

/// Default polling cadence matching the classifier's frame rate.
pub const DEFAULT_SAMPLE_PERIOD: Duration = Duration::from_millis(200);

/// A source of classifier observations.
///
/// `poll` is called once per cadence tick. Returning `None` marks the
/// cycle as failed; the task treats it like a missed detection.
pub trait SampleSource: Send {
    fn poll(&mut self) -> Option<(Emotion, f32, bool)>;
}

/// Cancelable handle to a running sampling task.
///
/// Dropping the handle cancels the task and joins its thread.
pub struct SamplingTask {
    cancel: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl SamplingTask {
    /// Spawn a sampling loop delivering into `engine` every `period`.
    pub fn spawn(
        engine: Arc<MoodEngine>,
        mut source: Box<dyn SampleSource>,
        period: Duration,
    ) -> Self {
        let cancel = Arc::new(AtomicBool::new(false));
        let cancel_flag = Arc::clone(&cancel);

        let join = std::thread::spawn(move || {
            log::debug!(
                "[Sampling] Task started, period {} ms",
                period.as_millis()
            );
            while !cancel_flag.load(Ordering::SeqCst) {
                let tick_start = Instant::now();

                match source.poll() {
                    Some((emotion, confidence, has_subject)) => {
                        engine.deliver_sample(emotion, confidence, has_subject);
                    }
                    None => {
                        // Failed cycle: counts toward the miss debounce.
                        engine.deliver_sample(Emotion::Neutral, 0.0, false);
                    }
                }

                let elapsed = tick_start.elapsed();
                if elapsed < period {
                    std::thread::sleep(period - elapsed);
                }
            }
            log::debug!("[Sampling] Task cancelled");
        });

        Self {
            cancel,
            join: Some(join),
        }
    }

    /// Cancel the task and wait for its thread to exit.
    pub fn cancel(&mut self) {
        self.cancel.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for SamplingTask {
    fn drop(&mut self) {
        self.cancel();
    }
}
