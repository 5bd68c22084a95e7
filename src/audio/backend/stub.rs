//! Stub backend for deterministic testing and headless runs.
//!
//! Instead of opening a device, the stub spawns a clock thread that
//! advances the shared frame counter in real time and drains the command
//! ring the way a device callback would. This lets the full pipeline run
//! (scheduler, epochs, beat events) without audio hardware.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::error::AudioError;

use super::{AudioBackend, StartContext};

const TICK: Duration = Duration::from_millis(5);

pub struct StubBackend {
    stop_flag: Arc<AtomicBool>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl StubBackend {
    pub fn new() -> Self {
        Self {
            stop_flag: Arc::new(AtomicBool::new(false)),
            join: Mutex::new(None),
        }
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for StubBackend {
    fn start(&self, mut ctx: StartContext) -> Result<(), AudioError> {
        let mut guard = self.join.lock().map_err(|_| AudioError::LockPoisoned {
            component: "stub_backend".to_string(),
        })?;
        if guard.is_some() {
            return Err(AudioError::AlreadyRunning);
        }

        self.stop_flag.store(false, Ordering::SeqCst);
        let stop_flag = Arc::clone(&self.stop_flag);
        let shared = Arc::clone(&ctx.shared);

        let handle = std::thread::spawn(move || {
            let frames_per_tick =
                (shared.sample_rate_hz() as u64 * TICK.as_millis() as u64) / 1000;
            while !stop_flag.load(Ordering::SeqCst) {
                shared
                    .frame_counter
                    .fetch_add(frames_per_tick, Ordering::Release);
                // Consume scheduled notes like a device callback would.
                while ctx.commands.pop().is_ok() {}
                std::thread::sleep(TICK);
            }
        });

        *guard = Some(handle);
        Ok(())
    }

    fn stop(&self) -> Result<(), AudioError> {
        let mut guard = self.join.lock().map_err(|_| AudioError::LockPoisoned {
            component: "stub_backend".to_string(),
        })?;
        match guard.take() {
            Some(handle) => {
                self.stop_flag.store(true, Ordering::SeqCst);
                let _ = handle.join();
                Ok(())
            }
            None => Err(AudioError::NotRunning),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioShared;

    #[test]
    fn test_stub_lifecycle_and_clock_advance() {
        let backend = StubBackend::new();
        let shared = Arc::new(AudioShared::new(48000, 0.0));
        let (_tx, rx) = rtrb::RingBuffer::new(16);

        backend
            .start(StartContext {
                shared: Arc::clone(&shared),
                commands: rx,
                voice_pool_size: 8,
            })
            .expect("stub backend should start");

        std::thread::sleep(Duration::from_millis(50));
        assert!(
            shared.current_frame() > 0,
            "stub clock must advance the frame counter"
        );

        backend.stop().expect("stub backend should stop");
        assert!(backend.stop().is_err(), "double stop reports NotRunning");
    }

    #[test]
    fn test_double_start_rejected() {
        let backend = StubBackend::new();
        let shared = Arc::new(AudioShared::new(48000, 0.0));
        let (_tx1, rx1) = rtrb::RingBuffer::new(16);
        let (_tx2, rx2) = rtrb::RingBuffer::new(16);

        backend
            .start(StartContext {
                shared: Arc::clone(&shared),
                commands: rx1,
                voice_pool_size: 8,
            })
            .unwrap();
        let second = backend.start(StartContext {
            shared,
            commands: rx2,
            voice_pool_size: 8,
        });
        assert!(matches!(second, Err(AudioError::AlreadyRunning)));
        backend.stop().unwrap();
    }
}
