//! CPAL-based audio output backend for desktop platforms.
//!
//! The cpal stream handle is not `Send`, so the stream lives on a
//! dedicated thread for its whole lifetime: the thread opens the device,
//! reports readiness back to the caller, then parks until `stop` signals
//! it to drop the stream and exit.

use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::sync::Mutex;
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::audio::mixer::Mixer;
use crate::error::{log_audio_error, AudioError};

use super::{AudioBackend, StartContext};

struct StreamControl {
    stop_tx: mpsc::Sender<()>,
    join: JoinHandle<()>,
}

/// Audio backend driving the default cpal output device.
pub struct CpalBackend {
    control: Mutex<Option<StreamControl>>,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self {
            control: Mutex::new(None),
        }
    }

    fn open_stream(ctx: StartContext) -> Result<(cpal::Stream, u32), AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::NoOutputDevice)?;

        let config = device
            .default_output_config()
            .map_err(|e| AudioError::StreamOpenFailed {
                reason: format!("Failed to get default output config: {:?}", e),
            })?;

        let stream_config: cpal::StreamConfig = config.clone().into();
        let channels = stream_config.channels as usize;
        let sample_rate = stream_config.sample_rate.0;
        ctx.shared.sample_rate.store(sample_rate, Ordering::Relaxed);

        let mut mixer = Mixer::new(
            ctx.shared,
            ctx.commands,
            sample_rate,
            ctx.voice_pool_size,
        );

        let err_fn = |err| log::error!("[CpalBackend] Output stream error: {}", err);

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => device
                .build_output_stream(
                    &stream_config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        mixer.process(data, channels);
                    },
                    err_fn,
                    None,
                )
                .map_err(|e| AudioError::StreamOpenFailed {
                    reason: format!("{:?}", e),
                })?,
            other => {
                return Err(AudioError::UnsupportedFormat {
                    format: format!("{:?}", other),
                })
            }
        };

        Ok((stream, sample_rate))
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for CpalBackend {
    fn start(&self, ctx: StartContext) -> Result<(), AudioError> {
        let mut guard = self.control.lock().map_err(|_| AudioError::LockPoisoned {
            component: "cpal_backend".to_string(),
        })?;
        if guard.is_some() {
            return Err(AudioError::AlreadyRunning);
        }

        let (ready_tx, ready_rx) = mpsc::channel::<Result<u32, AudioError>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let join = std::thread::spawn(move || {
            let stream = match Self::open_stream(ctx) {
                Ok((stream, sample_rate)) => {
                    if let Err(e) = stream.play() {
                        let _ = ready_tx.send(Err(AudioError::HardwareError {
                            details: format!("Failed to start output stream: {:?}", e),
                        }));
                        return;
                    }
                    let _ = ready_tx.send(Ok(sample_rate));
                    stream
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                    return;
                }
            };

            // Park until stop() signals or the sender is dropped, then let
            // the stream fall out of scope to close the device.
            let _ = stop_rx.recv();
            drop(stream);
        });

        match ready_rx.recv() {
            Ok(Ok(sample_rate)) => {
                log::info!("[CpalBackend] Output stream running at {} Hz", sample_rate);
                *guard = Some(StreamControl { stop_tx, join });
                Ok(())
            }
            Ok(Err(err)) => {
                let _ = join.join();
                log_audio_error(&err, "cpal_start");
                Err(err)
            }
            Err(_) => {
                let err = AudioError::StreamOpenFailed {
                    reason: "Audio thread exited before reporting readiness".to_string(),
                };
                log_audio_error(&err, "cpal_start");
                Err(err)
            }
        }
    }

    fn stop(&self) -> Result<(), AudioError> {
        let mut guard = self.control.lock().map_err(|_| AudioError::LockPoisoned {
            component: "cpal_backend".to_string(),
        })?;
        match guard.take() {
            Some(control) => {
                let _ = control.stop_tx.send(());
                let _ = control.join.join();
                log::info!("[CpalBackend] Output stream stopped");
                Ok(())
            }
            None => Err(AudioError::NotRunning),
        }
    }
}
