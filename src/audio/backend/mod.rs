//! Backend abstractions for audio output.
//!
//! The engine core talks to audio hardware through the [AudioBackend]
//! trait so that tests and headless tooling can run against a stub clock
//! instead of a real device.

use std::sync::Arc;

use rtrb::Consumer;

use crate::audio::voice::VoiceCommand;
use crate::audio::AudioShared;
use crate::error::AudioError;

/// Context handed to a backend when the engine starts.
///
/// Bundles the shared atomic state and the note command consumer so the
/// backend can wire the mixer without coupling to higher-level code.
pub struct StartContext {
    pub shared: Arc<AudioShared>,
    pub commands: Consumer<VoiceCommand>,
    pub voice_pool_size: usize,
}

/// Trait implemented by audio output backends.
///
/// A backend owns the device stream (or its stand-in) and is responsible
/// for advancing `shared.frame_counter` while running.
pub trait AudioBackend: Send + Sync {
    fn start(&self, ctx: StartContext) -> Result<(), AudioError>;
    fn stop(&self) -> Result<(), AudioError>;
}

mod cpal_backend;
pub use cpal_backend::CpalBackend;

mod stub;
pub use stub::StubBackend;
