//! Configuration management for dynamic parameter tuning
//!
//! This module provides runtime configuration loading from JSON files,
//! enabling fast iteration without recompilation. Key parameters for
//! mood stabilization, audio output, and the sequencing engine can be
//! adjusted via the config file for rapid experimentation.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub stabilization: StabilizationConfig,
    pub audio: AudioConfig,
    pub sequencer: SequencerConfig,
    #[serde(default)]
    pub mode: MusicMode,
}

/// How mood changes are driven
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MusicMode {
    /// Moods come from the classifier stream through the stabilizer
    #[default]
    Dynamic,
    /// The stabilizer is bypassed; moods are set directly by the user
    Manual,
}

/// Mood stabilization parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StabilizationConfig {
    /// Seconds a raw emotion must persist before it is committed
    pub stability_threshold_secs: f32,
    /// Samples below this confidence are discarded without touching state
    pub confidence_threshold: f32,
    /// Consecutive missed samples before presence is declared lost
    pub presence_miss_limit: u32,
    /// Declare presence lost on the first missed sample instead of debouncing
    pub immediate_absence: bool,
}

impl Default for StabilizationConfig {
    fn default() -> Self {
        Self {
            stability_threshold_secs: 1.0,
            confidence_threshold: 0.3,
            presence_miss_limit: 3,
            immediate_absence: false,
        }
    }
}

/// Audio engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Preferred output sample rate in Hz
    pub sample_rate: u32,
    /// Master output volume in dB (UI range -60..0)
    pub master_volume_db: f32,
    /// Maximum simultaneously sounding voices in the mixer pool
    pub voice_pool_size: usize,
    /// Capacity of the lock-free note command queue
    pub command_queue_size: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            master_volume_db: -15.0,
            voice_pool_size: 64,
            command_queue_size: 256,
        }
    }
}

/// Sequencing engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequencerConfig {
    /// How far ahead of the audio clock steps are scheduled, in ms
    pub lookahead_ms: u64,
    /// Scheduler thread tick period in ms
    pub tick_ms: u64,
    /// Seconds over which tempo glides to a new profile's BPM
    pub tempo_glide_secs: f32,
    /// Seconds over which effect parameters glide to new targets
    pub effect_glide_secs: f32,
    /// Optional fixed seed for melody pattern draws (reproducible sessions)
    #[serde(default)]
    pub melody_seed: Option<u64>,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            lookahead_ms: 120,
            tick_ms: 25,
            tempo_glide_secs: 2.0,
            effect_glide_secs: 0.5,
            melody_seed: None,
        }
    }
}

impl Default for AppConfig {
    /// Default configuration values (fallback if config file not found)
    fn default() -> Self {
        Self {
            stabilization: StabilizationConfig::default(),
            audio: AudioConfig::default(),
            sequencer: SequencerConfig::default(),
            mode: MusicMode::Dynamic,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The loaded configuration, or the default config if the file is
    /// missing or contains invalid JSON.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the default location
    pub fn load() -> Self {
        Self::load_from_file("assets/mood_mirror.json")
    }
}
