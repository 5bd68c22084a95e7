use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use mood_mirror::audio::render::{render_mood, write_wav};
use mood_mirror::config::{AppConfig, MusicMode};
use mood_mirror::profile::{profile_for, Emotion};
use mood_mirror::sampling::{SampleSource, SamplingTask, DEFAULT_SAMPLE_PERIOD};
use mood_mirror::MoodEngine;

#[derive(Parser, Debug)]
#[command(
    name = "mood_mirror_cli",
    about = "Mood-driven generative music engine"
)]
struct Cli {
    /// Path to a JSON config file (defaults apply when omitted)
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the engine live, cycling through a scripted mood sequence
    Run {
        /// Comma-separated moods to cycle through (e.g. happy,sad,angry)
        #[arg(long, default_value = "neutral,happy,angry,sad")]
        moods: String,
        /// Seconds to hold each scripted mood
        #[arg(long, default_value_t = 6.0)]
        hold_secs: f32,
        /// Total run time in seconds
        #[arg(long, default_value_t = 30)]
        duration_secs: u64,
        /// Bypass the stabilizer and play one mood directly
        #[arg(long)]
        manual: Option<String>,
    },
    /// Render a mood's pattern offline to a WAV file
    Render {
        #[arg(long)]
        mood: String,
        #[arg(long, default_value_t = 8.0)]
        seconds: f32,
        /// Fixed melody seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        output: PathBuf,
    },
    /// Dump the musical profile table as JSON
    Profiles,
}

/// Scripted classifier stand-in: cycles through a mood list with full
/// confidence, as if the subject held each expression in turn.
struct ScriptedSource {
    moods: Vec<Emotion>,
    hold: Duration,
    started: Instant,
}

impl SampleSource for ScriptedSource {
    fn poll(&mut self) -> Option<(Emotion, f32, bool)> {
        let slot = (self.started.elapsed().as_secs_f64() / self.hold.as_secs_f64()) as usize;
        let mood = self.moods[slot % self.moods.len()];
        Some((mood, 0.9, true))
    }
}

fn main() -> ExitCode {
    env_logger::init();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Run {
            moods,
            hold_secs,
            duration_secs,
            manual,
        } => run_live(config, &moods, hold_secs, duration_secs, manual.as_deref()),
        Commands::Render {
            mood,
            seconds,
            seed,
            output,
        } => run_render(&mood, seconds, seed, &output),
        Commands::Profiles => {
            let table: Vec<_> = Emotion::ALL
                .iter()
                .map(|&e| serde_json::json!({ "mood": e, "profile": profile_for(e) }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&table)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn parse_mood(name: &str) -> Result<Emotion> {
    match Emotion::from_name(name.trim()) {
        Some(mood) => Ok(mood),
        None => bail!(
            "unknown mood '{}' (expected one of: {})",
            name,
            Emotion::ALL.map(|e| e.as_str()).join(", ")
        ),
    }
}

fn run_live(
    config: AppConfig,
    moods: &str,
    hold_secs: f32,
    duration_secs: u64,
    manual: Option<&str>,
) -> Result<ExitCode> {
    let engine = Arc::new(MoodEngine::new(config));
    let mut params_rx = engine
        .subscribe_parameters()
        .context("parameter channel missing")?;
    engine
        .start()
        .context("failed to start the audio engine")?;

    std::thread::spawn(move || {
        while let Ok(snapshot) = params_rx.blocking_recv() {
            println!(
                "now playing: {} BPM, {} scale, reverb {:.0}%, {} lead",
                snapshot.tempo_bpm,
                snapshot.scale_name,
                snapshot.reverb_amount * 100.0,
                snapshot.timbre_name
            );
        }
    });

    let task = match manual {
        Some(name) => {
            let mood = parse_mood(name)?;
            engine.set_mode(MusicMode::Manual);
            engine.set_manual_mood(mood);
            println!("manual mode: {}", mood);
            None
        }
        None => {
            let moods = moods
                .split(',')
                .map(parse_mood)
                .collect::<Result<Vec<_>>>()?;
            println!(
                "cycling moods every {:.1}s: {:?}",
                hold_secs,
                moods.iter().map(|m| m.as_str()).collect::<Vec<_>>()
            );
            let source = ScriptedSource {
                moods,
                hold: Duration::from_secs_f32(hold_secs.max(0.5)),
                started: Instant::now(),
            };
            Some(SamplingTask::spawn(
                Arc::clone(&engine),
                Box::new(source),
                DEFAULT_SAMPLE_PERIOD,
            ))
        }
    };

    std::thread::sleep(Duration::from_secs(duration_secs));

    drop(task);
    engine.stop().context("failed to stop the audio engine")?;
    Ok(ExitCode::SUCCESS)
}

fn run_render(mood: &str, seconds: f32, seed: Option<u64>, output: &PathBuf) -> Result<ExitCode> {
    const RENDER_SAMPLE_RATE: u32 = 48000;

    let mood = parse_mood(mood)?;
    let samples = render_mood(mood, seconds, seed, RENDER_SAMPLE_RATE);
    write_wav(output, &samples, RENDER_SAMPLE_RATE)
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!(
        "rendered {:.1}s of '{}' ({} BPM) to {}",
        seconds,
        mood,
        profile_for(mood).tempo_bpm,
        output.display()
    );
    Ok(ExitCode::SUCCESS)
}
