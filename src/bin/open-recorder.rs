//! Command-line recorder
//!
//! Drives a full session against the synthetic platform: check, record with
//! optional pause and overlay moves, download, upload and save.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use open_recorder::capture::platform::{EnvironmentStatus, PlatformError};
use open_recorder::capture::synthetic::SyntheticPlatform;
use open_recorder::commands::{self, AppState};
use open_recorder::compositor::overlay::ResizeDirection;
use open_recorder::library::recent::ArtifactRef;
use open_recorder::recorder::RecordingEvent;
use open_recorder::utils::format_elapsed;
use open_recorder::{AppConfig, RecordingMode};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Slack added to timed waits so the last whole second is counted
const TICK_SLACK: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[command(name = "open-recorder", version, about = "Screen and camera recorder")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "open-recorder.toml")]
    config: PathBuf,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check whether recording is possible
    Check,
    /// Record a session and save it
    Record(RecordArgs),
    /// List saved recordings
    Recent,
}

#[derive(clap::Args, Debug)]
struct RecordArgs {
    #[arg(short, long, value_enum, default_value_t = ModeArg::Screen)]
    mode: ModeArg,

    /// Seconds to record, pauses excluded
    #[arg(short, long, default_value_t = 3)]
    seconds: u64,

    /// Pause after this many recorded seconds
    #[arg(long)]
    pause_after: Option<u64>,

    /// Length of the pause in seconds
    #[arg(long, default_value_t = 2)]
    pause_for: u64,

    /// Drag the camera overlay to X,Y percent of the preview (both mode)
    #[arg(long, value_parser = parse_position)]
    drag_to: Option<(f64, f64)>,

    /// Resize the overlay by N steps; negative shrinks
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    grow: i32,

    /// Upload to the configured video host
    #[arg(long)]
    upload: bool,

    /// Title for the recent-recordings list
    #[arg(long, default_value = "")]
    title: String,

    /// Simulate a denied permission
    #[arg(long, value_enum)]
    deny: Option<DenyArg>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Screen,
    Camera,
    Both,
}

impl From<ModeArg> for RecordingMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Screen => RecordingMode::Screen,
            ModeArg::Camera => RecordingMode::Camera,
            ModeArg::Both => RecordingMode::Both,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum DenyArg {
    Screen,
    Camera,
    Microphone,
}

fn parse_position(value: &str) -> Result<(f64, f64), String> {
    let (x, y) = value
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y but got '{value}'"))?;
    let parse = |s: &str| {
        s.trim()
            .parse::<f64>()
            .map_err(|e| format!("invalid coordinate '{s}': {e}"))
    };
    Ok((parse(x)?, parse(y)?))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let filter = match cli.verbose {
        0 => open_recorder::DEFAULT_LOG_FILTER,
        1 => "open_recorder=debug,info",
        _ => "open_recorder=trace,debug",
    };
    open_recorder::init_tracing(filter);

    let config = AppConfig::load(&cli.config)
        .with_context(|| format!("loading configuration from {:?}", cli.config))?;
    tracing::info!("Starting open-recorder v{}", env!("CARGO_PKG_VERSION"));

    let platform = Arc::new(SyntheticPlatform::new());
    match cli.command {
        Command::Check => check(&AppState::new(platform, config)).await,
        Command::Recent => recent(&AppState::new(platform, config)).await,
        Command::Record(args) => {
            let denied = || PlatformError::NotAllowed("Permission denied".to_string());
            match args.deny {
                Some(DenyArg::Screen) => platform.fail_screen(denied()),
                Some(DenyArg::Camera) => platform.fail_camera(denied()),
                Some(DenyArg::Microphone) => platform.fail_microphone(denied()),
                None => {}
            }
            record(&AppState::new(platform, config), args).await
        }
    }
}

async fn check(state: &AppState) -> Result<()> {
    let info = commands::system::get_system_info().await?;
    println!("open-recorder {} on {}/{}", info.version, info.os, info.arch);
    match commands::system::get_environment(state).await? {
        EnvironmentStatus::Supported { mime_type } => println!("Recording supported: {mime_type}"),
        EnvironmentStatus::Unsupported { notice, .. } => println!("{notice}"),
    }
    Ok(())
}

async fn recent(state: &AppState) -> Result<()> {
    let entries = commands::library::list_recent_recordings(state).await?;
    if entries.is_empty() {
        println!("No recordings yet");
    }
    for entry in entries {
        let location = match &entry.artifact {
            ArtifactRef::Local { path } => path.display().to_string(),
            ArtifactRef::Remote { url, .. } => url.clone(),
        };
        println!(
            "{}  {:>8}  {:<6}  {}  {}",
            entry.created_at.format("%Y-%m-%d %H:%M"),
            format_elapsed(entry.duration_seconds),
            entry.mode,
            entry.title,
            location
        );
    }
    Ok(())
}

async fn record(state: &AppState, args: RecordArgs) -> Result<()> {
    if let EnvironmentStatus::Unsupported { notice, .. } =
        commands::system::get_environment(state).await?
    {
        bail!(notice);
    }

    let mut events = state.coordinator.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                RecordingEvent::Tick(seconds) => println!("  recording {}", format_elapsed(seconds)),
                RecordingEvent::Error(error) => eprintln!("  {error}"),
                other => tracing::debug!("Event: {:?}", other),
            }
        }
    });

    let mode = RecordingMode::from(args.mode);
    commands::recording::select_mode(state, mode.to_string()).await?;
    commands::recording::start_recording(state).await?;
    println!("Recording {mode} mode for {}s", args.seconds);

    if mode == RecordingMode::Both {
        adjust_overlay(state, &args).await?;
    }

    match args.pause_after.filter(|p| *p < args.seconds) {
        Some(pause_after) => {
            tokio::time::sleep(Duration::from_secs(pause_after) + TICK_SLACK).await;
            commands::recording::pause_recording(state).await?;
            println!("  paused for {}s", args.pause_for);
            tokio::time::sleep(Duration::from_secs(args.pause_for)).await;
            commands::recording::resume_recording(state).await?;
            tokio::time::sleep(Duration::from_secs(args.seconds - pause_after) + TICK_SLACK).await;
        }
        None => tokio::time::sleep(Duration::from_secs(args.seconds) + TICK_SLACK).await,
    }

    let summary = commands::recording::stop_recording(state)
        .await?
        .context("the recording ended before it could be stopped")?;
    println!(
        "Recorded {} ({} bytes, {} chunks, {} segments)",
        format_elapsed(summary.duration_seconds),
        summary.size_bytes,
        summary.chunk_count,
        summary.segment_count
    );

    let path = commands::export::download_recording(state).await?;
    println!("Saved {}", path.display());

    let mut location = ArtifactRef::Local { path };
    if args.upload {
        commands::export::start_upload(state, title_or_default(&args.title), None).await?;
        println!("Uploading...");
        match commands::export::wait_for_upload(state).await {
            Ok(video) => {
                location = commands::export::remote_ref(state, &video)?;
                println!("Uploaded as {}", video.id);
            }
            Err(e) => eprintln!("{e}; keeping the local file"),
        }
    }

    let entry = commands::export::save_recording(state, args.title.clone(), location).await?;
    println!("Added '{}' to recent recordings", entry.title);

    printer.abort();
    Ok(())
}

async fn adjust_overlay(state: &AppState, args: &RecordArgs) -> Result<()> {
    let direction = if args.grow >= 0 {
        ResizeDirection::Increase
    } else {
        ResizeDirection::Decrease
    };
    for _ in 0..args.grow.unsigned_abs() {
        commands::recording::resize_overlay(state, direction).await?;
    }

    if let Some((x, y)) = args.drag_to {
        let geometry = state.coordinator.overlay_geometry();
        let container = state.coordinator.overlay_container();
        let origin = (
            container.left + geometry.x_percent / 100.0 * container.width,
            container.top + geometry.y_percent / 100.0 * container.height,
        );
        commands::recording::overlay_drag_start(state, origin.0, origin.1).await?;
        commands::recording::overlay_drag_move(
            state,
            container.left + x / 100.0 * container.width,
            container.top + y / 100.0 * container.height,
        )
        .await?;
        let geometry = commands::recording::overlay_drag_end(state).await?;
        println!(
            "  overlay at {:.1}%, {:.1}% ({}x{})",
            geometry.x_percent, geometry.y_percent, geometry.width_px, geometry.height_px
        );
    }
    Ok(())
}

fn title_or_default(title: &str) -> String {
    if title.trim().is_empty() {
        "Recording".to_string()
    } else {
        title.to_string()
    }
}
