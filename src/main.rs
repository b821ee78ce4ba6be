use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use drishti::camera::{CameraOpener, DeviceOpener};
use drishti::config::LoadOptions;
use drishti::translate::localize;
use drishti::voice::{
    AudioPlayback, SpeechError, SpeechSynthesizer, TextToSpeech, format_phrase,
};
use drishti::{Config, Daemon};

/// Drishti - live object detection stream with spoken, translated labels
#[derive(Parser)]
#[command(name = "drishti", version, about)]
struct Cli {
    /// Port to listen on
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Config file (default: ~/.config/drishti/config.toml)
    #[arg(short, long, env = "DRISHTI_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log announcements instead of speaking them (headless machines)
    #[arg(long, env = "DRISHTI_DISABLE_VOICE")]
    disable_voice: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Open the camera and report frame size and rate
    TestCamera {
        /// Frames to capture
        #[arg(short, long, default_value = "30")]
        frames: u32,
    },
    /// Translate and speak a label through the announcement path
    TestTts {
        /// Label to announce
        #[arg(default_value = "person")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,drishti=info",
        1 => "info,drishti=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load_with_options(&LoadOptions {
        config_path: cli.config,
        port: cli.port,
        disable_voice: cli.disable_voice,
    })?;
    tracing::debug!(
        threshold = config.stream.confidence_threshold,
        cooldown = ?config.stream.cooldown,
        target_language = %config.translation.target_language,
        "loaded configuration"
    );

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestCamera { frames } => test_camera(config, frames).await,
            Command::TestTts { text } => test_tts(&config, text).await,
        };
    }

    tracing::info!(
        port = config.server.port,
        camera = %config.camera.device,
        voice = config.voice.enabled,
        "starting drishti"
    );

    let daemon = Daemon::new(config)?;
    daemon.run().await?;

    Ok(())
}

/// Capture a few frames and print what the camera delivers
async fn test_camera(config: Config, frames: u32) -> anyhow::Result<()> {
    println!("Opening camera {}...", config.camera.device);

    let opener = DeviceOpener::new(config.camera);
    tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let mut source = opener.open()?;
        println!("Opened {}", source.name());

        let started = Instant::now();
        let mut size = None;
        for _ in 0..frames {
            let frame = source.next_frame()?;
            size = Some(frame.image.dimensions());
        }
        let elapsed = started.elapsed().as_secs_f64();

        if let Some((width, height)) = size {
            println!("Frame size: {width}x{height}");
            println!(
                "Captured {frames} frames in {elapsed:.2}s ({:.1} fps)",
                f64::from(frames) / elapsed.max(f64::EPSILON)
            );
        } else {
            println!("No frames requested");
        }
        Ok(())
    })
    .await??;

    Ok(())
}

/// Speak `text` the way the stream would announce it
async fn test_tts(config: &Config, text: String) -> anyhow::Result<()> {
    let translator = drishti::daemon::build_translator(&config.translation)?;
    let localized =
        tokio::task::spawn_blocking(move || localize(translator.as_ref(), &text)).await?;
    let phrase = format_phrase(&config.voice.phrase, &localized);
    println!("Announcing: \"{phrase}\"");

    let tts = TextToSpeech::from_config(&config.voice)?;
    println!("Synthesizing speech ({:?})...", config.voice.provider);
    let mp3 = tts.synthesize(&phrase).await?;
    println!("Got {} bytes of audio data", mp3.len());

    println!("Playing...");
    tokio::task::spawn_blocking(move || -> Result<(), SpeechError> {
        AudioPlayback::new()?.play_mp3(&mp3)
    })
    .await??;

    println!("\n---");
    println!("If you heard the phrase, voice announcements are working!");
    Ok(())
}
