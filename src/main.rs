use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::sync::Arc;
use std::time::Duration;
use swap_voice::audio::{CaptureBackendFactory, CaptureConfig, CaptureSource, ChunkConfig};
use swap_voice::dialogue::{Dialogue, HttpDialogue, StreamDialogue};
use swap_voice::playback::{NullPlayer, Player, RodioPlayer};
use swap_voice::recognizer::LineRecognizer;
use swap_voice::session::{
    CallConfig, CallHandle, CallSession, RecognizerInput, RecorderInput, Speaker,
};
use swap_voice::{create_router, AppState, Config};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "swap-voice")]
#[command(about = "Voice call client for the battery-swap driver assistant")]
struct Cli {
    /// Configuration file (config crate name, without extension)
    #[arg(long, global = true, default_value = "config/swap-voice")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP call-control API
    Serve,

    /// Run an interactive call in the terminal
    Call {
        /// Driver the call belongs to
        #[arg(long)]
        driver_id: String,

        /// Input mode: typed utterances or microphone chunks
        #[arg(long, value_enum, default_value = "text")]
        mode: CallMode,

        /// Use the realtime streaming channel instead of HTTP (voice mode)
        #[arg(long)]
        stream: bool,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CallMode {
    Text,
    Voice,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    info!("{} starting", config.service.name);

    match cli.command {
        Commands::Serve => serve(config).await,
        Commands::Call {
            driver_id,
            mode,
            stream,
        } => call(config, driver_id, mode, stream).await,
    }
}

async fn serve(config: Config) -> Result<()> {
    let bind = format!("{}:{}", config.service.http.bind, config.service.http.port);
    let state = AppState::new(Arc::new(config));
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;

    info!("Call control API listening on {}", bind);

    axum::serve(listener, router).await?;

    Ok(())
}

async fn call(config: Config, driver_id: String, mode: CallMode, stream: bool) -> Result<()> {
    let call_config = CallConfig::new(driver_id.clone()).with_timings(&config.call);
    let session_id = call_config.session_id.clone();
    let timeout = Duration::from_secs(config.backend.request_timeout_secs);

    let dialogue: Arc<dyn Dialogue> = if stream {
        // Default stream endpoint: same host as the HTTP backend over ws://
        let url = config
            .backend
            .stream_url
            .clone()
            .unwrap_or_else(|| config.backend.base_url.replacen("http", "ws", 1));
        Arc::new(
            StreamDialogue::connect(&url, driver_id.clone(), timeout)
                .await
                .context("Failed to connect realtime channel")?,
        )
    } else {
        Arc::new(HttpDialogue::new(
            config.backend.base_url.clone(),
            driver_id.clone(),
            session_id.clone(),
            timeout,
        )?)
    };

    let player: Arc<dyn Player> = match RodioPlayer::new() {
        Ok(player) => Arc::new(player),
        Err(e) => {
            warn!("Audio output unavailable ({}); replies will be text only", e);
            Arc::new(NullPlayer)
        }
    };

    let handle = match mode {
        CallMode::Text => {
            println!("Type your message (say \"exit\" or \"goodbye\" to hang up):");
            CallSession::start(
                call_config,
                dialogue,
                player,
                Box::new(RecognizerInput::new(Box::new(LineRecognizer::new()))),
            )
            .await?
        }
        CallMode::Voice => {
            let capture = CaptureConfig {
                sample_rate: config.audio.sample_rate,
                channels: config.audio.channels,
                ..CaptureConfig::default()
            };
            let backend = CaptureBackendFactory::create(CaptureSource::Microphone, capture)?;

            let chunks = ChunkConfig {
                chunk_duration: Duration::from_secs(config.audio.chunk_duration_secs),
                poll_interval: Duration::from_millis(config.audio.poll_interval_ms),
                sample_rate: config.audio.sample_rate,
                channels: config.audio.channels,
            };

            println!("Listening... speak naturally (say \"exit\" or \"goodbye\" to hang up)");
            CallSession::start(
                call_config,
                dialogue,
                player,
                Box::new(RecorderInput::new(backend, chunks)),
            )
            .await?
        }
    };

    let printer = tokio::spawn(print_transcript(handle.clone()));

    tokio::select! {
        _ = handle.wait() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted; ending call");
            handle.end().await;
        }
    }

    printer.abort();
    println!("Call ended.");

    Ok(())
}

/// Echo new transcript turns to the terminal as they arrive
async fn print_transcript(handle: CallHandle) {
    let mut printed = 0;
    loop {
        let turns = handle.transcript();
        for turn in turns.iter().skip(printed) {
            match turn.speaker {
                Speaker::User => println!("You: {}", turn.text),
                Speaker::Assistant => println!("Assistant: {}", turn.text),
            }
        }
        printed = turns.len().max(printed);
        if !handle.is_active() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
}
