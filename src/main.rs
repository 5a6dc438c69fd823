use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use scribe_live::{AuthToken, Config, MicSource, RecordingController, SessionUpdate, WsConnector};
use tracing::{info, warn};

/// Live microphone transcription against a scribe backend
#[derive(Debug, Parser)]
#[command(name = "scribe-live", version, about)]
struct Args {
    /// Config file (flags below override it)
    #[arg(long)]
    config: Option<String>,

    /// WebSocket endpoint of the transcription backend
    #[arg(long)]
    endpoint: Option<String>,

    /// Bearer token; defaults to the SCRIBE_TOKEN environment variable
    #[arg(long)]
    token: Option<String>,

    /// Capture chunk interval in milliseconds
    #[arg(long)]
    chunk_interval_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let mut cfg = match &args.config {
        Some(path) => {
            Config::load(path).with_context(|| format!("failed to load config {}", path))?
        }
        None => Config::default(),
    };
    if let Some(endpoint) = args.endpoint {
        cfg.transcription.endpoint = endpoint;
    }
    if let Some(interval) = args.chunk_interval_ms {
        cfg.audio.chunk_interval_ms = interval;
    }
    let token = args
        .token
        .or_else(|| std::env::var("SCRIBE_TOKEN").ok())
        .map(AuthToken::new);

    info!("scribe-live v{}", env!("CARGO_PKG_VERSION"));
    info!("backend endpoint: {}", cfg.transcription.endpoint);

    let (controller, mut updates) = RecordingController::new(
        cfg.session_config(),
        Box::new(MicSource::new()),
        Arc::new(WsConnector),
    );

    // Render partial transcript fragments as they stream in.
    let printer = tokio::spawn(async move {
        while let Some(update) = updates.recv().await {
            match update {
                SessionUpdate::Partial { fragment } => {
                    print!("{}", fragment);
                    let _ = std::io::stdout().flush();
                }
                SessionUpdate::StateChanged(state) => {
                    info!("session state: {:?}", state);
                }
                SessionUpdate::Failed(error) => {
                    warn!("session error: {}", error);
                }
                SessionUpdate::Finalized(_) => {}
            }
        }
    });

    controller.start(token).await?;
    info!("recording - press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    println!();

    let record = controller.stop().await?;
    info!(
        "session finalized: id={} words={} duration={}s language={} model={}",
        record.session_id.as_deref().unwrap_or("<unsaved>"),
        record.word_count,
        record.duration_seconds,
        record.language,
        record.model_used
    );
    println!("{}", record.transcript);

    printer.abort();
    Ok(())
}
