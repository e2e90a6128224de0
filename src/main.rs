//! DisplayPad CLI - Entry Point
//!
//! Paints keys and prints key events for a connected DisplayPad.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use displaypad::{DisplayPad, PadConfig, PadEvent};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// How long one-shot commands wait for the device to take every frame
const FLUSH_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Parser)]
#[command(name = "displaypad", about = "Control a Mountain DisplayPad")]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fill a key with a solid color
    Fill {
        key: usize,
        r: i32,
        g: i32,
        b: i32,
    },
    /// Show an image file on a key
    Image { key: usize, path: PathBuf },
    /// Clear one key, or all keys if none is given
    Clear { key: Option<usize> },
    /// Print key events until interrupted
    Listen,
    /// Clear the pad, paint a color ramp and print key events
    Demo,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => PadConfig::load_from(path)?,
        None => PadConfig::load()?,
    };

    let pad = DisplayPad::open(&config).context("Failed to open DisplayPad")?;

    match cli.command {
        Commands::Fill { key, r, g, b } => {
            pad.fill_color(key, r, g, b)?;
            flush(&pad);
        }
        Commands::Image { key, path } => {
            pad.fill_image_file(key, &path)?;
            flush(&pad);
        }
        Commands::Clear { key: Some(key) } => {
            pad.clear_key(key)?;
            flush(&pad);
        }
        Commands::Clear { key: None } => {
            pad.clear_all_keys()?;
            flush(&pad);
        }
        Commands::Listen => listen(&pad).await,
        Commands::Demo => {
            pad.clear_all_keys()?;
            for key in 0..displaypad::hid::NUM_KEYS {
                let step = (key * 255 / (displaypad::hid::NUM_KEYS - 1)) as i32;
                pad.fill_color(key, 255 - step, 0, step)?;
            }
            listen(&pad).await;
        }
    }

    pad.close();
    info!("DisplayPad has been closed");
    Ok(())
}

/// Wait for queued transfers before the pad is closed
fn flush(pad: &DisplayPad) {
    if !pad.wait_until_idle(FLUSH_TIMEOUT) {
        warn!(
            "{} transfers still pending after {:?}",
            pad.pending_transfers(),
            FLUSH_TIMEOUT
        );
    }
}

/// Print events until Ctrl-C or a reader failure
async fn listen(pad: &DisplayPad) {
    let mut events = pad.subscribe();
    info!("Listening for key events (Ctrl-C to stop)");

    loop {
        tokio::select! {
            Some(event) = events.recv() => match event {
                PadEvent::Down(key) => println!("Key {} has been pressed.", key),
                PadEvent::Up(key) => println!("Key {} has been released.", key),
                PadEvent::Error(e) => {
                    println!("Error: {}", e);
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }
}
