use hlsrelay_core::{bootstrap::load_config, logging::init_logging};
use hlsrelay_storage::{provider_from_config, HookDispatcher, HookEvent};

use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

/// Reads encoder hook lines from stdin:
///
///   segment hls/0/stream-12.ts
///   variant hls/0/stream.m3u8
///   master  hls/stream.m3u8
///
/// Paths are relative to `storage.working_dir`.
#[derive(Parser, Debug)]
#[command(name = "hlsrelay")]
#[command(about = "HLS storage relay", long_about = None)]
struct Args {
    /// Config file (TOML/YAML/JSON); falls back to HLSRELAY_CONFIG_PATH, then ./hlsrelay.toml
    #[arg(long, short)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref())?;
    init_logging(&config.logging)?;

    info!("hlsrelay starting...");

    let provider = provider_from_config(&config.storage)?;
    if let Err(e) = provider.setup().await {
        // Bad credentials or an unusable public directory: do not limp along
        error!("Storage provider {} failed to start: {}", provider.name(), e);
        return Err(e.into());
    }

    let mut dispatcher = HookDispatcher::new(provider);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() || trimmed.starts_with('#') {
                        continue;
                    }
                    match trimmed.parse::<HookEvent>() {
                        Ok(event) => dispatcher.dispatch(event),
                        Err(e) => warn!("Ignoring hook line {:?}: {}", trimmed, e),
                    }
                }
                Ok(None) => {
                    info!("Encoder hook stream closed");
                    break;
                }
                Err(e) => {
                    error!("Failed to read encoder hooks: {}", e);
                    break;
                }
            },
            _ = &mut shutdown => {
                info!("Received shutdown signal");
                break;
            }
        }
    }

    let summary = dispatcher.shutdown().await;
    info!(
        "hlsrelay shutting down: {} hooks handled, {} failed",
        summary.handled, summary.failed
    );

    Ok(())
}
