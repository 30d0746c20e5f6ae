//! Desktop demo for trackkit-screen.
//!
//! Run with: cargo run -p trackkit-tracker-demo -- --endpoint http://localhost:8080/coordinates

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use trackkit_screen::{Collaborators, MapScreen, MapView, ScreenConfig, TargetSource, Tone};

#[derive(Parser)]
#[command(name = "tracker-demo")]
#[command(about = "Mounts the map screen and prints every view it produces", long_about = None)]
struct Cli {
    /// JSON screen configuration
    #[arg(long)]
    config: Option<PathBuf>,
    /// Poll target coordinates from this URL instead of the fixed target
    #[arg(long)]
    endpoint: Option<String>,
    /// Milliseconds between polls
    #[arg(long, default_value_t = 5_000)]
    interval_ms: u64,
    /// Milliseconds before a poll is abandoned
    #[arg(long, default_value_t = 3_000)]
    timeout_ms: u64,
    /// Seconds to run before unmounting
    #[arg(long, default_value_t = 60)]
    duration_secs: u64,
}

impl Cli {
    fn screen_config(&self) -> Result<ScreenConfig> {
        let mut config = match &self.config {
            Some(path) => ScreenConfig::from_json_file(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => ScreenConfig::default(),
        };
        if let Some(endpoint) = &self.endpoint {
            config.source = TargetSource::RemotePoll {
                endpoint: endpoint.clone(),
                interval_ms: self.interval_ms,
                timeout_ms: self.timeout_ms,
            };
        }
        Ok(config)
    }
}

fn print_view(view: &MapView) {
    println!("--- target {} (zoom {})", view.camera.center, view.camera.zoom);
    for line in &view.info {
        println!("  {line}");
    }
    if let Some(status) = &view.server_status {
        let mark = match status.tone {
            Tone::Affirmative => "✓",
            Tone::Alert => "✗",
        };
        println!("  {mark} {}", status.text);
    }
    if let Some(error) = &view.error {
        let hint = if error.retry { " (retry available)" } else { "" };
        println!("  ✗ {}{hint}", error.text);
    }
    if let Some(notice) = &view.notice {
        println!("  [{}] {}", notice.title, notice.message.replace('\n', " "));
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = cli.screen_config()?;

    println!("=== Trackkit Tracker Demo ===\n");
    let screen = MapScreen::mount(config, Collaborators::system())
        .await
        .context("Failed to mount map screen")?;

    let mut updates = screen.subscribe();
    print_view(&screen.view());

    let deadline = tokio::time::sleep(Duration::from_secs(cli.duration_secs));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            () = &mut deadline => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                print_view(&screen.view());
            }
        }
    }

    screen.unmount();
    log::info!("demo finished");
    Ok(())
}
