//! Synthetic playback demo
//!
//! Plays three seconds of the roving-square generator through the pull sink
//! while the mock camera preview starts next to it.
//!
//! Run with: `cargo run --example synthetic_playback`

use anyhow::Result;
use mediasrc::{init_logging, PlaybackMode, PlayerConfig, PlayerPage};

#[tokio::main]
async fn main() -> Result<()> {
    let config = PlayerConfig {
        mode: PlaybackMode::Synthetic,
        max_pulls: Some(90),
        ..Default::default()
    };
    init_logging(&config.log_filter)?;

    println!("🎬 Synthetic playback demo");
    println!(
        "   {}x{} BGRA8 @ {} fps",
        config.width, config.height, config.frame_rate
    );

    let mut page = PlayerPage::new(config)?;
    let report = page.on_navigated_to().await?;

    println!("✅ Rendered {} samples", report.playback.samples_rendered);
    if let (Some(first), Some(last)) = (report.playback.first_pts(), report.playback.last_pts()) {
        println!("   PTS {} .. {}", first, last);
    }
    println!("   Session state: {:?}", report.session_state);
    println!("   Adapter stats: {:?}", report.adapter_stats);
    match report.preview_error {
        Some(error) => println!("⚠️  Camera preview failed: {}", error),
        None => println!("📷 Camera preview: {:?}", report.preview_state),
    }

    page.on_navigated_from().await;
    Ok(())
}
