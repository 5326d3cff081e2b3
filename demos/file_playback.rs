//! File playback demo
//!
//! Plays an MP4 file through the file-backed producer. With a JSON config
//! path as the first argument the config is loaded from it; otherwise a
//! ten-second placeholder clip is written to a temporary asset directory
//! and played with deferred fills.
//!
//! Run with: `cargo run --example file_playback [config.json]`

use anyhow::{Context, Result};
use mediasrc::{
    init_logging, FillMode, Mp4Writer, PlaybackMode, PlayerConfig, PlayerPage,
};
use std::path::{Path, PathBuf};

const DEMO_CLIP: &str = "big_buck_bunny.mp4";

fn write_placeholder_clip(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating asset directory {}", dir.display()))?;

    // 10 s at 30 fps; payloads are not real H.264, the sink does not decode.
    let mut writer = Mp4Writer::new(*b"avc1", 640, 480, 30);
    for i in 0..300u32 {
        let payload = vec![(i % 255) as u8 + 1; 512];
        writer.push_sample(&payload, 1, i % 30 == 0);
    }
    writer.write_to(dir.join(DEMO_CLIP))?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => PlayerConfig::from_json_file(&path)
            .with_context(|| format!("loading {}", path))?,
        None => {
            let asset_dir: PathBuf = std::env::temp_dir().join("mediasrc-demo-assets");
            write_placeholder_clip(&asset_dir)?;
            PlayerConfig {
                mode: PlaybackMode::File,
                asset_dir,
                media_file: PathBuf::from(DEMO_CLIP),
                fill_mode: FillMode::Deferred,
                max_pulls: None,
                ..Default::default()
            }
        }
    };
    init_logging(&config.log_filter)?;

    println!("🎞️  File playback demo");
    println!("   Media: {}", config.media_path().display());
    println!("   Fill mode: {:?}", config.fill_mode);

    let mut page = PlayerPage::new(config)?;
    let report = page.on_navigated_to().await?;

    println!(
        "✅ Rendered {} samples ({} bytes) in {} pulls",
        report.playback.samples_rendered, report.playback.bytes_rendered, report.playback.pulls
    );
    println!("   Playback ended because: {:?}", report.playback.end);
    if let Some(error) = &report.adapter_error {
        println!("❌ Adapter recorded: {}", error);
    }
    println!("{}", serde_json::to_string_pretty(&report.playback)?);

    page.on_navigated_from().await;
    Ok(())
}
