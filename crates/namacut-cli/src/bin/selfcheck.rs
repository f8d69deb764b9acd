use std::path::Path;

use namacut_cli::CliConfig;
use namacut_media::{check_ffmpeg, check_ffprobe, ExportConfig};
use namacut_models::ExportKind;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = CliConfig::from_env()?;
    let export_config = ExportConfig::from_env();
    let output_dir = config.output_directory(ExportKind::Video);

    println!(
        "namacut-selfcheck: starting with output_dir={}",
        output_dir.display()
    );
    ensure_output_dir(&output_dir).await?;

    let ffmpeg = check_ffmpeg(&export_config.ffmpeg_program)
        .map_err(|e| anyhow::anyhow!("{} ({})", e, export_config.ffmpeg_program))?;
    let ffprobe = check_ffprobe(&export_config.ffprobe_program)
        .map_err(|e| anyhow::anyhow!("{} ({})", e, export_config.ffprobe_program))?;
    println!("namacut-selfcheck: ffmpeg={}", ffmpeg.display());
    println!("namacut-selfcheck: ffprobe={}", ffprobe.display());

    println!("namacut-selfcheck: ok");
    Ok(())
}

async fn ensure_output_dir(path: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(path).await?;
    Ok(())
}
