//! Export binary: trim, crop, and rotate one file with FFmpeg.

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use namacut_cli::{run_export, CliConfig, CliError, ExportArgs};
use namacut_media::{ExportConfig, MediaError};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("namacut_cli=info".parse()?)
        .add_directive("namacut_media=info".parse()?)
        .add_directive("namacut_export=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    let args = ExportArgs::parse(std::env::args().skip(1))?;
    let config = CliConfig::from_env().context("invalid NAMACUT_* configuration")?;
    let export_config = ExportConfig::from_env();
    info!("Export config: {:?}", export_config);

    match run_export(&args, &config, export_config).await {
        Ok(completion) => {
            info!(output = %completion.output_path.display(), "Export complete");
            Ok(())
        }
        Err(CliError::Media(e)) if e.is_user_abort() => {
            info!("Export aborted");
            Ok(())
        }
        Err(CliError::Media(MediaError::ProcessFailure {
            exit_code,
            diagnostics,
        })) => {
            for line in &diagnostics {
                error!("ffmpeg: {}", line);
            }
            anyhow::bail!("export failed (exit code {:?})", exit_code)
        }
        Err(e) => Err(e.into()),
    }
}
