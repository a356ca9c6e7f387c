use anyhow::Context;
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use shelfscan_core::ScanConfig;
use shelfscan_ocr::{ExtractionPipeline, PipelineOptions, RecognitionAdapter};
use shelfscan_storage::ProcessingCache;

mod cli;
mod commands;

use cli::{Cli, Commands};

pub struct AppState {
    pub cache: ProcessingCache,
    pub pipeline: ExtractionPipeline<Box<dyn RecognitionAdapter>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let project_dirs = directories::ProjectDirs::from("com", "shelfscan", "Shelfscan")
        .context("Failed to get app directory")?;
    let data_dir = project_dirs.data_dir().to_path_buf();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| project_dirs.config_dir().join("shelfscan.toml"));
    let mut config = ScanConfig::load(&config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;
    if let Some(cache) = cli.cache.clone() {
        config.cache_path = Some(cache);
    }

    let cache_path = config.cache_path_or(&data_dir);
    tracing::debug!(cache = %cache_path.display(), "opening processing cache");
    let cache = ProcessingCache::open(&cache_path);

    let pipeline = ExtractionPipeline::with_options(
        build_recognizer(&config),
        PipelineOptions::from(&config),
    );
    let mut state = AppState { cache, pipeline };

    let mut out = std::io::stdout();
    let ok = match cli.command {
        Commands::Process { image, force } => {
            commands::process(&mut state, &image, force, &mut out)?
        }
        Commands::Verify { barcode, image } => {
            commands::verify(&mut state, &barcode, &image, &mut out)?
        }
        Commands::Batch { dir, force, output } => {
            commands::batch(&mut state, &dir, force, output.as_deref(), &mut out)?
        }
        Commands::Stats => commands::stats(&state, &mut out)?,
        Commands::List => commands::list(&state, &mut out)?,
        Commands::Clear { image } => commands::clear(&mut state, image.as_deref(), &mut out)?,
        Commands::Watch { dir } => commands::watch(state, &dir).await?,
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Logs go to stderr so JSON on stdout stays machine-readable.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(feature = "tesseract")]
fn build_recognizer(config: &ScanConfig) -> Box<dyn RecognitionAdapter> {
    Box::new(shelfscan_ocr::TesseractRecognizer::new(
        config.tesseract.data_path.clone(),
        &config.tesseract.lang,
    ))
}

#[cfg(not(feature = "tesseract"))]
fn build_recognizer(_config: &ScanConfig) -> Box<dyn RecognitionAdapter> {
    tracing::warn!("built without the `tesseract` feature; recognition will fail");
    Box::new(shelfscan_ocr::UnavailableRecognizer)
}
