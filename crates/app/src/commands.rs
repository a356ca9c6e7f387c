use anyhow::Context;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::sync::mpsc;

use shelfscan_core::export::{save_json, to_json};
use shelfscan_core::FailureReport;
use shelfscan_ocr::{
    spawn_intake_watcher, BatchCoordinator, SettleQueue, VerificationEngine, DEFAULT_SETTLE,
};
use shelfscan_storage::{absolute_path, CacheRecord};

use crate::AppState;

/// Returned `bool` is whether the command succeeded; `Err` means it could
/// not produce any output at all.
pub type CommandResult = anyhow::Result<bool>;

fn emit<T: Serialize + ?Sized>(out: &mut impl Write, value: &T) -> anyhow::Result<()> {
    writeln!(out, "{}", to_json(value)?)?;
    Ok(())
}

pub fn process(state: &mut AppState, image: &Path, force: bool, out: &mut impl Write) -> CommandResult {
    match state.pipeline.process(&mut state.cache, image, force) {
        Ok(result) => {
            emit(out, &result)?;
            Ok(true)
        }
        Err(e) => {
            tracing::error!(path = %image.display(), "processing failed: {e}");
            emit(out, &FailureReport::from(&e))?;
            Ok(false)
        }
    }
}

pub fn verify(state: &mut AppState, barcode: &str, image: &Path, out: &mut impl Write) -> CommandResult {
    let engine = VerificationEngine::new(&state.pipeline);
    match engine.verify(&mut state.cache, barcode.trim(), image) {
        Ok(verdict) => {
            emit(out, &verdict)?;
            Ok(true)
        }
        Err(e) => {
            tracing::error!(path = %image.display(), "verification failed: {e}");
            emit(out, &FailureReport::from(&e))?;
            Ok(false)
        }
    }
}

pub fn batch(
    state: &mut AppState,
    dir: &Path,
    force: bool,
    output: Option<&Path>,
    out: &mut impl Write,
) -> CommandResult {
    let report = BatchCoordinator::new(&state.pipeline)
        .process_directory(&mut state.cache, dir, force)
        .with_context(|| format!("Failed to process directory {}", dir.display()))?;

    match output {
        Some(path) => {
            save_json(path, &report)
                .with_context(|| format!("Failed to write report {}", path.display()))?;
            tracing::info!(path = %path.display(), "batch report saved");
        }
        None => emit(out, &report)?,
    }
    Ok(true)
}

pub fn stats(state: &AppState, out: &mut impl Write) -> CommandResult {
    emit(out, &state.cache.stats())?;
    Ok(true)
}

#[derive(Serialize)]
struct ListedImage<'a> {
    path: &'a Path,
    #[serde(flatten)]
    record: &'a CacheRecord,
}

pub fn list(state: &AppState, out: &mut impl Write) -> CommandResult {
    let listed: Vec<ListedImage<'_>> = state
        .cache
        .entries()
        .map(|(path, record)| ListedImage { path, record })
        .collect();
    emit(out, &listed)?;
    Ok(true)
}

pub fn clear(state: &mut AppState, image: Option<&Path>, out: &mut impl Write) -> CommandResult {
    let removed = match image {
        Some(image) => usize::from(state.cache.invalidate(image)),
        None => {
            let count = state.cache.len();
            state.cache.invalidate_all();
            count
        }
    };
    state.cache.persist().context("Failed to save processing cache")?;
    tracing::info!(removed, "cache cleared");
    emit(out, &serde_json::json!({ "removed": removed }))?;
    Ok(true)
}

/// Processes images that arrive in `dir` until Ctrl-C. A file is handled
/// once its events have settled. Results go to stdout one JSON document per
/// image.
pub async fn watch(mut state: AppState, dir: &Path) -> CommandResult {
    let dir = absolute_path(dir);
    let (tx, mut rx) = mpsc::channel::<PathBuf>(64);
    let _watcher = spawn_intake_watcher(&dir, tx)
        .with_context(|| format!("Failed to watch {}", dir.display()))?;
    tracing::info!(dir = %dir.display(), "watching for new images");

    let mut queue = SettleQueue::default();
    let mut tick = tokio::time::interval(DEFAULT_SETTLE / 2);
    loop {
        tokio::select! {
            received = rx.recv() => {
                let Some(path) = received else { break };
                tracing::debug!(path = %path.display(), "intake event");
                queue.touch(path, Instant::now());
            }
            _ = tick.tick(), if !queue.is_empty() => {
                for path in queue.ready(Instant::now()) {
                    if !path.is_file() {
                        continue;
                    }
                    tracing::info!(path = %path.display(), "new image");
                    let mut stdout = std::io::stdout().lock();
                    tokio::task::block_in_place(|| process(&mut state, &path, false, &mut stdout))?;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("stopping watcher");
                break;
            }
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma};
    use shelfscan_ocr::{ExtractionPipeline, MockRecognizer, RecognitionAdapter};
    use shelfscan_storage::ProcessingCache;

    const LABEL: &str = "EPSON 664 Black Ink\nEAN 8885007027531";

    fn state_with(text: &str, cache: ProcessingCache) -> AppState {
        let recognizer: Box<dyn RecognitionAdapter> = Box::new(MockRecognizer::new(text));
        AppState { cache, pipeline: ExtractionPipeline::new(recognizer) }
    }

    fn write_png(dir: &Path, name: &str, shade: u8) -> PathBuf {
        let path = dir.join(name);
        let img: ImageBuffer<Luma<u8>, Vec<u8>> =
            ImageBuffer::from_fn(32, 16, |x, _| Luma([shade.wrapping_add((x * 8) as u8)]));
        img.save(&path).unwrap();
        path
    }

    fn parse(out: &[u8]) -> serde_json::Value {
        serde_json::from_slice(out).unwrap()
    }

    #[test]
    fn process_prints_result_json() {
        let dir = tempfile::tempdir().unwrap();
        let image = write_png(dir.path(), "ink.png", 90);
        let mut state = state_with(LABEL, ProcessingCache::in_memory());

        let mut out = Vec::new();
        assert!(process(&mut state, &image, false, &mut out).unwrap());
        let json = parse(&out);
        assert_eq!(json["detected_barcodes"][0], "8885007027531");
        assert_eq!(json["product_info"]["brand"], "EPSON");
        assert_eq!(json["source"], "fresh");
    }

    #[test]
    fn process_missing_file_prints_failure_and_reports_false() {
        let mut state = state_with(LABEL, ProcessingCache::in_memory());
        let mut out = Vec::new();
        let ok = process(&mut state, Path::new("/no/such/image.png"), false, &mut out).unwrap();
        assert!(!ok);
        assert_eq!(parse(&out)["kind"], "not_found");
    }

    #[test]
    fn verify_trims_the_scanned_barcode() {
        let dir = tempfile::tempdir().unwrap();
        let image = write_png(dir.path(), "ink.png", 90);
        let mut state = state_with(LABEL, ProcessingCache::in_memory());

        let mut out = Vec::new();
        assert!(verify(&mut state, " 8885007027531\n", &image, &mut out).unwrap());
        let json = parse(&out);
        assert_eq!(json["matches"], true);
        assert_eq!(json["confidence"], 1.0);
    }

    #[test]
    fn batch_writes_report_to_output_file() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "a.png", 10);
        let report_path = dir.path().join("reports").join("batch.json");
        let mut state = state_with(LABEL, ProcessingCache::in_memory());

        let mut out = Vec::new();
        assert!(batch(&mut state, dir.path(), false, Some(report_path.as_path()), &mut out).unwrap());
        assert!(out.is_empty());
        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
        assert_eq!(saved["summary"]["total"], 1);
    }

    #[test]
    fn batch_on_missing_directory_is_an_error() {
        let mut state = state_with(LABEL, ProcessingCache::in_memory());
        let mut out = Vec::new();
        assert!(batch(&mut state, Path::new("/no/such/dir"), false, None, &mut out).is_err());
    }

    #[test]
    fn list_stats_and_clear_reflect_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_png(dir.path(), "a.png", 10);
        let b = write_png(dir.path(), "b.png", 40);
        let store = dir.path().join("cache.json");
        let mut state = state_with(LABEL, ProcessingCache::open(&store));
        process(&mut state, &a, false, &mut Vec::new()).unwrap();
        process(&mut state, &b, false, &mut Vec::new()).unwrap();

        let mut out = Vec::new();
        list(&state, &mut out).unwrap();
        let listed = parse(&out);
        assert_eq!(listed.as_array().unwrap().len(), 2);
        assert_eq!(listed[0]["filename"], "a.png");
        assert!(listed[0]["path"].as_str().unwrap().ends_with("a.png"));

        let mut out = Vec::new();
        stats(&state, &mut out).unwrap();
        assert_eq!(parse(&out)["total_images_processed"], 2);

        let mut out = Vec::new();
        clear(&mut state, Some(a.as_path()), &mut out).unwrap();
        assert_eq!(parse(&out)["removed"], 1);
        assert_eq!(ProcessingCache::open(&store).len(), 1);

        let mut out = Vec::new();
        clear(&mut state, None, &mut out).unwrap();
        assert_eq!(parse(&out)["removed"], 1);
        assert!(ProcessingCache::open(&store).is_empty());
    }
}
