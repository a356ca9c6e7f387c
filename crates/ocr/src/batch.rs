use chrono::Utc;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use shelfscan_core::{BatchEntry, BatchReport, BatchSummary, ResultSource, ScanError};
use shelfscan_storage::ProcessingCache;

use crate::pipeline::ExtractionPipeline;
use crate::recognizer::RecognitionAdapter;

/// Extensions scanned in a directory, compared case-insensitively.
pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "tiff", "gif"];

pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.iter().any(|known| e.eq_ignore_ascii_case(known)))
        .unwrap_or(false)
}

/// Image files directly inside `dir`, sorted by path.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>, ScanError> {
    let entries = fs::read_dir(dir).map_err(|e| ScanError::from_io(dir, e))?;
    Ok(image_files(dir, entries.map(|entry| entry.map(|e| e.path()))))
}

/// Entries that fail to read are logged and skipped.
fn image_files(dir: &Path, entries: impl Iterator<Item = io::Result<PathBuf>>) -> Vec<PathBuf> {
    let mut images: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!(dir = %dir.display(), "skipping unreadable directory entry: {e}");
                None
            }
        })
        .filter(|path| path.is_file() && is_image_path(path))
        .collect();
    images.sort();
    images
}

/// Runs the pipeline over every image in a directory.
pub struct BatchCoordinator<'p, R: RecognitionAdapter> {
    pipeline: &'p ExtractionPipeline<R>,
}

impl<'p, R: RecognitionAdapter> BatchCoordinator<'p, R> {
    pub fn new(pipeline: &'p ExtractionPipeline<R>) -> Self {
        Self { pipeline }
    }

    /// Only a missing or unreadable directory is an error. Per-file failures
    /// land in that file's entry and the batch carries on.
    pub fn process_directory(
        &self,
        cache: &mut ProcessingCache,
        dir: &Path,
        force: bool,
    ) -> Result<BatchReport, ScanError> {
        let images = list_images(dir)?;
        tracing::info!(dir = %dir.display(), images = images.len(), force, "batch started");

        let mut results = BTreeMap::new();
        let mut newly_processed = 0;
        let mut served_from_cache = 0;
        let mut failed = 0;

        for path in &images {
            let (source, outcome) = self.pipeline.run(cache, path, force);
            let entry = BatchEntry::from(outcome);
            match source {
                ResultSource::Cached => served_from_cache += 1,
                ResultSource::Fresh => newly_processed += 1,
            }
            if entry.is_failed() {
                failed += 1;
            }
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            results.insert(name, entry);
        }

        let summary = BatchSummary {
            total: images.len(),
            newly_processed,
            served_from_cache,
            failed,
            force,
            processed_at: Utc::now(),
        };
        tracing::info!(
            total = summary.total,
            newly_processed,
            served_from_cache,
            failed,
            "batch finished"
        );
        Ok(BatchReport { results, summary })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tests::{write_png, LABEL};
    use crate::recognizer::MockRecognizer;

    #[test]
    fn extension_filter_is_case_insensitive() {
        assert!(is_image_path(Path::new("a.JPG")));
        assert!(is_image_path(Path::new("b.Tiff")));
        assert!(is_image_path(Path::new("/x/y/c.gif")));
        assert!(!is_image_path(Path::new("notes.txt")));
        assert!(!is_image_path(Path::new("README")));
        assert!(!is_image_path(Path::new("scan.webp")));
    }

    #[test]
    fn unreadable_entries_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let b = write_png(dir.path(), "b.png", 40);
        let a = write_png(dir.path(), "a.png", 10);
        let entries = vec![
            Ok(b.clone()),
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied")),
            Ok(a.clone()),
        ];
        assert_eq!(image_files(dir.path(), entries.into_iter()), vec![a, b]);
    }

    #[test]
    fn one_corrupt_and_two_valid_images() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "a.png", 10);
        write_png(dir.path(), "b.PNG", 40);
        fs::write(dir.path().join("broken.jpg"), b"not really a jpeg").unwrap();
        fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let pipeline = ExtractionPipeline::new(MockRecognizer::new(LABEL));
        let mut cache = ProcessingCache::in_memory();
        let report = BatchCoordinator::new(&pipeline)
            .process_directory(&mut cache, dir.path(), false)
            .unwrap();

        assert_eq!(report.results.len(), 3);
        assert_eq!(report.summary.total, 3);
        assert_eq!(report.summary.failed, 1);
        assert_eq!(report.summary.newly_processed, 3);
        assert!(report.results["broken.jpg"].is_failed());
        assert!(!report.results["a.png"].is_failed());
        assert!(!report.results.contains_key("notes.txt"));
    }

    #[test]
    fn second_batch_is_served_from_cache_unless_forced() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "a.png", 10);
        write_png(dir.path(), "b.png", 40);
        let pipeline = ExtractionPipeline::new(MockRecognizer::new(LABEL));
        let mut cache = ProcessingCache::in_memory();
        let batch = BatchCoordinator::new(&pipeline);

        batch.process_directory(&mut cache, dir.path(), false).unwrap();
        let calls = pipeline.recognizer().calls();

        let again = batch.process_directory(&mut cache, dir.path(), false).unwrap();
        assert_eq!(again.summary.served_from_cache, 2);
        assert_eq!(again.summary.newly_processed, 0);
        assert_eq!(pipeline.recognizer().calls(), calls);

        let forced = batch.process_directory(&mut cache, dir.path(), true).unwrap();
        assert_eq!(forced.summary.newly_processed, 2);
        assert!(forced.summary.force);
        assert!(pipeline.recognizer().calls() > calls);
    }

    #[test]
    fn identical_files_are_each_processed_on_the_first_batch() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_png(dir.path(), "a.png", 10);
        fs::copy(&a, dir.path().join("b.png")).unwrap();
        let pipeline = ExtractionPipeline::new(MockRecognizer::new(LABEL));
        let mut cache = ProcessingCache::in_memory();

        let report = BatchCoordinator::new(&pipeline)
            .process_directory(&mut cache, dir.path(), false)
            .unwrap();
        assert_eq!(report.summary.newly_processed, 2);
        assert_eq!(report.summary.served_from_cache, 0);
        let b = report.results["b.png"].result().unwrap();
        assert!(!b.is_cached());
        assert_eq!(b.raw_text, LABEL);
    }

    #[test]
    fn cached_failure_reports_like_the_original_failure() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broken.jpg"), b"not really a jpeg").unwrap();
        let pipeline = ExtractionPipeline::new(MockRecognizer::new(LABEL));
        let mut cache = ProcessingCache::in_memory();
        let batch = BatchCoordinator::new(&pipeline);

        let first = batch.process_directory(&mut cache, dir.path(), false).unwrap();
        let second = batch.process_directory(&mut cache, dir.path(), false).unwrap();

        assert_eq!(second.summary.served_from_cache, 1);
        assert_eq!(second.summary.failed, 1);
        assert_eq!(
            serde_json::to_value(&first.results["broken.jpg"]).unwrap(),
            serde_json::to_value(&second.results["broken.jpg"]).unwrap()
        );
    }

    #[test]
    fn empty_directory_yields_zero_summary() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Makefile"), b"all:").unwrap();
        let pipeline = ExtractionPipeline::new(MockRecognizer::new(LABEL));
        let mut cache = ProcessingCache::in_memory();

        let report = BatchCoordinator::new(&pipeline)
            .process_directory(&mut cache, dir.path(), false)
            .unwrap();
        assert!(report.results.is_empty());
        assert_eq!(report.summary.total, 0);
        assert_eq!(report.summary.newly_processed, 0);
        assert_eq!(report.summary.served_from_cache, 0);
    }

    #[test]
    fn missing_directory_is_not_found() {
        let pipeline = ExtractionPipeline::new(MockRecognizer::new(LABEL));
        let mut cache = ProcessingCache::in_memory();
        let err = BatchCoordinator::new(&pipeline)
            .process_directory(&mut cache, Path::new("/no/such/dir"), false)
            .unwrap_err();
        assert!(matches!(err, ScanError::NotFound(_)));
    }

    #[test]
    fn report_exports_as_plain_json() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "a.png", 10);
        fs::write(dir.path().join("broken.gif"), b"GIF89a").unwrap();
        let pipeline = ExtractionPipeline::new(MockRecognizer::new(LABEL));
        let mut cache = ProcessingCache::in_memory();

        let report = BatchCoordinator::new(&pipeline)
            .process_directory(&mut cache, dir.path(), false)
            .unwrap();
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["summary"]["total"], 2);
        assert!(json["summary"]["processed_at"].is_string());
        assert_eq!(json["results"]["a.png"]["status"], "completed");
        assert_eq!(json["results"]["a.png"]["detected_barcodes"][0], "8885007027531");
        assert_eq!(json["results"]["broken.gif"]["status"], "failed");
        assert_eq!(json["results"]["broken.gif"]["kind"], "recognition");
    }
}
