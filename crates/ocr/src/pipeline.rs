use chrono::Utc;
use std::fs;
use std::path::Path;

use shelfscan_core::{
    fingerprint_bytes, fingerprint_file, BarcodeSet, ExtractionResult, ImageMetadata, ProductInfo,
    ResultSource, ScanConfig, ScanError,
};
use shelfscan_storage::{CacheRecord, ProcessingCache};

use crate::extract::PatternExtractor;
use crate::preprocess;
use crate::recognizer::RecognitionAdapter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Also recognize an Otsu-binarized copy and pool its barcodes.
    pub secondary_pass: bool,
    pub max_dimension: u32,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        let config = ScanConfig::default();
        Self::from(&config)
    }
}

impl From<&ScanConfig> for PipelineOptions {
    fn from(config: &ScanConfig) -> Self {
        Self { secondary_pass: config.secondary_pass, max_dimension: config.max_dimension }
    }
}

/// Orchestrates: hash → cache check → decode → recognize → extract → record.
///
/// Holds no state between runs. The cache is passed in by the caller, who
/// owns it.
pub struct ExtractionPipeline<R: RecognitionAdapter> {
    recognizer: R,
    options: PipelineOptions,
}

impl<R: RecognitionAdapter> ExtractionPipeline<R> {
    pub fn new(recognizer: R) -> Self {
        Self::with_options(recognizer, PipelineOptions::default())
    }

    pub fn with_options(recognizer: R, options: PipelineOptions) -> Self {
        Self { recognizer, options }
    }

    pub fn recognizer(&self) -> &R {
        &self.recognizer
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Extract from the image at `path`, consulting `cache` first unless
    /// `force` is set.
    ///
    /// Missing or unreadable files fail without touching the cache. A
    /// recognition failure is recorded (so unchanged content is not retried)
    /// and returned as `ScanError::Recognition`, on this run and on every
    /// later cache hit for the same bytes.
    pub fn process(
        &self,
        cache: &mut ProcessingCache,
        path: &Path,
        force: bool,
    ) -> Result<ExtractionResult, ScanError> {
        self.run(cache, path, force).1
    }

    /// As `process`, also telling whether the outcome came from the cache.
    pub(crate) fn run(
        &self,
        cache: &mut ProcessingCache,
        path: &Path,
        force: bool,
    ) -> (ResultSource, Result<ExtractionResult, ScanError>) {
        let span = tracing::debug_span!("extract", path = %path.display(), force);
        let _enter = span.enter();

        // 1. The file must exist and be a regular file.
        let meta = match fs::metadata(path) {
            Ok(meta) => meta,
            Err(e) => return (ResultSource::Fresh, Err(ScanError::from_io(path, e))),
        };
        if !meta.is_file() {
            let err = std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a regular file");
            return (ResultSource::Fresh, Err(ScanError::io(path, err)));
        }

        // 2. Cache check. Only this path's own record counts.
        if !force {
            let fingerprint = match fingerprint_file(path) {
                Ok(fp) => fp,
                Err(e) => return (ResultSource::Fresh, Err(ScanError::from_io(path, e))),
            };
            if let Some(record) = cache.lookup_fingerprint(path, &fingerprint) {
                tracing::debug!(%fingerprint, succeeded = record.succeeded, "cache hit");
                let outcome = match record.failure() {
                    Some(err) => Err(err),
                    None => Ok(record.to_result()),
                };
                return (ResultSource::Cached, outcome);
            }
            tracing::debug!(%fingerprint, "cache miss");
        }

        (ResultSource::Fresh, self.process_fresh(cache, path))
    }

    fn process_fresh(&self, cache: &mut ProcessingCache, path: &Path) -> Result<ExtractionResult, ScanError> {
        // 3. Read the bytes; recording is keyed to exactly these.
        let data = fs::read(path).map_err(|e| ScanError::from_io(path, e))?;
        let fingerprint = fingerprint_bytes(&data);
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let basic = ImageMetadata::basic(filename, data.len() as u64);

        // 4. Recognize and extract; 5. record either way.
        match self.recognize_and_extract(&data, basic.clone()) {
            Ok(result) => {
                cache.record(path, fingerprint, &result);
                save(cache);
                tracing::info!(
                    barcodes = result.detected_barcodes.len(),
                    attributes = result.product_info.len(),
                    "image processed"
                );
                Ok(result)
            }
            Err(err) => {
                let failed = ExtractionResult {
                    succeeded: false,
                    raw_text: String::new(),
                    detected_barcodes: BarcodeSet::new(),
                    product_info: ProductInfo::new(),
                    image_metadata: basic,
                    produced_at: Utc::now(),
                    source: ResultSource::Fresh,
                };
                let message = match &err {
                    ScanError::Recognition(msg) => msg.clone(),
                    other => other.to_string(),
                };
                cache.insert(path, CacheRecord::from_result(fingerprint, &failed).with_error(message));
                save(cache);
                tracing::warn!("{err}");
                Err(err)
            }
        }
    }

    fn recognize_and_extract(
        &self,
        data: &[u8],
        basic: ImageMetadata,
    ) -> Result<ExtractionResult, ScanError> {
        let decoded = preprocess::decode(data)?;
        let image_metadata = ImageMetadata {
            format: decoded.format.map(|f| format!("{f:?}")),
            width: Some(decoded.image.width()),
            height: Some(decoded.image.height()),
            color: Some(format!("{:?}", decoded.image.color())),
            ..basic
        };

        let primary = preprocess::prepare_for_ocr(&decoded.image, self.options.max_dimension)?;
        let raw_text = self.recognizer.recognize(&primary)?;
        let mut detected_barcodes = PatternExtractor::extract_barcodes(&raw_text);

        if self.options.secondary_pass {
            match self.recognize_binarized(&decoded.image) {
                Ok(text) => detected_barcodes.extend(PatternExtractor::extract_barcodes(&text)),
                Err(e) => tracing::warn!("secondary pass skipped: {e}"),
            }
        }

        match self.recognizer.decode_symbols(data) {
            Ok(Some(symbols)) => detected_barcodes.extend(
                symbols
                    .iter()
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
            ),
            Ok(None) => {}
            Err(e) => tracing::warn!("symbol decode failed, using OCR text only: {e}"),
        }

        let product_info = PatternExtractor::extract_product_info(&raw_text);

        Ok(ExtractionResult {
            succeeded: true,
            raw_text,
            detected_barcodes,
            product_info,
            image_metadata,
            produced_at: Utc::now(),
            source: ResultSource::Fresh,
        })
    }

    fn recognize_binarized(&self, image: &image::DynamicImage) -> Result<String, ScanError> {
        let png = preprocess::prepare_binarized(image, self.options.max_dimension)?;
        Ok(self.recognizer.recognize(&png)?)
    }
}

// The cache is an optimization; a failed write must not fail the run.
fn save(cache: &ProcessingCache) {
    if let Err(e) = cache.persist() {
        tracing::warn!("cache not saved: {e}");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
