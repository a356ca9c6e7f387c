use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{FailureReport, ScanError};
use crate::product::ProductInfo;

/// Deduplicated barcode candidates. Ordered only so output is stable.
pub type BarcodeSet = BTreeSet<String>;

/// Whether a result was computed now or served from the processing cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    Fresh,
    Cached,
}

impl fmt::Display for ResultSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultSource::Fresh => write!(f, "fresh"),
            ResultSource::Cached => write!(f, "cached"),
        }
    }
}

/// Descriptive facts about the source image. Decoder-derived fields are
/// absent for cached results and for images that failed to decode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub filename: String,
    pub file_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl ImageMetadata {
    pub fn basic(filename: impl Into<String>, file_size: u64) -> Self {
        Self { filename: filename.into(), file_size, ..Self::default() }
    }
}

/// Outcome of one pipeline run over one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub succeeded: bool,
    /// Recognized text. Empty for cached results; the cache keeps only
    /// the derived fields.
    pub raw_text: String,
    pub detected_barcodes: BarcodeSet,
    pub product_info: ProductInfo,
    pub image_metadata: ImageMetadata,
    pub produced_at: DateTime<Utc>,
    pub source: ResultSource,
}

impl ExtractionResult {
    pub fn is_cached(&self) -> bool {
        self.source == ResultSource::Cached
    }

    pub fn has_barcode(&self, barcode: &str) -> bool {
        self.detected_barcodes.contains(barcode)
    }

    /// Equal extraction content, ignoring text, timestamps and provenance.
    pub fn same_extraction(&self, other: &ExtractionResult) -> bool {
        self.succeeded == other.succeeded
            && self.detected_barcodes == other.detected_barcodes
            && self.product_info == other.product_info
            && self.image_metadata.filename == other.image_metadata.filename
            && self.image_metadata.file_size == other.image_metadata.file_size
    }
}

/// Result of checking a hand-scanned barcode against what an image shows.
/// Confidence is binary: exact set membership yields 1.0, anything else 0.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationVerdict {
    pub matches: bool,
    pub queried_barcode: String,
    pub detected_barcodes: BarcodeSet,
    pub confidence: f32,
    pub product_info: ProductInfo,
    pub verified_at: DateTime<Utc>,
}

/// One file's slot in a batch report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchEntry {
    Completed(ExtractionResult),
    Failed(FailureReport),
}

impl BatchEntry {
    /// True for errors and for completed runs that recorded a failure.
    pub fn is_failed(&self) -> bool {
        match self {
            BatchEntry::Completed(r) => !r.succeeded,
            BatchEntry::Failed(_) => true,
        }
    }

    pub fn result(&self) -> Option<&ExtractionResult> {
        match self {
            BatchEntry::Completed(r) => Some(r),
            BatchEntry::Failed(_) => None,
        }
    }
}

impl From<Result<ExtractionResult, ScanError>> for BatchEntry {
    fn from(outcome: Result<ExtractionResult, ScanError>) -> Self {
        match outcome {
            Ok(r) => BatchEntry::Completed(r),
            Err(e) => BatchEntry::Failed(FailureReport::from(&e)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub newly_processed: usize,
    pub served_from_cache: usize,
    pub failed: usize,
    pub force: bool,
    pub processed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Keyed by file name within the scanned directory.
    pub results: BTreeMap<String, BatchEntry>,
    pub summary: BatchSummary,
}
