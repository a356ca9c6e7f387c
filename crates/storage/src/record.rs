use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shelfscan_core::{
    BarcodeSet, ExtractionResult, ImageFingerprint, ImageMetadata, ProductInfo, ResultSource,
    ScanError,
};

/// What the cache remembers about one path. Valid only while the file at
/// that path still hashes to `fingerprint`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub fingerprint: ImageFingerprint,
    pub recorded_at: DateTime<Utc>,
    pub file_size: u64,
    pub filename: String,
    #[serde(default)]
    pub detected_barcodes: BarcodeSet,
    #[serde(default)]
    pub product_info: ProductInfo,
    pub succeeded: bool,
    /// Why recognition failed, for records with `succeeded == false`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CacheRecord {
    pub fn from_result(fingerprint: ImageFingerprint, result: &ExtractionResult) -> Self {
        Self {
            fingerprint,
            recorded_at: result.produced_at,
            file_size: result.image_metadata.file_size,
            filename: result.image_metadata.filename.clone(),
            detected_barcodes: result.detected_barcodes.clone(),
            product_info: result.product_info.clone(),
            succeeded: result.succeeded,
            error: None,
        }
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    /// The recognition error a failed record stands for, so a cached
    /// failure reports the same way as the run that produced it.
    pub fn failure(&self) -> Option<ScanError> {
        if self.succeeded {
            return None;
        }
        let message = self.error.clone().unwrap_or_else(|| "recorded as failed".to_string());
        Some(ScanError::Recognition(message))
    }

    /// Rebuild the result this record was derived from. Raw text is not
    /// kept, so it comes back empty.
    pub fn to_result(&self) -> ExtractionResult {
        ExtractionResult {
            succeeded: self.succeeded,
            raw_text: String::new(),
            detected_barcodes: self.detected_barcodes.clone(),
            product_info: self.product_info.clone(),
            image_metadata: ImageMetadata::basic(self.filename.clone(), self.file_size),
            produced_at: self.recorded_at,
            source: ResultSource::Cached,
        }
    }
}
