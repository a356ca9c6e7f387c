use chrono::Utc;
use std::path::Path;

use shelfscan_core::{ExtractionResult, ScanError, VerificationVerdict};
use shelfscan_storage::ProcessingCache;

use crate::pipeline::ExtractionPipeline;
use crate::recognizer::RecognitionAdapter;

/// Checks a hand-scanned barcode against what the pipeline sees in an image.
pub struct VerificationEngine<'p, R: RecognitionAdapter> {
    pipeline: &'p ExtractionPipeline<R>,
}

impl<'p, R: RecognitionAdapter> VerificationEngine<'p, R> {
    pub fn new(pipeline: &'p ExtractionPipeline<R>) -> Self {
        Self { pipeline }
    }

    /// Runs the pipeline (cache respected) and tests exact membership.
    pub fn verify(
        &self,
        cache: &mut ProcessingCache,
        expected_barcode: &str,
        path: &Path,
    ) -> Result<VerificationVerdict, ScanError> {
        let result = self.pipeline.process(cache, path, false)?;
        let verdict = verdict_for(expected_barcode, &result);
        tracing::debug!(
            path = %path.display(),
            barcode = expected_barcode,
            matches = verdict.matches,
            "verification"
        );
        Ok(verdict)
    }
}

/// Exact string equality against the detected set; no fuzzy matching.
pub fn verdict_for(expected_barcode: &str, result: &ExtractionResult) -> VerificationVerdict {
    let matches = result.has_barcode(expected_barcode);
    VerificationVerdict {
        matches,
        queried_barcode: expected_barcode.to_string(),
        detected_barcodes: result.detected_barcodes.clone(),
        confidence: if matches { 1.0 } else { 0.0 },
        product_info: result.product_info.clone(),
        verified_at: Utc::now(),
    }
}
