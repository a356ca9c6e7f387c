use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

use shelfscan_core::ScanError;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Image decode error: {0}")]
    ImageDecode(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("Tesseract not available; build with the `tesseract` feature")]
    NotAvailable,
}

impl From<OcrError> for ScanError {
    fn from(e: OcrError) -> Self {
        ScanError::Recognition(e.to_string())
    }
}

/// The external recognition engines, seen through one narrow seam.
/// Implementations accept PNG/JPEG bytes.
pub trait RecognitionAdapter: Send + Sync {
    /// Run OCR and return the raw text.
    fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError>;

    /// Decode barcode symbols directly from pixels. `Ok(None)` means the
    /// adapter has no symbol decoder; callers fall back to OCR text.
    fn decode_symbols(&self, _image_bytes: &[u8]) -> Result<Option<Vec<String>>, OcrError> {
        Ok(None)
    }
}

impl<T: RecognitionAdapter + ?Sized> RecognitionAdapter for &T {
    fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError> {
        (**self).recognize(image_bytes)
    }

    fn decode_symbols(&self, image_bytes: &[u8]) -> Result<Option<Vec<String>>, OcrError> {
        (**self).decode_symbols(image_bytes)
    }
}

impl<T: RecognitionAdapter + ?Sized> RecognitionAdapter for Box<T> {
    fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError> {
        (**self).recognize(image_bytes)
    }

    fn decode_symbols(&self, image_bytes: &[u8]) -> Result<Option<Vec<String>>, OcrError> {
        (**self).decode_symbols(image_bytes)
    }
}

// ── Mock backend (always available, used for tests) ───────────────────────────

/// Returns preset output and counts how often it was asked. Lets the
/// pipeline be tested without Tesseract installed.
#[derive(Debug, Default)]
pub struct MockRecognizer {
    pub text: String,
    pub symbols: Option<Vec<String>>,
    pub failure: Option<String>,
    calls: AtomicUsize,
}

impl MockRecognizer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), ..Self::default() }
    }

    /// Every `recognize` call fails with an engine error.
    pub fn failing(message: impl Into<String>) -> Self {
        Self { failure: Some(message.into()), ..Self::default() }
    }

    pub fn with_symbols<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.symbols = Some(symbols.into_iter().map(Into::into).collect());
        self
    }

    /// Number of `recognize` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RecognitionAdapter for MockRecognizer {
    fn recognize(&self, _image_bytes: &[u8]) -> Result<String, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(msg) => Err(OcrError::Engine(msg.clone())),
            None => Ok(self.text.clone()),
        }
    }

    fn decode_symbols(&self, _image_bytes: &[u8]) -> Result<Option<Vec<String>>, OcrError> {
        Ok(self.symbols.clone())
    }
}

/// Stand-in when no engine was compiled in. Every call fails with
/// `NotAvailable`.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableRecognizer;

impl RecognitionAdapter for UnavailableRecognizer {
    fn recognize(&self, _image_bytes: &[u8]) -> Result<String, OcrError> {
        Err(OcrError::NotAvailable)
    }
}

// ── Tesseract backend (optional, gated behind `tesseract` feature) ─────────────

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use super::{OcrError, RecognitionAdapter};
    use leptess::LepTess;

    pub struct TesseractRecognizer {
        data_path: Option<String>,
        lang: String,
    }

    impl TesseractRecognizer {
        pub fn new(data_path: Option<String>, lang: &str) -> Self {
            Self { data_path, lang: lang.to_string() }
        }
    }

    impl RecognitionAdapter for TesseractRecognizer {
        fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError> {
            let mut lt = LepTess::new(self.data_path.as_deref(), &self.lang)
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            lt.set_image_from_mem(image_bytes)
                .map_err(|e| OcrError::ImageDecode(e.to_string()))?;
            lt.get_utf8_text().map_err(|e| OcrError::Engine(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_returns_preset_text_and_counts_calls() {
        let r = MockRecognizer::new("EPSON\n8885007027531");
        assert_eq!(r.recognize(b"fake image data").unwrap(), "EPSON\n8885007027531");
        assert_eq!(r.recognize(b"").unwrap(), "EPSON\n8885007027531");
        assert_eq!(r.calls(), 2);
    }

    #[test]
    fn mock_without_symbols_reports_no_decoder() {
        let r = MockRecognizer::new("text");
        assert_eq!(r.decode_symbols(b"img").unwrap(), None);

        let r = r.with_symbols(["4006381333931"]);
        assert_eq!(r.decode_symbols(b"img").unwrap(), Some(vec!["4006381333931".to_string()]));
    }

    #[test]
    fn boxed_adapter_forwards_both_capabilities() {
        let boxed: Box<dyn RecognitionAdapter> =
            Box::new(MockRecognizer::new("HP").with_symbols(["12345678"]));
        assert_eq!(boxed.recognize(b"img").unwrap(), "HP");
        assert_eq!(boxed.decode_symbols(b"img").unwrap().unwrap(), vec!["12345678"]);
    }

    #[test]
    fn unavailable_engine_always_fails() {
        let err = UnavailableRecognizer.recognize(b"img").unwrap_err();
        assert!(matches!(err, OcrError::NotAvailable));
        assert_eq!(UnavailableRecognizer.decode_symbols(b"img").unwrap(), None);
    }

    #[test]
    fn failing_mock_maps_to_recognition_error() {
        let r = MockRecognizer::failing("engine crashed");
        let err = r.recognize(b"img").unwrap_err();
        assert!(matches!(ScanError::from(err), ScanError::Recognition(_)));
        assert_eq!(r.calls(), 1);
    }
}
