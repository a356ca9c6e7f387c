pub mod batch;
pub mod extract;
pub mod pipeline;
pub mod preprocess;
pub mod recognizer;
pub mod verify;
pub mod watch;

pub use batch::{is_image_path, list_images, BatchCoordinator, IMAGE_EXTENSIONS};
pub use extract::{BarcodePattern, PatternExtractor, BARCODE_PATTERNS};
pub use pipeline::{ExtractionPipeline, PipelineOptions};
pub use preprocess::{prepare_binarized, prepare_for_ocr, PreprocessError};
pub use recognizer::{MockRecognizer, OcrError, RecognitionAdapter, UnavailableRecognizer};
pub use verify::{verdict_for, VerificationEngine};
pub use watch::{spawn_intake_watcher, SettleQueue, DEFAULT_SETTLE};

#[cfg(feature = "tesseract")]
pub use recognizer::tesseract_backend::TesseractRecognizer;
