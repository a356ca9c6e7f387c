pub mod config;
pub mod error;
pub mod export;
pub mod fingerprint;
pub mod product;
pub mod result;

pub use config::{ConfigError, ScanConfig, TesseractConfig};
pub use error::{ErrorKind, FailureReport, ScanError};
pub use fingerprint::{fingerprint_bytes, fingerprint_file, fingerprint_reader, ImageFingerprint};
pub use product::{ProductAttribute, ProductInfo};
pub use result::{
    BarcodeSet, BatchEntry, BatchReport, BatchSummary, ExtractionResult, ImageMetadata,
    ResultSource, VerificationVerdict,
};
