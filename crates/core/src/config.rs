use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_MAX_DIMENSION: u32 = 2800;
pub const DEFAULT_CACHE_FILE: &str = "processed_images.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TesseractConfig {
    pub data_path: Option<String>,
    pub lang: String,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self { data_path: None, lang: "eng".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Cache store location. Resolved against the app data dir when unset.
    pub cache_path: Option<PathBuf>,
    /// Run a second recognition pass over a binarized copy of the image.
    pub secondary_pass: bool,
    /// Longest edge, in pixels, handed to the recognizer.
    pub max_dimension: u32,
    pub tesseract: TesseractConfig,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            cache_path: None,
            secondary_pass: true,
            max_dimension: DEFAULT_MAX_DIMENSION,
            tesseract: TesseractConfig::default(),
        }
    }
}

impl ScanConfig {
    pub fn from_toml(toml_content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_content)?)
    }

    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read { path: path.to_path_buf(), source }),
        }
    }

    /// The configured cache path, or `<data_dir>/processed_images.json`.
    pub fn cache_path_or(&self, data_dir: &Path) -> PathBuf {
        self.cache_path
            .clone()
            .unwrap_or_else(|| data_dir.join(DEFAULT_CACHE_FILE))
    }
}
