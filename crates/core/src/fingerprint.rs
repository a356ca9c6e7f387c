use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;

/// Read buffer size for streamed hashing.
const CHUNK_SIZE: usize = 8192;

/// SHA-256 digest of a file's bytes. Two files with equal fingerprints are
/// treated as the same image regardless of where they live.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageFingerprint([u8; 32]);

impl ImageFingerprint {
    pub fn from_bytes(digest: [u8; 32]) -> Self {
        Self(digest)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex encoding (64 chars).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ImageFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ImageFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImageFingerprint({})", &self.to_hex()[..12])
    }
}

impl FromStr for ImageFingerprint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = hex::decode(s).map_err(|e| format!("Invalid fingerprint '{s}': {e}"))?;
        let digest: [u8; 32] = raw
            .try_into()
            .map_err(|_| format!("Invalid fingerprint '{s}': expected 32 bytes"))?;
        Ok(Self(digest))
    }
}

impl Serialize for ImageFingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ImageFingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Fingerprint a file via streaming reads (constant memory).
pub fn fingerprint_file(path: &Path) -> io::Result<ImageFingerprint> {
    let file = std::fs::File::open(path)?;
    fingerprint_reader(file)
}

/// Fingerprint anything readable, in bounded chunks.
pub fn fingerprint_reader<R: Read>(mut reader: R) -> io::Result<ImageFingerprint> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
    }
    Ok(ImageFingerprint(hasher.finalize().into()))
}

/// Fingerprint an in-memory byte slice.
pub fn fingerprint_bytes(data: &[u8]) -> ImageFingerprint {
    let mut hasher = Sha256::new();
    hasher.update(data);
    ImageFingerprint(hasher.finalize().into())
}
