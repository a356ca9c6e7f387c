//! Plain JSON rendering of results for reports, UIs and inventory merges.

use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

pub fn to_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(value)
}

/// Write `value` as pretty JSON to `path`, via a temp file and rename.
pub fn save_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> io::Result<()> {
    let body = to_json(value).map_err(io::Error::other)?;
    write_atomic(path, body.as_bytes())
}

/// Writes to a uniquely named sibling temp file first, then renames over
/// `path`, so an interrupted write never leaves a truncated target behind
/// and concurrent writers never share a temp file.
pub fn write_atomic(path: &Path, content: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_json_writes_pretty_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("report.json");
        save_json(&path, &serde_json::json!({"total": 3})).unwrap();

        let body = fs::read_to_string(&path).unwrap();
        assert!(body.contains("\n"));
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["total"], 3);
    }

    #[test]
    fn write_atomic_replaces_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn concurrent_writers_never_clobber_each_other() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let bodies: Vec<String> = (0..8).map(|i| format!("{{\"writer\": {i}}}")).collect();

        std::thread::scope(|scope| {
            for body in &bodies {
                let path = &path;
                scope.spawn(move || {
                    for _ in 0..20 {
                        write_atomic(path, body.as_bytes()).unwrap();
                    }
                });
            }
        });

        // Whatever won is one writer's complete document.
        let last = fs::read_to_string(&path).unwrap();
        assert!(bodies.contains(&last), "torn write: {last}");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
