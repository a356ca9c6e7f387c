use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use crate::batch::is_image_path;

/// How long a path must stay quiet before it is handed to the pipeline.
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(500);

/// Spawn a notify watcher on `watch_dir` that sends image paths to `tx`
/// whenever they are created, written, closed after writing, or moved in.
/// The returned watcher must be kept alive for watching to continue.
///
/// A single copy produces several events; pair this with a `SettleQueue`.
pub fn spawn_intake_watcher(
    watch_dir: &Path,
    tx: mpsc::Sender<PathBuf>,
) -> notify::Result<impl notify::Watcher> {
    use notify::{RecursiveMode, Watcher};

    let mut watcher = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
        match event {
            Ok(ev) => {
                for path in arrived_images(&ev) {
                    if tx.try_send(path).is_err() {
                        tracing::warn!("intake queue full or closed; dropping event");
                    }
                }
            }
            Err(e) => tracing::warn!("watch error: {e}"),
        }
    })?;

    watcher.watch(watch_dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

/// Image paths whose content may have just arrived or changed.
fn arrived_images(event: &notify::Event) -> Vec<PathBuf> {
    use notify::event::{AccessKind, AccessMode, ModifyKind, RenameMode};
    use notify::EventKind;

    let relevant = matches!(
        event.kind,
        EventKind::Create(_)
            | EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Any)
            | EventKind::Modify(ModifyKind::Name(RenameMode::To))
            | EventKind::Access(AccessKind::Close(AccessMode::Write))
    );
    if !relevant {
        return Vec::new();
    }
    event
        .paths
        .iter()
        .filter(|p| is_image_path(p))
        .cloned()
        .collect()
}

/// Holds paths until no event has touched them for the settle period, so a
/// file is processed once its writer is done rather than on the first event.
#[derive(Debug)]
pub struct SettleQueue {
    settle: Duration,
    pending: HashMap<PathBuf, Instant>,
}

impl SettleQueue {
    pub fn new(settle: Duration) -> Self {
        Self { settle, pending: HashMap::new() }
    }

    pub fn touch(&mut self, path: PathBuf, now: Instant) {
        self.pending.insert(path, now);
    }

    /// Remove and return the paths that have been quiet long enough.
    pub fn ready(&mut self, now: Instant) -> Vec<PathBuf> {
        let settle = self.settle;
        let mut ready: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, seen)| now.duration_since(**seen) >= settle)
            .map(|(path, _)| path.clone())
            .collect();
        for path in &ready {
            self.pending.remove(path);
        }
        ready.sort();
        ready
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Default for SettleQueue {
    fn default() -> Self {
        Self::new(DEFAULT_SETTLE)
    }
}
