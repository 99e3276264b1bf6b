use crate::error::Result;
use crate::schema::encode_definition;
use crate::store::{Registry, ResourceStore, StoreState};
use std::io::Write;
use std::path::Path;
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;

/// How often the background worker flushes dirty stores unless told otherwise.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Write a store back to its definition file if it has unsaved changes.
///
/// Holds the store's write lock for the duration, so no mutation interleaves
/// with the write. `dirty` is cleared only once the new file is in place.
/// Returns whether a file was written; stores without a backing file are
/// never written.
pub fn snapshot(store: &ResourceStore) -> Result<bool> {
    if store.path().is_none() {
        return Ok(false);
    }
    write_locked(store, &mut store.state.write())
}

/// [`snapshot`], giving up when the write lock is not free within `timeout`.
pub fn try_snapshot(store: &ResourceStore, timeout: Duration) -> Result<bool> {
    if store.path().is_none() {
        return Ok(false);
    }
    match store.state.try_write_for(timeout) {
        Some(mut state) => write_locked(store, &mut state),
        None => {
            log::warn!("Skipping snapshot of '{}': store is locked", store.name());
            Ok(false)
        }
    }
}

fn write_locked(store: &ResourceStore, state: &mut StoreState) -> Result<bool> {
    let Some(path) = store.path() else {
        return Ok(false);
    };
    if !state.dirty {
        log::debug!("Skipping snapshot of '{}': no changes", store.name());
        return Ok(false);
    }

    let content = encode_definition(&store.definition_from(state), store.format())?;
    write_atomic(path, content.as_bytes())?;

    state.dirty = false;
    state.last_snapshot = Some(chrono::Utc::now());
    log::info!(
        "Snapshotted '{}' ({} records) to {}",
        store.name(),
        state.records.len(),
        path.display()
    );
    Ok(true)
}

/// Write to a temp file beside `path`, then rename it over `path`. A crash
/// leaves either the old file or the new one, never a partial write.
fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Background thread that snapshots every store of a registry on a fixed
/// interval, plus once more on shutdown.
pub struct SnapshotWorker {
    stop_tx: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl SnapshotWorker {
    pub fn start(registry: Arc<Registry>, interval: Duration) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let thread = std::thread::spawn(move || {
            log::info!("Snapshot worker started (interval {}s)", interval.as_secs());
            loop {
                match stop_rx.recv_timeout(interval) {
                    Err(mpsc::RecvTimeoutError::Timeout) => flush(&registry),
                    // Stop requested or the worker handle was dropped
                    Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                        flush(&registry);
                        break;
                    }
                }
            }
            log::info!("Snapshot worker stopped");
        });

        SnapshotWorker {
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        }
    }

    /// Stop the worker after a final flush, waiting for it to finish.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Snapshot worker panicked");
            }
        }
    }
}

impl Drop for SnapshotWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn flush(registry: &Registry) {
    match registry.save_all() {
        Ok(0) => {}
        Ok(n) => log::debug!("Periodic snapshot wrote {n} resources"),
        Err(e) => log::warn!("Periodic snapshot failed: {e}"),
    }
}
