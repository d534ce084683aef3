//! Background worker that periodically reclaims space occupied by
//! overwritten and tombstoned records.

use crate::error::Result;
use crate::file_manager;
use crate::keydir::KeyDirEntry;
use crate::store::SharedState;
use crossbeam::channel::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Handle to the running compactor thread. Dropping this without calling
/// [`CompactorHandle::stop`] leaves the thread running; [`crate::Store`]
/// always stops it explicitly on close.
pub struct CompactorHandle {
    stop_tx: Sender<()>,
    join: JoinHandle<()>,
}

impl CompactorHandle {
    /// Signals the worker to stop and waits for it to finish its current
    /// wake cycle.
    pub fn stop(self) {
        let _ = self.stop_tx.send(());
        if let Err(err) = self.join.join() {
            log::error!("compactor thread panicked: {err:?}");
        }
    }
}

/// Spawns the compactor thread. It wakes every `interval`; if at least
/// `file_limit` data files are present it runs a merge pass.
pub fn spawn(state: Arc<SharedState>, interval: Duration, file_limit: usize) -> CompactorHandle {
    let (stop_tx, stop_rx) = channel::bounded::<()>(0);
    let join = std::thread::Builder::new()
        .name("caskdb-compactor".to_string())
        .spawn(move || loop {
            match stop_rx.recv_timeout(interval) {
                Ok(()) => return,
                Err(RecvTimeoutError::Disconnected) => return,
                Err(RecvTimeoutError::Timeout) => {
                    if let Err(err) = run_if_due(&state, file_limit) {
                        log::error!("merge pass failed: {err}");
                    }
                }
            }
        })
        .expect("failed to spawn compactor thread");
    CompactorHandle { stop_tx, join }
}

fn run_if_due(state: &Arc<SharedState>, file_limit: usize) -> Result<()> {
    let files = file_manager::list_data_files(&state.dir)?;
    if files.len() < file_limit {
        return Ok(());
    }
    log::info!("compactor: {} data files present, running merge pass", files.len());
    merge_pass(state)
}

/// Runs one merge pass: rewrites every live keydir entry into fresh
/// output files and removes the superseded ones.
///
/// The write lock is held only for the final re-point-and-remove step;
/// reading old files and writing new ones happens without it, per the
/// store's shared-resource policy.
pub fn merge_pass(state: &Arc<SharedState>) -> Result<()> {
    // active_id and the file listing must come from the same instant: if a
    // rotation (Store::rotate_if_needed) lands between two separate lock
    // acquisitions here, `old` would be computed against a stale active_id
    // and could include the file foreground writers are currently
    // appending to.
    let (active_id, all_files) = {
        let inner = state.inner.read().unwrap();
        (inner.active_id, file_manager::list_data_files(&state.dir)?)
    };
    let active_name = file_manager::name_from_id(active_id);
    let old: Vec<String> = all_files.into_iter().filter(|name| *name != active_name).collect();
    if old.is_empty() {
        return Ok(());
    }

    // Snapshot of live entries as of right now. Entries that change before
    // the re-point step are detected via compare-and-swap below, so a
    // concurrent put/delete is never silently clobbered by a stale
    // rewrite.
    let snapshot: Vec<(String, KeyDirEntry)> = {
        let inner = state.inner.read().unwrap();
        inner.keydir.iter().map(|(k, v)| (k.clone(), *v)).collect()
    };

    let highest_old_id =
        old.iter().filter_map(|name| file_manager::id_from_name(name).ok()).max().unwrap_or(active_id);
    let mut out_id = highest_old_id.max(active_id) + 1;
    let mut out_file = file_manager::create_file(&state.dir, out_id)?;
    let mut out_size: u64 = 0;

    let mut rewritten: Vec<(String, KeyDirEntry, KeyDirEntry)> = Vec::new();

    for (key, entry) in snapshot {
        let value = crate::store::read_value(&state.dir, &entry)?;
        let header = crate::codec::Header::new(entry.timestamp, key.len() as u32, value.len() as u32);
        let record_size = crate::codec::HEADER_SIZE as u64 + key.len() as u64 + value.len() as u64;

        if out_size >= state.config.threshold {
            out_file = file_manager::create_file(&state.dir, out_id + 1)?;
            out_id += 1;
            out_size = 0;
        }

        let value_pos = crate::store::append_record(&mut out_file, header, key.as_bytes(), &value)?;
        out_size += record_size;

        let new_entry = KeyDirEntry::new(out_id, value.len() as u32, value_pos, entry.timestamp);
        rewritten.push((key, entry, new_entry));
    }

    {
        let mut inner = state.inner.write().unwrap();
        for (key, old_entry, new_entry) in rewritten {
            // Only re-point entries that haven't been touched by a
            // foreground put/delete since the snapshot was taken; a
            // changed or removed entry means a newer write already wins.
            if inner.keydir.get(&key) == Some(&old_entry) {
                inner.keydir.update(&key, new_entry);
            }
        }
        for name in &old {
            file_manager::remove_file(&state.dir, name)?;
        }
    }

    log::info!("compactor: merged {} old file(s) into {} output file(s)", old.len(), out_id - highest_old_id);
    Ok(())
}
