//! The store facade: binds the record codec, file manager, keydir,
//! recovery, write/read paths, and compactor into a single handle.

use crate::codec::{self, Header};
use crate::compactor::{self, CompactorHandle};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::file_manager;
use crate::keydir::{KeyDir, KeyDirEntry};
use crate::recovery;
use fs4::FileExt;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Mutable state protected by the store's reader-writer lock: the keydir
/// and the active file handle travel together, since both rotation and
/// the compactor's final re-point touch them as one unit.
pub(crate) struct Inner {
    pub(crate) keydir: KeyDir,
    pub(crate) active_id: u32,
    active_file: File,
    active_size: u64,
}

/// State shared between a [`Store`] handle and its background compactor
/// thread.
pub(crate) struct SharedState {
    pub(crate) dir: PathBuf,
    pub(crate) config: Config,
    pub(crate) inner: RwLock<Inner>,
    // Held for the lifetime of the store; releasing it (on drop) releases
    // the advisory lock taken out in `Store::open`.
    _lock_file: File,
}

/// An open handle to a Bitcask-model key-value store.
///
/// Cheap to clone: clones share the same underlying directory, keydir, and
/// compactor thread via an `Arc`.
#[derive(Clone)]
pub struct Store {
    state: Arc<SharedState>,
    compactor: Arc<Mutex<Option<CompactorHandle>>>,
}

impl Store {
    /// Opens (creating if absent) a store at `path` with default
    /// configuration.
    pub fn open(path: impl AsRef<Path>) -> Result<Store> {
        Store::open_with_config(path, Config::default())
    }

    /// Opens (creating if absent) a store at `path` with the given
    /// configuration. Recovers the keydir from existing data files and
    /// starts the background compactor.
    pub fn open_with_config(path: impl AsRef<Path>, config: Config) -> Result<Store> {
        let dir = path.as_ref().to_path_buf();
        file_manager::ensure_dir(&dir)?;

        let lock_file = acquire_directory_lock(&dir)?;

        log::info!("opening store {}", dir.display());
        let keydir = recovery::recover(&dir)?;
        log::info!("indexed {} live keys in {}", keydir.len(), dir.display());

        let active = file_manager::choose_active(&dir, config.threshold)?;
        let inner = Inner {
            keydir,
            active_id: active.id,
            active_file: active.file,
            active_size: active.size,
        };

        let state = Arc::new(SharedState {
            dir,
            config,
            inner: RwLock::new(inner),
            _lock_file: lock_file,
        });

        let handle = compactor::spawn(
            state.clone(),
            Duration::from_secs(state.config.merge_interval_secs),
            state.config.merge_file_limit,
        );

        Ok(Store { state, compactor: Arc::new(Mutex::new(Some(handle))) })
    }

    /// Stores `value` under `key`, overwriting any previous value.
    ///
    /// `value` must be non-empty: an empty value would be indistinguishable
    /// on disk from a tombstone.
    pub fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        if value.is_empty() {
            return Err(Error::InvalidArgument("value must not be empty".to_string()));
        }
        if key.len() > u32::MAX as usize {
            return Err(Error::InvalidArgument("key exceeds maximum length".to_string()));
        }

        let now = unix_timestamp();
        let mut inner = self.state.inner.write().unwrap();
        self.rotate_if_needed(&mut inner)?;

        let header = Header::new(now, key.len() as u32, value.len() as u32);
        let value_pos = append_record(&mut inner.active_file, header, key.as_bytes(), value)?;
        sync(&inner.active_file, self.state.config.sync_on_write)?;
        inner.active_size += codec::HEADER_SIZE as u64 + key.len() as u64 + value.len() as u64;

        inner.keydir.insert(
            key.to_string(),
            KeyDirEntry::new(inner.active_id, value.len() as u32, value_pos, now),
        );
        Ok(())
    }

    /// Retrieves the value stored under `key`.
    pub fn get(&self, key: &str) -> Result<Vec<u8>> {
        let entry = {
            let inner = self.state.inner.read().unwrap();
            *inner.keydir.get(key).ok_or_else(|| Error::NotFound(key.to_string()))?
        };
        read_value(&self.state.dir, &entry)
    }

    /// Removes `key`, appending a tombstone record.
    pub fn delete(&self, key: &str) -> Result<()> {
        let now = unix_timestamp();
        let mut inner = self.state.inner.write().unwrap();
        if inner.keydir.remove(key).is_none() {
            return Err(Error::NotFound(key.to_string()));
        }

        self.rotate_if_needed(&mut inner)?;
        let header = Header::new(now, key.len() as u32, 0);
        append_record(&mut inner.active_file, header, key.as_bytes(), &[])?;
        sync(&inner.active_file, self.state.config.sync_on_write)?;
        inner.active_size += codec::HEADER_SIZE as u64 + key.len() as u64;
        Ok(())
    }

    /// Runs a merge pass immediately, outside the regular compactor
    /// schedule. Used by the CLI's `compact` subcommand and by tests that
    /// don't want to wait on the interval.
    pub fn compact_now(&self) -> Result<()> {
        compactor::merge_pass(&self.state)
    }

    /// Number of live keys currently indexed.
    pub fn len(&self) -> usize {
        self.state.inner.read().unwrap().keydir.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of data files currently on disk.
    pub fn file_count(&self) -> Result<usize> {
        Ok(file_manager::list_data_files(&self.state.dir)?.len())
    }

    /// Stops the compactor and releases file handles. Safe to call more
    /// than once; later calls are no-ops. Also runs on drop, in which case
    /// errors are logged rather than returned.
    pub fn close(&self) {
        if let Some(handle) = self.compactor.lock().unwrap().take() {
            handle.stop();
        }
    }

    /// Rotates the active file if its size, as of the last completed
    /// write, has already reached the threshold. The record about to be
    /// appended is not itself weighed in this check, so a file may grow
    /// past `threshold` by up to one record before the next put rotates it.
    fn rotate_if_needed(&self, inner: &mut Inner) -> Result<()> {
        if inner.active_size >= self.state.config.threshold {
            let next_id = inner.active_id + 1;
            log::info!("rotating active file {} -> {}", inner.active_id, next_id);
            inner.active_file = file_manager::create_file(&self.state.dir, next_id)?;
            inner.active_id = next_id;
            inner.active_size = 0;
        }
        Ok(())
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        // Only the last handle sharing this Arc should stop the
        // compactor; Arc::strong_count lets us approximate that without
        // requiring callers to remember to call `close`.
        if Arc::strong_count(&self.compactor) == 1 {
            self.close();
        }
    }
}

/// Appends a record (header + key + optional value) to `file` and returns
/// the offset at which the value bytes begin.
pub(crate) fn append_record(file: &mut File, header: Header, key: &[u8], value: &[u8]) -> Result<u64> {
    file.seek(SeekFrom::End(0))?;
    file.write_all(&codec::encode_header(header))?;
    file.write_all(key)?;
    let value_pos = file.stream_position()?;
    if !value.is_empty() {
        file.write_all(value)?;
    }
    Ok(value_pos)
}

/// Reads the value bytes referenced by a keydir entry.
pub(crate) fn read_value(dir: &Path, entry: &KeyDirEntry) -> Result<Vec<u8>> {
    let mut file = file_manager::open_read(dir, entry.file_id)?;
    file.seek(SeekFrom::Start(entry.value_pos))?;
    let mut buf = vec![0u8; entry.value_size as usize];
    file.read_exact(&mut buf).map_err(|err| {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::Corruption(format!(
                "value for offset {} in file {} truncated",
                entry.value_pos, entry.file_id
            ))
        } else {
            Error::Io(err)
        }
    })?;
    Ok(buf)
}

/// Pushes the just-written record to stable storage. `File` writes are
/// unbuffered in user space already, so the "flush" the spec calls for on
/// every write is a no-op here; `sync_on_write` is the opt-in to pay for an
/// actual `fsync` instead of best-effort durability via the OS page cache.
fn sync(file: &File, sync_on_write: bool) -> Result<()> {
    if sync_on_write {
        file.sync_all()?;
    }
    Ok(())
}

fn unix_timestamp() -> u32 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as u32
}

fn acquire_directory_lock(dir: &Path) -> Result<File> {
    let lock_path = dir.join(".lock");
    let lock_file =
        std::fs::OpenOptions::new().create(true).read(true).write(true).open(&lock_path)?;
    lock_file.try_lock_exclusive().map_err(|_| Error::AlreadyOpen(dir.to_path_buf()))?;
    Ok(lock_file)
}
