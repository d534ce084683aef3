//! Naming, creation, rotation, and enumeration of data files within a
//! store directory.
//!
//! Data files are named `NNNNNN.data`, a zero-padded six-digit decimal id.
//! Higher numeric id means a more recently created file; exactly one file
//! is active (writable) at a time.

use crate::error::{Error, Result};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// Suffix shared by all data files.
pub const DATA_SUFFIX: &str = ".data";

/// Converts a file id into its canonical six-digit filename.
pub fn name_from_id(id: u32) -> String {
    format!("{id:06}{DATA_SUFFIX}")
}

/// Parses a data filename back into its numeric id.
///
/// Returns `Corruption` if `name` isn't a well-formed `NNNNNN.data` name,
/// since encountering one means the directory holds a file this store
/// didn't write.
pub fn id_from_name(name: &str) -> Result<u32> {
    let stem = name.strip_suffix(DATA_SUFFIX).ok_or_else(|| {
        Error::Corruption(format!("not a data file name: {name}"))
    })?;
    stem.parse::<u32>()
        .map_err(|_| Error::Corruption(format!("not a data file name: {name}")))
}

/// Lists the data file names in `dir`, sorted ascending by numeric id.
///
/// Lexicographic sort over the zero-padded names is equivalent to sorting
/// by the parsed id, so no parsing is needed to order them.
pub fn list_data_files(dir: &Path) -> Result<Vec<String>> {
    let mut names: Vec<String> = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if let Some(name) = entry.file_name().to_str() {
            if name.ends_with(DATA_SUFFIX) {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

/// The byte length of `dir/name`.
pub fn size_of(dir: &Path, name: &str) -> Result<u64> {
    Ok(fs::metadata(dir.join(name))?.len())
}

/// Creates a new, empty data file for `id` in append+read mode.
///
/// Fails with `Corruption` if a file with this id already exists and is
/// non-empty — that would mean a file id is being reused, which should
/// never happen since ids only increase.
pub fn create_file(dir: &Path, id: u32) -> Result<File> {
    let path = dir.join(name_from_id(id));
    if let Ok(metadata) = fs::metadata(&path) {
        if metadata.len() > 0 {
            return Err(Error::Corruption(format!(
                "refusing to reuse non-empty data file {}",
                path.display()
            )));
        }
    }
    let file = OpenOptions::new().create(true).read(true).append(true).open(&path)?;
    Ok(file)
}

/// Opens an existing data file by id in append+read mode.
pub fn open_active(dir: &Path, id: u32) -> Result<File> {
    let path = dir.join(name_from_id(id));
    let file = OpenOptions::new().create(true).read(true).append(true).open(path)?;
    Ok(file)
}

/// Opens a data file by id for reading only.
pub fn open_read(dir: &Path, id: u32) -> Result<File> {
    let path = dir.join(name_from_id(id));
    Ok(File::open(path)?)
}

/// Removes a data file by name.
pub fn remove_file(dir: &Path, name: &str) -> Result<()> {
    fs::remove_file(dir.join(name))?;
    Ok(())
}

/// The result of choosing which file should receive new writes.
pub struct ActiveFile {
    pub id: u32,
    pub file: File,
    pub size: u64,
}

/// Chooses the active file: the highest-id existing file if its size is
/// strictly below `threshold`, or a newly-created file one id higher. If
/// no data files exist yet, creates file id 0.
pub fn choose_active(dir: &Path, threshold: u64) -> Result<ActiveFile> {
    let files = list_data_files(dir)?;
    match files.last() {
        None => {
            let file = create_file(dir, 0)?;
            Ok(ActiveFile { id: 0, file, size: 0 })
        }
        Some(latest) => {
            let latest_id = id_from_name(latest)?;
            let size = size_of(dir, latest)?;
            if size < threshold {
                let file = open_active(dir, latest_id)?;
                Ok(ActiveFile { id: latest_id, file, size })
            } else {
                let next_id = latest_id + 1;
                let file = create_file(dir, next_id)?;
                Ok(ActiveFile { id: next_id, file, size: 0 })
            }
        }
    }
}

/// Ensures the store directory exists, creating it (and parents) if not.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    Ok(())
}

/// Path of a data file within `dir` given its id.
pub fn path_for_id(dir: &Path, id: u32) -> PathBuf {
    dir.join(name_from_id(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn name_id_round_trip() {
        for id in [0u32, 1, 17, 999_999] {
            assert_eq!(id_from_name(&name_from_id(id)).unwrap(), id);
        }
    }

    #[test]
    fn name_from_id_is_zero_padded_six_digits() {
        assert_eq!(name_from_id(0), "000000.data");
        assert_eq!(name_from_id(17), "000017.data");
    }

    #[test]
    fn id_from_name_rejects_garbage() {
        assert!(id_from_name("not-a-data-file").is_err());
        assert!(id_from_name("000001.txt").is_err());
        assert!(id_from_name("abcdef.data").is_err());
    }

    #[test]
    fn list_data_files_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        for id in [2u32, 0, 1] {
            create_file(dir.path(), id).unwrap();
        }
        fs::write(dir.path().join("ignore.txt"), b"nope").unwrap();
        let files = list_data_files(dir.path()).unwrap();
        assert_eq!(files, vec!["000000.data", "000001.data", "000002.data"]);
    }

    #[test]
    fn choose_active_creates_file_zero_when_empty() {
        let dir = TempDir::new().unwrap();
        let active = choose_active(dir.path(), 1024).unwrap();
        assert_eq!(active.id, 0);
        assert_eq!(active.size, 0);
    }

    #[test]
    fn choose_active_reuses_small_file() {
        let dir = TempDir::new().unwrap();
        create_file(dir.path(), 0).unwrap();
        fs::write(dir.path().join("000000.data"), b"abc").unwrap();
        let active = choose_active(dir.path(), 1024).unwrap();
        assert_eq!(active.id, 0);
        assert_eq!(active.size, 3);
    }

    #[test]
    fn choose_active_rotates_past_threshold() {
        let dir = TempDir::new().unwrap();
        create_file(dir.path(), 0).unwrap();
        fs::write(dir.path().join("000000.data"), vec![0u8; 100]).unwrap();
        let active = choose_active(dir.path(), 10).unwrap();
        assert_eq!(active.id, 1);
        assert_eq!(active.size, 0);
    }

    #[test]
    fn create_file_refuses_nonempty_reuse() {
        let dir = TempDir::new().unwrap();
        create_file(dir.path(), 0).unwrap();
        fs::write(dir.path().join("000000.data"), b"abc").unwrap();
        assert!(create_file(dir.path(), 0).is_err());
    }
}
