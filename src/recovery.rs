//! Rebuilds the keydir by scanning existing data files on startup.

use crate::codec::{decode_header, HEADER_SIZE};
use crate::error::Result;
use crate::file_manager::{self, id_from_name};
use crate::keydir::{KeyDir, KeyDirEntry};
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// Scans every data file in `dir`, in ascending file-id order, and
/// rebuilds the keydir such that later records overwrite earlier ones for
/// the same key and tombstones remove keys. Recovery is read-only: it
/// never modifies the files it scans, and a torn tail (a record whose
/// header or body is incomplete because a prior write crashed mid-append)
/// simply stops processing of that one file.
pub fn recover(dir: &Path) -> Result<KeyDir> {
    let mut keydir = KeyDir::new();
    for name in file_manager::list_data_files(dir)? {
        let file_id = id_from_name(&name)?;
        recover_file(dir, file_id, &name, &mut keydir)?;
    }
    Ok(keydir)
}

fn recover_file(dir: &Path, file_id: u32, name: &str, keydir: &mut KeyDir) -> Result<()> {
    let file = file_manager::open_read(dir, file_id)?;
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::new(file);
    let mut pos = reader.stream_position()?;
    let mut header_buf = [0u8; HEADER_SIZE];

    while pos < file_len {
        if reader.read_exact(&mut header_buf).is_err() {
            // Fewer than 12 bytes remain: a torn tail from a prior crash.
            break;
        }
        let header = match decode_header(&header_buf) {
            Ok(header) => header,
            Err(_) => break,
        };

        let mut key_buf = vec![0u8; header.key_size as usize];
        if reader.read_exact(&mut key_buf).is_err() {
            break;
        }
        let key = match String::from_utf8(key_buf) {
            Ok(key) => key,
            Err(_) => break,
        };

        if header.is_tombstone() {
            keydir.remove(&key);
            pos = pos + HEADER_SIZE as u64 + header.key_size as u64;
            continue;
        }

        let value_pos = reader.stream_position()?;
        if value_pos + header.value_size as u64 > file_len {
            // The value bytes were truncated mid-write; stop here.
            break;
        }
        keydir.insert(
            key,
            KeyDirEntry::new(file_id, header.value_size, value_pos, header.timestamp),
        );

        reader.seek(SeekFrom::Start(value_pos + header.value_size as u64))?;
        pos = value_pos + header.value_size as u64;
    }
    Ok(())
}
