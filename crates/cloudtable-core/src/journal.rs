//! Append-only journal backing [`LocalTableService`](crate::LocalTableService)
//!
//! Every mutation is appended here before the in-memory tables change. On
//! open the journal is replayed in file order to rebuild the tables. Files
//! are named `journal-{seq:016x}.ctj` and rotate once they exceed the
//! configured size.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::SyncMode;
use crate::error::{StoreError, StoreResult};
use crate::format::{deserialize_record, payload_length, serialize_record, Record, HEADER_SIZE, MAGIC_ARRAY};

const FILE_PREFIX: &str = "journal-";
const FILE_SUFFIX: &str = ".ctj";

fn journal_file_name(sequence: u64) -> String {
    format!("{FILE_PREFIX}{sequence:016x}{FILE_SUFFIX}")
}

fn parse_sequence(name: &str) -> Option<u64> {
    let hex = name.strip_prefix(FILE_PREFIX)?.strip_suffix(FILE_SUFFIX)?;
    u64::from_str_radix(hex, 16).ok()
}

fn io_error(path: &Path, err: io::Error, context: &str) -> StoreError {
    StoreError::Io {
        path: Some(path.to_path_buf()),
        kind: err.kind(),
        message: format!("{context}: {err}"),
    }
}

/// Push file data to persistent storage.
///
/// Linux uses fdatasync, Apple platforms F_FULLFSYNC (plain fsync stops at the
/// drive cache there), Windows FlushFileBuffers; anything else falls back to
/// `sync_data`.
pub(crate) fn durable_sync(file: &File) -> io::Result<()> {
    #[cfg(target_os = "linux")]
    {
        use std::os::unix::io::AsRawFd;
        // SAFETY: the descriptor comes from a live `File`
        let rc = unsafe { libc::fdatasync(file.as_raw_fd()) };
        if rc == 0 { Ok(()) } else { Err(io::Error::last_os_error()) }
    }

    #[cfg(any(target_os = "macos", target_os = "ios"))]
    {
        use std::os::unix::io::AsRawFd;
        // SAFETY: the descriptor comes from a live `File`
        let rc = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_FULLFSYNC) };
        if rc == 0 { Ok(()) } else { Err(io::Error::last_os_error()) }
    }

    #[cfg(target_os = "windows")]
    {
        use std::os::windows::io::AsRawHandle;
        use winapi::um::fileapi::FlushFileBuffers;
        // SAFETY: the handle comes from a live `File`
        let rc = unsafe { FlushFileBuffers(file.as_raw_handle() as *mut _) };
        if rc != 0 { Ok(()) } else { Err(io::Error::last_os_error()) }
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "ios", target_os = "windows")))]
    {
        file.sync_data()
    }
}

/// Appends records to the current journal file.
pub struct JournalWriter {
    file: File,
    path: PathBuf,
    size: u64,
    dir: PathBuf,
    sequence: u64,
    rotation_size: u64,
    sync_mode: SyncMode,
}

impl JournalWriter {
    /// Open the journal in `dir`, resuming the highest-numbered file.
    pub fn open<P: AsRef<Path>>(dir: P, rotation_size: u64, sync_mode: SyncMode) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .map_err(|e| io_error(&dir, e, "failed to create journal directory"))?;

        let sequence = journal_files(&dir)?
            .iter()
            .filter_map(|p| p.file_name()?.to_str().and_then(parse_sequence))
            .max()
            .unwrap_or(0);
        let path = dir.join(journal_file_name(sequence));
        let file = open_append(&path)?;
        let size = file
            .metadata()
            .map_err(|e| io_error(&path, e, "failed to stat journal file"))?
            .len();

        Ok(Self { file, path, size, dir, sequence, rotation_size, sync_mode })
    }

    /// Append a record, syncing according to the configured [`SyncMode`].
    ///
    /// Returns only after the bytes are written; callers apply the change in
    /// memory afterwards, never before.
    pub fn append(&mut self, record: &Record) -> StoreResult<()> {
        let bytes = serialize_record(record)?;

        if self.size > 0 && self.size + bytes.len() as u64 > self.rotation_size {
            self.rotate()?;
        }

        self.file
            .write_all(&bytes)
            .map_err(|e| io_error(&self.path, e, "journal write failed"))?;
        if self.sync_mode == SyncMode::Durable {
            self.sync()?;
        }
        self.size += bytes.len() as u64;
        Ok(())
    }

    /// Make everything appended so far durable.
    pub fn sync(&self) -> StoreResult<()> {
        durable_sync(&self.file).map_err(|e| io_error(&self.path, e, "journal sync failed"))
    }

    fn rotate(&mut self) -> StoreResult<()> {
        self.sync()?;
        self.sequence += 1;
        let path = self.dir.join(journal_file_name(self.sequence));
        self.file = open_append(&path)?;
        debug!(path = %path.display(), "rotated journal");
        self.path = path;
        self.size = 0;
        Ok(())
    }

    /// Current journal file
    pub fn current_path(&self) -> &Path {
        &self.path
    }
}

fn open_append(path: &Path) -> StoreResult<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| io_error(path, e, "failed to open journal file"))
}

/// Journal files in `dir`, in sequence order.
fn journal_files(dir: &Path) -> StoreResult<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| io_error(dir, e, "failed to read journal directory"))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| io_error(dir, e, "failed to read directory entry"))?.path();
        if path.file_name().and_then(|n| n.to_str()).and_then(parse_sequence).is_some() {
            files.push(path);
        }
    }
    // Zero-padded hex sorts lexicographically in sequence order
    files.sort();
    Ok(files)
}

/// Replays journal files.
pub struct JournalReader {
    dir: PathBuf,
}

impl JournalReader {
    /// Reader over the journal in `dir`.
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    /// Every intact record, oldest first.
    ///
    /// A record with bad magic or a bad checksum is skipped by scanning for
    /// the next magic. An incomplete record at the end of a file is the crash
    /// point: recovery of that file stops there.
    pub fn recover_records(&self) -> StoreResult<Vec<Record>> {
        let mut records = Vec::new();
        for path in journal_files(&self.dir)? {
            records.extend(recover_file(&path)?);
        }
        Ok(records)
    }
}

fn recover_file(path: &Path) -> StoreResult<Vec<Record>> {
    let mut buffer = Vec::new();
    File::open(path)
        .and_then(|mut f| f.read_to_end(&mut buffer))
        .map_err(|e| io_error(path, e, "failed to read journal file"))?;

    let mut records = Vec::new();
    let mut offset = 0;
    while offset + HEADER_SIZE <= buffer.len() {
        if buffer[offset..offset + 4] != MAGIC_ARRAY {
            warn!(path = %path.display(), offset, "bad magic, scanning for next record");
            match find_next_magic(&buffer, offset + 1) {
                Some(next) => { offset = next; continue; }
                None => break,
            }
        }

        let total = HEADER_SIZE + payload_length(&buffer[offset..]).unwrap_or_default();
        if offset + total > buffer.len() {
            warn!(
                path = %path.display(),
                offset,
                needed = total,
                available = buffer.len() - offset,
                "torn write, stopping recovery of this file"
            );
            break;
        }

        match deserialize_record(&buffer[offset..offset + total]) {
            Ok(record) => {
                records.push(record);
                offset += total;
            }
            Err(error) => {
                warn!(path = %path.display(), offset, %error, "corrupt record, skipping");
                match find_next_magic(&buffer, offset + 1) {
                    Some(next) => { offset = next; continue; }
                    None => break,
                }
            }
        }
    }
    Ok(records)
}

fn find_next_magic(buffer: &[u8], start: usize) -> Option<usize> {
    buffer
        .get(start..)?
        .windows(MAGIC_ARRAY.len())
        .position(|w| w == &MAGIC_ARRAY[..])
        .map(|pos| start + pos)
}
