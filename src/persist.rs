//! Writes a codestream to disk and loads it back.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::PersistError;

/// Where the harness keeps the codestream between encode and decode.
pub trait Storage {
    fn write(&mut self, path: &Path, bytes: &[u8]) -> Result<(), PersistError>;

    fn read(&mut self, path: &Path) -> Result<Vec<u8>, PersistError>;
}

/// The file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileStorage;

impl Storage for FileStorage {
    fn write(&mut self, path: &Path, bytes: &[u8]) -> Result<(), PersistError> {
        write_codestream(path, bytes)
    }

    fn read(&mut self, path: &Path) -> Result<Vec<u8>, PersistError> {
        read_codestream(path)
    }
}

/// Creates (or truncates) `path` and writes `bytes` to it.
pub fn write_codestream(path: &Path, bytes: &[u8]) -> Result<(), PersistError> {
    let mut file = File::create(path).map_err(|e| PersistError::io(path, e))?;
    file.write_all(bytes)
        .and_then(|()| file.flush())
        .map_err(|e| PersistError::io(path, e))?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "codestream written");
    Ok(())
}

/// Reads the whole of `path`, sized by seeking to its end.
pub fn read_codestream(path: &Path) -> Result<Vec<u8>, PersistError> {
    let mut file = File::open(path).map_err(|e| PersistError::io(path, e))?;
    read_measured(&mut file, path)
}

/// Measures `source` by seeking to the end and back, then reads exactly that
/// many bytes. Fewer bytes than measured is a [`PersistError::ShortRead`].
pub fn read_measured<R: Read + Seek>(source: &mut R, path: &Path) -> Result<Vec<u8>, PersistError> {
    let io = |e| PersistError::io(path, e);
    let expected = source.seek(SeekFrom::End(0)).map_err(io)?;
    source.seek(SeekFrom::Start(0)).map_err(io)?;

    let mut bytes = Vec::new();
    let capacity = usize::try_from(expected).unwrap_or(usize::MAX);
    bytes.try_reserve_exact(capacity).map_err(|_| {
        io(std::io::Error::new(
            std::io::ErrorKind::OutOfMemory,
            format!("cannot buffer {expected} bytes"),
        ))
    })?;
    source.take(expected).read_to_end(&mut bytes).map_err(io)?;

    let actual = bytes.len() as u64;
    if actual != expected {
        return Err(PersistError::ShortRead {
            path: PathBuf::from(path),
            expected,
            actual,
        });
    }
    tracing::debug!(path = %path.display(), bytes = actual, "codestream read back");
    Ok(bytes)
}
