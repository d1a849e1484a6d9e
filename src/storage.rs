use std::{
    collections::HashMap,
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

use log::debug;

use crate::{error::Error, Result};

/// A durable key-value store of byte blobs, keyed by an externally supplied identifier
///
/// Implementations must make [`write`](Storage::write) all-or-nothing: if it fails,
/// a later [`read`](Storage::read) of the same identifier returns the previous blob.
pub trait Storage {
    /// Fetch the blob stored under `id`
    ///
    /// Fails with [`Error::NotFound`] if nothing has been written under `id`.
    fn read(&self, id: &str) -> Result<Vec<u8>>;

    /// Store `bytes` under `id`, replacing any previous blob
    fn write(&mut self, id: &str, bytes: &[u8]) -> Result<()>;
}

/// In-memory storage, mostly useful for tests and short experiments
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    blobs: HashMap<String, Vec<u8>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.blobs.contains_key(id)
    }
}

impl Storage for MemoryStorage {
    fn read(&self, id: &str) -> Result<Vec<u8>> {
        self.blobs
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    fn write(&mut self, id: &str, bytes: &[u8]) -> Result<()> {
        self.blobs.insert(id.to_string(), bytes.to_vec());
        Ok(())
    }
}

/// Storage backed by one file per identifier in a directory
///
/// Writes go to a temporary sibling file which is flushed to disk and then renamed
/// over the target, so an interrupted or failed write never replaces the previous blob.
/// The directory is flushed after the rename so the new blob is durable once `write` returns.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
    extension: String,
}

impl FileStorage {
    pub const DEFAULT_EXTENSION: &'static str = "qtable";

    /// Storage rooted at `dir`, which is created on first write if missing
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            extension: Self::DEFAULT_EXTENSION.to_string(),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Location of the blob for `id`
    pub fn path(&self, id: &str) -> Result<PathBuf> {
        let invalid = id.is_empty()
            || id == "."
            || id == ".."
            || id.contains(['/', '\\'])
            || id.contains('\0');
        if invalid {
            return Err(Error::InvalidIdentifier(id.to_string()));
        }
        Ok(self.dir.join(format!("{id}.{}", self.extension)))
    }

    fn temp_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let tmp = Self::temp_path(path);
        let result = File::create(&tmp)
            .and_then(|mut file| {
                file.write_all(bytes)?;
                file.sync_all()
            })
            .and_then(|()| fs::rename(&tmp, path));
        if result.is_err() {
            // the target is untouched, only the partial temp file needs cleaning up
            let _ = fs::remove_file(&tmp);
        }
        result?;
        self.sync_dir()
    }

    /// Flush the directory entry so a completed rename survives a crash
    #[cfg(unix)]
    fn sync_dir(&self) -> io::Result<()> {
        File::open(&self.dir)?.sync_all()
    }

    // directories cannot be opened as files here, renames are flushed by the filesystem
    #[cfg(not(unix))]
    fn sync_dir(&self) -> io::Result<()> {
        Ok(())
    }
}

impl Storage for FileStorage {
    fn read(&self, id: &str) -> Result<Vec<u8>> {
        let path = self.path(id)?;
        match fs::read(&path) {
            Ok(bytes) => {
                debug!("Read {} bytes from {}", bytes.len(), path.display());
                Ok(bytes)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::NotFound(id.to_string())),
            Err(e) => Err(Error::io(id, e)),
        }
    }

    fn write(&mut self, id: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(id)?;
        fs::create_dir_all(&self.dir).map_err(|e| Error::io(id, e))?;
        self.write_atomic(&path, bytes).map_err(|e| Error::io(id, e))?;
        debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }
}
