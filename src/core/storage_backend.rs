/*
 * Raw key-value persistence beneath the grocery store. A backend stores one
 * independent text slot per key and knows nothing about the data inside.
 * Two implementations are provided: `FileStorageBackend`, which keeps one
 * file per key in a directory, and `InMemoryStorageBackend`, used in tests
 * and when the caller manages persistence itself.
 *
 * Every write to a file slot goes to a temporary sibling first and is then
 * renamed over the slot, so a reader sees either the previous value or the
 * new one, never a partially written slot.
 */
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const SLOT_FILE_EXTENSION: &str = "slot";
const TEMP_FILE_EXTENSION: &str = "tmp";

#[derive(Debug)]
pub enum BackendError {
    Io(io::Error),
    InvalidKey(String),
}

impl From<io::Error> for BackendError {
    fn from(err: io::Error) -> Self {
        BackendError::Io(err)
    }
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::Io(e) => write!(f, "Storage I/O error: {e}"),
            BackendError::InvalidKey(key) => write!(
                f,
                "Invalid storage key: '{key}'. Keys must be non-empty and alphanumeric."
            ),
        }
    }
}

impl std::error::Error for BackendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BackendError::Io(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, BackendError>;

pub fn is_valid_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn check_key(key: &str) -> Result<()> {
    if key.is_empty() || !key.chars().all(is_valid_key_char) {
        return Err(BackendError::InvalidKey(key.to_string()));
    }
    Ok(())
}

pub trait StorageBackendOperations: Send + Sync {
    /* Returns `None` when the key has never been written or was removed. */
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    /* Removing an absent key is not an error. */
    fn remove(&self, key: &str) -> Result<()>;
}

pub struct FileStorageBackend {
    root: PathBuf,
}

fn write_synced(path: &Path, value: &str) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(value.as_bytes())?;
    file.sync_all()
}

impl FileStorageBackend {
    /*
     * Opens the directory holding the slot files, creating it and any missing
     * parents if needed. Each key lives in its own `<key>.slot` file directly
     * under this directory. Nothing is read at this point; slots are read
     * lazily on `get`.
     *
     * Args:
     *   root: The storage directory. It does not have to exist yet.
     *
     * Returns:
     *   A `Result` containing the backend, or a `BackendError::Io` if the
     *   directory could not be created.
     */
    pub fn open(root: &Path) -> Result<Self> {
        if !root.exists() {
            fs::create_dir_all(root)?;
            log::debug!("FileStorageBackend: Created storage directory {root:?}.");
        } else {
            log::trace!("FileStorageBackend: Storage directory already exists: {root:?}");
        }
        Ok(FileStorageBackend {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn slot_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.{SLOT_FILE_EXTENSION}"))
    }
}

impl StorageBackendOperations for FileStorageBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        check_key(key)?;
        let path = self.slot_path(key);
        match fs::read_to_string(&path) {
            Ok(contents) => {
                log::trace!(
                    "FileStorageBackend: Read {} bytes from {path:?}.",
                    contents.len()
                );
                Ok(Some(contents))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::trace!("FileStorageBackend: Slot {path:?} does not exist.");
                Ok(None)
            }
            Err(e) => Err(BackendError::Io(e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        check_key(key)?;
        let path = self.slot_path(key);
        let temp_path = path.with_extension(TEMP_FILE_EXTENSION);

        let written =
            write_synced(&temp_path, value).and_then(|()| fs::rename(&temp_path, &path));
        if let Err(e) = written {
            log::error!("FileStorageBackend: Failed to write slot {path:?} via {temp_path:?}: {e}");
            let _ = fs::remove_file(&temp_path);
            return Err(BackendError::Io(e));
        }
        log::trace!(
            "FileStorageBackend: Wrote {} bytes to {path:?}.",
            value.len()
        );
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        check_key(key)?;
        let path = self.slot_path(key);
        match fs::remove_file(&path) {
            Ok(()) => {
                log::debug!("FileStorageBackend: Removed slot {path:?}.");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BackendError::Io(e)),
        }
    }
}

#[derive(Default)]
pub struct InMemoryStorageBackend {
    slots: Mutex<HashMap<String, String>>,
}

impl InMemoryStorageBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A poisoned map is still a consistent map: every mutation is a single insert/remove.
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl StorageBackendOperations for InMemoryStorageBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        check_key(key)?;
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        check_key(key)?;
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        check_key(key)?;
        self.lock().remove(key);
        Ok(())
    }
}
