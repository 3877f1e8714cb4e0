use super::{StorageBackend, validate_key};
use eyre::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

const CURRENT_VERSION: u32 = 1;

/// Directory-backed storage: one `<key>.json` file per key
///
/// Writes go to a temporary file that is renamed into place, under an
/// exclusive lock on `<dir>/.lock`. Reads take a shared lock on the same
/// file, so a reader never sees a half-written value.
#[derive(Debug, Clone)]
pub struct FileBackend {
    base_path: PathBuf,
}

impl FileBackend {
    /// Open or create a file backend rooted at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();

        fs::create_dir_all(&base_path).context("Failed to create storage directory")?;

        let backend = Self { base_path };
        backend.write_version()?;
        Ok(backend)
    }

    /// Get the base path of this backend
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Path of the file holding `key`
    pub fn key_path(&self, key: &str) -> PathBuf {
        self.base_path.join(format!("{}.json", key))
    }

    fn write_version(&self) -> Result<()> {
        let version_path = self.base_path.join(".version");
        if !version_path.exists() {
            fs::write(version_path, CURRENT_VERSION.to_string())?;
        }
        Ok(())
    }

    fn lock_file(&self) -> Result<File> {
        OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.base_path.join(".lock"))
            .context("Failed to open lock file")
    }
}

impl StorageBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;
        let path = self.key_path(key);

        let lock = self.lock_file()?;
        lock.lock_shared().context("Failed to acquire shared lock")?;

        match fs::read(&path) {
            Ok(bytes) => {
                debug!(key, path = ?path, len = bytes.len(), "Read key from file");
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
        // Lock is released when `lock` is dropped
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        validate_key(key)?;
        let path = self.key_path(key);
        let tmp_path = self.base_path.join(format!("{}.json.tmp", key));

        let lock = self.lock_file()?;
        lock.lock_exclusive().context("Failed to acquire file lock")?;

        {
            let mut tmp = File::create(&tmp_path).context("Failed to create temporary file")?;
            tmp.write_all(value)?;
            tmp.sync_all()?;
        }

        fs::rename(&tmp_path, &path)
            .with_context(|| format!("Failed to move value into {}", path.display()))?;

        debug!(key, path = ?path, len = value.len(), "Wrote key to file");
        Ok(())
    }
}
