//! File-backed secret store.
//!
//! One file per key under the platform's local data directory. Files are
//! created with mode 0600 inside a 0700 directory and replaced atomically
//! via a rename, so a crash mid-write never leaves a truncated token.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use crate::storage::{SecretStore, StoreError};

pub struct FileSecretStore {
    base_dir: PathBuf,
}

impl FileSecretStore {
    /// Open the store in the per-user data directory for `app_name`.
    pub fn new(app_name: &str) -> Result<Self, StoreError> {
        let dirs = ProjectDirs::from("dev", "sentinel", app_name).ok_or_else(|| {
            StoreError::Backend("Could not determine data directory".to_string())
        })?;
        Self::with_base_dir(dirs.data_local_dir())
    }

    /// Open the store rooted at `base_dir`, creating it if needed.
    pub fn with_base_dir(base_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&base_dir, fs::Permissions::from_mode(0o700))?;
        }

        Ok(Self { base_dir })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        // No separators or dots: stays inside base_dir, never collides with `.tmp` files.
        let safe_key = key.replace(['/', '\\', '.'], "_");
        self.base_dir.join(safe_key)
    }
}

impl SecretStore for FileSecretStore {
    fn store(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let path = self.key_path(key);
        let tmp = path.with_extension("tmp");

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&tmp)?;
        file.write_all(value)?;
        file.sync_all()?;
        fs::rename(&tmp, &path)?;

        Ok(())
    }

    fn retrieve(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.key_path(key);
        match fs::read(&path) {
            Ok(contents) => Ok(contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.key_path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, key: &str) -> bool {
        self.key_path(key).exists()
    }
}
