use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};

use thiserror::Error;
use tokio::fs;

/// Failures while reading or writing the engine save file.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// No save exists yet.
    #[error("no saved state at `{}`", path.display())]
    NotFound { path: PathBuf },
    /// A save exists but cannot be used.
    #[error("saved state at `{}` is corrupt: {reason}", path.display())]
    CorruptState { path: PathBuf, reason: String },
    /// The filesystem refused the operation.
    #[error("failed to access saved state at `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Single well-known file holding the latest engine snapshot.
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    /// Point the store at `path`; nothing is touched until the first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the save file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite the save with `bytes`.
    ///
    /// The payload is written next to the target and renamed over it so a
    /// crash never leaves a half-written save behind.
    pub async fn save(&self, bytes: &[u8]) -> Result<(), PersistenceError> {
        write_atomically(&self.path, bytes)
            .await
            .map_err(|source| self.io_error(source))
    }

    /// Read the save back.
    pub async fn restore(&self) -> Result<Vec<u8>, PersistenceError> {
        match fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Err(PersistenceError::CorruptState {
                path: self.path.clone(),
                reason: "file is empty".into(),
            }),
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(PersistenceError::NotFound {
                path: self.path.clone(),
            }),
            Err(err) => Err(PersistenceError::CorruptState {
                path: self.path.clone(),
                reason: err.to_string(),
            }),
        }
    }

    /// Remove the save; a missing file is not an error.
    pub async fn discard(&self) -> Result<(), PersistenceError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(self.io_error(source)),
        }
    }

    fn io_error(&self, source: io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

/// Write `bytes` to a sibling file, then rename it over `path`, creating parents as needed.
pub(crate) async fn write_atomically(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    let staging = staging_path(path);
    fs::write(&staging, bytes).await?;
    fs::rename(&staging, path).await
}

/// Sibling path used for atomic replacement (`save.state` → `save.state.tmp`).
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file() -> StateFile {
        let dir = std::env::temp_dir().join(format!("crowdplay-save-{}", uuid::Uuid::new_v4()));
        StateFile::new(dir.join("saves").join("save.state"))
    }

    #[tokio::test]
    async fn missing_save_is_not_found() {
        let store = scratch_file();
        assert!(matches!(
            store.restore().await,
            Err(PersistenceError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn save_creates_directories_and_overwrites() {
        let store = scratch_file();
        store.save(b"first").await.unwrap();
        store.save(b"second").await.unwrap();

        assert_eq!(store.restore().await.unwrap(), b"second");
        assert!(!staging_path(store.path()).exists());
    }

    #[tokio::test]
    async fn empty_save_is_corrupt() {
        let store = scratch_file();
        store.save(b"").await.unwrap();
        assert!(matches!(
            store.restore().await,
            Err(PersistenceError::CorruptState { .. })
        ));
    }

    #[tokio::test]
    async fn discard_is_idempotent() {
        let store = scratch_file();
        store.save(b"state").await.unwrap();
        store.discard().await.unwrap();
        store.discard().await.unwrap();
        assert!(matches!(
            store.restore().await,
            Err(PersistenceError::NotFound { .. })
        ));
    }

    #[test]
    fn staging_path_keeps_the_directory() {
        let staged = staging_path(Path::new("saves/save.state"));
        assert_eq!(staged, PathBuf::from("saves/save.state.tmp"));
    }
}
