use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use futures_core::future::BoxFuture;

use super::{Storage, StorageError};

/// Stores every key as `<root>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

fn read_file(path: &Path) -> std::io::Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

// Write to a temp file in the target directory, then rename over the target.
// Readers never observe a partially written document.
fn write_file(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(dir)?;

    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(content)?;
    temp.flush()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

impl Storage for FileStorage {
    fn read<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, StorageError>> {
        let path = self.path(key);
        Box::pin(async move {
            tokio::task::spawn_blocking(move || read_file(&path))
                .await?
                .map_err(|source| StorageError::Io {
                    key: key.to_string(),
                    source,
                })
        })
    }

    fn write<'a>(
        &'a self,
        key: &'a str,
        value: String,
    ) -> BoxFuture<'a, Result<(), StorageError>> {
        let path = self.path(key);
        Box::pin(async move {
            tokio::task::spawn_blocking(move || write_file(&path, value.as_bytes()))
                .await?
                .map_err(|source| StorageError::Io {
                    key: key.to_string(),
                    source,
                })
        })
    }
}
