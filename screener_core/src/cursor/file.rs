use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::traits::CursorStorage;
use crate::{Error, Result};

/// Stores each key as a plaintext integer in `{dir}/{key}.txt`.
#[derive(Debug, Clone)]
pub struct FileCursorStorage {
    dir: PathBuf,
}

impl FileCursorStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            return Err(Error::InvalidInput(format!("invalid cursor key: {key:?}")));
        }
        Ok(self.dir.join(format!("{key}.txt")))
    }
}

async fn write_atomically(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("txt.tmp");
    tokio::fs::write(&tmp, contents).await?;
    tokio::fs::rename(&tmp, path).await
}

#[async_trait]
impl CursorStorage for FileCursorStorage {
    async fn read_int(&self, key: &str) -> Result<Option<u64>> {
        let path = self.path_for(key)?;
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::backend(format!("read {}", path.display()), e)),
        };
        raw.trim().parse::<u64>().map(Some).map_err(|e| {
            Error::backend(format!("parse cursor file {}", path.display()), e)
        })
    }

    async fn write_int(&self, key: &str, value: u64) -> Result<()> {
        let path = self.path_for(key)?;
        write_atomically(&path, &value.to_string())
            .await
            .map_err(|e| Error::backend(format!("write {}", path.display()), e))
    }
}
