use crate::{Result, WatchdogError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Reads a JSON artifact. Missing, zero-byte and unparsable files are all "no data".
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let text = read_text(path).await?;
    match serde_json::from_str(&text) {
        Ok(value) => Some(value),
        Err(err) => {
            let err = WatchdogError::Parse {
                what: path.display().to_string(),
                detail: err.to_string(),
            };
            log::warn!("Ignoring artifact: {err}");
            None
        }
    }
}

pub async fn read_text(path: &Path) -> Option<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) if text.trim().is_empty() => None,
        Ok(text) => Some(text),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
        Err(err) => {
            log::warn!("Failed to read {}: {err}", path.display());
            None
        }
    }
}

pub async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    write_bytes(path, &bytes).await
}

pub async fn write_text(path: &Path, text: &str) -> Result<()> {
    write_bytes(path, text.as_bytes()).await
}

async fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = tmp_path(path);
    if let Err(err) = tokio::fs::write(&tmp, bytes).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(err.into());
    }
    if let Err(err) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(WatchdogError::Persistence {
            target: path.display().to_string(),
            detail: err.to_string(),
        });
    }
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Intermediate artifacts: a failed write is logged and the run continues.
pub async fn persist_json<T: Serialize + ?Sized>(path: &Path, value: &T) {
    if let Err(err) = write_json(path, value).await {
        log::warn!("Failed to write {}: {err}", path.display());
    }
}

pub async fn persist_text(path: &Path, text: &str) {
    if let Err(err) = write_text(path, text).await {
        log::warn!("Failed to write {}: {err}", path.display());
    }
}
