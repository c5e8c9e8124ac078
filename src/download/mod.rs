// Artifact download boundary
//
// Saving is fire-and-forget: the caller hands over the payload and a file
// name, and failures are only logged.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Errors raised while writing a download
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("Failed to write download: {0}")]
    Io(#[from] std::io::Error),
    #[error("Nothing to download")]
    EmptyPayload,
}

/// Host-mediated save action
pub trait ArtifactSink: Send + Sync {
    fn save(&self, payload: Vec<u8>, file_name: &str);
}

/// Writes downloads into a directory on disk
#[derive(Debug, Clone)]
pub struct FileSystemSink {
    dir: PathBuf,
}

impl FileSystemSink {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// The user's download directory, or the working directory if unknown
    pub fn with_default_dir() -> Self {
        Self::new(dirs::download_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the payload, never overwriting an existing file.
    ///
    /// Returns the path actually written.
    pub async fn write(&self, payload: &[u8], file_name: &str) -> Result<PathBuf, DownloadError> {
        if payload.is_empty() {
            return Err(DownloadError::EmptyPayload);
        }
        tokio::fs::create_dir_all(&self.dir).await?;

        let (path, mut file) = create_unique(&self.dir, &sanitize_file_name(file_name)).await?;
        let written = async {
            file.write_all(payload).await?;
            file.flush().await
        }
        .await;
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e.into());
        }
        crate::info!("Saved {} bytes to {:?}", payload.len(), path);
        Ok(path)
    }
}

impl ArtifactSink for FileSystemSink {
    fn save(&self, payload: Vec<u8>, file_name: &str) {
        let sink = self.clone();
        let file_name = file_name.to_string();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = sink.write(&payload, &file_name).await {
                        crate::warn!("Download of '{}' failed: {}", file_name, e);
                    }
                });
            }
            Err(_) => {
                crate::warn!("No async runtime available, download of '{}' skipped", file_name);
            }
        }
    }
}

/// Strip path separators and control characters from a suggested name
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim_matches(|c: char| c == '.' || c.is_whitespace());
    if trimmed.is_empty() {
        "recording".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `name`, then `stem (1).ext`, `stem (2).ext`, ...
fn numbered_name(name: &str, n: usize) -> String {
    if n == 0 {
        return name.to_string();
    }
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{} ({}).{}", stem, n, ext),
        _ => format!("{} ({})", name, n),
    }
}

/// Create the first free numbered variant of `name`. The file is created
/// atomically, so concurrent downloads of the same name never share a path.
async fn create_unique(dir: &Path, name: &str) -> std::io::Result<(PathBuf, File)> {
    let mut n = 0;
    loop {
        let candidate = dir.join(numbered_name(name, n));
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
            .await
        {
            Ok(file) => return Ok((candidate, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => n += 1,
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
pub(crate) mod tests;
