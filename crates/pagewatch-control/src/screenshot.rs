//! Screenshot files on disk.

use std::io;
use std::path::{Path, PathBuf};

use pagewatch_log::{key_from_file_name, screenshot_file_name};
use serde::Serialize;
use tracing::{debug, info};

/// A screenshot file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotInfo {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    /// Correlation key embedded in the name, if it follows the naming scheme.
    pub stamp: Option<String>,
}

/// Directory that screenshots are written to and listed from.
#[derive(Debug, Clone)]
pub struct ScreenshotStore {
    dir: PathBuf,
}

impl ScreenshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a PNG captured at `timestamp`. The directory is created on
    /// first use; a name already taken gets a numeric suffix.
    pub async fn save(
        &self,
        timestamp: &str,
        context: &str,
        png: &[u8],
    ) -> io::Result<ScreenshotInfo> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let mut name = screenshot_file_name(timestamp, context);
        let mut suffix = 1;
        while tokio::fs::try_exists(self.dir.join(&name)).await? {
            name = screenshot_file_name(timestamp, &format!("{}-{}", context, suffix));
            suffix += 1;
        }

        let path = self.dir.join(&name);
        tokio::fs::write(&path, png).await?;
        info!("Saved screenshot: {}", path.display());

        Ok(ScreenshotInfo {
            stamp: key_from_file_name(&name),
            name,
            path,
            size: png.len() as u64,
        })
    }

    /// Every `.png` in the directory, sorted by name. A missing directory is
    /// an empty listing.
    pub async fn list(&self) -> io::Result<Vec<ScreenshotInfo>> {
        let mut read_dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Screenshot directory {} does not exist", self.dir.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let mut shots = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.ends_with(".png") {
                continue;
            }
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            shots.push(ScreenshotInfo {
                stamp: key_from_file_name(&name),
                path: entry.path(),
                size: metadata.len(),
                name,
            });
        }
        shots.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(shots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScreenshotStore::new(dir.path().join("shots"));
        assert!(store.list().await.unwrap().is_empty());

        let first = store
            .save("2024-05-01T10:20:30.123Z", "Login Error", b"png-1")
            .await
            .unwrap();
        assert_eq!(
            first.name,
            "screenshot-2024-05-01T10-20-30-123Z-login_error.png"
        );
        assert_eq!(first.stamp.as_deref(), Some("2024-05-01T10-20-30"));
        assert_eq!(first.size, 5);

        let second = store
            .save("2024-05-01T10:20:30.123Z", "Login Error", b"png-2")
            .await
            .unwrap();
        assert_ne!(first.path, second.path);

        std::fs::write(store.dir().join("notes.txt"), b"x").unwrap();
        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.contains(&first));
        assert!(listed.contains(&second));
    }
}
