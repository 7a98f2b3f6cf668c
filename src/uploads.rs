use std::path::{Path, PathBuf};

use rand::Rng;

/// Directory that receives uploaded leaf images before detection.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    keep: bool,
}

impl UploadStore {
    /// Creates the directory if it does not exist yet.
    pub async fn bootstrap(dir: impl Into<PathBuf>, keep: bool) -> std::io::Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        tracing::info!("Upload directory ready at {}", dir.display());
        Ok(Self { dir, keep })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes the upload under a random prefix so concurrent uploads of the
    /// same file name never collide.
    pub async fn save(&self, file_name: &str, data: &[u8]) -> std::io::Result<PathBuf> {
        let token: u64 = rand::thread_rng().gen();
        let path = self
            .dir
            .join(format!("{:016x}_{}", token, sanitize_file_name(file_name)));
        tokio::fs::write(&path, data).await?;
        tracing::debug!("Saved upload to {}", path.display());
        Ok(path)
    }

    /// Removes a saved upload unless the store was configured to keep them.
    pub async fn release(&self, path: &Path) {
        if self.keep {
            return;
        }
        if let Err(err) = tokio::fs::remove_file(path).await {
            tracing::warn!("Failed to remove upload {}: {}", path.display(), err);
        }
    }
}

/// Keeps only the final path component, restricted to a safe character set.
pub fn sanitize_file_name(file_name: &str) -> String {
    let base = Path::new(file_name)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload");

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim_matches('.').is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}
