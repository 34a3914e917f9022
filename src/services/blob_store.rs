//! Durable artifact storage for ingestion runs.
//!
//! Every raw upstream response is written here before normalization, and
//! each run's merged normalized map is written as a single dated artifact.
//! Layout: `<root>/<source>/<YYYY-MM-DD>/<name>`.

use chrono::NaiveDate;
use std::path::PathBuf;
use tokio::fs;

use crate::sources::SourceType;

#[derive(Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn run_dir(&self, source_type: SourceType, date: NaiveDate) -> PathBuf {
        self.root
            .join(source_type.as_str())
            .join(date.format("%Y-%m-%d").to_string())
    }

    pub async fn put(
        &self,
        source_type: SourceType,
        date: NaiveDate,
        name: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, std::io::Error> {
        let dir = self.run_dir(source_type, date);
        fs::create_dir_all(&dir).await?;

        let path = dir.join(name);
        fs::write(&path, bytes).await?;

        tracing::debug!("Stored artifact {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }

    pub async fn get(
        &self,
        source_type: SourceType,
        date: NaiveDate,
        name: &str,
    ) -> Result<Option<Vec<u8>>, std::io::Error> {
        let path = self.run_dir(source_type, date).join(name);

        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn exists(&self, source_type: SourceType, date: NaiveDate, name: &str) -> bool {
        fs::try_exists(self.run_dir(source_type, date).join(name))
            .await
            .unwrap_or(false)
    }
}
