//! Writing submitted sources to disk

use std::path::{Path, PathBuf};

use tracing::{debug, instrument};
use uuid::Uuid;

use crate::config::FileExtension;

/// A source file written for one job
#[derive(Debug, Clone)]
pub struct MaterializedSource {
    /// Fresh random identifier, also the file stem
    pub job_id: Uuid,

    pub path: PathBuf,
}

/// Writes submitted code into the shared code directory
#[derive(Debug, Clone)]
pub struct Materializer {
    code_dir: PathBuf,
}

impl Materializer {
    pub fn new(code_dir: impl Into<PathBuf>) -> Self {
        Self {
            code_dir: code_dir.into(),
        }
    }

    pub fn code_dir(&self) -> &Path {
        &self.code_dir
    }

    /// Write `source` to `<code_dir>/<uuid>.<ext>`
    ///
    /// The extension comes from [`FileExtension::for_language`]. The code
    /// directory is created if missing. The caller owns the returned file.
    #[instrument(skip(self, source), fields(code_dir = %self.code_dir.display()))]
    pub async fn materialize(
        &self,
        language: &str,
        source: &str,
    ) -> std::io::Result<MaterializedSource> {
        let extension = FileExtension::for_language(language)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

        tokio::fs::create_dir_all(&self.code_dir).await?;

        let job_id = Uuid::new_v4();
        let path = self.code_dir.join(format!("{job_id}.{extension}"));
        tokio::fs::write(&path, source).await?;

        debug!(%job_id, path = %path.display(), len = source.len(), "materialized source");
        Ok(MaterializedSource { job_id, path })
    }
}
