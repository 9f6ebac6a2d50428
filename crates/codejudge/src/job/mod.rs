//! Per-request job lifecycle
//!
//! An [`ExecutionJob`] owns the files created for one run or submit request:
//! the materialized source and the build artifact derived from the same job
//! ID. They are removed exactly once, either by an explicit
//! [`release()`](ExecutionJob::release) or, if a code path forgets to call
//! it, synchronously on drop.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument, warn};
use uuid::Uuid;

pub use crate::job::materialize::{MaterializedSource, Materializer};
use crate::types::JobState;

mod materialize;

/// Files and state for one request
#[derive(Debug)]
pub struct ExecutionJob {
    id: Uuid,

    /// Canonical language ID
    language: String,

    source_path: PathBuf,

    /// Executable file or build directory; may never be created
    artifact_path: PathBuf,

    state: JobState,

    released: bool,
}

impl ExecutionJob {
    /// Materialize `source` and wrap it in a job
    ///
    /// `requested_language` picks the file extension, `language_id` is the
    /// canonical ID the job runs under.
    pub async fn create(
        materializer: &Materializer,
        output_dir: &Path,
        language_id: &str,
        requested_language: &str,
        source: &str,
    ) -> std::io::Result<Self> {
        let written = materializer.materialize(requested_language, source).await?;
        let mut job = Self::from_source(written, language_id, output_dir);
        job.advance(JobState::Materialized);
        Ok(job)
    }

    /// Wrap an already materialized source
    pub fn from_source(source: MaterializedSource, language_id: &str, output_dir: &Path) -> Self {
        Self {
            id: source.job_id,
            language: language_id.to_owned(),
            artifact_path: output_dir.join(source.job_id.to_string()),
            source_path: source.path,
            state: JobState::Received,
            released: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Where a build for this job puts its output
    pub fn artifact_path(&self) -> &Path {
        &self.artifact_path
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub(crate) fn advance(&mut self, next: JobState) {
        debug!(job_id = %self.id, from = %self.state, to = %next, "job state");
        self.state = next;
    }

    /// Delete the source file and build artifact
    ///
    /// Failures are logged and never returned.
    #[instrument(skip(self), fields(job_id = %self.id))]
    pub async fn release(mut self) {
        for path in [&self.source_path, &self.artifact_path] {
            if let Err(e) = remove_path(path).await {
                warn!(path = %path.display(), error = %e, "failed to remove job file");
            }
        }
        self.released = true;
        self.advance(JobState::Cleaned);
    }
}

impl Drop for ExecutionJob {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        debug!(job_id = %self.id, "job dropped without release, removing files synchronously");
        for path in [&self.source_path, &self.artifact_path] {
            if let Err(e) = remove_path_blocking(path) {
                warn!(path = %path.display(), error = %e, "failed to remove job file");
            }
        }
    }
}

/// Remove a file or directory tree; a missing path is not an error
async fn remove_path(path: &Path) -> std::io::Result<()> {
    let result = match tokio::fs::symlink_metadata(path).await {
        Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await,
        Ok(_) => tokio::fs::remove_file(path).await,
        Err(e) => Err(e),
    };
    match result {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn remove_path_blocking(path: &Path) -> std::io::Result<()> {
    let result = match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
        Ok(_) => std::fs::remove_file(path),
        Err(e) => Err(e),
    };
    match result {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
