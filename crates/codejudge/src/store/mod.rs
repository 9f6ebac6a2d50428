//! Collaborator interfaces the judge reads from and writes to
//!
//! Test data and archived sources live in a [`ContentStore`]; questions,
//! users and submissions in record stores. The judge only sees the traits,
//! so any backing (filesystem, object storage, a database) can be plugged in.

use std::collections::BTreeSet;

use async_trait::async_trait;
use thiserror::Error;

pub use crate::store::fs::FsContentStore;
pub use crate::store::memory::MemoryStore;
use crate::types::{Question, Submission};

mod fs;
mod memory;

/// Errors raised by stores
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("content '{0}' not found")]
    NotFound(String),

    #[error("invalid content reference '{0}'")]
    InvalidRef(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Text blobs addressed by opaque references
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn get_content(&self, key: &str) -> Result<String, StoreError>;

    async fn put_content(&self, key: &str, content: &str) -> Result<(), StoreError>;

    /// Remove a blob; removing a missing blob succeeds
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait QuestionStore: Send + Sync {
    async fn find_question(&self, question_id: &str) -> Result<Option<Question>, StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Add to the user's solved-set; adding twice is a no-op
    async fn add_solved_question(&self, user_id: &str, question_id: &str) -> Result<(), StoreError>;

    async fn solved_questions(&self, user_id: &str) -> Result<BTreeSet<String>, StoreError>;
}

#[async_trait]
pub trait SubmissionStore: Send + Sync {
    async fn save_submission(&self, submission: &Submission) -> Result<(), StoreError>;

    /// Submissions by `owner_id`, oldest first, optionally for one question
    async fn submissions_for(
        &self,
        owner_id: &str,
        question_id: Option<&str>,
    ) -> Result<Vec<Submission>, StoreError>;
}
