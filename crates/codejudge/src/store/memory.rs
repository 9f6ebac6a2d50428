use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::store::{ContentStore, QuestionStore, StoreError, SubmissionStore, UserStore};
use crate::types::{Question, Submission};

/// In-process implementation of every store
///
/// Used by the CLI for one-shot judging and by tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    contents: RwLock<HashMap<String, String>>,
    questions: RwLock<HashMap<String, Question>>,
    solved: RwLock<HashMap<String, BTreeSet<String>>>,
    submissions: RwLock<Vec<Submission>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a question
    pub async fn insert_question(&self, question: Question) {
        self.questions
            .write()
            .await
            .insert(question.question_id.clone(), question);
    }

    /// Every saved submission, oldest first
    pub async fn all_submissions(&self) -> Vec<Submission> {
        self.submissions.read().await.clone()
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn get_content(&self, key: &str) -> Result<String, StoreError> {
        self.contents
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_owned()))
    }

    async fn put_content(&self, key: &str, content: &str) -> Result<(), StoreError> {
        self.contents
            .write()
            .await
            .insert(key.to_owned(), content.to_owned());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.contents.write().await.remove(key);
        Ok(())
    }
}

#[async_trait]
impl QuestionStore for MemoryStore {
    async fn find_question(&self, question_id: &str) -> Result<Option<Question>, StoreError> {
        Ok(self.questions.read().await.get(question_id).cloned())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn add_solved_question(&self, user_id: &str, question_id: &str) -> Result<(), StoreError> {
        self.solved
            .write()
            .await
            .entry(user_id.to_owned())
            .or_default()
            .insert(question_id.to_owned());
        Ok(())
    }

    async fn solved_questions(&self, user_id: &str) -> Result<BTreeSet<String>, StoreError> {
        Ok(self
            .solved
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn save_submission(&self, submission: &Submission) -> Result<(), StoreError> {
        self.submissions.write().await.push(submission.clone());
        Ok(())
    }

    async fn submissions_for(
        &self,
        owner_id: &str,
        question_id: Option<&str>,
    ) -> Result<Vec<Submission>, StoreError> {
        Ok(self
            .submissions
            .read()
            .await
            .iter()
            .filter(|s| s.owner_id == owner_id)
            .filter(|s| question_id.is_none_or(|q| s.question_id == q))
            .cloned()
            .collect())
    }
}
