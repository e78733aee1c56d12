use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::Assessment;
use crate::services::attempt::{AnswerBuffer, SyncStatus};

/// On-disk form of an in-progress attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedAttempt {
    pub version: u32,
    pub attempt_id: Uuid,
    pub student_id: String,
    pub assessment_id: String,
    pub current_index: usize,
    pub answers: Vec<AnswerBuffer>,
    pub sync: Vec<SyncStatus>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub deadline: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub saved_at: OffsetDateTime,
}

impl PersistedAttempt {
    pub const VERSION: u32 = 1;

    /// Whether this record can be resumed against the freshly fetched
    /// assessment. Any drift in the question list discards it.
    pub fn matches(&self, student_id: &str, assessment: &Assessment) -> bool {
        self.version == Self::VERSION
            && self.student_id == student_id
            && self.assessment_id == assessment.id
            && self.answers.len() == assessment.questions.len()
            && self.sync.len() == assessment.questions.len()
            && self.current_index < assessment.questions.len()
            && self
                .answers
                .iter()
                .zip(&assessment.questions)
                .all(|(answer, question)| answer.kind() == question.kind)
    }
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("attempt storage I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("attempt record at {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode attempt record: {0}")]
    Encode(#[from] serde_json::Error),
}

#[async_trait]
pub trait AttemptRepository: Send + Sync + std::fmt::Debug {
    async fn load(
        &self,
        student_id: &str,
        assessment_id: &str,
    ) -> Result<Option<PersistedAttempt>, RepositoryError>;

    async fn save(&self, attempt: &PersistedAttempt) -> Result<(), RepositoryError>;

    async fn remove(&self, student_id: &str, assessment_id: &str) -> Result<(), RepositoryError>;
}

pub(crate) fn record_key(student_id: &str, assessment_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(student_id.as_bytes());
    hasher.update(b":");
    hasher.update(assessment_id.as_bytes());
    hex::encode(hasher.finalize())
}

/// One JSON file per attempt, named by the hashed student/assessment pair.
#[derive(Debug, Clone)]
pub struct FileAttemptRepository {
    root: PathBuf,
}

impl FileAttemptRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, student_id: &str, assessment_id: &str) -> PathBuf {
        self.root.join(format!("{}.json", record_key(student_id, assessment_id)))
    }
}

#[async_trait]
impl AttemptRepository for FileAttemptRepository {
    async fn load(
        &self,
        student_id: &str,
        assessment_id: &str,
    ) -> Result<Option<PersistedAttempt>, RepositoryError> {
        let path = self.path_for(student_id, assessment_id);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(RepositoryError::Io { path, source }),
        };

        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|source| RepositoryError::Corrupt { path, source })
    }

    async fn save(&self, attempt: &PersistedAttempt) -> Result<(), RepositoryError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| RepositoryError::Io { path: self.root.clone(), source })?;

        let path = self.path_for(&attempt.student_id, &attempt.assessment_id);
        let staging = path.with_extension("json.tmp");
        let body = serde_json::to_vec(attempt)?;

        tokio::fs::write(&staging, body)
            .await
            .map_err(|source| RepositoryError::Io { path: staging.clone(), source })?;
        tokio::fs::rename(&staging, &path)
            .await
            .map_err(|source| RepositoryError::Io { path, source })
    }

    async fn remove(&self, student_id: &str, assessment_id: &str) -> Result<(), RepositoryError> {
        let path = self.path_for(student_id, assessment_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(RepositoryError::Io { path, source }),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryAttemptRepository {
    records: Mutex<HashMap<String, PersistedAttempt>>,
}

impl MemoryAttemptRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }
}

#[async_trait]
impl AttemptRepository for MemoryAttemptRepository {
    async fn load(
        &self,
        student_id: &str,
        assessment_id: &str,
    ) -> Result<Option<PersistedAttempt>, RepositoryError> {
        let records = self.records.lock().await;
        Ok(records.get(&record_key(student_id, assessment_id)).cloned())
    }

    async fn save(&self, attempt: &PersistedAttempt) -> Result<(), RepositoryError> {
        let mut records = self.records.lock().await;
        records.insert(record_key(&attempt.student_id, &attempt.assessment_id), attempt.clone());
        Ok(())
    }

    async fn remove(&self, student_id: &str, assessment_id: &str) -> Result<(), RepositoryError> {
        self.records.lock().await.remove(&record_key(student_id, assessment_id));
        Ok(())
    }
}
