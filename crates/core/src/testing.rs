//! Fakes shared by the unit tests.

use crate::error::{LlmError, RepositoryError};
use crate::llm::{ChatMessage, ChatOptions};
use crate::models::CandidateRecord;
use crate::traits::{CandidateRepository, ChatModel};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Chat model that plays back canned replies and records the last message of each call.
pub(crate) struct ScriptedChat {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedChat {
    pub(crate) fn new(replies: Vec<Result<String, LlmError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn replying<'a>(replies: impl IntoIterator<Item = &'a str>) -> Self {
        Self::new(replies.into_iter().map(|reply| Ok(reply.to_string())).collect())
    }

    pub(crate) fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedChat {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        _options: &ChatOptions,
    ) -> Result<String, LlmError> {
        let last = messages
            .last()
            .map(|message| message.content.clone())
            .unwrap_or_default();
        self.prompts.lock().unwrap().push(last);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(LlmError::EmptyContent))
    }
}

/// Repository that is always down.
pub(crate) struct UnreachableRepository;

#[async_trait]
impl CandidateRepository for UnreachableRepository {
    async fn fetch_all(&self) -> Result<Vec<CandidateRecord>, RepositoryError> {
        Err(RepositoryError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn fetch_by_id(&self, _id: i64) -> Result<Option<CandidateRecord>, RepositoryError> {
        Err(RepositoryError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn upsert_all(&self, _records: &[CandidateRecord]) -> Result<u64, RepositoryError> {
        Err(RepositoryError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn find_html(
        &self,
        _name: &str,
        _phone: &str,
    ) -> Result<Option<String>, RepositoryError> {
        Err(RepositoryError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Err(RepositoryError::Database(sqlx::Error::PoolTimedOut))
    }
}

pub(crate) fn record(id: i64, fullname: &str, phone: &str) -> CandidateRecord {
    CandidateRecord {
        id,
        fullname: Some(fullname.to_string()),
        mobile_phone: Some(phone.to_string()),
        location_name: Some("Moscow".to_string()),
        desired_position_name: Some("Backend developer".to_string()),
        ..CandidateRecord::default()
    }
}

/// Extractor answer for `id` that passes validation.
pub(crate) fn metadata_json(id: i64, experience: f64, grade: &str) -> String {
    serde_json::json!({
        "candidate_id": id,
        "location_name": "Moscow",
        "positions": ["Backend developer (Backend Engineer)"],
        "experience_years": experience,
        "grade": grade,
        "hard_skills": ["Rust", "PostgreSQL"],
        "domain_skills": ["Banking"],
        "performed_tasks": ["API design"],
        "languages": [],
        "embedding_text": format!("Primary role: Backend developer. Total relevant experience: {experience} years.")
    })
    .to_string()
}
