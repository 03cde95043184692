use crate::error::{LlmError, RepositoryError, SearchError};
use crate::llm::{ChatMessage, ChatOptions};
use crate::models::{
    CandidateRecord, CollectionInfo, IndexedDocument, RetrievedMatch, SearchFilter,
};
use async_trait::async_trait;

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<String, LlmError>;
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError>;

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, LlmError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Fails with `SearchError::IndexUnavailable` when the store cannot be reached.
    async fn health_check(&self) -> Result<(), SearchError>;

    /// A missing collection is reported as `exists: false`, not as an error.
    async fn collection_info(&self) -> Result<CollectionInfo, SearchError>;

    /// Insert-or-replace keyed by `candidate_id`. Returns the number of documents written.
    async fn upsert(&self, documents: &[IndexedDocument]) -> Result<usize, SearchError>;

    /// Matches ordered by descending score; equal scores come back in store order.
    async fn search(
        &self,
        query: &str,
        k: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<RetrievedMatch>, SearchError>;
}

#[async_trait]
pub trait CandidateRepository: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<CandidateRecord>, RepositoryError>;

    async fn fetch_by_id(&self, id: i64) -> Result<Option<CandidateRecord>, RepositoryError>;

    /// Full-row replace keyed by `id`. Returns the number of rows written.
    async fn upsert_all(&self, records: &[CandidateRecord]) -> Result<u64, RepositoryError>;

    /// Stored markup of the candidate with exactly this name and phone.
    async fn find_html(&self, name: &str, phone: &str) -> Result<Option<String>, RepositoryError>;

    async fn ping(&self) -> Result<(), RepositoryError>;
}
