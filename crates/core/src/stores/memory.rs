use crate::error::{RepositoryError, SearchError};
use crate::models::{CandidateRecord, CollectionInfo, IndexedDocument, RetrievedMatch, SearchFilter};
use crate::traits::{CandidateRepository, EmbeddingProvider, VectorIndex};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

pub struct InMemoryIndex<E> {
    name: String,
    embedder: E,
    points: RwLock<BTreeMap<i64, (IndexedDocument, Vec<f32>)>>,
}

impl<E: EmbeddingProvider> InMemoryIndex<E> {
    pub fn new(name: impl Into<String>, embedder: E) -> Self {
        Self {
            name: name.into(),
            embedder,
            points: RwLock::new(BTreeMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.points.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.points.read().await.is_empty()
    }
}

fn cosine(left: &[f32], right: &[f32]) -> f64 {
    let mut dot = 0f64;
    let mut left_norm = 0f64;
    let mut right_norm = 0f64;
    for (a, b) in left.iter().zip(right) {
        dot += f64::from(*a) * f64::from(*b);
        left_norm += f64::from(*a) * f64::from(*a);
        right_norm += f64::from(*b) * f64::from(*b);
    }
    if left_norm == 0.0 || right_norm == 0.0 {
        return 0.0;
    }
    dot / (left_norm.sqrt() * right_norm.sqrt())
}

#[async_trait]
impl<E: EmbeddingProvider> VectorIndex for InMemoryIndex<E> {
    async fn health_check(&self) -> Result<(), SearchError> {
        Ok(())
    }

    async fn collection_info(&self) -> Result<CollectionInfo, SearchError> {
        let count = self.points.read().await.len();
        Ok(CollectionInfo {
            collection_name: self.name.clone(),
            exists: count > 0,
            points_count: count as u64,
        })
    }

    async fn upsert(&self, documents: &[IndexedDocument]) -> Result<usize, SearchError> {
        let texts: Vec<&str> = documents.iter().map(|doc| doc.content.as_str()).collect();
        let vectors = self
            .embedder
            .embed_batch(&texts)
            .await
            .map_err(|error| SearchError::Embedding(error.to_string()))?;

        let mut points = self.points.write().await;
        for (document, vector) in documents.iter().zip(vectors) {
            points.insert(document.candidate_id, (document.clone(), vector));
        }
        Ok(documents.len())
    }

    async fn search(
        &self,
        query: &str,
        k: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<RetrievedMatch>, SearchError> {
        let query_vector = self
            .embedder
            .embed(query)
            .await
            .map_err(|error| SearchError::Embedding(error.to_string()))?;

        let points = self.points.read().await;
        let mut matches: Vec<RetrievedMatch> = points
            .values()
            .filter(|(document, _)| filter.matches(document))
            .map(|(document, vector)| RetrievedMatch {
                document: document.clone(),
                score: cosine(&query_vector, vector),
            })
            .collect();

        // Stable sort keeps ascending candidate id among equal scores.
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(k);
        Ok(matches)
    }
}

#[derive(Default)]
pub struct InMemoryRepository {
    rows: RwLock<BTreeMap<i64, CandidateRecord>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = CandidateRecord>) -> Self {
        let rows = records.into_iter().map(|record| (record.id, record)).collect();
        Self {
            rows: RwLock::new(rows),
        }
    }
}

#[async_trait]
impl CandidateRepository for InMemoryRepository {
    async fn fetch_all(&self) -> Result<Vec<CandidateRecord>, RepositoryError> {
        Ok(self.rows.read().await.values().cloned().collect())
    }

    async fn fetch_by_id(&self, id: i64) -> Result<Option<CandidateRecord>, RepositoryError> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn upsert_all(&self, records: &[CandidateRecord]) -> Result<u64, RepositoryError> {
        let mut rows = self.rows.write().await;
        for record in records {
            rows.insert(record.id, record.clone());
        }
        Ok(records.len() as u64)
    }

    async fn find_html(&self, name: &str, phone: &str) -> Result<Option<String>, RepositoryError> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .find(|record| {
                record.fullname.as_deref() == Some(name)
                    && record.mobile_phone.as_deref() == Some(phone)
            })
            .and_then(|record| record.html.clone()))
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::models::Grade;
    use serde_json::{json, Map};

    fn document(id: i64, content: &str, years: f64, grade: &str) -> IndexedDocument {
        let mut metadata = Map::new();
        metadata.insert("candidate_id".to_string(), json!(id));
        metadata.insert("experience_years".to_string(), json!(years));
        metadata.insert("grade".to_string(), json!(grade));
        IndexedDocument {
            candidate_id: id,
            content: content.to_string(),
            metadata,
        }
    }

    #[tokio::test]
    async fn upsert_replaces_existing_candidate() {
        let index = InMemoryIndex::new("test", CharacterNgramEmbedder::default());
        index
            .upsert(&[document(1, "Rust developer", 2.0, "Junior")])
            .await
            .unwrap();
        index
            .upsert(&[document(1, "Rust developer", 5.0, "Senior")])
            .await
            .unwrap();

        assert_eq!(index.len().await, 1);
        let matches = index
            .search("Rust", 5, &SearchFilter::default())
            .await
            .unwrap();
        assert_eq!(matches[0].document.grade(), Some("Senior"));
    }

    #[tokio::test]
    async fn search_filters_then_ranks_by_similarity() {
        let index = InMemoryIndex::new("test", CharacterNgramEmbedder::default());
        index
            .upsert(&[
                document(1, "Senior Rust backend developer", 6.0, "Senior"),
                document(2, "Accountant with tax reporting", 8.0, "Senior"),
                document(3, "Rust backend developer", 1.0, "Junior"),
            ])
            .await
            .unwrap();

        let filter = SearchFilter {
            experience_years_min: Some(3.0),
            grade: Some(Grade::Senior),
        };
        let matches = index
            .search("Rust backend developer", 5, &filter)
            .await
            .unwrap();

        let ids: Vec<i64> = matches.iter().map(|m| m.document.candidate_id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(matches[0].score >= matches[1].score);
    }

    #[tokio::test]
    async fn repository_finds_markup_by_name_and_phone() {
        let repository = InMemoryRepository::with_records([CandidateRecord {
            id: 1,
            fullname: Some("Anna Smirnova".to_string()),
            mobile_phone: Some("+7 911".to_string()),
            html: Some("<html></html>".to_string()),
            ..CandidateRecord::default()
        }]);

        assert_eq!(
            repository.find_html("Anna Smirnova", "+7 911").await.unwrap(),
            Some("<html></html>".to_string())
        );
        assert_eq!(repository.find_html("Anna Smirnova", "+7 000").await.unwrap(), None);
    }
}
