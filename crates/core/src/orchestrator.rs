use crate::error::SearchError;
use crate::evaluator::{build_candidate_context, CandidateEvaluator};
use crate::models::{CandidateEvaluation, SearchRequest};
use crate::traits::{CandidateRepository, VectorIndex};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct SearchOrchestrator {
    index: Arc<dyn VectorIndex>,
    repository: Arc<dyn CandidateRepository>,
    evaluator: CandidateEvaluator,
}

impl SearchOrchestrator {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        repository: Arc<dyn CandidateRepository>,
        evaluator: CandidateEvaluator,
    ) -> Self {
        Self {
            index,
            repository,
            evaluator,
        }
    }

    pub async fn search(
        &self,
        request: &SearchRequest,
    ) -> Result<Vec<CandidateEvaluation>, SearchError> {
        request.validate().map_err(SearchError::Request)?;

        let matches = self
            .index
            .search(&request.vacancy_description, request.k, &request.filter())
            .await?;
        info!(matches = matches.len(), k = request.k, "vector search finished");
        if matches.is_empty() {
            warn!("no candidates matched the vacancy");
            return Ok(Vec::new());
        }

        let total = matches.len();
        let mut contexts = Vec::with_capacity(total);
        for (position, found) in matches.iter().enumerate() {
            let candidate_id = found.document.candidate_id;
            match self.repository.fetch_by_id(candidate_id).await? {
                Some(record) => {
                    info!(
                        candidate_id,
                        position = position + 1,
                        total,
                        score = found.score,
                        "resolved candidate"
                    );
                    contexts.push(build_candidate_context(&found.document, &record));
                }
                None => {
                    warn!(
                        candidate_id,
                        position = position + 1,
                        total,
                        "candidate not found in the database, skipping"
                    );
                }
            }
        }

        if contexts.is_empty() {
            warn!("none of the matched candidates could be resolved");
            return Ok(Vec::new());
        }

        self.evaluator
            .evaluate(&request.vacancy_description, &contexts)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::llm::ChatOptions;
    use crate::models::{Grade, IndexedDocument, SearchFilter};
    use crate::stores::{InMemoryIndex, InMemoryRepository};
    use crate::testing::{record, ScriptedChat};
    use serde_json::{json, Map};

    const EVALUATION: &str = r#"[{"name": "Person 1", "phone": "+7 1", "location": "Moscow",
        "hard_skills_score": 9, "domain_skills_score": 8, "relevance_score": 9,
        "relevance_explanation": "Senior Rust"}]"#;

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

    fn fixture() -> Vec<IndexedDocument> {
        vec![
            document(1, "Senior Rust backend developer, payments", 7.0, "Senior"),
            document(2, "Senior Rust developer, trading systems", 2.0, "Senior"),
            document(3, "Middle Rust backend developer", 5.0, "Middle"),
            document(4, "Senior Go backend developer", 4.0, "Senior"),
            document(5, "Lead Rust architect", 12.0, "Lead"),
            document(6, "Senior accountant, tax reporting", 9.0, "Senior"),
            document(7, "Junior Rust developer", 0.5, "Junior"),
            document(8, "Senior Rust embedded developer", 3.0, "Senior"),
            document(9, "Senior QA engineer", 6.0, "Senior"),
            document(10, "Head of backend development", 15.0, "Head"),
        ]
    }

    async fn index_with_fixture() -> Arc<InMemoryIndex<CharacterNgramEmbedder>> {
        let index = Arc::new(InMemoryIndex::new("candidates", CharacterNgramEmbedder::default()));
        index.upsert(&fixture()).await.unwrap();
        index
    }

    #[tokio::test]
    async fn filtered_search_returns_only_matching_documents_by_descending_score() {
        let index = index_with_fixture().await;
        let filter = SearchFilter {
            experience_years_min: Some(3.0),
            grade: Some(Grade::Senior),
        };

        let matches = index
            .search("Senior Rust backend developer", 5, &filter)
            .await
            .unwrap();

        assert!(!matches.is_empty());
        assert!(matches.len() <= 5);
        for found in &matches {
            assert_eq!(found.document.grade(), Some("Senior"));
            assert!(found.document.experience_years().unwrap() >= 3.0);
        }
        for pair in matches.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        let mut ids: Vec<i64> = matches.iter().map(|m| m.document.candidate_id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 4, 6, 8, 9]);
    }

    #[tokio::test]
    async fn indexed_candidate_is_found_with_lower_experience_bound() {
        let index = Arc::new(InMemoryIndex::new("candidates", CharacterNgramEmbedder::default()));
        index
            .upsert(&[document(42, "Data engineer", 5.0, "Middle")])
            .await
            .unwrap();
        let filter = SearchFilter {
            experience_years_min: Some(3.0),
            grade: None,
        };

        let matches = index.search("Data engineer", 5, &filter).await.unwrap();

        assert!(matches.iter().any(|m| m.document.candidate_id == 42));
    }

    #[tokio::test]
    async fn unresolved_candidates_are_skipped() {
        let index = index_with_fixture().await;
        let repository = Arc::new(InMemoryRepository::with_records([record(1, "Person 1", "+7 1")]));
        let chat = Arc::new(ScriptedChat::replying([EVALUATION]));
        let orchestrator = SearchOrchestrator::new(
            index,
            repository,
            CandidateEvaluator::new(chat.clone(), ChatOptions::evaluation()),
        );
        let mut request = SearchRequest::new("Senior Rust backend developer", 5);
        request.experience_years_min = Some(3.0);
        request.grade = Some(Grade::Senior);

        let evaluations = orchestrator.search(&request).await.unwrap();

        assert_eq!(evaluations.len(), 1);
        assert_eq!(evaluations[0].name, "Person 1");
        let prompt = &chat.prompts()[0];
        assert_eq!(prompt.matches("Name: ").count(), 1);
        assert!(prompt.contains("Name: Person 1\nPhone: +7 1\nLocation: Moscow"));
    }

    #[tokio::test]
    async fn no_resolved_candidates_yields_empty_without_calling_the_model() {
        let chat = Arc::new(ScriptedChat::new(Vec::new()));
        let orchestrator = SearchOrchestrator::new(
            index_with_fixture().await,
            Arc::new(InMemoryRepository::new()),
            CandidateEvaluator::new(chat.clone(), ChatOptions::evaluation()),
        );

        let evaluations = orchestrator
            .search(&SearchRequest::new("Rust developer", 3))
            .await
            .unwrap();

        assert!(evaluations.is_empty());
        assert_eq!(chat.calls(), 0);
    }

    #[tokio::test]
    async fn empty_index_yields_empty_result() {
        let chat = Arc::new(ScriptedChat::new(Vec::new()));
        let orchestrator = SearchOrchestrator::new(
            Arc::new(InMemoryIndex::new("candidates", CharacterNgramEmbedder::default())),
            Arc::new(InMemoryRepository::new()),
            CandidateEvaluator::new(chat, ChatOptions::evaluation()),
        );

        let evaluations = orchestrator
            .search(&SearchRequest::new("Rust developer", 3))
            .await
            .unwrap();

        assert!(evaluations.is_empty());
    }

    #[tokio::test]
    async fn unparsable_evaluation_fails_the_whole_request() {
        let repository = Arc::new(InMemoryRepository::with_records(
            (1..=10).map(|id| record(id, &format!("Person {id}"), &format!("+7 {id}"))),
        ));
        let chat = Arc::new(ScriptedChat::replying(["All of them are great."]));
        let orchestrator = SearchOrchestrator::new(
            index_with_fixture().await,
            repository,
            CandidateEvaluator::new(chat, ChatOptions::evaluation()),
        );

        let error = orchestrator
            .search(&SearchRequest::new("Rust developer", 3))
            .await
            .unwrap_err();

        assert_eq!(error.reason(), "evaluation_parse");
    }

    #[tokio::test]
    async fn invalid_request_is_rejected_before_searching() {
        let chat = Arc::new(ScriptedChat::new(Vec::new()));
        let orchestrator = SearchOrchestrator::new(
            index_with_fixture().await,
            Arc::new(InMemoryRepository::new()),
            CandidateEvaluator::new(chat, ChatOptions::evaluation()),
        );

        let error = orchestrator
            .search(&SearchRequest::new("Rust developer", 0))
            .await
            .unwrap_err();

        assert_eq!(error.reason(), "invalid_request");
    }
}
