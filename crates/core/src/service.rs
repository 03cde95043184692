use crate::config::{IngestConfig, LlmConfig};
use crate::error::{IngestError, RepositoryError, SearchError};
use crate::evaluator::CandidateEvaluator;
use crate::extractor::MetadataExtractor;
use crate::ingest::{refresh_database, IngestPipeline};
use crate::models::{
    CandidateEvaluation, CollectionInfo, ComponentHealth, HealthStatus, RefreshReport,
    SearchRequest,
};
use crate::orchestrator::SearchOrchestrator;
use crate::parser::ResumeParser;
use crate::traits::{CandidateRepository, ChatModel, VectorIndex};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

#[derive(Clone)]
pub struct CandidateService {
    index: Arc<dyn VectorIndex>,
    repository: Arc<dyn CandidateRepository>,
    orchestrator: SearchOrchestrator,
    pipeline: IngestPipeline,
    ingest: IngestConfig,
}

impl CandidateService {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        repository: Arc<dyn CandidateRepository>,
        chat: Arc<dyn ChatModel>,
        llm: &LlmConfig,
        ingest: IngestConfig,
    ) -> Result<Self, IngestError> {
        let extractor = MetadataExtractor::new(Arc::clone(&chat), llm.extraction.clone());
        let evaluator = CandidateEvaluator::new(chat, llm.evaluation.clone());
        let pipeline = IngestPipeline::new(
            Arc::clone(&repository),
            Arc::clone(&index),
            ResumeParser::new()?,
            extractor,
            ingest.workers,
        );
        let orchestrator =
            SearchOrchestrator::new(Arc::clone(&index), Arc::clone(&repository), evaluator);

        Ok(Self {
            index,
            repository,
            orchestrator,
            pipeline,
            ingest,
        })
    }

    pub async fn search_candidates(
        &self,
        request: &SearchRequest,
    ) -> Result<Vec<CandidateEvaluation>, SearchError> {
        self.orchestrator.search(request).await
    }

    pub async fn refresh_vector_index(&self) -> Result<RefreshReport, IngestError> {
        self.pipeline.refresh_vector_index().await
    }

    pub async fn refresh_database(&self) -> Result<usize, IngestError> {
        refresh_database(self.repository.as_ref(), &self.ingest).await
    }

    pub async fn collection_status(&self) -> Result<CollectionInfo, SearchError> {
        self.index.collection_info().await
    }

    /// Probes both stores independently; one being down never hides the other's state.
    pub async fn health_check(&self) -> HealthStatus {
        let (vector_store, database) =
            tokio::join!(self.index.health_check(), self.repository.ping());

        HealthStatus {
            vector_store: match vector_store {
                Ok(()) => ComponentHealth::up(),
                Err(error) => ComponentHealth::down(error),
            },
            database: match database {
                Ok(()) => ComponentHealth::up(),
                Err(error) => ComponentHealth::down(error),
            },
        }
    }

    pub async fn candidate_resume(
        &self,
        name: &str,
        phone: &str,
    ) -> Result<Option<String>, RepositoryError> {
        self.repository.find_html(name, phone).await
    }

    pub fn spawn_refresh_vector_index(&self) -> JoinHandle<Result<RefreshReport, IngestError>> {
        let service = self.clone();
        tokio::spawn(async move {
            info!("background vector index refresh started");
            let outcome = service.refresh_vector_index().await;
            if let Err(refresh_error) = &outcome {
                error!(reason = refresh_error.reason(), error = %refresh_error, "background vector index refresh failed");
            }
            outcome
        })
    }

    pub fn spawn_refresh_database(&self) -> JoinHandle<Result<usize, IngestError>> {
        let service = self.clone();
        tokio::spawn(async move {
            info!("background database refresh started");
            let outcome = service.refresh_database().await;
            if let Err(refresh_error) = &outcome {
                error!(reason = refresh_error.reason(), error = %refresh_error, "background database refresh failed");
            }
            outcome
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::stores::{InMemoryIndex, InMemoryRepository};
    use crate::models::CandidateRecord;
    use crate::testing::{metadata_json, record, ScriptedChat, UnreachableRepository};

    fn service(
        repository: Arc<dyn CandidateRepository>,
        chat: Arc<ScriptedChat>,
    ) -> CandidateService {
        CandidateService::new(
            Arc::new(InMemoryIndex::new("candidates", CharacterNgramEmbedder::default())),
            repository,
            chat,
            &LlmConfig::default(),
            IngestConfig {
                workers: 1,
                ..IngestConfig::default()
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn health_reports_each_component_independently() {
        let down = service(Arc::new(UnreachableRepository), Arc::new(ScriptedChat::new(Vec::new())));

        let status = down.health_check().await;

        assert!(status.vector_store_ok());
        assert!(!status.db_ok());
        assert!(status.database.error.is_some());
        assert!(!status.is_healthy());
    }

    #[tokio::test]
    async fn background_refresh_indexes_then_search_evaluates() {
        let repository = Arc::new(InMemoryRepository::with_records([record(1, "Anna Smirnova", "+7 900")]));
        let evaluation = r#"[{"name": "Anna Smirnova", "phone": "+7 900", "location": "Moscow",
            "hard_skills_score": 8, "domain_skills_score": 7, "relevance_score": 8,
            "relevance_explanation": "Rust backend"}]"#;
        let chat = Arc::new(ScriptedChat::new(vec![
            Ok(metadata_json(1, 4.0, "Middle")),
            Ok(evaluation.to_string()),
        ]));
        let service = service(repository, chat);

        let report = service.spawn_refresh_vector_index().await.unwrap().unwrap();
        assert_eq!(report.indexed, 1);

        let status = service.collection_status().await.unwrap();
        assert!(status.exists);
        assert_eq!(status.points_count, 1);

        let evaluations = service
            .search_candidates(&SearchRequest::new("Rust backend developer", 5))
            .await
            .unwrap();
        assert_eq!(evaluations.len(), 1);
        assert_eq!(evaluations[0].phone, "+7 900");
    }

    #[tokio::test]
    async fn resume_lookup_goes_through_the_repository() {
        let repository = Arc::new(InMemoryRepository::with_records([CandidateRecord {
            html: Some("<html>cv</html>".to_string()),
            ..record(3, "Irina", "+7 3")
        }]));
        let service = service(repository, Arc::new(ScriptedChat::new(Vec::new())));

        assert_eq!(
            service.candidate_resume("Irina", "+7 3").await.unwrap().as_deref(),
            Some("<html>cv</html>")
        );
    }

    #[tokio::test]
    async fn database_refresh_without_exports_fails_in_background() {
        let service = service(
            Arc::new(InMemoryRepository::new()),
            Arc::new(ScriptedChat::new(Vec::new())),
        );

        let outcome = service.spawn_refresh_database().await.unwrap();

        assert!(matches!(outcome, Err(IngestError::InvalidArgument(_))));
    }
}
