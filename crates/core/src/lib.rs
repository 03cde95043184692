pub mod assembler;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod evaluator;
pub mod extractor;
pub mod ingest;
pub mod llm;
pub mod loader;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod parser;
pub mod prompts;
pub mod service;
pub mod stores;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use assembler::assemble_documents;
pub use config::Settings;
pub use embeddings::{CharacterNgramEmbedder, OllamaEmbedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{ExtractionError, IngestError, LlmError, RepositoryError, SearchError};
pub use evaluator::{build_candidate_context, parse_evaluations, CandidateEvaluator};
pub use extractor::{Extraction, ExtractionState, MetadataExtractor};
pub use ingest::{refresh_database, IngestPipeline};
pub use llm::{ChatMessage, ChatOptions, OpenAiChatModel};
pub use loader::load_export_records;
pub use models::{
    CandidateEvaluation, CandidateMetadata, CandidateRecord, CollectionInfo, Grade, HealthStatus,
    IndexedDocument, RefreshReport, RetrievedMatch, SearchFilter, SearchRequest,
};
pub use orchestrator::SearchOrchestrator;
pub use parser::ResumeParser;
pub use service::CandidateService;
pub use stores::{InMemoryIndex, InMemoryRepository, PgCandidateRepository, QdrantIndex};
pub use traits::{CandidateRepository, ChatModel, EmbeddingProvider, VectorIndex};
