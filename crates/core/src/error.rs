use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("api error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("model returned empty content")]
    EmptyContent,

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

impl LlmError {
    /// Timeouts, refused connections, throttling and 5xx answers are worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Http(error) => {
                error.is_timeout() || error.is_connect() || error.is_request()
            }
            LlmError::Api { status, .. } => *status == 429 || *status >= 500,
            LlmError::EmptyContent | LlmError::Url(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("chat model unavailable: {0}")]
    Transport(#[from] LlmError),

    #[error("schema validation failed after repair: {details}")]
    SchemaValidation { details: String },
}

impl ExtractionError {
    pub fn reason(&self) -> &'static str {
        match self {
            ExtractionError::Transport(_) => "llm_unavailable",
            ExtractionError::SchemaValidation { .. } => "schema_validation",
        }
    }
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("search request failed: {0}")]
    Request(String),

    #[error("vector index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("chat model failed: {0}")]
    Llm(#[from] LlmError),

    #[error("evaluation response could not be parsed: {0}")]
    EvaluationParse(String),

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl SearchError {
    pub fn reason(&self) -> &'static str {
        match self {
            SearchError::BackendResponse { .. } => "backend_response",
            SearchError::Http(_) | SearchError::IndexUnavailable(_) => "index_unavailable",
            SearchError::Url(_) => "invalid_url",
            SearchError::Serialization(_) => "serialization",
            SearchError::Request(_) => "invalid_request",
            SearchError::Embedding(_) => "embedding_unavailable",
            SearchError::Llm(_) => "llm_unavailable",
            SearchError::EvaluationParse(_) => "evaluation_parse",
            SearchError::Repository(_) => "repository_unavailable",
        }
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("no valid documents to index")]
    NoValidDocuments,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("malformed export row in {file} line {line}: {details}")]
    Decode {
        file: String,
        line: usize,
        details: String,
    },

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("index error: {0}")]
    Index(#[from] SearchError),

    #[error("background job aborted: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl IngestError {
    pub fn reason(&self) -> &'static str {
        match self {
            IngestError::Io(_) => "io",
            IngestError::Regex(_) => "invalid_pattern",
            IngestError::NoValidDocuments => "no_valid_documents",
            IngestError::InvalidArgument(_) => "invalid_argument",
            IngestError::Decode { .. } => "decode",
            IngestError::Repository(_) => "repository_unavailable",
            IngestError::Index(inner) => inner.reason(),
            IngestError::Join(_) => "job_aborted",
        }
    }
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
