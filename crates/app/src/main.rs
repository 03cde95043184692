use anyhow::{anyhow, bail, Context};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use resume_search_core::config::{
    DatabaseConfig, EmbeddingConfig, IngestConfig, LlmConfig, QdrantConfig, Settings,
    DEFAULT_COLLECTION, DEFAULT_OLLAMA_URL, DEFAULT_QDRANT_URL,
};
use resume_search_core::{
    CandidateService, Grade, OllamaEmbedder, OpenAiChatModel, PgCandidateRepository, QdrantIndex,
    SearchRequest,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "resume-search", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    connections: Connections,
}

#[derive(Args)]
struct Connections {
    /// Qdrant base URL
    #[arg(long, env = "QDRANT_URL", default_value = DEFAULT_QDRANT_URL, global = true)]
    qdrant_url: String,

    /// Qdrant collection holding candidate points
    #[arg(long, env = "QDRANT_COLLECTION_NAME", default_value = DEFAULT_COLLECTION, global = true)]
    qdrant_collection: String,

    /// Ollama base URL, used for embeddings and as the default chat endpoint
    #[arg(long, env = "OLLAMA_BASE_URL", default_value = DEFAULT_OLLAMA_URL, global = true)]
    ollama_url: String,

    /// Embedding model served by Ollama
    #[arg(long, env = "OLLAMA_EMBEDDING_MODEL", default_value = "qwen3-embedding:0.6b", global = true)]
    embedding_model: String,

    /// OpenAI-compatible chat endpoint; defaults to `<ollama-url>/v1`
    #[arg(long, env = "LLM_BASE_URL", global = true)]
    llm_url: Option<String>,

    /// Chat model used for extraction and evaluation
    #[arg(long, env = "OLLAMA_LLM_MODEL", default_value = "gpt-oss:20b", global = true)]
    llm_model: String,

    #[arg(long, env = "OLLAMA_API_KEY", default_value = "token-abc", hide_env_values = true, global = true)]
    llm_api_key: String,

    /// Full PostgreSQL URL; overrides the individual DB_* settings
    #[arg(long, env = "DATABASE_URL", hide_env_values = true, global = true)]
    database_url: Option<String>,

    #[arg(long, env = "DB_HOST", default_value = "localhost", global = true)]
    db_host: String,

    #[arg(long, env = "DB_PORT", default_value_t = 5432, global = true)]
    db_port: u16,

    #[arg(long, env = "DB_NAME", default_value = "estaff", global = true)]
    db_name: String,

    #[arg(long, env = "DB_USER", default_value = "postgres", global = true)]
    db_user: String,

    #[arg(long, env = "DB_PASSWORD", default_value = "postgres", hide_env_values = true, global = true)]
    db_password: String,

    /// Directory holding the export files
    #[arg(long, env = "DATA_DIR", default_value = "data", global = true)]
    data_dir: PathBuf,

    /// Export file name, `{}` stands for the file number
    #[arg(long, env = "DATA_FILE_PATTERN", default_value = "data_fake_{}.csv", global = true)]
    data_file_pattern: String,

    /// Résumés extracted concurrently during an index refresh
    #[arg(long, env = "INGEST_WORKERS", default_value_t = 4, global = true)]
    workers: usize,
}

impl Connections {
    fn settings(&self) -> Settings {
        let database_url = self.database_url.clone().unwrap_or_else(|| {
            format!(
                "postgres://{}:{}@{}:{}/{}",
                self.db_user, self.db_password, self.db_host, self.db_port, self.db_name
            )
        });
        let llm_url = self
            .llm_url
            .clone()
            .unwrap_or_else(|| format!("{}/v1", self.ollama_url.trim_end_matches('/')));

        Settings {
            llm: LlmConfig {
                base_url: llm_url,
                api_key: self.llm_api_key.clone(),
                model: self.llm_model.clone(),
                ..LlmConfig::default()
            },
            embedding: EmbeddingConfig {
                base_url: self.ollama_url.clone(),
                model: self.embedding_model.clone(),
                ..EmbeddingConfig::default()
            },
            qdrant: QdrantConfig {
                url: self.qdrant_url.clone(),
                collection: self.qdrant_collection.clone(),
                ..QdrantConfig::default()
            },
            database: DatabaseConfig {
                url: database_url,
                ..DatabaseConfig::default()
            },
            ingest: IngestConfig {
                workers: self.workers,
                data_dir: self.data_dir.clone(),
                file_pattern: self.data_file_pattern.clone(),
                ..IngestConfig::default()
            },
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Find and score candidates for a vacancy.
    Search {
        /// Vacancy description text.
        #[arg(long, conflicts_with = "vacancy_file", required_unless_present = "vacancy_file")]
        vacancy: Option<String>,
        /// File holding the vacancy description.
        #[arg(long)]
        vacancy_file: Option<PathBuf>,
        /// Number of candidates to retrieve (1-20).
        #[arg(long, default_value_t = 5)]
        k: usize,
        /// Minimum relevant experience in years.
        #[arg(long)]
        experience_years_min: Option<f64>,
        /// Required grade (Intern, Junior, Middle, Senior, Lead, Head).
        #[arg(long)]
        grade: Option<Grade>,
    },
    /// Rebuild the vector index from the candidate table.
    RefreshIndex,
    /// Reload the candidate table from export files.
    RefreshDb,
    /// Show whether the collection exists and how many points it holds.
    Status,
    /// Check the vector store and the database.
    Health,
    /// Create the candidate table if it is missing.
    Migrate,
    /// Print the stored résumé markup for a candidate.
    Resume {
        #[arg(long)]
        name: String,
        #[arg(long)]
        phone: String,
    },
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let settings = cli.connections.settings();

    let repository = Arc::new(
        PgCandidateRepository::connect_lazy(&settings.database)
            .context("invalid database settings")?,
    );
    let embedder = OllamaEmbedder::new(&settings.embedding).context("invalid embedding settings")?;
    let index = Arc::new(QdrantIndex::new(&settings.qdrant, embedder).context("invalid qdrant settings")?);
    let chat = Arc::new(OpenAiChatModel::new(&settings.llm).context("invalid llm settings")?);
    let service = CandidateService::new(
        index,
        repository.clone(),
        chat,
        &settings.llm,
        settings.ingest.clone(),
    )?;

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        collection = %settings.qdrant.collection,
        "resume-search boot"
    );

    match cli.command {
        Command::Search {
            vacancy,
            vacancy_file,
            k,
            experience_years_min,
            grade,
        } => {
            let vacancy_description = match (vacancy, vacancy_file) {
                (Some(text), _) => text,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("cannot read {}", path.display()))?,
                (None, None) => bail!("either --vacancy or --vacancy-file is required"),
            };
            let request = SearchRequest {
                vacancy_description,
                k,
                experience_years_min,
                grade,
            };

            let candidates = service
                .search_candidates(&request)
                .await
                .map_err(|error| anyhow!("search failed ({}): {error}", error.reason()))?;
            print_json(&json!({
                "candidates": candidates,
                "total_found": candidates.len(),
            }))?;
        }
        Command::RefreshIndex => {
            let report = service
                .spawn_refresh_vector_index()
                .await?
                .map_err(|error| anyhow!("index refresh failed ({}): {error}", error.reason()))?;
            print_json(&json!(report))?;
        }
        Command::RefreshDb => {
            let records = service
                .spawn_refresh_database()
                .await?
                .map_err(|error| anyhow!("database refresh failed ({}): {error}", error.reason()))?;
            print_json(&json!({ "records": records }))?;
        }
        Command::Status => {
            let info = service
                .collection_status()
                .await
                .map_err(|error| anyhow!("status failed ({}): {error}", error.reason()))?;
            print_json(&json!(info))?;
        }
        Command::Health => {
            let status = service.health_check().await;
            print_json(&json!({
                "status": if status.is_healthy() { "ok" } else { "degraded" },
                "vector_store_ok": status.vector_store_ok(),
                "db_ok": status.db_ok(),
                "vector_store": status.vector_store,
                "database": status.database,
            }))?;
            if !status.is_healthy() {
                bail!("one or more dependencies are unavailable");
            }
        }
        Command::Migrate => {
            repository.ensure_schema().await?;
            println!("candidates table ready at {}", Utc::now().to_rfc3339());
        }
        Command::Resume { name, phone } => {
            match service.candidate_resume(&name, &phone).await? {
                Some(html) => println!("{html}"),
                None => bail!("no résumé stored for {name} / {phone}"),
            }
        }
    }

    Ok(())
}
