use crate::assembler::assemble_documents;
use crate::config::IngestConfig;
use crate::error::Result;
use crate::extractor::{bind_to_record, MetadataExtractor};
use crate::loader::load_export_records;
use crate::models::{CandidateRecord, RefreshReport};
use crate::parser::ResumeParser;
use crate::traits::{CandidateRepository, VectorIndex};
use futures::future::join_all;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

#[derive(Clone)]
pub struct IngestPipeline {
    repository: Arc<dyn CandidateRepository>,
    index: Arc<dyn VectorIndex>,
    parser: ResumeParser,
    extractor: MetadataExtractor,
    workers: usize,
}

impl IngestPipeline {
    pub fn new(
        repository: Arc<dyn CandidateRepository>,
        index: Arc<dyn VectorIndex>,
        parser: ResumeParser,
        extractor: MetadataExtractor,
        workers: usize,
    ) -> Self {
        Self {
            repository,
            index,
            parser,
            extractor,
            workers: workers.max(1),
        }
    }

    /// A résumé whose extraction fails is logged and skipped. The job fails only when
    /// no document survives or a store is unreachable.
    pub async fn refresh_vector_index(&self) -> Result<RefreshReport> {
        let records = self.repository.fetch_all().await?;
        let attempted = records.len();
        info!(records = attempted, workers = self.workers, "starting vector index refresh");

        let entries = self.extract_all(records).await;
        let extracted = entries.len();
        info!(extracted, attempted, "metadata extraction finished");

        let documents = assemble_documents(entries)?;
        let indexed = self.index.upsert(&documents).await?;
        info!(indexed, "vector index refresh complete");

        Ok(RefreshReport {
            attempted,
            extracted,
            indexed,
        })
    }

    pub async fn extract_all(&self, records: Vec<CandidateRecord>) -> Vec<Value> {
        let total = records.len();
        let queue = Arc::new(Mutex::new(
            records.into_iter().enumerate().collect::<VecDeque<_>>(),
        ));
        let results = Arc::new(Mutex::new(Vec::with_capacity(total)));
        let workers = self.workers.min(total.max(1));

        let handles = (0..workers)
            .map(|worker| {
                let queue = Arc::clone(&queue);
                let results = Arc::clone(&results);
                let parser = self.parser.clone();
                let extractor = self.extractor.clone();
                tokio::spawn(async move {
                    loop {
                        let next = queue.lock().await.pop_front();
                        let Some((position, record)) = next else {
                            break;
                        };
                        if let Some(entry) = extract_one(&parser, &extractor, &record, worker).await {
                            results.lock().await.push((position, entry));
                        }
                    }
                })
            })
            .collect::<Vec<_>>();

        for outcome in join_all(handles).await {
            if let Err(join_error) = outcome {
                error!(error = %join_error, "extraction worker aborted");
            }
        }

        let mut collected = std::mem::take(&mut *results.lock().await);
        collected.sort_by_key(|(position, _)| *position);
        collected.into_iter().map(|(_, entry)| entry).collect()
    }
}

async fn extract_one(
    parser: &ResumeParser,
    extractor: &MetadataExtractor,
    record: &CandidateRecord,
    worker: usize,
) -> Option<Value> {
    let text = parser.parse(record);
    let extraction = extractor.extract(&text).await;
    let calls = extraction.model_calls;

    let metadata = match extraction
        .result
        .and_then(|metadata| bind_to_record(metadata, record))
    {
        Ok(metadata) => metadata,
        Err(error) => {
            error!(
                candidate_id = record.id,
                worker,
                calls,
                reason = error.reason(),
                error = %error,
                "extraction failed, skipping résumé"
            );
            return None;
        }
    };

    match serde_json::to_value(&metadata) {
        Ok(entry) => Some(entry),
        Err(error) => {
            error!(candidate_id = record.id, error = %error, "metadata could not be serialized");
            None
        }
    }
}

pub async fn refresh_database(
    repository: &dyn CandidateRepository,
    config: &IngestConfig,
) -> Result<usize> {
    let records = load_export_records(config).await?;
    repository.upsert_all(&records).await?;
    info!(records = records.len(), "database refresh complete");
    Ok(records.len())
}
