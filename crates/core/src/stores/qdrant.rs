use crate::config::QdrantConfig;
use crate::error::SearchError;
use crate::models::{CollectionInfo, IndexedDocument, RetrievedMatch, SearchFilter};
use crate::traits::{EmbeddingProvider, VectorIndex};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

const BACKEND: &str = "qdrant";
const UPSERT_BATCH: usize = 64;

pub struct QdrantIndex<E> {
    client: Client,
    endpoint: String,
    collection: String,
    embedder: E,
}

impl<E: EmbeddingProvider> QdrantIndex<E> {
    pub fn new(config: &QdrantConfig, embedder: E) -> Result<Self, SearchError> {
        let endpoint = url::Url::parse(&config.url)?;
        Ok(Self {
            client: Client::builder().timeout(config.timeout).build()?,
            endpoint: endpoint.as_str().trim_end_matches('/').to_string(),
            collection: config.collection.clone(),
            embedder,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.endpoint, self.collection)
    }

    pub async fn ensure_collection(&self, vector_size: usize) -> Result<(), SearchError> {
        let response = self.client.get(self.collection_url()).send().await?;
        match response.status() {
            status if status.is_success() => return Ok(()),
            StatusCode::NOT_FOUND => {}
            status => return Err(backend_error(status, response).await),
        }

        info!(collection = %self.collection, vector_size, "creating qdrant collection");
        let response = self
            .client
            .put(self.collection_url())
            .json(&json!({
                "vectors": { "size": vector_size, "distance": "Cosine" }
            }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(backend_error(response.status(), response).await);
        }
        Ok(())
    }

    async fn embed_contents(&self, documents: &[IndexedDocument]) -> Result<Vec<Vec<f32>>, SearchError> {
        let texts: Vec<&str> = documents.iter().map(|doc| doc.content.as_str()).collect();
        self.embedder
            .embed_batch(&texts)
            .await
            .map_err(|error| SearchError::Embedding(error.to_string()))
    }
}

async fn backend_error(status: StatusCode, response: reqwest::Response) -> SearchError {
    let body = response.text().await.unwrap_or_default();
    SearchError::BackendResponse {
        backend: BACKEND.to_string(),
        details: format!("{status}: {body}"),
    }
}

fn point(document: &IndexedDocument, vector: Vec<f32>) -> Result<Value, SearchError> {
    let id = u64::try_from(document.candidate_id).map_err(|_| {
        SearchError::Request(format!(
            "candidate id {} cannot be used as a point id",
            document.candidate_id
        ))
    })?;
    Ok(json!({
        "id": id,
        "vector": vector,
        "payload": {
            "page_content": document.content,
            "metadata": document.metadata,
        },
    }))
}

fn filter_body(filter: &SearchFilter) -> Option<Value> {
    let mut must = Vec::new();
    if let Some(min) = filter.experience_years_min {
        must.push(json!({
            "key": "metadata.experience_years",
            "range": { "gte": min },
        }));
    }
    if let Some(grade) = filter.grade {
        must.push(json!({
            "key": "metadata.grade",
            "match": { "value": grade.as_str() },
        }));
    }
    (!must.is_empty()).then(|| json!({ "must": must }))
}

fn parse_hit(hit: &Value) -> Option<RetrievedMatch> {
    let metadata = hit
        .pointer("/payload/metadata")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_else(Map::new);
    let candidate_id = metadata
        .get("candidate_id")
        .and_then(Value::as_i64)
        .or_else(|| hit.pointer("/id").and_then(Value::as_i64))?;
    let content = hit
        .pointer("/payload/page_content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let score = hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0);

    Some(RetrievedMatch {
        document: IndexedDocument {
            candidate_id,
            content,
            metadata,
        },
        score,
    })
}

#[async_trait]
impl<E: EmbeddingProvider> VectorIndex for QdrantIndex<E> {
    async fn health_check(&self) -> Result<(), SearchError> {
        let response = self
            .client
            .get(format!("{}/collections", self.endpoint))
            .send()
            .await
            .map_err(|error| SearchError::IndexUnavailable(error.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::IndexUnavailable(format!("status {status}")));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|error| SearchError::IndexUnavailable(error.to_string()))?;
        match body.get("status").and_then(Value::as_str) {
            Some("ok") => Ok(()),
            other => {
                warn!(status = ?other, "qdrant answered with an unexpected status");
                Err(SearchError::IndexUnavailable(format!(
                    "unexpected status {}",
                    other.unwrap_or("<missing>")
                )))
            }
        }
    }

    async fn collection_info(&self) -> Result<CollectionInfo, SearchError> {
        let response = self.client.get(self.collection_url()).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            warn!(collection = %self.collection, "qdrant collection not found");
            return Ok(CollectionInfo {
                collection_name: self.collection.clone(),
                exists: false,
                points_count: 0,
            });
        }
        if !status.is_success() {
            return Err(backend_error(status, response).await);
        }

        let body: Value = response.json().await?;
        Ok(CollectionInfo {
            collection_name: self.collection.clone(),
            exists: true,
            points_count: body
                .pointer("/result/points_count")
                .and_then(Value::as_u64)
                .unwrap_or(0),
        })
    }

    async fn upsert(&self, documents: &[IndexedDocument]) -> Result<usize, SearchError> {
        if documents.is_empty() {
            return Ok(0);
        }

        let mut written = 0;
        for batch in documents.chunks(UPSERT_BATCH) {
            let vectors = self.embed_contents(batch).await?;
            if vectors.len() != batch.len() {
                return Err(SearchError::Embedding(format!(
                    "embedding count {} doesn't match document count {}",
                    vectors.len(),
                    batch.len()
                )));
            }
            if written == 0 {
                let size = vectors.first().map(Vec::len).unwrap_or_default();
                self.ensure_collection(size).await?;
            }

            let points = batch
                .iter()
                .zip(vectors)
                .map(|(document, vector)| point(document, vector))
                .collect::<Result<Vec<_>, SearchError>>()?;

            let response = self
                .client
                .put(format!("{}/points?wait=true", self.collection_url()))
                .json(&json!({ "points": points }))
                .send()
                .await?;
            if !response.status().is_success() {
                return Err(backend_error(response.status(), response).await);
            }

            written += batch.len();
            debug!(written, total = documents.len(), "upserted qdrant points");
        }

        info!(collection = %self.collection, documents = written, "qdrant upsert complete");
        Ok(written)
    }

    async fn search(
        &self,
        query: &str,
        k: usize,
        filter: &SearchFilter,
    ) -> Result<Vec<RetrievedMatch>, SearchError> {
        let vector = self
            .embedder
            .embed(query)
            .await
            .map_err(|error| SearchError::Embedding(error.to_string()))?;

        let mut body = json!({
            "vector": vector,
            "limit": k,
            "with_payload": true,
        });
        if let Some(filter) = filter_body(filter) {
            body["filter"] = filter;
        }
        info!(k, filter = ?filter, "searching qdrant");

        let response = self
            .client
            .post(format!("{}/points/search", self.collection_url()))
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(SearchError::IndexUnavailable(format!(
                "collection {} does not exist",
                self.collection
            )));
        }
        if !status.is_success() {
            return Err(backend_error(status, response).await);
        }

        let parsed: Value = response.json().await?;
        let hits = parsed
            .pointer("/result")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let matches: Vec<RetrievedMatch> = hits.iter().filter_map(parse_hit).collect();
        if matches.len() < hits.len() {
            warn!(
                dropped = hits.len() - matches.len(),
                "qdrant hits without candidate_id were dropped"
            );
        }
        Ok(matches)
    }
}
