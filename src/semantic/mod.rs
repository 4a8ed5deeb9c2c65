//! C3 Semantic Index: content hashing for reconciliation, and the
//! vector-store / cross-encoder collaborators treated as external systems
//! (spec.md §1 — their model internals are out of scope; only the
//! retrieval contract is implemented here).

use anyhow::{Context, Result};
use async_trait::async_trait;
use md5::{Digest, Md5};
use qdrant_client::qdrant::{
    PointStruct, Condition, Filter, SearchPointsBuilder, UpsertPointsBuilder,
};
use qdrant_client::Qdrant;
use serde::{Deserialize, Serialize};

const COLLECTION_NAME: &str = "njit_courses";
const FETCH_K: u64 = 500;

/// MD5 of `title || description`, matching the original catalog's
/// change-detection hash. Used to skip re-embedding courses whose text is
/// unchanged across a scrape (spec.md §8 invariant 6).
pub fn content_hash(title: &str, description: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(title.as_bytes());
    hasher.update(b" ");
    hasher.update(description.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone)]
pub struct IndexedCourse {
    pub name: String,
    pub title: String,
    pub description: String,
    pub embedding: Vec<f32>,
    pub content_hash: String,
}

/// A vector-store candidate: the course's identity plus the title+description
/// text the cross-encoder reranks against. Bare course codes carry none of
/// the semantic content a reranker needs (spec.md §4.3).
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub name: String,
    pub document: String,
}

/// The retrieval boundary around whatever vector database backs course
/// search. Modeled as a trait so the reconciliation and query logic below
/// never depends on a specific backend.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert_batch(&self, courses: &[IndexedCourse]) -> Result<()>;
    async fn existing_hash(&self, name: &str) -> Result<Option<String>>;
    /// Returns up to `fetch_k` candidates ranked by embedding similarity,
    /// restricted to `allowed_names` when non-empty.
    async fn search(&self, query_embedding: &[f32], fetch_k: u64, allowed_names: &[String]) -> Result<Vec<SearchHit>>;
}

pub struct QdrantVectorStore {
    client: Qdrant,
}

impl QdrantVectorStore {
    pub fn connect(url: &str) -> Result<Self> {
        let client = Qdrant::from_url(url).build().context("failed to build qdrant client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn upsert_batch(&self, courses: &[IndexedCourse]) -> Result<()> {
        let points: Vec<PointStruct> = courses
            .iter()
            .map(|course| {
                PointStruct::new(
                    course.name.clone(),
                    course.embedding.clone(),
                    [
                        ("name", course.name.clone().into()),
                        ("title", course.title.clone().into()),
                        ("description", course.description.clone().into()),
                        ("contentHash", course.content_hash.clone().into()),
                    ],
                )
            })
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(COLLECTION_NAME, points))
            .await
            .context("qdrant upsert failed")?;
        Ok(())
    }

    async fn existing_hash(&self, name: &str) -> Result<Option<String>> {
        let result = self
            .client
            .get_points(qdrant_client::qdrant::GetPointsBuilder::new(COLLECTION_NAME, vec![name.into()]))
            .await
            .context("qdrant get_points failed")?;

        Ok(result.result.first().and_then(|point| {
            point.payload.get("contentHash").and_then(|v| v.as_str().map(str::to_string))
        }))
    }

    async fn search(&self, query_embedding: &[f32], fetch_k: u64, allowed_names: &[String]) -> Result<Vec<SearchHit>> {
        let mut builder =
            SearchPointsBuilder::new(COLLECTION_NAME, query_embedding.to_vec(), fetch_k).with_payload(true);

        if !allowed_names.is_empty() {
            let condition = Condition::matches("name", allowed_names.to_vec());
            builder = builder.filter(Filter::must([condition]));
        }

        let response = self.client.search_points(builder).await.context("qdrant search failed")?;

        Ok(response
            .result
            .into_iter()
            .filter_map(|scored| {
                let name = scored.payload.get("name").and_then(|v| v.as_str())?.to_string();
                let title = scored.payload.get("title").and_then(|v| v.as_str()).unwrap_or_default();
                let description =
                    scored.payload.get("description").and_then(|v| v.as_str()).unwrap_or_default();
                Some(SearchHit { name, document: format!("{title} {description}") })
            })
            .collect())
    }
}

/// The embedding-model boundary (spec.md §1: out of scope beyond its
/// contract). `course_query` calls this once per request to embed the
/// free-text search query before the vector-store prefilter.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

pub struct HttpEmbedder {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpEmbedder {
    pub fn new(client: reqwest::Client, endpoint: String) -> Self {
        Self { client, endpoint }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&EmbedRequest { input: text })
            .send()
            .await
            .context("embedding request failed")?
            .error_for_status()
            .context("embedding service returned an error status")?;

        let parsed: EmbedResponse = response.json().await.context("failed to decode embedding response")?;
        Ok(parsed.embedding)
    }
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    documents: &'a [String],
}

#[derive(Deserialize)]
struct RerankResponse {
    /// Parallel to the request's `documents`, highest-first.
    scores: Vec<f32>,
}

/// The retrieval boundary around whatever cross-encoder model reranks
/// candidates. When no reranker endpoint is configured, callers degrade to
/// the vector store's raw similarity order (spec.md §9 open question).
#[async_trait]
pub trait CrossEncoder: Send + Sync {
    async fn rerank(&self, query: &str, documents: &[String]) -> Result<Vec<f32>>;
}

pub struct HttpCrossEncoder {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpCrossEncoder {
    pub fn new(client: reqwest::Client, endpoint: String) -> Self {
        Self { client, endpoint }
    }
}

#[async_trait]
impl CrossEncoder for HttpCrossEncoder {
    async fn rerank(&self, query: &str, documents: &[String]) -> Result<Vec<f32>> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&RerankRequest { query, documents })
            .send()
            .await
            .context("reranker request failed")?
            .error_for_status()
            .context("reranker returned an error status")?;

        let parsed: RerankResponse = response.json().await.context("failed to decode reranker response")?;
        Ok(parsed.scores)
    }
}

/// Runs the hybrid retrieval pipeline: vector prefilter to `fetch_k`
/// candidates (capped at 500, overriding the looser limit the original
/// system used), then an optional cross-encoder rerank truncated to `k`.
pub async fn query(
    vector_store: &dyn VectorStore,
    cross_encoder: Option<&dyn CrossEncoder>,
    query_embedding: &[f32],
    query_text: &str,
    allowed_names: &[String],
    k: usize,
) -> Result<Vec<String>> {
    let candidates = vector_store.search(query_embedding, FETCH_K, allowed_names).await?;

    let ranked = match cross_encoder {
        Some(encoder) if !candidates.is_empty() => {
            let documents: Vec<String> = candidates.iter().map(|hit| hit.document.clone()).collect();
            let scores = encoder.rerank(query_text, &documents).await?;
            let mut paired: Vec<(String, f32)> =
                candidates.into_iter().map(|hit| hit.name).zip(scores).collect();
            paired.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            paired.into_iter().map(|(name, _)| name).collect()
        }
        _ => candidates.into_iter().map(|hit| hit.name).collect(),
    };

    Ok(ranked.into_iter().take(k).collect())
}

/// Reconciles a batch of embedded courses against the index: upserts in
/// chunks of 100 with a final flush for the remainder, skipping courses
/// whose content hash is unchanged (spec.md §4.3, §8 invariant 6).
pub async fn reconcile(vector_store: &dyn VectorStore, courses: &[IndexedCourse]) -> Result<usize> {
    const BATCH_SIZE: usize = 100;

    let mut to_upsert = Vec::new();
    for course in courses {
        let unchanged = vector_store
            .existing_hash(&course.name)
            .await?
            .is_some_and(|existing| existing == course.content_hash);
        if !unchanged {
            to_upsert.push(course.clone());
        }
    }

    let mut written = 0;
    for chunk in to_upsert.chunks(BATCH_SIZE) {
        vector_store.upsert_batch(chunk).await?;
        written += chunk.len();
    }

    Ok(written)
}
