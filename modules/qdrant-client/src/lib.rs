pub mod error;

pub use error::{QdrantError, Result};

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

/// Vector distance function for a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distance {
    Cosine,
    Dot,
    Euclid,
}

impl Distance {
    /// Parse a configured distance name. Unknown names fall back to cosine.
    pub fn parse(raw: &str) -> Self {
        match raw.to_lowercase().as_str() {
            "dot" | "dotproduct" | "inner" => Distance::Dot,
            "euclid" | "euclidean" | "l2" => Distance::Euclid,
            _ => Distance::Cosine,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Distance::Cosine => "Cosine",
            Distance::Dot => "Dot",
            Distance::Euclid => "Euclid",
        }
    }
}

/// A point to upsert: id, embedding vector, and arbitrary JSON payload.
#[derive(Debug, Clone)]
pub struct PointRecord {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: serde_json::Value,
}

/// A search hit with its similarity score and stored payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoredPoint {
    pub id: serde_json::Value,
    pub score: f64,
    #[serde(default)]
    pub payload: serde_json::Value,
}

pub struct QdrantClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl QdrantClient {
    pub fn new(base_url: &str, api_key: Option<&str>, timeout_seconds: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(String::from),
        }
    }

    /// Create the collection if it does not exist yet.
    pub async fn ensure_collection(
        &self,
        name: &str,
        dimension: usize,
        distance: Distance,
    ) -> Result<()> {
        if self.list_collections().await?.iter().any(|c| c == name) {
            return Ok(());
        }

        let body = serde_json::json!({
            "vectors": { "size": dimension, "distance": distance.as_str() }
        });
        let resp = self
            .request(reqwest::Method::PUT, &format!("/collections/{name}"))
            .json(&body)
            .send()
            .await?;
        Self::check(resp).await?;
        debug!(collection = name, dimension, "Created qdrant collection");
        Ok(())
    }

    /// Upsert points, waiting for the write to be applied.
    pub async fn upsert_points(&self, collection: &str, points: &[PointRecord]) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }

        let body = serde_json::json!({
            "points": points
                .iter()
                .map(|p| serde_json::json!({
                    "id": p.id.to_string(),
                    "vector": p.vector,
                    "payload": p.payload,
                }))
                .collect::<Vec<_>>(),
        });

        let resp = self
            .request(
                reqwest::Method::PUT,
                &format!("/collections/{collection}/points?wait=true"),
            )
            .json(&body)
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    /// Nearest-neighbour search, optionally restricted to points whose
    /// `published_at_ts` payload field is at or after the given cutoff.
    pub async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        published_after: Option<i64>,
    ) -> Result<Vec<ScoredPoint>> {
        let body = search_body(vector, limit, published_after);
        let resp = self
            .request(
                reqwest::Method::POST,
                &format!("/collections/{collection}/points/search"),
            )
            .json(&body)
            .send()
            .await?;
        let value = Self::check(resp).await?;

        let result = value
            .get("result")
            .cloned()
            .ok_or_else(|| QdrantError::Malformed("missing result field".to_string()))?;
        serde_json::from_value(result).map_err(|e| QdrantError::Malformed(e.to_string()))
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let resp = self
            .request(reqwest::Method::GET, "/collections")
            .send()
            .await?;
        let value = Self::check(resp).await?;

        let names = value["result"]["collections"]
            .as_array()
            .map(|collections| {
                collections
                    .iter()
                    .filter_map(|c| c["name"].as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();
        Ok(names)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{path}", self.base_url));
        if let Some(ref key) = self.api_key {
            builder = builder.header("api-key", key);
        }
        builder
    }

    async fn check(resp: reqwest::Response) -> Result<serde_json::Value> {
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(QdrantError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(resp.json().await?)
    }
}

/// Build the JSON body for a points search.
fn search_body(vector: &[f32], limit: usize, published_after: Option<i64>) -> serde_json::Value {
    let mut body = serde_json::json!({
        "vector": vector,
        "limit": limit,
        "with_payload": true,
    });
    if let Some(cutoff) = published_after {
        body["filter"] = serde_json::json!({
            "must": [{ "key": "published_at_ts", "range": { "gte": cutoff } }]
        });
    }
    body
}
