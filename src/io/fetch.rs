use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};

use crate::application::AppError;
use crate::config::ApiConfig;

use super::snapshot::{RawSnapshot, SnapshotMeta};

/// Read-only client for the collections the backend serves.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    timeout_seconds: u64,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::Config(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token(),
            timeout_seconds: config.timeout_seconds,
        })
    }

    pub fn collection_url(&self, collection: &str) -> String {
        format!("{}/{}", self.base_url, collection)
    }

    /// GET one collection and return the body as JSON, unvalidated.
    pub async fn fetch_collection(&self, collection: &str) -> Result<Value, AppError> {
        let url = self.collection_url(collection);
        let mut request = self.http.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            let message = if e.is_timeout() {
                format!("timed out after {}s", self.timeout_seconds)
            } else if e.is_connect() {
                "cannot connect to backend".to_string()
            } else {
                e.to_string()
            };
            AppError::Fetch {
                url: url.clone(),
                message,
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Fetch {
                url,
                message: format!("HTTP {}", status),
            });
        }

        response.json::<Value>().await.map_err(|e| AppError::Fetch {
            url: url.clone(),
            message: format!("response is not JSON: {}", e),
        })
    }

    /// Fetch every collection one after another. Expenses are optional: a
    /// failure there yields an empty collection instead of aborting.
    pub async fn fetch_snapshot(&self) -> Result<RawSnapshot, AppError> {
        info!("fetching collections from {}", self.base_url);

        let fees = self.fetch_collection("fees").await?;
        let students = self.fetch_collection("students").await?;
        let batches = self.fetch_collection("batches").await?;
        let expenses = match self.fetch_collection("expenses").await {
            Ok(value) => value,
            Err(e) => {
                warn!("continuing without expenses: {}", e);
                Value::Array(Vec::new())
            }
        };

        Ok(RawSnapshot {
            fees,
            students,
            batches,
            expenses,
            meta: SnapshotMeta {
                fetched_at: Some(Utc::now()),
                source: Some(self.base_url.clone()),
            },
        })
    }
}
