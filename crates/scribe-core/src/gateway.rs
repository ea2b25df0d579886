//! Store gateway
//!
//! HTTP client for the durable document store. The coordinator talks to the
//! store only through [`DocumentStore`], whose two operations never fail
//! loudly: `load` degrades to `None` and `save` reports a plain success flag.
//! Every failure is logged here, where the most detail is available.
//!
//! ## Endpoints
//!
//! - `GET  {store}/getDocumentContent?documentId=<id>`
//! - `POST {store}/updateDocumentContent` with `{documentId, content, userId}`

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{StoreError, StoreResult};
use crate::models::{DocumentId, StoredDocument};

const GET_PATH: &str = "getDocumentContent";
const UPDATE_PATH: &str = "updateDocumentContent";

/// Longest error body quoted in a log line
const MAX_ERROR_BODY: usize = 200;

/// Durable storage as seen by the persistence coordinator
pub trait DocumentStore: Send + Sync + 'static {
    /// Last saved content, or `None` when unknown or unreachable
    fn load(&self, document_id: &DocumentId) -> impl Future<Output = Option<String>> + Send;

    /// Write content; `false` only when the write may not have happened
    fn save(&self, document_id: &DocumentId, content: &str) -> impl Future<Output = bool> + Send;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateContentRequest<'a> {
    document_id: &'a str,
    content: &'a str,
    user_id: &'a str,
}

#[derive(Deserialize)]
struct UpdateContentResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct GetContentResponse {
    #[serde(default)]
    success: bool,
    document: Option<StoredDocument>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

/// HTTP client for the document store
#[derive(Debug, Clone)]
pub struct StoreGateway {
    client: reqwest::Client,
    base_url: Url,
    user_id: String,
}

impl StoreGateway {
    pub fn new(base_url: &str, user_id: impl Into<String>, timeout: Duration) -> StoreResult<Self> {
        // A trailing slash makes `join` append instead of replacing the last segment
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized).map_err(|e| StoreError::InvalidUrl {
            url: base_url.to_string(),
            details: e.to_string(),
        })?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("scribe-server/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url,
            user_id: user_id.into(),
        })
    }

    pub fn from_config(config: &Config) -> StoreResult<Self> {
        Self::new(
            &config.store_url,
            config.service_user_id.clone(),
            config.store_timeout(),
        )
    }

    fn endpoint(&self, path: &str) -> StoreResult<Url> {
        self.base_url.join(path).map_err(|e| StoreError::InvalidUrl {
            url: self.base_url.to_string(),
            details: e.to_string(),
        })
    }

    /// Fetch the full stored record
    pub async fn fetch(&self, document_id: &DocumentId) -> StoreResult<StoredDocument> {
        let url = self.endpoint(GET_PATH)?;
        let response = self
            .client
            .get(url)
            .query(&[("documentId", document_id.as_str())])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        check_status(document_id, status, &body)?;

        let parsed: GetContentResponse =
            serde_json::from_str(&body).map_err(|e| StoreError::Malformed {
                details: e.to_string(),
            })?;

        match parsed.document {
            Some(document) if parsed.success => Ok(document),
            Some(_) => Err(StoreError::Malformed {
                details: "success flag not set".to_string(),
            }),
            None => Err(StoreError::Malformed {
                details: "missing document".to_string(),
            }),
        }
    }

    /// Write content for a document
    pub async fn update(&self, document_id: &DocumentId, content: &str) -> StoreResult<()> {
        let url = self.endpoint(UPDATE_PATH)?;
        let request = UpdateContentRequest {
            document_id: document_id.as_str(),
            content,
            user_id: &self.user_id,
        };
        let response = self.client.post(url).json(&request).send().await?;

        let status = response.status();
        let body = response.text().await?;
        check_status(document_id, status, &body)?;

        let parsed: UpdateContentResponse =
            serde_json::from_str(&body).map_err(|e| StoreError::Malformed {
                details: e.to_string(),
            })?;

        if !parsed.success {
            return Err(StoreError::Malformed {
                details: "success flag not set".to_string(),
            });
        }

        if let Some(message) = parsed.message {
            debug!("Store accepted {}: {}", document_id, message);
        }
        Ok(())
    }
}

impl DocumentStore for StoreGateway {
    async fn load(&self, document_id: &DocumentId) -> Option<String> {
        match self.fetch(document_id).await {
            Ok(document) => {
                debug!(
                    "Loaded {} ({:?}, {} bytes)",
                    document_id,
                    document.title,
                    document.content.len()
                );
                Some(document.content)
            }
            Err(e) if e.is_not_found() => {
                debug!("No stored content for {}", document_id);
                None
            }
            Err(e) => {
                warn!("Failed to load {} from store: {}", document_id, e);
                None
            }
        }
    }

    async fn save(&self, document_id: &DocumentId, content: &str) -> bool {
        match self.update(document_id, content).await {
            Ok(()) => {
                info!("Saved {} ({} bytes)", document_id, content.len());
                true
            }
            Err(e) if e.is_not_found() => {
                // The store never created this id; retrying cannot help
                warn!(
                    "Store does not know {}, dropping write without retry",
                    document_id
                );
                true
            }
            Err(e) => {
                warn!("Failed to save {} to store: {}", document_id, e);
                false
            }
        }
    }
}

fn check_status(document_id: &DocumentId, status: StatusCode, body: &str) -> StoreResult<()> {
    if status == StatusCode::NOT_FOUND {
        return Err(StoreError::NotFound {
            document_id: document_id.to_string(),
        });
    }
    if !status.is_success() {
        return Err(StoreError::Status {
            status: status.as_u16(),
            message: error_message(status, body),
        });
    }
    Ok(())
}

fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorResponse>(body) {
        return parsed.error;
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("no response body")
            .to_string();
    }
    trimmed.chars().take(MAX_ERROR_BODY).collect()
}

/// In-process store for local development and tests
///
/// Unknown ids are created on first save, like the hosted store does for
/// documents that did not go through the normal creation flow.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: Mutex<HashMap<DocumentId, StoredDocument>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document
    pub fn insert(&self, document_id: &DocumentId, title: &str, content: &str) {
        let document = StoredDocument {
            id: document_id.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            updated_at: Some(Utc::now().timestamp_millis() as f64),
        };
        self.lock().insert(document_id.clone(), document);
    }

    /// Current record for a document
    pub fn get(&self, document_id: &DocumentId) -> Option<StoredDocument> {
        self.lock().get(document_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<DocumentId, StoredDocument>> {
        self.documents.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl DocumentStore for MemoryStore {
    async fn load(&self, document_id: &DocumentId) -> Option<String> {
        self.get(document_id).map(|document| document.content)
    }

    async fn save(&self, document_id: &DocumentId, content: &str) -> bool {
        let mut documents = self.lock();
        let now = Utc::now().timestamp_millis() as f64;
        documents
            .entry(document_id.clone())
            .and_modify(|document| {
                document.content = content.to_string();
                document.updated_at = Some(now);
            })
            .or_insert_with(|| StoredDocument {
                id: document_id.to_string(),
                title: "Untitled Document".to_string(),
                content: content.to_string(),
                updated_at: Some(now),
            });
        true
    }
}
