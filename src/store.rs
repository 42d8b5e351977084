//! Canvas persistence: wire types, the HTTP client, and an in-memory store.
//!
//! A canvas is stored as a record whose `script` field holds the encoded document. The
//! backend keeps no history; every save overwrites the script (last write wins).

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::codec::EMPTY_DOCUMENT;
use crate::error::NetworkError;

/// A stored canvas as returned by `GET /canvas/{owner}/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasRecord {
    pub id: String,
    pub owner: String,
    pub name: String,
    pub script: String,
    #[serde(default)]
    pub chats: Vec<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Listing entry without the script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasSummary {
    pub id: String,
    pub owner: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&CanvasRecord> for CanvasSummary {
    fn from(record: &CanvasRecord) -> Self {
        CanvasSummary {
            id: record.id.clone(),
            owner: record.owner.clone(),
            name: record.name.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanvasResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canvas: Option<CanvasRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanvasListResponse {
    pub success: bool,
    #[serde(default)]
    pub canvases: Vec<CanvasSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveScriptRequest {
    pub script: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveScriptResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCanvasRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Where canvas scripts are read from and written to.
pub trait CanvasStore: Send + Sync {
    fn load(
        &self,
        owner: &str,
        canvas_id: &str,
    ) -> impl Future<Output = Result<CanvasRecord, NetworkError>> + Send;

    /// Overwrites the script and returns the backend's new `updatedAt`.
    fn save_script(
        &self,
        owner: &str,
        canvas_id: &str,
        script: &str,
    ) -> impl Future<Output = Result<DateTime<Utc>, NetworkError>> + Send;
}

/// Client for the canvas REST backend.
#[derive(Debug, Clone)]
pub struct HttpCanvasStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCanvasStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        HttpCanvasStore::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        HttpCanvasStore {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, segments: &[&str]) -> String {
        let mut url = self.base_url.clone();
        for segment in segments {
            url.push('/');
            url.push_str(&urlencoding::encode(segment));
        }
        url
    }

    /// Creates a canvas holding the empty document.
    pub async fn create(&self, owner: &str, name: &str) -> Result<CanvasRecord, NetworkError> {
        let response = self
            .client
            .post(self.url(&["canvas", owner]))
            .json(&CreateCanvasRequest {
                name: name.to_string(),
            })
            .send()
            .await?;
        let body: CanvasResponse = read_json(response).await?;
        match (body.success, body.canvas) {
            (true, Some(canvas)) => Ok(canvas),
            (_, _) => Err(rejected(body.error)),
        }
    }

    pub async fn list(&self, owner: &str) -> Result<Vec<CanvasSummary>, NetworkError> {
        let response = self.client.get(self.url(&["canvas", owner])).send().await?;
        let body: CanvasListResponse = read_json(response).await?;
        if !body.success {
            return Err(rejected(body.error));
        }
        Ok(body.canvases)
    }

    pub async fn delete(&self, owner: &str, canvas_id: &str) -> Result<(), NetworkError> {
        let response = self
            .client
            .delete(self.url(&["canvas", owner, canvas_id]))
            .send()
            .await?;
        let body: StatusResponse = read_json(response).await?;
        if !body.success {
            return Err(rejected(body.error));
        }
        Ok(())
    }
}

impl CanvasStore for HttpCanvasStore {
    async fn load(&self, owner: &str, canvas_id: &str) -> Result<CanvasRecord, NetworkError> {
        debug!("GET canvas {}/{}", owner, canvas_id);
        let response = self
            .client
            .get(self.url(&["canvas", owner, canvas_id]))
            .send()
            .await?;
        let body: CanvasResponse = read_json(response).await?;
        match (body.success, body.canvas) {
            (true, Some(canvas)) => Ok(canvas),
            (_, _) => Err(rejected(body.error)),
        }
    }

    async fn save_script(
        &self,
        owner: &str,
        canvas_id: &str,
        script: &str,
    ) -> Result<DateTime<Utc>, NetworkError> {
        debug!("PATCH script of canvas {}/{} ({} bytes)", owner, canvas_id, script.len());
        let response = self
            .client
            .patch(self.url(&["canvas", owner, canvas_id, "script"]))
            .json(&SaveScriptRequest {
                script: script.to_string(),
            })
            .send()
            .await?;
        let body: SaveScriptResponse = read_json(response).await?;
        match (body.success, body.updated_at) {
            (true, Some(updated_at)) => Ok(updated_at),
            (true, None) => Err(NetworkError::InvalidResponse(
                "save succeeded without updatedAt".to_string(),
            )),
            (false, _) => Err(rejected(body.error)),
        }
    }
}

/// Decodes a JSON body. Undecodable error pages are reported by their status code.
async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, NetworkError> {
    let status = response.status();
    let bytes = response.bytes().await?;
    match serde_json::from_slice::<T>(&bytes) {
        Ok(body) => Ok(body),
        Err(_) if !status.is_success() => Err(NetworkError::Status(status.as_u16())),
        Err(err) => Err(NetworkError::InvalidResponse(err.to_string())),
    }
}

fn rejected(error: Option<String>) -> NetworkError {
    NetworkError::Rejected(error.unwrap_or_else(|| "unknown error".to_string()))
}

/// Canvases kept in process memory. Clones share the same storage.
///
/// Backs the development server and the tests. Saves can be made to fail on demand, and every
/// accepted script is logged so callers can count writes.
#[derive(Debug, Clone, Default)]
pub struct MemoryCanvasStore {
    inner: Arc<Mutex<MemoryInner>>,
    failing: Arc<AtomicBool>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    canvases: HashMap<(String, String), CanvasRecord>,
    saved: Vec<String>,
}

impl MemoryCanvasStore {
    pub fn new() -> Self {
        MemoryCanvasStore::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn create(&self, owner: &str, name: &str) -> CanvasRecord {
        self.insert(owner, name, EMPTY_DOCUMENT)
    }

    /// Adds a canvas with the given script, as if it had been saved earlier.
    pub fn insert(&self, owner: &str, name: &str, script: &str) -> CanvasRecord {
        let now = Utc::now();
        let record = CanvasRecord {
            id: Uuid::new_v4().to_string(),
            owner: owner.to_string(),
            name: name.to_string(),
            script: script.to_string(),
            chats: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.lock()
            .canvases
            .insert((owner.to_string(), record.id.clone()), record.clone());
        info!("created canvas {} ({}) for {}", record.id, name, owner);
        record
    }

    pub fn get(&self, owner: &str, canvas_id: &str) -> Option<CanvasRecord> {
        self.lock()
            .canvases
            .get(&(owner.to_string(), canvas_id.to_string()))
            .cloned()
    }

    /// Canvases of `owner`, most recently updated first.
    pub fn list(&self, owner: &str) -> Vec<CanvasSummary> {
        let inner = self.lock();
        let mut canvases: Vec<CanvasSummary> = inner
            .canvases
            .values()
            .filter(|c| c.owner == owner)
            .map(CanvasSummary::from)
            .collect();
        canvases.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        canvases
    }

    pub fn delete(&self, owner: &str, canvas_id: &str) -> bool {
        self.lock()
            .canvases
            .remove(&(owner.to_string(), canvas_id.to_string()))
            .is_some()
    }

    /// Overwrites the script. Returns `None` for an unknown canvas.
    pub fn put_script(&self, owner: &str, canvas_id: &str, script: &str) -> Option<DateTime<Utc>> {
        let mut inner = self.lock();
        let record = inner
            .canvases
            .get_mut(&(owner.to_string(), canvas_id.to_string()))?;
        let now = Utc::now();
        record.script = script.to_string();
        record.updated_at = now;
        inner.saved.push(script.to_string());
        Some(now)
    }

    /// Makes every following save fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Every script accepted by a save, oldest first.
    pub fn saved_scripts(&self) -> Vec<String> {
        self.lock().saved.clone()
    }
}

impl CanvasStore for MemoryCanvasStore {
    async fn load(&self, owner: &str, canvas_id: &str) -> Result<CanvasRecord, NetworkError> {
        self.get(owner, canvas_id)
            .ok_or_else(|| NetworkError::Rejected(format!("canvas {} not found", canvas_id)))
    }

    async fn save_script(
        &self,
        owner: &str,
        canvas_id: &str,
        script: &str,
    ) -> Result<DateTime<Utc>, NetworkError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NetworkError::Status(503));
        }
        self.put_script(owner, canvas_id, script)
            .ok_or_else(|| NetworkError::Rejected(format!("canvas {} not found", canvas_id)))
    }
}
