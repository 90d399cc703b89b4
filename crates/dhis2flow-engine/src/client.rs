//! Remote API capability
//!
//! Steps reach the remote service only through [`Client`]. Authentication,
//! connection pooling and wire decoding live in implementations; the engine
//! wraps whatever client it is given in a [`RateLimitedClient`] so the
//! aggregate request rate of a run stays within its budget.

use crate::executor::RateGate;
use crate::schema::RemoteVersion;
use crate::table::Table;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Unsupported endpoint: {0}")]
    Unsupported(String),

    #[error("No remote connection configured")]
    Offline,
}

impl ClientError {
    /// Whether the same request could succeed later
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Http { status, .. } => *status == 429 || *status >= 500,
            ClientError::Transport(_) | ClientError::Timeout(_) => true,
            ClientError::Decode(_) | ClientError::Unsupported(_) | ClientError::Offline => false,
        }
    }
}

/// One page request against an endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    /// Endpoint path relative to the API root, e.g. `analytics` or `tracker/events`
    pub endpoint: String,
    /// Query parameters; keys may repeat
    pub params: Vec<(String, String)>,
    pub version: RemoteVersion,
}

impl FetchRequest {
    pub fn new(endpoint: impl Into<String>, version: RemoteVersion) -> Self {
        Self {
            endpoint: endpoint.into(),
            params: Vec::new(),
            version,
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// First value of a parameter
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Records to send to an endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct PushRequest {
    pub endpoint: String,
    pub records: Table,
    pub params: Vec<(String, String)>,
    pub version: RemoteVersion,
}

impl PushRequest {
    pub fn new(endpoint: impl Into<String>, records: Table, version: RemoteVersion) -> Self {
        Self {
            endpoint: endpoint.into(),
            records,
            params: Vec::new(),
            version,
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Paging information returned alongside a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pager {
    pub page: u32,
    pub page_size: u32,
    #[serde(default)]
    pub page_count: Option<u32>,
    #[serde(default)]
    pub total: Option<u64>,
}

impl Pager {
    /// Whether another page exists, when the server says so
    pub fn has_next(&self) -> Option<bool> {
        self.page_count.map(|count| self.page < count)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub table: Table,
    pub pager: Option<Pager>,
}

impl Page {
    pub fn single(table: Table) -> Self {
        Self { table, pager: None }
    }
}

/// Import summary returned by a push
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushAck {
    pub status: String,
    pub imported: u64,
    pub updated: u64,
    pub ignored: u64,
    pub deleted: u64,
    #[serde(default)]
    pub conflicts: Vec<String>,
}

impl PushAck {
    pub fn is_error(&self) -> bool {
        self.status.eq_ignore_ascii_case("error")
    }
}

#[async_trait]
pub trait Client: Send + Sync {
    /// Fetch one page of records
    async fn fetch(&self, request: &FetchRequest) -> Result<Page, ClientError>;

    /// Send records to an endpoint
    async fn push(&self, request: &PushRequest) -> Result<PushAck, ClientError>;

    /// Server version; `Unknown` when it cannot be determined
    async fn version(&self) -> Result<RemoteVersion, ClientError> {
        Ok(RemoteVersion::Unknown)
    }
}

/// Routes every call of an inner client through a shared [`RateGate`]
pub struct RateLimitedClient {
    inner: Arc<dyn Client>,
    gate: Arc<RateGate>,
}

impl RateLimitedClient {
    pub fn new(inner: Arc<dyn Client>, gate: Arc<RateGate>) -> Self {
        Self { inner, gate }
    }
}

#[async_trait]
impl Client for RateLimitedClient {
    async fn fetch(&self, request: &FetchRequest) -> Result<Page, ClientError> {
        self.gate.acquire().await;
        self.inner.fetch(request).await
    }

    async fn push(&self, request: &PushRequest) -> Result<PushAck, ClientError> {
        self.gate.acquire().await;
        self.inner.push(request).await
    }

    async fn version(&self) -> Result<RemoteVersion, ClientError> {
        self.gate.acquire().await;
        self.inner.version().await
    }
}

/// Client for runs that must not touch the network
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineClient;

#[async_trait]
impl Client for OfflineClient {
    async fn fetch(&self, _request: &FetchRequest) -> Result<Page, ClientError> {
        Err(ClientError::Offline)
    }

    async fn push(&self, _request: &PushRequest) -> Result<PushAck, ClientError> {
        Err(ClientError::Offline)
    }
}
