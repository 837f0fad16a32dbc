//! External collaborator contracts for the submission builder.
//!
//! Three REST endpoints back the builder: the document listing, bulk
//! approval, and order persistence. They are modeled as one [`SubmissionApi`]
//! trait so the session and router can run against an in-memory substitute
//! (see [`crate::fixtures`]) in tests and demo mode.
//!
//! Every request returns `Result<_, FetchError>`. A failed request is the
//! caller's to surface and re-trigger; it is never retried automatically and
//! never silently replaced with canned data.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::protocol::{QcStatus, Region};
use crate::tree::{NodeId, OrderedDoc};

/// One document as returned by the listing collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: NodeId,
    pub title: String,
    #[serde(default)]
    pub module: String,
    /// Server-side QC outcome, when the listing already knows one.
    #[serde(default)]
    pub qc_status: Option<QcStatus>,
}

/// Collaborator request failure.
///
/// Distinct from transport failure on the live channel: the channel is
/// auto-retried with backoff, a rejected request is not.
#[derive(Debug)]
pub enum FetchError {
    /// The request never completed (DNS, connect, timeout).
    Transport(String),
    /// The collaborator answered with a non-success status.
    Status(u16),
    /// The response body did not match the expected shape.
    Decode(String),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "Request failed: {e}"),
            Self::Status(code) => write!(f, "Request rejected with status {code}"),
            Self::Decode(e) => write!(f, "Response decode error: {e}"),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            FetchError::Decode(e.to_string())
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

/// The builder's three external collaborators.
#[async_trait]
pub trait SubmissionApi: Send + Sync {
    /// Fetch the flat document list for a region.
    async fn list_documents(&self, region: Region) -> Result<Vec<DocumentRecord>, FetchError>;

    /// Submit a bulk approve + QC request. Fire-and-forget: per-node and
    /// summary outcomes arrive later on the live channel.
    async fn bulk_approve(&self, ids: &[NodeId]) -> Result<(), FetchError>;

    /// Persist the current tree order.
    async fn save_order(&self, docs: &[OrderedDoc]) -> Result<(), FetchError>;
}

/// HTTP implementation over reqwest.
pub struct HttpSubmissionApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSubmissionApi {
    /// Create a client for the given base URL (for example
    /// `https://trialsage.example.com`).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: trim_trailing_slash(base_url.into()),
        }
    }

    /// Create with a preconfigured reqwest client (custom timeouts, headers).
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: trim_trailing_slash(base_url.into()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn check(response: reqwest::Response) -> Result<reqwest::Response, FetchError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(FetchError::Status(response.status().as_u16()))
        }
    }
}

fn trim_trailing_slash(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}

#[async_trait]
impl SubmissionApi for HttpSubmissionApi {
    async fn list_documents(&self, region: Region) -> Result<Vec<DocumentRecord>, FetchError> {
        let url = format!("{}/api/documents", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("region", region.as_str())])
            .send()
            .await?;
        let docs = Self::check(response)?
            .json::<Vec<DocumentRecord>>()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;
        log::debug!("Listed {} documents for region {region}", docs.len());
        Ok(docs)
    }

    async fn bulk_approve(&self, ids: &[NodeId]) -> Result<(), FetchError> {
        let url = format!("{}/api/documents/bulk-approve", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "ids": ids }))
            .send()
            .await?;
        Self::check(response)?;
        log::info!("Dispatched bulk approve for {} documents", ids.len());
        Ok(())
    }

    async fn save_order(&self, docs: &[OrderedDoc]) -> Result<(), FetchError> {
        let url = format!("{}/api/documents/builder-order", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "docs": docs }))
            .send()
            .await?;
        Self::check(response)?;
        log::info!("Persisted order for {} documents", docs.len());
        Ok(())
    }
}
