//! Wire protocol for the submission builder's live QC channel.
//!
//! Inbound frames are JSON text messages discriminated by a `type` field:
//!
//! ```text
//! ┌──────────────────┬─────────────────────────────────────────────┐
//! │ type             │ fields                                      │
//! ├──────────────────┼─────────────────────────────────────────────┤
//! │ connected        │ —                                           │
//! │ subscribed       │ region                                      │
//! │ qc_status        │ id, status, profile?                        │
//! │ bulk_qc_summary  │ passed, failed, total, profile?             │
//! │ bulk_qc_error    │ message                                     │
//! └──────────────────┴─────────────────────────────────────────────┘
//! ```
//!
//! The only outbound frame is the subscription announcement:
//! `{"action":"subscribe","region":"FDA"}`.
//!
//! Any valid JSON object that does not match one of the five inbound shapes
//! parses to [`LiveEvent::Unknown`]; frames that are not JSON at all are a
//! per-message [`ProtocolError`]. Neither may abort the connection.

use serde::{Deserialize, Serialize};

use crate::tree::NodeId;

/// Regulatory region: one logical partition of the document hierarchy and
/// its validation rules. Selecting a region decides the folder set, the
/// default validation profile, and the live channel subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Region {
    Fda,
    Ema,
    Pmda,
}

impl Region {
    /// Top-level folder names shown for this region, in display order.
    pub fn folders(&self) -> &'static [&'static str] {
        match self {
            Region::Fda | Region::Ema => &["m1", "m2", "m3", "m4", "m5"],
            Region::Pmda => &["m1", "m2", "m3", "m4", "m5", "jp-annex"],
        }
    }

    /// Validation profile applied to documents that arrive without one.
    pub fn default_profile(&self) -> &'static str {
        match self {
            Region::Fda => "FDA_eCTD",
            Region::Ema => "EMA_eCTD",
            Region::Pmda => "PMDA_eCTD",
        }
    }

    /// Wire/query-string name ("FDA", "EMA", "PMDA").
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Fda => "FDA",
            Region::Ema => "EMA",
            Region::Pmda => "PMDA",
        }
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// QC validation outcome attached to a leaf document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QcStatus {
    Unvalidated,
    Passed,
    Failed,
}

impl std::fmt::Display for QcStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QcStatus::Unvalidated => f.write_str("unvalidated"),
            QcStatus::Passed => f.write_str("passed"),
            QcStatus::Failed => f.write_str("failed"),
        }
    }
}

/// Inbound live event, one variant per wire shape.
///
/// The enum is closed: routing matches exhaustively, so adding a kind forces
/// every dispatch site to handle it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveEvent {
    /// Handshake completed; the channel is ready.
    #[serde(rename = "connected")]
    ConnectionEstablished,
    /// Server confirmed the region subscription.
    #[serde(rename = "subscribed")]
    SubscriptionAcknowledged { region: Region },
    /// One document's QC outcome changed.
    QcStatus {
        id: NodeId,
        status: QcStatus,
        #[serde(default)]
        profile: Option<String>,
    },
    /// A bulk QC run finished; per-node detail must be refetched.
    BulkQcSummary {
        passed: u32,
        failed: u32,
        total: u32,
        #[serde(default)]
        profile: Option<String>,
    },
    /// A bulk QC run was rejected outright.
    BulkQcError { message: String },
    /// Valid JSON, unrecognized shape. Dropped by the router.
    #[serde(skip)]
    Unknown { kind: String },
}

impl LiveEvent {
    /// Parse an inbound text frame.
    ///
    /// A frame that is valid JSON but does not match any known shape comes
    /// back as [`LiveEvent::Unknown`]; only non-JSON input is an error.
    pub fn parse(raw: &str) -> Result<LiveEvent, ProtocolError> {
        let value: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| ProtocolError::Decode(e.to_string()))?;

        match serde_json::from_value::<LiveEvent>(value.clone()) {
            Ok(event) => Ok(event),
            Err(_) => {
                let kind = value
                    .get("type")
                    .and_then(|t| t.as_str())
                    .unwrap_or("")
                    .to_string();
                Ok(LiveEvent::Unknown { kind })
            }
        }
    }
}

/// Outbound subscription announcement.
#[derive(Debug, Clone, Serialize)]
pub struct SubscribeRequest {
    pub action: &'static str,
    pub region: Region,
}

impl SubscribeRequest {
    pub fn new(region: Region) -> Self {
        Self {
            action: "subscribe",
            region,
        }
    }

    /// Serialize to the JSON text put on the wire.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }
}

/// Protocol errors. All are per-message; none terminate the channel.
#[derive(Debug, Clone)]
pub enum ProtocolError {
    Decode(String),
    Encode(String),
    Send(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Decode(e) => write!(f, "Frame decode error: {e}"),
            Self::Encode(e) => write!(f, "Frame encode error: {e}"),
            Self::Send(e) => write!(f, "Frame send error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}
