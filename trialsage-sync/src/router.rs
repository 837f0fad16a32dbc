//! Event Router: folds inbound live events into the tree store.
//!
//! Dispatch is exhaustive over [`LiveEvent`], so a new event kind cannot be
//! silently ignored. Routing runs on the single session task; events are
//! applied strictly in arrival order and nothing else mutates the tree, so
//! no locking is needed.
//!
//! A `BulkQcSummary` carries no per-node detail, so it triggers exactly one
//! authoritative reload from the document-listing collaborator. Per-node
//! `QcStatus` events for nodes the tree no longer holds are benign (regions
//! and trees reload independently of the socket's lifetime) and are dropped
//! without complaint.

use std::time::Duration;

use crate::api::SubmissionApi;
use crate::protocol::{LiveEvent, QcStatus, Region};
use crate::tree::{NodeId, TreeStore};

/// Transient, user-facing outcome of routing one event. The UI renders
/// these as dismissible toasts or a passive status line; none are blocking.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// The live channel finished its handshake.
    Ready,
    /// The server confirmed the region subscription.
    Subscribed(Region),
    /// One document's QC outcome was merged into the tree.
    StatusChanged { id: NodeId, status: QcStatus },
    /// A bulk QC run finished and the tree was rebuilt.
    BulkCompleted {
        passed: u32,
        failed: u32,
        total: u32,
    },
    /// The server rejected a bulk QC run.
    BulkFailed(String),
    /// The post-summary reload failed; the tree keeps its previous state
    /// and the user must re-trigger the refresh.
    ReloadFailed(String),
    /// The live channel (re)connected and announced its region.
    ChannelOpen(Region),
    /// The live channel dropped; a reconnect is scheduled after `retry_in`
    /// (`None` once the connector has stopped for good).
    ChannelDown { retry_in: Option<Duration> },
}

/// Route one inbound event into the tree, reloading from the listing
/// collaborator when a bulk summary demands it.
///
/// Returns the notice to surface, if any. Never panics on unexpected input.
pub async fn route<S: SubmissionApi>(
    api: &S,
    tree: &mut TreeStore,
    region: Region,
    event: LiveEvent,
) -> Option<Notice> {
    match event {
        LiveEvent::ConnectionEstablished => {
            log::debug!("Live channel ready");
            Some(Notice::Ready)
        }

        LiveEvent::SubscriptionAcknowledged { region } => {
            log::info!("Subscription confirmed for region {region}");
            Some(Notice::Subscribed(region))
        }

        LiveEvent::QcStatus {
            id,
            status,
            profile,
        } => {
            if tree.merge_status(id, status, profile.as_deref()) {
                Some(Notice::StatusChanged { id, status })
            } else {
                log::debug!("QC status for unknown node {id}; ignoring");
                None
            }
        }

        LiveEvent::BulkQcSummary {
            passed,
            failed,
            total,
            profile,
        } => {
            log::info!(
                "Bulk QC finished ({passed} passed, {failed} failed of {total}, profile {})",
                profile.as_deref().unwrap_or("default")
            );
            match api.list_documents(region).await {
                Ok(docs) => {
                    tree.load(&docs, region);
                    Some(Notice::BulkCompleted {
                        passed,
                        failed,
                        total,
                    })
                }
                Err(e) => {
                    log::error!("Post-summary reload failed: {e}");
                    Some(Notice::ReloadFailed(e.to_string()))
                }
            }
        }

        LiveEvent::BulkQcError { message } => {
            log::warn!("Bulk QC rejected: {message}");
            Some(Notice::BulkFailed(message))
        }

        LiveEvent::Unknown { kind } => {
            log::warn!("Dropping unrecognized event kind {kind:?}");
            None
        }
    }
}
