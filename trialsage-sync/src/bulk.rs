//! Bulk Action Coordinator: tracks the user's selection and issues one
//! bulk approve + QC request.
//!
//! The coordinator never waits for the outcome: the request is
//! fire-and-forget, the selection clears the moment it is dispatched, and
//! per-node and summary results arrive later on the live channel for the
//! router to reconcile.

use std::collections::BTreeSet;

use crate::api::{FetchError, SubmissionApi};
use crate::tree::NodeId;

/// Selection set plus one-shot dispatch. Single-owner: only the session
/// task touches it.
#[derive(Debug, Default)]
pub struct BulkCoordinator {
    selection: BTreeSet<NodeId>,
}

impl BulkCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle one document in or out of the selection. Returns whether the
    /// node is selected afterwards.
    pub fn toggle(&mut self, id: NodeId) -> bool {
        if self.selection.remove(&id) {
            false
        } else {
            self.selection.insert(id);
            true
        }
    }

    pub fn is_selected(&self, id: NodeId) -> bool {
        self.selection.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.selection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selection.is_empty()
    }

    /// Selected ids in ascending order.
    pub fn selected(&self) -> Vec<NodeId> {
        self.selection.iter().copied().collect()
    }

    /// Drop the whole selection (region switch, hierarchy reload).
    pub fn clear(&mut self) {
        self.selection.clear();
    }

    /// Dispatch one bulk approve request for the current selection.
    ///
    /// A no-op returning `Ok(None)` when nothing is selected. Otherwise the
    /// selection clears immediately, before the collaborator answers, and
    /// the number of dispatched ids comes back as `Ok(Some(n))`. A rejected
    /// request surfaces as `Err` for the UI to show; the selection stays
    /// cleared either way, since the server may have accepted part of the
    /// work before failing.
    pub async fn dispatch_bulk_approve<S: SubmissionApi>(
        &mut self,
        api: &S,
    ) -> Result<Option<usize>, FetchError> {
        if self.selection.is_empty() {
            return Ok(None);
        }
        let ids: Vec<NodeId> = std::mem::take(&mut self.selection).into_iter().collect();
        api.bulk_approve(&ids).await?;
        Ok(Some(ids.len()))
    }
}
