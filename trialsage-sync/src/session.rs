//! Owning facade for the submission builder's client core.
//!
//! [`SyncSession`] ties the five pieces together — tree store, selection,
//! live channel connector, subscription, and router — behind one object with
//! an explicit lifecycle (`new` … `teardown`). The UI layer holds the
//! session, forwards user intents (region select, drag move, selection
//! toggle, save order, bulk approve), and pumps [`ChannelEvent`]s from the
//! connector back through [`SyncSession::handle_event`].
//!
//! All tree and selection mutation happens on the task that calls into the
//! session, one event at a time; there is no concurrent mutation to guard
//! against, only ordering.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::api::{FetchError, SubmissionApi};
use crate::bulk::BulkCoordinator;
use crate::connector::{
    BackoffPolicy, ChannelConnector, ChannelEvent, ConnectorConfig, ConnectorState,
};
use crate::protocol::Region;
use crate::router::{self, Notice};
use crate::tree::{NodeId, TreeStore};

/// One user's live view of a region's submission hierarchy.
pub struct SyncSession<S: SubmissionApi> {
    api: Arc<S>,
    region: Region,
    tree: TreeStore,
    bulk: BulkCoordinator,
    connector: Option<ChannelConnector>,
}

impl<S: SubmissionApi> SyncSession<S> {
    /// Create a session for `region`. The tree is empty until
    /// [`load`](Self::load) runs.
    pub fn new(api: Arc<S>, region: Region) -> Self {
        Self {
            api,
            region,
            tree: TreeStore::new(),
            bulk: BulkCoordinator::new(),
            connector: None,
        }
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn tree(&self) -> &TreeStore {
        &self.tree
    }

    /// Currently selected document ids, ascending.
    pub fn selection(&self) -> Vec<NodeId> {
        self.bulk.selected()
    }

    /// Fetch the document list and rebuild the tree. Returns the document
    /// count. Clears the selection: it does not survive a reload.
    pub async fn load(&mut self) -> Result<usize, FetchError> {
        let docs = self.api.list_documents(self.region).await?;
        self.tree.load(&docs, self.region);
        self.bulk.clear();
        log::info!("Loaded {} documents for region {}", docs.len(), self.region);
        Ok(docs.len())
    }

    /// Open the live QC channel with default backoff.
    pub fn connect(&mut self, url: impl Into<String>) {
        self.connect_with(url, BackoffPolicy::default());
    }

    /// Open the live QC channel with an explicit backoff policy. Any
    /// previous connector is shut down first.
    pub fn connect_with(&mut self, url: impl Into<String>, backoff: BackoffPolicy) {
        if let Some(old) = self.connector.take() {
            old.shutdown();
        }
        let config = ConnectorConfig {
            url: url.into(),
            region: self.region,
            backoff,
        };
        self.connector = Some(ChannelConnector::spawn(config));
    }

    /// Take the connector's event receiver for the caller's pump loop.
    /// `None` before [`connect`](Self::connect) or on a second take.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<ChannelEvent>> {
        self.connector.as_mut().and_then(|c| c.take_events())
    }

    /// Switch regions: re-announces the subscription on the live connection
    /// (no reconnect) and rebuilds the tree from the new region's listing.
    /// If the reload fails, the switch rolls back so the session keeps
    /// matching the tree it still shows.
    pub async fn select_region(&mut self, region: Region) -> Result<usize, FetchError> {
        let previous = self.region;
        self.region = region;
        if let Some(connector) = &self.connector {
            connector.set_region(region);
        }
        match self.load().await {
            Ok(count) => Ok(count),
            Err(e) => {
                self.region = previous;
                if let Some(connector) = &self.connector {
                    connector.set_region(previous);
                }
                Err(e)
            }
        }
    }

    /// Apply a drag move. Illegal moves are rejected as a no-op.
    pub fn move_node(&mut self, id: NodeId, new_parent: NodeId, index: usize) -> bool {
        self.tree.move_node(id, new_parent, index)
    }

    /// Toggle a document in the bulk selection. Containers and unknown ids
    /// are not selectable; returns the node's new selection state otherwise.
    pub fn toggle_selection(&mut self, id: NodeId) -> Option<bool> {
        match self.tree.node(id) {
            Some(node) if !node.is_container() => Some(self.bulk.toggle(id)),
            _ => None,
        }
    }

    /// Persist the current tree order. Returns the document count sent.
    pub async fn save_order(&self) -> Result<usize, FetchError> {
        let docs = self.tree.to_ordered_list();
        self.api.save_order(&docs).await?;
        Ok(docs.len())
    }

    /// Dispatch a bulk approve + QC for the selection (no-op when empty).
    /// Outcomes arrive later on the live channel.
    pub async fn bulk_approve(&mut self) -> Result<Option<usize>, FetchError> {
        self.bulk.dispatch_bulk_approve(self.api.as_ref()).await
    }

    /// Fold one channel event into the session. Events must be fed in
    /// arrival order.
    pub async fn handle_event(&mut self, event: ChannelEvent) -> Option<Notice> {
        match event {
            ChannelEvent::Opened { region } => Some(Notice::ChannelOpen(region)),
            ChannelEvent::Closed { retry_in } => Some(Notice::ChannelDown { retry_in }),
            ChannelEvent::Event(event) => {
                let notice =
                    router::route(self.api.as_ref(), &mut self.tree, self.region, event).await;
                if matches!(notice, Some(Notice::BulkCompleted { .. })) {
                    // The reload rebuilt the tree; the selection dies with it.
                    self.bulk.clear();
                }
                notice
            }
        }
    }

    /// Live channel state, `Stopped` when no connector is running.
    pub async fn connection_state(&self) -> ConnectorState {
        match &self.connector {
            Some(connector) => connector.state().await,
            None => ConnectorState::Stopped,
        }
    }

    /// Shut the session down: closes the channel, cancels any pending
    /// reconnect, and drops the selection. Idempotent; late events already
    /// pulled from the old receiver may still be fed to `handle_event` and
    /// remain harmless.
    pub fn teardown(&mut self) {
        if let Some(connector) = self.connector.take() {
            connector.shutdown();
        }
        self.bulk.clear();
    }
}
