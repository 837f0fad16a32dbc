//! # trialsage-sync — live-status tree synchronizer for the submission builder
//!
//! Client core for TrialSage's submission builder: a drag-and-drop document
//! hierarchy whose per-node QC outcomes stream in over a WebSocket that must
//! survive transport churn.
//!
//! ## Architecture
//!
//! ```text
//! user intents                     live QC channel (WebSocket)
//! (drag / select / approve)                  │
//!         │                        ┌─────────┴──────────┐
//!         ▼                        │  ChannelConnector  │  backoff + retry
//! ┌───────────────┐                │  + Subscription    │  resubscribe on
//! │  SyncSession  │ ◄── events ──  │    Manager         │  every open
//! └───────┬───────┘                └────────────────────┘
//!         │ routes (in arrival order)
//!         ▼
//! ┌───────────────┐   bulk summary   ┌────────────────────┐
//! │  Event Router │ ── reload ─────► │  SubmissionApi     │  REST
//! └───────┬───────┘                  │  (list / approve / │  collaborators
//!         ▼                          │   save order)      │
//! ┌───────────────┐                  └────────────────────┘
//! │   TreeStore   │  rooted, acyclic, single-owner
//! └───────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] — JSON wire shapes: inbound [`LiveEvent`]s, the subscribe
//!   request, regions, QC statuses
//! - [`connector`] — reconnecting WebSocket with bounded exponential backoff
//! - [`subscribe`] — region subscription announce / re-announce
//! - [`router`] — exhaustive event dispatch into the tree
//! - [`tree`] — the document hierarchy and its invariants
//! - [`bulk`] — selection set + fire-and-forget bulk approve
//! - [`api`] — REST collaborator contracts and the reqwest client
//! - [`fixtures`] — opt-in canned data and the in-memory test collaborator
//! - [`session`] — owning facade with explicit lifecycle
//!
//! Transport failures are retried forever behind the scenes; collaborator
//! request failures surface once as a `FetchError` and are the user's to
//! re-trigger. The tree is never left structurally invalid, whatever arrives.

pub mod api;
pub mod bulk;
pub mod connector;
pub mod fixtures;
pub mod protocol;
pub mod router;
pub mod session;
pub mod subscribe;
pub mod tree;

// Re-exports for convenience
pub use api::{DocumentRecord, FetchError, HttpSubmissionApi, SubmissionApi};
pub use bulk::BulkCoordinator;
pub use connector::{
    BackoffPolicy, ChannelConnector, ChannelEvent, ConnectorConfig, ConnectorFsm, ConnectorState,
};
pub use protocol::{LiveEvent, ProtocolError, QcStatus, Region, SubscribeRequest};
pub use router::{route, Notice};
pub use session::SyncSession;
pub use subscribe::SubscriptionManager;
pub use tree::{DocNode, LeafStatus, NodeId, NodeKind, OrderedDoc, TreeStore, ROOT_ID};
