//! Opt-in demo and test fixtures.
//!
//! Canned document sets plus an in-memory [`FixtureApi`] that records every
//! call. This module is the only place fabricated data lives: the HTTP
//! collaborators in [`crate::api`] report failures as errors and never fall
//! back to fixtures on their own. Demo mode is a deliberate wiring choice at
//! construction time, not a silent recovery path.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::api::{DocumentRecord, FetchError, SubmissionApi};
use crate::protocol::{QcStatus, Region};
use crate::tree::{NodeId, OrderedDoc};

/// A small, realistic document set for a region.
pub fn sample_documents(region: Region) -> Vec<DocumentRecord> {
    let doc = |id: NodeId, title: &str, module: &str| DocumentRecord {
        id,
        title: title.to_string(),
        module: module.to_string(),
        qc_status: None,
    };

    match region {
        Region::Fda => vec![
            doc(1, "Cover Letter", "m1.1"),
            doc(2, "Quality Overall Summary", "m2.3"),
            doc(3, "Drug Substance Specification", "m3.2.S"),
            doc(42, "Drug Product Stability Report", "m3.2.P"),
        ],
        Region::Ema => vec![
            doc(11, "EU Application Form", "m1.2"),
            doc(12, "Nonclinical Overview", "m2.4"),
            doc(13, "Clinical Study Report 001", "m5.3"),
        ],
        Region::Pmda => vec![
            doc(21, "JP Application Form", "m1.1"),
            doc(22, "GMP Compliance Statement", "m3.2.A"),
            doc(23, "CTD Gaiyo Summary", "jp-annex.1"),
        ],
    }
}

/// In-memory stand-in for the three REST collaborators.
///
/// Records call counts and payloads; `fail_next_*` switches make the next
/// matching request fail once, for exercising error paths.
pub struct FixtureApi {
    docs: Mutex<Vec<DocumentRecord>>,
    list_calls: AtomicUsize,
    approve_calls: AtomicUsize,
    order_calls: AtomicUsize,
    approved: Mutex<Vec<Vec<NodeId>>>,
    saved_orders: Mutex<Vec<Vec<OrderedDoc>>>,
    fail_next_listing: AtomicBool,
    fail_next_approve: AtomicBool,
    fail_next_order: AtomicBool,
}

impl FixtureApi {
    pub fn new(docs: Vec<DocumentRecord>) -> Self {
        Self {
            docs: Mutex::new(docs),
            list_calls: AtomicUsize::new(0),
            approve_calls: AtomicUsize::new(0),
            order_calls: AtomicUsize::new(0),
            approved: Mutex::new(Vec::new()),
            saved_orders: Mutex::new(Vec::new()),
            fail_next_listing: AtomicBool::new(false),
            fail_next_approve: AtomicBool::new(false),
            fail_next_order: AtomicBool::new(false),
        }
    }

    /// Fixture API pre-seeded with [`sample_documents`] for the region.
    pub fn for_region(region: Region) -> Self {
        Self::new(sample_documents(region))
    }

    /// Replace the canned document set (takes effect on the next listing).
    pub fn set_documents(&self, docs: Vec<DocumentRecord>) {
        *self.docs.lock().unwrap() = docs;
    }

    pub fn documents(&self) -> Vec<DocumentRecord> {
        self.docs.lock().unwrap().clone()
    }

    /// Mark one document's canned QC status, as the server would after a
    /// bulk run.
    pub fn set_qc_status(&self, id: NodeId, status: QcStatus) {
        let mut docs = self.docs.lock().unwrap();
        if let Some(doc) = docs.iter_mut().find(|d| d.id == id) {
            doc.qc_status = Some(status);
        }
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn approve_calls(&self) -> usize {
        self.approve_calls.load(Ordering::SeqCst)
    }

    pub fn order_calls(&self) -> usize {
        self.order_calls.load(Ordering::SeqCst)
    }

    /// Every bulk-approve payload received, in order.
    pub fn approved(&self) -> Vec<Vec<NodeId>> {
        self.approved.lock().unwrap().clone()
    }

    /// Every order payload received, in order.
    pub fn saved_orders(&self) -> Vec<Vec<OrderedDoc>> {
        self.saved_orders.lock().unwrap().clone()
    }

    pub fn fail_next_listing(&self) {
        self.fail_next_listing.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_approve(&self) {
        self.fail_next_approve.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_order(&self) {
        self.fail_next_order.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl SubmissionApi for FixtureApi {
    async fn list_documents(&self, _region: Region) -> Result<Vec<DocumentRecord>, FetchError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_next_listing.swap(false, Ordering::SeqCst) {
            return Err(FetchError::Status(503));
        }
        Ok(self.documents())
    }

    async fn bulk_approve(&self, ids: &[NodeId]) -> Result<(), FetchError> {
        self.approve_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_next_approve.swap(false, Ordering::SeqCst) {
            return Err(FetchError::Status(422));
        }
        self.approved.lock().unwrap().push(ids.to_vec());
        Ok(())
    }

    async fn save_order(&self, docs: &[OrderedDoc]) -> Result<(), FetchError> {
        self.order_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_next_order.swap(false, Ordering::SeqCst) {
            return Err(FetchError::Status(500));
        }
        self.saved_orders.lock().unwrap().push(docs.to_vec());
        Ok(())
    }
}
