//! Tree State Store: the single source of truth for the submission
//! hierarchy.
//!
//! All structural edits (drag moves) and status merges funnel through
//! [`TreeStore`]; nothing else mutates the hierarchy. Two invariants hold
//! after every operation:
//!
//! - the structure is a rooted tree (no node is ever its own ancestor);
//! - every non-root node's parent resolves to an existing container.
//!
//! The store is rebuilt wholesale by [`TreeStore::load`] on initial load and
//! after every bulk QC run; per-node merges in between are best effort.

use std::collections::HashMap;

use serde::Serialize;

use crate::api::DocumentRecord;
use crate::protocol::{QcStatus, Region};

/// Server-assigned document identifier. Synthetic folder ids are allocated
/// locally above the largest document id.
pub type NodeId = u64;

/// Local root sentinel. Never sent to a collaborator.
pub const ROOT_ID: NodeId = 0;

/// QC metadata carried by leaf documents only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafStatus {
    pub qc_status: QcStatus,
    pub profile: String,
}

/// Folder or leaf document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Container,
    Leaf(LeafStatus),
}

/// One entry in the submission hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocNode {
    pub id: NodeId,
    pub parent: NodeId,
    pub label: String,
    pub kind: NodeKind,
}

impl DocNode {
    pub fn is_container(&self) -> bool {
        matches!(self.kind, NodeKind::Container)
    }

    /// Leaf status metadata, if this is a document.
    pub fn status(&self) -> Option<&LeafStatus> {
        match &self.kind {
            NodeKind::Leaf(status) => Some(status),
            NodeKind::Container => None,
        }
    }
}

/// Flat ordering entry sent to the order-persistence collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderedDoc {
    pub id: NodeId,
    pub module: String,
    pub order: u32,
}

/// The node hierarchy plus sibling ordering.
#[derive(Debug, Default)]
pub struct TreeStore {
    nodes: HashMap<NodeId, DocNode>,
    /// Ordered child lists, keyed by container id.
    children: HashMap<NodeId, Vec<NodeId>>,
}

impl TreeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the entire tree from a flat document list.
    ///
    /// Top-level folders come from the region; each document lands in the
    /// first folder whose name prefixes its `module` field, defaulting to the
    /// first folder. The previous tree is discarded wholesale, so local edits
    /// made since the last load do not survive. Given identical inputs the
    /// rebuilt tree is structurally identical (folder ids are derived from
    /// the largest document id). Records carrying the root sentinel id or a
    /// duplicate id are skipped with a warning.
    pub fn load(&mut self, docs: &[DocumentRecord], region: Region) {
        self.nodes.clear();
        self.children.clear();

        self.insert_node(DocNode {
            id: ROOT_ID,
            parent: ROOT_ID,
            label: "root".to_string(),
            kind: NodeKind::Container,
        });

        let folders = region.folders();
        let folder_base = docs.iter().map(|d| d.id).max().unwrap_or(0) + 1;
        let folder_ids: Vec<NodeId> = (0..folders.len())
            .map(|i| folder_base + i as NodeId)
            .collect();

        for (name, id) in folders.iter().zip(&folder_ids) {
            self.insert_node(DocNode {
                id: *id,
                parent: ROOT_ID,
                label: (*name).to_string(),
                kind: NodeKind::Container,
            });
            self.children.entry(ROOT_ID).or_default().push(*id);
        }

        for doc in docs {
            // The listing is an external collaborator; its ids are not
            // trusted. The root sentinel and duplicates would both break
            // the tree structure.
            if doc.id == ROOT_ID || self.nodes.contains_key(&doc.id) {
                log::warn!("Skipping listing record with conflicting id {}", doc.id);
                continue;
            }
            let slot = folders
                .iter()
                .position(|f| doc.module.starts_with(f))
                .unwrap_or(0);
            let parent = folder_ids[slot];

            self.insert_node(DocNode {
                id: doc.id,
                parent,
                label: doc.title.clone(),
                kind: NodeKind::Leaf(LeafStatus {
                    qc_status: doc.qc_status.unwrap_or(QcStatus::Unvalidated),
                    profile: region.default_profile().to_string(),
                }),
            });
            self.children.entry(parent).or_default().push(doc.id);
        }
    }

    /// Apply a drag move: re-parent `id` under `new_parent` at `index`
    /// (clamped to the sibling count).
    ///
    /// Illegal moves are rejected as a no-op and return `false`: unknown
    /// nodes, non-container targets, moves that would make a node its own
    /// descendant, and leaves dropped directly on the root (the root holds
    /// the region folder set only).
    pub fn move_node(&mut self, id: NodeId, new_parent: NodeId, index: usize) -> bool {
        if id == ROOT_ID || !self.nodes.contains_key(&id) {
            return false;
        }
        let Some(target) = self.nodes.get(&new_parent) else {
            return false;
        };
        if !target.is_container() {
            return false;
        }
        if new_parent == ROOT_ID && !self.nodes[&id].is_container() {
            return false;
        }
        if self.is_ancestor(id, new_parent) {
            return false;
        }

        let old_parent = self.nodes[&id].parent;
        if let Some(siblings) = self.children.get_mut(&old_parent) {
            siblings.retain(|c| *c != id);
        }
        let siblings = self.children.entry(new_parent).or_default();
        let index = index.min(siblings.len());
        siblings.insert(index, id);

        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = new_parent;
        }
        debug_assert!(self.is_consistent());
        true
    }

    /// Merge a QC outcome into a leaf's status metadata.
    ///
    /// Unknown or non-leaf targets return `false` without touching the tree;
    /// the caller treats that as a benign region/tree mismatch.
    pub fn merge_status(&mut self, id: NodeId, status: QcStatus, profile: Option<&str>) -> bool {
        match self.nodes.get_mut(&id) {
            Some(DocNode {
                kind: NodeKind::Leaf(leaf),
                ..
            }) => {
                leaf.qc_status = status;
                if let Some(profile) = profile {
                    leaf.profile = profile.to_string();
                }
                true
            }
            _ => false,
        }
    }

    /// Flatten the current structure for the order-persistence collaborator.
    ///
    /// Documents are emitted in depth-first sibling order; `module` is the
    /// top-level folder a document sits under, `order` a running index.
    pub fn to_ordered_list(&self) -> Vec<OrderedDoc> {
        let mut out = Vec::new();
        let mut order = 0u32;
        for folder_id in self.children_of(ROOT_ID) {
            let Some(folder) = self.nodes.get(folder_id) else {
                continue;
            };
            self.collect_leaves(*folder_id, &folder.label, &mut order, &mut out);
        }
        out
    }

    fn collect_leaves(
        &self,
        container: NodeId,
        module: &str,
        order: &mut u32,
        out: &mut Vec<OrderedDoc>,
    ) {
        for child_id in self.children_of(container) {
            match self.nodes.get(child_id).map(|n| &n.kind) {
                Some(NodeKind::Leaf(_)) => {
                    out.push(OrderedDoc {
                        id: *child_id,
                        module: module.to_string(),
                        order: *order,
                    });
                    *order += 1;
                }
                Some(NodeKind::Container) => {
                    self.collect_leaves(*child_id, module, order, out);
                }
                None => {}
            }
        }
    }

    /// Look up a node by id.
    pub fn node(&self, id: NodeId) -> Option<&DocNode> {
        self.nodes.get(&id)
    }

    /// Ordered children of a container (empty for leaves and unknown ids).
    pub fn children_of(&self, id: NodeId) -> &[NodeId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total node count, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of leaf documents.
    pub fn leaf_count(&self) -> usize {
        self.nodes
            .values()
            .filter(|n| !n.is_container())
            .count()
    }

    /// True iff `candidate` is `id` itself or one of its ancestors.
    fn is_ancestor(&self, id: NodeId, candidate: NodeId) -> bool {
        let mut current = candidate;
        loop {
            if current == id {
                return true;
            }
            if current == ROOT_ID {
                return false;
            }
            match self.nodes.get(&current) {
                Some(node) => current = node.parent,
                None => return false,
            }
        }
    }

    fn insert_node(&mut self, node: DocNode) {
        self.children.entry(node.id).or_default();
        self.nodes.insert(node.id, node);
    }

    /// Full structural check: rooted, acyclic, parents exist, child lists
    /// mirror parent pointers. Used by tests and debug assertions.
    pub fn is_consistent(&self) -> bool {
        if !self.nodes.is_empty() && !self.nodes.contains_key(&ROOT_ID) {
            return false;
        }
        // Every child-list entry must point back at its container, and every
        // non-root node must appear in exactly one child list.
        for (container, children) in &self.children {
            for child in children {
                match self.nodes.get(child) {
                    Some(node) if node.parent == *container && node.id != ROOT_ID => {}
                    _ => return false,
                }
            }
        }
        if !self.nodes.is_empty() {
            let entries: usize = self.children.values().map(Vec::len).sum();
            if entries != self.nodes.len() - 1 {
                return false;
            }
        }
        for node in self.nodes.values() {
            if node.id == ROOT_ID {
                continue;
            }
            let Some(parent) = self.nodes.get(&node.parent) else {
                return false;
            };
            if !parent.is_container() {
                return false;
            }
            if !self.children_of(node.parent).contains(&node.id) {
                return false;
            }
            // Walk to the root; a cycle would revisit the node.
            let mut current = node.parent;
            let mut hops = 0;
            while current != ROOT_ID {
                if current == node.id || hops > self.nodes.len() {
                    return false;
                }
                current = match self.nodes.get(&current) {
                    Some(n) => n.parent,
                    None => return false,
                };
                hops += 1;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: NodeId, title: &str, module: &str) -> DocumentRecord {
        DocumentRecord {
            id,
            title: title.to_string(),
            module: module.to_string(),
            qc_status: None,
        }
    }

    fn sample_tree() -> TreeStore {
        let docs = vec![
            doc(1, "Cover Letter", "m1.1"),
            doc(2, "Quality Overall Summary", "m2.3"),
            doc(3, "Drug Substance", "m3.2.S"),
            doc(42, "Stability Report", "m3.2.P"),
        ];
        let mut tree = TreeStore::new();
        tree.load(&docs, Region::Fda);
        tree
    }

    fn folder_id(tree: &TreeStore, label: &str) -> NodeId {
        *tree
            .children_of(ROOT_ID)
            .iter()
            .find(|id| tree.node(**id).unwrap().label == label)
            .unwrap()
    }

    #[test]
    fn test_load_builds_folders_and_assigns_by_module_prefix() {
        let tree = sample_tree();
        // root + 5 folders + 4 docs
        assert_eq!(tree.len(), 10);
        assert_eq!(tree.leaf_count(), 4);
        assert!(tree.is_consistent());

        let m1 = folder_id(&tree, "m1");
        let m3 = folder_id(&tree, "m3");
        assert_eq!(tree.children_of(m1), &[1]);
        assert_eq!(tree.children_of(m3), &[3, 42]);
        assert_eq!(tree.node(42).unwrap().parent, m3);
    }

    #[test]
    fn test_load_defaults_unmatched_module_to_first_folder() {
        let mut tree = TreeStore::new();
        tree.load(&[doc(7, "Unfiled", "appendix-x")], Region::Fda);
        let m1 = folder_id(&tree, "m1");
        assert_eq!(tree.children_of(m1), &[7]);
    }

    #[test]
    fn test_load_seeds_status_from_listing() {
        let mut record = doc(5, "Validated Protocol", "m5.3");
        record.qc_status = Some(QcStatus::Passed);
        let mut tree = TreeStore::new();
        tree.load(&[record], Region::Ema);

        let status = tree.node(5).unwrap().status().unwrap();
        assert_eq!(status.qc_status, QcStatus::Passed);
        assert_eq!(status.profile, "EMA_eCTD");
    }

    #[test]
    fn test_load_is_idempotent_and_discards_local_edits() {
        let docs = vec![doc(1, "A", "m1"), doc(2, "B", "m2")];
        let mut tree = TreeStore::new();
        tree.load(&docs, Region::Fda);
        let m2 = folder_id(&tree, "m2");

        // Local edit between loads.
        assert!(tree.move_node(1, m2, 0));

        let mut reference = TreeStore::new();
        reference.load(&docs, Region::Fda);
        tree.load(&docs, Region::Fda);

        for id in [ROOT_ID, 1, 2] {
            assert_eq!(tree.node(id), reference.node(id));
            assert_eq!(tree.children_of(id), reference.children_of(id));
        }
        assert_eq!(tree.len(), reference.len());
    }

    #[test]
    fn test_load_skips_record_with_root_sentinel_id() {
        let mut tree = TreeStore::new();
        tree.load(
            &[doc(0, "Forged Root", "m1.1"), doc(5, "Cover Letter", "m1.1")],
            Region::Fda,
        );

        // The synthesized root survives; only the honest record lands.
        assert!(tree.is_consistent());
        assert!(tree.node(ROOT_ID).unwrap().is_container());
        assert_eq!(tree.leaf_count(), 1);
        let m1 = folder_id(&tree, "m1");
        assert_eq!(tree.children_of(m1), &[5]);
    }

    #[test]
    fn test_load_skips_duplicate_ids() {
        let mut tree = TreeStore::new();
        tree.load(
            &[doc(7, "Original", "m1.1"), doc(7, "Impostor", "m3.2.S")],
            Region::Fda,
        );

        // First record wins; the id sits in exactly one child list.
        assert!(tree.is_consistent());
        assert_eq!(tree.leaf_count(), 1);
        assert_eq!(tree.node(7).unwrap().label, "Original");
        let listed = tree
            .children_of(ROOT_ID)
            .iter()
            .filter(|f| tree.children_of(**f).contains(&7))
            .count();
        assert_eq!(listed, 1);
    }

    #[test]
    fn test_consistency_check_catches_stray_child_entries() {
        let mut tree = sample_tree();
        let m1 = folder_id(&tree, "m1");
        let m2 = folder_id(&tree, "m2");
        // Same id in two child lists must fail the checker.
        tree.children.entry(m2).or_default().push(1);
        assert!(!tree.is_consistent());
        // Restore and corrupt the other way: entry without a node.
        tree.children.get_mut(&m2).unwrap().retain(|c| *c != 1);
        assert!(tree.is_consistent());
        tree.children.entry(m1).or_default().push(9999);
        assert!(!tree.is_consistent());
    }

    #[test]
    fn test_move_between_folders() {
        let mut tree = sample_tree();
        let m3 = folder_id(&tree, "m3");
        let m4 = folder_id(&tree, "m4");

        assert!(tree.move_node(42, m4, 0));
        assert_eq!(tree.node(42).unwrap().parent, m4);
        assert_eq!(tree.children_of(m3), &[3]);
        assert_eq!(tree.children_of(m4), &[42]);
        assert!(tree.is_consistent());
    }

    #[test]
    fn test_move_index_is_clamped() {
        let mut tree = sample_tree();
        let m3 = folder_id(&tree, "m3");
        // Index far past the end lands last.
        assert!(tree.move_node(1, m3, 99));
        assert_eq!(tree.children_of(m3), &[3, 42, 1]);
    }

    #[test]
    fn test_move_rejects_unknown_node_and_target() {
        let mut tree = sample_tree();
        let m2 = folder_id(&tree, "m2");
        assert!(!tree.move_node(9999, m2, 0));
        assert!(!tree.move_node(1, 9999, 0));
        assert!(tree.is_consistent());
    }

    #[test]
    fn test_move_rejects_leaf_target() {
        let mut tree = sample_tree();
        assert!(!tree.move_node(1, 42, 0));
        assert!(tree.is_consistent());
    }

    #[test]
    fn test_move_rejects_leaf_under_root() {
        let mut tree = sample_tree();
        assert!(!tree.move_node(1, ROOT_ID, 0));
        // Folders may still be reordered at the top level.
        let m5 = folder_id(&tree, "m5");
        assert!(tree.move_node(m5, ROOT_ID, 0));
        assert_eq!(tree.children_of(ROOT_ID)[0], m5);
    }

    #[test]
    fn test_move_rejects_cycles() {
        let mut tree = sample_tree();
        let m3 = folder_id(&tree, "m3");
        let m4 = folder_id(&tree, "m4");

        // Nest m4 under m3, then try to fold m3 into its own descendant.
        assert!(tree.move_node(m4, m3, 0));
        assert!(!tree.move_node(m3, m4, 0));
        assert!(!tree.move_node(m3, m3, 0));
        assert!(tree.is_consistent());
        assert_eq!(tree.node(m3).unwrap().parent, ROOT_ID);
    }

    #[test]
    fn test_move_root_is_rejected() {
        let mut tree = sample_tree();
        let m1 = folder_id(&tree, "m1");
        assert!(!tree.move_node(ROOT_ID, m1, 0));
    }

    #[test]
    fn test_merge_status_updates_leaf_only() {
        let mut tree = sample_tree();
        assert!(tree.merge_status(42, QcStatus::Passed, Some("FDA_eCTD")));

        let status = tree.node(42).unwrap().status().unwrap();
        assert_eq!(status.qc_status, QcStatus::Passed);
        assert_eq!(status.profile, "FDA_eCTD");

        // Other leaves untouched.
        assert_eq!(
            tree.node(1).unwrap().status().unwrap().qc_status,
            QcStatus::Unvalidated
        );

        // Containers and unknown ids are benign no-ops.
        let m1 = folder_id(&tree, "m1");
        assert!(!tree.merge_status(m1, QcStatus::Failed, None));
        assert!(!tree.merge_status(9999, QcStatus::Failed, None));
    }

    #[test]
    fn test_merge_status_keeps_profile_when_absent() {
        let mut tree = sample_tree();
        assert!(tree.merge_status(42, QcStatus::Failed, None));
        let status = tree.node(42).unwrap().status().unwrap();
        assert_eq!(status.qc_status, QcStatus::Failed);
        assert_eq!(status.profile, "FDA_eCTD");
    }

    #[test]
    fn test_to_ordered_list_walks_folders_in_order() {
        let tree = sample_tree();
        let list = tree.to_ordered_list();
        assert_eq!(list.len(), 4);
        assert_eq!(
            list.iter().map(|d| d.id).collect::<Vec<_>>(),
            vec![1, 2, 3, 42]
        );
        assert_eq!(
            list.iter().map(|d| d.order).collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );
        assert_eq!(list[0].module, "m1");
        assert_eq!(list[3].module, "m3");
    }

    #[test]
    fn test_to_ordered_list_tracks_moves() {
        let mut tree = sample_tree();
        let m5 = folder_id(&tree, "m5");
        assert!(tree.move_node(1, m5, 0));

        let list = tree.to_ordered_list();
        let last = list.last().unwrap();
        assert_eq!(last.id, 1);
        assert_eq!(last.module, "m5");
    }

    #[test]
    fn test_to_ordered_list_nested_folders_keep_top_module() {
        let mut tree = sample_tree();
        let m3 = folder_id(&tree, "m3");
        let m4 = folder_id(&tree, "m4");
        assert!(tree.move_node(m4, m3, 0));
        assert!(tree.move_node(2, m4, 0));

        let list = tree.to_ordered_list();
        let entry = list.iter().find(|d| d.id == 2).unwrap();
        assert_eq!(entry.module, "m3");
    }

    #[test]
    fn test_random_move_sequence_preserves_invariants() {
        let mut tree = sample_tree();
        let folders: Vec<NodeId> = tree.children_of(ROOT_ID).to_vec();
        let leaves = [1u64, 2, 3, 42];

        // Deterministic pseudo-random walk over legal and illegal moves.
        let mut seed = 0x5eed_u64;
        for _ in 0..500 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let id = leaves[(seed >> 16) as usize % leaves.len()];
            let target = folders[(seed >> 32) as usize % folders.len()];
            let index = (seed >> 48) as usize % 4;
            tree.move_node(id, target, index);
            assert!(tree.is_consistent());
        }
        assert_eq!(tree.leaf_count(), 4);
    }
}
