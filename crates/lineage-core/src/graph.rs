//! Version graph engine.
//!
//! Every operation here is pure: it works over a `VersionTree` snapshot
//! (all versions sharing one root, fetched once from the collection) and
//! either answers a traversal question or plans the rewrites a structural
//! change needs. Traversals are iterative, so deep histories cannot exhaust
//! the stack, and every walk tracks visited ids so a corrupted graph
//! surfaces as an error instead of a loop.

use std::collections::{HashMap, HashSet};

use crate::domain::{document::push_unique, LineageError, VersionedDocument, ROOT};

/// Corruption found while walking a version tree.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("broken history chain at {id}: no previous version but prime is {prime}")]
    BrokenChain { id: String, prime: String },

    #[error("history of {id} references {missing}, which is not in its version tree")]
    MissingLink { id: String, missing: String },

    #[error("history cycle detected at {id}")]
    Cycle { id: String },
}

impl From<GraphError> for LineageError {
    fn from(err: GraphError) -> Self {
        LineageError::Integrity(err.to_string())
    }
}

/// All versions of one tree, indexed by external id.
#[derive(Debug, Clone, Default)]
pub struct VersionTree {
    nodes: Vec<VersionedDocument>,
    index: HashMap<String, usize>,
}

impl VersionTree {
    pub fn new(nodes: Vec<VersionedDocument>) -> Self {
        let index = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.external_id.clone(), i))
            .collect();
        Self { nodes, index }
    }

    pub fn get(&self, external_id: &str) -> Option<&VersionedDocument> {
        self.index.get(external_id).map(|&i| &self.nodes[i])
    }

    pub fn nodes(&self) -> &[VersionedDocument] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Versions `doc` was derived from, nearest first, ending at the root.
    /// Excludes `doc`.
    pub fn ancestors<'a>(
        &'a self,
        doc: &'a VersionedDocument,
    ) -> Result<Vec<&'a VersionedDocument>, GraphError> {
        let mut found = Vec::new();
        let mut seen: HashSet<&str> = HashSet::from([doc.external_id.as_str()]);
        let mut current = doc;

        while !current.is_root() {
            let previous = current.meta.history.previous.as_str();
            if previous.is_empty() {
                return Err(GraphError::BrokenChain {
                    id: current.external_id.clone(),
                    prime: current.meta.history.prime.clone(),
                });
            }
            let parent = self.get(previous).ok_or_else(|| GraphError::MissingLink {
                id: current.external_id.clone(),
                missing: previous.to_string(),
            })?;
            if !seen.insert(parent.external_id.as_str()) {
                return Err(GraphError::Cycle {
                    id: parent.external_id.clone(),
                });
            }
            found.push(parent);
            current = parent;
        }
        Ok(found)
    }

    /// Every version reachable from `doc` through `next` links, depth-first.
    /// Excludes `doc`. Links to versions outside the tree are skipped.
    pub fn descendants<'a>(&'a self, doc: &'a VersionedDocument) -> Vec<&'a VersionedDocument> {
        let mut found = Vec::new();
        let mut seen: HashSet<&str> = HashSet::from([doc.external_id.as_str()]);
        let mut stack: Vec<&str> = doc
            .meta
            .history
            .next
            .iter()
            .rev()
            .map(String::as_str)
            .collect();

        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            let Some(node) = self.get(id) else {
                continue;
            };
            found.push(node);
            stack.extend(node.meta.history.next.iter().rev().map(String::as_str));
        }
        found
    }
}

/// Copy-on-write working set of versions a healing pass rewrites.
///
/// Versions are cloned out of the snapshot on first edit and handed back in
/// first-edit order, so writes are issued in the order the pass decided them.
#[derive(Debug, Default)]
pub struct Rewrites {
    order: Vec<String>,
    docs: HashMap<String, VersionedDocument>,
}

impl Rewrites {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutable copy of a tree member; `None` if the tree does not hold it.
    pub fn edit(&mut self, tree: &VersionTree, external_id: &str) -> Option<&mut VersionedDocument> {
        if !self.docs.contains_key(external_id) {
            let original = tree.get(external_id)?.clone();
            self.order.push(external_id.to_string());
            self.docs.insert(external_id.to_string(), original);
        }
        self.docs.get_mut(external_id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Edited versions that differ from their snapshot, in first-edit order.
    pub fn into_changed(self, tree: &VersionTree) -> Vec<VersionedDocument> {
        let Rewrites { order, mut docs } = self;
        order
            .iter()
            .filter_map(|id| docs.remove(id))
            .filter(|doc| tree.get(&doc.external_id) != Some(doc))
            .collect()
    }
}

/// Plan the neighbor rewrites that must land before `target` is tombstoned.
///
/// - Children of a deleted root each become the root of their own subtree;
///   every descendant of a promoted child gets its `prime` rewritten.
/// - Children of a deleted non-root are repointed to the target's previous.
/// - The target's previous has the target replaced, in place, by the
///   target's own children.
///
/// Every rewrite is idempotent, so the plan can be recomputed and re-applied
/// after a partial failure.
pub fn plan_delete_healing(tree: &VersionTree, target: &VersionedDocument) -> Rewrites {
    let mut rewrites = Rewrites::new();
    let previous = target.meta.history.previous.clone();

    for child_id in &target.meta.history.next {
        let Some(child) = tree.get(child_id) else {
            continue;
        };
        if target.is_root() {
            let subtree: Vec<String> = tree
                .descendants(child)
                .into_iter()
                .map(|d| d.external_id.clone())
                .collect();
            for id in subtree {
                if let Some(node) = rewrites.edit(tree, &id) {
                    node.meta.history.prime = child_id.clone();
                }
            }
            // promoted last, so the child stays in the old tree until its
            // subtree has moved
            if let Some(promoted) = rewrites.edit(tree, child_id) {
                promoted.meta.history.prime = ROOT.to_string();
                promoted.meta.history.previous = previous.clone();
            }
        } else if let Some(node) = rewrites.edit(tree, child_id) {
            node.meta.history.previous = previous.clone();
        }
    }

    if !previous.is_empty() {
        if let Some(parent) = rewrites.edit(tree, &previous) {
            splice_next(
                &mut parent.meta.history.next,
                &target.external_id,
                &target.meta.history.next,
            );
        }
    }
    rewrites
}

/// Replace `removed` in `next` by `replacements`, at its position, without
/// introducing duplicates.
fn splice_next(next: &mut Vec<String>, removed: &str, replacements: &[String]) {
    let fresh: Vec<String> = replacements
        .iter()
        .filter(|r| r.as_str() != removed && !next.contains(r))
        .cloned()
        .collect();
    match next.iter().position(|id| id == removed) {
        Some(at) => {
            next.splice(at..=at, fresh);
        }
        None => {
            for id in fresh {
                push_unique(next, &id);
            }
        }
    }
}
