//! Release graph engine.
//!
//! The release chain is a sparser tree over the same identifiers as the
//! edit history, populated only when versions are explicitly released.
//! Planning is pure: given a tree snapshot and the version being released,
//! compute the rewrites its neighbors need. The target itself is stamped by
//! the caller once those rewrites have landed, so an interrupted release is
//! re-planned the same way on retry.

use std::collections::HashSet;

use crate::domain::{document::push_unique, VersionedDocument};
use crate::graph::{GraphError, Rewrites, VersionTree};

/// How a release reshapes the release chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseMode {
    /// No chain passes through the target yet.
    Establish,
    /// The target already sits on a chain.
    Heal,
}

impl ReleaseMode {
    pub fn of(doc: &VersionedDocument) -> Self {
        let links = &doc.meta.release.releases;
        if links.previous.is_empty() && links.next.is_empty() {
            ReleaseMode::Establish
        } else {
            ReleaseMode::Heal
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReleaseMode::Establish => "establish",
            ReleaseMode::Heal => "heal",
        }
    }
}

/// Rewrites planned for one release.
#[derive(Debug)]
pub struct ReleasePlan {
    pub mode: ReleaseMode,
    /// Release the target follows: its recorded `release.previous`, else the
    /// nearest released ancestor, else `""`.
    pub predecessor: String,
    pub rewrites: Rewrites,
}

/// Plan the release-chain rewrites for releasing `target`.
///
/// - Descendants reachable without crossing another release, and still
///   pointing at the predecessor (or at nothing), now point at the target.
///   Released ones among them record that they replace it.
/// - Ancestors, nearest first up to and including the predecessor, drop the
///   releases the target now stands in front of and list the target.
pub fn plan_release(tree: &VersionTree, target: &VersionedDocument) -> Result<ReleasePlan, GraphError> {
    let mode = ReleaseMode::of(target);
    let target_id = target.external_id.as_str();
    let ancestors = tree.ancestors(target)?;

    let recorded = &target.meta.release.releases.previous;
    let predecessor = if recorded.is_empty() {
        ancestors
            .iter()
            .find(|a| a.is_released())
            .map(|a| a.external_id.clone())
            .unwrap_or_default()
    } else {
        recorded.clone()
    };
    let ancestor_ids: Vec<String> = ancestors.iter().map(|a| a.external_id.clone()).collect();
    let frontier: Vec<String> = release_frontier(tree, target)
        .into_iter()
        .filter(|d| {
            let previous = &d.meta.release.releases.previous;
            previous.is_empty() || *previous == predecessor
        })
        .map(|d| d.external_id.clone())
        .collect();

    let mut rewrites = Rewrites::new();
    for id in &frontier {
        if let Some(doc) = rewrites.edit(tree, id) {
            let released = doc.is_released();
            let links = &mut doc.meta.release.releases;
            links.previous = target_id.to_string();
            if released {
                links.replaces = target_id.to_string();
            }
        }
    }

    let superseded = &target.meta.release.releases.next;
    for id in &ancestor_ids {
        if let Some(doc) = rewrites.edit(tree, id) {
            let next = &mut doc.meta.release.releases.next;
            next.retain(|r| !superseded.contains(r));
            push_unique(next, target_id);
        }
        if *id == predecessor {
            break;
        }
    }

    Ok(ReleasePlan {
        mode,
        predecessor,
        rewrites,
    })
}

/// Descendants of `target` with no released version strictly between them
/// and the target. Released versions are included but not walked past.
fn release_frontier<'a>(tree: &'a VersionTree, target: &'a VersionedDocument) -> Vec<&'a VersionedDocument> {
    let mut found = Vec::new();
    let mut seen: HashSet<&str> = HashSet::from([target.external_id.as_str()]);
    let mut stack: Vec<&str> = target.meta.history.next.iter().map(String::as_str).collect();

    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        let Some(node) = tree.get(id) else {
            continue;
        };
        found.push(node);
        if !node.is_released() {
            stack.extend(node.meta.history.next.iter().map(String::as_str));
        }
    }
    found
}
