//! Structured observability hooks for Lineage mutations.
//!
//! This module provides:
//! - Operation-scoped tracing spans via the `OperationSpan` RAII guard
//! - Emission functions for lifecycle events: create, overwrite, fork,
//!   delete, release and bulk writes
//!
//! Events are emitted at `info!` level, healing failures and skipped bulk
//! items at `warn!`. Filtering follows `LINEAGE_LOG` (see `telemetry`).

use tracing::{info, warn};

/// RAII guard that enters an operation-scoped span for its lifetime.
///
/// # Example
///
/// ```ignore
/// let _span = OperationSpan::enter("delete", "agent:alice");
/// // every event below is tagged with op = "delete", agent = "agent:alice"
/// ```
pub struct OperationSpan {
    _span: tracing::span::EnteredSpan,
}

impl OperationSpan {
    pub fn enter(op: &str, agent: &str) -> Self {
        let span = tracing::info_span!("lineage.op", op = %op, agent = %agent);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: a new tree root was stored.
pub fn emit_document_created(id: &str, agent: &str) {
    info!(event = "document.created", id = %id, agent = %agent);
}

/// Emit event: content replaced in place; `token` is the new version token.
pub fn emit_document_overwritten(id: &str, token: &str) {
    info!(event = "document.overwritten", id = %id, token = %token);
}

/// Emit event: a new version was forked from `parent`.
pub fn emit_version_forked(parent: &str, child: &str, kind: &str) {
    info!(event = "version.forked", parent = %parent, child = %child, kind = %kind);
}

/// Emit event: a partial mutation changed nothing, no version was created.
pub fn emit_version_unchanged(id: &str, kind: &str) {
    info!(event = "version.unchanged", id = %id, kind = %kind);
}

/// Emit event: a version was tombstoned after `healed` neighbors were rewritten.
pub fn emit_document_deleted(id: &str, agent: &str, healed: usize) {
    info!(event = "document.deleted", id = %id, agent = %agent, healed = healed);
}

/// Emit event: a version was released.
pub fn emit_document_released(id: &str, mode: &str, healed: usize) {
    info!(event = "document.released", id = %id, mode = %mode, healed = healed);
}

/// Emit event: a multi-write tree repair stopped part way (warning level).
pub fn emit_tree_heal_failed(op: &str, id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "tree.heal_failed", op = %op, id = %id, error = %error);
}

/// Emit event: a bulk batch was submitted.
pub fn emit_bulk_written(kind: &str, requested: usize, written: usize) {
    info!(
        event = "bulk.written",
        kind = %kind,
        requested = requested,
        written = written,
    );
}

/// Emit event: a bulk item was left out of the batch (warning level).
pub fn emit_bulk_item_skipped(kind: &str, index: usize, reason: &dyn std::fmt::Display) {
    warn!(event = "bulk.item_skipped", kind = %kind, index = index, reason = %reason);
}
