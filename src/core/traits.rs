//! Core traits at the storage and id-generation seams
//!
//! The ledger and transaction stores are concrete `DashMap` types. The audit
//! log and invoice numbering sit behind traits so deployments can swap the
//! backing store or numbering scheme, and tests can inject failures or fixed
//! sequences.

use chrono::{DateTime, Utc};

use crate::types::{AuditLogEntry, AuditQuery, CsrResult};

/// Append-only storage for audit entries
///
/// There is deliberately no update or delete operation.
pub trait AuditLogStore: Send + Sync {
    /// Persist a new entry
    fn append(&self, entry: AuditLogEntry) -> CsrResult<()>;

    /// Entries matching `query`, newest first, at most `limit` of them
    fn list(&self, query: &AuditQuery, limit: usize) -> CsrResult<Vec<AuditLogEntry>>;
}

/// Strategy for producing invoice numbers
pub trait InvoiceNumberGenerator: Send + Sync {
    /// Next number for an invoice issued at `issued_at`
    fn next_number(&self, issued_at: DateTime<Utc>) -> String;
}
