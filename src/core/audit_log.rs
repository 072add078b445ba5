//! Audit trail: storage, service and best-effort recording
//!
//! - [`InMemoryAuditLog`] is the default append-only [`AuditLogStore`]
//! - [`AuditLogService`] validates and persists entries and serves queries
//! - [`AuditRecorder`] is what workflows use: a fire-and-forget handle whose
//!   `record_best_effort` returns nothing, so an audit failure can never fail
//!   the operation that triggered it
//!
//! # Dispatch Modes
//!
//! ```text
//! AuditRecorder
//!     ├── Inline      write immediately, log failures
//!     └── Background  unbounded mpsc channel ──▶ tokio task ──▶ AuditLogService
//! ```

use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::core::traits::AuditLogStore;
use crate::types::{AuditLogEntry, AuditQuery, CsrError, CsrResult, NewAuditEntry};

/// Default number of entries returned by an audit trail query
pub const DEFAULT_AUDIT_LIMIT: usize = 100;

/// Append-only in-memory audit log
///
/// Entries are keyed by an insertion sequence number, which also gives a
/// stable newest-first order for entries written within the same instant.
#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    entries: DashMap<u64, AuditLogEntry>,
    next_sequence: AtomicU64,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl AuditLogStore for InMemoryAuditLog {
    fn append(&self, entry: AuditLogEntry) -> CsrResult<()> {
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        self.entries.insert(sequence, entry);
        Ok(())
    }

    fn list(&self, query: &AuditQuery, limit: usize) -> CsrResult<Vec<AuditLogEntry>> {
        let mut matching: Vec<(u64, AuditLogEntry)> = self
            .entries
            .iter()
            .filter(|entry| query.matches(entry.value()))
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        matching.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(matching
            .into_iter()
            .take(limit)
            .map(|(_, entry)| entry)
            .collect())
    }
}

/// Recording and retrieval of administrative actions
#[derive(Clone)]
pub struct AuditLogService {
    store: Arc<dyn AuditLogStore>,
    default_limit: usize,
}

impl AuditLogService {
    pub fn new(store: Arc<dyn AuditLogStore>, default_limit: usize) -> Self {
        Self {
            store,
            default_limit,
        }
    }

    /// Service over a fresh [`InMemoryAuditLog`]
    pub fn in_memory(default_limit: usize) -> Self {
        Self::new(Arc::new(InMemoryAuditLog::new()), default_limit)
    }

    /// Validate and persist an entry
    ///
    /// # Errors
    ///
    /// - `Validation` if the actor id or the action is blank
    /// - whatever the store returns
    pub fn log_action(&self, input: NewAuditEntry) -> CsrResult<AuditLogEntry> {
        if input.actor_id.trim().is_empty() {
            return Err(CsrError::validation("actorId is required"));
        }
        if input.action.trim().is_empty() {
            return Err(CsrError::validation("action is required"));
        }

        let entry = AuditLogEntry {
            id: Uuid::new_v4(),
            actor_id: input.actor_id,
            actor_role: input.actor_role,
            action: input.action,
            resource_type: input.resource_type,
            resource_id: input.resource_id,
            metadata: input.metadata,
            created_at: Utc::now(),
        };

        self.store.append(entry.clone())?;
        debug!(actor = %entry.actor_id, action = %entry.action, "audit entry written");
        Ok(entry)
    }

    /// Entries matching the query, newest first
    ///
    /// Uses the configured default limit when the query does not set one.
    pub fn get_audit_trail(&self, query: &AuditQuery) -> CsrResult<Vec<AuditLogEntry>> {
        let limit = query.limit.unwrap_or(self.default_limit);
        self.store.list(query, limit)
    }
}

impl std::fmt::Debug for AuditLogService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLogService")
            .field("default_limit", &self.default_limit)
            .finish_non_exhaustive()
    }
}

enum AuditMessage {
    Record(NewAuditEntry),
    Flush(oneshot::Sender<()>),
}

#[derive(Clone)]
enum Dispatch {
    Inline(AuditLogService),
    Background(mpsc::UnboundedSender<AuditMessage>),
}

/// Best-effort audit handle used by workflows
///
/// Cheap to clone; every clone feeds the same sink.
#[derive(Clone)]
pub struct AuditRecorder {
    dispatch: Dispatch,
}

/// Background task draining an [`AuditRecorder`] channel
pub struct AuditWorker {
    handle: JoinHandle<usize>,
}

impl AuditRecorder {
    /// Recorder that writes on the caller's thread
    pub fn inline(service: AuditLogService) -> Self {
        Self {
            dispatch: Dispatch::Inline(service),
        }
    }

    /// Recorder that hands entries to a background tokio task
    ///
    /// Must be called from within a tokio runtime. The worker stops once
    /// every clone of the recorder has been dropped.
    pub fn spawn_background(service: AuditLogService) -> (Self, AuditWorker) {
        let (sender, mut receiver) = mpsc::unbounded_channel::<AuditMessage>();

        let handle = tokio::spawn(async move {
            let mut written = 0usize;
            while let Some(message) = receiver.recv().await {
                match message {
                    AuditMessage::Record(entry) => {
                        if write_or_warn(&service, entry) {
                            written += 1;
                        }
                    }
                    AuditMessage::Flush(ack) => {
                        let _ = ack.send(());
                    }
                }
            }
            written
        });

        (
            Self {
                dispatch: Dispatch::Background(sender),
            },
            AuditWorker { handle },
        )
    }

    /// Record an entry without ever failing the caller
    ///
    /// Failures are logged with `warn!` and dropped; the audit trail is an
    /// observability feature, not a durability guarantee.
    pub fn record_best_effort(&self, entry: NewAuditEntry) {
        match &self.dispatch {
            Dispatch::Inline(service) => {
                write_or_warn(service, entry);
            }
            Dispatch::Background(sender) => {
                if let Err(err) = sender.send(AuditMessage::Record(entry)) {
                    let AuditMessage::Record(entry) = err.0 else {
                        return;
                    };
                    warn!(
                        actor = %entry.actor_id,
                        action = %entry.action,
                        "audit worker is gone, entry dropped"
                    );
                }
            }
        }
    }

    /// Wait until every entry recorded so far has been handled
    ///
    /// Returns immediately for inline recorders.
    pub async fn flush(&self) {
        if let Dispatch::Background(sender) = &self.dispatch {
            let (ack, done) = oneshot::channel();
            if sender.send(AuditMessage::Flush(ack)).is_ok() {
                let _ = done.await;
            }
        }
    }
}

impl AuditWorker {
    /// Wait for the worker to stop and return how many entries it wrote
    ///
    /// Only completes after every recorder clone has been dropped.
    pub async fn finish(self) -> usize {
        match self.handle.await {
            Ok(written) => written,
            Err(err) => {
                warn!(error = %err, "audit worker panicked");
                0
            }
        }
    }
}

fn write_or_warn(service: &AuditLogService, entry: NewAuditEntry) -> bool {
    let actor = entry.actor_id.clone();
    let action = entry.action.clone();

    match service.log_action(entry) {
        Ok(_) => true,
        Err(err) => {
            warn!(%actor, %action, error = %err, "audit logging failed");
            false
        }
    }
}
