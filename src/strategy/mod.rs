//! Processing strategies for journal replay
//!
//! A strategy is a complete pipeline: read the journal, apply every command
//! to a fresh [`CsrEngine`], write the ledger CSV and hand back what the run
//! produced. The synchronous and batched asynchronous pipelines are picked
//! at runtime.

use std::io::Write;
use std::path::Path;

use crate::cli::StrategyType;
use crate::config::EngineConfig;
use crate::core::CsrEngine;
use crate::io::write_ledgers_csv;
use crate::types::{AuditLogEntry, AuditQuery, CsrResult, Invoice};

pub mod r#async;
pub mod sync;

pub use self::r#async::{AsyncProcessingStrategy, BatchConfig};
pub use sync::SyncProcessingStrategy;

/// What a journal run produced besides the ledger CSV
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Commands applied successfully
    pub applied: usize,
    /// Unreadable journal rows plus commands rejected by the engine
    pub rejected: usize,
    /// Every invoice issued, newest first
    pub invoices: Vec<Invoice>,
    /// Full audit trail, newest first
    pub audit_trail: Vec<AuditLogEntry>,
}

/// Complete journal processing pipeline
pub trait ProcessingStrategy: Send + Sync {
    /// Replay the journal at `input_path` and write the ledger CSV to `output`
    ///
    /// Rejected commands are logged and skipped; only failures to read the
    /// journal or write the output end the run with an error.
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> CsrResult<RunSummary>;
}

/// Select a strategy implementation
///
/// `batch` is only used by the async strategy and defaults when absent.
pub fn create_strategy(
    strategy_type: StrategyType,
    engine: EngineConfig,
    batch: Option<BatchConfig>,
) -> Box<dyn ProcessingStrategy> {
    match strategy_type {
        StrategyType::Sync => Box::new(SyncProcessingStrategy::new(engine)),
        StrategyType::Async => Box::new(AsyncProcessingStrategy::new(
            batch.unwrap_or_default(),
            engine,
        )),
    }
}

/// Write the ledger CSV and collect the run's invoices and audit trail
pub(crate) fn finish_run(
    engine: &CsrEngine,
    applied: usize,
    rejected: usize,
    output: &mut dyn Write,
) -> CsrResult<RunSummary> {
    write_ledgers_csv(&engine.ledger_summaries(), output)?;

    Ok(RunSummary {
        applied,
        rejected,
        invoices: engine.invoices().list_invoices(None),
        audit_trail: engine
            .audit()
            .get_audit_trail(&AuditQuery::default().with_limit(usize::MAX))?,
    })
}
