//! Batch processing with sponsor-based partitioning
//!
//! This module provides the `BatchProcessor`, which applies a batch of
//! journal commands with one tokio task per sponsor.
//!
//! # Design
//!
//! Every command of a journal row touches exactly one sponsor ledger (the
//! `sponsor` column, also for `process` rows). Partitioning by sponsor lets
//! different sponsors proceed in parallel while each sponsor's commands stay
//! in journal order, which is what a `process` row needs to find the
//! `refund` it points at.
//!
//! ```text
//! batch ──partition_by_sponsor──▶ { csr-1: [..], csr-2: [..] }
//!                                     │            │
//!                                tokio task    tokio task ──▶ Arc<CsrEngine>
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, warn};

use crate::core::engine::{CommandOutcome, CsrEngine};
use crate::types::{ActorId, CommandRecord, CsrResult};

/// Outcome of applying a single command
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    pub record: CommandRecord,
    pub result: CsrResult<CommandOutcome>,
}

/// Applies batches of commands against a shared engine
#[derive(Clone)]
pub struct BatchProcessor {
    engine: Arc<CsrEngine>,
}

impl BatchProcessor {
    pub fn new(engine: Arc<CsrEngine>) -> Self {
        Self { engine }
    }

    /// Split a batch into per-sponsor sub-batches, keeping journal order
    pub fn partition_by_sponsor(
        &self,
        batch: Vec<CommandRecord>,
    ) -> HashMap<ActorId, Vec<CommandRecord>> {
        let mut partitions: HashMap<ActorId, Vec<CommandRecord>> = HashMap::new();

        for record in batch {
            partitions
                .entry(record.sponsor.clone())
                .or_default()
                .push(record);
        }

        partitions
    }

    /// Apply one sponsor's commands in order
    ///
    /// A failed command is logged and does not stop the ones after it.
    pub async fn process_sponsor_commands(
        &self,
        commands: Vec<CommandRecord>,
    ) -> Vec<ProcessingResult> {
        let mut results = Vec::with_capacity(commands.len());

        for record in commands {
            let result = self.engine.process(record.clone());
            if let Err(err) = &result {
                warn!(
                    command = ?record.command,
                    sponsor = %record.sponsor,
                    reference = record.reference,
                    error = %err,
                    "command rejected"
                );
            }
            results.push(ProcessingResult { record, result });
        }

        results
    }

    /// Apply a batch with one task per sponsor and wait for all of them
    ///
    /// Results are grouped by sponsor; their order across sponsors is not
    /// specified.
    pub async fn process_batch(&self, batch: Vec<CommandRecord>) -> Vec<ProcessingResult> {
        let partitions = self.partition_by_sponsor(batch);

        let mut tasks = Vec::with_capacity(partitions.len());
        for (_sponsor, commands) in partitions {
            let processor = self.clone();
            tasks.push(tokio::spawn(async move {
                processor.process_sponsor_commands(commands).await
            }));
        }

        let mut results = Vec::new();
        for task in tasks {
            match task.await {
                Ok(sponsor_results) => results.extend(sponsor_results),
                Err(err) => error!(error = %err, "sponsor task panicked"),
            }
        }

        results
    }
}
