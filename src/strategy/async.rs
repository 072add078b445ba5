//! Asynchronous batch processing strategy
//!
//! Reads the journal in batches and applies each batch with one tokio task
//! per sponsor.
//!
//! # Architecture
//!
//! ```text
//! AsyncProcessingStrategy
//!     ├── BatchConfig (batch_size, max_concurrent_batches)
//!     ├── AsyncReader (batched journal reading)
//!     ├── BatchProcessor (sponsor partitioning + tasks)
//!     └── Arc<CsrEngine>
//!         └── AuditRecorder::Background ──▶ audit worker task
//! ```
//!
//! Batches are applied one after another, so a sponsor whose commands span
//! several batches still sees them in journal order. Audit entries are
//! written by a background task and flushed before the run is reported.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::core::{AuditLogService, AuditRecorder, BatchProcessor, CsrEngine};
use crate::io::async_reader::AsyncReader;
use crate::strategy::{finish_run, ProcessingStrategy, RunSummary};
use crate::types::{CsrError, CsrResult};

/// Configuration for batch processing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchConfig {
    /// Number of journal rows per batch
    pub batch_size: usize,
    /// Worker threads of the tokio runtime
    pub max_concurrent_batches: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_concurrent_batches: num_cpus::get(),
        }
    }
}

impl BatchConfig {
    /// Build a config, replacing zero values with the defaults
    pub fn new(batch_size: usize, max_concurrent_batches: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            warn!(
                batch_size,
                default = default.batch_size,
                "invalid batch size, using default"
            );
            default.batch_size
        } else {
            batch_size
        };

        let max_concurrent_batches = if max_concurrent_batches == 0 {
            warn!(
                max_concurrent_batches,
                default = default.max_concurrent_batches,
                "invalid max concurrent batches, using default"
            );
            default.max_concurrent_batches
        } else {
            max_concurrent_batches
        };

        Self {
            batch_size,
            max_concurrent_batches,
        }
    }
}

/// Batched, multi-threaded journal replay
#[derive(Debug, Clone)]
pub struct AsyncProcessingStrategy {
    batch: BatchConfig,
    engine: EngineConfig,
}

impl AsyncProcessingStrategy {
    pub fn new(batch: BatchConfig, engine: EngineConfig) -> Self {
        Self { batch, engine }
    }
}

impl ProcessingStrategy for AsyncProcessingStrategy {
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> CsrResult<RunSummary> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.batch.max_concurrent_batches)
            .build()
            .map_err(|e| CsrError::IoError {
                message: format!("Failed to create tokio runtime: {}", e),
            })?;

        runtime.block_on(async {
            let audit = AuditLogService::in_memory(self.engine.audit_trail_limit);
            let (recorder, audit_worker) = AuditRecorder::spawn_background(audit.clone());
            let engine = Arc::new(CsrEngine::with_audit(self.engine.clone(), audit, recorder));
            let processor = BatchProcessor::new(Arc::clone(&engine));

            let file = tokio::fs::File::open(input_path)
                .await
                .map_err(|e| CsrError::IoError {
                    message: format!("Failed to open file '{}': {}", input_path.display(), e),
                })?;
            let compat_file = tokio_util::compat::TokioAsyncReadCompatExt::compat(file);
            let mut reader = AsyncReader::new(compat_file);

            let mut applied = 0;
            let mut rejected = 0;

            loop {
                let batch = reader.read_batch(self.batch.batch_size).await;
                if batch.is_empty() {
                    break;
                }

                let mut records = Vec::with_capacity(batch.len());
                for row in batch {
                    match row {
                        Ok(record) => records.push(record),
                        Err(e) => {
                            rejected += 1;
                            warn!(error = %e, "journal row rejected");
                        }
                    }
                }

                // Wait for the whole batch so a sponsor's next batch sees its effects
                for result in processor.process_batch(records).await {
                    if result.result.is_ok() {
                        applied += 1;
                    } else {
                        rejected += 1;
                    }
                }
            }

            engine.flush_audit().await;
            info!(applied, rejected, "journal replayed");
            let summary = finish_run(&engine, applied, rejected, output)?;

            drop(processor);
            drop(engine);
            let written = audit_worker.finish().await;
            debug!(written, "audit worker stopped");

            Ok(summary)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("Failed to write to temp file");
        file.flush().expect("Failed to flush temp file");
        file
    }

    fn run(config: BatchConfig, content: &str) -> (RunSummary, String) {
        let file = create_temp_csv(content);
        let mut output = Vec::new();
        let summary = AsyncProcessingStrategy::new(config, EngineConfig::default())
            .process(file.path(), &mut output)
            .unwrap();
        (summary, String::from_utf8(output).unwrap())
    }

    #[test]
    fn test_refund_cycle_with_audit_flush() {
        let (summary, output) = run(
            BatchConfig::default(),
            "type,sponsor,actor,tx,amount,memo\n\
             deposit,csr-1,,1,1000.00,\n\
             refund,csr-1,,2,300.00,\n\
             process,csr-1,admin-1,2,,\n",
        );

        assert_eq!(
            output,
            "sponsor,available,committed,refundable,pending\ncsr-1,700.00,0.00,700.00,0.00\n"
        );
        assert_eq!(summary.applied, 3);
        assert_eq!(summary.audit_trail.len(), 3);
    }

    #[test]
    fn test_ordering_across_batches() {
        // Batch size 2 splits each sponsor's cycle across batches
        let (summary, output) = run(
            BatchConfig::new(2, 2),
            "type,sponsor,actor,tx,amount,memo\n\
             deposit,csr-1,,1,500.00,\n\
             deposit,csr-2,,1,50.00,\n\
             refund,csr-1,,2,400.00,\n\
             refund,csr-1,,3,400.00,\n\
             process,csr-1,admin-1,2,,\n\
             process,csr-1,admin-1,3,,\n\
             refund,csr-2,,2,25.00,\n",
        );

        assert_eq!(summary.applied, 6);
        assert_eq!(summary.rejected, 1);
        assert_eq!(
            output,
            "sponsor,available,committed,refundable,pending\n\
             csr-1,100.00,0.00,100.00,400.00\n\
             csr-2,50.00,0.00,50.00,25.00\n"
        );
    }

    #[test]
    fn test_unreadable_rows_are_counted() {
        let (summary, output) = run(
            BatchConfig::new(2, 2),
            "type,sponsor,actor,tx,amount,memo\n\
             deposit,csr-1,,1,100.00,\n\
             withdraw,csr-1,,2,10.00,\n\
             deposit,csr-1,,x,1.00,\n\
             refund,csr-1,,3,40.00,\n",
        );

        assert_eq!(summary.applied, 2);
        assert_eq!(summary.rejected, 2);
        assert_eq!(
            output,
            "sponsor,available,committed,refundable,pending\ncsr-1,100.00,0.00,100.00,40.00\n"
        );
    }

    #[test]
    fn test_missing_file() {
        let mut output = Vec::new();
        let result = AsyncProcessingStrategy::new(BatchConfig::default(), EngineConfig::default())
            .process(Path::new("nonexistent.csv"), &mut output);

        assert!(matches!(
            result,
            Err(CsrError::IoError { message }) if message.contains("Failed to open file")
        ));
    }

    #[test]
    fn test_batch_config_zero_values_fall_back() {
        let config = BatchConfig::new(0, 0);
        assert_eq!(config, BatchConfig::default());
    }
}
