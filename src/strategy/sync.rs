//! Synchronous processing strategy
//!
//! Streams the journal through a [`SyncReader`] and applies each command to
//! a [`CsrEngine`] on the calling thread, in file order. Audit entries are
//! written inline.

use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::core::CsrEngine;
use crate::io::sync_reader::SyncReader;
use crate::strategy::{finish_run, ProcessingStrategy, RunSummary};
use crate::types::CsrResult;

/// Single-threaded journal replay
#[derive(Debug, Clone, Default)]
pub struct SyncProcessingStrategy {
    config: EngineConfig,
}

impl SyncProcessingStrategy {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }
}

impl ProcessingStrategy for SyncProcessingStrategy {
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> CsrResult<RunSummary> {
        let engine = CsrEngine::new(self.config.clone());
        let reader = SyncReader::new(input_path)?;

        let mut applied = 0;
        let mut rejected = 0;

        for result in reader {
            match result {
                Ok(record) => {
                    let (command, reference) = (record.command, record.reference);
                    let sponsor = record.sponsor.clone();

                    match engine.process(record) {
                        Ok(_) => applied += 1,
                        Err(e) => {
                            rejected += 1;
                            warn!(?command, %sponsor, reference, error = %e, "command rejected");
                        }
                    }
                }
                Err(e) => {
                    rejected += 1;
                    warn!(error = %e, "journal row rejected");
                }
            }
        }

        info!(applied, rejected, "journal replayed");
        finish_run(&engine, applied, rejected, output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CsrError, InvoiceType};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("Failed to write to temp file");
        file.flush().expect("Failed to flush temp file");
        file
    }

    fn run(content: &str) -> (RunSummary, String) {
        let file = create_temp_csv(content);
        let mut output = Vec::new();
        let summary = SyncProcessingStrategy::default()
            .process(file.path(), &mut output)
            .unwrap();
        (summary, String::from_utf8(output).unwrap())
    }

    #[test]
    fn test_refund_cycle() {
        let (summary, output) = run("type,sponsor,actor,tx,amount,memo\n\
             deposit,csr-1,,1,1000.00,Q3 grant\n\
             refund,csr-1,,2,300.00,unused funds\n\
             process,csr-1,admin-1,2,,approved\n");

        assert_eq!(
            output,
            "sponsor,available,committed,refundable,pending\ncsr-1,700.00,0.00,700.00,0.00\n"
        );
        assert_eq!(summary.applied, 3);
        assert_eq!(summary.rejected, 0);
        assert_eq!(summary.audit_trail.len(), 3);
        assert_eq!(summary.invoices.len(), 2);
        assert!(summary
            .invoices
            .iter()
            .any(|i| i.invoice_type == InvoiceType::CreditNote));
    }

    #[test]
    fn test_rejections_are_counted_and_skipped() {
        let (summary, output) = run("type,sponsor,actor,tx,amount,memo\n\
             deposit,csr-1,,1,100.00,\n\
             refund,csr-1,,2,150.00,\n\
             deposit,csr-2,,1,bad,\n\
             refund,csr-1,,3,40.00,\n");

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
        let result =
            SyncProcessingStrategy::default().process(Path::new("nonexistent.csv"), &mut output);

        assert!(matches!(result, Err(CsrError::IoError { .. })));
        assert!(output.is_empty());
    }

    #[test]
    fn test_sync_strategy_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SyncProcessingStrategy>();
    }
}
