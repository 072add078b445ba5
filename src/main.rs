//! CSR Fund Engine CLI
//!
//! Replays a journal of sponsor deposits and refunds from a CSV file.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- journal.csv > ledgers.csv
//! cargo run -- --strategy sync journal.csv > ledgers.csv
//! cargo run -- --strategy async --batch-size 2000 --max-concurrent 8 journal.csv > ledgers.csv
//! cargo run -- --invoices invoices.json --audit audit.json journal.csv > ledgers.csv
//! ```
//!
//! The final sponsor ledgers are written to stdout as CSV. Issued invoices
//! and the audit trail can be written as JSON reports. Logs go to stderr
//! and are filtered with `CSR_LOG` (default `info`).
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (file not found, file not readable, report not writable, etc.)

use csr_fund_engine::{cli, io, logging, strategy, CsrResult};
use std::process;
use tracing::{error, info};

fn main() {
    logging::init_tracing();
    let args = cli::parse_args();

    if let Err(e) = run(&args) {
        error!(error = %e, "journal run failed");
        process::exit(1);
    }
}

fn run(args: &cli::CliArgs) -> CsrResult<()> {
    let batch = if matches!(args.strategy, cli::StrategyType::Async) {
        Some(args.to_batch_config())
    } else {
        None
    };
    let strategy = strategy::create_strategy(args.strategy, args.to_engine_config(), batch);

    let mut output = std::io::stdout();
    let summary = strategy.process(&args.input_file, &mut output)?;

    if let Some(path) = &args.invoices_report {
        io::write_json_report(&summary.invoices, path)?;
        info!(path = %path.display(), count = summary.invoices.len(), "invoice report written");
    }

    if let Some(path) = &args.audit_report {
        io::write_json_report(&summary.audit_trail, path)?;
        info!(path = %path.display(), count = summary.audit_trail.len(), "audit report written");
    }

    Ok(())
}
