//! Benchmark suite for comparing journal replay strategies
//!
//! Compares the synchronous and asynchronous strategies using the divan
//! benchmarking framework.
//!
//! # Running Benchmarks
//!
//! ```bash
//! cargo bench
//! ```
//!
//! # Journals
//!
//! Journals are generated into temporary files before timing starts. Each
//! one spreads deposit, refund and process cycles over 20 sponsors, so
//! every refund is approved and every deposit issues an invoice.

use csr_fund_engine::cli::StrategyType;
use csr_fund_engine::config::EngineConfig;
use csr_fund_engine::strategy::{create_strategy, BatchConfig};
use divan::Bencher;
use std::io::Write;
use tempfile::NamedTempFile;

const SPONSORS: usize = 20;

fn main() {
    divan::main();
}

/// Write a journal of roughly `rows` rows in deposit/refund/process cycles
fn write_journal(rows: usize) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    writeln!(file, "type,sponsor,actor,tx,amount,memo").expect("Failed to write header");

    for cycle in 0..rows.div_ceil(3) {
        let sponsor = format!("csr-{}", cycle % SPONSORS);
        let base = (cycle / SPONSORS) as u32 * 2;
        writeln!(file, "deposit,{},,{},1000.00,grant", sponsor, base + 1)
            .and_then(|_| writeln!(file, "refund,{},,{},100.00,unused", sponsor, base + 2))
            .and_then(|_| writeln!(file, "process,{},admin-1,{},,approved", sponsor, base + 2))
            .expect("Failed to write journal row");
    }

    file.flush().expect("Failed to flush journal");
    file
}

#[divan::bench(args = [100, 1_000, 10_000])]
fn sync_strategy(bencher: Bencher, rows: usize) {
    let journal = write_journal(rows);
    let strategy = create_strategy(StrategyType::Sync, EngineConfig::default(), None);

    bencher.bench_local(|| {
        let mut output = Vec::new();
        strategy
            .process(journal.path(), &mut output)
            .expect("Processing failed")
    });
}

#[divan::bench(args = [100, 1_000, 10_000])]
fn async_strategy(bencher: Bencher, rows: usize) {
    let journal = write_journal(rows);
    let strategy = create_strategy(
        StrategyType::Async,
        EngineConfig::default(),
        Some(BatchConfig::default()),
    );

    bencher.bench_local(|| {
        let mut output = Vec::new();
        strategy
            .process(journal.path(), &mut output)
            .expect("Processing failed")
    });
}
