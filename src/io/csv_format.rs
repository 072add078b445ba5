//! Journal CSV format and report output
//!
//! This module centralizes all file format concerns:
//! - `JournalCsvRecord` structure for deserialization
//! - Conversion from journal rows to [`CommandRecord`]s
//! - Ledger CSV output and JSON report dumps
//!
//! Conversion and CSV writing are pure (no file I/O) for easy testing.
//!
//! # Journal Layout
//!
//! ```text
//! type,sponsor,actor,tx,amount,memo
//! deposit,csr-1,,1,1000.00,Q3 grant
//! refund,csr-1,,2,300.00,unused funds
//! process,csr-1,admin-1,2,,approved
//! ```
//!
//! `actor` may be left empty on `deposit` and `refund` rows, where it
//! defaults to the sponsor. `process` rows must name the admin.

use rust_decimal::prelude::RoundingStrategy;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use crate::core::LedgerSummary;
use crate::types::{CommandRecord, CommandType, CsrError, CsrResult, JournalRef};

/// Raw journal row
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct JournalCsvRecord {
    #[serde(rename = "type")]
    pub command: String,
    pub sponsor: String,
    #[serde(default)]
    pub actor: Option<String>,
    pub tx: JournalRef,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub memo: Option<String>,
}

fn parse_error(message: String) -> CsrError {
    CsrError::ParseError {
        line: None,
        message,
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Convert a raw journal row into a command
///
/// Command names are case-insensitive. `deposit` and `refund` rows need an
/// amount; amounts on `process` rows are ignored.
///
/// # Errors
///
/// `ParseError` (without a line number) for an unknown command, a blank
/// sponsor, an unparsable or missing amount, or a `process` row without an
/// actor.
pub fn convert_journal_record(row: JournalCsvRecord) -> CsrResult<CommandRecord> {
    let command = match row.command.trim().to_lowercase().as_str() {
        "deposit" => CommandType::Deposit,
        "refund" => CommandType::Refund,
        "process" => CommandType::Process,
        _ => {
            return Err(parse_error(format!(
                "Invalid command type: '{}' for tx {}",
                row.command, row.tx
            )))
        }
    };

    let sponsor = row.sponsor.trim().to_string();
    if sponsor.is_empty() {
        return Err(parse_error(format!("Missing sponsor for tx {}", row.tx)));
    }

    let amount = match non_blank(row.amount) {
        Some(raw) => Some(
            Decimal::from_str(&raw)
                .map_err(|_| parse_error(format!("Invalid amount '{}' for tx {}", raw, row.tx)))?,
        ),
        None => None,
    };

    let actor = match (command, non_blank(row.actor)) {
        (_, Some(actor)) => actor,
        (CommandType::Process, None) => {
            return Err(parse_error(format!(
                "process row for tx {} of {} requires an actor",
                row.tx, sponsor
            )))
        }
        (_, None) => sponsor.clone(),
    };

    let amount = match command {
        CommandType::Deposit | CommandType::Refund => {
            if amount.is_none() {
                return Err(parse_error(format!(
                    "{:?} tx {} for {} requires an amount",
                    command, row.tx, sponsor
                )));
            }
            amount
        }
        CommandType::Process => None,
    };

    Ok(CommandRecord {
        command,
        sponsor,
        actor,
        reference: row.tx,
        amount,
        memo: non_blank(row.memo),
    })
}

/// Attach a line number to a conversion error that has none
pub fn at_line(error: CsrError, line: u64) -> CsrError {
    match error {
        CsrError::ParseError {
            line: None,
            message,
        } => CsrError::ParseError {
            line: Some(line),
            message,
        },
        other => other,
    }
}

/// Write ledger summaries as CSV
///
/// Columns: `sponsor,available,committed,refundable,pending`, amounts with
/// two decimals, rows sorted by sponsor.
pub fn write_ledgers_csv(summaries: &[LedgerSummary], output: &mut dyn Write) -> CsrResult<()> {
    let mut writer = csv::Writer::from_writer(output);

    writer.write_record(["sponsor", "available", "committed", "refundable", "pending"])?;

    let mut sorted = summaries.to_vec();
    sorted.sort_by(|a, b| a.sponsor.cmp(&b.sponsor));

    for summary in sorted {
        writer.write_record(&[
            summary.sponsor,
            two_decimals(summary.available),
            two_decimals(summary.committed),
            two_decimals(summary.refundable),
            two_decimals(summary.pending),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

fn two_decimals(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.2}", rounded)
}

/// Dump a value as pretty-printed JSON to `path`
pub fn write_json_report<T: Serialize + ?Sized>(value: &T, path: &Path) -> CsrResult<()> {
    let file = File::create(path).map_err(|e| CsrError::IoError {
        message: format!("Failed to create '{}': {}", path.display(), e),
    })?;

    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
