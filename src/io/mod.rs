//! I/O module
//!
//! Handles journal parsing and report output.
//!
//! # Components
//!
//! - `csv_format` - Journal row conversion, ledger CSV and JSON reports
//! - `sync_reader` - Synchronous journal reader with iterator interface
//! - `async_reader` - Asynchronous journal reader with batch interface

pub mod async_reader;
pub mod csv_format;
pub mod sync_reader;

pub use async_reader::AsyncReader;
pub use csv_format::{
    convert_journal_record, write_json_report, write_ledgers_csv, JournalCsvRecord,
};
pub use sync_reader::SyncReader;
