//! Synchronous journal reader with iterator interface
//!
//! Streams [`CommandRecord`]s out of a journal CSV file one row at a time,
//! delegating format concerns to the `csv_format` module.
//!
//! ```no_run
//! use csr_fund_engine::io::sync_reader::SyncReader;
//! use std::path::Path;
//!
//! let reader = SyncReader::new(Path::new("journal.csv")).unwrap();
//! for result in reader {
//!     match result {
//!         Ok(record) => println!("Applying {:?}", record),
//!         Err(e) => eprintln!("Error: {}", e),
//!     }
//! }
//! ```
//!
//! Failing to open the file is returned from `new()`. Bad rows are yielded
//! as `ParseError`s carrying their line number (the header is line 1), and
//! iteration continues with the next row.

use csv::{ReaderBuilder, Trim};
use std::fs::File;
use std::path::Path;

use crate::io::csv_format::{at_line, convert_journal_record, JournalCsvRecord};
use crate::types::{CommandRecord, CsrError, CsrResult};

/// Synchronous journal reader
#[derive(Debug)]
pub struct SyncReader {
    reader: csv::Reader<File>,
    line_num: u64,
}

impl SyncReader {
    /// Open a journal file
    ///
    /// Fields are trimmed and short rows are accepted, since trailing
    /// optional columns may be left off.
    pub fn new(path: &Path) -> CsrResult<Self> {
        let file = File::open(path).map_err(|e| CsrError::IoError {
            message: format!("Failed to open file '{}': {}", path.display(), e),
        })?;

        let reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .buffer_capacity(8 * 1024)
            .from_reader(file);

        Ok(Self {
            reader,
            line_num: 1,
        })
    }
}

impl Iterator for SyncReader {
    type Item = CsrResult<CommandRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut rows = self.reader.deserialize::<JournalCsvRecord>();
        let row = rows.next()?;
        self.line_num += 1;

        Some(match row {
            Ok(row) => convert_journal_record(row).map_err(|e| at_line(e, self.line_num)),
            Err(e) => Err(CsrError::ParseError {
                line: Some(self.line_num),
                message: e.to_string(),
            }),
        })
    }
}
