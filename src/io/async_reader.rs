//! Asynchronous journal reader with batch interface
//!
//! Reads journal rows with `csv-async` and hands them out in batches for
//! the batch processor.
//!
//! ```text
//! AsyncRead ──▶ AsyncReader ──read_batch──▶ Vec<CsrResult<CommandRecord>>
//!                    │
//!               csv_format
//!     (JournalCsvRecord, convert_journal_record)
//! ```

use csv_async::AsyncReaderBuilder;
use futures::io::AsyncRead;
use futures::stream::StreamExt;

use crate::io::csv_format::{at_line, convert_journal_record, JournalCsvRecord};
use crate::types::{CommandRecord, CsrError, CsrResult};

/// Asynchronous journal reader
pub struct AsyncReader<R: AsyncRead + Unpin> {
    csv_reader: csv_async::AsyncDeserializer<R>,
    line_num: u64,
}

impl<R: AsyncRead + Unpin + Send + 'static> AsyncReader<R> {
    pub fn new(reader: R) -> Self {
        let csv_reader = AsyncReaderBuilder::new()
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_deserializer(reader);

        Self {
            csv_reader,
            line_num: 1,
        }
    }

    /// Read up to `batch_size` journal rows
    ///
    /// Rows that fail to parse or convert come back as `ParseError`s with
    /// their line number (the header is line 1), in journal order with the
    /// good ones. An empty batch means the journal is exhausted.
    pub async fn read_batch(&mut self, batch_size: usize) -> Vec<CsrResult<CommandRecord>> {
        let mut batch = Vec::with_capacity(batch_size);
        let mut rows = self.csv_reader.deserialize::<JournalCsvRecord>();

        while batch.len() < batch_size {
            let Some(row) = rows.next().await else {
                break;
            };
            self.line_num += 1;

            batch.push(match row {
                Ok(row) => convert_journal_record(row).map_err(|e| at_line(e, self.line_num)),
                Err(e) => Err(CsrError::ParseError {
                    line: Some(self.line_num),
                    message: e.to_string(),
                }),
            });
        }

        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CommandType;
    use futures::io::Cursor;
    use rust_decimal::Decimal;

    fn reader(rows: &str) -> AsyncReader<Cursor<Vec<u8>>> {
        let content = format!("type,sponsor,actor,tx,amount,memo\n{}", rows);
        AsyncReader::new(Cursor::new(content.into_bytes()))
    }

    fn records(batch: Vec<CsrResult<CommandRecord>>) -> Vec<CommandRecord> {
        batch.into_iter().map(|r| r.unwrap()).collect()
    }

    #[tokio::test]
    async fn test_read_in_batches() {
        let mut reader = reader(
            "deposit,csr-1,,1,100.0,\n\
             refund,csr-1,,2,50.0,\n\
             deposit,csr-2,,1,200.0,\n",
        );

        let first = records(reader.read_batch(2).await);
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].command, CommandType::Deposit);
        assert_eq!(first[1].command, CommandType::Refund);

        let second = records(reader.read_batch(2).await);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].sponsor, "csr-2");

        assert!(reader.read_batch(2).await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_journal() {
        assert!(reader("").read_batch(10).await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_rows_are_reported_in_order() {
        let mut reader = reader(
            "withdraw,csr-1,,1,100.0,\n\
             process,csr-1,,2,,\n\
             deposit,csr-1,,x,1.0,\n\
             deposit,csr-1,,3,bad,\n\
             deposit,csr-1,,4,50.0,\n",
        );

        let batch = reader.read_batch(10).await;
        assert_eq!(batch.len(), 5);

        let failed_lines: Vec<Option<u64>> = batch
            .iter()
            .filter_map(|r| match r {
                Err(CsrError::ParseError { line, .. }) => Some(*line),
                _ => None,
            })
            .collect();
        assert_eq!(failed_lines, vec![Some(2), Some(3), Some(4), Some(5)]);

        let record = batch[4].as_ref().unwrap();
        assert_eq!(record.reference, 4);
        assert_eq!(record.amount, Some(Decimal::new(500, 1)));
    }

    #[tokio::test]
    async fn test_rejected_rows_count_towards_batch_size() {
        let mut reader = reader(
            "withdraw,csr-1,,1,100.0,\n\
             deposit,csr-1,,2,50.0,\n\
             deposit,csr-1,,3,25.0,\n",
        );

        let first = reader.read_batch(2).await;
        assert_eq!(first.len(), 2);
        assert!(first[0].is_err());
        assert!(first[1].is_ok());

        let second = records(reader.read_batch(2).await);
        assert_eq!(second[0].reference, 3);
    }

    #[tokio::test]
    async fn test_process_rows_keep_actor() {
        let mut reader = reader("process,csr-1,admin-7,2,,ok\n");

        let batch = records(reader.read_batch(10).await);
        assert_eq!(batch[0].actor, "admin-7");
        assert_eq!(batch[0].memo.as_deref(), Some("ok"));
    }
}
