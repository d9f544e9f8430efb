//! Row Source: one table file as a lazy sequence of records
//!
//! The first line of the file is the header row; blank lines are skipped and
//! every other line must have exactly as many fields as the header. Each
//! [`Record`] carries how many bytes had been pulled from the underlying
//! stream when the record became available. The parser buffers its input,
//! so the count moves in buffer-sized steps and covers bytes (such as
//! trailing blank lines) that never become part of a record. It is only
//! ever used for progress display.

use crate::error::{ImportError, Result};
use csv::{ReaderBuilder, StringRecord};
use std::collections::BTreeMap;
use std::io::{self, Read};

/// One parsed row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Header name -> raw field value
    pub columns: BTreeMap<String, String>,

    /// Bytes pulled from the input stream once this record was parsed
    pub bytes_read: u64,

    /// Expected size of the whole file in bytes
    pub total_bytes: u64,
}

impl Record {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns.get(column).map(String::as_str)
    }
}

/// Pull-based record reader over one table file
///
/// Single pass and forward only. After the first error the source is
/// exhausted; malformed rows are never skipped.
pub struct RowSource<R: Read> {
    entry: String,
    reader: csv::Reader<CountingReader<R>>,
    headers: Option<StringRecord>,
    row: StringRecord,
    total_bytes: u64,
    finished: bool,
}

impl<R: Read> RowSource<R> {
    /// `entry` names the file in errors; `total_bytes` is its expected size
    pub fn new(entry: impl Into<String>, input: R, total_bytes: u64) -> Self {
        let reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(CountingReader::new(input));

        Self {
            entry: entry.into(),
            reader,
            headers: None,
            row: StringRecord::new(),
            total_bytes,
            finished: false,
        }
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    fn read_next(&mut self) -> Result<Option<Record>> {
        if self.headers.is_none() {
            let headers = self
                .reader
                .headers()
                .map_err(|e| parse_error(&self.entry, e))?
                .clone();
            self.headers = Some(headers);
        }

        let has_row = self
            .reader
            .read_record(&mut self.row)
            .map_err(|e| parse_error(&self.entry, e))?;
        if !has_row {
            return Ok(None);
        }

        let columns = match &self.headers {
            Some(headers) => headers
                .iter()
                .zip(self.row.iter())
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            None => BTreeMap::new(),
        };

        Ok(Some(Record {
            columns,
            bytes_read: self.reader.get_ref().count(),
            total_bytes: self.total_bytes,
        }))
    }
}

/// Read adapter tallying the bytes handed out by its inner reader
struct CountingReader<R> {
    inner: R,
    count: u64,
}

impl<R> CountingReader<R> {
    fn new(inner: R) -> Self {
        Self { inner, count: 0 }
    }

    fn count(&self) -> u64 {
        self.count
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        Ok(n)
    }
}

fn parse_error(entry: &str, source: csv::Error) -> ImportError {
    ImportError::Parse {
        entry: entry.to_string(),
        source,
    }
}

impl<R: Read> Iterator for RowSource<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.read_next() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.finished = true;
                None
            },
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn source(data: &'static str) -> RowSource<&'static [u8]> {
        RowSource::new("stops.txt", data.as_bytes(), data.len() as u64)
    }

    #[test]
    fn test_records_map_headers_to_values() {
        let records: Vec<_> = source("stop_id,stop_name\n1,Five Points\n2,Peachtree Center\n")
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("stop_id"), Some("1"));
        assert_eq!(records[1].get("stop_name"), Some("Peachtree Center"));
    }

    #[test]
    fn test_byte_counters_are_monotonic_and_reach_total() {
        let data = "stop_id,stop_name\n1,A\n2,B\n3,C\n";
        let records: Vec<_> = source(data).collect::<Result<_>>().unwrap();

        let positions: Vec<u64> = records.iter().map(|r| r.bytes_read).collect();
        assert!(positions.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*positions.last().unwrap(), data.len() as u64);
        assert!(records.iter().all(|r| r.total_bytes == data.len() as u64));
    }

    #[test]
    fn test_trailing_blank_lines_count_toward_bytes_read() {
        let data = "stop_id\n1\n2\n\n\n";
        let records: Vec<_> = source(data).collect::<Result<_>>().unwrap();

        assert_eq!(records.len(), 2);
        let last = records.last().unwrap();
        assert_eq!(last.bytes_read, last.total_bytes);
    }

    #[test]
    fn test_bytes_read_grows_with_small_reads() {
        // one byte per read call
        struct Trickle<'a>(&'a [u8]);

        impl Read for Trickle<'_> {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                match (self.0.split_first(), buf.first_mut()) {
                    (Some((byte, rest)), Some(slot)) => {
                        *slot = *byte;
                        self.0 = rest;
                        Ok(1)
                    },
                    _ => Ok(0),
                }
            }
        }

        let data = "stop_id\n1\n2\n";
        let records: Vec<_> = RowSource::new("stops.txt", Trickle(data.as_bytes()), 12)
            .collect::<Result<_>>()
            .unwrap();

        let positions: Vec<u64> = records.iter().map(|r| r.bytes_read).collect();
        assert!(positions[0] < positions[1]);
        assert!(positions[1] <= data.len() as u64);
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let records: Vec<_> = source("stop_id\n1\n\n\n2\n")
            .collect::<Result<_>>()
            .unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.get("stop_id").unwrap()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn test_quoted_fields() {
        let records: Vec<_> = source("stop_id,stop_desc\n1,\"Corner of A, B\"\n")
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(records[0].get("stop_desc"), Some("Corner of A, B"));
    }

    #[test]
    fn test_malformed_row_fails_and_fuses() {
        let mut rows = source("stop_id,stop_name\n1,A\n2,B,extra\n3,C\n");

        assert!(rows.next().unwrap().is_ok());
        match rows.next().unwrap() {
            Err(ImportError::Parse { entry, .. }) => assert_eq!(entry, "stops.txt"),
            other => panic!("expected parse error, got {:?}", other),
        }
        assert!(rows.next().is_none());
    }

    #[test]
    fn test_empty_file_yields_nothing() {
        assert_eq!(source("").count(), 0);
        assert_eq!(source("stop_id,stop_name\n").count(), 0);
    }
}
