//! Archive Source: a buffered zip payload as a lazy sequence of entries
//!
//! Entries are handed out one at a time and each borrows the archive, so
//! two entries can never be read concurrently. Directory entries are
//! skipped silently.
//!
//! `file_number` is the decoder's 1-based ordinal of the entry among *all*
//! entries, directories included, and `total_files` is the decoder's full
//! entry count. An archive holding `gtfs/` followed by `gtfs/stops.txt`
//! therefore reports the stops file as number 2 of 2.

use crate::error::{ImportError, Result};
use crate::rows::RowSource;
use std::io::{Cursor, Read};
use tracing::debug;
use zip::ZipArchive;

/// Decoded archive cursor
pub struct ArchiveSource {
    archive: ZipArchive<Cursor<Vec<u8>>>,
    next_index: usize,
}

/// One data file inside the archive
pub struct Entry<'a> {
    name: String,
    file_number: usize,
    total_files: usize,
    rows: RowSource<Box<dyn Read + 'a>>,
}

impl ArchiveSource {
    /// Open a fully buffered archive; a corrupt container fails here
    pub fn open(bytes: Vec<u8>) -> Result<Self> {
        let archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| ImportError::Decode(format!("Failed to open archive: {}", e)))?;

        debug!(entries = archive.len(), "Opened feed archive");

        Ok(Self {
            archive,
            next_index: 0,
        })
    }

    /// Entry count reported by the decoder, directories included
    pub fn total_files(&self) -> usize {
        self.archive.len()
    }

    /// Advance to the next non-directory entry
    pub fn next_entry(&mut self) -> Option<Result<Entry<'_>>> {
        let total_files = self.archive.len();

        let index = loop {
            if self.next_index >= total_files {
                return None;
            }
            let index = self.next_index;
            self.next_index += 1;

            let is_dir = match self.archive.by_index_raw(index) {
                Ok(file) => file.is_dir(),
                Err(e) => return Some(Err(entry_error(index, e))),
            };
            if !is_dir {
                break index;
            }
            debug!(index, "Skipping directory entry");
        };

        let file = match self.archive.by_index(index) {
            Ok(file) => file,
            Err(e) => return Some(Err(entry_error(index, e))),
        };

        let name = file.name().to_string();
        let total_bytes = file.size();
        let input: Box<dyn Read + '_> = Box::new(file);

        Some(Ok(Entry {
            rows: RowSource::new(name.clone(), input, total_bytes),
            name,
            file_number: index + 1,
            total_files,
        }))
    }
}

fn entry_error(index: usize, err: zip::result::ZipError) -> ImportError {
    ImportError::Decode(format!("Failed to open archive entry #{}: {}", index + 1, err))
}

impl<'a> Entry<'a> {
    /// File name inside the archive, e.g. `stop_times.txt`
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file_number(&self) -> usize {
        self.file_number
    }

    pub fn total_files(&self) -> usize {
        self.total_files
    }

    /// Consume the entry into its record sequence
    pub fn into_rows(self) -> RowSource<Box<dyn Read + 'a>> {
        self.rows
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::test_support::{build_archive, ArchiveItem};

    #[test]
    fn test_entries_in_archive_order() {
        let bytes = build_archive(&[
            ArchiveItem::File("agency.txt", "agency_id,agency_name\n1,MARTA\n"),
            ArchiveItem::File("stops.txt", "stop_id\n1\n2\n"),
        ]);
        let mut archive = ArchiveSource::open(bytes).unwrap();
        assert_eq!(archive.total_files(), 2);

        let entry = archive.next_entry().unwrap().unwrap();
        assert_eq!(entry.name(), "agency.txt");
        assert_eq!((entry.file_number(), entry.total_files()), (1, 2));
        let rows: Vec<_> = entry.into_rows().collect::<Result<_>>().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("agency_name"), Some("MARTA"));

        let entry = archive.next_entry().unwrap().unwrap();
        assert_eq!(entry.name(), "stops.txt");
        assert_eq!(entry.into_rows().count(), 2);

        assert!(archive.next_entry().is_none());
    }

    #[test]
    fn test_directories_are_skipped_but_counted() {
        let bytes = build_archive(&[
            ArchiveItem::Dir("feed/"),
            ArchiveItem::Dir("feed/extra/"),
            ArchiveItem::File("feed/stops.txt", "stop_id\n1\n"),
        ]);
        let mut archive = ArchiveSource::open(bytes).unwrap();

        let entry = archive.next_entry().unwrap().unwrap();
        assert_eq!(entry.name(), "feed/stops.txt");
        assert_eq!(entry.file_number(), 3);
        assert_eq!(entry.total_files(), 3);
        drop(entry);

        assert!(archive.next_entry().is_none());
    }

    #[test]
    fn test_archive_of_only_directories_is_empty() {
        let bytes = build_archive(&[ArchiveItem::Dir("a/"), ArchiveItem::Dir("b/")]);
        let mut archive = ArchiveSource::open(bytes).unwrap();
        assert!(archive.next_entry().is_none());
    }

    #[test]
    fn test_total_bytes_is_uncompressed_size() {
        let data = "stop_id,stop_name\n1,A\n";
        let bytes = build_archive(&[ArchiveItem::File("stops.txt", data)]);
        let mut archive = ArchiveSource::open(bytes).unwrap();

        let rows: Vec<_> = archive
            .next_entry()
            .unwrap()
            .unwrap()
            .into_rows()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(rows[0].total_bytes, data.len() as u64);
        assert_eq!(rows[0].bytes_read, data.len() as u64);
    }

    #[test]
    fn test_corrupt_archive_fails_on_open() {
        let err = ArchiveSource::open(b"definitely not a zip file".to_vec())
            .err()
            .unwrap();
        assert!(matches!(err, ImportError::Decode(_)));
    }
}
