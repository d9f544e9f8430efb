//! Synthetic feed archives, shared by unit and integration tests

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub enum ArchiveItem<'a> {
    File(&'a str, &'a str),
    Dir(&'a str),
}

/// Zip with stored (uncompressed) entries so byte counters are exact
pub fn build_archive(items: &[ArchiveItem<'_>]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    for item in items {
        match item {
            ArchiveItem::File(name, contents) => {
                writer.start_file(*name, options).unwrap();
                writer.write_all(contents.as_bytes()).unwrap();
            },
            ArchiveItem::Dir(name) => {
                writer.add_directory(*name, options).unwrap();
            },
        }
    }

    writer.finish().unwrap().into_inner()
}
