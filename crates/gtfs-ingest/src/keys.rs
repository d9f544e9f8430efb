//! Key Assigner: stable document ids for GTFS rows
//!
//! A row of table `stops` with `stop_id = 42` imported into namespace
//! `gtfs` becomes document `gtfs/stops/42`. Multi-column keys are joined
//! with `/` in declared order (`gtfs/stop_times/T1/3`). Values are not
//! escaped, so a key value containing `/` can collide with a different
//! multi-column key.

use crate::error::{ImportError, Result};
use crate::rows::Record;
use crate::store::Document;
use serde_json::{Map, Value};

/// Known tables and their primary-key columns
const PRIMARY_KEYS: &[(&str, &[&str])] = &[
    ("agency", &["agency_id"]),
    ("calendar_dates", &["service_id", "date"]),
    ("calendar", &["service_id"]),
    ("routes", &["route_id"]),
    ("shapes", &["shape_id", "shape_pt_sequence"]),
    ("stop_times", &["trip_id", "stop_sequence"]),
    ("stops", &["stop_id"]),
    ("trips", &["trip_id"]),
];

/// Primary-key columns of a registered table
pub fn primary_key_columns(table: &str) -> Result<&'static [&'static str]> {
    PRIMARY_KEYS
        .iter()
        .find(|(name, _)| *name == table)
        .map(|(_, columns)| *columns)
        .ok_or_else(|| ImportError::UnknownTable(table.to_string()))
}

/// Table name of an archive entry: the entry name without its extension
pub fn table_name(entry_name: &str) -> &str {
    match entry_name.rfind('.') {
        Some(dot) if !entry_name[dot..].contains('/') => &entry_name[..dot],
        _ => entry_name,
    }
}

/// `{namespace}/{table}/{key values joined by '/'}`
pub fn document_id(
    namespace: &str,
    table: &str,
    record: &Record,
    primary_key_columns: &[&str],
) -> Result<String> {
    let mut id = format!("{}/{}", namespace, table);
    for column in primary_key_columns {
        let value = record
            .get(column)
            .ok_or_else(|| ImportError::MissingKeyColumn {
                table: table.to_string(),
                column: column.to_string(),
            })?;
        id.push('/');
        id.push_str(value);
    }
    Ok(id)
}

/// Key assignment bound to one table of one namespace
#[derive(Debug, Clone)]
pub struct KeyAssigner {
    namespace: String,
    table: String,
    columns: &'static [&'static str],
}

impl KeyAssigner {
    /// Fails with [`ImportError::UnknownTable`] for unregistered tables
    pub fn new(namespace: impl Into<String>, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        let columns = primary_key_columns(&table)?;
        Ok(Self {
            namespace: namespace.into(),
            table,
            columns,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn document_id(&self, record: &Record) -> Result<String> {
        document_id(&self.namespace, &self.table, record, self.columns)
    }

    /// Build the storage document for a record
    pub fn document(&self, record: Record) -> Result<Document> {
        let id = self.document_id(&record)?;
        let fields: Map<String, Value> = record
            .columns
            .into_iter()
            .map(|(column, value)| (column, Value::String(value)))
            .collect();
        Ok(Document::new(id, fields))
    }
}
