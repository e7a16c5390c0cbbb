use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use chronicle_core::RecordId;

use crate::error::StoreError;
use crate::row_helpers;

/// The persisted unit: one appended message plus its extracted metadata.
///
/// Immutable once written; the log never updates or deletes rows.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: RecordId,
    pub source_id: String,
    pub kind: String,
    pub assembly_name: String,
    pub full_name: String,
    pub namespace: String,
    pub type_name: String,
    pub source_type: String,
    pub creation_date: String,
    pub payload: String,
}

/// Column list shared by the insert and select paths. Order matters: the
/// row mapping below reads by position.
pub(crate) const COLUMNS: &str =
    "id, source_id, kind, assembly_name, full_name, namespace, type_name, source_type, creation_date, payload";

/// Render a timestamp as RFC 3339 UTC with fixed six-digit fractional
/// seconds and a `Z` suffix. Fixed width means lexicographic comparison of
/// stored values equals chronological comparison, which the creation-date
/// range predicate relies on.
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Map a `message_log` row to a record. `offset` is the position of the
/// first record column in the SELECT.
pub(crate) fn row_to_record(
    row: &rusqlite::Row<'_>,
    offset: usize,
) -> Result<MessageRecord, StoreError> {
    const TABLE: &str = "message_log";
    Ok(MessageRecord {
        id: RecordId::from_raw(row_helpers::get::<String>(row, offset, TABLE, "id")?),
        source_id: row_helpers::get(row, offset + 1, TABLE, "source_id")?,
        kind: row_helpers::get(row, offset + 2, TABLE, "kind")?,
        assembly_name: row_helpers::get(row, offset + 3, TABLE, "assembly_name")?,
        full_name: row_helpers::get(row, offset + 4, TABLE, "full_name")?,
        namespace: row_helpers::get(row, offset + 5, TABLE, "namespace")?,
        type_name: row_helpers::get(row, offset + 6, TABLE, "type_name")?,
        source_type: row_helpers::get(row, offset + 7, TABLE, "source_type")?,
        creation_date: row_helpers::get(row, offset + 8, TABLE, "creation_date")?,
        payload: row_helpers::get(row, offset + 9, TABLE, "payload")?,
    })
}
