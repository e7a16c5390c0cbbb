use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::Connection;
use tracing::info;
use uuid::Uuid;

use crate::criteria::{Clause, Filter};
use crate::error::StoreError;
use crate::record::{self, MessageRecord};
use crate::row_helpers;
use crate::schema;

/// Where the log lives and how to reach it.
///
/// Created once, cloned freely. Schema setup runs at construction; after
/// that the config only hands out scoped sessions. Every save call and every
/// cursor opens its own session, so nothing here is shared mutable state.
#[derive(Clone)]
pub struct ConnectionConfig {
    path: PathBuf,
    // Pins a shared in-memory database for the lifetime of the config.
    // Never used to run statements.
    _anchor: Option<Arc<Mutex<Connection>>>,
}

impl ConnectionConfig {
    /// Configuration backed by a database file, created if absent.
    pub fn file(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Io(format!("create dir: {e}")))?;
        }

        let conn = Connection::open(path).map_err(|e| StoreError::Database(e.to_string()))?;
        apply_schema(&conn)?;

        info!(path = %path.display(), "message log database ready");

        Ok(Self {
            path: path.to_owned(),
            _anchor: None,
        })
    }

    /// Configuration backed by a process-private in-memory database.
    ///
    /// Uses a shared-cache URI so that the per-call sessions all observe the
    /// same data; the anchor connection keeps the database alive between
    /// sessions.
    pub fn in_memory() -> Result<Self, StoreError> {
        let uri = format!("file:chronicle-{}?mode=memory&cache=shared", Uuid::now_v7());
        let anchor = Connection::open(&uri).map_err(|e| StoreError::Database(e.to_string()))?;
        apply_schema(&anchor)?;

        Ok(Self {
            path: PathBuf::from(uri),
            _anchor: Some(Arc::new(Mutex::new(anchor))),
        })
    }

    /// Open a scoped session. The session owns its connection and releases
    /// it on drop.
    pub fn open(&self) -> Result<Session, StoreError> {
        let conn =
            Connection::open(&self.path).map_err(|e| StoreError::Database(e.to_string()))?;
        conn.execute_batch(schema::SESSION_PRAGMAS)
            .map_err(|e| StoreError::Database(format!("session pragmas: {e}")))?;
        Ok(Session { conn })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn apply_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(schema::SETUP_PRAGMAS)
        .map_err(|e| StoreError::Database(format!("pragmas: {e}")))?;
    conn.execute_batch(schema::CREATE_TABLES)
        .map_err(|e| StoreError::Database(format!("schema: {e}")))?;

    let version: Option<u32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .ok();

    if version.is_none() {
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [schema::SCHEMA_VERSION],
        )
        .map_err(|e| StoreError::Database(format!("schema version: {e}")))?;
    }

    Ok(())
}

/// A scoped connection to the store. One per save call, one per cursor.
pub struct Session {
    conn: Connection,
}

impl Session {
    /// Append one record. Single-statement insert; readers never observe a
    /// partial row.
    pub fn append(&self, record: &MessageRecord) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO message_log ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            record::COLUMNS
        );
        self.conn.execute(
            &sql,
            rusqlite::params![
                record.id.as_str(),
                record.source_id,
                record.kind,
                record.assembly_name,
                record.full_name,
                record.namespace,
                record.type_name,
                record.source_type,
                record.creation_date,
                record.payload,
            ],
        )?;
        Ok(())
    }

    /// Fetch the next batch of rows matching `filter` with rowid greater
    /// than `after_rowid`, in rowid order. Returns (rowid, record) pairs so
    /// the caller can resume where the batch ended.
    pub fn select_batch(
        &self,
        filter: &Filter,
        after_rowid: i64,
        limit: u32,
    ) -> Result<Vec<(i64, MessageRecord)>, StoreError> {
        let mut sql = format!(
            "SELECT rowid, {} FROM message_log WHERE rowid > ?1",
            record::COLUMNS
        );
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(after_rowid)];

        for clause in filter.clauses() {
            match clause {
                Clause::Eq { column, value } => {
                    sql.push_str(&format!(" AND {} = ?{}", column.name(), params.len() + 1));
                    params.push(Box::new(value.clone()));
                }
                Clause::InSet { column, values } => {
                    let mut placeholders = Vec::with_capacity(values.len());
                    for value in values {
                        params.push(Box::new(value.clone()));
                        placeholders.push(format!("?{}", params.len()));
                    }
                    sql.push_str(&format!(
                        " AND {} IN ({})",
                        column.name(),
                        placeholders.join(", ")
                    ));
                }
                Clause::Range { column, from, to } => {
                    if let Some(from) = from {
                        sql.push_str(&format!(" AND {} >= ?{}", column.name(), params.len() + 1));
                        params.push(Box::new(from.clone()));
                    }
                    if let Some(to) = to {
                        sql.push_str(&format!(" AND {} <= ?{}", column.name(), params.len() + 1));
                        params.push(Box::new(to.clone()));
                    }
                }
            }
        }

        sql.push_str(&format!(" ORDER BY rowid LIMIT ?{}", params.len() + 1));
        params.push(Box::new(limit));

        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            params.iter().map(|p| p.as_ref()).collect();
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(param_refs.as_slice())?;

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let rowid: i64 = row_helpers::get(row, 0, "message_log", "rowid")?;
            out.push((rowid, record::row_to_record(row, 1)?));
        }
        Ok(out)
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::{translate, Criteria};
    use chronicle_core::RecordId;

    fn sample_record(source_id: &str, kind: &str) -> MessageRecord {
        MessageRecord {
            id: RecordId::new(),
            source_id: source_id.into(),
            kind: kind.into(),
            assembly_name: "app".into(),
            full_name: "app::events::Sample".into(),
            namespace: "app::events".into(),
            type_name: "Sample".into(),
            source_type: "".into(),
            creation_date: record::format_timestamp(chrono::Utc::now()),
            payload: "{}".into(),
        }
    }

    fn events_filter() -> Filter {
        translate(&Criteria::new()).unwrap()
    }

    #[test]
    fn file_config_creates_schema() {
        let dir = std::env::temp_dir().join(format!("chronicle-test-{}", Uuid::now_v7()));
        let path = dir.join("log.db");
        let config = ConnectionConfig::file(&path).unwrap();
        assert!(path.exists());

        let session = config.open().unwrap();
        let version: u32 = session
            .conn()
            .query_row("SELECT version FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, schema::SCHEMA_VERSION);

        drop(session);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn reopening_file_config_does_not_reset_version() {
        let dir = std::env::temp_dir().join(format!("chronicle-test-{}", Uuid::now_v7()));
        let path = dir.join("log.db");
        let first = ConnectionConfig::file(&path).unwrap();
        let second = ConnectionConfig::file(&path).unwrap();

        let session = second.open().unwrap();
        let count: i64 = session
            .conn()
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);

        drop(session);
        drop(first);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn in_memory_sessions_share_the_database() {
        let config = ConnectionConfig::in_memory().unwrap();

        let writer = config.open().unwrap();
        writer.append(&sample_record("src-1", "Event")).unwrap();
        drop(writer);

        let reader = config.open().unwrap();
        let rows = reader.select_batch(&events_filter(), 0, 100).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].1.source_id, "src-1");
    }

    #[test]
    fn separate_in_memory_configs_are_isolated() {
        let a = ConnectionConfig::in_memory().unwrap();
        let b = ConnectionConfig::in_memory().unwrap();

        a.open().unwrap().append(&sample_record("only-a", "Event")).unwrap();

        let rows = b.open().unwrap().select_batch(&events_filter(), 0, 100).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn select_batch_resumes_after_rowid() {
        let config = ConnectionConfig::in_memory().unwrap();
        let session = config.open().unwrap();
        for i in 0..5 {
            session
                .append(&sample_record(&format!("src-{i}"), "Event"))
                .unwrap();
        }

        let first = session.select_batch(&events_filter(), 0, 2).unwrap();
        assert_eq!(first.len(), 2);

        let resume_from = first.last().unwrap().0;
        let rest = session.select_batch(&events_filter(), resume_from, 100).unwrap();
        assert_eq!(rest.len(), 3);
    }

    #[test]
    fn select_batch_applies_filter_clauses() {
        let config = ConnectionConfig::in_memory().unwrap();
        let session = config.open().unwrap();
        session.append(&sample_record("keep", "Event")).unwrap();
        session.append(&sample_record("drop", "Command")).unwrap();

        let rows = session.select_batch(&events_filter(), 0, 100).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].1.kind, "Event");
    }

    #[test]
    fn appended_row_maps_back_field_for_field() {
        let config = ConnectionConfig::in_memory().unwrap();
        let session = config.open().unwrap();
        let record = sample_record("src-map", "Event");
        session.append(&record).unwrap();

        let rows = session.select_batch(&events_filter(), 0, 100).unwrap();
        let read = &rows[0].1;
        assert_eq!(read.id, record.id);
        assert_eq!(read.source_id, record.source_id);
        assert_eq!(read.kind, record.kind);
        assert_eq!(read.full_name, record.full_name);
        assert_eq!(read.namespace, record.namespace);
        assert_eq!(read.type_name, record.type_name);
        assert_eq!(read.creation_date, record.creation_date);
        assert_eq!(read.payload, record.payload);
    }
}
