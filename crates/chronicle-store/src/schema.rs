/// SQL DDL for the chronicle database.
pub const SCHEMA_VERSION: u32 = 1;

pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS message_log (
    id TEXT PRIMARY KEY,
    source_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    assembly_name TEXT NOT NULL DEFAULT '',
    full_name TEXT NOT NULL DEFAULT '',
    namespace TEXT NOT NULL DEFAULT '',
    type_name TEXT NOT NULL DEFAULT '',
    source_type TEXT NOT NULL DEFAULT '',
    creation_date TEXT NOT NULL,
    payload TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS aggregates (
    id TEXT NOT NULL,
    type TEXT NOT NULL,
    payload TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (id, type)
);

CREATE INDEX IF NOT EXISTS idx_message_log_kind ON message_log(kind);
CREATE INDEX IF NOT EXISTS idx_message_log_source ON message_log(source_id);
CREATE INDEX IF NOT EXISTS idx_message_log_type_name ON message_log(type_name);
CREATE INDEX IF NOT EXISTS idx_message_log_creation ON message_log(creation_date);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);
"#;

/// Applied once when a configuration is created.
pub const SETUP_PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
"#;

/// Applied to every scoped session.
pub const SESSION_PRAGMAS: &str = r#"
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;
"#;
