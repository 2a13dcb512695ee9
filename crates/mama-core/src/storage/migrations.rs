//! Database migrations
//!
//! Versioned schema definitions applied on connect. Each migration runs in
//! its own transaction and is recorded in `schema_migrations`; re-running
//! the runner is a no-op. Timestamps are integer milliseconds everywhere —
//! SQLite's `unixepoch()` default (seconds) is never used on the write path.

use chrono::Utc;
use rusqlite::{params, Connection};

/// A database migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Version number
    pub version: u32,
    /// Description
    pub description: &'static str,
    /// SQL to apply
    pub up: &'static str,
}

/// Migration definitions
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema: decisions, edges, embeddings",
        up: MIGRATION_V1_UP,
    },
    Migration {
        version: 2,
        description: "Audit legacy second-resolution timestamps to milliseconds",
        up: MIGRATION_V2_UP,
    },
    Migration {
        version: 3,
        description: "Validation tracking columns",
        up: MIGRATION_V3_UP,
    },
];

/// V1: Initial schema
///
/// The relationship CHECK list is the storage-level half of the edge-type
/// whitelist; `Relationship::ALL` is the in-process half and a test keeps
/// the two lists identical.
const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS decisions (
    id TEXT PRIMARY KEY,
    topic TEXT NOT NULL,
    decision TEXT NOT NULL,
    reasoning TEXT NOT NULL,
    outcome TEXT,
    failure_reason TEXT,
    limitation TEXT,
    confidence REAL NOT NULL DEFAULT 0.5,
    supersedes TEXT,
    superseded_by TEXT,
    refined_from TEXT,

    -- Milliseconds since epoch; the write path always supplies these
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,

    -- Provenance
    session_id TEXT,
    user_involvement TEXT,

    -- Serialized JSON payloads
    evidence TEXT,
    alternatives TEXT,
    risks TEXT,
    trust_context TEXT,

    -- Usage counters
    usage_success INTEGER NOT NULL DEFAULT 0,
    usage_failure INTEGER NOT NULL DEFAULT 0,
    usage_count INTEGER NOT NULL DEFAULT 0,
    time_saved REAL NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_decisions_topic ON decisions(topic);
CREATE INDEX IF NOT EXISTS idx_decisions_current ON decisions(topic, superseded_by);
CREATE INDEX IF NOT EXISTS idx_decisions_session ON decisions(session_id, created_at);
CREATE INDEX IF NOT EXISTS idx_decisions_created ON decisions(created_at);

CREATE TABLE IF NOT EXISTS decision_edges (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    from_id TEXT NOT NULL REFERENCES decisions(id) ON DELETE CASCADE,
    to_id TEXT NOT NULL REFERENCES decisions(id) ON DELETE CASCADE,
    relationship TEXT NOT NULL CHECK (relationship IN (
        'supersedes', 'refines', 'contradicts', 'builds_on', 'debates', 'synthesizes'
    )),
    reason TEXT,
    created_by TEXT NOT NULL DEFAULT 'llm',
    approved_by_user INTEGER,
    decision_id TEXT,
    evidence TEXT,
    created_at INTEGER NOT NULL,
    approved_at INTEGER,
    UNIQUE (from_id, to_id, relationship)
);

CREATE INDEX IF NOT EXISTS idx_edges_from ON decision_edges(from_id);
CREATE INDEX IF NOT EXISTS idx_edges_to ON decision_edges(to_id);
CREATE INDEX IF NOT EXISTS idx_edges_relationship ON decision_edges(relationship);
CREATE INDEX IF NOT EXISTS idx_edges_approval ON decision_edges(approved_by_user);

-- Durable embedding storage (binary little-endian f32); the in-memory HNSW
-- index is rebuilt from this table on connect
CREATE TABLE IF NOT EXISTS decision_embeddings (
    decision_id TEXT PRIMARY KEY REFERENCES decisions(id) ON DELETE CASCADE,
    embedding BLOB NOT NULL,
    dimensions INTEGER NOT NULL,
    model TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);
"#;

/// V2: Legacy timestamp audit
///
/// Databases written before the milliseconds standard carried
/// second-resolution values. Anything below 1e11 (~5138 CE in seconds,
/// ~1973 in milliseconds) is a legacy seconds value and is rewritten.
const MIGRATION_V2_UP: &str = r#"
UPDATE decisions SET created_at = created_at * 1000
    WHERE created_at > 0 AND created_at < 100000000000;
UPDATE decisions SET updated_at = updated_at * 1000
    WHERE updated_at > 0 AND updated_at < 100000000000;
UPDATE decision_edges SET created_at = created_at * 1000
    WHERE created_at > 0 AND created_at < 100000000000;
UPDATE decision_edges SET approved_at = approved_at * 1000
    WHERE approved_at IS NOT NULL AND approved_at > 0 AND approved_at < 100000000000;
UPDATE decision_embeddings SET created_at = created_at * 1000
    WHERE created_at > 0 AND created_at < 100000000000;
"#;

/// V3: Validation tracking
const MIGRATION_V3_UP: &str = r#"
ALTER TABLE decisions ADD COLUMN needs_validation INTEGER NOT NULL DEFAULT 0;
ALTER TABLE decisions ADD COLUMN validation_attempts INTEGER NOT NULL DEFAULT 0;
ALTER TABLE decisions ADD COLUMN last_validated_at INTEGER;

CREATE INDEX IF NOT EXISTS idx_decisions_needs_validation ON decisions(needs_validation);
"#;

/// Get current schema version from the database.
pub fn current_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )
    .or(Ok(0))
}

/// Apply pending migrations, one transaction per migration.
///
/// A failure aborts startup with no partial schema: the failing migration's
/// transaction rolls back and its version is never recorded.
pub fn apply_migrations(conn: &mut Connection) -> rusqlite::Result<u32> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        );",
    )?;

    let current = current_version(conn)?;
    let mut applied = 0;

    for migration in MIGRATIONS {
        if migration.version > current {
            tracing::info!(
                "Applying migration v{}: {}",
                migration.version,
                migration.description
            );

            let tx = conn.transaction()?;
            tx.execute_batch(migration.up)?;
            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                params![migration.version, Utc::now().timestamp_millis()],
            )?;
            tx.commit()?;

            applied += 1;
        }
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Relationship;

    fn open_memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        conn
    }

    #[test]
    fn test_migrations_apply_in_order() {
        let mut conn = open_memory_db();
        let applied = apply_migrations(&mut conn).unwrap();
        assert_eq!(applied as usize, MIGRATIONS.len());
        assert_eq!(current_version(&conn).unwrap(), MIGRATIONS.len() as u32);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let mut conn = open_memory_db();
        apply_migrations(&mut conn).unwrap();
        let second_run = apply_migrations(&mut conn).unwrap();
        assert_eq!(second_run, 0);
    }

    #[test]
    fn test_versions_are_monotonic() {
        let mut last = 0;
        for migration in MIGRATIONS {
            assert!(migration.version > last);
            last = migration.version;
        }
    }

    #[test]
    fn test_check_constraint_matches_relationship_enum() {
        // The CHECK list in v1 and Relationship::ALL must stay in sync
        for relationship in Relationship::ALL {
            assert!(
                MIGRATION_V1_UP.contains(&format!("'{}'", relationship.as_str())),
                "CHECK constraint is missing {}",
                relationship.as_str()
            );
        }
    }

    #[test]
    fn test_illegal_relationship_rejected_by_schema() {
        let mut conn = open_memory_db();
        apply_migrations(&mut conn).unwrap();

        conn.execute(
            "INSERT INTO decisions (id, topic, decision, reasoning, created_at, updated_at)
             VALUES ('a', 't', 'd', 'r', 1, 1), ('b', 't2', 'd', 'r', 1, 1)",
            [],
        )
        .unwrap();

        let legal = conn.execute(
            "INSERT INTO decision_edges (from_id, to_id, relationship, created_at)
             VALUES ('a', 'b', 'refines', 1)",
            [],
        );
        assert!(legal.is_ok());

        let illegal = conn.execute(
            "INSERT INTO decision_edges (from_id, to_id, relationship, created_at)
             VALUES ('a', 'b', 'causes', 1)",
            [],
        );
        assert!(illegal.is_err());
    }

    #[test]
    fn test_edge_cascade_on_decision_delete() {
        let mut conn = open_memory_db();
        apply_migrations(&mut conn).unwrap();

        conn.execute(
            "INSERT INTO decisions (id, topic, decision, reasoning, created_at, updated_at)
             VALUES ('a', 't', 'd', 'r', 1, 1), ('b', 't2', 'd', 'r', 1, 1)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO decision_edges (from_id, to_id, relationship, created_at)
             VALUES ('a', 'b', 'refines', 1)",
            [],
        )
        .unwrap();

        conn.execute("DELETE FROM decisions WHERE id = 'a'", []).unwrap();
        let edges: i64 = conn
            .query_row("SELECT COUNT(*) FROM decision_edges", [], |r| r.get(0))
            .unwrap();
        assert_eq!(edges, 0);
    }

    #[test]
    fn test_legacy_seconds_rewritten() {
        let mut conn = open_memory_db();
        // Apply only v1, insert a legacy seconds row, then run the rest
        let tx = conn.transaction().unwrap();
        tx.execute_batch(MIGRATION_V1_UP).unwrap();
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (1, 1)",
            [],
        )
        .unwrap();
        tx.commit().unwrap();

        conn.execute(
            "INSERT INTO decisions (id, topic, decision, reasoning, created_at, updated_at)
             VALUES ('legacy', 't', 'd', 'r', 1700000000, 1700000000)",
            [],
        )
        .unwrap();

        apply_migrations(&mut conn).unwrap();

        let created_at: i64 = conn
            .query_row(
                "SELECT created_at FROM decisions WHERE id = 'legacy'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(created_at, 1_700_000_000_000);
    }

    #[test]
    fn test_millisecond_timestamps_untouched_by_audit() {
        let mut conn = open_memory_db();
        let tx = conn.transaction().unwrap();
        tx.execute_batch(MIGRATION_V1_UP).unwrap();
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (1, 1)",
            [],
        )
        .unwrap();
        tx.commit().unwrap();

        conn.execute(
            "INSERT INTO decisions (id, topic, decision, reasoning, created_at, updated_at)
             VALUES ('modern', 't', 'd', 'r', 1700000000000, 1700000000000)",
            [],
        )
        .unwrap();

        apply_migrations(&mut conn).unwrap();

        let created_at: i64 = conn
            .query_row(
                "SELECT created_at FROM decisions WHERE id = 'modern'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(created_at, 1_700_000_000_000);
    }
}
