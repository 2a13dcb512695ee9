//! Test harness: hermetic engines over temp databases.
//!
//! Engines run at Tier 3 (embeddings disabled via injected config, never
//! via env vars) so journeys are deterministic and need no model download.

use std::path::PathBuf;

use mama_core::{MamaConfig, MemoryEngine};
use tempfile::TempDir;

/// A hermetic engine bound to a temp directory.
pub struct TestEnv {
    /// Owns the database location for the lifetime of the test
    pub dir: TempDir,
    /// Initialized engine
    pub engine: MemoryEngine,
}

impl TestEnv {
    /// Path of the engine's database file.
    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join("mama.db")
    }

    /// Config pointing at this env's database, embeddings disabled.
    pub fn config(dir: &TempDir) -> MamaConfig {
        MamaConfig {
            db_path: Some(dir.path().join("mama.db")),
            force_tier3: true,
            disable_vector_search: true,
            ..Default::default()
        }
    }
}

/// Build and initialize a Tier 3 engine over a fresh temp database.
pub async fn tier3_engine() -> TestEnv {
    let dir = TempDir::new().expect("create temp dir");
    let engine = MemoryEngine::new(TestEnv::config(&dir));
    engine.init().await.expect("engine init");
    TestEnv { dir, engine }
}

/// Rewrite a decision's creation time, for recency scenarios.
///
/// Goes straight at the database file; the engine reads fresh state on the
/// next query.
pub fn backdate(env: &TestEnv, decision_id: &str, created_at_ms: i64) {
    let conn = rusqlite::Connection::open(env.db_path()).expect("open db");
    let changed = conn
        .execute(
            "UPDATE decisions SET created_at = ?1, updated_at = ?1 WHERE id = ?2",
            rusqlite::params![created_at_ms, decision_id],
        )
        .expect("backdate update");
    assert_eq!(changed, 1, "decision {decision_id} not found for backdate");
}

/// Milliseconds since epoch, now.
pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock before epoch")
        .as_millis() as i64
}
