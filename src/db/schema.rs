//! SQLite schema for the persisted knowledge graph.
//!
//! Every row is partitioned by `repo_id`: node ids are only unique inside
//! one repository, so both primary keys lead with it. Payloads are stored as
//! JSON next to a few columns pulled out for lookups.

use rusqlite::Connection;

// ---------------------------------------------------------------------------
// DDL
// ---------------------------------------------------------------------------

const CREATE_NODES: &str = "\
CREATE TABLE IF NOT EXISTS kg_nodes (
  repo_id TEXT NOT NULL,
  node_id TEXT NOT NULL,
  node_type TEXT NOT NULL,
  relative_path TEXT,
  stable_id TEXT,
  version_id TEXT,
  payload TEXT NOT NULL,
  first_indexed_at TEXT NOT NULL,
  last_indexed_at TEXT NOT NULL,
  PRIMARY KEY (repo_id, node_id)
)";

const CREATE_EDGES: &str = "\
CREATE TABLE IF NOT EXISTS kg_edges (
  repo_id TEXT NOT NULL,
  source_id TEXT NOT NULL,
  target_id TEXT NOT NULL,
  kind TEXT NOT NULL,
  first_indexed_at TEXT NOT NULL,
  last_indexed_at TEXT NOT NULL,
  PRIMARY KEY (repo_id, source_id, target_id, kind)
)";

const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_kg_nodes_last_indexed ON kg_nodes(repo_id, last_indexed_at)",
    "CREATE INDEX IF NOT EXISTS idx_kg_nodes_stable ON kg_nodes(repo_id, stable_id)",
    "CREATE INDEX IF NOT EXISTS idx_kg_nodes_path ON kg_nodes(repo_id, relative_path)",
    "CREATE INDEX IF NOT EXISTS idx_kg_edges_source ON kg_edges(repo_id, source_id)",
    "CREATE INDEX IF NOT EXISTS idx_kg_edges_target ON kg_edges(repo_id, target_id)",
    "CREATE INDEX IF NOT EXISTS idx_kg_edges_kind ON kg_edges(repo_id, kind)",
];

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Open (or create) the database at `db_path` and apply the schema.
/// `":memory:"` gives a private in-memory database.
pub fn initialize_database(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;

    conn.pragma_update(None, "journal_mode", "WAL")?;
    // Endpoint existence is checked by the store, not by SQLite.
    conn.pragma_update(None, "foreign_keys", "OFF")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;

    conn.execute_batch(CREATE_NODES)?;
    conn.execute_batch(CREATE_EDGES)?;
    for ddl in CREATE_INDEXES {
        conn.execute_batch(ddl)?;
    }

    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Connection {
        initialize_database(":memory:").expect("schema creation should succeed on :memory:")
    }

    fn object_exists(conn: &Connection, obj_type: &str, obj_name: &str) -> bool {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = ?1 AND name = ?2",
                rusqlite::params![obj_type, obj_name],
                |row| row.get(0),
            )
            .unwrap();
        count > 0
    }

    #[test]
    fn tables_and_indexes_exist() {
        let conn = setup();
        for table in ["kg_nodes", "kg_edges"] {
            assert!(object_exists(&conn, "table", table), "table '{table}' should exist");
        }
        for idx in [
            "idx_kg_nodes_last_indexed",
            "idx_kg_nodes_stable",
            "idx_kg_edges_source",
            "idx_kg_edges_target",
        ] {
            assert!(object_exists(&conn, "index", idx), "index '{idx}' should exist");
        }
    }

    #[test]
    fn initialization_is_repeatable() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("graph.db");
        let path = path.to_str().unwrap();
        drop(initialize_database(path).unwrap());
        let conn = initialize_database(path).unwrap();
        assert!(object_exists(&conn, "table", "kg_nodes"));
    }

    #[test]
    fn node_key_is_scoped_by_repo() {
        let conn = setup();
        let insert = "INSERT INTO kg_nodes
                      (repo_id, node_id, node_type, payload, first_indexed_at, last_indexed_at)
                      VALUES (?1, '0', 'file', '{}', 't', 't')";
        conn.execute(insert, ["repo-a"]).unwrap();
        conn.execute(insert, ["repo-b"]).unwrap();
        assert!(conn.execute(insert, ["repo-a"]).is_err());
    }

    #[test]
    fn pragmas_are_set() {
        let conn = setup();
        let journal_mode: String = conn
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .unwrap();
        assert!(journal_mode == "wal" || journal_mode == "memory");
        let sync: i64 = conn
            .pragma_query_value(None, "synchronous", |row| row.get(0))
            .unwrap();
        assert_eq!(sync, 1);
    }
}
