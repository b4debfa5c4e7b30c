//! Builds persisted through the SQLite gateway.

use std::fs;
use std::path::Path;

use chrono::{Duration, Utc};
use tempfile::TempDir;

use repograph::graph::{GraphGateway, SqliteGraphStore};
use repograph::types::{BuildResult, EdgeKind};
use repograph::{BuildConfig, GraphBuilder, RepoGraphError};

fn sample_repo() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let write = |rel: &str, contents: &str| {
        let path = tmp.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    };
    write("app/__init__.py", "");
    write(
        "app/models.py",
        "class User:\n    def save(self):\n        return True\n",
    );
    write(
        "app/views.py",
        "from app.models import User\n\ndef create():\n    user = User()\n    return user.save()\n",
    );
    write("README.md", "Sample app.\n");
    tmp
}

fn build(root: &Path, repo_id: &str) -> BuildResult {
    GraphBuilder::new(BuildConfig::new(repo_id, "c1", root))
        .unwrap()
        .build()
        .unwrap()
}

#[test]
fn persisting_twice_keeps_counts_stable() {
    let repo = sample_repo();
    let result = build(repo.path(), "acme/app");
    let store = SqliteGraphStore::new(":memory:").unwrap();

    let first = store.persist("acme/app", &result).unwrap();
    let nodes = store.node_count("acme/app").unwrap();
    let edges = store.edge_count("acme/app").unwrap();
    let second = store.persist("acme/app", &result).unwrap();

    assert_eq!(first, second);
    assert_eq!(nodes, result.nodes.len());
    assert_eq!(edges, result.edges.len());
    assert_eq!(store.node_count("acme/app").unwrap(), nodes);
    assert_eq!(store.edge_count("acme/app").unwrap(), edges);
}

#[test]
fn stored_stats_match_the_build() {
    let repo = sample_repo();
    let result = build(repo.path(), "acme/app");
    let store = SqliteGraphStore::new(":memory:").unwrap();
    store.persist("acme/app", &result).unwrap();

    let stats = store.get_stats("acme/app").unwrap();
    let symbols = result.symbols().count();
    assert_eq!(stats.nodes_by_type.get("symbol").copied().unwrap_or(0), symbols);
    for kind in EdgeKind::ALL {
        let built = result.edges_of_kind(kind).count();
        let stored = stats.edges_by_kind.get(kind.as_str()).copied().unwrap_or(0);
        assert_eq!(built, stored, "{kind}");
    }
}

#[test]
fn stored_symbols_are_found_by_stable_id() {
    let repo = sample_repo();
    let result = build(repo.path(), "acme/app");
    let store = SqliteGraphStore::new(":memory:").unwrap();
    store.persist("acme/app", &result).unwrap();

    let (node, symbol) = result
        .symbols()
        .find(|(_, s)| s.display_name() == "User.save")
        .unwrap();
    let found = store.nodes_by_stable_id("acme/app", &symbol.stable_id).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].node_id, node.node_id);
    let stored = found[0].as_symbol().unwrap();
    assert_eq!(stored.version_id, symbol.version_id);
    // Node types only feed the fingerprint and are not persisted.
    assert!(stored.node_types.is_empty());
}

#[test]
fn repositories_do_not_share_rows() {
    let repo = sample_repo();
    let store = SqliteGraphStore::new(":memory:").unwrap();
    store.persist("one", &build(repo.path(), "one")).unwrap();
    store.persist("two", &build(repo.path(), "two")).unwrap();

    store
        .conn
        .execute(
            "UPDATE kg_nodes SET last_indexed_at = ?1 WHERE repo_id = 'one'",
            [(Utc::now() - Duration::days(90)).to_rfc3339()],
        )
        .unwrap();

    let deleted = store.delete_stale("one", 30).unwrap();
    assert!(deleted > 0);
    assert_eq!(store.node_count("one").unwrap(), 0);
    assert_eq!(store.edge_count("one").unwrap(), 0);
    assert!(store.node_count("two").unwrap() > 0);
    assert!(store.edge_count("two").unwrap() > 0);
}

#[test]
fn edges_without_nodes_are_rejected() {
    let repo = sample_repo();
    let result = build(repo.path(), "acme/app");
    let store = SqliteGraphStore::new(":memory:").unwrap();

    let err = store.upsert_edges("acme/app", &result.edges).unwrap_err();
    assert!(matches!(err, RepoGraphError::MissingEndpoint { .. }));
    assert_eq!(store.edge_count("acme/app").unwrap(), 0);
}

#[test]
fn on_disk_store_survives_reopen() {
    let repo = sample_repo();
    let result = build(repo.path(), "acme/app");
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("graph.db");
    let db = db.to_str().unwrap();

    SqliteGraphStore::new(db)
        .unwrap()
        .persist("acme/app", &result)
        .unwrap();
    let reopened = SqliteGraphStore::new(db).unwrap();
    assert_eq!(reopened.node_count("acme/app").unwrap(), result.nodes.len());
    let root = reopened.get_node("acme/app", "0").unwrap().unwrap();
    assert_eq!(root.as_file().unwrap().relative_path, ".");
}
