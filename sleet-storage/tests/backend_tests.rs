use serde_json::json;
use sleet_storage::{LocalFileSystem, MemoryFileSystem, StorageFileSystem};

// ── Contract behavior shared by both backends ───────────────────

async fn exercise_contract(fs: &dyn StorageFileSystem) {
    let file = fs.get("sub/dir/doc.json").unwrap();

    assert!(!file.exists().await.unwrap());
    assert!(file.read_json().await.unwrap().is_none());

    file.write_json(&json!({ "a": 1 })).await.unwrap();
    assert!(file.exists().await.unwrap());
    assert_eq!(file.read_json().await.unwrap().unwrap()["a"], 1);

    // Overwrite replaces the whole document.
    file.write_json(&json!({ "b": 2 })).await.unwrap();
    let doc = file.read_json().await.unwrap().unwrap();
    assert!(doc.get("a").is_none());
    assert_eq!(doc["b"], 2);

    file.delete().await.unwrap();
    assert!(!file.exists().await.unwrap());
    // Deleting an absent document is a no-op.
    file.delete().await.unwrap();
}

#[tokio::test]
async fn memory_backend_contract() {
    let fs = MemoryFileSystem::new();
    exercise_contract(&fs).await;
}

#[tokio::test]
async fn local_backend_contract() {
    let dir = tempfile::tempdir().unwrap();
    let fs = LocalFileSystem::new(dir.path());
    exercise_contract(&fs).await;
}

// ── Path validation ─────────────────────────────────────────────

#[tokio::test]
async fn rejects_escaping_paths() {
    let fs = MemoryFileSystem::new();
    assert!(fs.get("../outside.json").is_err());
    assert!(fs.get("/absolute.json").is_err());
    assert!(fs.get("a/../b.json").is_err());
    assert!(fs.get("").is_err());
}

// ── URIs ────────────────────────────────────────────────────────

#[tokio::test]
async fn uris_include_relative_path() {
    let fs = MemoryFileSystem::new();
    let file = fs.get("catalog/index.json").unwrap();
    assert_eq!(file.uri(), "memory:///catalog/index.json");
    assert_eq!(fs.root_uri(), "memory:///");
}

#[tokio::test]
async fn local_uri_is_rooted() {
    let dir = tempfile::tempdir().unwrap();
    let fs = LocalFileSystem::new(dir.path());
    let file = fs.get("index.json").unwrap();
    assert!(file.uri().starts_with("file://"));
    assert!(file.uri().ends_with("index.json"));
}

// ── Listing (memory backend helper) ─────────────────────────────

#[tokio::test]
async fn memory_paths_are_sorted() {
    let fs = MemoryFileSystem::new();
    fs.get("b.json").unwrap().write_json(&json!(2)).await.unwrap();
    fs.get("a.json").unwrap().write_json(&json!(1)).await.unwrap();
    assert_eq!(fs.paths().await, vec!["a.json", "b.json"]);
}
