use qobs_index::{INDEX_FILENAME, Index, IndexError};
use std::fs;
use tempfile::TempDir;

fn index_with_overlay() -> (TempDir, Index) {
    let tmp = TempDir::new().unwrap();
    let overlay = tmp.path().join("zlib");
    fs::create_dir_all(overlay.join("cmake")).unwrap();
    fs::write(overlay.join("Qobs.toml"), "[package]\nname = \"zlib\"\n").unwrap();
    fs::write(overlay.join("cmake").join("notes.txt"), "overlay").unwrap();

    let mut index = Index::new(tmp.path());
    index.set_dep("https://github.com/madler/zlib.git", "zlib");
    index.set_dep("gh:evil/escape", "../outside");
    index.save(tmp.path()).unwrap();
    (tmp, index)
}

#[test]
fn save_then_load_keeps_entries() {
    let (tmp, index) = index_with_overlay();
    let raw = fs::read_to_string(tmp.path().join(INDEX_FILENAME)).unwrap();
    assert!(raw.ends_with('\n'));
    assert!(raw.contains("  \"gh:evil/escape\": \"../outside\""));

    let loaded = Index::load(tmp.path()).unwrap();
    assert_eq!(loaded.deps(), index.deps());
}

#[test]
fn copy_into_overlays_files() {
    let (tmp, index) = index_with_overlay();
    let dest = tmp.path().join("deps").join("zlib");
    fs::create_dir_all(&dest).unwrap();
    fs::write(dest.join("Qobs.toml"), "stale").unwrap();

    index.copy_into(&dest, "https://github.com/madler/zlib.git").unwrap();

    assert!(fs::read_to_string(dest.join("Qobs.toml")).unwrap().contains("name = \"zlib\""));
    assert_eq!(fs::read_to_string(dest.join("cmake").join("notes.txt")).unwrap(), "overlay");
}

#[test]
fn copy_into_rejects_unknown_and_escaping_entries() {
    let (tmp, index) = index_with_overlay();
    let dest = tmp.path().join("dest");

    let missing = index.copy_into(&dest, "gh:nobody/nothing").unwrap_err();
    assert!(matches!(missing, IndexError::NotFound { .. }));

    let escaping = index.copy_into(&dest, "gh:evil/escape").unwrap_err();
    assert!(matches!(escaping, IndexError::InvalidEntry { .. }));
}

#[test]
fn load_missing_index_fails() {
    let tmp = TempDir::new().unwrap();
    let err = Index::load(tmp.path()).unwrap_err();
    assert!(matches!(err, IndexError::Io { .. }));
}
