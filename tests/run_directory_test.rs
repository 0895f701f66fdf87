//! Run directory resolution and reuse.

mod common;

use common::temp_dir;
use fmax::domain::models::{Fingerprint, SettingsTree};
use fmax::services::{CachedRunDirectoryResolver, SemanticHasher};
use fmax::RunDirError;
use serde_json::json;

#[test]
fn test_same_settings_map_to_same_directory() {
    let root = temp_dir();
    let resolver = CachedRunDirectoryResolver::new(root.path());
    let hasher = SemanticHasher::default();

    let first = hasher
        .fingerprint(&SettingsTree::new(json!({"flow": {"clock_period": 4.0, "nthreads": 4}})))
        .unwrap();
    let second = hasher
        .fingerprint(&SettingsTree::new(json!({"flow": {"nthreads": "4", "clock_period": 4.0}})))
        .unwrap();
    assert_eq!(first, second);

    let created = resolver.resolve("aes", "vivado_synth", &first).unwrap();
    assert!(!created.reused);
    assert!(created.path.is_dir());
    assert!(created.path.starts_with(root.path().join("aes")));
    assert!(created
        .path
        .file_name()
        .unwrap()
        .to_string_lossy()
        .ends_with(first.as_str()));

    let again = resolver.resolve("aes", "vivado_synth", &second).unwrap();
    assert!(again.reused);
    assert_eq!(again.path, created.path);
}

#[test]
fn test_different_flows_do_not_share_directories() {
    let root = temp_dir();
    let resolver = CachedRunDirectoryResolver::new(root.path());
    let fp = Fingerprint::from_hex("0123456789abcdef0123456789abcdef");

    let a = resolver.resolve("aes", "vivado_synth", &fp).unwrap();
    let b = resolver.resolve("aes", "yosys", &fp).unwrap();
    assert_ne!(a.path, b.path);
}

#[test]
fn test_unsafe_names_stay_under_root() {
    let root = temp_dir();
    let resolver = CachedRunDirectoryResolver::new(root.path());
    let fp = Fingerprint::from_hex("0123456789abcdef0123456789abcdef");

    let dir = resolver.resolve("../escape", "flow/with/slashes", &fp).unwrap();
    assert!(dir.path.starts_with(root.path()));
    assert_eq!(dir.path.parent().unwrap().parent().unwrap(), root.path());
}

#[test]
fn test_file_in_the_way_is_an_error() {
    let root = temp_dir();
    let resolver = CachedRunDirectoryResolver::new(root.path());
    let fp = Fingerprint::from_hex("0123456789abcdef0123456789abcdef");

    let path = resolver.path_for("aes", "yosys", &fp);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, b"not a directory").unwrap();

    assert!(matches!(
        resolver.resolve("aes", "yosys", &fp),
        Err(RunDirError::NotADirectory { .. })
    ));
}
