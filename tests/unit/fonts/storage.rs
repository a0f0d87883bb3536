use super::*;

#[test]
fn normalize_path_slash_normalization() {
    assert_eq!(normalize_rel_path("a/b.ttf").unwrap(), "a/b.ttf");
    assert_eq!(normalize_rel_path("a\\b.ttf").unwrap(), "a/b.ttf");
    assert_eq!(normalize_rel_path("./a//b.ttf").unwrap(), "a/b.ttf");
    assert!(normalize_rel_path("../x.ttf").is_err());
    assert!(normalize_rel_path("/abs.ttf").is_err());
    assert!(normalize_rel_path("./").is_err());
}

#[test]
fn fs_storage_reads_relative_to_root() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("sub")).unwrap();
    std::fs::write(dir.path().join("sub/f.ttf"), b"fontbytes").unwrap();

    let storage = FsFontStorage::new(dir.path());
    assert_eq!(storage.read_binary("sub/f.ttf").unwrap(), b"fontbytes");
    assert!(storage.read_binary("sub/missing.ttf").is_err());
    assert!(storage.read_binary("../f.ttf").is_err());
}

#[test]
fn in_memory_storage_lookup() {
    let storage = InMemoryFontStorage::new().with_file("a.ttf", vec![1, 2, 3]);
    assert_eq!(storage.read_binary("a.ttf").unwrap(), vec![1, 2, 3]);
    assert!(storage.read_binary("b.ttf").is_err());
}
