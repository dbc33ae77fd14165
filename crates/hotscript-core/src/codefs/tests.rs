use super::*;
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::TempDir;

fn names(entries: &[DirEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.name.as_str()).collect()
}

#[test]
fn test_clean_path() {
    assert_eq!(clean_path(""), ".");
    assert_eq!(clean_path("a//b/./c/"), "a/b/c");
    assert_eq!(clean_path("a/b/../c"), "a/c");
    assert_eq!(clean_path("../a"), "../a");
    assert_eq!(clean_path("/../a"), "/a");
    assert_eq!(clean_path("a\\b"), "a/b");
}

#[test]
fn test_has_path_prefix_is_segment_aware() {
    assert!(has_path_prefix("root/ext/s1", "root/ext"));
    assert!(has_path_prefix("root/ext", "root/ext"));
    assert!(!has_path_prefix("root/ext2", "root/ext"));
    assert!(has_path_prefix("anything", "."));
}

#[test]
fn test_duplicate_mapping_is_rejected() {
    let a = TempDir::new().unwrap();
    let b = TempDir::new().unwrap();
    let fs = CodeFs::new("");

    fs.mapping("root/ext", a.path()).unwrap();
    let err = fs.mapping("root/ext/", b.path()).unwrap_err();
    assert!(matches!(err, FsError::AlreadyExists { .. }));

    fs.mapping("root/other", b.path()).unwrap();
    assert!(fs.is_mapped("root/other"));

    fs.unmapping("root/ext");
    assert!(!fs.is_mapped("root/ext"));
    fs.mapping("root/ext", b.path()).unwrap();
}

#[test]
fn test_open_through_mapping() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("s1")).unwrap();
    fs::write(dir.path().join("s1/foo.gs"), b"package s1").unwrap();

    let fs = CodeFs::new("");
    fs.mapping("root/ext", dir.path()).unwrap();

    assert_eq!(fs.read_file("root/ext/s1/foo.gs").unwrap(), b"package s1");
    assert!(fs.stat("root/ext/s1").unwrap().is_dir);
    assert!(matches!(
        fs.open("root/ext/s1"),
        Err(FsError::IsDirectory { .. })
    ));
    // A sibling prefix must not match the mapping.
    assert!(fs.open("root/ext2/s1/foo.gs").unwrap_err().is_not_found());
}

#[test]
fn test_fake_file_takes_precedence() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("main.gs"), b"disk").unwrap();

    let fs = CodeFs::new("");
    fs.mapping("pkg", dir.path()).unwrap();
    fs.write_fake_file("pkg/main.gs", b"memory".to_vec());

    assert_eq!(fs.read_file("pkg/main.gs").unwrap(), b"memory");

    fs.remove_fake_file("pkg/main.gs");
    assert_eq!(fs.read_file("pkg/main.gs").unwrap(), b"disk");
}

#[test]
fn test_add_fake_file_fails_when_present() {
    let fs = CodeFs::new("");
    fs.add_fake_file("a/b.gs", b"one".to_vec()).unwrap();
    let err = fs.add_fake_file("a/b.gs", b"two".to_vec()).unwrap_err();
    assert!(matches!(err, FsError::AlreadyExists { .. }));
    assert_eq!(fs.read_file("a/b.gs").unwrap(), b"one");
    assert!(fs.stat("a").unwrap().is_dir);
}

#[test]
fn test_later_mapping_shadows_earlier() {
    let older = TempDir::new().unwrap();
    let newer = TempDir::new().unwrap();
    fs::create_dir_all(older.path().join("ext")).unwrap();
    fs::write(older.path().join("ext/x.gs"), b"older").unwrap();
    fs::write(newer.path().join("x.gs"), b"newer").unwrap();

    let fs = CodeFs::new("");
    fs.mapping("root", older.path()).unwrap();
    fs.mapping("root/ext", newer.path()).unwrap();

    assert_eq!(fs.read_file("root/ext/x.gs").unwrap(), b"newer");
}

#[test]
fn test_read_dir_merges_and_sorts() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("b.gs"), b"").unwrap();
    fs::write(dir.path().join("d.gs"), b"").unwrap();
    fs::create_dir_all(dir.path().join("sub")).unwrap();

    let fs = CodeFs::new("");
    fs.mapping("pkg", dir.path()).unwrap();
    fs.write_fake_file("pkg/a.gs", b"".to_vec());
    fs.write_fake_file("pkg/b.gs", b"fake".to_vec());
    fs.write_fake_file("pkg/deep/c.gs", b"".to_vec());

    let entries = fs.read_dir("pkg").unwrap();
    assert_eq!(names(&entries), vec!["a.gs", "b.gs", "d.gs", "deep", "sub"]);
    assert!(entries.iter().find(|e| e.name == "deep").unwrap().is_dir);
}

#[test]
fn test_misses_are_uniform() {
    let fs = CodeFs::new("");
    for err in [
        fs.open("nope.gs").unwrap_err(),
        fs.stat("nope").unwrap_err(),
        fs.read_dir("nope").unwrap_err(),
    ] {
        assert!(err.is_not_found(), "{err}");
    }
}

#[test]
fn test_root_prefix_is_stripped() {
    let fs = CodeFs::new("src/vendor/");
    fs.write_fake_file("src/vendor/pkg/a.gs", b"x".to_vec());
    assert_eq!(fs.read_file("pkg/a.gs").unwrap(), b"x");
    assert_eq!(fs.read_file("src/vendor/pkg/a.gs").unwrap(), b"x");
}

#[test]
fn test_walk_lists_all_files() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("s1/inner")).unwrap();
    fs::write(dir.path().join("s1/a.gs"), b"").unwrap();
    fs::write(dir.path().join("s1/inner/b.gs"), b"").unwrap();

    let fs = CodeFs::new("");
    fs.mapping("root/ext", dir.path()).unwrap();
    fs.write_fake_file("root/ext/s2/c.gs", b"".to_vec());

    assert_eq!(
        fs.walk("root/ext").unwrap(),
        vec![
            "root/ext/s1/a.gs".to_string(),
            "root/ext/s1/inner/b.gs".to_string(),
            "root/ext/s2/c.gs".to_string(),
        ]
    );
    assert!(fs.walk("missing").unwrap().is_empty());
}

#[test]
fn test_opened_file_debug() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("disk.gs"), b"disk").unwrap();

    let fs = CodeFs::new("");
    fs.mapping("pkg", dir.path()).unwrap();
    fs.write_fake_file("pkg/memory.gs", b"memory".to_vec());

    let memory = format!("{:?}", fs.open("pkg/memory.gs").unwrap());
    assert!(memory.starts_with("Memory("), "{memory}");
    let disk = format!("{:?}", fs.open("pkg/disk.gs").unwrap());
    assert!(disk.starts_with("Disk("), "{disk}");
}

#[test]
fn test_empty_directory_stats_but_does_not_list() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("empty")).unwrap();

    let fs = CodeFs::new("");
    fs.mapping("pkg", dir.path()).unwrap();

    assert!(fs.stat("pkg/empty").unwrap().is_dir);
    assert!(fs.read_dir("pkg/empty").unwrap_err().is_not_found());
}

#[test]
fn test_remove_fake_tree() {
    let fs = CodeFs::new("");
    fs.write_fake_file("root/ext/s1/a.gs", b"a".to_vec());
    fs.write_fake_file("root/ext/b.gs", b"b".to_vec());
    fs.write_fake_file("root/ext2/c.gs", b"c".to_vec());

    fs.remove_fake_tree("root/ext");
    assert!(!fs.exists("root/ext"));
    assert!(!fs.exists("root/ext/s1/a.gs"));
    assert_eq!(fs.read_file("root/ext2/c.gs").unwrap(), b"c");
    assert!(fs.stat("root").unwrap().is_dir);
}
