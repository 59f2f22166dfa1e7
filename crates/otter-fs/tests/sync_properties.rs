use otter_fs::constants::COPYFILE_EXCL;
use otter_fs::{
    FsConfig, MemoryBinding, MkdirOptions, NodeFs, OpendirOptions, ReadFileOptions,
    ReaddirEntries, ReaddirOptions, StatOptions, TypePredicates, WriteFileOptions,
};

fn memory_fs() -> NodeFs<MemoryBinding> {
    NodeFs::memory(FsConfig::default())
}

#[test]
fn test_stats_and_bigint_stats_agree() {
    let fs = memory_fs();
    fs.write_file_sync("/file.txt", "twelve bytes", WriteFileOptions::new())
        .unwrap();

    let number = fs
        .stat_sync("/file.txt", StatOptions::new())
        .unwrap()
        .unwrap();
    let bigint = fs
        .stat_sync("/file.txt", StatOptions::new().bigint(true))
        .unwrap()
        .unwrap();

    let stats = number.as_number().unwrap();
    let big = bigint.as_bigint().unwrap();
    assert_eq!(stats.size() as u64, big.size());
    assert_eq!(stats.mtime_ms().map(|ms| ms as i64), big.mtime_ms());
    assert_eq!(stats.atime_ms().map(|ms| ms as i64), big.atime_ms());
    assert_eq!(number.mtime(), bigint.mtime());

    for snapshot in [&number, &bigint] {
        assert!(snapshot.is_file());
        assert!(!snapshot.is_directory());
        assert!(!snapshot.is_symbolic_link());
        assert!(!snapshot.is_block_device());
        assert!(!snapshot.is_character_device());
        assert!(!snapshot.is_socket());
        assert!(!snapshot.is_fifo());
    }
}

#[test]
fn test_stat_missing_path() {
    let fs = memory_fs();
    let err = fs.stat_sync("/nope", StatOptions::new()).unwrap_err();
    assert_eq!(err.code(), "ENOENT");
    assert_eq!(err.syscall(), None);
    assert_eq!(err.path(), None);

    let quiet = fs
        .stat_sync("/nope", StatOptions::new().throw_if_no_entry(false))
        .unwrap();
    assert!(quiet.is_none());
}

#[test]
fn test_recursive_mkdir_then_eexist() {
    let fs = memory_fs();
    let first = fs
        .mkdir_sync("/a/b/c", MkdirOptions::new().recursive(true))
        .unwrap();
    assert_eq!(first.as_deref(), Some("/a"));
    for path in ["/a", "/a/b", "/a/b/c"] {
        assert!(fs.exists_sync(path), "{path} should exist");
    }

    let err = fs.mkdir_sync("/a/b/c", MkdirOptions::new()).unwrap_err();
    assert_eq!(err.code(), "EEXIST");
    assert_eq!(err.syscall(), Some("mkdir"));

    // Nothing left to create.
    let again = fs
        .mkdir_sync("/a/b/c", MkdirOptions::new().recursive(true))
        .unwrap();
    assert!(again.is_none());
}

#[test]
fn test_access_reports_enoent() {
    let fs = memory_fs();
    fs.write_file_sync("/present", "", WriteFileOptions::new())
        .unwrap();
    fs.access_sync("/present", None).unwrap();

    let err = fs.access_sync("/absent", None).unwrap_err();
    assert_eq!(err.code(), "ENOENT");
    assert_eq!(err.syscall(), Some("access"));
    assert_eq!(err.path(), Some("/absent"));
}

#[test]
fn test_dir_cursor_yields_every_entry_then_ends() {
    let fs = NodeFs::memory(FsConfig::new().readdir_page_size(3));
    fs.mkdir_sync("/d", MkdirOptions::new()).unwrap();
    fs.mkdir_sync("/d/sub", MkdirOptions::new()).unwrap();
    for name in ["a", "b", "c", "d", "e"] {
        fs.write_file_sync(format!("/d/{name}"), name, WriteFileOptions::new())
            .unwrap();
    }

    let dir = fs.opendir_sync("/d", OpendirOptions::new()).unwrap();
    let mut seen = Vec::new();
    while let Some(entry) = dir.read_sync().unwrap() {
        assert_ne!(entry.name(), ".");
        assert_ne!(entry.name(), "..");
        seen.push(entry);
    }
    assert_eq!(seen.len(), 6);
    assert!(seen.iter().any(|e| e.name() == "sub" && e.is_directory()));
    assert!(dir.read_sync().unwrap().is_none());
    dir.close_sync().unwrap();
    assert_eq!(fs.binding().open_descriptors(), 0);
}

#[test]
fn test_readdir_names_and_dirents() {
    let fs = memory_fs();
    fs.mkdir_sync("/d/inner", MkdirOptions::new().recursive(true))
        .unwrap();
    fs.write_file_sync("/d/file", "x", WriteFileOptions::new())
        .unwrap();

    match fs.readdir_sync("/d", ReaddirOptions::new()).unwrap() {
        ReaddirEntries::Names(names) => {
            assert_eq!(names, vec!["file", "inner"]);
        }
        other => panic!("expected names, got {other:?}"),
    }

    match fs
        .readdir_sync("/d", ReaddirOptions::new().with_file_types(true))
        .unwrap()
    {
        ReaddirEntries::Dirents(entries) => {
            assert_eq!(entries.len(), 2);
            assert!(entries[0].is_file());
            assert!(entries[1].is_directory());
        }
        other => panic!("expected dirents, got {other:?}"),
    }
}

#[test]
fn test_write_then_read_round_trips_bytes() {
    let fs = memory_fs();
    let payload: Vec<u8> = (0..=255u8).cycle().take(70_000).collect();
    fs.write_file_sync("/blob", payload.clone(), WriteFileOptions::new())
        .unwrap();
    let back = fs.read_file_sync("/blob", ReadFileOptions::new()).unwrap();
    assert_eq!(back.as_bytes(), payload.as_slice());
}

#[test]
fn test_copy_file_exclusive() {
    let fs = memory_fs();
    fs.write_file_sync("/src", "source", WriteFileOptions::new())
        .unwrap();
    fs.copy_file_sync("/src", "/dest", None).unwrap();
    let copied = fs.read_file_sync("/dest", ReadFileOptions::new()).unwrap();
    assert_eq!(copied.as_bytes(), b"source");

    let err = fs
        .copy_file_sync("/src", "/dest", Some(COPYFILE_EXCL))
        .unwrap_err();
    assert_eq!(err.code(), "EEXIST");
    assert_eq!(err.syscall(), Some("copyfile"));
}

#[test]
fn test_watchers_are_unsupported() {
    let fs = memory_fs();
    for err in [
        fs.watch().unwrap_err(),
        fs.watch_file().unwrap_err(),
        fs.unwatch().unwrap_err(),
    ] {
        assert_eq!(err.code(), "ERR_FEATURE_UNAVAILABLE_ON_PLATFORM");
    }
}
