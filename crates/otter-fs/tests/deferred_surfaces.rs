use std::sync::{Arc, Mutex};

use otter_fs::{
    CpOptions, Encoding, FsConfig, MemoryBinding, MkdirOptions, NodeFs, OpendirOptions,
    ReadArgs, ReadFileOptions, RmOptions, StatOptions, TypePredicates, WriteFileOptions,
    WriteRequest,
};

fn memory_fs() -> NodeFs<MemoryBinding> {
    NodeFs::memory(FsConfig::default())
}

#[test]
fn test_callbacks_complete_in_submission_order() {
    let fs = memory_fs();
    let cb = fs.callbacks();
    let log = Arc::new(Mutex::new(Vec::new()));

    for i in 0..5 {
        let log = Arc::clone(&log);
        cb.write_file(
            format!("/f{i}"),
            format!("{i}"),
            WriteFileOptions::new(),
            move |result| {
                result.unwrap();
                log.lock().unwrap().push(i);
            },
        )
        .unwrap();
    }

    // Nothing runs before the scheduler turns.
    assert!(log.lock().unwrap().is_empty());
    assert_eq!(fs.scheduler().pending(), 5);
    fs.scheduler().run_until_idle();
    assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_callback_validation_is_synchronous() {
    let fs = memory_fs();
    let cb = fs.callbacks();

    let err = cb
        .read(-1, vec![0; 4], ReadArgs::default(), |_| {
            panic!("callback must not run")
        })
        .unwrap_err();
    assert_eq!(err.code(), "ERR_OUT_OF_RANGE");

    let err = cb
        .cp(
            "/a",
            "/b",
            CpOptions::new().dereference(true).verbatim_symlinks(true),
            |_| panic!("callback must not run"),
        )
        .unwrap_err();
    assert_eq!(err.code(), "ERR_INCOMPATIBLE_OPTION_PAIR");

    assert_eq!(fs.scheduler().pending(), 0);
}

#[test]
fn test_callback_receives_stat_result() {
    let fs = memory_fs();
    fs.mkdir_sync("/d", MkdirOptions::new()).unwrap();
    let seen = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&seen);
    fs.callbacks()
        .stat("/d", StatOptions::new(), move |result| {
            *slot.lock().unwrap() = Some(result.unwrap().unwrap().is_directory());
        })
        .unwrap();
    fs.scheduler().run_until_idle();
    assert_eq!(*seen.lock().unwrap(), Some(true));
}

#[test]
fn test_dir_callbacks_read_until_end() {
    let fs = memory_fs();
    fs.mkdir_sync("/d", MkdirOptions::new()).unwrap();
    fs.write_file_sync("/d/only", "x", WriteFileOptions::new())
        .unwrap();
    let dir = fs.opendir_sync("/d", OpendirOptions::new()).unwrap();

    let names = Arc::new(Mutex::new(Vec::new()));
    for _ in 0..2 {
        let names = Arc::clone(&names);
        dir.read(move |entry| {
            let entry = entry.unwrap();
            names
                .lock()
                .unwrap()
                .push(entry.map(|e| e.name().to_string()));
        });
    }
    fs.scheduler().run_until_idle();
    assert_eq!(*names.lock().unwrap(), vec![Some("only".to_string()), None]);

    dir.close(|result| result.unwrap());
    fs.scheduler().run_until_idle();
    assert_eq!(fs.binding().open_descriptors(), 0);
}

#[tokio::test]
async fn test_promises_resolve_after_the_turn() {
    let fs = memory_fs();
    let promises = fs.promises();

    let write = promises.write_file("/p", "promised", WriteFileOptions::new());
    let read = promises.read_file("/p", ReadFileOptions::new().encoding(Encoding::Utf8));
    let stat = promises.stat("/p", StatOptions::new());
    fs.scheduler().run_until_idle();

    write.await.unwrap();
    assert_eq!(read.await.unwrap(), "promised");
    assert_eq!(stat.await.unwrap().unwrap().size(), 8);
}

#[tokio::test]
async fn test_promise_errors_are_translated() {
    let fs = memory_fs();
    let pending = fs.promises().rm("/ghost", RmOptions::new());
    fs.scheduler().run_until_idle();
    let err = pending.await.unwrap_err();
    assert_eq!(err.code(), "ENOENT");
    assert_eq!(err.syscall(), None);
}

#[tokio::test]
async fn test_file_handle_close_notification() {
    let fs = memory_fs();
    fs.write_file_sync("/h", "", WriteFileOptions::new()).unwrap();
    let opening = fs.promises().open("/h", "r+", None);
    fs.scheduler().run_until_idle();
    let handle = opening.await.unwrap();

    let mut closed = handle.on_close();
    let write = handle.write(WriteRequest::new("data"));
    fs.scheduler().run_until_idle();
    assert_eq!(write.await.unwrap(), 4);

    let closing = handle.close();
    closed.changed().await.unwrap();
    assert!(*closed.borrow());

    fs.scheduler().run_until_idle();
    closing.await.unwrap();
    assert_eq!(fs.binding().open_descriptors(), 0);
    let contents = fs.read_file_sync("/h", ReadFileOptions::new()).unwrap();
    assert_eq!(contents.as_bytes(), b"data");
}

#[tokio::test]
async fn test_dropped_file_handle_lets_queued_writes_land() {
    let fs = memory_fs();
    let opening = fs.promises().open("/f", "w", None);
    fs.scheduler().run_until_idle();
    let handle = opening.await.unwrap();

    let queued = handle.write_file("queued", WriteFileOptions::new());
    drop(handle);
    assert_eq!(fs.binding().open_descriptors(), 1);

    fs.scheduler().run_until_idle();
    queued.await.unwrap();
    assert_eq!(fs.binding().open_descriptors(), 0);
    let contents = fs.read_file_sync("/f", ReadFileOptions::new()).unwrap();
    assert_eq!(contents.as_bytes(), b"queued");
}

#[tokio::test]
async fn test_cp_copies_a_tree() {
    let fs = memory_fs();
    fs.mkdir_sync("/src/nested", MkdirOptions::new().recursive(true))
        .unwrap();
    fs.write_file_sync("/src/nested/leaf", "leaf", WriteFileOptions::new())
        .unwrap();

    let copying = fs
        .promises()
        .cp("/src", "/dst", CpOptions::new().recursive(true));
    fs.scheduler().run_until_idle();
    copying.await.unwrap();

    let leaf = fs
        .read_file_sync("/dst/nested/leaf", ReadFileOptions::new())
        .unwrap();
    assert_eq!(leaf.as_bytes(), b"leaf");
}
