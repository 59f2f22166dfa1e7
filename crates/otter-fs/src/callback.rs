//! Callback-style surface.
//!
//! Every method validates immediately and returns the validation failure as
//! `Err`. On success the operation is queued and the callback receives its
//! result on a later scheduler turn.

use crate::args::{
    Data, OpenFlags, PathLike, PathOrFd, ReadArgs, ReadOptions, TimeArg, WriteRequest,
};
use crate::binding::{Fd, FsBinding, Position};
use crate::deferred::{Deferred, ReadOutcome, ReadvOutcome};
use crate::dir::{Dir, ReaddirEntries};
use crate::encoding::Contents;
use crate::errors::FsResult;
use crate::fs_core::NodeFs;
use crate::options::{
    AppendFileOptions, CpOptions, EncodingOptions, MkdirOptions, OpendirOptions, ReadFileOptions,
    ReaddirOptions, RmOptions, RmdirOptions, StatOptions, WriteFileOptions,
};
use crate::stats::StatsResult;

pub struct CallbackFs<B: FsBinding> {
    fs: NodeFs<B>,
}

impl<B: FsBinding> Clone for CallbackFs<B> {
    fn clone(&self) -> Self {
        Self {
            fs: self.fs.clone(),
        }
    }
}

impl<B: FsBinding> NodeFs<B> {
    /// Callback surface sharing this facade's binding and scheduler.
    pub fn callbacks(&self) -> CallbackFs<B> {
        CallbackFs { fs: self.clone() }
    }
}

impl<B: FsBinding> CallbackFs<B> {
    pub fn fs(&self) -> &NodeFs<B> {
        &self.fs
    }

    fn submit<T: 'static>(
        &self,
        op: FsResult<Deferred<T>>,
        callback: impl FnOnce(FsResult<T>) + Send + 'static,
    ) -> FsResult<()> {
        let op = op?;
        self.fs.scheduler().defer_callback(op, callback);
        Ok(())
    }

    pub fn stat(
        &self,
        path: impl Into<PathLike>,
        options: StatOptions,
        callback: impl FnOnce(FsResult<Option<StatsResult>>) + Send + 'static,
    ) -> FsResult<()> {
        self.submit(self.fs.deferred_stat(path, options), callback)
    }

    pub fn lstat(
        &self,
        path: impl Into<PathLike>,
        options: StatOptions,
        callback: impl FnOnce(FsResult<Option<StatsResult>>) + Send + 'static,
    ) -> FsResult<()> {
        self.submit(self.fs.deferred_lstat(path, options), callback)
    }

    pub fn fstat(
        &self,
        fd: Fd,
        options: StatOptions,
        callback: impl FnOnce(FsResult<StatsResult>) + Send + 'static,
    ) -> FsResult<()> {
        self.submit(self.fs.deferred_fstat(fd, options), callback)
    }

    pub fn access(
        &self,
        path: impl Into<PathLike>,
        mode: Option<u32>,
        callback: impl FnOnce(FsResult<()>) + Send + 'static,
    ) -> FsResult<()> {
        self.submit(self.fs.deferred_access(path, mode), callback)
    }

    /// The callback gets a plain `bool`; `exists` never reports an error.
    pub fn exists(
        &self,
        path: impl Into<PathLike>,
        callback: impl FnOnce(bool) + Send + 'static,
    ) {
        let op = self.fs.deferred_exists(path);
        self.fs
            .scheduler()
            .defer_callback(op, move |result| callback(result.unwrap_or(false)));
    }

    pub fn mkdir(
        &self,
        path: impl Into<PathLike>,
        options: impl Into<MkdirOptions>,
        callback: impl FnOnce(FsResult<Option<String>>) + Send + 'static,
    ) -> FsResult<()> {
        self.submit(self.fs.deferred_mkdir(path, options), callback)
    }

    pub fn rmdir(
        &self,
        path: impl Into<PathLike>,
        options: RmdirOptions,
        callback: impl FnOnce(FsResult<()>) + Send + 'static,
    ) -> FsResult<()> {
        self.submit(self.fs.deferred_rmdir(path, options), callback)
    }

    pub fn rm(
        &self,
        path: impl Into<PathLike>,
        options: RmOptions,
        callback: impl FnOnce(FsResult<()>) + Send + 'static,
    ) -> FsResult<()> {
        self.submit(self.fs.deferred_rm(path, options), callback)
    }

    pub fn rename(
        &self,
        old_path: impl Into<PathLike>,
        new_path: impl Into<PathLike>,
        callback: impl FnOnce(FsResult<()>) + Send + 'static,
    ) -> FsResult<()> {
        self.submit(self.fs.deferred_rename(old_path, new_path), callback)
    }

    pub fn unlink(
        &self,
        path: impl Into<PathLike>,
        callback: impl FnOnce(FsResult<()>) + Send + 'static,
    ) -> FsResult<()> {
        self.submit(self.fs.deferred_unlink(path), callback)
    }

    pub fn truncate(
        &self,
        path: impl Into<PathLike>,
        len: Option<u64>,
        callback: impl FnOnce(FsResult<()>) + Send + 'static,
    ) -> FsResult<()> {
        self.submit(self.fs.deferred_truncate(path, len), callback)
    }

    pub fn ftruncate(
        &self,
        fd: Fd,
        len: Option<u64>,
        callback: impl FnOnce(FsResult<()>) + Send + 'static,
    ) -> FsResult<()> {
        self.submit(self.fs.deferred_ftruncate(fd, len), callback)
    }

    pub fn realpath(
        &self,
        path: impl Into<PathLike>,
        options: impl Into<EncodingOptions>,
        callback: impl FnOnce(FsResult<Contents>) + Send + 'static,
    ) -> FsResult<()> {
        self.submit(self.fs.deferred_realpath(path, options), callback)
    }

    pub fn mkdtemp(
        &self,
        prefix: impl Into<PathLike>,
        options: impl Into<EncodingOptions>,
        callback: impl FnOnce(FsResult<Contents>) + Send + 'static,
    ) -> FsResult<()> {
        self.submit(self.fs.deferred_mkdtemp(prefix, options), callback)
    }

    pub fn copy_file(
        &self,
        src: impl Into<PathLike>,
        dest: impl Into<PathLike>,
        mode: Option<u32>,
        callback: impl FnOnce(FsResult<()>) + Send + 'static,
    ) -> FsResult<()> {
        self.submit(self.fs.deferred_copy_file(src, dest, mode), callback)
    }

    pub fn cp(
        &self,
        src: impl Into<PathLike>,
        dest: impl Into<PathLike>,
        options: CpOptions,
        callback: impl FnOnce(FsResult<()>) + Send + 'static,
    ) -> FsResult<()> {
        self.submit(self.fs.deferred_cp(src, dest, options), callback)
    }

    pub fn link(
        &self,
        existing_path: impl Into<PathLike>,
        new_path: impl Into<PathLike>,
        callback: impl FnOnce(FsResult<()>) + Send + 'static,
    ) -> FsResult<()> {
        self.submit(self.fs.deferred_link(existing_path, new_path), callback)
    }

    pub fn symlink(
        &self,
        target: impl Into<PathLike>,
        path: impl Into<PathLike>,
        callback: impl FnOnce(FsResult<()>) + Send + 'static,
    ) -> FsResult<()> {
        self.submit(self.fs.deferred_symlink(target, path), callback)
    }

    pub fn readlink(
        &self,
        path: impl Into<PathLike>,
        options: impl Into<EncodingOptions>,
        callback: impl FnOnce(FsResult<Contents>) + Send + 'static,
    ) -> FsResult<()> {
        self.submit(self.fs.deferred_readlink(path, options), callback)
    }

    pub fn open(
        &self,
        path: impl Into<PathLike>,
        flags: impl Into<OpenFlags>,
        mode: Option<u32>,
        callback: impl FnOnce(FsResult<Fd>) + Send + 'static,
    ) -> FsResult<()> {
        self.submit(self.fs.deferred_open(path, flags, mode), callback)
    }

    pub fn close(
        &self,
        fd: Fd,
        callback: impl FnOnce(FsResult<()>) + Send + 'static,
    ) -> FsResult<()> {
        self.submit(self.fs.deferred_close(fd), callback)
    }

    pub fn fsync(
        &self,
        fd: Fd,
        callback: impl FnOnce(FsResult<()>) + Send + 'static,
    ) -> FsResult<()> {
        self.submit(self.fs.deferred_fsync(fd), callback)
    }

    pub fn fdatasync(
        &self,
        fd: Fd,
        callback: impl FnOnce(FsResult<()>) + Send + 'static,
    ) -> FsResult<()> {
        self.submit(self.fs.deferred_fdatasync(fd), callback)
    }

    /// Reads into `buffer`, which comes back to the callback.
    pub fn read(
        &self,
        fd: Fd,
        buffer: Vec<u8>,
        args: impl Into<ReadArgs>,
        callback: impl FnOnce(FsResult<ReadOutcome>) + Send + 'static,
    ) -> FsResult<()> {
        self.submit(self.fs.deferred_read(fd, buffer, args), callback)
    }

    /// `read(fd, [options,] callback)`: reads into a fresh buffer.
    pub fn read_chunk(
        &self,
        fd: Fd,
        options: ReadOptions,
        callback: impl FnOnce(FsResult<ReadOutcome>) + Send + 'static,
    ) -> FsResult<()> {
        self.submit(self.fs.deferred_read_chunk(fd, options), callback)
    }

    pub fn write(
        &self,
        fd: Fd,
        request: impl Into<WriteRequest>,
        callback: impl FnOnce(FsResult<usize>) + Send + 'static,
    ) -> FsResult<()> {
        self.submit(self.fs.deferred_write(fd, request), callback)
    }

    pub fn readv(
        &self,
        fd: Fd,
        buffers: Vec<Vec<u8>>,
        position: impl Into<Position>,
        callback: impl FnOnce(FsResult<ReadvOutcome>) + Send + 'static,
    ) -> FsResult<()> {
        self.submit(self.fs.deferred_readv(fd, buffers, position), callback)
    }

    pub fn writev(
        &self,
        fd: Fd,
        buffers: Vec<Vec<u8>>,
        position: impl Into<Position>,
        callback: impl FnOnce(FsResult<usize>) + Send + 'static,
    ) -> FsResult<()> {
        self.submit(self.fs.deferred_writev(fd, buffers, position), callback)
    }

    pub fn read_file(
        &self,
        file: impl Into<PathOrFd>,
        options: impl Into<ReadFileOptions>,
        callback: impl FnOnce(FsResult<Contents>) + Send + 'static,
    ) -> FsResult<()> {
        self.submit(self.fs.deferred_read_file(file, options), callback)
    }

    pub fn write_file(
        &self,
        file: impl Into<PathOrFd>,
        data: impl Into<Data>,
        options: impl Into<WriteFileOptions>,
        callback: impl FnOnce(FsResult<()>) + Send + 'static,
    ) -> FsResult<()> {
        self.submit(self.fs.deferred_write_file(file, data, options), callback)
    }

    pub fn append_file(
        &self,
        file: impl Into<PathOrFd>,
        data: impl Into<Data>,
        options: impl Into<AppendFileOptions>,
        callback: impl FnOnce(FsResult<()>) + Send + 'static,
    ) -> FsResult<()> {
        self.submit(self.fs.deferred_append_file(file, data, options), callback)
    }

    pub fn opendir(
        &self,
        path: impl Into<PathLike>,
        options: impl Into<OpendirOptions>,
        callback: impl FnOnce(FsResult<Dir<B>>) + Send + 'static,
    ) -> FsResult<()> {
        self.submit(self.fs.deferred_opendir(path, options), callback)
    }

    pub fn readdir(
        &self,
        path: impl Into<PathLike>,
        options: impl Into<ReaddirOptions>,
        callback: impl FnOnce(FsResult<ReaddirEntries>) + Send + 'static,
    ) -> FsResult<()> {
        self.submit(self.fs.deferred_readdir(path, options), callback)
    }

    pub fn utimes(
        &self,
        path: impl Into<PathLike>,
        atime: impl Into<TimeArg>,
        mtime: impl Into<TimeArg>,
        callback: impl FnOnce(FsResult<()>) + Send + 'static,
    ) -> FsResult<()> {
        self.submit(self.fs.deferred_utimes(path, atime, mtime), callback)
    }

    pub fn lutimes(
        &self,
        path: impl Into<PathLike>,
        atime: impl Into<TimeArg>,
        mtime: impl Into<TimeArg>,
        callback: impl FnOnce(FsResult<()>) + Send + 'static,
    ) -> FsResult<()> {
        self.submit(self.fs.deferred_lutimes(path, atime, mtime), callback)
    }

    pub fn futimes(
        &self,
        fd: Fd,
        atime: impl Into<TimeArg>,
        mtime: impl Into<TimeArg>,
        callback: impl FnOnce(FsResult<()>) + Send + 'static,
    ) -> FsResult<()> {
        self.submit(self.fs.deferred_futimes(fd, atime, mtime), callback)
    }

    pub fn chown(
        &self,
        path: impl Into<PathLike>,
        uid: u32,
        gid: u32,
        callback: impl FnOnce(FsResult<()>) + Send + 'static,
    ) -> FsResult<()> {
        let check = self.fs.chown_sync(path, uid, gid);
        self.submit(self.fs.deferred_inert(check), callback)
    }

    pub fn lchown(
        &self,
        path: impl Into<PathLike>,
        uid: u32,
        gid: u32,
        callback: impl FnOnce(FsResult<()>) + Send + 'static,
    ) -> FsResult<()> {
        let check = self.fs.lchown_sync(path, uid, gid);
        self.submit(self.fs.deferred_inert(check), callback)
    }

    pub fn fchown(
        &self,
        fd: Fd,
        uid: u32,
        gid: u32,
        callback: impl FnOnce(FsResult<()>) + Send + 'static,
    ) -> FsResult<()> {
        let check = self.fs.fchown_sync(fd, uid, gid);
        self.submit(self.fs.deferred_inert(check), callback)
    }

    pub fn chmod(
        &self,
        path: impl Into<PathLike>,
        mode: u32,
        callback: impl FnOnce(FsResult<()>) + Send + 'static,
    ) -> FsResult<()> {
        let check = self.fs.chmod_sync(path, mode);
        self.submit(self.fs.deferred_inert(check), callback)
    }

    pub fn lchmod(
        &self,
        path: impl Into<PathLike>,
        mode: u32,
        callback: impl FnOnce(FsResult<()>) + Send + 'static,
    ) -> FsResult<()> {
        let check = self.fs.lchmod_sync(path, mode);
        self.submit(self.fs.deferred_inert(check), callback)
    }

    pub fn fchmod(
        &self,
        fd: Fd,
        mode: u32,
        callback: impl FnOnce(FsResult<()>) + Send + 'static,
    ) -> FsResult<()> {
        let check = self.fs.fchmod_sync(fd, mode);
        self.submit(self.fs.deferred_inert(check), callback)
    }

    pub fn watch(&self) -> FsResult<()> {
        self.fs.watch()
    }

    pub fn watch_file(&self) -> FsResult<()> {
        self.fs.watch_file()
    }

    pub fn unwatch(&self) -> FsResult<()> {
        self.fs.unwatch()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::binding::memory::MemoryBinding;
    use crate::config::FsConfig;

    fn fs() -> NodeFs<MemoryBinding> {
        NodeFs::memory(FsConfig::default())
    }

    #[test]
    fn validation_errors_are_returned_synchronously() {
        let fs = fs();
        let called = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&called);
        let err = fs
            .callbacks()
            .mkdir("bad\0", MkdirOptions::new(), move |_| {
                *flag.lock().unwrap() = true;
            })
            .unwrap_err();
        assert_eq!(err.code(), "ERR_INVALID_ARG_VALUE");
        fs.scheduler().run_until_idle();
        assert!(!*called.lock().unwrap());
    }

    #[test]
    fn operation_errors_reach_the_callback() {
        let fs = fs();
        let seen = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&seen);
        fs.callbacks()
            .rmdir("/missing", RmdirOptions::new(), move |result| {
                *slot.lock().unwrap() = Some(result.unwrap_err().code().to_string());
            })
            .unwrap();
        assert!(seen.lock().unwrap().is_none());
        fs.scheduler().run_until_idle();
        assert_eq!(seen.lock().unwrap().as_deref(), Some("ENOENT"));
    }

    #[test]
    fn completions_follow_submission_order() {
        let fs = fs();
        let log = Arc::new(Mutex::new(Vec::new()));
        let cb = fs.callbacks();

        let entry = Arc::clone(&log);
        cb.mkdir("/d", MkdirOptions::new(), move |r| {
            r.unwrap();
            entry.lock().unwrap().push("mkdir");
        })
        .unwrap();
        let entry = Arc::clone(&log);
        cb.write_file("/d/f", "x", WriteFileOptions::new(), move |r| {
            r.unwrap();
            entry.lock().unwrap().push("writeFile");
        })
        .unwrap();
        let entry = Arc::clone(&log);
        cb.exists("/d/f", move |found| {
            assert!(found);
            entry.lock().unwrap().push("exists");
        });

        assert_eq!(fs.scheduler().run_until_idle(), 3);
        assert_eq!(*log.lock().unwrap(), vec!["mkdir", "writeFile", "exists"]);
    }

    #[test]
    fn read_chunk_allocates_its_own_buffer() {
        let fs = NodeFs::memory(FsConfig::new().read_chunk_size(4));
        fs.write_file_sync("/f", "abcdef", WriteFileOptions::new()).unwrap();
        let fd = fs.open_sync("/f", "r", None).unwrap();
        let seen = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&seen);
        fs.callbacks()
            .read_chunk(fd, ReadOptions::default(), move |result| {
                *slot.lock().unwrap() = Some(result.unwrap());
            })
            .unwrap();
        fs.scheduler().run_until_idle();
        let outcome = seen.lock().unwrap().take().unwrap();
        assert_eq!(outcome.bytes_read, 4);
        assert_eq!(outcome.buffer, b"abcd");
        fs.close_sync(fd).unwrap();
    }

    #[test]
    fn watch_is_unsupported_on_every_surface() {
        let fs = fs();
        assert_eq!(
            fs.callbacks().watch().unwrap_err().code(),
            "ERR_FEATURE_UNAVAILABLE_ON_PLATFORM"
        );
    }
}
