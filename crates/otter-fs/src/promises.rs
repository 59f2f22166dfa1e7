//! Promise-style surface: each method returns a [`Pending`] that settles
//! after the scheduler has run the operation. Validation failures settle
//! immediately.

use crate::args::{Data, OpenFlags, PathLike, PathOrFd, TimeArg};
use crate::binding::FsBinding;
use crate::dir::{Dir, ReaddirEntries};
use crate::encoding::Contents;
use crate::errors::FsResult;
use crate::file_handle::FileHandle;
use crate::fs_core::NodeFs;
use crate::options::{
    AppendFileOptions, CpOptions, EncodingOptions, MkdirOptions, OpendirOptions, ReadFileOptions,
    ReaddirOptions, RmOptions, RmdirOptions, StatOptions, WriteFileOptions,
};
use crate::scheduler::Pending;
use crate::stats::StatsResult;
use crate::validate;

pub struct FsPromises<B: FsBinding> {
    fs: NodeFs<B>,
}

impl<B: FsBinding> Clone for FsPromises<B> {
    fn clone(&self) -> Self {
        Self {
            fs: self.fs.clone(),
        }
    }
}

impl<B: FsBinding> NodeFs<B> {
    pub fn promises(&self) -> FsPromises<B> {
        FsPromises { fs: self.clone() }
    }
}

impl<B: FsBinding> FsPromises<B> {
    pub fn fs(&self) -> &NodeFs<B> {
        &self.fs
    }

    pub fn access(&self, path: impl Into<PathLike>, mode: Option<u32>) -> Pending<()> {
        self.fs.scheduler().submit(self.fs.deferred_access(path, mode))
    }

    pub fn append_file(
        &self,
        file: impl Into<PathOrFd>,
        data: impl Into<Data>,
        options: impl Into<AppendFileOptions>,
    ) -> Pending<()> {
        self.fs
            .scheduler()
            .submit(self.fs.deferred_append_file(file, data, options))
    }

    pub fn chmod(&self, path: impl Into<PathLike>, mode: u32) -> Pending<()> {
        let check = self.fs.chmod_sync(path, mode);
        self.fs.scheduler().submit(self.fs.deferred_inert(check))
    }

    pub fn chown(&self, path: impl Into<PathLike>, uid: u32, gid: u32) -> Pending<()> {
        let check = self.fs.chown_sync(path, uid, gid);
        self.fs.scheduler().submit(self.fs.deferred_inert(check))
    }

    pub fn copy_file(
        &self,
        src: impl Into<PathLike>,
        dest: impl Into<PathLike>,
        mode: Option<u32>,
    ) -> Pending<()> {
        self.fs
            .scheduler()
            .submit(self.fs.deferred_copy_file(src, dest, mode))
    }

    pub fn cp(
        &self,
        src: impl Into<PathLike>,
        dest: impl Into<PathLike>,
        options: CpOptions,
    ) -> Pending<()> {
        self.fs
            .scheduler()
            .submit(self.fs.deferred_cp(src, dest, options))
    }

    pub fn lchmod(&self, path: impl Into<PathLike>, mode: u32) -> Pending<()> {
        let check = self.fs.lchmod_sync(path, mode);
        self.fs.scheduler().submit(self.fs.deferred_inert(check))
    }

    pub fn lchown(&self, path: impl Into<PathLike>, uid: u32, gid: u32) -> Pending<()> {
        let check = self.fs.lchown_sync(path, uid, gid);
        self.fs.scheduler().submit(self.fs.deferred_inert(check))
    }

    pub fn lutimes(
        &self,
        path: impl Into<PathLike>,
        atime: impl Into<TimeArg>,
        mtime: impl Into<TimeArg>,
    ) -> Pending<()> {
        self.fs
            .scheduler()
            .submit(self.fs.deferred_lutimes(path, atime, mtime))
    }

    pub fn link(
        &self,
        existing_path: impl Into<PathLike>,
        new_path: impl Into<PathLike>,
    ) -> Pending<()> {
        self.fs
            .scheduler()
            .submit(self.fs.deferred_link(existing_path, new_path))
    }

    pub fn lstat(
        &self,
        path: impl Into<PathLike>,
        options: StatOptions,
    ) -> Pending<Option<StatsResult>> {
        self.fs
            .scheduler()
            .submit(self.fs.deferred_lstat(path, options))
    }

    pub fn mkdir(
        &self,
        path: impl Into<PathLike>,
        options: impl Into<MkdirOptions>,
    ) -> Pending<Option<String>> {
        self.fs
            .scheduler()
            .submit(self.fs.deferred_mkdir(path, options))
    }

    pub fn mkdtemp(
        &self,
        prefix: impl Into<PathLike>,
        options: impl Into<EncodingOptions>,
    ) -> Pending<Contents> {
        self.fs
            .scheduler()
            .submit(self.fs.deferred_mkdtemp(prefix, options))
    }

    /// Open `path` and wrap the descriptor in a [`FileHandle`].
    pub fn open(
        &self,
        path: impl Into<PathLike>,
        flags: impl Into<OpenFlags>,
        mode: Option<u32>,
    ) -> Pending<FileHandle<B>> {
        match self.prepare_open(path, flags, mode) {
            Ok(op) => self.fs.scheduler().defer(op),
            Err(err) => Pending::ready(Err(err)),
        }
    }

    fn prepare_open(
        &self,
        path: impl Into<PathLike>,
        flags: impl Into<OpenFlags>,
        mode: Option<u32>,
    ) -> FsResult<impl FnOnce() -> FsResult<FileHandle<B>> + Send + 'static> {
        let path = validate::path(path, "path")?;
        let open = self.fs.deferred_open(path.clone(), flags, mode)?;
        let fs = self.fs.clone();
        Ok(move || {
            let fd = open()?;
            Ok(FileHandle::new(fs, fd, path))
        })
    }

    pub fn opendir(
        &self,
        path: impl Into<PathLike>,
        options: impl Into<OpendirOptions>,
    ) -> Pending<Dir<B>> {
        self.fs
            .scheduler()
            .submit(self.fs.deferred_opendir(path, options))
    }

    pub fn readdir(
        &self,
        path: impl Into<PathLike>,
        options: impl Into<ReaddirOptions>,
    ) -> Pending<ReaddirEntries> {
        self.fs
            .scheduler()
            .submit(self.fs.deferred_readdir(path, options))
    }

    pub fn read_file(
        &self,
        file: impl Into<PathOrFd>,
        options: impl Into<ReadFileOptions>,
    ) -> Pending<Contents> {
        self.fs
            .scheduler()
            .submit(self.fs.deferred_read_file(file, options))
    }

    pub fn readlink(
        &self,
        path: impl Into<PathLike>,
        options: impl Into<EncodingOptions>,
    ) -> Pending<Contents> {
        self.fs
            .scheduler()
            .submit(self.fs.deferred_readlink(path, options))
    }

    pub fn realpath(
        &self,
        path: impl Into<PathLike>,
        options: impl Into<EncodingOptions>,
    ) -> Pending<Contents> {
        self.fs
            .scheduler()
            .submit(self.fs.deferred_realpath(path, options))
    }

    pub fn rename(
        &self,
        old_path: impl Into<PathLike>,
        new_path: impl Into<PathLike>,
    ) -> Pending<()> {
        self.fs
            .scheduler()
            .submit(self.fs.deferred_rename(old_path, new_path))
    }

    pub fn rmdir(&self, path: impl Into<PathLike>, options: RmdirOptions) -> Pending<()> {
        self.fs
            .scheduler()
            .submit(self.fs.deferred_rmdir(path, options))
    }

    pub fn rm(&self, path: impl Into<PathLike>, options: RmOptions) -> Pending<()> {
        self.fs.scheduler().submit(self.fs.deferred_rm(path, options))
    }

    pub fn stat(
        &self,
        path: impl Into<PathLike>,
        options: StatOptions,
    ) -> Pending<Option<StatsResult>> {
        self.fs
            .scheduler()
            .submit(self.fs.deferred_stat(path, options))
    }

    pub fn symlink(&self, target: impl Into<PathLike>, path: impl Into<PathLike>) -> Pending<()> {
        self.fs
            .scheduler()
            .submit(self.fs.deferred_symlink(target, path))
    }

    pub fn truncate(&self, path: impl Into<PathLike>, len: Option<u64>) -> Pending<()> {
        self.fs
            .scheduler()
            .submit(self.fs.deferred_truncate(path, len))
    }

    pub fn unlink(&self, path: impl Into<PathLike>) -> Pending<()> {
        self.fs.scheduler().submit(self.fs.deferred_unlink(path))
    }

    pub fn utimes(
        &self,
        path: impl Into<PathLike>,
        atime: impl Into<TimeArg>,
        mtime: impl Into<TimeArg>,
    ) -> Pending<()> {
        self.fs
            .scheduler()
            .submit(self.fs.deferred_utimes(path, atime, mtime))
    }

    pub fn write_file(
        &self,
        file: impl Into<PathOrFd>,
        data: impl Into<Data>,
        options: impl Into<WriteFileOptions>,
    ) -> Pending<()> {
        self.fs
            .scheduler()
            .submit(self.fs.deferred_write_file(file, data, options))
    }

    pub fn watch(&self) -> Pending<()> {
        Pending::ready(self.fs.watch())
    }
}
