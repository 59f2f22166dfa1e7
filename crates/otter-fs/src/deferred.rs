//! Deferred forms of the synchronous operations.
//!
//! Each `deferred_*` method validates its arguments immediately and returns
//! the operation as a boxed closure that the callback and promise surfaces
//! queue on the scheduler. The closure calls the matching `*_sync` method, so
//! a deferred call behaves exactly like the blocking one.

use crate::args::{
    Data, OpenFlags, PathLike, PathOrFd, ReadArgs, ReadOptions, TimeArg, WriteRequest,
};
use crate::binding::{Fd, FsBinding, Position};
use crate::cp;
use crate::dir::{Dir, ReaddirEntries};
use crate::encoding::Contents;
use crate::errors::FsResult;
use crate::fs_core::{NodeFs, Target};
use crate::options::{
    AppendFileOptions, CpOptions, EncodingOptions, MkdirOptions, OpendirOptions, ReadFileOptions,
    ReaddirOptions, RmOptions, RmdirOptions, StatOptions, WriteFileOptions,
};
use crate::stats::StatsResult;
use crate::validate;

/// A validated operation waiting for its turn.
pub(crate) type Deferred<T> = Box<dyn FnOnce() -> FsResult<T> + Send + 'static>;

/// Bytes read and the buffer they landed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOutcome {
    pub bytes_read: usize,
    pub buffer: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadvOutcome {
    pub bytes_read: usize,
    pub buffers: Vec<Vec<u8>>,
}

impl<B: FsBinding> NodeFs<B> {
    fn deferred<T, F>(&self, op: F) -> Deferred<T>
    where
        F: FnOnce(&NodeFs<B>) -> FsResult<T> + Send + 'static,
    {
        let fs = self.clone();
        Box::new(move || op(&fs))
    }

    pub(crate) fn deferred_stat(
        &self,
        path: impl Into<PathLike>,
        options: StatOptions,
    ) -> FsResult<Deferred<Option<StatsResult>>> {
        let path = validate::path(path, "path")?;
        Ok(self.deferred(move |fs| fs.stat_sync(path, options)))
    }

    pub(crate) fn deferred_lstat(
        &self,
        path: impl Into<PathLike>,
        options: StatOptions,
    ) -> FsResult<Deferred<Option<StatsResult>>> {
        let path = validate::path(path, "path")?;
        Ok(self.deferred(move |fs| fs.lstat_sync(path, options)))
    }

    pub(crate) fn deferred_fstat(
        &self,
        fd: Fd,
        options: StatOptions,
    ) -> FsResult<Deferred<StatsResult>> {
        let fd = validate::fd(fd)?;
        Ok(self.deferred(move |fs| fs.fstat_sync(fd, options)))
    }

    pub(crate) fn deferred_access(
        &self,
        path: impl Into<PathLike>,
        mode: Option<u32>,
    ) -> FsResult<Deferred<()>> {
        let path = validate::path(path, "path")?;
        if let Some(mode) = mode {
            validate::small_mode(mode, "mode")?;
        }
        Ok(self.deferred(move |fs| fs.access_sync(path, mode)))
    }

    /// Never fails validation; an invalid path resolves to `false`.
    pub(crate) fn deferred_exists(&self, path: impl Into<PathLike>) -> Deferred<bool> {
        let path = path.into();
        self.deferred(move |fs| Ok(fs.exists_sync(path)))
    }

    pub(crate) fn deferred_mkdir(
        &self,
        path: impl Into<PathLike>,
        options: impl Into<MkdirOptions>,
    ) -> FsResult<Deferred<Option<String>>> {
        let path = validate::path(path, "path")?;
        let options = options.into();
        validate::mode(options.merged().mode, "mode")?;
        Ok(self.deferred(move |fs| fs.mkdir_sync(path, options)))
    }

    pub(crate) fn deferred_rmdir(
        &self,
        path: impl Into<PathLike>,
        options: RmdirOptions,
    ) -> FsResult<Deferred<()>> {
        let path = validate::path(path, "path")?;
        Ok(self.deferred(move |fs| fs.rmdir_sync(path, options)))
    }

    pub(crate) fn deferred_rm(
        &self,
        path: impl Into<PathLike>,
        options: RmOptions,
    ) -> FsResult<Deferred<()>> {
        let path = validate::path(path, "path")?;
        Ok(self.deferred(move |fs| fs.rm_sync(path, options)))
    }

    pub(crate) fn deferred_rename(
        &self,
        old_path: impl Into<PathLike>,
        new_path: impl Into<PathLike>,
    ) -> FsResult<Deferred<()>> {
        let old_path = validate::path(old_path, "oldPath")?;
        let new_path = validate::path(new_path, "newPath")?;
        Ok(self.deferred(move |fs| fs.rename_sync(old_path, new_path)))
    }

    pub(crate) fn deferred_unlink(&self, path: impl Into<PathLike>) -> FsResult<Deferred<()>> {
        let path = validate::path(path, "path")?;
        Ok(self.deferred(move |fs| fs.unlink_sync(path)))
    }

    pub(crate) fn deferred_truncate(
        &self,
        path: impl Into<PathLike>,
        len: Option<u64>,
    ) -> FsResult<Deferred<()>> {
        let path = validate::path(path, "path")?;
        Ok(self.deferred(move |fs| fs.truncate_sync(path, len)))
    }

    pub(crate) fn deferred_ftruncate(&self, fd: Fd, len: Option<u64>) -> FsResult<Deferred<()>> {
        let fd = validate::fd(fd)?;
        Ok(self.deferred(move |fs| fs.ftruncate_sync(fd, len)))
    }

    pub(crate) fn deferred_realpath(
        &self,
        path: impl Into<PathLike>,
        options: impl Into<EncodingOptions>,
    ) -> FsResult<Deferred<Contents>> {
        let path = validate::path(path, "path")?;
        let options = options.into();
        Ok(self.deferred(move |fs| fs.realpath_sync(path, options)))
    }

    pub(crate) fn deferred_mkdtemp(
        &self,
        prefix: impl Into<PathLike>,
        options: impl Into<EncodingOptions>,
    ) -> FsResult<Deferred<Contents>> {
        let prefix = validate::path(prefix, "prefix")?;
        let options = options.into();
        Ok(self.deferred(move |fs| fs.mkdtemp_sync(prefix, options)))
    }

    pub(crate) fn deferred_copy_file(
        &self,
        src: impl Into<PathLike>,
        dest: impl Into<PathLike>,
        mode: Option<u32>,
    ) -> FsResult<Deferred<()>> {
        let src = validate::path(src, "src")?;
        let dest = validate::path(dest, "dest")?;
        if let Some(mode) = mode {
            validate::small_mode(mode, "mode")?;
        }
        Ok(self.deferred(move |fs| fs.copy_file_sync(src, dest, mode)))
    }

    pub(crate) fn deferred_cp(
        &self,
        src: impl Into<PathLike>,
        dest: impl Into<PathLike>,
        options: CpOptions,
    ) -> FsResult<Deferred<()>> {
        cp::resolve_options(&options)?;
        let src = validate::path(src, "src")?;
        let dest = validate::path(dest, "dest")?;
        Ok(self.deferred(move |fs| fs.cp_sync(src, dest, options)))
    }

    pub(crate) fn deferred_link(
        &self,
        existing_path: impl Into<PathLike>,
        new_path: impl Into<PathLike>,
    ) -> FsResult<Deferred<()>> {
        let existing_path = validate::path(existing_path, "existingPath")?;
        let new_path = validate::path(new_path, "newPath")?;
        Ok(self.deferred(move |fs| fs.link_sync(existing_path, new_path)))
    }

    pub(crate) fn deferred_symlink(
        &self,
        target: impl Into<PathLike>,
        path: impl Into<PathLike>,
    ) -> FsResult<Deferred<()>> {
        let target = validate::path(target, "target")?;
        let path = validate::path(path, "path")?;
        Ok(self.deferred(move |fs| fs.symlink_sync(target, path)))
    }

    pub(crate) fn deferred_readlink(
        &self,
        path: impl Into<PathLike>,
        options: impl Into<EncodingOptions>,
    ) -> FsResult<Deferred<Contents>> {
        let path = validate::path(path, "path")?;
        let options = options.into();
        Ok(self.deferred(move |fs| fs.readlink_sync(path, options)))
    }

    pub(crate) fn deferred_open(
        &self,
        path: impl Into<PathLike>,
        flags: impl Into<OpenFlags>,
        mode: Option<u32>,
    ) -> FsResult<Deferred<Fd>> {
        let path = validate::path(path, "path")?;
        let flags = flags.into();
        flags.to_bits()?;
        if let Some(mode) = mode {
            validate::mode(mode, "mode")?;
        }
        Ok(self.deferred(move |fs| fs.open_sync(path, flags, mode)))
    }

    pub(crate) fn deferred_close(&self, fd: Fd) -> FsResult<Deferred<()>> {
        let fd = validate::fd(fd)?;
        Ok(self.deferred(move |fs| fs.close_sync(fd)))
    }

    pub(crate) fn deferred_fsync(&self, fd: Fd) -> FsResult<Deferred<()>> {
        let fd = validate::fd(fd)?;
        Ok(self.deferred(move |fs| fs.fsync_sync(fd)))
    }

    pub(crate) fn deferred_fdatasync(&self, fd: Fd) -> FsResult<Deferred<()>> {
        let fd = validate::fd(fd)?;
        Ok(self.deferred(move |fs| fs.fdatasync_sync(fd)))
    }

    pub(crate) fn deferred_read(
        &self,
        fd: Fd,
        buffer: Vec<u8>,
        args: impl Into<ReadArgs>,
    ) -> FsResult<Deferred<ReadOutcome>> {
        let fd = validate::fd(fd)?;
        let args = args.into();
        args.resolve(buffer.len())?;
        Ok(self.deferred(move |fs| {
            let mut buffer = buffer;
            let bytes_read = fs.read_sync(fd, &mut buffer, args)?;
            Ok(ReadOutcome { bytes_read, buffer })
        }))
    }

    /// `read` without a caller buffer: one chunk of `read_chunk_size` bytes.
    pub(crate) fn deferred_read_chunk(
        &self,
        fd: Fd,
        options: ReadOptions,
    ) -> FsResult<Deferred<ReadOutcome>> {
        let buffer = vec![0u8; self.config().read_chunk_size];
        self.deferred_read(fd, buffer, options)
    }

    pub(crate) fn deferred_write(
        &self,
        fd: Fd,
        request: impl Into<WriteRequest>,
    ) -> FsResult<Deferred<usize>> {
        let fd = validate::fd(fd)?;
        let request = request.into();
        request.as_args().resolve()?;
        Ok(self.deferred(move |fs| fs.write_sync(fd, request.as_args())))
    }

    pub(crate) fn deferred_readv(
        &self,
        fd: Fd,
        buffers: Vec<Vec<u8>>,
        position: impl Into<Position>,
    ) -> FsResult<Deferred<ReadvOutcome>> {
        let fd = validate::fd(fd)?;
        let position = position.into();
        validate::position(position)?;
        Ok(self.deferred(move |fs| {
            let mut buffers = buffers;
            let mut slices: Vec<&mut [u8]> =
                buffers.iter_mut().map(Vec::as_mut_slice).collect();
            let bytes_read = fs.readv_sync(fd, &mut slices, position)?;
            Ok(ReadvOutcome {
                bytes_read,
                buffers,
            })
        }))
    }

    pub(crate) fn deferred_writev(
        &self,
        fd: Fd,
        buffers: Vec<Vec<u8>>,
        position: impl Into<Position>,
    ) -> FsResult<Deferred<usize>> {
        let fd = validate::fd(fd)?;
        let position = position.into();
        validate::position(position)?;
        Ok(self.deferred(move |fs| {
            let slices: Vec<&[u8]> = buffers.iter().map(Vec::as_slice).collect();
            fs.writev_sync(fd, &slices, position)
        }))
    }

    pub(crate) fn deferred_read_file(
        &self,
        file: impl Into<PathOrFd>,
        options: impl Into<ReadFileOptions>,
    ) -> FsResult<Deferred<Contents>> {
        let target = Target::resolve(file)?;
        let options = options.into();
        options.merged().flag.to_bits()?;
        Ok(self.deferred(move |fs| fs.read_file_sync(target, options)))
    }

    pub(crate) fn deferred_write_file(
        &self,
        file: impl Into<PathOrFd>,
        data: impl Into<Data>,
        options: impl Into<WriteFileOptions>,
    ) -> FsResult<Deferred<()>> {
        let target = Target::resolve(file)?;
        let data = data.into();
        let options = options.into();
        let resolved = options.merged();
        resolved.flag.to_bits()?;
        validate::mode(resolved.mode, "mode")?;
        Ok(self.deferred(move |fs| fs.write_file_sync(target, data, options)))
    }

    pub(crate) fn deferred_append_file(
        &self,
        file: impl Into<PathOrFd>,
        data: impl Into<Data>,
        options: impl Into<AppendFileOptions>,
    ) -> FsResult<Deferred<()>> {
        let target = Target::resolve(file)?;
        let data = data.into();
        let options = options.into();
        let resolved = options.merged();
        resolved.flag.to_bits()?;
        validate::mode(resolved.mode, "mode")?;
        Ok(self.deferred(move |fs| fs.append_file_sync(target, data, options)))
    }

    pub(crate) fn deferred_opendir(
        &self,
        path: impl Into<PathLike>,
        options: impl Into<OpendirOptions>,
    ) -> FsResult<Deferred<Dir<B>>> {
        let path = validate::path(path, "path")?;
        let options = options.into();
        Ok(self.deferred(move |fs| fs.opendir_sync(path, options)))
    }

    pub(crate) fn deferred_readdir(
        &self,
        path: impl Into<PathLike>,
        options: impl Into<ReaddirOptions>,
    ) -> FsResult<Deferred<ReaddirEntries>> {
        let path = validate::path(path, "path")?;
        let options = options.into();
        Ok(self.deferred(move |fs| fs.readdir_sync(path, options)))
    }

    pub(crate) fn deferred_utimes(
        &self,
        path: impl Into<PathLike>,
        atime: impl Into<TimeArg>,
        mtime: impl Into<TimeArg>,
    ) -> FsResult<Deferred<()>> {
        let path = validate::path(path, "path")?;
        let (atime, mtime) = (atime.into(), mtime.into());
        check_times(&atime, &mtime)?;
        Ok(self.deferred(move |fs| fs.utimes_sync(path, atime, mtime)))
    }

    pub(crate) fn deferred_lutimes(
        &self,
        path: impl Into<PathLike>,
        atime: impl Into<TimeArg>,
        mtime: impl Into<TimeArg>,
    ) -> FsResult<Deferred<()>> {
        let path = validate::path(path, "path")?;
        let (atime, mtime) = (atime.into(), mtime.into());
        check_times(&atime, &mtime)?;
        Ok(self.deferred(move |fs| fs.lutimes_sync(path, atime, mtime)))
    }

    pub(crate) fn deferred_futimes(
        &self,
        fd: Fd,
        atime: impl Into<TimeArg>,
        mtime: impl Into<TimeArg>,
    ) -> FsResult<Deferred<()>> {
        let fd = validate::fd(fd)?;
        let (atime, mtime) = (atime.into(), mtime.into());
        check_times(&atime, &mtime)?;
        Ok(self.deferred(move |fs| fs.futimes_sync(fd, atime, mtime)))
    }

    /// The permission family does nothing beyond validation, so its
    /// deferred form is a no-op that still waits for its turn.
    pub(crate) fn deferred_inert(&self, check: FsResult<()>) -> FsResult<Deferred<()>> {
        check?;
        Ok(Box::new(|| Ok(())))
    }
}

fn check_times(atime: &TimeArg, mtime: &TimeArg) -> FsResult<()> {
    validate::time_ms(atime, "atime")?;
    validate::time_ms(mtime, "mtime")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::memory::MemoryBinding;
    use crate::config::FsConfig;

    fn fs() -> NodeFs<MemoryBinding> {
        NodeFs::memory(FsConfig::default())
    }

    #[test]
    fn validation_happens_before_scheduling() {
        let fs = fs();
        assert!(fs.deferred_stat("bad\0path", StatOptions::new()).is_err());
        assert!(fs.deferred_close(-3).is_err());
        assert!(fs
            .deferred_read(3, vec![0; 4], ReadArgs::positional(2, 8, Position::Current))
            .is_err());
        assert_eq!(fs.scheduler().pending(), 0);
    }

    #[test]
    fn the_operation_only_runs_when_called() {
        let fs = fs();
        let op = fs
            .deferred_mkdir("/later", MkdirOptions::new())
            .unwrap();
        assert!(!fs.exists_sync("/later"));
        op().unwrap();
        assert!(fs.exists_sync("/later"));
    }

    #[test]
    fn read_hands_the_buffer_back() {
        let fs = fs();
        fs.write_file_sync("/f", "abc", WriteFileOptions::new()).unwrap();
        let fd = fs.open_sync("/f", "r", None).unwrap();
        let outcome = fs.deferred_read(fd, vec![0; 5], ReadArgs::whole()).unwrap()().unwrap();
        assert_eq!(outcome.bytes_read, 3);
        assert_eq!(&outcome.buffer[..3], b"abc");
        fs.close_sync(fd).unwrap();
    }

    #[test]
    fn bad_times_are_rejected_immediately() {
        let fs = fs();
        let err = fs.deferred_utimes("/f", f64::NAN, 0i64).err().unwrap();
        assert_eq!(err.code(), "ERR_INVALID_ARG_TYPE");
    }
}
