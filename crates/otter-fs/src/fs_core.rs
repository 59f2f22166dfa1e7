//! Synchronous filesystem operation core.
//!
//! Every verb is implemented once here as a blocking `*_sync` method on
//! [`NodeFs`]. The callback and promise surfaces defer these same methods on
//! the shared [`Scheduler`], so argument handling, option defaults and error
//! mapping live in one place.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::args::{Data, OpenFlags, PathLike, PathOrFd, ReadArgs, TimeArg, WriteArgs};
use crate::binding::host::HostBinding;
use crate::binding::memory::MemoryBinding;
use crate::binding::{
    Errno, Fd, FsBinding, Position, RawError, RawResult, RawStat, TypePredicates,
};
use crate::config::FsConfig;
use crate::constants::{COPYFILE_EXCL, DEFAULT_FILE_MODE, F_OK, O_RDONLY};
use crate::dir::{Dir, ReaddirEntries};
use crate::encoding::Contents;
use crate::errors::{self, FsError, FsResult};
use crate::options::{
    AppendFileOptions, EncodingOptions, MkdirOptions, OpendirOptions, ReadFileOptions,
    ReaddirOptions, ResolvedStatOptions, RmOptions, RmdirOptions, StatOptions, WriteFileOptions,
};
use crate::path;
use crate::scheduler::Scheduler;
use crate::stats::StatsResult;
use crate::validate;

const SUFFIX_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// A validated `readFile`/`writeFile`/`appendFile` target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Target {
    Path(String),
    Fd(Fd),
}

impl Target {
    pub(crate) fn resolve(file: impl Into<PathOrFd>) -> FsResult<Self> {
        match file.into() {
            PathOrFd::Path(path) => Ok(Target::Path(validate::path(path, "path")?)),
            PathOrFd::Fd(fd) => Ok(Target::Fd(validate::fd(fd)?)),
        }
    }
}

impl From<Target> for PathOrFd {
    fn from(target: Target) -> Self {
        match target {
            Target::Path(path) => PathOrFd::Path(PathLike::Str(path)),
            Target::Fd(fd) => PathOrFd::Fd(fd),
        }
    }
}

/// The Node-compatible filesystem facade over a binding.
///
/// Cloning is cheap; clones share the binding, the configuration and the
/// scheduler.
pub struct NodeFs<B: FsBinding> {
    binding: Arc<B>,
    config: Arc<FsConfig>,
    scheduler: Scheduler,
}

impl<B: FsBinding> Clone for NodeFs<B> {
    fn clone(&self) -> Self {
        Self {
            binding: Arc::clone(&self.binding),
            config: Arc::clone(&self.config),
            scheduler: self.scheduler.clone(),
        }
    }
}

impl NodeFs<HostBinding> {
    /// Facade over the host filesystem.
    pub fn host(config: FsConfig) -> Self {
        let binding = HostBinding::with_config(&config);
        Self::with_config(binding, config)
    }
}

impl NodeFs<MemoryBinding> {
    /// Facade over a fresh in-memory tree.
    pub fn memory(config: FsConfig) -> Self {
        let binding = MemoryBinding::with_config(&config);
        Self::with_config(binding, config)
    }
}

impl<B: FsBinding> NodeFs<B> {
    pub fn new(binding: B) -> Self {
        Self::with_config(binding, FsConfig::default())
    }

    pub fn with_config(binding: B, config: FsConfig) -> Self {
        Self {
            binding: Arc::new(binding),
            config: Arc::new(config),
            scheduler: Scheduler::new(),
        }
    }

    pub fn binding(&self) -> &B {
        &self.binding
    }

    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    /// The queue deferred operations run on.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    // ---- metadata ----

    /// `None` only when `throw_if_no_entry` is off and the path is missing.
    pub fn stat_sync(
        &self,
        path: impl Into<PathLike>,
        options: StatOptions,
    ) -> FsResult<Option<StatsResult>> {
        let path = validate::path(path, "path")?;
        trace!(path = %path, "stat");
        snapshot(self.binding.stat(&path), &options.merged())
    }

    pub fn lstat_sync(
        &self,
        path: impl Into<PathLike>,
        options: StatOptions,
    ) -> FsResult<Option<StatsResult>> {
        let path = validate::path(path, "path")?;
        trace!(path = %path, "lstat");
        snapshot(self.binding.lstat(&path), &options.merged())
    }

    pub fn fstat_sync(&self, fd: Fd, options: StatOptions) -> FsResult<StatsResult> {
        let fd = validate::fd(fd)?;
        trace!(fd, "fstat");
        let raw = self.binding.fstat(fd).map_err(errors::passthrough)?;
        Ok(StatsResult::from_raw(&raw, options.merged().bigint))
    }

    /// Checks `mode` against the entry's mode bits. Every failure, including a
    /// failed permission check, is reported as ENOENT.
    pub fn access_sync(&self, path: impl Into<PathLike>, mode: Option<u32>) -> FsResult<()> {
        let path = validate::path(path, "path")?;
        let mode = validate::small_mode(mode.unwrap_or(F_OK), "mode")?;
        trace!(path = %path, mode, "access");
        self.check_access(&path, mode)
            .map_err(|err| errors::for_access(err, &path))
    }

    fn check_access(&self, path: &str, mode: u32) -> FsResult<()> {
        let raw = self.binding.stat(path).map_err(errors::passthrough)?;
        let bits = raw.mode.unwrap_or(0);
        if bits & mode == mode {
            Ok(())
        } else {
            Err(errors::eacces("access", path))
        }
    }

    /// Never fails; an invalid path is simply absent.
    pub fn exists_sync(&self, path: impl Into<PathLike>) -> bool {
        match validate::path(path, "path") {
            Ok(path) => self.binding.stat(&path).is_ok(),
            Err(_) => false,
        }
    }

    // ---- directories and entries ----

    /// With `recursive`, returns the first directory actually created, or
    /// `None` when every component already existed.
    pub fn mkdir_sync(
        &self,
        path: impl Into<PathLike>,
        options: impl Into<MkdirOptions>,
    ) -> FsResult<Option<String>> {
        let path = validate::path(path, "path")?;
        let options = options.into().merged();
        let mode = validate::mode(options.mode, "mode")?;
        trace!(path = %path, recursive = options.recursive, "mkdir");

        if !options.recursive {
            self.binding
                .mkdir(&path, false, mode)
                .map_err(|err| errors::for_mkdir(err, &path))?;
            return Ok(None);
        }

        let first_created = self.first_missing_prefix(&path);
        self.binding
            .mkdir(&path, true, mode)
            .map_err(|err| errors::for_mkdir(err, &path))?;
        Ok(first_created)
    }

    fn first_missing_prefix(&self, path: &str) -> Option<String> {
        let normalized = path::normalize(path);
        path::prefixes(&normalized)
            .into_iter()
            .find(|prefix| {
                matches!(self.binding.stat(prefix), Err(RawError { errno: Errno::Noent, .. }))
            })
            .map(str::to_string)
    }

    /// Retry options are accepted but `rmdir` makes exactly one attempt.
    pub fn rmdir_sync(&self, path: impl Into<PathLike>, options: RmdirOptions) -> FsResult<()> {
        let path = validate::path(path, "path")?;
        let options = options.merged();
        trace!(path = %path, recursive = options.recursive, "rmdir");
        self.binding
            .rmdir(&path, options.recursive)
            .map_err(errors::for_lookup)
    }

    /// Makes up to `max_retries + 1` attempts, sleeping `retry_delay`
    /// milliseconds between them. Only the last failure is surfaced.
    pub fn rm_sync(&self, path: impl Into<PathLike>, options: RmOptions) -> FsResult<()> {
        let path = validate::path(path, "path")?;
        let options = options.merged();
        trace!(path = %path, recursive = options.recursive, force = options.force, "rm");

        let attempts = options.max_retries.saturating_add(1);
        let mut attempt = 1;
        loop {
            match self.binding.rm(&path, options.recursive, options.force) {
                Ok(()) => return Ok(()),
                Err(err) if attempt < attempts => {
                    warn!(
                        path = %path,
                        attempt,
                        attempts,
                        error = %err,
                        "rm failed, retrying"
                    );
                    thread::sleep(Duration::from_millis(options.retry_delay));
                    attempt += 1;
                }
                Err(err) => return Err(errors::for_lookup(err)),
            }
        }
    }

    pub fn rename_sync(
        &self,
        old_path: impl Into<PathLike>,
        new_path: impl Into<PathLike>,
    ) -> FsResult<()> {
        let old_path = validate::path(old_path, "oldPath")?;
        let new_path = validate::path(new_path, "newPath")?;
        trace!(from = %old_path, to = %new_path, "rename");
        self.binding
            .rename(&old_path, &new_path)
            .map_err(errors::for_lookup)
    }

    pub fn unlink_sync(&self, path: impl Into<PathLike>) -> FsResult<()> {
        let path = validate::path(path, "path")?;
        trace!(path = %path, "unlink");
        self.binding
            .rm(&path, false, false)
            .map_err(errors::for_lookup)
    }

    pub fn truncate_sync(&self, path: impl Into<PathLike>, len: Option<u64>) -> FsResult<()> {
        let path = validate::path(path, "path")?;
        let len = len.unwrap_or(0);
        trace!(path = %path, len, "truncate");
        self.binding
            .truncate(&path, len)
            .map_err(errors::for_lookup)
    }

    pub fn ftruncate_sync(&self, fd: Fd, len: Option<u64>) -> FsResult<()> {
        let fd = validate::fd(fd)?;
        trace!(fd, "ftruncate");
        self.binding
            .ftruncate(fd, len.unwrap_or(0))
            .map_err(errors::passthrough)
    }

    /// A path that is not a symbolic link is normalized without asking the
    /// binding to resolve it.
    pub fn realpath_sync(
        &self,
        path: impl Into<PathLike>,
        options: impl Into<EncodingOptions>,
    ) -> FsResult<Contents> {
        let path = validate::path(path, "path")?;
        let options = options.into().merged();
        trace!(path = %path, "realpath");

        let entry = self
            .binding
            .lstat(&path)
            .map_err(errors::for_lookup)?;
        let resolved = if entry.is_symbolic_link() {
            let target = self
                .binding
                .realpath(&path)
                .map_err(errors::for_lookup)?;
            path::normalize(&target)
        } else {
            path::normalize(&path)
        };
        Ok(options.encoding.decode(resolved.into_bytes()))
    }

    /// Creates `prefix` + a random alphanumeric suffix with mode `0o700`.
    /// A suffix collision is not retried.
    pub fn mkdtemp_sync(
        &self,
        prefix: impl Into<PathLike>,
        options: impl Into<EncodingOptions>,
    ) -> FsResult<Contents> {
        let prefix = validate::path(prefix, "prefix")?;
        let options = options.into().merged();
        let path = format!("{prefix}{}", random_suffix(self.config.mkdtemp_suffix_len)?);
        trace!(path = %path, "mkdtemp");
        self.binding
            .mkdir(&path, false, 0o700)
            .map_err(|err| errors::for_mkdir(err, &path))?;
        Ok(options.encoding.decode(path.into_bytes()))
    }

    pub fn copy_file_sync(
        &self,
        src: impl Into<PathLike>,
        dest: impl Into<PathLike>,
        mode: Option<u32>,
    ) -> FsResult<()> {
        let src = validate::path(src, "src")?;
        let dest = validate::path(dest, "dest")?;
        let mode = validate::small_mode(mode.unwrap_or(0), "mode")?;
        trace!(src = %src, dest = %dest, mode, "copyfile");

        if mode & COPYFILE_EXCL != 0 && self.binding.stat(&dest).is_ok() {
            return Err(errors::copyfile_exists(&src, &dest));
        }
        self.binding
            .copy_file(&src, &dest)
            .map_err(errors::for_lookup)
    }

    pub fn link_sync(
        &self,
        existing_path: impl Into<PathLike>,
        new_path: impl Into<PathLike>,
    ) -> FsResult<()> {
        let existing_path = validate::path(existing_path, "existingPath")?;
        let new_path = validate::path(new_path, "newPath")?;
        trace!(existing = %existing_path, new = %new_path, "link");
        self.binding
            .link(&existing_path, &new_path)
            .map_err(errors::for_lookup)
    }

    pub fn symlink_sync(
        &self,
        target: impl Into<PathLike>,
        path: impl Into<PathLike>,
    ) -> FsResult<()> {
        let target = validate::path(target, "target")?;
        let path = validate::path(path, "path")?;
        trace!(target = %target, path = %path, "symlink");
        self.binding
            .symlink(&target, &path)
            .map_err(errors::passthrough)
    }

    pub fn readlink_sync(
        &self,
        path: impl Into<PathLike>,
        options: impl Into<EncodingOptions>,
    ) -> FsResult<Contents> {
        let path = validate::path(path, "path")?;
        let options = options.into().merged();
        trace!(path = %path, "readlink");
        let target = self
            .binding
            .readlink(&path)
            .map_err(errors::for_lookup)?;
        Ok(options.encoding.decode(target.into_bytes()))
    }

    /// Opens a directory cursor that owns its descriptor.
    pub fn opendir_sync(
        &self,
        path: impl Into<PathLike>,
        options: impl Into<OpendirOptions>,
    ) -> FsResult<Dir<B>> {
        let path = validate::path(path, "path")?;
        let options = options.into().merged();
        if options.buffer_size == 0 {
            return Err(FsError::out_of_range(
                "options.bufferSize",
                ">= 1 && <= 4294967295",
                options.buffer_size,
            ));
        }
        let fd = self.open_directory(&path, "opendir")?;
        Ok(Dir::new(self.clone(), fd, path))
    }

    pub fn readdir_sync(
        &self,
        path: impl Into<PathLike>,
        options: impl Into<ReaddirOptions>,
    ) -> FsResult<ReaddirEntries> {
        let path = validate::path(path, "path")?;
        let options = options.into().merged();
        trace!(path = %path, "readdir");
        let fd = self.open_directory(&path, "scandir")?;
        let dir = Dir::new(self.clone(), fd, path);
        let entries = dir.entries().collect::<FsResult<Vec<_>>>()?;

        if options.with_file_types {
            Ok(ReaddirEntries::Dirents(entries))
        } else {
            Ok(ReaddirEntries::Names(
                entries
                    .into_iter()
                    .map(|entry| options.encoding.decode(entry.name().as_bytes().to_vec()))
                    .collect(),
            ))
        }
    }

    fn open_directory(&self, path: &str, syscall: &'static str) -> FsResult<Fd> {
        let fd = self
            .binding
            .open(path, O_RDONLY, 0)
            .map_err(errors::for_lookup)?;
        match self.binding.fstat(fd) {
            Ok(raw) if raw.is_directory() => {
                debug!(fd, path, "Opened directory");
                Ok(fd)
            }
            other => {
                let _ = self.binding.close(fd);
                let err = other.err().unwrap_or_else(|| {
                    RawError::new(
                        Errno::Notdir,
                        format!("ENOTDIR: not a directory, {syscall} '{path}'"),
                    )
                });
                Err(errors::passthrough(err))
            }
        }
    }

    // ---- descriptors ----

    pub fn open_sync(
        &self,
        path: impl Into<PathLike>,
        flags: impl Into<OpenFlags>,
        mode: Option<u32>,
    ) -> FsResult<Fd> {
        let path = validate::path(path, "path")?;
        let flags = flags.into().to_bits()?;
        let mode = validate::mode(mode.unwrap_or(DEFAULT_FILE_MODE), "mode")?;
        let fd = self
            .binding
            .open(&path, flags, mode)
            .map_err(errors::for_open)?;
        debug!(fd, path = %path, flags, "Opened descriptor");
        Ok(fd)
    }

    pub fn close_sync(&self, fd: Fd) -> FsResult<()> {
        let fd = validate::fd(fd)?;
        debug!(fd, "Closing descriptor");
        self.binding.close(fd).map_err(errors::passthrough)
    }

    pub fn fsync_sync(&self, fd: Fd) -> FsResult<()> {
        let fd = validate::fd(fd)?;
        trace!(fd, "fsync");
        self.binding.fsync(fd).map_err(errors::passthrough)
    }

    pub fn fdatasync_sync(&self, fd: Fd) -> FsResult<()> {
        let fd = validate::fd(fd)?;
        trace!(fd, "fdatasync");
        self.binding.fdatasync(fd).map_err(errors::passthrough)
    }

    /// Reads into `buffer[offset..offset + length]`, returning the byte count.
    pub fn read_sync(
        &self,
        fd: Fd,
        buffer: &mut [u8],
        args: impl Into<ReadArgs>,
    ) -> FsResult<usize> {
        let fd = validate::fd(fd)?;
        let call = args.into().resolve(buffer.len())?;
        trace!(fd, length = call.length, "read");
        if call.length == 0 {
            return Ok(0);
        }
        let bytes = self
            .binding
            .read(fd, call.position, call.length)
            .map_err(errors::for_read)?;
        let count = bytes.len().min(call.length);
        buffer[call.offset..call.offset + count].copy_from_slice(&bytes[..count]);
        Ok(count)
    }

    pub fn write_sync<'a>(&self, fd: Fd, args: impl Into<WriteArgs<'a>>) -> FsResult<usize> {
        let fd = validate::fd(fd)?;
        let (bytes, position) = args.into().resolve()?;
        trace!(fd, length = bytes.len(), "write");
        self.binding
            .write(fd, position, &bytes)
            .map_err(errors::passthrough)
    }

    /// Fills `buffers` in order from one read of their combined length.
    pub fn readv_sync(
        &self,
        fd: Fd,
        buffers: &mut [&mut [u8]],
        position: impl Into<Position>,
    ) -> FsResult<usize> {
        let fd = validate::fd(fd)?;
        let position = position.into();
        validate::position(position)?;
        let total: usize = buffers.iter().map(|buffer| buffer.len()).sum();
        trace!(fd, total, "readv");
        if total == 0 {
            return Ok(0);
        }

        let data = self
            .binding
            .read(fd, position, total)
            .map_err(errors::for_read)?;
        let mut rest = data.as_slice();
        for buffer in buffers.iter_mut() {
            if rest.is_empty() {
                break;
            }
            let count = buffer.len().min(rest.len());
            buffer[..count].copy_from_slice(&rest[..count]);
            rest = &rest[count..];
        }
        Ok(data.len())
    }

    /// Writes `buffers` back to back in one binding call.
    pub fn writev_sync(
        &self,
        fd: Fd,
        buffers: &[&[u8]],
        position: impl Into<Position>,
    ) -> FsResult<usize> {
        let fd = validate::fd(fd)?;
        let position = position.into();
        validate::position(position)?;
        let data = buffers.concat();
        trace!(fd, total = data.len(), "writev");
        if data.is_empty() {
            return Ok(0);
        }
        self.binding
            .write(fd, position, &data)
            .map_err(errors::passthrough)
    }

    // ---- whole files ----

    pub fn read_file_sync(
        &self,
        file: impl Into<PathOrFd>,
        options: impl Into<ReadFileOptions>,
    ) -> FsResult<Contents> {
        let target = Target::resolve(file)?;
        let options = options.into().merged();
        let flags = options.flag.to_bits()?;
        trace!(file = ?target, "readFile");
        let bytes =
            self.with_descriptor(&target, flags, DEFAULT_FILE_MODE, |fd| self.read_to_end(fd))?;
        Ok(options.encoding.decode(bytes))
    }

    pub fn write_file_sync(
        &self,
        file: impl Into<PathOrFd>,
        data: impl Into<Data>,
        options: impl Into<WriteFileOptions>,
    ) -> FsResult<()> {
        let target = Target::resolve(file)?;
        let options = options.into().merged();
        let flags = options.flag.to_bits()?;
        let mode = validate::mode(options.mode, "mode")?;
        let bytes = data.into().into_bytes(options.encoding)?;
        trace!(file = ?target, length = bytes.len(), "writeFile");
        self.with_descriptor(&target, flags, mode, |fd| self.write_all(fd, &bytes))
    }

    pub fn append_file_sync(
        &self,
        file: impl Into<PathOrFd>,
        data: impl Into<Data>,
        options: impl Into<AppendFileOptions>,
    ) -> FsResult<()> {
        let target = Target::resolve(file)?;
        let options = options.into().merged();
        let flags = options.flag.to_bits()?;
        let mode = validate::mode(options.mode, "mode")?;
        let bytes = data.into().into_bytes(options.encoding)?;
        trace!(file = ?target, length = bytes.len(), "appendFile");
        self.with_descriptor(&target, flags, mode, |fd| self.write_all(fd, &bytes))
    }

    /// Runs `f` on the target's descriptor. A descriptor opened here is
    /// closed here; a caller-supplied one is left open.
    fn with_descriptor<T>(
        &self,
        target: &Target,
        flags: u32,
        mode: u32,
        f: impl FnOnce(Fd) -> FsResult<T>,
    ) -> FsResult<T> {
        match target {
            Target::Fd(fd) => f(*fd),
            Target::Path(path) => {
                let fd = self
                    .binding
                    .open(path, flags, mode)
                    .map_err(errors::for_open)?;
                let result = f(fd);
                let closed = self.binding.close(fd).map_err(errors::passthrough);
                let value = result?;
                closed?;
                Ok(value)
            }
        }
    }

    fn read_to_end(&self, fd: Fd) -> FsResult<Vec<u8>> {
        let size = self
            .binding
            .fstat(fd)
            .map_err(errors::passthrough)?
            .size
            .unwrap_or(0);
        let size = usize::try_from(size).unwrap_or(usize::MAX);
        let mut out = Vec::with_capacity(size.min(1 << 24));
        loop {
            let want = if out.len() < size {
                size - out.len()
            } else {
                self.config.read_chunk_size.max(1)
            };
            let chunk = self
                .binding
                .read(fd, Position::Current, want)
                .map_err(errors::for_read)?;
            if chunk.is_empty() {
                return Ok(out);
            }
            out.extend_from_slice(&chunk);
        }
    }

    fn write_all(&self, fd: Fd, mut bytes: &[u8]) -> FsResult<()> {
        while !bytes.is_empty() {
            let written = self
                .binding
                .write(fd, Position::Current, bytes)
                .map_err(errors::passthrough)?;
            if written == 0 {
                return Err(errors::passthrough(RawError::from(Errno::Io)));
            }
            bytes = &bytes[written.min(bytes.len())..];
        }
        Ok(())
    }

    // ---- timestamps ----

    pub fn utimes_sync(
        &self,
        path: impl Into<PathLike>,
        atime: impl Into<TimeArg>,
        mtime: impl Into<TimeArg>,
    ) -> FsResult<()> {
        let path = validate::path(path, "path")?;
        let atime = validate::time_ms(&atime.into(), "atime")?;
        let mtime = validate::time_ms(&mtime.into(), "mtime")?;
        trace!(path = %path, atime, mtime, "utimes");
        self.binding
            .utime(&path, atime, mtime)
            .map_err(errors::for_lookup)
    }

    pub fn futimes_sync(
        &self,
        fd: Fd,
        atime: impl Into<TimeArg>,
        mtime: impl Into<TimeArg>,
    ) -> FsResult<()> {
        let fd = validate::fd(fd)?;
        let atime = validate::time_ms(&atime.into(), "atime")?;
        let mtime = validate::time_ms(&mtime.into(), "mtime")?;
        trace!(fd, atime, mtime, "futimes");
        self.binding
            .futime(fd, atime, mtime)
            .map_err(errors::passthrough)
    }

    /// The binding has no link-level timestamp primitive; this follows links.
    pub fn lutimes_sync(
        &self,
        path: impl Into<PathLike>,
        atime: impl Into<TimeArg>,
        mtime: impl Into<TimeArg>,
    ) -> FsResult<()> {
        let path = validate::path(path, "path")?;
        let atime = validate::time_ms(&atime.into(), "atime")?;
        let mtime = validate::time_ms(&mtime.into(), "mtime")?;
        trace!(path = %path, atime, mtime, "lutimes");
        self.binding
            .utime(&path, atime, mtime)
            .map_err(errors::for_lookup)
    }

    // ---- permissions: validated, otherwise inert ----

    pub fn chown_sync(&self, path: impl Into<PathLike>, _uid: u32, _gid: u32) -> FsResult<()> {
        validate::path(path, "path").map(drop)
    }

    pub fn lchown_sync(&self, path: impl Into<PathLike>, _uid: u32, _gid: u32) -> FsResult<()> {
        validate::path(path, "path").map(drop)
    }

    pub fn fchown_sync(&self, fd: Fd, _uid: u32, _gid: u32) -> FsResult<()> {
        validate::fd(fd).map(drop)
    }

    pub fn chmod_sync(&self, path: impl Into<PathLike>, mode: u32) -> FsResult<()> {
        validate::path(path, "path")?;
        validate::mode(mode, "mode").map(drop)
    }

    pub fn lchmod_sync(&self, path: impl Into<PathLike>, mode: u32) -> FsResult<()> {
        validate::path(path, "path")?;
        validate::mode(mode, "mode").map(drop)
    }

    pub fn fchmod_sync(&self, fd: Fd, mode: u32) -> FsResult<()> {
        validate::fd(fd)?;
        validate::mode(mode, "mode").map(drop)
    }

    // ---- unsupported ----

    pub fn watch(&self) -> FsResult<()> {
        Err(FsError::Unsupported { api: "watch" })
    }

    pub fn watch_file(&self) -> FsResult<()> {
        Err(FsError::Unsupported { api: "watchFile" })
    }

    pub fn unwatch(&self) -> FsResult<()> {
        Err(FsError::Unsupported { api: "unwatch" })
    }
}

fn snapshot(
    result: RawResult<RawStat>,
    options: &ResolvedStatOptions,
) -> FsResult<Option<StatsResult>> {
    match result {
        Ok(raw) => Ok(Some(StatsResult::from_raw(&raw, options.bigint))),
        Err(err) if err.errno == Errno::Noent && !options.throw_if_no_entry => Ok(None),
        Err(err) => Err(errors::for_lookup(err)),
    }
}

fn random_suffix(len: usize) -> FsResult<String> {
    let mut bytes = vec![0u8; len];
    getrandom::fill(&mut bytes)
        .map_err(|err| FsError::Internal(format!("no entropy for mkdtemp: {err}")))?;
    Ok(bytes
        .iter()
        .map(|byte| SUFFIX_ALPHABET[usize::from(*byte) % SUFFIX_ALPHABET.len()] as char)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::ReadOptions;
    use crate::constants::{R_OK, W_OK};
    use crate::encoding::Encoding;

    fn fs() -> NodeFs<MemoryBinding> {
        NodeFs::memory(FsConfig::default())
    }

    #[test]
    fn stat_missing_path_throws_or_yields_none() {
        let fs = fs();
        let err = fs.stat_sync("/missing", StatOptions::new()).unwrap_err();
        assert_eq!(err.code(), "ENOENT");
        assert_eq!(err.syscall(), None);
        assert_eq!(err.path(), None);
        assert_eq!(err.errno(), None);

        let none = fs
            .stat_sync("/missing", StatOptions::new().throw_if_no_entry(false))
            .unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn access_checks_mode_bits_and_reports_enoent() {
        let fs = fs();
        fs.write_file_sync("/f", "x", WriteFileOptions::new().mode(0o644))
            .unwrap();
        fs.access_sync("/f", None).unwrap();
        fs.access_sync("/f", Some(R_OK)).unwrap();
        let err = fs.access_sync("/f", Some(W_OK)).unwrap_err();
        assert_eq!(err.code(), "ENOENT");
        let err = fs.access_sync("/nope", None).unwrap_err();
        assert_eq!(err.code(), "ENOENT");
        assert_eq!(err.syscall(), Some("access"));
        assert_eq!(err.path(), Some("/nope"));
        assert!(err.errno().is_some());
    }

    #[test]
    fn only_path_oriented_policies_attach_details() {
        let fs = fs();
        for err in [
            fs.open_sync("/missing", "r", None).unwrap_err(),
            fs.rename_sync("/missing", "/other").unwrap_err(),
            fs.truncate_sync("/missing", None).unwrap_err(),
            fs.realpath_sync("/missing", EncodingOptions::new()).unwrap_err(),
            fs.rm_sync("/missing", RmOptions::new()).unwrap_err(),
        ] {
            assert_eq!(err.code(), "ENOENT");
            assert_eq!(err.path(), None);
            assert_eq!(err.syscall(), None);
        }

        let err = fs.mkdir_sync("/missing/child", MkdirOptions::new()).unwrap_err();
        assert_eq!(err.path(), Some("/missing/child"));
        assert_eq!(err.syscall(), Some("mkdir"));
    }

    #[test]
    fn recursive_mkdir_returns_first_created() {
        let fs = fs();
        fs.mkdir_sync("/a", MkdirOptions::new()).unwrap();
        let first = fs
            .mkdir_sync("/a/b/c", MkdirOptions::new().recursive(true))
            .unwrap();
        assert_eq!(first.as_deref(), Some("/a/b"));
        let again = fs
            .mkdir_sync("/a/b/c", MkdirOptions::new().recursive(true))
            .unwrap();
        assert_eq!(again, None);
        let err = fs.mkdir_sync("/a/b/c", MkdirOptions::new()).unwrap_err();
        assert_eq!(err.code(), "EEXIST");
    }

    #[test]
    fn recursive_mkdir_reports_the_normalized_first_created() {
        let fs = fs();
        fs.mkdir_sync("/a", MkdirOptions::new()).unwrap();
        let first = fs
            .mkdir_sync("/a/../b/./c", MkdirOptions::new().recursive(true))
            .unwrap();
        assert_eq!(first.as_deref(), Some("/b"));
        assert!(fs.exists_sync("/b/c"));
    }

    #[test]
    fn mkdir_under_a_file_is_enotdir() {
        let fs = fs();
        fs.write_file_sync("/file", "", WriteFileOptions::new()).unwrap();
        let err = fs.mkdir_sync("/file/child", MkdirOptions::new()).unwrap_err();
        assert_eq!(err.code(), "ENOTDIR");
    }

    #[test]
    fn read_with_options_object_fills_the_window() {
        let fs = fs();
        fs.write_file_sync("/data", "abcdef", WriteFileOptions::new())
            .unwrap();
        let fd = fs.open_sync("/data", "r", None).unwrap();
        let mut buffer = [0u8; 8];
        let read = fs
            .read_sync(
                fd,
                &mut buffer,
                ReadOptions {
                    offset: Some(2),
                    length: Some(3),
                    position: Some(Position::At(1)),
                },
            )
            .unwrap();
        assert_eq!(read, 3);
        assert_eq!(&buffer, b"\0\0bcd\0\0\0");
        fs.close_sync(fd).unwrap();
    }

    #[test]
    fn readv_scatters_one_read() {
        let fs = fs();
        fs.write_file_sync("/v", "hello world", WriteFileOptions::new())
            .unwrap();
        let fd = fs.open_sync("/v", "r", None).unwrap();
        let mut first = [0u8; 5];
        let mut second = [0u8; 6];
        let read = fs
            .readv_sync(fd, &mut [&mut first[..], &mut second[..]], 0u64)
            .unwrap();
        assert_eq!(read, 11);
        assert_eq!(&first, b"hello");
        assert_eq!(&second, b" world");
        fs.close_sync(fd).unwrap();
    }

    #[test]
    fn file_descriptor_targets_are_left_open() {
        let fs = fs();
        let fd = fs.open_sync("/log", "w+", None).unwrap();
        fs.write_file_sync(fd, "one", WriteFileOptions::new()).unwrap();
        fs.append_file_sync(fd, "two", AppendFileOptions::new()).unwrap();
        assert_eq!(fs.binding().open_descriptors(), 1);
        fs.close_sync(fd).unwrap();
        let text = fs
            .read_file_sync("/log", ReadFileOptions::from(Encoding::Utf8))
            .unwrap();
        assert_eq!(text, "onetwo");
        assert_eq!(fs.binding().open_descriptors(), 0);
    }

    #[test]
    fn realpath_normalizes_plain_paths_and_resolves_links() {
        let fs = fs();
        fs.mkdir_sync("/real", MkdirOptions::new()).unwrap();
        fs.symlink_sync("/real", "/link").unwrap();
        assert_eq!(
            fs.realpath_sync("/real/./", EncodingOptions::new()).unwrap(),
            "/real"
        );
        assert_eq!(fs.realpath_sync("/link", EncodingOptions::new()).unwrap(), "/real");
        let bytes = fs
            .realpath_sync("/link", EncodingOptions::from(Encoding::Buffer))
            .unwrap();
        assert_eq!(bytes.as_bytes(), b"/real");
    }

    #[test]
    fn mkdtemp_appends_six_alphanumerics() {
        let fs = fs();
        let created = fs.mkdtemp_sync("/tmp-", EncodingOptions::new()).unwrap();
        let created = created.into_text().expect("utf8 path");
        let suffix = created.strip_prefix("/tmp-").expect("prefix kept");
        assert_eq!(suffix.len(), 6);
        assert!(suffix.bytes().all(|b| b.is_ascii_alphanumeric()));
        assert!(fs.exists_sync(created.as_str()));
    }

    #[test]
    fn opendir_on_a_file_is_enotdir_and_leaks_nothing() {
        let fs = fs();
        fs.write_file_sync("/plain", "", WriteFileOptions::new()).unwrap();
        let err = fs.opendir_sync("/plain", OpendirOptions::new()).unwrap_err();
        assert_eq!(err.code(), "ENOTDIR");
        assert_eq!(fs.binding().open_descriptors(), 0);
    }

    #[test]
    fn permission_family_is_inert_but_validated() {
        let fs = fs();
        fs.chown_sync("/anything", 0, 0).unwrap();
        fs.chmod_sync("/anything", 0o600).unwrap();
        assert_eq!(
            fs.chmod_sync("/anything", 0o7777).unwrap_err().code(),
            "ERR_OUT_OF_RANGE"
        );
        assert_eq!(fs.fchmod_sync(-1, 0).unwrap_err().code(), "ERR_OUT_OF_RANGE");
    }

    #[test]
    fn watchers_are_unsupported() {
        let fs = fs();
        assert_eq!(
            fs.watch().unwrap_err().code(),
            "ERR_FEATURE_UNAVAILABLE_ON_PLATFORM"
        );
        assert!(fs.watch_file().is_err());
        assert_eq!(fs.unwatch().unwrap_err().to_string(), "'unwatch' is unsupported");
    }
}
