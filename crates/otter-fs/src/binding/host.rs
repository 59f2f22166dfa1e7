//! Binding over the host operating system.

use std::collections::HashMap;
use std::fs::{self, File, Metadata};
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use filetime::FileTime;
use parking_lot::Mutex;
use tracing::debug;

use super::{
    DirCookie, Errno, Fd, FsBinding, Position, RawDirent, RawError, RawFileType, RawResult,
    RawStat, ReaddirPage,
};
use crate::config::FsConfig;
use crate::constants::{O_ACCMODE, O_APPEND, O_CREAT, O_EXCL, O_RDONLY, O_RDWR, O_TRUNC};

enum Descriptor {
    File {
        file: File,
    },
    Directory {
        path: String,
        /// Listing taken when paging starts; cookies index into it.
        snapshot: Option<Vec<RawDirent>>,
    },
}

/// Real filesystem binding with a process-local descriptor table.
pub struct HostBinding {
    descriptors: Mutex<HashMap<Fd, Descriptor>>,
    next_fd: AtomicI32,
    page_size: usize,
}

impl Default for HostBinding {
    fn default() -> Self {
        Self::new()
    }
}

impl HostBinding {
    pub fn new() -> Self {
        Self::with_config(&FsConfig::default())
    }

    pub fn with_config(config: &FsConfig) -> Self {
        Self {
            descriptors: Mutex::new(HashMap::new()),
            next_fd: AtomicI32::new(3),
            page_size: config.readdir_page_size.max(1),
        }
    }

    /// Number of descriptors currently open through this binding.
    pub fn open_descriptors(&self) -> usize {
        self.descriptors.lock().len()
    }

    fn store(&self, descriptor: Descriptor) -> Fd {
        let fd = self.next_fd.fetch_add(1, Ordering::Relaxed);
        self.descriptors.lock().insert(fd, descriptor);
        fd
    }

    fn with_file<T>(&self, fd: Fd, f: impl FnOnce(&mut File) -> io::Result<T>) -> RawResult<T> {
        let mut table = self.descriptors.lock();
        match table.get_mut(&fd) {
            Some(Descriptor::File { file }) => f(file).map_err(raw_from_io),
            Some(Descriptor::Directory { .. }) => Err(Errno::Isdir.into()),
            None => Err(Errno::Badf.into()),
        }
    }
}

impl FsBinding for HostBinding {
    fn stat(&self, path: &str) -> RawResult<RawStat> {
        fs::metadata(path).map(|m| raw_stat(&m)).map_err(raw_from_io)
    }

    fn lstat(&self, path: &str) -> RawResult<RawStat> {
        fs::symlink_metadata(path)
            .map(|m| raw_stat(&m))
            .map_err(raw_from_io)
    }

    fn fstat(&self, fd: Fd) -> RawResult<RawStat> {
        let table = self.descriptors.lock();
        let metadata = match table.get(&fd) {
            Some(Descriptor::File { file }) => file.metadata(),
            Some(Descriptor::Directory { path, .. }) => fs::metadata(path),
            None => return Err(Errno::Badf.into()),
        };
        metadata.map(|m| raw_stat(&m)).map_err(raw_from_io)
    }

    fn mkdir(&self, path: &str, recursive: bool, mode: u32) -> RawResult<()> {
        let mut builder = fs::DirBuilder::new();
        builder.recursive(recursive);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(mode);
        }
        #[cfg(not(unix))]
        let _ = mode;
        builder.create(path).map_err(raw_from_io)
    }

    fn rmdir(&self, path: &str, recursive: bool) -> RawResult<()> {
        let removed = if recursive {
            fs::remove_dir_all(path)
        } else {
            fs::remove_dir(path)
        };
        removed.map_err(raw_from_io)
    }

    fn rm(&self, path: &str, recursive: bool, force: bool) -> RawResult<()> {
        let metadata = match fs::symlink_metadata(path) {
            Ok(metadata) => metadata,
            Err(err) if force && err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(raw_from_io(err)),
        };
        if metadata.is_dir() {
            if !recursive {
                return Err(RawError::new(
                    Errno::Isdir,
                    format!("Path is a directory: rm returned EISDIR (is a directory) {path}"),
                ));
            }
            fs::remove_dir_all(path).map_err(raw_from_io)
        } else {
            fs::remove_file(path).map_err(raw_from_io)
        }
    }

    fn rename(&self, from: &str, to: &str) -> RawResult<()> {
        fs::rename(from, to).map_err(raw_from_io)
    }

    fn truncate(&self, path: &str, len: u64) -> RawResult<()> {
        fs::OpenOptions::new()
            .write(true)
            .open(path)
            .and_then(|file| file.set_len(len))
            .map_err(raw_from_io)
    }

    fn ftruncate(&self, fd: Fd, len: u64) -> RawResult<()> {
        self.with_file(fd, |file| file.set_len(len))
    }

    fn realpath(&self, path: &str) -> RawResult<String> {
        dunce::canonicalize(path)
            .map(|resolved| resolved.to_string_lossy().into_owned())
            .map_err(raw_from_io)
    }

    fn copy_file(&self, src: &str, dst: &str) -> RawResult<()> {
        fs::copy(src, dst).map(|_| ()).map_err(raw_from_io)
    }

    fn link(&self, existing: &str, new_path: &str) -> RawResult<()> {
        fs::hard_link(existing, new_path).map_err(raw_from_io)
    }

    fn symlink(&self, target: &str, path: &str) -> RawResult<()> {
        create_symlink(Path::new(target), Path::new(path)).map_err(raw_from_io)
    }

    fn open(&self, path: &str, flags: u32, mode: u32) -> RawResult<Fd> {
        let access = flags & O_ACCMODE;
        if access == O_RDONLY && flags & O_CREAT == 0 {
            if let Ok(metadata) = fs::metadata(path) {
                if metadata.is_dir() {
                    let fd = self.store(Descriptor::Directory {
                        path: path.to_string(),
                        snapshot: None,
                    });
                    debug!(fd, path, "opened directory descriptor");
                    return Ok(fd);
                }
            }
        }

        let mut options = fs::OpenOptions::new();
        options
            .read(access == O_RDONLY || access == O_RDWR)
            .write(access != O_RDONLY)
            .append(flags & O_APPEND != 0)
            .truncate(flags & O_TRUNC != 0)
            .create(flags & O_CREAT != 0 && flags & O_EXCL == 0)
            .create_new(flags & O_CREAT != 0 && flags & O_EXCL != 0);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(mode);
        }
        #[cfg(not(unix))]
        let _ = mode;

        let file = options.open(path).map_err(raw_from_io)?;
        let fd = self.store(Descriptor::File { file });
        debug!(fd, path, flags, "opened file descriptor");
        Ok(fd)
    }

    fn close(&self, fd: Fd) -> RawResult<()> {
        match self.descriptors.lock().remove(&fd) {
            Some(_) => {
                debug!(fd, "closed descriptor");
                Ok(())
            }
            None => Err(Errno::Badf.into()),
        }
    }

    fn fsync(&self, fd: Fd) -> RawResult<()> {
        match self.with_file(fd, |file| file.sync_all()) {
            Err(err) if err.errno == Errno::Isdir => Ok(()),
            other => other,
        }
    }

    fn fdatasync(&self, fd: Fd) -> RawResult<()> {
        match self.with_file(fd, |file| file.sync_data()) {
            Err(err) if err.errno == Errno::Isdir => Ok(()),
            other => other,
        }
    }

    fn read(&self, fd: Fd, position: Position, length: usize) -> RawResult<Vec<u8>> {
        self.with_file(fd, |file| match position {
            Position::Current => read_current(file, length),
            Position::At(offset) => read_at(file, offset, length),
        })
    }

    fn write(&self, fd: Fd, position: Position, bytes: &[u8]) -> RawResult<usize> {
        self.with_file(fd, |file| {
            match position {
                Position::Current => file.write_all(bytes)?,
                Position::At(offset) => write_at(file, offset, bytes)?,
            }
            Ok(bytes.len())
        })
    }

    fn readlink(&self, path: &str) -> RawResult<String> {
        fs::read_link(path)
            .map(|target| target.to_string_lossy().into_owned())
            .map_err(raw_from_io)
    }

    fn readdir(&self, fd: Fd, cookie: DirCookie) -> RawResult<ReaddirPage> {
        let mut table = self.descriptors.lock();
        let (path, snapshot) = match table.get_mut(&fd) {
            Some(Descriptor::Directory { path, snapshot }) => (path, snapshot),
            Some(Descriptor::File { .. }) => return Err(Errno::Notdir.into()),
            None => return Err(Errno::Badf.into()),
        };
        if cookie == DirCookie::START || snapshot.is_none() {
            *snapshot = Some(list_directory(path).map_err(raw_from_io)?);
        }
        let listing = snapshot.as_deref().unwrap_or_default();

        let start = (cookie.0 as usize).min(listing.len());
        let end = start.saturating_add(self.page_size).min(listing.len());
        let page = ReaddirPage {
            entries: listing[start..end].to_vec(),
            cookie: DirCookie(end as u64),
            finished: end >= listing.len(),
        };
        debug!(
            fd,
            count = page.entries.len(),
            finished = page.finished,
            "readdir page"
        );
        Ok(page)
    }

    fn utime(&self, path: &str, atime_ms: f64, mtime_ms: f64) -> RawResult<()> {
        filetime::set_file_times(path, file_time(atime_ms), file_time(mtime_ms))
            .map_err(raw_from_io)
    }

    fn futime(&self, fd: Fd, atime_ms: f64, mtime_ms: f64) -> RawResult<()> {
        let table = self.descriptors.lock();
        let (atime, mtime) = (file_time(atime_ms), file_time(mtime_ms));
        let updated = match table.get(&fd) {
            Some(Descriptor::File { file }) => {
                filetime::set_file_handle_times(file, Some(atime), Some(mtime))
            }
            Some(Descriptor::Directory { path, .. }) => filetime::set_file_times(path, atime, mtime),
            None => return Err(Errno::Badf.into()),
        };
        updated.map_err(raw_from_io)
    }
}

fn list_directory(path: &str) -> io::Result<Vec<RawDirent>> {
    let mut entries = vec![
        RawDirent::new(".", RawFileType::Directory),
        RawDirent::new("..", RawFileType::Directory),
    ];
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let file_type = entry
            .file_type()
            .map(|ft| classify(&ft))
            .unwrap_or(RawFileType::Unknown);
        entries.push(RawDirent::new(
            entry.file_name().to_string_lossy().into_owned(),
            file_type,
        ));
    }
    Ok(entries)
}

fn read_current(file: &mut File, length: usize) -> io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(length);
    file.take(length as u64).read_to_end(&mut buf)?;
    Ok(buf)
}

#[cfg(unix)]
fn read_at(file: &mut File, offset: u64, length: usize) -> io::Result<Vec<u8>> {
    use std::os::unix::fs::FileExt;

    let mut buf = vec![0u8; length];
    let mut filled = 0;
    while filled < length {
        let n = file.read_at(&mut buf[filled..], offset + filled as u64)?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);
    Ok(buf)
}

#[cfg(not(unix))]
fn read_at(file: &mut File, offset: u64, length: usize) -> io::Result<Vec<u8>> {
    use std::io::{Seek, SeekFrom};

    let saved = file.stream_position()?;
    file.seek(SeekFrom::Start(offset))?;
    let result = read_current(file, length);
    file.seek(SeekFrom::Start(saved))?;
    result
}

#[cfg(unix)]
fn write_at(file: &mut File, offset: u64, bytes: &[u8]) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(bytes, offset)
}

#[cfg(not(unix))]
fn write_at(file: &mut File, offset: u64, bytes: &[u8]) -> io::Result<()> {
    use std::io::{Seek, SeekFrom};

    let saved = file.stream_position()?;
    file.seek(SeekFrom::Start(offset))?;
    let result = file.write_all(bytes);
    file.seek(SeekFrom::Start(saved))?;
    result
}

#[cfg(unix)]
fn create_symlink(target: &Path, path: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, path)
}

#[cfg(windows)]
fn create_symlink(target: &Path, path: &Path) -> io::Result<()> {
    use std::os::windows::fs::{symlink_dir, symlink_file};

    let resolved = path.parent().map(|p| p.join(target)).unwrap_or_else(|| target.into());
    if fs::metadata(resolved).map(|m| m.is_dir()).unwrap_or(false) {
        symlink_dir(target, path)
    } else {
        symlink_file(target, path)
    }
}

#[cfg(not(any(unix, windows)))]
fn create_symlink(_target: &Path, _path: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symlinks are not supported on this platform",
    ))
}

fn file_time(ms: f64) -> FileTime {
    let secs = (ms / 1000.0).floor();
    let nanos = ((ms - secs * 1000.0) * 1_000_000.0).round() as u32;
    FileTime::from_unix_time(secs as i64, nanos.min(999_999_999))
}

fn time_ms(time: io::Result<SystemTime>) -> Option<i64> {
    let time = time.ok()?;
    Some(match time.duration_since(UNIX_EPOCH) {
        Ok(after) => after.as_millis() as i64,
        Err(before) => -(before.duration().as_millis() as i64),
    })
}

fn classify(file_type: &fs::FileType) -> RawFileType {
    if file_type.is_symlink() {
        return RawFileType::SymbolicLink;
    }
    if file_type.is_dir() {
        return RawFileType::Directory;
    }
    if file_type.is_file() {
        return RawFileType::RegularFile;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::FileTypeExt;
        if file_type.is_block_device() {
            return RawFileType::BlockDevice;
        }
        if file_type.is_char_device() {
            return RawFileType::CharacterDevice;
        }
        if file_type.is_socket() {
            return RawFileType::SocketStream;
        }
    }
    RawFileType::Unknown
}

fn raw_stat(metadata: &Metadata) -> RawStat {
    let mut raw = RawStat {
        size: Some(metadata.len()),
        atime_ms: time_ms(metadata.accessed()),
        mtime_ms: time_ms(metadata.modified()),
        birthtime_ms: time_ms(metadata.created()),
        file_type: classify(&metadata.file_type()),
        ..RawStat::default()
    };
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        raw.dev = Some(metadata.dev());
        raw.ino = Some(metadata.ino());
        raw.mode = Some(metadata.mode());
        raw.nlink = Some(metadata.nlink());
        raw.uid = Some(metadata.uid());
        raw.gid = Some(metadata.gid());
        raw.rdev = Some(metadata.rdev());
        raw.blksize = Some(metadata.blksize());
        raw.blocks = Some(metadata.blocks());
    }
    #[cfg(not(unix))]
    {
        let readonly = metadata.permissions().readonly();
        let bits = if readonly { 0o555 } else { 0o777 };
        let kind = if metadata.is_dir() {
            crate::constants::S_IFDIR
        } else {
            crate::constants::S_IFREG
        };
        raw.mode = Some(kind | bits);
    }
    raw
}

pub(crate) fn raw_from_io(err: io::Error) -> RawError {
    RawError::new(errno_of(&err), err.to_string())
}

#[cfg(unix)]
fn errno_of(err: &io::Error) -> Errno {
    match err.raw_os_error() {
        Some(libc::EACCES) => Errno::Acces,
        Some(libc::EBADF) => Errno::Badf,
        Some(libc::EBUSY) => Errno::Busy,
        Some(libc::EEXIST) => Errno::Exist,
        Some(libc::EFBIG) => Errno::Fbig,
        Some(libc::EINVAL) => Errno::Inval,
        Some(libc::EISDIR) => Errno::Isdir,
        Some(libc::ELOOP) => Errno::Loop,
        Some(libc::ENAMETOOLONG) => Errno::Nametoolong,
        Some(libc::ENOENT) => Errno::Noent,
        Some(libc::ENOSYS) => Errno::Nosys,
        Some(libc::ENOTDIR) => Errno::Notdir,
        Some(libc::ENOTEMPTY) => Errno::Notempty,
        Some(libc::ENOTSUP) => Errno::Notsup,
        Some(libc::EOVERFLOW) => Errno::Overflow,
        Some(libc::EPERM) => Errno::Perm,
        Some(libc::EXDEV) => Errno::Xdev,
        _ => errno_from_kind(err.kind()),
    }
}

#[cfg(not(unix))]
fn errno_of(err: &io::Error) -> Errno {
    errno_from_kind(err.kind())
}

fn errno_from_kind(kind: io::ErrorKind) -> Errno {
    match kind {
        io::ErrorKind::NotFound => Errno::Noent,
        io::ErrorKind::PermissionDenied => Errno::Acces,
        io::ErrorKind::AlreadyExists => Errno::Exist,
        io::ErrorKind::IsADirectory => Errno::Isdir,
        io::ErrorKind::NotADirectory => Errno::Notdir,
        io::ErrorKind::DirectoryNotEmpty => Errno::Notempty,
        io::ErrorKind::InvalidInput => Errno::Inval,
        io::ErrorKind::Unsupported => Errno::Notsup,
        _ => Errno::Io,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{O_CREAT, O_WRONLY};
    use tempfile::tempdir;

    #[test]
    fn positional_reads_do_not_move_the_cursor() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("data.bin");
        fs::write(&path, b"0123456789").expect("seed");
        let binding = HostBinding::new();

        let fd = binding.open(path.to_str().unwrap(), O_RDONLY, 0o666).expect("open");
        assert_eq!(binding.read(fd, Position::At(5), 3).unwrap(), b"567");
        assert_eq!(binding.read(fd, Position::Current, 4).unwrap(), b"0123");
        assert_eq!(binding.read(fd, Position::Current, 4).unwrap(), b"4567");
        binding.close(fd).expect("close");
        assert_eq!(binding.open_descriptors(), 0);
    }

    #[test]
    fn directory_pages_follow_the_cookie() {
        let dir = tempdir().expect("tempdir");
        for name in ["a", "b", "c", "d", "e"] {
            fs::write(dir.path().join(name), name).expect("seed");
        }
        let binding = HostBinding::with_config(&FsConfig::new().readdir_page_size(2));
        let fd = binding
            .open(dir.path().to_str().unwrap(), O_RDONLY, 0)
            .expect("open dir");

        let mut cookie = DirCookie::START;
        let mut names = Vec::new();
        loop {
            let page = binding.readdir(fd, cookie).expect("page");
            assert!(page.entries.len() <= 2);
            names.extend(page.entries.into_iter().map(|e| e.name));
            cookie = page.cookie;
            if page.finished {
                break;
            }
        }
        names.sort();
        assert_eq!(names, vec![".", "..", "a", "b", "c", "d", "e"]);
        binding.close(fd).expect("close");
    }

    #[test]
    fn exclusive_create_reports_exist() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("once");
        let path = path.to_str().unwrap();
        let binding = HostBinding::new();
        let flags = O_CREAT | O_WRONLY | O_EXCL;

        let fd = binding.open(path, flags, 0o644).expect("first open");
        let err = binding.open(path, flags, 0o644).unwrap_err();
        assert_eq!(err.errno, Errno::Exist);
        binding.close(fd).expect("close");
    }

    #[test]
    fn closing_unknown_descriptor_is_badf() {
        assert_eq!(HostBinding::new().close(99).unwrap_err().errno, Errno::Badf);
    }

    #[test]
    fn rm_force_ignores_missing_and_refuses_plain_directories() {
        let dir = tempdir().expect("tempdir");
        let binding = HostBinding::new();
        let missing = dir.path().join("missing");
        binding
            .rm(missing.to_str().unwrap(), false, true)
            .expect("forced rm of missing path");

        let sub = dir.path().join("sub");
        fs::create_dir(&sub).expect("mkdir");
        let err = binding.rm(sub.to_str().unwrap(), false, false).unwrap_err();
        assert_eq!(err.errno, Errno::Isdir);
        binding.rm(sub.to_str().unwrap(), true, false).expect("recursive rm");
        assert!(!sub.exists());
    }
}
