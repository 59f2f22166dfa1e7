//! Native binding contract.
//!
//! The facade never touches the filesystem directly; every primitive goes
//! through an [`FsBinding`]. Two bindings ship with the crate:
//! [`host::HostBinding`] over the operating system and
//! [`memory::MemoryBinding`], a deterministic in-memory tree.

pub mod host;
pub mod memory;

use serde::Serialize;
use thiserror::Error;

/// Descriptor issued by a binding. The facade treats it as an opaque token.
pub type Fd = i32;

/// Native error vocabulary (WASI numbering).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Errno {
    Acces,
    Badf,
    Busy,
    Exist,
    Fbig,
    Inval,
    Io,
    Isdir,
    Loop,
    Nametoolong,
    Noent,
    Nosys,
    Notdir,
    Notempty,
    Notsup,
    Overflow,
    Perm,
    Xdev,
}

impl Errno {
    /// Upper-case name without the leading `E`, as the binding reports it.
    pub fn name(self) -> &'static str {
        match self {
            Errno::Acces => "ACCES",
            Errno::Badf => "BADF",
            Errno::Busy => "BUSY",
            Errno::Exist => "EXIST",
            Errno::Fbig => "FBIG",
            Errno::Inval => "INVAL",
            Errno::Io => "IO",
            Errno::Isdir => "ISDIR",
            Errno::Loop => "LOOP",
            Errno::Nametoolong => "NAMETOOLONG",
            Errno::Noent => "NOENT",
            Errno::Nosys => "NOSYS",
            Errno::Notdir => "NOTDIR",
            Errno::Notempty => "NOTEMPTY",
            Errno::Notsup => "NOTSUP",
            Errno::Overflow => "OVERFLOW",
            Errno::Perm => "PERM",
            Errno::Xdev => "XDEV",
        }
    }

    /// Numeric code in the WASI errno table.
    pub fn raw(self) -> u16 {
        match self {
            Errno::Acces => 2,
            Errno::Badf => 8,
            Errno::Busy => 10,
            Errno::Exist => 20,
            Errno::Fbig => 22,
            Errno::Inval => 28,
            Errno::Io => 29,
            Errno::Isdir => 31,
            Errno::Loop => 32,
            Errno::Nametoolong => 37,
            Errno::Noent => 44,
            Errno::Nosys => 52,
            Errno::Notdir => 54,
            Errno::Notempty => 55,
            Errno::Notsup => 58,
            Errno::Overflow => 61,
            Errno::Perm => 63,
            Errno::Xdev => 75,
        }
    }

    fn default_message(self) -> &'static str {
        match self {
            Errno::Acces => "Permission denied.",
            Errno::Badf => "Bad file descriptor.",
            Errno::Busy => "Device or resource busy.",
            Errno::Exist => "File exists.",
            Errno::Fbig => "File too large.",
            Errno::Inval => "Invalid argument.",
            Errno::Io => "I/O error.",
            Errno::Isdir => "Is a directory.",
            Errno::Loop => "Too many levels of symbolic links.",
            Errno::Nametoolong => "Filename too long.",
            Errno::Noent => "No such file or directory.",
            Errno::Nosys => "Function not supported.",
            Errno::Notdir => "Not a directory or a symbolic link to a directory.",
            Errno::Notempty => "Directory not empty.",
            Errno::Notsup => "Not supported, or operation not supported on socket.",
            Errno::Overflow => "Value too large to be stored in data type.",
            Errno::Perm => "Operation not permitted.",
            Errno::Xdev => "Cross-device link.",
        }
    }
}

/// Failure raised by a binding primitive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RawError {
    pub errno: Errno,
    pub message: String,
}

impl RawError {
    pub fn new(errno: Errno, message: impl Into<String>) -> Self {
        Self {
            errno,
            message: message.into(),
        }
    }
}

impl From<Errno> for RawError {
    fn from(errno: Errno) -> Self {
        Self::new(errno, errno.default_message())
    }
}

pub type RawResult<T> = Result<T, RawError>;

/// Entry classification shared by stat results and directory entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "camelCase")]
#[repr(u8)]
pub enum RawFileType {
    #[default]
    Unknown = 0,
    BlockDevice = 1,
    CharacterDevice = 2,
    Directory = 3,
    RegularFile = 4,
    SocketDgram = 5,
    SocketStream = 6,
    SymbolicLink = 7,
}

impl RawFileType {
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => RawFileType::BlockDevice,
            2 => RawFileType::CharacterDevice,
            3 => RawFileType::Directory,
            4 => RawFileType::RegularFile,
            5 => RawFileType::SocketDgram,
            6 => RawFileType::SocketStream,
            7 => RawFileType::SymbolicLink,
            _ => RawFileType::Unknown,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Type predicates shared by metadata snapshots and directory entries.
///
/// FIFOs cannot be represented by a binding, so `is_fifo` is always false.
pub trait TypePredicates {
    fn file_type(&self) -> RawFileType;

    fn is_file(&self) -> bool {
        self.file_type() == RawFileType::RegularFile
    }

    fn is_directory(&self) -> bool {
        self.file_type() == RawFileType::Directory
    }

    fn is_symbolic_link(&self) -> bool {
        self.file_type() == RawFileType::SymbolicLink
    }

    fn is_block_device(&self) -> bool {
        self.file_type() == RawFileType::BlockDevice
    }

    fn is_character_device(&self) -> bool {
        self.file_type() == RawFileType::CharacterDevice
    }

    fn is_socket(&self) -> bool {
        matches!(
            self.file_type(),
            RawFileType::SocketDgram | RawFileType::SocketStream
        )
    }

    fn is_fifo(&self) -> bool {
        false
    }
}

/// Raw stat result. Every field a binding cannot report is `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawStat {
    pub dev: Option<u64>,
    pub ino: Option<u64>,
    pub mode: Option<u32>,
    pub nlink: Option<u64>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub rdev: Option<u64>,
    pub size: Option<u64>,
    pub blksize: Option<u64>,
    pub blocks: Option<u64>,
    /// Milliseconds since the Unix epoch.
    pub atime_ms: Option<i64>,
    pub mtime_ms: Option<i64>,
    pub birthtime_ms: Option<i64>,
    pub file_type: RawFileType,
}

impl TypePredicates for RawStat {
    fn file_type(&self) -> RawFileType {
        self.file_type
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDirent {
    pub name: String,
    pub file_type: RawFileType,
}

impl RawDirent {
    pub fn new(name: impl Into<String>, file_type: RawFileType) -> Self {
        Self {
            name: name.into(),
            file_type,
        }
    }
}

/// Continuation token for paged directory reads. Only the binding that issued
/// it may interpret the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DirCookie(pub u64);

impl DirCookie {
    pub const START: DirCookie = DirCookie(0);
}

/// One page of a paged directory read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaddirPage {
    pub entries: Vec<RawDirent>,
    pub cookie: DirCookie,
    pub finished: bool,
}

/// Where a descriptor read or write happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Position {
    /// The descriptor's implicit cursor, which advances.
    #[default]
    Current,
    /// An absolute offset; the cursor is left untouched.
    At(u64),
}

impl From<u64> for Position {
    fn from(offset: u64) -> Self {
        Position::At(offset)
    }
}

impl From<Option<u64>> for Position {
    fn from(offset: Option<u64>) -> Self {
        offset.map_or(Position::Current, Position::At)
    }
}

/// Raw synchronous primitives consumed by the facade.
///
/// Times passed to `utime`/`futime` are milliseconds since the Unix epoch.
/// `open` receives the binding flag bits from [`crate::constants`].
pub trait FsBinding: Send + Sync + 'static {
    fn stat(&self, path: &str) -> RawResult<RawStat>;
    fn lstat(&self, path: &str) -> RawResult<RawStat>;
    fn fstat(&self, fd: Fd) -> RawResult<RawStat>;
    fn mkdir(&self, path: &str, recursive: bool, mode: u32) -> RawResult<()>;
    fn rmdir(&self, path: &str, recursive: bool) -> RawResult<()>;
    fn rm(&self, path: &str, recursive: bool, force: bool) -> RawResult<()>;
    fn rename(&self, from: &str, to: &str) -> RawResult<()>;
    fn truncate(&self, path: &str, len: u64) -> RawResult<()>;
    fn ftruncate(&self, fd: Fd, len: u64) -> RawResult<()>;
    fn realpath(&self, path: &str) -> RawResult<String>;
    fn copy_file(&self, src: &str, dst: &str) -> RawResult<()>;
    fn link(&self, existing: &str, new_path: &str) -> RawResult<()>;
    fn symlink(&self, target: &str, path: &str) -> RawResult<()>;
    fn open(&self, path: &str, flags: u32, mode: u32) -> RawResult<Fd>;
    fn close(&self, fd: Fd) -> RawResult<()>;
    fn fsync(&self, fd: Fd) -> RawResult<()>;
    fn fdatasync(&self, fd: Fd) -> RawResult<()>;
    fn read(&self, fd: Fd, position: Position, length: usize) -> RawResult<Vec<u8>>;
    fn write(&self, fd: Fd, position: Position, bytes: &[u8]) -> RawResult<usize>;
    fn readlink(&self, path: &str) -> RawResult<String>;
    fn readdir(&self, fd: Fd, cookie: DirCookie) -> RawResult<ReaddirPage>;
    fn utime(&self, path: &str, atime_ms: f64, mtime_ms: f64) -> RawResult<()>;
    fn futime(&self, fd: Fd, atime_ms: f64, mtime_ms: f64) -> RawResult<()>;
}

impl<B: FsBinding + ?Sized> FsBinding for std::sync::Arc<B> {
    fn stat(&self, path: &str) -> RawResult<RawStat> {
        (**self).stat(path)
    }
    fn lstat(&self, path: &str) -> RawResult<RawStat> {
        (**self).lstat(path)
    }
    fn fstat(&self, fd: Fd) -> RawResult<RawStat> {
        (**self).fstat(fd)
    }
    fn mkdir(&self, path: &str, recursive: bool, mode: u32) -> RawResult<()> {
        (**self).mkdir(path, recursive, mode)
    }
    fn rmdir(&self, path: &str, recursive: bool) -> RawResult<()> {
        (**self).rmdir(path, recursive)
    }
    fn rm(&self, path: &str, recursive: bool, force: bool) -> RawResult<()> {
        (**self).rm(path, recursive, force)
    }
    fn rename(&self, from: &str, to: &str) -> RawResult<()> {
        (**self).rename(from, to)
    }
    fn truncate(&self, path: &str, len: u64) -> RawResult<()> {
        (**self).truncate(path, len)
    }
    fn ftruncate(&self, fd: Fd, len: u64) -> RawResult<()> {
        (**self).ftruncate(fd, len)
    }
    fn realpath(&self, path: &str) -> RawResult<String> {
        (**self).realpath(path)
    }
    fn copy_file(&self, src: &str, dst: &str) -> RawResult<()> {
        (**self).copy_file(src, dst)
    }
    fn link(&self, existing: &str, new_path: &str) -> RawResult<()> {
        (**self).link(existing, new_path)
    }
    fn symlink(&self, target: &str, path: &str) -> RawResult<()> {
        (**self).symlink(target, path)
    }
    fn open(&self, path: &str, flags: u32, mode: u32) -> RawResult<Fd> {
        (**self).open(path, flags, mode)
    }
    fn close(&self, fd: Fd) -> RawResult<()> {
        (**self).close(fd)
    }
    fn fsync(&self, fd: Fd) -> RawResult<()> {
        (**self).fsync(fd)
    }
    fn fdatasync(&self, fd: Fd) -> RawResult<()> {
        (**self).fdatasync(fd)
    }
    fn read(&self, fd: Fd, position: Position, length: usize) -> RawResult<Vec<u8>> {
        (**self).read(fd, position, length)
    }
    fn write(&self, fd: Fd, position: Position, bytes: &[u8]) -> RawResult<usize> {
        (**self).write(fd, position, bytes)
    }
    fn readlink(&self, path: &str) -> RawResult<String> {
        (**self).readlink(path)
    }
    fn readdir(&self, fd: Fd, cookie: DirCookie) -> RawResult<ReaddirPage> {
        (**self).readdir(fd, cookie)
    }
    fn utime(&self, path: &str, atime_ms: f64, mtime_ms: f64) -> RawResult<()> {
        (**self).utime(path, atime_ms, mtime_ms)
    }
    fn futime(&self, fd: Fd, atime_ms: f64, mtime_ms: f64) -> RawResult<()> {
        (**self).futime(fd, atime_ms, mtime_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_type_codes_round_trip_through_the_closed_set() {
        for code in 0..=7u8 {
            assert_eq!(RawFileType::from_code(code).code(), code);
        }
        assert_eq!(RawFileType::from_code(42), RawFileType::Unknown);
    }

    #[test]
    fn both_socket_kinds_are_sockets() {
        let dgram = RawStat {
            file_type: RawFileType::SocketDgram,
            ..RawStat::default()
        };
        let stream = RawStat {
            file_type: RawFileType::SocketStream,
            ..RawStat::default()
        };
        assert!(dgram.is_socket());
        assert!(stream.is_socket());
        assert!(!stream.is_fifo());
    }

    #[test]
    fn errno_default_message_matches_binding_text() {
        let err = RawError::from(Errno::Exist);
        assert_eq!(err.message, "File exists.");
        assert_eq!(err.errno.raw(), 20);
    }
}
