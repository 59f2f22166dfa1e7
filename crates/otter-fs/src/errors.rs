//! Error types and the native-to-Node error translation.

use std::fmt;

use thiserror::Error;

use crate::binding::{Errno, RawError};

pub const UV_EACCES: i32 = -13;
pub const UV_EEXIST: i32 = -17;
pub const UV_ENOENT: i32 = -2;
pub const UV_ENOTDIR: i32 = -20;
pub const UV_EOVERFLOW: i32 = -75;

/// Stable code carried by a translated native failure.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Enoent,
    Eexist,
    Eacces,
    Enotdir,
    Eoverflow,
    /// Any other native code, forwarded as `E` + the binding's name.
    Native(String),
}

impl ErrorCode {
    pub fn as_str(&self) -> &str {
        match self {
            ErrorCode::Enoent => "ENOENT",
            ErrorCode::Eexist => "EEXIST",
            ErrorCode::Eacces => "EACCES",
            ErrorCode::Enotdir => "ENOTDIR",
            ErrorCode::Eoverflow => "EOVERFLOW",
            ErrorCode::Native(code) => code,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A native failure after translation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SystemError {
    code: ErrorCode,
    message: String,
    path: Option<String>,
    dest: Option<String>,
    syscall: Option<&'static str>,
    errno: Option<i32>,
}

impl SystemError {
    fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            path: None,
            dest: None,
            syscall: None,
            errno: None,
        }
    }

    fn at(mut self, syscall: &'static str, path: &str, errno: i32) -> Self {
        self.syscall = Some(syscall);
        self.path = Some(path.to_string());
        self.errno = Some(errno);
        self
    }

    pub fn code(&self) -> &ErrorCode {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn dest(&self) -> Option<&str> {
        self.dest.as_deref()
    }

    pub fn syscall(&self) -> Option<&'static str> {
        self.syscall
    }

    pub fn errno(&self) -> Option<i32> {
        self.errno
    }
}

/// Every error surfaced by the facade.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FsError {
    #[error(transparent)]
    System(#[from] SystemError),

    #[error("The \"{name}\" argument must be {expected}. Received {actual}")]
    InvalidArgType {
        name: &'static str,
        expected: &'static str,
        actual: String,
    },

    #[error("The argument '{name}' {reason}. Received {actual}")]
    InvalidArgValue {
        name: &'static str,
        reason: &'static str,
        actual: String,
    },

    #[error("The value of \"{name}\" is out of range. It must be {range}. Received {actual}")]
    OutOfRange {
        name: &'static str,
        range: String,
        actual: String,
    },

    #[error("option \"{first}\" cannot be used in combination with option \"{second}\"")]
    IncompatibleOptionPair {
        first: &'static str,
        second: &'static str,
    },

    #[error("'{api}' is unsupported")]
    Unsupported { api: &'static str },

    #[error("internal error: {0}")]
    Internal(String),
}

impl FsError {
    /// Stable code for programmatic branching.
    pub fn code(&self) -> &str {
        match self {
            FsError::System(err) => err.code.as_str(),
            FsError::InvalidArgType { .. } => "ERR_INVALID_ARG_TYPE",
            FsError::InvalidArgValue { .. } => "ERR_INVALID_ARG_VALUE",
            FsError::OutOfRange { .. } => "ERR_OUT_OF_RANGE",
            FsError::IncompatibleOptionPair { .. } => "ERR_INCOMPATIBLE_OPTION_PAIR",
            FsError::Unsupported { .. } => "ERR_FEATURE_UNAVAILABLE_ON_PLATFORM",
            FsError::Internal(_) => "ERR_INTERNAL_ASSERTION",
        }
    }

    /// Node error class name.
    pub fn name(&self) -> &'static str {
        match self {
            FsError::InvalidArgType { .. }
            | FsError::InvalidArgValue { .. }
            | FsError::IncompatibleOptionPair { .. } => "TypeError",
            FsError::OutOfRange { .. } => "RangeError",
            _ => "Error",
        }
    }

    pub fn as_system(&self) -> Option<&SystemError> {
        match self {
            FsError::System(err) => Some(err),
            _ => None,
        }
    }

    pub fn path(&self) -> Option<&str> {
        self.as_system().and_then(SystemError::path)
    }

    pub fn syscall(&self) -> Option<&'static str> {
        self.as_system().and_then(SystemError::syscall)
    }

    pub fn errno(&self) -> Option<i32> {
        self.as_system().and_then(SystemError::errno)
    }

    pub(crate) fn invalid_type(
        name: &'static str,
        expected: &'static str,
        actual: impl fmt::Debug,
    ) -> Self {
        FsError::InvalidArgType {
            name,
            expected,
            actual: format!("{actual:?}"),
        }
    }

    pub(crate) fn invalid_value(
        name: &'static str,
        reason: &'static str,
        actual: impl fmt::Debug,
    ) -> Self {
        FsError::InvalidArgValue {
            name,
            reason,
            actual: format!("{actual:?}"),
        }
    }

    pub(crate) fn out_of_range(
        name: &'static str,
        range: impl Into<String>,
        actual: impl fmt::Display,
    ) -> Self {
        FsError::OutOfRange {
            name,
            range: range.into(),
            actual: actual.to_string(),
        }
    }
}

pub type FsResult<T> = Result<T, FsError>;

// Translation. Each helper corresponds to a call-site policy.

/// Forward the native message, prefixing the native name with `E`.
pub(crate) fn passthrough(err: RawError) -> FsError {
    let code = ErrorCode::Native(format!("E{}", err.errno.name()));
    SystemError::new(code, err.message).into()
}

fn bare(code: ErrorCode, message: &'static str) -> FsError {
    SystemError::new(code, message).into()
}

pub(crate) fn enoent(syscall: &'static str, path: &str) -> FsError {
    SystemError::new(
        ErrorCode::Enoent,
        format!("ENOENT: no such file or directory, {syscall} '{path}'"),
    )
    .at(syscall, path, UV_ENOENT)
    .into()
}

pub(crate) fn eexist(syscall: &'static str, path: &str) -> FsError {
    SystemError::new(
        ErrorCode::Eexist,
        format!("EEXIST: file already exists, {syscall} '{path}'"),
    )
    .at(syscall, path, UV_EEXIST)
    .into()
}

/// Permission check failure inside `access`. Never escapes the facade.
pub(crate) fn eacces(syscall: &'static str, path: &str) -> FsError {
    SystemError::new(
        ErrorCode::Eacces,
        format!("EACCES: permission denied, {syscall} '{path}'"),
    )
    .at(syscall, path, UV_EACCES)
    .into()
}

/// Missing targets become a bare ENOENT; the rest pass through. Only the
/// `access`, `mkdir` and `copyFile` policies attach path details.
pub(crate) fn for_lookup(err: RawError) -> FsError {
    match err.errno {
        Errno::Noent => bare(ErrorCode::Enoent, "ENOENT: no such file or directory"),
        _ => passthrough(err),
    }
}

/// `access` reports every failure as ENOENT.
pub(crate) fn for_access(_err: FsError, path: &str) -> FsError {
    enoent("access", path)
}

pub(crate) fn for_mkdir(err: RawError, path: &str) -> FsError {
    match err.errno {
        Errno::Exist => eexist("mkdir", path),
        Errno::Notdir => SystemError::new(
            ErrorCode::Enotdir,
            format!("ENOTDIR: not a directory, mkdir '{path}'"),
        )
        .at("mkdir", path, UV_ENOTDIR)
        .into(),
        Errno::Noent => enoent("mkdir", path),
        _ => passthrough(err),
    }
}

pub(crate) fn copyfile_exists(src: &str, dest: &str) -> FsError {
    let mut err = SystemError::new(
        ErrorCode::Eexist,
        format!("EEXIST: file already exists, copyfile '{src}' -> '{dest}'"),
    )
    .at("copyfile", src, UV_EEXIST);
    err.dest = Some(dest.to_string());
    err.into()
}

/// `cp` failures carry Node's `ERR_FS_*` codes.
pub(crate) fn cp_failure(code: &'static str, message: String, path: &str) -> FsError {
    let mut err = SystemError::new(ErrorCode::Native(code.to_string()), message);
    err.syscall = Some("cp");
    err.path = Some(path.to_string());
    err.into()
}

/// An invalid-argument failure during a read means the request overflowed.
pub(crate) fn for_read(err: RawError) -> FsError {
    match err.errno {
        Errno::Inval => {
            let mut err = SystemError::new(
                ErrorCode::Eoverflow,
                "EOVERFLOW: value too large for defined data type, read",
            );
            err.syscall = Some("read");
            err.errno = Some(UV_EOVERFLOW);
            err.into()
        }
        _ => passthrough(err),
    }
}

/// `open` keeps EEXIST for exclusive creation and reports anything else as ENOENT.
pub(crate) fn for_open(err: RawError) -> FsError {
    match err.errno {
        Errno::Exist => bare(ErrorCode::Eexist, "EEXIST: file already exists"),
        _ => bare(ErrorCode::Enoent, "ENOENT: no such file or directory"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_prefixes_native_name() {
        let err = passthrough(RawError::new(Errno::Notempty, "Directory not empty."));
        assert_eq!(err.code(), "ENOTEMPTY");
        assert_eq!(err.to_string(), "Directory not empty.");
        assert_eq!(err.path(), None);
    }

    #[test]
    fn mkdir_translation_attaches_path_and_syscall() {
        let err = for_mkdir(RawError::from(Errno::Exist), "a/b");
        assert_eq!(err.code(), "EEXIST");
        assert_eq!(err.syscall(), Some("mkdir"));
        assert_eq!(err.path(), Some("a/b"));
        assert_eq!(err.errno(), Some(UV_EEXIST));
        assert_eq!(err.to_string(), "EEXIST: file already exists, mkdir 'a/b'");

        let err = for_mkdir(RawError::from(Errno::Notdir), "file/child");
        assert_eq!(err.code(), "ENOTDIR");
    }

    #[test]
    fn access_collapses_to_enoent() {
        let denied = eacces("access", "/etc/shadow");
        let err = for_access(denied, "/etc/shadow");
        assert_eq!(err.code(), "ENOENT");
        assert_eq!(err.errno(), Some(UV_ENOENT));
        assert_eq!(
            err.to_string(),
            "ENOENT: no such file or directory, access '/etc/shadow'"
        );
    }

    #[test]
    fn read_inval_becomes_overflow() {
        let err = for_read(RawError::from(Errno::Inval));
        assert_eq!(err.code(), "EOVERFLOW");
        let err = for_read(RawError::from(Errno::Badf));
        assert_eq!(err.code(), "EBADF");
    }

    #[test]
    fn copyfile_exists_carries_both_paths() {
        let err = copyfile_exists("src.txt", "dst.txt");
        let system = err.as_system().expect("system error");
        assert_eq!(system.dest(), Some("dst.txt"));
        assert_eq!(
            err.to_string(),
            "EEXIST: file already exists, copyfile 'src.txt' -> 'dst.txt'"
        );
    }

    #[test]
    fn validation_codes_are_stable() {
        let err = FsError::invalid_type("path", "of type string", 42);
        assert_eq!(err.code(), "ERR_INVALID_ARG_TYPE");
        assert_eq!(err.name(), "TypeError");
        let err = FsError::out_of_range("mode", ">= 0 && <= 7", 9);
        assert_eq!(err.code(), "ERR_OUT_OF_RANGE");
        assert_eq!(err.name(), "RangeError");
        let err = FsError::Unsupported { api: "watch" };
        assert_eq!(err.to_string(), "'watch' is unsupported");
    }
}
