//! Boundary argument shapes.
//!
//! Node accepts several shapes in the same positional slot. Each enum here
//! captures those shapes once so the operation layer receives a single
//! canonical record.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::binding::{Fd, Position};
use crate::constants::string_to_flags;
use crate::encoding::Encoding;
use crate::errors::{FsError, FsResult};

/// A path given as text, bytes or a `file:` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathLike {
    Str(String),
    Bytes(Vec<u8>),
    Url(String),
}

impl PathLike {
    pub fn url(url: impl Into<String>) -> Self {
        PathLike::Url(url.into())
    }
}

impl From<&str> for PathLike {
    fn from(path: &str) -> Self {
        PathLike::Str(path.to_string())
    }
}

impl From<String> for PathLike {
    fn from(path: String) -> Self {
        PathLike::Str(path)
    }
}

impl From<&String> for PathLike {
    fn from(path: &String) -> Self {
        PathLike::Str(path.clone())
    }
}

impl From<&Path> for PathLike {
    fn from(path: &Path) -> Self {
        PathLike::Str(path.to_string_lossy().into_owned())
    }
}

impl From<PathBuf> for PathLike {
    fn from(path: PathBuf) -> Self {
        PathLike::from(path.as_path())
    }
}

impl From<&PathBuf> for PathLike {
    fn from(path: &PathBuf) -> Self {
        PathLike::from(path.as_path())
    }
}

impl From<&[u8]> for PathLike {
    fn from(path: &[u8]) -> Self {
        PathLike::Bytes(path.to_vec())
    }
}

impl From<Vec<u8>> for PathLike {
    fn from(path: Vec<u8>) -> Self {
        PathLike::Bytes(path)
    }
}

/// `readFile`/`writeFile`/`appendFile` target: a path they open and close
/// themselves, or a descriptor they leave open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathOrFd {
    Path(PathLike),
    Fd(Fd),
}

impl From<Fd> for PathOrFd {
    fn from(fd: Fd) -> Self {
        PathOrFd::Fd(fd)
    }
}

impl From<PathLike> for PathOrFd {
    fn from(path: PathLike) -> Self {
        PathOrFd::Path(path)
    }
}

macro_rules! path_or_fd_from_path {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for PathOrFd {
                fn from(path: $ty) -> Self {
                    PathOrFd::Path(PathLike::from(path))
                }
            }
        )*
    };
}

path_or_fd_from_path!(&str, String, &String, &Path, PathBuf, &PathBuf, Vec<u8>);

/// Flags as a Node flag string or raw binding bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenFlags {
    Named(Cow<'static, str>),
    Bits(u32),
}

impl OpenFlags {
    pub fn to_bits(&self) -> FsResult<u32> {
        match self {
            OpenFlags::Named(name) => string_to_flags(name),
            OpenFlags::Bits(bits) => Ok(*bits),
        }
    }
}

impl Default for OpenFlags {
    fn default() -> Self {
        OpenFlags::Named(Cow::Borrowed("r"))
    }
}

impl From<&'static str> for OpenFlags {
    fn from(flag: &'static str) -> Self {
        OpenFlags::Named(Cow::Borrowed(flag))
    }
}

impl From<String> for OpenFlags {
    fn from(flag: String) -> Self {
        OpenFlags::Named(Cow::Owned(flag))
    }
}

impl From<u32> for OpenFlags {
    fn from(bits: u32) -> Self {
        OpenFlags::Bits(bits)
    }
}

/// Data for `writeFile`/`appendFile`: text is encoded with the call's
/// `encoding` option, bytes are written as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Data {
    Text(String),
    Bytes(Vec<u8>),
}

impl Data {
    pub(crate) fn into_bytes(self, encoding: Encoding) -> FsResult<Vec<u8>> {
        match self {
            Data::Text(text) => encoding.encode(&text),
            Data::Bytes(bytes) => Ok(bytes),
        }
    }
}

impl From<&str> for Data {
    fn from(text: &str) -> Self {
        Data::Text(text.to_string())
    }
}

impl From<String> for Data {
    fn from(text: String) -> Self {
        Data::Text(text)
    }
}

impl From<&[u8]> for Data {
    fn from(bytes: &[u8]) -> Self {
        Data::Bytes(bytes.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for Data {
    fn from(bytes: &[u8; N]) -> Self {
        Data::Bytes(bytes.to_vec())
    }
}

impl From<Vec<u8>> for Data {
    fn from(bytes: Vec<u8>) -> Self {
        Data::Bytes(bytes)
    }
}

/// Options-object form of `read`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    pub offset: Option<usize>,
    pub length: Option<usize>,
    pub position: Option<Position>,
}

/// The argument tail of `read(fd, buffer, ...)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadArgs {
    Positional {
        offset: usize,
        length: usize,
        position: Position,
    },
    Options(ReadOptions),
}

impl ReadArgs {
    pub fn positional(offset: usize, length: usize, position: impl Into<Position>) -> Self {
        ReadArgs::Positional {
            offset,
            length,
            position: position.into(),
        }
    }

    /// Fill the whole buffer from the descriptor's current position.
    pub fn whole() -> Self {
        ReadArgs::Options(ReadOptions::default())
    }

    /// Resolve against the buffer length, rejecting windows outside it.
    pub(crate) fn resolve(self, buffer_len: usize) -> FsResult<ReadCall> {
        let (offset, length, position) = match self {
            ReadArgs::Positional {
                offset,
                length,
                position,
            } => (offset, length, position),
            ReadArgs::Options(options) => {
                let offset = options.offset.unwrap_or(0);
                let length = options
                    .length
                    .unwrap_or_else(|| buffer_len.saturating_sub(offset));
                (offset, length, options.position.unwrap_or_default())
            }
        };
        if offset > buffer_len {
            return Err(FsError::out_of_range(
                "offset",
                format!(">= 0 && <= {buffer_len}"),
                offset,
            ));
        }
        if length > buffer_len - offset {
            return Err(FsError::out_of_range(
                "length",
                format!(">= 0 && <= {}", buffer_len - offset),
                length,
            ));
        }
        crate::validate::position(position)?;
        Ok(ReadCall {
            offset,
            length,
            position,
        })
    }
}

impl Default for ReadArgs {
    fn default() -> Self {
        ReadArgs::whole()
    }
}

impl From<ReadOptions> for ReadArgs {
    fn from(options: ReadOptions) -> Self {
        ReadArgs::Options(options)
    }
}

/// Canonical read request after boundary resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ReadCall {
    pub offset: usize,
    pub length: usize,
    pub position: Position,
}

/// Arguments of `write(fd, ...)`: a buffer window or a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteArgs<'a> {
    Buffer {
        buffer: &'a [u8],
        offset: Option<usize>,
        length: Option<usize>,
        position: Position,
    },
    Text {
        text: &'a str,
        position: Position,
        encoding: Encoding,
    },
}

impl<'a> WriteArgs<'a> {
    pub fn buffer(buffer: &'a [u8]) -> Self {
        WriteArgs::Buffer {
            buffer,
            offset: None,
            length: None,
            position: Position::Current,
        }
    }

    pub fn text(text: &'a str) -> Self {
        WriteArgs::Text {
            text,
            position: Position::Current,
            encoding: Encoding::Utf8,
        }
    }

    pub fn offset(mut self, value: usize) -> Self {
        if let WriteArgs::Buffer { offset, .. } = &mut self {
            *offset = Some(value);
        }
        self
    }

    pub fn length(mut self, value: usize) -> Self {
        if let WriteArgs::Buffer { length, .. } = &mut self {
            *length = Some(value);
        }
        self
    }

    pub fn encoding(mut self, value: Encoding) -> Self {
        if let WriteArgs::Text { encoding, .. } = &mut self {
            *encoding = value;
        }
        self
    }

    pub fn position(mut self, value: impl Into<Position>) -> Self {
        match &mut self {
            WriteArgs::Buffer { position, .. } | WriteArgs::Text { position, .. } => {
                *position = value.into();
            }
        }
        self
    }

    /// The bytes to hand to the binding and where to put them.
    pub(crate) fn resolve(self) -> FsResult<(Cow<'a, [u8]>, Position)> {
        match self {
            WriteArgs::Buffer {
                buffer,
                offset,
                length,
                position,
            } => {
                let offset = offset.unwrap_or(0);
                if offset > buffer.len() {
                    return Err(FsError::out_of_range(
                        "offset",
                        format!(">= 0 && <= {}", buffer.len()),
                        offset,
                    ));
                }
                let available = buffer.len() - offset;
                let length = length.unwrap_or(available);
                if length > available {
                    return Err(FsError::out_of_range(
                        "length",
                        format!(">= 0 && <= {available}"),
                        length,
                    ));
                }
                crate::validate::position(position)?;
                Ok((Cow::Borrowed(&buffer[offset..offset + length]), position))
            }
            WriteArgs::Text {
                text,
                position,
                encoding,
            } => {
                crate::validate::position(position)?;
                Ok((Cow::Owned(encoding.encode(text)?), position))
            }
        }
    }
}

impl<'a> From<&'a [u8]> for WriteArgs<'a> {
    fn from(buffer: &'a [u8]) -> Self {
        WriteArgs::buffer(buffer)
    }
}

impl<'a> From<&'a Vec<u8>> for WriteArgs<'a> {
    fn from(buffer: &'a Vec<u8>) -> Self {
        WriteArgs::buffer(buffer)
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for WriteArgs<'a> {
    fn from(buffer: &'a [u8; N]) -> Self {
        WriteArgs::buffer(buffer)
    }
}

impl<'a> From<&'a str> for WriteArgs<'a> {
    fn from(text: &'a str) -> Self {
        WriteArgs::text(text)
    }
}

impl<'a> From<&'a String> for WriteArgs<'a> {
    fn from(text: &'a String) -> Self {
        WriteArgs::text(text)
    }
}

/// Owned form of [`WriteArgs`] for writes that run on a later turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRequest {
    data: Data,
    offset: Option<usize>,
    length: Option<usize>,
    position: Position,
    encoding: Encoding,
}

impl WriteRequest {
    pub fn new(data: impl Into<Data>) -> Self {
        Self {
            data: data.into(),
            offset: None,
            length: None,
            position: Position::Current,
            encoding: Encoding::Utf8,
        }
    }

    /// Start of the window to write. Ignored for text.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Length of the window to write. Ignored for text.
    pub fn length(mut self, length: usize) -> Self {
        self.length = Some(length);
        self
    }

    pub fn position(mut self, position: impl Into<Position>) -> Self {
        self.position = position.into();
        self
    }

    /// How text is turned into bytes. Ignored for bytes.
    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub(crate) fn as_args(&self) -> WriteArgs<'_> {
        match &self.data {
            Data::Bytes(buffer) => WriteArgs::Buffer {
                buffer,
                offset: self.offset,
                length: self.length,
                position: self.position,
            },
            Data::Text(text) => WriteArgs::Text {
                text,
                position: self.position,
                encoding: self.encoding,
            },
        }
    }
}

macro_rules! write_request_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for WriteRequest {
                fn from(data: $ty) -> Self {
                    WriteRequest::new(data)
                }
            }
        )*
    };
}

write_request_from!(&str, String, &[u8], Vec<u8>, Data);

impl<const N: usize> From<&[u8; N]> for WriteRequest {
    fn from(data: &[u8; N]) -> Self {
        WriteRequest::new(data)
    }
}

/// A timestamp for `utimes`: Unix seconds, a numeric string, or an instant.
#[derive(Debug, Clone, PartialEq)]
pub enum TimeArg {
    Seconds(f64),
    Str(String),
    Instant(SystemTime),
}

impl From<f64> for TimeArg {
    fn from(seconds: f64) -> Self {
        TimeArg::Seconds(seconds)
    }
}

impl From<i64> for TimeArg {
    fn from(seconds: i64) -> Self {
        TimeArg::Seconds(seconds as f64)
    }
}

impl From<&str> for TimeArg {
    fn from(seconds: &str) -> Self {
        TimeArg::Str(seconds.to_string())
    }
}

impl From<SystemTime> for TimeArg {
    fn from(instant: SystemTime) -> Self {
        TimeArg::Instant(instant)
    }
}
