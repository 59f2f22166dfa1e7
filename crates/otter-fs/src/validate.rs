//! Argument validation shared by every call shape.

use std::time::UNIX_EPOCH;

use url::Url;

use crate::args::{PathLike, TimeArg};
use crate::binding::{Fd, Position};
use crate::errors::{FsError, FsResult};

/// Canonicalize a path-shaped argument to a string.
pub fn path(value: impl Into<PathLike>, name: &'static str) -> FsResult<String> {
    let text = match value.into() {
        PathLike::Str(text) => text,
        PathLike::Bytes(bytes) => String::from_utf8(bytes).map_err(|e| {
            FsError::invalid_value(name, "must be valid UTF-8", e.as_bytes().to_vec())
        })?,
        PathLike::Url(url) => file_url_to_path(&url, name)?,
    };
    if text.contains('\0') {
        return Err(FsError::invalid_value(
            name,
            "must be a string, Uint8Array, or URL without null bytes",
            text,
        ));
    }
    Ok(text)
}

fn file_url_to_path(href: &str, name: &'static str) -> FsResult<String> {
    let url = Url::parse(href)
        .map_err(|_| FsError::invalid_value(name, "must be a valid file URL", href))?;
    if url.scheme() != "file" {
        return Err(FsError::invalid_type(name, "a URL of scheme file", href));
    }
    if !matches!(url.host_str(), None | Some("") | Some("localhost")) {
        return Err(FsError::invalid_value(
            name,
            "must be a file URL without a host",
            href,
        ));
    }
    // Encoded separators would change the path's shape once decoded.
    if url.path().to_ascii_lowercase().contains("%2f") {
        return Err(FsError::invalid_value(
            name,
            "must not include encoded / characters",
            href,
        ));
    }
    url.to_file_path()
        .ok()
        .and_then(|path| path.to_str().map(str::to_string))
        .ok_or_else(|| FsError::invalid_value(name, "must be a valid file URL", href))
}

pub fn fd(fd: Fd) -> FsResult<Fd> {
    if fd < 0 {
        return Err(FsError::out_of_range("fd", ">= 0 && <= 2147483647", fd));
    }
    Ok(fd)
}

/// Permission bits for `open`, `mkdir`, `writeFile` and friends.
pub fn mode(mode: u32, name: &'static str) -> FsResult<u32> {
    if mode > 0o777 {
        return Err(FsError::out_of_range(name, ">= 0 && <= 511", mode));
    }
    Ok(mode)
}

/// `access` and `copyFile` modes are small bitmasks.
pub fn small_mode(mode: u32, name: &'static str) -> FsResult<u32> {
    if mode > 7 {
        return Err(FsError::out_of_range(name, ">= 0 && <= 7", mode));
    }
    Ok(mode)
}

pub fn position(position: Position) -> FsResult<()> {
    if let Position::At(offset) = position {
        if offset > i64::MAX as u64 {
            return Err(FsError::out_of_range(
                "position",
                format!(">= 0 && <= {}", i64::MAX),
                offset,
            ));
        }
    }
    Ok(())
}

/// Resolve a `utimes` time argument to milliseconds since the epoch.
pub fn time_ms(time: &TimeArg, name: &'static str) -> FsResult<f64> {
    let seconds = match time {
        TimeArg::Seconds(seconds) => *seconds,
        TimeArg::Str(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| FsError::invalid_type(name, "of type number or Date", text))?,
        TimeArg::Instant(instant) => match instant.duration_since(UNIX_EPOCH) {
            Ok(after) => after.as_secs_f64(),
            Err(before) => -before.duration().as_secs_f64(),
        },
    };
    if !seconds.is_finite() {
        return Err(FsError::invalid_type(name, "of type number or Date", seconds));
    }
    Ok(seconds * 1000.0)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn path_rejects_null_bytes() {
        let err = path("a\0b", "path").unwrap_err();
        assert_eq!(err.code(), "ERR_INVALID_ARG_VALUE");
    }

    #[test]
    fn path_accepts_bytes_and_file_urls() {
        assert_eq!(path(b"dir/file".as_slice(), "path").unwrap(), "dir/file");
        assert_eq!(
            path(PathLike::url("file:///tmp/a%20b.txt"), "path").unwrap(),
            "/tmp/a b.txt"
        );
        let err = path(PathLike::url("http://example.com/x"), "path").unwrap_err();
        assert_eq!(err.code(), "ERR_INVALID_ARG_TYPE");
        let err = path(PathLike::url("file://remote/x"), "path").unwrap_err();
        assert_eq!(err.code(), "ERR_INVALID_ARG_VALUE");
    }

    #[test]
    fn modes_are_range_checked() {
        assert_eq!(mode(0o755, "mode").unwrap(), 0o755);
        assert_eq!(mode(0o1000, "mode").unwrap_err().code(), "ERR_OUT_OF_RANGE");
        assert_eq!(small_mode(8, "mode").unwrap_err().code(), "ERR_OUT_OF_RANGE");
        assert_eq!(fd(-1).unwrap_err().code(), "ERR_OUT_OF_RANGE");
    }

    #[test]
    fn times_resolve_to_milliseconds() {
        assert_eq!(time_ms(&TimeArg::Seconds(1.5), "atime").unwrap(), 1500.0);
        assert_eq!(time_ms(&TimeArg::from("2"), "atime").unwrap(), 2000.0);
        let instant = UNIX_EPOCH + Duration::from_secs(3);
        assert_eq!(time_ms(&TimeArg::Instant(instant), "mtime").unwrap(), 3000.0);
        let err = time_ms(&TimeArg::Seconds(f64::NAN), "mtime").unwrap_err();
        assert_eq!(err.code(), "ERR_INVALID_ARG_TYPE");
    }

    #[test]
    fn position_must_fit_in_i64() {
        assert!(position(Position::At(7)).is_ok());
        assert!(position(Position::At(u64::MAX)).is_err());
    }
}
