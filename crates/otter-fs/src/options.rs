//! Per-operation option records.
//!
//! Every record comes in two forms: the caller-facing one where each key is
//! optional, and a resolved one produced by `merged()`, which overlays the
//! caller's keys on the record's `DEFAULTS` one key at a time. Merging borrows
//! the caller's record and never mutates it. `signal` is carried through every
//! record untouched.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::args::OpenFlags;
use crate::constants::{DEFAULT_DIR_MODE, DEFAULT_FILE_MODE};
use crate::encoding::Encoding;

/// Cancellation token accepted for API compatibility. No operation consults it.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn aborted(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Predicate consulted by `cp` for every source/destination pair.
#[derive(Clone)]
pub struct CpFilter(Arc<dyn Fn(&str, &str) -> bool + Send + Sync>);

impl CpFilter {
    pub fn new(filter: impl Fn(&str, &str) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(filter))
    }

    pub fn accepts(&self, src: &str, dest: &str) -> bool {
        (self.0)(src, dest)
    }
}

impl fmt::Debug for CpFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CpFilter(..)")
    }
}

macro_rules! option_record {
    (
        $(#[$meta:meta])*
        $name:ident => $resolved:ident {
            $( $(#[$fmeta:meta])* $field:ident : $ty:ty = $default:expr ),* $(,)?
        }
        $( carry { $( $cfield:ident : $cty:ty = $cdefault:expr ),* $(,)? } )?
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default)]
        pub struct $name {
            $( $(#[$fmeta])* pub $field: Option<$ty>, )*
            $( $( pub $cfield: $cty, )* )?
            pub signal: Option<AbortSignal>,
        }

        #[doc = concat!("[`", stringify!($name), "`] with every default applied.")]
        #[derive(Debug, Clone)]
        pub struct $resolved {
            $( pub $field: $ty, )*
            $( $( pub $cfield: $cty, )* )?
            pub signal: Option<AbortSignal>,
        }

        impl $name {
            pub const DEFAULTS: $resolved = $resolved {
                $( $field: $default, )*
                $( $( $cfield: $cdefault, )* )?
                signal: None,
            };

            pub fn new() -> Self {
                Self::default()
            }

            pub fn merged(&self) -> $resolved {
                let defaults = Self::DEFAULTS;
                $resolved {
                    $( $field: self.$field.clone().unwrap_or(defaults.$field), )*
                    $( $( $cfield: self.$cfield.clone(), )* )?
                    signal: self.signal.clone(),
                }
            }

            $(
                pub fn $field(mut self, value: $ty) -> Self {
                    self.$field = Some(value);
                    self
                }
            )*

            pub fn signal(mut self, signal: AbortSignal) -> Self {
                self.signal = Some(signal);
                self
            }
        }
    };
}

const FLAG_READ: OpenFlags = OpenFlags::Named(Cow::Borrowed("r"));
const FLAG_WRITE: OpenFlags = OpenFlags::Named(Cow::Borrowed("w"));
const FLAG_APPEND: OpenFlags = OpenFlags::Named(Cow::Borrowed("a"));

option_record! {
    /// `stat`, `lstat` and `fstat`.
    StatOptions => ResolvedStatOptions {
        bigint: bool = false,
        throw_if_no_entry: bool = true,
    }
}

option_record! {
    MkdirOptions => ResolvedMkdirOptions {
        recursive: bool = false,
        mode: u32 = DEFAULT_DIR_MODE,
    }
}

option_record! {
    /// Retry keys are accepted for parity with `rm`; `rmdir` never retries.
    RmdirOptions => ResolvedRmdirOptions {
        max_retries: u32 = 0,
        recursive: bool = false,
        retry_delay: u64 = 100,
    }
}

option_record! {
    RmOptions => ResolvedRmOptions {
        force: bool = false,
        max_retries: u32 = 0,
        recursive: bool = false,
        /// Milliseconds between attempts.
        retry_delay: u64 = 100,
    }
}

option_record! {
    /// `realpath`, `readlink` and `mkdtemp`.
    EncodingOptions => ResolvedEncodingOptions {
        encoding: Encoding = Encoding::Utf8,
    }
}

option_record! {
    ReadFileOptions => ResolvedReadFileOptions {
        encoding: Encoding = Encoding::Buffer,
        flag: OpenFlags = FLAG_READ,
    }
}

option_record! {
    WriteFileOptions => ResolvedWriteFileOptions {
        encoding: Encoding = Encoding::Utf8,
        mode: u32 = DEFAULT_FILE_MODE,
        flag: OpenFlags = FLAG_WRITE,
    }
}

option_record! {
    AppendFileOptions => ResolvedAppendFileOptions {
        encoding: Encoding = Encoding::Utf8,
        mode: u32 = DEFAULT_FILE_MODE,
        flag: OpenFlags = FLAG_APPEND,
    }
}

option_record! {
    ReaddirOptions => ResolvedReaddirOptions {
        encoding: Encoding = Encoding::Utf8,
        with_file_types: bool = false,
    }
}

option_record! {
    OpendirOptions => ResolvedOpendirOptions {
        encoding: Encoding = Encoding::Utf8,
        buffer_size: usize = 32,
    }
}

option_record! {
    CpOptions => ResolvedCpOptions {
        dereference: bool = false,
        error_on_exist: bool = false,
        force: bool = true,
        preserve_timestamps: bool = false,
        recursive: bool = false,
        verbatim_symlinks: bool = false,
        /// `COPYFILE_*` bits applied to every file copy.
        mode: u32 = 0,
    }
    carry {
        filter: Option<CpFilter> = None,
    }
}

impl CpOptions {
    pub fn filter(mut self, filter: impl Fn(&str, &str) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Some(CpFilter::new(filter));
        self
    }
}

/// A bare number stands for `mode`.
impl From<u32> for MkdirOptions {
    fn from(mode: u32) -> Self {
        Self::new().mode(mode)
    }
}

macro_rules! encoding_shorthand {
    ($($name:ident),*) => {
        $(
            impl From<Encoding> for $name {
                fn from(encoding: Encoding) -> Self {
                    Self::new().encoding(encoding)
                }
            }
        )*
    };
}

encoding_shorthand!(
    EncodingOptions,
    ReadFileOptions,
    WriteFileOptions,
    AppendFileOptions,
    ReaddirOptions,
    OpendirOptions
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merged_overlays_only_explicit_keys() {
        let options = RmOptions::new().recursive(true);
        let merged = options.merged();
        assert!(merged.recursive);
        assert!(!merged.force);
        assert_eq!(merged.max_retries, 0);
        assert_eq!(merged.retry_delay, 100);
    }

    #[test]
    fn merged_leaves_the_caller_record_untouched() {
        let options = StatOptions::new().throw_if_no_entry(false);
        let _ = options.merged();
        assert_eq!(options.bigint, None);
        assert_eq!(options.throw_if_no_entry, Some(false));
    }

    #[test]
    fn explicit_false_overrides_a_true_default() {
        let merged = CpOptions::new().force(false).merged();
        assert!(!merged.force);
        assert!(CpOptions::DEFAULTS.force);
    }

    #[test]
    fn signal_is_carried_even_though_unused() {
        let signal = AbortSignal::new();
        let merged = ReadFileOptions::new().signal(signal.clone()).merged();
        signal.abort();
        assert!(merged.signal.expect("signal kept").aborted());
    }

    #[test]
    fn shorthands_set_the_expected_key() {
        assert_eq!(MkdirOptions::from(0o700).merged().mode, 0o700);
        let merged = ReadFileOptions::from(Encoding::Utf8).merged();
        assert_eq!(merged.encoding, Encoding::Utf8);
        assert_eq!(merged.flag, FLAG_READ);
    }

    #[test]
    fn cp_filter_is_carried() {
        let merged = CpOptions::new().filter(|src, _| !src.ends_with(".tmp")).merged();
        let filter = merged.filter.expect("filter");
        assert!(filter.accepts("a.txt", "b.txt"));
        assert!(!filter.accepts("a.tmp", "b.tmp"));
    }
}
