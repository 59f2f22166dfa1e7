//! Otter FS - Node.js-compatible `fs` facade
//!
//! Implements the `node:fs` surface on top of a pluggable native binding
//! ([`FsBinding`]). The facade owns argument validation, option defaults,
//! metadata normalization, error translation, directory paging and the
//! callback/promise scheduling; the binding only performs raw calls.
//!
//! # Usage
//!
//! ```no_run
//! use otter_fs::{FsConfig, MkdirOptions, NodeFs, ReadFileOptions, WriteFileOptions};
//!
//! let fs = NodeFs::host(FsConfig::default());
//! fs.mkdir_sync("/tmp/otter/a", MkdirOptions::new().recursive(true))?;
//! fs.write_file_sync("/tmp/otter/a/hello.txt", "hi", WriteFileOptions::new())?;
//! let text = fs.read_file_sync("/tmp/otter/a/hello.txt", ReadFileOptions::new())?;
//!
//! // Deferred forms queue on the facade's scheduler.
//! let pending = fs.promises().stat("/tmp/otter/a", Default::default());
//! fs.scheduler().run_until_idle();
//! # let _ = (text, pending);
//! # Ok::<(), otter_fs::FsError>(())
//! ```

pub mod binding;
pub mod constants;

mod args;
mod callback;
mod config;
mod cp;
mod deferred;
mod dir;
mod encoding;
mod errors;
mod file_handle;
mod fs_core;
mod options;
mod path;
mod promises;
mod scheduler;
mod stats;
mod validate;

pub use args::{
    Data, OpenFlags, PathLike, PathOrFd, ReadArgs, ReadOptions, TimeArg, WriteArgs, WriteRequest,
};
pub use binding::host::HostBinding;
pub use binding::memory::MemoryBinding;
pub use binding::{
    DirCookie, Errno, Fd, FsBinding, Position, RawDirent, RawError, RawFileType, RawResult,
    RawStat, ReaddirPage, TypePredicates,
};
pub use callback::CallbackFs;
pub use config::FsConfig;
pub use deferred::{ReadOutcome, ReadvOutcome};
pub use dir::{Dir, DirEntries, Dirent, DirentType, ReaddirEntries};
pub use encoding::{Contents, Encoding};
pub use errors::{ErrorCode, FsError, FsResult, SystemError};
pub use file_handle::FileHandle;
pub use fs_core::NodeFs;
pub use options::{
    AbortSignal, AppendFileOptions, CpFilter, CpOptions, EncodingOptions, MkdirOptions,
    OpendirOptions, ReadFileOptions, ReaddirOptions, RmOptions, RmdirOptions, StatOptions,
    WriteFileOptions,
};
pub use promises::FsPromises;
pub use scheduler::{Pending, Scheduler};
pub use stats::{BigIntStats, Stats, StatsResult};
