//! `cp`: copy files, symlinks and directory trees through the binding.

use tracing::trace;

use crate::args::PathLike;
use crate::binding::{Errno, FsBinding, RawStat, TypePredicates};
use crate::constants::COPYFILE_EXCL;
use crate::errors::{self, FsError, FsResult};
use crate::fs_core::NodeFs;
use crate::options::{CpOptions, MkdirOptions, OpendirOptions, ResolvedCpOptions};
use crate::path;
use crate::validate;

/// Resolve `cp` options, rejecting contradictory combinations.
pub(crate) fn resolve_options(options: &CpOptions) -> FsResult<ResolvedCpOptions> {
    let options = options.merged();
    if options.dereference && options.verbatim_symlinks {
        return Err(FsError::IncompatibleOptionPair {
            first: "dereference",
            second: "verbatimSymlinks",
        });
    }
    validate::small_mode(options.mode, "options.mode")?;
    Ok(options)
}

impl<B: FsBinding> NodeFs<B> {
    /// Copy `src` to `dest`. Directories need `recursive`.
    pub fn cp_sync(
        &self,
        src: impl Into<PathLike>,
        dest: impl Into<PathLike>,
        options: CpOptions,
    ) -> FsResult<()> {
        let options = resolve_options(&options)?;
        let src = validate::path(src, "src")?;
        let dest = validate::path(dest, "dest")?;
        trace!(src = %src, dest = %dest, recursive = options.recursive, "cp");

        let copier = Copier { fs: self, options: &options };
        copier.check_root(&src, &dest)?;
        copier.copy_path(&src, &dest)
    }
}

struct Copier<'a, B: FsBinding> {
    fs: &'a NodeFs<B>,
    options: &'a ResolvedCpOptions,
}

impl<B: FsBinding> Copier<'_, B> {
    fn source_stat(&self, src: &str) -> FsResult<RawStat> {
        let binding = self.fs.binding();
        if self.options.dereference {
            binding.stat(src).map_err(errors::for_lookup)
        } else {
            binding.lstat(src).map_err(errors::for_lookup)
        }
    }

    fn dest_stat(&self, dest: &str) -> FsResult<Option<RawStat>> {
        let binding = self.fs.binding();
        let result = if self.options.dereference {
            binding.stat(dest)
        } else {
            binding.lstat(dest)
        };
        match result {
            Ok(stat) => Ok(Some(stat)),
            Err(err) if err.errno == Errno::Noent => Ok(None),
            Err(err) => Err(errors::for_lookup(err)),
        }
    }

    /// Refuse to copy an entry onto itself or a directory into its own subtree.
    fn check_root(&self, src: &str, dest: &str) -> FsResult<()> {
        let src_stat = self.source_stat(src)?;
        if let Some(dest_stat) = self.dest_stat(dest)? {
            let same = src_stat.ino.is_some()
                && src_stat.ino == dest_stat.ino
                && src_stat.dev == dest_stat.dev;
            if same {
                return Err(errors::cp_failure(
                    "ERR_FS_CP_EINVAL",
                    format!("src and dest cannot be the same {dest}"),
                    dest,
                ));
            }
        }
        if src_stat.is_directory() && is_subdirectory(src, dest) {
            return Err(errors::cp_failure(
                "ERR_FS_CP_EINVAL",
                format!("Cannot copy {src} to a subdirectory of self {dest}"),
                dest,
            ));
        }
        Ok(())
    }

    fn copy_path(&self, src: &str, dest: &str) -> FsResult<()> {
        if let Some(filter) = &self.options.filter {
            if !filter.accepts(src, dest) {
                trace!(src, "cp filter skipped entry");
                return Ok(());
            }
        }

        let src_stat = self.source_stat(src)?;
        let dest_stat = self.dest_stat(dest)?;
        if let Some(existing) = &dest_stat {
            if src_stat.is_directory() && !existing.is_directory() {
                return Err(errors::cp_failure(
                    "ERR_FS_CP_DIR_TO_NON_DIR",
                    format!("Cannot overwrite non-directory {dest} with directory {src}"),
                    dest,
                ));
            }
            if !src_stat.is_directory() && existing.is_directory() {
                return Err(errors::cp_failure(
                    "ERR_FS_CP_NON_DIR_TO_DIR",
                    format!("Cannot overwrite directory {dest} with non-directory {src}"),
                    dest,
                ));
            }
        }

        if src_stat.is_directory() {
            if !self.options.recursive {
                return Err(errors::cp_failure(
                    "ERR_FS_EISDIR",
                    format!("Recursive option is required to copy a directory: {src}"),
                    src,
                ));
            }
            return self.copy_dir(src, dest, &src_stat, dest_stat.is_some());
        }
        if src_stat.is_symbolic_link() {
            return self.copy_symlink(src, dest, dest_stat.is_some());
        }
        self.copy_file(src, dest, &src_stat, dest_stat.is_some())
    }

    /// Decide what to do with an existing destination. `Ok(false)` skips it.
    fn prepare_destination(&self, src: &str, dest: &str) -> FsResult<bool> {
        if self.options.mode & COPYFILE_EXCL != 0 {
            return Err(errors::copyfile_exists(src, dest));
        }
        if !self.options.force {
            if self.options.error_on_exist {
                return Err(errors::cp_failure(
                    "ERR_FS_CP_EEXIST",
                    format!("Target already exists: {dest}"),
                    dest,
                ));
            }
            return Ok(false);
        }
        self.fs.unlink_sync(dest)?;
        Ok(true)
    }

    fn copy_file(&self, src: &str, dest: &str, src_stat: &RawStat, exists: bool) -> FsResult<()> {
        if exists && !self.prepare_destination(src, dest)? {
            return Ok(());
        }
        self.fs.copy_file_sync(src, dest, Some(self.options.mode))?;
        self.preserve_timestamps(src_stat, dest)
    }

    fn copy_symlink(&self, src: &str, dest: &str, exists: bool) -> FsResult<()> {
        let binding = self.fs.binding();
        let mut target = binding
            .readlink(src)
            .map_err(errors::for_lookup)?;
        if !self.options.verbatim_symlinks && !target.starts_with('/') {
            let (parent, _) = path::split_parent(src);
            let parent = binding
                .realpath(parent)
                .map_err(errors::for_lookup)?;
            target = path::normalize(&path::join(&parent, &target));
        }
        if exists && !self.prepare_destination(src, dest)? {
            return Ok(());
        }
        self.fs.symlink_sync(target, dest)
    }

    fn copy_dir(&self, src: &str, dest: &str, src_stat: &RawStat, exists: bool) -> FsResult<()> {
        if !exists {
            let mode = src_stat.mode.map_or(0o777, |mode| mode & 0o777);
            self.fs.mkdir_sync(dest, MkdirOptions::new().mode(mode))?;
        }
        for entry in self.fs.opendir_sync(src, OpendirOptions::new())? {
            let entry = entry?;
            self.copy_path(&path::join(src, entry.name()), &path::join(dest, entry.name()))?;
        }
        self.preserve_timestamps(src_stat, dest)
    }

    fn preserve_timestamps(&self, src_stat: &RawStat, dest: &str) -> FsResult<()> {
        if !self.options.preserve_timestamps {
            return Ok(());
        }
        let (Some(atime), Some(mtime)) = (src_stat.atime_ms, src_stat.mtime_ms) else {
            return Ok(());
        };
        self.fs
            .binding()
            .utime(dest, atime as f64, mtime as f64)
            .map_err(errors::for_lookup)
    }
}

fn is_subdirectory(parent: &str, child: &str) -> bool {
    let parent = path::normalize(parent);
    let child = path::normalize(child);
    let prefix = if parent.ends_with('/') {
        parent
    } else {
        format!("{parent}/")
    };
    child.starts_with(&prefix)
}
