//! Directory cursor over the binding's paged `readdir`.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use crate::binding::{
    DirCookie, Errno, Fd, FsBinding, RawDirent, RawError, RawFileType, TypePredicates,
};
use crate::encoding::Contents;
use crate::errors::{self, FsResult};
use crate::fs_core::NodeFs;
use crate::scheduler::{Pending, Scheduler};

pub type DirentType = RawFileType;

/// One directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dirent {
    name: String,
    parent_path: String,
    file_type: DirentType,
}

impl Dirent {
    fn from_raw(raw: RawDirent, parent_path: &str) -> Self {
        Self {
            name: raw.name,
            parent_path: parent_path.to_string(),
            file_type: raw.file_type,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The directory this entry was read from.
    pub fn parent_path(&self) -> &str {
        &self.parent_path
    }
}

impl TypePredicates for Dirent {
    fn file_type(&self) -> RawFileType {
        self.file_type
    }
}

/// Result of `readdir`: names, or entries when `with_file_types` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ReaddirEntries {
    Names(Vec<Contents>),
    Dirents(Vec<Dirent>),
}

impl ReaddirEntries {
    pub fn len(&self) -> usize {
        match self {
            ReaddirEntries::Names(names) => names.len(),
            ReaddirEntries::Dirents(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct DirState<B: FsBinding> {
    fs: NodeFs<B>,
    fd: Fd,
    path: String,
    buffer: Vec<RawDirent>,
    index: usize,
    cookie: DirCookie,
    finished: bool,
    closed: bool,
}

impl<B: FsBinding> DirState<B> {
    fn read(&mut self) -> FsResult<Option<Dirent>> {
        if self.closed {
            return Err(errors::passthrough(RawError::new(
                Errno::Badf,
                "Directory handle was closed",
            )));
        }
        self.refill()?;
        match self.buffer.get(self.index) {
            Some(raw) => {
                let entry = Dirent::from_raw(raw.clone(), &self.path);
                self.index += 1;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    /// Fetch pages until an entry is buffered or the binding reports the end.
    fn refill(&mut self) -> FsResult<()> {
        while self.index == self.buffer.len() && !self.finished {
            let page = self
                .fs
                .binding()
                .readdir(self.fd, self.cookie)
                .map_err(errors::passthrough)?;
            debug!(
                fd = self.fd,
                entries = page.entries.len(),
                finished = page.finished,
                "Fetched directory page"
            );
            // An empty page cannot make progress.
            let exhausted = page.entries.is_empty();

            self.buffer.clear();
            self.index = 0;
            self.buffer.extend(
                page.entries
                    .into_iter()
                    .filter(|entry| entry.name != "." && entry.name != ".."),
            );
            self.cookie = page.cookie;
            self.finished = page.finished || exhausted;
        }
        Ok(())
    }

    fn close(&mut self) -> FsResult<()> {
        self.closed = true;
        self.fs.close_sync(self.fd)
    }
}

impl<B: FsBinding> Drop for DirState<B> {
    fn drop(&mut self) {
        if !self.closed {
            debug!(fd = self.fd, path = %self.path, "Closing abandoned directory");
            let _ = self.close();
        }
    }
}

/// An open directory. Owns one descriptor until closed or dropped.
///
/// Entries come back in binding order without `.` and `..`. The sequence is
/// finite and cannot be restarted.
pub struct Dir<B: FsBinding> {
    state: Arc<Mutex<DirState<B>>>,
    path: String,
    scheduler: Scheduler,
}

impl<B: FsBinding> std::fmt::Debug for Dir<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dir")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl<B: FsBinding> Dir<B> {
    pub(crate) fn new(fs: NodeFs<B>, fd: Fd, path: String) -> Self {
        let scheduler = fs.scheduler().clone();
        let state = DirState {
            fs,
            fd,
            path: path.clone(),
            buffer: Vec::new(),
            index: 0,
            cookie: DirCookie::START,
            finished: false,
            closed: false,
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            path,
            scheduler,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Next entry, or `None` once the directory is exhausted.
    pub fn read_sync(&self) -> FsResult<Option<Dirent>> {
        self.state.lock().read()
    }

    pub fn read<C>(&self, callback: C)
    where
        C: FnOnce(FsResult<Option<Dirent>>) + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        self.scheduler
            .defer_callback(move || state.lock().read(), callback);
    }

    pub fn read_async(&self) -> Pending<Option<Dirent>> {
        let state = Arc::clone(&self.state);
        self.scheduler.defer(move || state.lock().read())
    }

    pub fn close_sync(self) -> FsResult<()> {
        self.state.lock().close()
    }

    pub fn close<C>(self, callback: C)
    where
        C: FnOnce(FsResult<()>) + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        self.scheduler
            .defer_callback(move || state.lock().close(), callback);
    }

    pub fn close_async(self) -> Pending<()> {
        let state = Arc::clone(&self.state);
        self.scheduler.defer(move || state.lock().close())
    }

    /// Consume the cursor as a lazy sequence. The descriptor is closed when
    /// the sequence ends, fails, or is dropped early.
    pub fn entries(self) -> DirEntries<B> {
        DirEntries { dir: Some(self) }
    }
}

impl<B: FsBinding> IntoIterator for Dir<B> {
    type Item = FsResult<Dirent>;
    type IntoIter = DirEntries<B>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries()
    }
}

pub struct DirEntries<B: FsBinding> {
    dir: Option<Dir<B>>,
}

impl<B: FsBinding> Iterator for DirEntries<B> {
    type Item = FsResult<Dirent>;

    fn next(&mut self) -> Option<Self::Item> {
        let dir = self.dir.as_ref()?;
        match dir.read_sync() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                let dir = self.dir.take()?;
                dir.close_sync().err().map(Err)
            }
            Err(err) => {
                // Dropping the cursor closes its descriptor.
                self.dir = None;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FsConfig;
    use crate::options::{MkdirOptions, OpendirOptions, WriteFileOptions};

    fn populated(count: usize, page_size: usize) -> NodeFs<crate::binding::memory::MemoryBinding> {
        let fs = NodeFs::memory(FsConfig::new().readdir_page_size(page_size));
        fs.mkdir_sync("/d", MkdirOptions::new()).unwrap();
        for i in 0..count {
            fs.write_file_sync(format!("/d/f{i:02}"), "x", WriteFileOptions::new())
                .unwrap();
        }
        fs
    }

    #[test]
    fn pages_through_every_entry_once() {
        let fs = populated(7, 2);
        let dir = fs.opendir_sync("/d", OpendirOptions::new()).unwrap();
        let mut names = Vec::new();
        while let Some(entry) = dir.read_sync().unwrap() {
            assert!(entry.is_file());
            assert_eq!(entry.parent_path(), "/d");
            names.push(entry.name().to_string());
        }
        let expected: Vec<String> = (0..7).map(|i| format!("f{i:02}")).collect();
        assert_eq!(names, expected);
        assert!(dir.read_sync().unwrap().is_none());
        dir.close_sync().unwrap();
        assert_eq!(fs.binding().open_descriptors(), 0);
    }

    #[test]
    fn dot_entries_never_surface() {
        let fs = populated(0, 1);
        let dir = fs.opendir_sync("/d", OpendirOptions::new()).unwrap();
        assert!(dir.read_sync().unwrap().is_none());
        dir.close_sync().unwrap();
    }

    #[test]
    fn abandoned_iteration_releases_the_descriptor() {
        let fs = populated(5, 2);
        let dir = fs.opendir_sync("/d", OpendirOptions::new()).unwrap();
        let first_two: Vec<_> = dir.entries().take(2).collect::<FsResult<_>>().unwrap();
        assert_eq!(first_two.len(), 2);
        assert_eq!(fs.binding().open_descriptors(), 0);
    }

    #[test]
    fn deferred_reads_wait_for_the_scheduler() {
        let fs = populated(1, 4);
        let dir = fs.opendir_sync("/d", OpendirOptions::new()).unwrap();
        let mut pending = dir.read_async();
        assert!(pending.try_take().is_none());
        fs.scheduler().run_until_idle();
        let entry = pending.try_take().unwrap().unwrap().unwrap();
        assert_eq!(entry.name(), "f00");

        let mut closing = dir.close_async();
        fs.scheduler().run_until_idle();
        closing.try_take().unwrap().unwrap();
        assert_eq!(fs.binding().open_descriptors(), 0);
    }
}
