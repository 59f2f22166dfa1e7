//! Promise-style wrapper around one open descriptor.

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::args::{Data, ReadArgs, TimeArg, WriteRequest};
use crate::binding::{Fd, FsBinding, Position};
use crate::deferred::{ReadOutcome, ReadvOutcome};
use crate::encoding::Contents;
use crate::fs_core::NodeFs;
use crate::options::{AppendFileOptions, ReadFileOptions, StatOptions, WriteFileOptions};
use crate::scheduler::Pending;
use crate::stats::StatsResult;

/// An open file returned by the promise surface's `open`.
///
/// Every operation is deferred onto the facade's scheduler and bound to this
/// handle's descriptor. `close` consumes the handle; dropping an unclosed
/// handle queues the close behind the operations already scheduled.
pub struct FileHandle<B: FsBinding> {
    fd: Fd,
    path: String,
    fs: NodeFs<B>,
    close_tx: watch::Sender<bool>,
    released: bool,
}

impl<B: FsBinding> FileHandle<B> {
    pub(crate) fn new(fs: NodeFs<B>, fd: Fd, path: String) -> Self {
        let (close_tx, _) = watch::channel(false);
        Self {
            fd,
            path,
            fs,
            close_tx,
            released: false,
        }
    }

    pub fn fd(&self) -> Fd {
        self.fd
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Observe the close notification. The value flips to `true` when
    /// `close` is called, before the descriptor is released.
    pub fn on_close(&self) -> watch::Receiver<bool> {
        self.close_tx.subscribe()
    }

    pub fn read(&self, buffer: Vec<u8>, args: impl Into<ReadArgs>) -> Pending<ReadOutcome> {
        self.fs
            .scheduler()
            .submit(self.fs.deferred_read(self.fd, buffer, args))
    }

    pub fn write(&self, request: impl Into<WriteRequest>) -> Pending<usize> {
        self.fs
            .scheduler()
            .submit(self.fs.deferred_write(self.fd, request))
    }

    pub fn readv(
        &self,
        buffers: Vec<Vec<u8>>,
        position: impl Into<Position>,
    ) -> Pending<ReadvOutcome> {
        self.fs
            .scheduler()
            .submit(self.fs.deferred_readv(self.fd, buffers, position))
    }

    pub fn writev(&self, buffers: Vec<Vec<u8>>, position: impl Into<Position>) -> Pending<usize> {
        self.fs
            .scheduler()
            .submit(self.fs.deferred_writev(self.fd, buffers, position))
    }

    pub fn stat(&self, options: StatOptions) -> Pending<StatsResult> {
        self.fs
            .scheduler()
            .submit(self.fs.deferred_fstat(self.fd, options))
    }

    pub fn sync(&self) -> Pending<()> {
        self.fs.scheduler().submit(self.fs.deferred_fsync(self.fd))
    }

    pub fn datasync(&self) -> Pending<()> {
        self.fs
            .scheduler()
            .submit(self.fs.deferred_fdatasync(self.fd))
    }

    pub fn truncate(&self, len: Option<u64>) -> Pending<()> {
        self.fs
            .scheduler()
            .submit(self.fs.deferred_ftruncate(self.fd, len))
    }

    pub fn utimes(&self, atime: impl Into<TimeArg>, mtime: impl Into<TimeArg>) -> Pending<()> {
        self.fs
            .scheduler()
            .submit(self.fs.deferred_futimes(self.fd, atime, mtime))
    }

    pub fn read_file(&self, options: impl Into<ReadFileOptions>) -> Pending<Contents> {
        self.fs
            .scheduler()
            .submit(self.fs.deferred_read_file(self.fd, options))
    }

    pub fn write_file(
        &self,
        data: impl Into<Data>,
        options: impl Into<WriteFileOptions>,
    ) -> Pending<()> {
        self.fs
            .scheduler()
            .submit(self.fs.deferred_write_file(self.fd, data, options))
    }

    pub fn append_file(
        &self,
        data: impl Into<Data>,
        options: impl Into<AppendFileOptions>,
    ) -> Pending<()> {
        self.fs
            .scheduler()
            .submit(self.fs.deferred_append_file(self.fd, data, options))
    }

    /// Accepted and ignored.
    pub fn chown(&self, _uid: u32, _gid: u32) -> Pending<()> {
        Pending::ready(Ok(()))
    }

    /// Accepted and ignored.
    pub fn chmod(&self, _mode: u32) -> Pending<()> {
        Pending::ready(Ok(()))
    }

    /// Notify observers, then release the descriptor on the next turn.
    pub fn close(mut self) -> Pending<()> {
        self.released = true;
        debug!(fd = self.fd, path = %self.path, "Closing file handle");
        self.close_tx.send_replace(true);
        self.fs.scheduler().submit(self.fs.deferred_close(self.fd))
    }
}

impl<B: FsBinding> Drop for FileHandle<B> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        debug!(fd = self.fd, path = %self.path, "Closing dropped file handle");
        self.close_tx.send_replace(true);
        let (fd, path) = (self.fd, std::mem::take(&mut self.path));
        match self.fs.deferred_close(fd) {
            Ok(op) => self.fs.scheduler().defer_callback(op, move |result| {
                if let Err(err) = result {
                    warn!(fd, path = %path, error = %err, "Failed to close dropped file handle");
                }
            }),
            Err(err) => warn!(fd, path = %path, error = %err, "Dropped file handle has no descriptor"),
        }
    }
}

impl<B: FsBinding> std::fmt::Debug for FileHandle<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileHandle")
            .field("fd", &self.fd)
            .field("path", &self.path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::memory::MemoryBinding;
    use crate::config::FsConfig;

    fn handle(contents: &str) -> (NodeFs<MemoryBinding>, FileHandle<MemoryBinding>) {
        let fs = NodeFs::memory(FsConfig::default());
        fs.write_file_sync("/f", contents, WriteFileOptions::new())
            .unwrap();
        let fd = fs.open_sync("/f", "r+", None).unwrap();
        let handle = FileHandle::new(fs.clone(), fd, "/f".to_string());
        (fs, handle)
    }

    #[test]
    fn operations_wait_for_the_scheduler() {
        let (fs, handle) = handle("hello");
        let mut stat = handle.stat(StatOptions::new());
        assert!(stat.try_take().is_none());
        fs.scheduler().run_until_idle();
        let stats = stat.try_take().unwrap().unwrap();
        assert_eq!(stats.size(), 5);
    }

    #[test]
    fn close_notifies_before_release() {
        let (fs, handle) = handle("x");
        let mut closed = handle.on_close();
        assert!(!*closed.borrow());

        let mut pending = handle.close();
        assert!(closed.has_changed().unwrap());
        assert!(*closed.borrow_and_update());
        assert_eq!(fs.binding().open_descriptors(), 1);

        fs.scheduler().run_until_idle();
        pending.try_take().unwrap().unwrap();
        assert_eq!(fs.binding().open_descriptors(), 0);
    }

    #[test]
    fn dropping_an_open_handle_releases_the_descriptor() {
        let (fs, handle) = handle("x");
        drop(handle);
        assert_eq!(fs.binding().open_descriptors(), 1);
        fs.scheduler().run_until_idle();
        assert_eq!(fs.binding().open_descriptors(), 0);
    }

    #[test]
    fn chown_is_inert() {
        let (_fs, handle) = handle("x");
        let mut pending = handle.chown(0, 0);
        assert_eq!(pending.try_take(), Some(Ok(())));
    }

    #[tokio::test]
    async fn write_then_read_back() {
        let (fs, handle) = handle("");
        let written = handle.write(WriteRequest::new("abc").position(0u64));
        fs.scheduler().run_until_idle();
        assert_eq!(written.await.unwrap(), 3);

        let read = handle.read(vec![0; 3], ReadArgs::positional(0, 3, Position::At(0)));
        fs.scheduler().run_until_idle();
        let outcome = read.await.unwrap();
        assert_eq!(outcome.bytes_read, 3);
        assert_eq!(outcome.buffer, b"abc");

        let closing = handle.close();
        fs.scheduler().run_until_idle();
        closing.await.unwrap();
    }
}
