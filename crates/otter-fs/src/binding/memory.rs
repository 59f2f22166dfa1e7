//! In-memory binding.
//!
//! A deterministic tree for tests and embedders without a host filesystem.
//! Nodes live in an inode table so hard links share data; directory entries
//! are kept sorted, so listings come back in name order. Relative paths are
//! resolved from the root.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use tracing::debug;

use super::{
    DirCookie, Errno, Fd, FsBinding, Position, RawDirent, RawError, RawFileType, RawResult,
    RawStat, ReaddirPage,
};
use crate::config::FsConfig;
use crate::constants::{
    O_ACCMODE, O_APPEND, O_CREAT, O_EXCL, O_RDONLY, O_TRUNC, O_WRONLY, S_IFDIR, S_IFLNK, S_IFREG,
};

const ROOT: u64 = 1;
const DEV: u64 = 1;
const BLOCK_SIZE: u64 = 4096;
/// Largest file the tree will grow to.
const MAX_FILE_SIZE: usize = u32::MAX as usize;

#[derive(Debug, Clone)]
enum NodeKind {
    File(Vec<u8>),
    Directory(BTreeMap<String, u64>),
    Symlink(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    mode: u32,
    nlink: u64,
    atime_ms: i64,
    mtime_ms: i64,
    birthtime_ms: i64,
}

impl Node {
    fn new(kind: NodeKind, mode: u32) -> Self {
        let now = now_ms();
        Self {
            kind,
            mode: mode & 0o7777,
            nlink: 1,
            atime_ms: now,
            mtime_ms: now,
            birthtime_ms: now,
        }
    }

    fn file_type(&self) -> RawFileType {
        match self.kind {
            NodeKind::File(_) => RawFileType::RegularFile,
            NodeKind::Directory(_) => RawFileType::Directory,
            NodeKind::Symlink(_) => RawFileType::SymbolicLink,
        }
    }

    fn touch(&mut self) {
        self.mtime_ms = now_ms();
    }
}

#[derive(Debug)]
struct OpenNode {
    ino: u64,
    flags: u32,
    cursor: u64,
    listing: Option<Vec<RawDirent>>,
}

#[derive(Debug)]
struct Tree {
    nodes: HashMap<u64, Node>,
    next_ino: u64,
    descriptors: HashMap<Fd, OpenNode>,
    next_fd: Fd,
}

/// Where a path lands: the node and its canonical absolute path.
struct Resolved {
    ino: u64,
    canonical: String,
}

/// In-memory [`FsBinding`].
#[derive(Debug)]
pub struct MemoryBinding {
    tree: RwLock<Tree>,
    page_size: usize,
    max_symlink_depth: usize,
}

impl Default for MemoryBinding {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBinding {
    pub fn new() -> Self {
        Self::with_config(&FsConfig::default())
    }

    pub fn with_config(config: &FsConfig) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(ROOT, Node::new(NodeKind::Directory(BTreeMap::new()), 0o755));
        Self {
            tree: RwLock::new(Tree {
                nodes,
                next_ino: ROOT + 1,
                descriptors: HashMap::new(),
                next_fd: 3,
            }),
            page_size: config.readdir_page_size.max(1),
            max_symlink_depth: config.max_symlink_depth,
        }
    }

    pub fn open_descriptors(&self) -> usize {
        self.tree.read().descriptors.len()
    }

    fn resolve(&self, tree: &Tree, path: &str, follow_last: bool) -> RawResult<Resolved> {
        let mut stack: Vec<(u64, String)> = vec![(ROOT, String::new())];
        let mut pending: VecDeque<String> = components(path);
        let mut hops = 0;

        while let Some(name) = pending.pop_front() {
            if name == ".." {
                if stack.len() > 1 {
                    stack.pop();
                }
                continue;
            }
            let dir = stack.last().map_or(ROOT, |(ino, _)| *ino);
            let ino = match &tree.node(dir)?.kind {
                NodeKind::Directory(children) => *children.get(&name).ok_or(Errno::Noent)?,
                _ => return Err(Errno::Notdir.into()),
            };
            if let NodeKind::Symlink(target) = &tree.node(ino)?.kind {
                if !pending.is_empty() || follow_last {
                    hops += 1;
                    if hops > self.max_symlink_depth {
                        return Err(Errno::Loop.into());
                    }
                    if target.starts_with('/') {
                        stack.truncate(1);
                    }
                    let mut spliced = components(target);
                    spliced.extend(pending.drain(..));
                    pending = spliced;
                    continue;
                }
            }
            stack.push((ino, name));
        }

        let canonical = if stack.len() == 1 {
            "/".to_string()
        } else {
            stack
                .iter()
                .skip(1)
                .map(|(_, name)| format!("/{name}"))
                .collect()
        };
        Ok(Resolved {
            ino: stack.last().map_or(ROOT, |(ino, _)| *ino),
            canonical,
        })
    }

    /// Resolve the directory that holds the final component of `path`.
    fn locate_parent(&self, tree: &Tree, path: &str) -> RawResult<(Resolved, String)> {
        let mut parts = components(path);
        let name = parts.pop_back().ok_or(Errno::Exist)?;
        if name == ".." {
            return Err(Errno::Exist.into());
        }
        let parent_path: Vec<String> = parts.into_iter().collect();
        let parent = self.resolve(tree, &format!("/{}", parent_path.join("/")), true)?;
        match tree.node(parent.ino)?.kind {
            NodeKind::Directory(_) => Ok((parent, name)),
            _ => Err(Errno::Notdir.into()),
        }
    }

    fn resolve_parent(&self, tree: &Tree, path: &str) -> RawResult<(u64, String)> {
        self.locate_parent(tree, path)
            .map(|(parent, name)| (parent.ino, name))
    }

    fn mkdir_one(&self, tree: &mut Tree, path: &str, mode: u32) -> RawResult<()> {
        let (parent, name) = self.resolve_parent(tree, path)?;
        if tree.child(parent, &name)?.is_some() {
            return Err(Errno::Exist.into());
        }
        tree.insert(parent, name, Node::new(NodeKind::Directory(BTreeMap::new()), mode))
            .map(|_| ())
    }

    fn with_open<T>(
        &self,
        fd: Fd,
        f: impl FnOnce(&mut Tree, OpenNodeRef) -> RawResult<T>,
    ) -> RawResult<T> {
        let mut tree = self.tree.write();
        let open = tree.descriptors.get(&fd).ok_or(Errno::Badf)?;
        let handle = OpenNodeRef {
            fd,
            ino: open.ino,
            flags: open.flags,
            cursor: open.cursor,
        };
        f(&mut tree, handle)
    }
}

#[derive(Clone, Copy)]
struct OpenNodeRef {
    fd: Fd,
    ino: u64,
    flags: u32,
    cursor: u64,
}

impl OpenNodeRef {
    fn readable(&self) -> bool {
        self.flags & O_ACCMODE != O_WRONLY
    }

    fn writable(&self) -> bool {
        self.flags & O_ACCMODE != O_RDONLY
    }
}

impl Tree {
    fn node(&self, ino: u64) -> RawResult<&Node> {
        self.nodes.get(&ino).ok_or_else(|| Errno::Noent.into())
    }

    fn node_mut(&mut self, ino: u64) -> RawResult<&mut Node> {
        self.nodes.get_mut(&ino).ok_or_else(|| Errno::Noent.into())
    }

    fn child(&self, dir: u64, name: &str) -> RawResult<Option<u64>> {
        match &self.node(dir)?.kind {
            NodeKind::Directory(children) => Ok(children.get(name).copied()),
            _ => Err(Errno::Notdir.into()),
        }
    }

    fn children_mut(&mut self, dir: u64) -> RawResult<&mut BTreeMap<String, u64>> {
        match &mut self.node_mut(dir)?.kind {
            NodeKind::Directory(children) => Ok(children),
            _ => Err(Errno::Notdir.into()),
        }
    }

    fn insert(&mut self, parent: u64, name: String, node: Node) -> RawResult<u64> {
        let ino = self.next_ino;
        self.next_ino += 1;
        self.nodes.insert(ino, node);
        self.children_mut(parent)?.insert(name, ino);
        self.node_mut(parent)?.touch();
        Ok(ino)
    }

    /// Unlink `name` from `parent`, freeing the node once no link remains.
    fn unlink(&mut self, parent: u64, name: &str) -> RawResult<()> {
        let ino = self.children_mut(parent)?.remove(name).ok_or(Errno::Noent)?;
        self.node_mut(parent)?.touch();
        self.release(ino);
        Ok(())
    }

    fn release(&mut self, ino: u64) {
        let Some(node) = self.nodes.get_mut(&ino) else {
            return;
        };
        node.nlink = node.nlink.saturating_sub(1);
        if node.nlink > 0 {
            return;
        }
        if let Some(Node {
            kind: NodeKind::Directory(children),
            ..
        }) = self.nodes.remove(&ino)
        {
            for child in children.into_values() {
                self.release(child);
            }
        }
    }

    fn stat(&self, ino: u64) -> RawResult<RawStat> {
        let node = self.node(ino)?;
        let (type_bits, size) = match &node.kind {
            NodeKind::File(data) => (S_IFREG, data.len() as u64),
            NodeKind::Directory(_) => (S_IFDIR, BLOCK_SIZE),
            NodeKind::Symlink(target) => (S_IFLNK, target.len() as u64),
        };
        Ok(RawStat {
            dev: Some(DEV),
            ino: Some(ino),
            mode: Some(type_bits | node.mode),
            nlink: Some(node.nlink),
            uid: Some(0),
            gid: Some(0),
            rdev: Some(0),
            size: Some(size),
            blksize: Some(BLOCK_SIZE),
            blocks: Some(size.div_ceil(512)),
            atime_ms: Some(node.atime_ms),
            mtime_ms: Some(node.mtime_ms),
            birthtime_ms: Some(node.birthtime_ms),
            file_type: node.file_type(),
        })
    }

    fn listing(&self, ino: u64) -> RawResult<Vec<RawDirent>> {
        let NodeKind::Directory(children) = &self.node(ino)?.kind else {
            return Err(Errno::Notdir.into());
        };
        let mut entries = vec![
            RawDirent::new(".", RawFileType::Directory),
            RawDirent::new("..", RawFileType::Directory),
        ];
        for (name, child) in children {
            entries.push(RawDirent::new(name.clone(), self.node(*child)?.file_type()));
        }
        Ok(entries)
    }

    fn is_empty_dir(&self, ino: u64) -> RawResult<bool> {
        match &self.node(ino)?.kind {
            NodeKind::Directory(children) => Ok(children.is_empty()),
            _ => Err(Errno::Notdir.into()),
        }
    }
}

impl FsBinding for MemoryBinding {
    fn stat(&self, path: &str) -> RawResult<RawStat> {
        let tree = self.tree.read();
        let resolved = self.resolve(&tree, path, true)?;
        tree.stat(resolved.ino)
    }

    fn lstat(&self, path: &str) -> RawResult<RawStat> {
        let tree = self.tree.read();
        let resolved = self.resolve(&tree, path, false)?;
        tree.stat(resolved.ino)
    }

    fn fstat(&self, fd: Fd) -> RawResult<RawStat> {
        self.with_open(fd, |tree, open| tree.stat(open.ino))
    }

    fn mkdir(&self, path: &str, recursive: bool, mode: u32) -> RawResult<()> {
        let mut tree = self.tree.write();
        if !recursive {
            return self.mkdir_one(&mut tree, path, mode);
        }
        let normalized = crate::path::normalize(&format!("/{path}"));
        let prefixes = crate::path::prefixes(&normalized);
        let last = prefixes.len().saturating_sub(1);
        for (idx, prefix) in prefixes.iter().enumerate() {
            match self.resolve(&tree, prefix, true) {
                Ok(existing) => match tree.node(existing.ino)?.kind {
                    NodeKind::Directory(_) => continue,
                    _ if idx == last => return Err(Errno::Exist.into()),
                    _ => return Err(Errno::Notdir.into()),
                },
                Err(err) if err.errno == Errno::Noent => self.mkdir_one(&mut tree, prefix, mode)?,
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    fn rmdir(&self, path: &str, recursive: bool) -> RawResult<()> {
        let mut tree = self.tree.write();
        let target = self.resolve(&tree, path, false)?;
        if target.ino == ROOT {
            return Err(Errno::Busy.into());
        }
        if !recursive && !tree.is_empty_dir(target.ino)? {
            return Err(Errno::Notempty.into());
        }
        if !matches!(tree.node(target.ino)?.kind, NodeKind::Directory(_)) {
            return Err(Errno::Notdir.into());
        }
        let (parent, name) = self.resolve_parent(&tree, path)?;
        tree.unlink(parent, &name)
    }

    fn rm(&self, path: &str, recursive: bool, force: bool) -> RawResult<()> {
        let mut tree = self.tree.write();
        let target = match self.resolve(&tree, path, false) {
            Ok(target) => target,
            Err(err) if force && err.errno == Errno::Noent => return Ok(()),
            Err(err) => return Err(err),
        };
        if target.ino == ROOT {
            return Err(Errno::Busy.into());
        }
        if matches!(tree.node(target.ino)?.kind, NodeKind::Directory(_)) && !recursive {
            return Err(RawError::new(
                Errno::Isdir,
                format!("Path is a directory: rm returned EISDIR (is a directory) {path}"),
            ));
        }
        let (parent, name) = self.resolve_parent(&tree, path)?;
        tree.unlink(parent, &name)
    }

    fn rename(&self, from: &str, to: &str) -> RawResult<()> {
        let mut tree = self.tree.write();
        let source = self.resolve(&tree, from, false)?;
        let (from_parent, from_name) = self.resolve_parent(&tree, from)?;
        let (dest_dir, to_name) = self.locate_parent(&tree, to)?;
        let to_parent = dest_dir.ino;
        let source_is_dir = matches!(tree.node(source.ino)?.kind, NodeKind::Directory(_));

        if source_is_dir {
            let inside = dest_dir.canonical == source.canonical
                || dest_dir
                    .canonical
                    .starts_with(&format!("{}/", source.canonical));
            if inside {
                return Err(Errno::Inval.into());
            }
        }

        if let Some(existing) = tree.child(to_parent, &to_name)? {
            if existing == source.ino {
                return Ok(());
            }
            match (&tree.node(existing)?.kind, source_is_dir) {
                (NodeKind::Directory(children), true) if !children.is_empty() => {
                    return Err(Errno::Notempty.into());
                }
                (NodeKind::Directory(_), false) => return Err(Errno::Isdir.into()),
                (NodeKind::File(_) | NodeKind::Symlink(_), true) => {
                    return Err(Errno::Notdir.into());
                }
                _ => {}
            }
            tree.unlink(to_parent, &to_name)?;
        }

        let ino = tree
            .children_mut(from_parent)?
            .remove(&from_name)
            .ok_or(Errno::Noent)?;
        tree.children_mut(to_parent)?.insert(to_name, ino);
        tree.node_mut(from_parent)?.touch();
        tree.node_mut(to_parent)?.touch();
        Ok(())
    }

    fn truncate(&self, path: &str, len: u64) -> RawResult<()> {
        let mut tree = self.tree.write();
        let target = self.resolve(&tree, path, true)?;
        truncate_node(tree.node_mut(target.ino)?, len)
    }

    fn ftruncate(&self, fd: Fd, len: u64) -> RawResult<()> {
        self.with_open(fd, |tree, open| {
            if !open.writable() {
                return Err(Errno::Inval.into());
            }
            truncate_node(tree.node_mut(open.ino)?, len)
        })
    }

    fn realpath(&self, path: &str) -> RawResult<String> {
        let tree = self.tree.read();
        self.resolve(&tree, path, true).map(|r| r.canonical)
    }

    fn copy_file(&self, src: &str, dst: &str) -> RawResult<()> {
        let mut tree = self.tree.write();
        let source = self.resolve(&tree, src, true)?;
        let (data, mode) = match &tree.node(source.ino)?.kind {
            NodeKind::File(data) => (data.clone(), tree.node(source.ino)?.mode),
            NodeKind::Directory(_) => return Err(Errno::Isdir.into()),
            NodeKind::Symlink(_) => return Err(Errno::Inval.into()),
        };
        match self.resolve(&tree, dst, true) {
            Ok(dest) => {
                let node = tree.node_mut(dest.ino)?;
                match &mut node.kind {
                    NodeKind::File(existing) => *existing = data,
                    _ => return Err(Errno::Isdir.into()),
                }
                node.touch();
                Ok(())
            }
            Err(err) if err.errno == Errno::Noent => {
                let (parent, name) = self.resolve_parent(&tree, dst)?;
                tree.insert(parent, name, Node::new(NodeKind::File(data), mode))
                    .map(|_| ())
            }
            Err(err) => Err(err),
        }
    }

    fn link(&self, existing: &str, new_path: &str) -> RawResult<()> {
        let mut tree = self.tree.write();
        let source = self.resolve(&tree, existing, false)?;
        if matches!(tree.node(source.ino)?.kind, NodeKind::Directory(_)) {
            return Err(Errno::Perm.into());
        }
        let (parent, name) = self.resolve_parent(&tree, new_path)?;
        if tree.child(parent, &name)?.is_some() {
            return Err(Errno::Exist.into());
        }
        tree.children_mut(parent)?.insert(name, source.ino);
        tree.node_mut(source.ino)?.nlink += 1;
        Ok(())
    }

    fn symlink(&self, target: &str, path: &str) -> RawResult<()> {
        let mut tree = self.tree.write();
        let (parent, name) = self.resolve_parent(&tree, path)?;
        if tree.child(parent, &name)?.is_some() {
            return Err(Errno::Exist.into());
        }
        tree.insert(
            parent,
            name,
            Node::new(NodeKind::Symlink(target.to_string()), 0o777),
        )
        .map(|_| ())
    }

    fn open(&self, path: &str, flags: u32, mode: u32) -> RawResult<Fd> {
        let mut tree = self.tree.write();
        let ino = match self.resolve(&tree, path, true) {
            Ok(_) if flags & O_CREAT != 0 && flags & O_EXCL != 0 => {
                return Err(Errno::Exist.into());
            }
            Ok(resolved) => resolved.ino,
            Err(err) if err.errno == Errno::Noent && flags & O_CREAT != 0 => {
                let (parent, name) = self.resolve_parent(&tree, path)?;
                tree.insert(parent, name, Node::new(NodeKind::File(Vec::new()), mode))?
            }
            Err(err) => return Err(err),
        };

        let node = tree.node_mut(ino)?;
        if matches!(node.kind, NodeKind::Directory(_)) && flags & O_ACCMODE != O_RDONLY {
            return Err(Errno::Isdir.into());
        }
        if flags & O_TRUNC != 0 {
            if let NodeKind::File(data) = &mut node.kind {
                data.clear();
                node.touch();
            }
        }

        let fd = tree.next_fd;
        tree.next_fd += 1;
        tree.descriptors.insert(
            fd,
            OpenNode {
                ino,
                flags,
                cursor: 0,
                listing: None,
            },
        );
        debug!(fd, path, flags, "opened memory descriptor");
        Ok(fd)
    }

    fn close(&self, fd: Fd) -> RawResult<()> {
        let mut tree = self.tree.write();
        tree.descriptors.remove(&fd).ok_or(Errno::Badf)?;
        debug!(fd, "closed memory descriptor");
        Ok(())
    }

    fn fsync(&self, fd: Fd) -> RawResult<()> {
        self.with_open(fd, |_, _| Ok(()))
    }

    fn fdatasync(&self, fd: Fd) -> RawResult<()> {
        self.with_open(fd, |_, _| Ok(()))
    }

    fn read(&self, fd: Fd, position: Position, length: usize) -> RawResult<Vec<u8>> {
        self.with_open(fd, |tree, open| {
            if !open.readable() {
                return Err(Errno::Badf.into());
            }
            let offset = match position {
                Position::Current => open.cursor,
                Position::At(offset) => offset,
            };
            let node = tree.node_mut(open.ino)?;
            let NodeKind::File(data) = &node.kind else {
                return Err(Errno::Isdir.into());
            };
            let start = usize::try_from(offset).map_err(|_| Errno::Inval)?.min(data.len());
            let end = start.saturating_add(length).min(data.len());
            let bytes = data[start..end].to_vec();
            node.atime_ms = now_ms();
            if position == Position::Current {
                advance(tree, open.fd, bytes.len());
            }
            Ok(bytes)
        })
    }

    fn write(&self, fd: Fd, position: Position, bytes: &[u8]) -> RawResult<usize> {
        self.with_open(fd, |tree, open| {
            if !open.writable() {
                return Err(Errno::Badf.into());
            }
            let node = tree.node_mut(open.ino)?;
            let NodeKind::File(data) = &mut node.kind else {
                return Err(Errno::Isdir.into());
            };
            let offset = if open.flags & O_APPEND != 0 {
                data.len()
            } else {
                let offset = match position {
                    Position::Current => open.cursor,
                    Position::At(offset) => offset,
                };
                usize::try_from(offset).map_err(|_| Errno::Fbig)?
            };
            let end = file_extent(offset, bytes.len())?;
            if data.len() < end {
                data.resize(end, 0);
            }
            data[offset..end].copy_from_slice(bytes);
            node.touch();
            if position == Position::Current {
                set_cursor(tree, open.fd, end as u64);
            }
            Ok(bytes.len())
        })
    }

    fn readlink(&self, path: &str) -> RawResult<String> {
        let tree = self.tree.read();
        let resolved = self.resolve(&tree, path, false)?;
        match &tree.node(resolved.ino)?.kind {
            NodeKind::Symlink(target) => Ok(target.clone()),
            _ => Err(Errno::Inval.into()),
        }
    }

    fn readdir(&self, fd: Fd, cookie: DirCookie) -> RawResult<ReaddirPage> {
        let mut tree = self.tree.write();
        let ino = tree.descriptors.get(&fd).ok_or(Errno::Badf)?.ino;
        let fresh = if cookie == DirCookie::START {
            Some(tree.listing(ino)?)
        } else {
            None
        };
        let open = tree.descriptors.get_mut(&fd).ok_or(Errno::Badf)?;
        if let Some(listing) = fresh {
            open.listing = Some(listing);
        }
        let listing = open.listing.as_deref().ok_or(Errno::Inval)?;

        let start = usize::try_from(cookie.0).map_err(|_| Errno::Inval)?.min(listing.len());
        let end = start.saturating_add(self.page_size).min(listing.len());
        let page = ReaddirPage {
            entries: listing[start..end].to_vec(),
            cookie: DirCookie(end as u64),
            finished: end >= listing.len(),
        };
        debug!(fd, count = page.entries.len(), finished = page.finished, "memory readdir page");
        Ok(page)
    }

    fn utime(&self, path: &str, atime_ms: f64, mtime_ms: f64) -> RawResult<()> {
        let mut tree = self.tree.write();
        let resolved = self.resolve(&tree, path, true)?;
        set_times(tree.node_mut(resolved.ino)?, atime_ms, mtime_ms);
        Ok(())
    }

    fn futime(&self, fd: Fd, atime_ms: f64, mtime_ms: f64) -> RawResult<()> {
        self.with_open(fd, |tree, open| {
            set_times(tree.node_mut(open.ino)?, atime_ms, mtime_ms);
            Ok(())
        })
    }
}

fn components(path: &str) -> VecDeque<String> {
    path.split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .map(str::to_string)
        .collect()
}

/// End offset of `len` bytes written at `offset`, within [`MAX_FILE_SIZE`].
fn file_extent(offset: usize, len: usize) -> RawResult<usize> {
    offset
        .checked_add(len)
        .filter(|end| *end <= MAX_FILE_SIZE)
        .ok_or_else(|| Errno::Fbig.into())
}

fn truncate_node(node: &mut Node, len: u64) -> RawResult<()> {
    let NodeKind::File(data) = &mut node.kind else {
        return Err(Errno::Isdir.into());
    };
    let len = usize::try_from(len).map_err(|_| Errno::Fbig)?;
    data.resize(file_extent(len, 0)?, 0);
    node.touch();
    Ok(())
}

fn advance(tree: &mut Tree, fd: Fd, by: usize) {
    if let Some(open) = tree.descriptors.get_mut(&fd) {
        open.cursor += by as u64;
    }
}

fn set_cursor(tree: &mut Tree, fd: Fd, to: u64) {
    if let Some(open) = tree.descriptors.get_mut(&fd) {
        open.cursor = to;
    }
}

fn set_times(node: &mut Node, atime_ms: f64, mtime_ms: f64) {
    node.atime_ms = atime_ms.round() as i64;
    node.mtime_ms = mtime_ms.round() as i64;
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
