use serde::{Deserialize, Serialize};

use crate::errors::{FsError, FsResult};

/// Tunables for the facade and the bundled bindings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FsConfig {
    /// Entries returned per paged directory read by the host binding.
    pub readdir_page_size: usize,

    /// Random characters appended by `mkdtemp`.
    pub mkdtemp_suffix_len: usize,

    /// Buffer size used by callback `read` when the caller supplies none.
    pub read_chunk_size: usize,

    /// Symlink hops the memory binding follows before failing with ELOOP.
    pub max_symlink_depth: usize,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            readdir_page_size: 32,
            mkdtemp_suffix_len: 6,
            read_chunk_size: 16 * 1024,
            max_symlink_depth: 40,
        }
    }
}

impl FsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON config; missing keys keep their defaults.
    pub fn from_json(source: &str) -> FsResult<Self> {
        serde_json::from_str(source).map_err(|e| FsError::Internal(format!("invalid fs config: {e}")))
    }

    pub fn readdir_page_size(mut self, size: usize) -> Self {
        self.readdir_page_size = size.max(1);
        self
    }

    pub fn mkdtemp_suffix_len(mut self, len: usize) -> Self {
        self.mkdtemp_suffix_len = len;
        self
    }

    pub fn read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size;
        self
    }

    pub fn max_symlink_depth(mut self, depth: usize) -> Self {
        self.max_symlink_depth = depth;
        self
    }
}
