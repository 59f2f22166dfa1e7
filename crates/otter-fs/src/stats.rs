//! Metadata snapshots.
//!
//! One [`RawStat`] produces either a [`Stats`] (double-precision numbers) or a
//! [`BigIntStats`] (64-bit integers, nanosecond timestamps). The two paths are
//! kept separate so the integer form never passes through `f64`.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::binding::{RawFileType, RawStat, TypePredicates};

const NS_PER_MS: i128 = 1_000_000;

fn instant_from_ms(ms: i64) -> SystemTime {
    let offset = Duration::from_millis(ms.unsigned_abs());
    if ms >= 0 {
        UNIX_EPOCH + offset
    } else {
        UNIX_EPOCH - offset
    }
}

/// Standard-precision snapshot. `ctime` mirrors `mtime`; the binding has no
/// separate change time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    dev: Option<f64>,
    ino: Option<f64>,
    mode: Option<f64>,
    nlink: Option<f64>,
    uid: Option<f64>,
    gid: Option<f64>,
    rdev: Option<f64>,
    size: f64,
    blksize: Option<f64>,
    blocks: Option<f64>,
    atime_ms: Option<f64>,
    mtime_ms: Option<f64>,
    ctime_ms: Option<f64>,
    birthtime_ms: Option<f64>,
    #[serde(skip)]
    file_type: RawFileType,
}

impl Stats {
    pub fn from_raw(raw: &RawStat) -> Self {
        let num = |v: Option<u64>| v.map(|v| v as f64);
        let ms = |v: Option<i64>| v.map(|v| v as f64);
        Self {
            dev: num(raw.dev),
            ino: num(raw.ino),
            mode: raw.mode.map(f64::from),
            nlink: num(raw.nlink),
            uid: raw.uid.map(f64::from),
            gid: raw.gid.map(f64::from),
            rdev: num(raw.rdev),
            size: raw.size.unwrap_or(0) as f64,
            blksize: num(raw.blksize),
            blocks: num(raw.blocks),
            atime_ms: ms(raw.atime_ms),
            mtime_ms: ms(raw.mtime_ms),
            ctime_ms: ms(raw.mtime_ms),
            birthtime_ms: ms(raw.birthtime_ms),
            file_type: raw.file_type,
        }
    }

    pub fn dev(&self) -> Option<f64> {
        self.dev
    }
    pub fn ino(&self) -> Option<f64> {
        self.ino
    }
    pub fn mode(&self) -> Option<f64> {
        self.mode
    }
    pub fn nlink(&self) -> Option<f64> {
        self.nlink
    }
    pub fn uid(&self) -> Option<f64> {
        self.uid
    }
    pub fn gid(&self) -> Option<f64> {
        self.gid
    }
    pub fn rdev(&self) -> Option<f64> {
        self.rdev
    }
    pub fn size(&self) -> f64 {
        self.size
    }
    pub fn blksize(&self) -> Option<f64> {
        self.blksize
    }
    pub fn blocks(&self) -> Option<f64> {
        self.blocks
    }
    pub fn atime_ms(&self) -> Option<f64> {
        self.atime_ms
    }
    pub fn mtime_ms(&self) -> Option<f64> {
        self.mtime_ms
    }
    pub fn ctime_ms(&self) -> Option<f64> {
        self.ctime_ms
    }
    pub fn birthtime_ms(&self) -> Option<f64> {
        self.birthtime_ms
    }

    pub fn atime(&self) -> Option<SystemTime> {
        self.atime_ms.map(|ms| instant_from_ms(ms as i64))
    }
    pub fn mtime(&self) -> Option<SystemTime> {
        self.mtime_ms.map(|ms| instant_from_ms(ms as i64))
    }
    pub fn ctime(&self) -> Option<SystemTime> {
        self.ctime_ms.map(|ms| instant_from_ms(ms as i64))
    }
    pub fn birthtime(&self) -> Option<SystemTime> {
        self.birthtime_ms.map(|ms| instant_from_ms(ms as i64))
    }
}

impl TypePredicates for Stats {
    fn file_type(&self) -> RawFileType {
        self.file_type
    }
}

/// Arbitrary-precision snapshot. Nanosecond values are the millisecond values
/// scaled by 1,000,000.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BigIntStats {
    dev: Option<u64>,
    ino: Option<u64>,
    mode: Option<u64>,
    nlink: Option<u64>,
    uid: Option<u64>,
    gid: Option<u64>,
    rdev: Option<u64>,
    size: u64,
    blksize: Option<u64>,
    blocks: Option<u64>,
    atime_ms: Option<i64>,
    mtime_ms: Option<i64>,
    ctime_ms: Option<i64>,
    birthtime_ms: Option<i64>,
    #[serde(skip)]
    file_type: RawFileType,
}

impl BigIntStats {
    pub fn from_raw(raw: &RawStat) -> Self {
        Self {
            dev: raw.dev,
            ino: raw.ino,
            mode: raw.mode.map(u64::from),
            nlink: raw.nlink,
            uid: raw.uid.map(u64::from),
            gid: raw.gid.map(u64::from),
            rdev: raw.rdev,
            size: raw.size.unwrap_or(0),
            blksize: raw.blksize,
            blocks: raw.blocks,
            atime_ms: raw.atime_ms,
            mtime_ms: raw.mtime_ms,
            ctime_ms: raw.mtime_ms,
            birthtime_ms: raw.birthtime_ms,
            file_type: raw.file_type,
        }
    }

    pub fn dev(&self) -> Option<u64> {
        self.dev
    }
    pub fn ino(&self) -> Option<u64> {
        self.ino
    }
    pub fn mode(&self) -> Option<u64> {
        self.mode
    }
    pub fn nlink(&self) -> Option<u64> {
        self.nlink
    }
    pub fn uid(&self) -> Option<u64> {
        self.uid
    }
    pub fn gid(&self) -> Option<u64> {
        self.gid
    }
    pub fn rdev(&self) -> Option<u64> {
        self.rdev
    }
    pub fn size(&self) -> u64 {
        self.size
    }
    pub fn blksize(&self) -> Option<u64> {
        self.blksize
    }
    pub fn blocks(&self) -> Option<u64> {
        self.blocks
    }
    pub fn atime_ms(&self) -> Option<i64> {
        self.atime_ms
    }
    pub fn mtime_ms(&self) -> Option<i64> {
        self.mtime_ms
    }
    pub fn ctime_ms(&self) -> Option<i64> {
        self.ctime_ms
    }
    pub fn birthtime_ms(&self) -> Option<i64> {
        self.birthtime_ms
    }

    pub fn atime_ns(&self) -> Option<i128> {
        self.atime_ms.map(|ms| i128::from(ms) * NS_PER_MS)
    }
    pub fn mtime_ns(&self) -> Option<i128> {
        self.mtime_ms.map(|ms| i128::from(ms) * NS_PER_MS)
    }
    pub fn ctime_ns(&self) -> Option<i128> {
        self.ctime_ms.map(|ms| i128::from(ms) * NS_PER_MS)
    }
    pub fn birthtime_ns(&self) -> Option<i128> {
        self.birthtime_ms.map(|ms| i128::from(ms) * NS_PER_MS)
    }

    pub fn atime(&self) -> Option<SystemTime> {
        self.atime_ms.map(instant_from_ms)
    }
    pub fn mtime(&self) -> Option<SystemTime> {
        self.mtime_ms.map(instant_from_ms)
    }
    pub fn ctime(&self) -> Option<SystemTime> {
        self.ctime_ms.map(instant_from_ms)
    }
    pub fn birthtime(&self) -> Option<SystemTime> {
        self.birthtime_ms.map(instant_from_ms)
    }
}

impl TypePredicates for BigIntStats {
    fn file_type(&self) -> RawFileType {
        self.file_type
    }
}

/// Result of `stat`, `lstat` and `fstat` in the requested numeric domain.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StatsResult {
    Number(Stats),
    BigInt(BigIntStats),
}

impl StatsResult {
    pub(crate) fn from_raw(raw: &RawStat, bigint: bool) -> Self {
        if bigint {
            StatsResult::BigInt(BigIntStats::from_raw(raw))
        } else {
            StatsResult::Number(Stats::from_raw(raw))
        }
    }

    pub fn as_number(&self) -> Option<&Stats> {
        match self {
            StatsResult::Number(stats) => Some(stats),
            StatsResult::BigInt(_) => None,
        }
    }

    pub fn as_bigint(&self) -> Option<&BigIntStats> {
        match self {
            StatsResult::BigInt(stats) => Some(stats),
            StatsResult::Number(_) => None,
        }
    }

    pub fn mtime(&self) -> Option<SystemTime> {
        match self {
            StatsResult::Number(stats) => stats.mtime(),
            StatsResult::BigInt(stats) => stats.mtime(),
        }
    }

    /// Mode bits, whichever domain the snapshot is in.
    pub fn mode_bits(&self) -> Option<u32> {
        match self {
            StatsResult::Number(stats) => stats.mode().map(|m| m as u32),
            StatsResult::BigInt(stats) => stats.mode().map(|m| m as u32),
        }
    }

    pub fn size(&self) -> u64 {
        match self {
            StatsResult::Number(stats) => stats.size() as u64,
            StatsResult::BigInt(stats) => stats.size(),
        }
    }
}

impl TypePredicates for StatsResult {
    fn file_type(&self) -> RawFileType {
        match self {
            StatsResult::Number(stats) => stats.file_type(),
            StatsResult::BigInt(stats) => stats.file_type(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regular_file() -> RawStat {
        RawStat {
            dev: Some(66),
            ino: Some(u64::MAX - 7),
            mode: Some(0o100644),
            nlink: Some(1),
            uid: Some(501),
            gid: Some(20),
            rdev: None,
            size: Some(12),
            blksize: Some(4096),
            blocks: Some(8),
            atime_ms: Some(1_700_000_000_123),
            mtime_ms: Some(1_700_000_000_456),
            birthtime_ms: Some(1_600_000_000_000),
            file_type: RawFileType::RegularFile,
        }
    }

    #[test]
    fn both_domains_agree_on_instants_and_predicates() {
        let raw = regular_file();
        let number = Stats::from_raw(&raw);
        let bigint = BigIntStats::from_raw(&raw);

        assert_eq!(number.mtime(), bigint.mtime());
        assert_eq!(number.atime(), bigint.atime());
        assert_eq!(number.birthtime(), bigint.birthtime());
        assert_eq!(number.ctime(), number.mtime());

        for (file, dir, link, block, chr, sock, fifo) in [
            (
                number.is_file(),
                number.is_directory(),
                number.is_symbolic_link(),
                number.is_block_device(),
                number.is_character_device(),
                number.is_socket(),
                number.is_fifo(),
            ),
            (
                bigint.is_file(),
                bigint.is_directory(),
                bigint.is_symbolic_link(),
                bigint.is_block_device(),
                bigint.is_character_device(),
                bigint.is_socket(),
                bigint.is_fifo(),
            ),
        ] {
            assert!(file);
            assert!(!(dir || link || block || chr || sock || fifo));
        }
    }

    #[test]
    fn bigint_keeps_full_64_bit_precision() {
        let raw = regular_file();
        let bigint = BigIntStats::from_raw(&raw);
        assert_eq!(bigint.ino(), Some(u64::MAX - 7));
        assert_eq!(bigint.mtime_ns(), Some(1_700_000_000_456 * 1_000_000));

        let number = Stats::from_raw(&raw);
        assert_ne!(number.ino().map(|v| v as u64), Some(u64::MAX - 7));
    }

    #[test]
    fn absent_fields_become_none_and_size_defaults_to_zero() {
        let raw = RawStat {
            file_type: RawFileType::Directory,
            ..RawStat::default()
        };
        let number = Stats::from_raw(&raw);
        assert_eq!(number.size(), 0.0);
        assert_eq!(number.dev(), None);
        assert_eq!(number.mtime(), None);
        assert!(number.is_directory());

        let bigint = BigIntStats::from_raw(&raw);
        assert_eq!(bigint.size(), 0);
        assert_eq!(bigint.atime_ns(), None);
    }

    #[test]
    fn pre_epoch_timestamps_stay_before_epoch() {
        let raw = RawStat {
            mtime_ms: Some(-1_000),
            ..RawStat::default()
        };
        let stats = BigIntStats::from_raw(&raw);
        assert_eq!(stats.mtime(), Some(UNIX_EPOCH - Duration::from_secs(1)));
        assert_eq!(stats.mtime_ns(), Some(-1_000_000_000));
    }

    #[test]
    fn serializes_with_node_field_names() {
        let value = serde_json::to_value(Stats::from_raw(&regular_file())).expect("serialize");
        assert_eq!(value["size"], 12.0);
        assert_eq!(value["mtimeMs"], 1_700_000_000_456.0);
        assert!(value["rdev"].is_null());
    }
}
