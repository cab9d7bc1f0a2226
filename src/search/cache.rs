use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::Serialize;
use thiserror::Error;

use crate::board::Move;

/// Whether a stored answer was computed while maximizing or minimizing.
/// Part of the cache key: the same placement searched for opposite goals
/// must not share an entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Objective {
    Maximize,
    Minimize,
}

impl Objective {
    #[inline]
    pub fn flip(self) -> Objective {
        match self {
            Objective::Maximize => Objective::Minimize,
            Objective::Minimize => Objective::Maximize,
        }
    }

    /// True when `candidate` is strictly better than `incumbent` for this
    /// objective.
    #[inline]
    pub fn prefers(self, candidate: i32, incumbent: i32) -> bool {
        match self {
            Objective::Maximize => candidate > incumbent,
            Objective::Minimize => candidate < incumbent,
        }
    }

    /// Non-strict variant used during result aggregation.
    #[inline]
    pub fn accepts(self, candidate: i32, incumbent: i32) -> bool {
        match self {
            Objective::Maximize => candidate >= incumbent,
            Objective::Minimize => candidate <= incumbent,
        }
    }

    fn to_byte(self) -> u8 {
        match self {
            Objective::Maximize => 0,
            Objective::Minimize => 1,
        }
    }

    fn from_byte(b: u8) -> Option<Objective> {
        match b {
            0 => Some(Objective::Maximize),
            1 => Some(Objective::Minimize),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct CacheEntry {
    pub best: Move,
    pub value: i32,
    pub examined: u64,
}

#[derive(Clone, Copy, Debug, Default)]
struct RiskRecord {
    retries: u32,
    improved: u32,
}

/// Point-in-time view of the global counters.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct CacheStats {
    pub offers: u64,
    pub hits: u64,
    pub misses: u64,
    pub replacements: u64,
    pub len: u64,
    pub high_water: u64,
}

#[derive(Default)]
struct Bucket {
    entries: HashMap<(String, Objective), CacheEntry>,
    risks: HashMap<String, RiskRecord>,
}

const BUCKET_COUNT: usize = 64;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot magic mismatch")]
    BadMagic,
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u16),
    #[error("snapshot truncated at byte {0}")]
    Truncated(usize),
    #[error("invalid objective byte {0}")]
    BadObjective(u8),
    #[error("fingerprint is not valid utf-8")]
    BadFingerprint,
}

const SNAPSHOT_MAGIC: &[u8; 4] = b"SBMC";
const SNAPSHOT_VERSION: u16 = 1;

/// Shared memo store for search results, keyed by position fingerprint and
/// objective. Entries live in hash-selected mutex buckets (fine-grained
/// locking, never unguarded); the global counters are atomics.
///
/// A per-fingerprint risk record tracks how often re-searching a cached
/// position found something better; [`MoveCache::risk`] turns it into the
/// trust signal the engine gates reuse on.
pub struct MoveCache {
    buckets: Vec<Mutex<Bucket>>,
    offers: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    replacements: AtomicU64,
    len: AtomicU64,
    high_water: AtomicU64,
}

impl Default for MoveCache {
    fn default() -> Self {
        MoveCache::new()
    }
}

impl MoveCache {
    pub fn new() -> MoveCache {
        let mut buckets = Vec::with_capacity(BUCKET_COUNT);
        buckets.resize_with(BUCKET_COUNT, || Mutex::new(Bucket::default()));
        MoveCache {
            buckets,
            offers: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            replacements: AtomicU64::new(0),
            len: AtomicU64::new(0),
            high_water: AtomicU64::new(0),
        }
    }

    fn bucket(&self, fingerprint: &str) -> &Mutex<Bucket> {
        let mut h = DefaultHasher::new();
        fingerprint.hash(&mut h);
        &self.buckets[(h.finish() as usize) % BUCKET_COUNT]
    }

    pub fn lookup(&self, fingerprint: &str, objective: Objective) -> Option<CacheEntry> {
        let guard = self.bucket(fingerprint).lock().unwrap();
        let found = guard
            .entries
            .get(&(fingerprint.to_string(), objective))
            .copied();
        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    /// Inserts, or replaces an existing entry only when `value` is strictly
    /// better for `objective`. The examined count accumulates across
    /// replacements so it keeps measuring total effort spent on the key.
    pub fn offer(
        &self,
        fingerprint: &str,
        objective: Objective,
        best: Move,
        value: i32,
        examined: u64,
    ) {
        self.offers.fetch_add(1, Ordering::Relaxed);
        let mut guard = self.bucket(fingerprint).lock().unwrap();
        match guard.entries.get_mut(&(fingerprint.to_string(), objective)) {
            Some(cur) => {
                if objective.prefers(value, cur.value) {
                    *cur = CacheEntry { best, value, examined: cur.examined + examined };
                    self.replacements.fetch_add(1, Ordering::Relaxed);
                }
            }
            None => {
                guard
                    .entries
                    .insert((fingerprint.to_string(), objective), CacheEntry {
                        best,
                        value,
                        examined,
                    });
                let len = self.len.fetch_add(1, Ordering::Relaxed) + 1;
                self.high_water.fetch_max(len, Ordering::Relaxed);
            }
        }
    }

    /// Probability in [0, 1] that re-searching this position improves on
    /// the cached answer: 1.0 until the first recheck, then the observed
    /// improvement ratio.
    pub fn risk(&self, fingerprint: &str) -> f64 {
        let guard = self.bucket(fingerprint).lock().unwrap();
        match guard.risks.get(fingerprint) {
            None => 1.0,
            Some(r) if r.retries == 0 => 1.0,
            Some(r) => f64::from(r.improved) / f64::from(r.retries),
        }
    }

    pub fn record_retry(&self, fingerprint: &str) {
        let mut guard = self.bucket(fingerprint).lock().unwrap();
        guard.risks.entry(fingerprint.to_string()).or_default().retries += 1;
    }

    pub fn record_improvement(&self, fingerprint: &str) {
        let mut guard = self.bucket(fingerprint).lock().unwrap();
        guard.risks.entry(fingerprint.to_string()).or_default().improved += 1;
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        for bucket in &self.buckets {
            let mut guard = bucket.lock().unwrap();
            guard.entries.clear();
            guard.risks.clear();
        }
        self.len.store(0, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            offers: self.offers.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            replacements: self.replacements.load(Ordering::Relaxed),
            len: self.len.load(Ordering::Relaxed),
            high_water: self.high_water.load(Ordering::Relaxed),
        }
    }

    // ---- snapshot ------------------------------------------------------

    /// Serializes every entry and risk record into the versioned
    /// little-endian layout below. Independent of any in-memory layout.
    ///
    /// ```text
    /// magic "SBMC" | u16 version | u32 entry count
    ///   per entry: u16 fp len | fp bytes | u8 objective
    ///            | u8 from | u8 to | i32 move value
    ///            | i32 value | u64 examined
    /// u32 risk count
    ///   per record: u16 fp len | fp bytes | u32 retries | u32 improved
    /// ```
    pub fn export_snapshot(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(SNAPSHOT_MAGIC);
        out.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());

        let mut entries: Vec<((String, Objective), CacheEntry)> = Vec::new();
        let mut risks: Vec<(String, RiskRecord)> = Vec::new();
        for bucket in &self.buckets {
            let guard = bucket.lock().unwrap();
            entries.extend(guard.entries.iter().map(|(k, v)| (k.clone(), *v)));
            risks.extend(guard.risks.iter().map(|(k, v)| (k.clone(), *v)));
        }

        out.extend_from_slice(&(entries.len() as u32).to_le_bytes());
        for ((fp, objective), entry) in entries {
            write_str(&mut out, &fp);
            out.push(objective.to_byte());
            out.push(entry.best.from);
            out.push(entry.best.to);
            out.extend_from_slice(&entry.best.value.to_le_bytes());
            out.extend_from_slice(&entry.value.to_le_bytes());
            out.extend_from_slice(&entry.examined.to_le_bytes());
        }

        out.extend_from_slice(&(risks.len() as u32).to_le_bytes());
        for (fp, record) in risks {
            write_str(&mut out, &fp);
            out.extend_from_slice(&record.retries.to_le_bytes());
            out.extend_from_slice(&record.improved.to_le_bytes());
        }
        out
    }

    /// Merges a snapshot into the live cache through the normal `offer`
    /// path, so better live answers survive the import. Returns the number
    /// of entries read.
    pub fn import_snapshot(&self, bytes: &[u8]) -> Result<usize, SnapshotError> {
        let mut r = Reader { buf: bytes, pos: 0 };
        if r.take(4)? != SNAPSHOT_MAGIC {
            return Err(SnapshotError::BadMagic);
        }
        let version = r.u16()?;
        if version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(version));
        }

        let entry_count = r.u32()? as usize;
        for _ in 0..entry_count {
            let fp = r.string()?;
            let objective_byte = r.u8()?;
            let objective = Objective::from_byte(objective_byte)
                .ok_or(SnapshotError::BadObjective(objective_byte))?;
            let from = r.u8()?;
            let to = r.u8()?;
            let move_value = r.i32()?;
            let value = r.i32()?;
            let examined = r.u64()?;
            self.offer(&fp, objective, Move::new(from, to, move_value), value, examined);
        }

        let risk_count = r.u32()? as usize;
        for _ in 0..risk_count {
            let fp = r.string()?;
            let retries = r.u32()?;
            let improved = r.u32()?;
            let mut guard = self.bucket(&fp).lock().unwrap();
            let record = guard.risks.entry(fp.clone()).or_default();
            record.retries += retries;
            record.improved += improved;
        }
        Ok(entry_count)
    }
}

fn write_str(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u16).to_le_bytes());
    out.extend_from_slice(s.as_bytes());
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], SnapshotError> {
        if self.pos + n > self.buf.len() {
            return Err(SnapshotError::Truncated(self.pos));
        }
        let s = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    fn u8(&mut self) -> Result<u8, SnapshotError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, SnapshotError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, SnapshotError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn i32(&mut self) -> Result<i32, SnapshotError> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64, SnapshotError> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
    }

    fn string(&mut self) -> Result<String, SnapshotError> {
        let len = self.u16()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| SnapshotError::BadFingerprint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offer_keeps_better_value_per_objective() {
        let cache = MoveCache::new();
        let mv = Move::quiet(0, 1);
        cache.offer("fp", Objective::Maximize, mv, 100, 10);
        cache.offer("fp", Objective::Maximize, mv, 50, 10);
        assert_eq!(cache.lookup("fp", Objective::Maximize).unwrap().value, 100);
        cache.offer("fp", Objective::Maximize, mv, 150, 10);
        let entry = cache.lookup("fp", Objective::Maximize).unwrap();
        assert_eq!(entry.value, 150);
        // Examined effort accumulates across the replacement.
        assert_eq!(entry.examined, 20);
    }

    #[test]
    fn risk_defaults_to_certain_recheck() {
        let cache = MoveCache::new();
        assert_eq!(cache.risk("unseen"), 1.0);
        cache.record_retry("unseen");
        cache.record_retry("unseen");
        cache.record_improvement("unseen");
        assert_eq!(cache.risk("unseen"), 0.5);
    }
}
