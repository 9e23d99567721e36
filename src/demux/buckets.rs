//! Per-region compressed read containers.
//!
//! Only a bounded number of gzip writers are open at once; when the bound is
//! reached the oldest writer is finished and reopened later in append mode,
//! which adds another gzip member to the same file.

use super::{BucketKey, ReadBucket};
use crate::bio::fastq::FastqWriter;
use crate::{RegionplexError, Result};
use indexmap::IndexMap;
use std::fs::File;
use std::path::PathBuf;

pub const DEFAULT_MAX_OPEN_BUCKETS: usize = 128;

pub struct BucketSet {
    targets: IndexMap<BucketKey, (PathBuf, u64)>,
    open: IndexMap<BucketKey, FastqWriter>,
    max_open: usize,
}

impl BucketSet {
    pub fn new(max_open: usize) -> Self {
        Self {
            targets: IndexMap::new(),
            open: IndexMap::new(),
            max_open: max_open.max(1),
        }
    }

    /// Register a bucket and create its container empty, truncating any
    /// container left by an earlier run.
    pub fn register(&mut self, key: BucketKey, path: PathBuf) -> Result<()> {
        File::create(&path)?;
        self.targets.insert(key, (path, 0));
        Ok(())
    }

    pub fn contains(&self, key: &BucketKey) -> bool {
        self.targets.contains_key(key)
    }

    pub fn write(&mut self, key: &BucketKey, name: &[u8], seq: &[u8], qual: &[u8]) -> Result<()> {
        let (path, count) = self.targets.get_mut(key).ok_or_else(|| {
            RegionplexError::Parse(format!("No read container registered for {}", key))
        })?;
        *count += 1;

        if !self.open.contains_key(key) {
            if self.open.len() >= self.max_open {
                if let Some((_, writer)) = self.open.shift_remove_index(0) {
                    writer.finish()?;
                }
            }
            let writer = FastqWriter::append(path)?;
            self.open.insert(key.clone(), writer);
        }

        match self.open.get_mut(key) {
            Some(writer) => writer.write_record(name, seq, qual),
            None => Err(RegionplexError::Parse(format!(
                "Read container for {} is not open",
                key
            ))),
        }
    }

    pub fn count(&self, key: &BucketKey) -> u64 {
        self.targets.get(key).map(|(_, n)| *n).unwrap_or(0)
    }

    /// Close every writer and report the buckets in registration order.
    pub fn finish(mut self) -> Result<Vec<ReadBucket>> {
        for (_, writer) in self.open.drain(..) {
            writer.finish()?;
        }
        Ok(self
            .targets
            .into_iter()
            .map(|(key, (path, reads))| ReadBucket { key, path, reads })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bio::fastq::count_records;
    use tempfile::TempDir;

    #[test]
    fn test_bounded_writers_keep_every_read() {
        let dir = TempDir::new().unwrap();
        let mut buckets = BucketSet::new(2);
        let keys: Vec<BucketKey> = (0..5)
            .map(|i| BucketKey::Amplicon(format!("amp{}", i)))
            .collect();
        for (i, key) in keys.iter().enumerate() {
            buckets
                .register(key.clone(), dir.path().join(format!("AMPL_amp{}.fastq.gz", i)))
                .unwrap();
        }

        // round-robin forces writers to be closed and reopened
        for round in 0..3 {
            for key in &keys[..4] {
                let name = format!("r{}", round);
                buckets.write(key, name.as_bytes(), b"ACGT", b"IIII").unwrap();
            }
        }

        let finished = buckets.finish().unwrap();
        assert_eq!(finished.len(), 5);
        for bucket in &finished[..4] {
            assert_eq!(bucket.reads, 3);
            assert_eq!(count_records(&bucket.path).unwrap(), 3);
        }
        assert_eq!(finished[4].reads, 0);
        assert!(finished[4].path.is_file());
        assert_eq!(count_records(&finished[4].path).unwrap(), 0);
    }

    #[test]
    fn test_unknown_bucket_is_rejected() {
        let mut buckets = BucketSet::new(4);
        let err = buckets
            .write(&BucketKey::Unassigned, b"r", b"A", b"I")
            .unwrap_err();
        assert!(err.to_string().contains("No read container"));
    }
}
