//! Index over many labelled k-mer sets, one per candidate genome.
//!
//! Build fills a fixed-size open-addressed slot table mapping hashed k-mers
//! to 1-based collection ids; slots claimed by two different keys are
//! evicted to [`COLLISION`]. After all collections are read the table is
//! compacted so surviving slots point into a dense array of per-key hit
//! counters. Scanning then costs one hash, one slot load and one key
//! comparison per k-mer.
//!
//! At the default table length of 2^30 slots the table alone needs ~4 GiB;
//! that is the documented memory floor for collection scanning.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::Serialize;
use tracing::{info, warn};

use crate::codec;
use crate::config::Config;
use crate::error::ScanError;
use crate::fasta::open_fasta;

/// Slot marker for keys evicted by a conflicting claim.
pub const COLLISION: u32 = 0xFFFF_FFFF;

fn slot_hash(key: u64, mask: u64) -> u64 {
    1_713_137_323u64
        .wrapping_mul(key)
        .wrapping_add((key >> 12).wrapping_mul(7_341_234_131))
        .wrapping_add((key >> 24).wrapping_mul(371_371_377))
        & mask
}

/// One unique key surviving the build, with its owner and hit counter.
#[derive(Debug)]
struct KcHit {
    key: u64,
    id: u32,
    hits: AtomicU32,
}

/// Aggregated scan result for one collection.
#[derive(Debug, Clone, Serialize)]
pub struct KcResult {
    pub name: String,
    pub hits: u64,
    pub coverage: f64,
    pub median_hit: u32,
    pub mean_hit: f64,
    pub kmer_count: u32,
    pub high_confidence: bool,
}

/// Collision-tolerant hash index over labelled k-mer sets.
#[derive(Debug)]
pub struct KmerCollectionIndex {
    k: usize,
    slots: Vec<u32>,
    slot_mask: u64,
    hits: Vec<KcHit>,
    names: Vec<String>,
    kmer_counts: Vec<u32>,
}

impl KmerCollectionIndex {
    /// Builds the index from a FASTA-shaped file where every sequence line
    /// holds exactly one k-mer literal.
    ///
    /// Blank lines and `#` comments are skipped. The first literal fixes
    /// `K` when `config.kmer_key_len` is 0; literals of any other length
    /// or with ambiguous bases are skipped with a warning.
    pub fn from_fasta(path: &Path, config: &mut Config) -> Result<Self, ScanError> {
        use std::io::BufRead;

        let reader = open_fasta(path)?;
        let origin = path.display().to_string();
        let mut builder = Builder::new(config, &origin);
        for line in reader.lines() {
            let line = line.map_err(|e| ScanError::io(e, path))?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.strip_prefix('>') {
                Some(header) => {
                    let name = header.split_whitespace().next().unwrap_or("");
                    builder.start_collection(name)?;
                }
                None => builder.add_literal(line.as_bytes())?,
            }
        }
        builder.finish(config)
    }

    /// Builds the index from in-memory `(name, k-mer literals)` records.
    pub fn from_records<N, S>(
        records: impl IntoIterator<Item = (N, Vec<S>)>,
        config: &mut Config,
        origin: &str,
    ) -> Result<Self, ScanError>
    where
        N: AsRef<str>,
        S: AsRef<[u8]>,
    {
        let mut builder = Builder::new(config, origin);
        for (name, literals) in records {
            builder.start_collection(name.as_ref())?;
            for literal in literals {
                builder.add_literal(literal.as_ref())?;
            }
        }
        builder.finish(config)
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn collection_count(&self) -> usize {
        self.names.len()
    }

    pub fn name(&self, id: usize) -> &str {
        &self.names[id]
    }

    /// Unique keys a collection retained after conflict eviction.
    pub fn kmer_count(&self, id: usize) -> u32 {
        self.kmer_counts[id]
    }

    /// Counts a scanned key against its owning collection.
    ///
    /// Returns false for keys whose slot is empty or evicted, and for
    /// non-indexed keys aliasing an occupied slot (detected by comparing
    /// the stored key).
    pub fn add(&self, key: u64) -> bool {
        let slot = slot_hash(key, self.slot_mask) as usize;
        let idx = self.slots[slot];
        if idx == 0 || idx == COLLISION {
            return false;
        }
        let hit = &self.hits[idx as usize - 1];
        if hit.key != key {
            return false;
        }
        hit.hits.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Aggregates hit counters into ranked per-collection results.
    ///
    /// A collection is reported when its coverage exceeds the threshold and
    /// it retained more than 10 unique keys. Results sort by coverage, then
    /// median depth, both descending.
    pub fn results(&self, config: &Config) -> Vec<KcResult> {
        let n = self.names.len();
        let mut sums = vec![0u64; n];
        let mut per_collection: Vec<Vec<u32>> = vec![Vec::new(); n];
        for hit in &self.hits {
            let count = hit.hits.load(Ordering::Relaxed);
            if count > 0 {
                sums[hit.id as usize] += u64::from(count);
                per_collection[hit.id as usize].push(count);
            }
        }

        let mut results = Vec::new();
        for (id, counts) in per_collection.iter_mut().enumerate() {
            let kmer_count = self.kmer_counts[id];
            if kmer_count == 0 {
                continue;
            }
            counts.sort_unstable_by(|a, b| b.cmp(a));
            let median_idx = ((kmer_count + 1) / 2) as usize;
            let median_hit = counts.get(median_idx).copied().unwrap_or(0);
            let mean_hit = sums[id] as f64 / f64::from(kmer_count);
            let coverage = counts.len() as f64 / f64::from(kmer_count);

            if coverage > config.kc_coverage_threshold && kmer_count > 10 {
                results.push(KcResult {
                    name: self.names[id].clone(),
                    hits: sums[id],
                    coverage,
                    median_hit,
                    mean_hit,
                    kmer_count,
                    high_confidence: coverage >= config.kc_coverage_high_confidence
                        && median_hit >= config.kc_median_hit_high_confidence,
                });
            }
        }

        results.sort_by(|a, b| {
            b.coverage
                .total_cmp(&a.coverage)
                .then(b.median_hit.cmp(&a.median_hit))
        });
        results
    }
}

/// Streaming build state for the slot table.
struct Builder {
    k: usize,
    slots: Vec<u32>,
    slot_mask: u64,
    names: Vec<String>,
    uniques: Vec<u32>,
    keys: Vec<Vec<u64>>,
    origin: String,
}

impl Builder {
    fn new(config: &Config, origin: &str) -> Self {
        let capacity = config.collection_hash_len;
        debug_assert!(capacity.is_power_of_two());
        Self {
            k: config.kmer_key_len,
            slots: vec![0; capacity],
            slot_mask: capacity as u64 - 1,
            names: Vec::new(),
            uniques: Vec::new(),
            keys: Vec::new(),
            origin: origin.to_string(),
        }
    }

    fn start_collection(&mut self, name: &str) -> Result<(), ScanError> {
        if self.names.len() as u64 + 1 >= u64::from(COLLISION) {
            return Err(ScanError::TooManyCollections {
                origin: self.origin.clone(),
                max: COLLISION - 1,
            });
        }
        self.names.push(name.to_string());
        self.uniques.push(0);
        self.keys.push(Vec::new());
        Ok(())
    }

    fn add_literal(&mut self, literal: &[u8]) -> Result<(), ScanError> {
        if self.names.is_empty() {
            warn!(
                "k-mer before any collection header, skipped {}",
                String::from_utf8_lossy(literal)
            );
            return Ok(());
        }
        if self.k == 0 {
            if literal.len() > codec::MAX_KEY_LEN {
                return Err(ScanError::KeyTooLong { len: literal.len() });
            }
            self.k = literal.len();
        }
        if literal.len() != self.k {
            warn!(
                "k-mer length must be {}, skipped {}",
                self.k,
                String::from_utf8_lossy(literal)
            );
            return Ok(());
        }
        let Some(key) = codec::encode(literal, 0, self.k) else {
            warn!("ambiguous k-mer skipped: {}", String::from_utf8_lossy(literal));
            return Ok(());
        };

        let slot = slot_hash(key, self.slot_mask) as usize;
        let current = self.names.len() as u32;
        let value = self.slots[slot];
        if value == 0 {
            self.slots[slot] = current;
            self.uniques[current as usize - 1] += 1;
            self.keys[current as usize - 1].push(key);
        } else if value != COLLISION {
            // a duplicate within the same collection or a claim from
            // another one; either way the slot is no longer unique
            self.uniques[value as usize - 1] -= 1;
            self.slots[slot] = COLLISION;
        }
        Ok(())
    }

    fn finish(mut self, config: &mut Config) -> Result<KmerCollectionIndex, ScanError> {
        if config.kmer_key_len == 0 {
            config.kmer_key_len = self.k;
        }

        let total: usize = self.uniques.iter().map(|&u| u as usize).sum();
        let mut hits = Vec::with_capacity(total);
        for (i, keys) in self.keys.iter().enumerate() {
            for &key in keys {
                let slot = slot_hash(key, self.slot_mask) as usize;
                if self.slots[slot] == (i + 1) as u32 {
                    hits.push(KcHit {
                        key,
                        id: i as u32,
                        hits: AtomicU32::new(0),
                    });
                    self.slots[slot] = hits.len() as u32;
                }
            }
        }
        assert_eq!(hits.len(), total, "unique count mismatch in collection build");

        info!(
            collections = self.names.len(),
            unique_keys = total,
            k = self.k,
            "k-mer collection index ready"
        );

        Ok(KmerCollectionIndex {
            k: self.k,
            slots: self.slots,
            slot_mask: self.slot_mask,
            hits,
            names: self.names,
            kmer_counts: self.uniques,
        })
    }
}
