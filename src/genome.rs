//! Full-genome reference index: seed table, Bloom pre-filter and
//! seed-and-extend alignment with per-bin coverage accumulation.
//!
//! Contigs get dense 8-bit ids so a seed fits in one `u32`
//! (`id << 24 | position`). The index itself is immutable after build;
//! scanners accumulate coverage into their own [`GenomeStats`] and merge
//! them at end of run.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{info, warn};

use crate::codec::{self, KeyStream};
use crate::config::Config;
use crate::dna;
use crate::error::ScanError;
use crate::fasta::FastaSource;

/// Bases excluded from seeding at the tail of every contig.
const POLY_A_TAIL_LEN: usize = 28;
/// A contig id must fit in the 8 high bits of a packed seed.
const MAX_CONTIGS: usize = 255;
/// A contig position must fit in the 24 low bits of a packed seed.
const MAX_CONTIG_LEN: usize = 1 << 24;
/// Auto bin sizing aims for roughly this many bins on the largest contig.
const TARGET_BIN_COUNT: usize = 1600;

const BLOOM_FACTORS: [u64; 3] = [1_713_137_323, 371_371_377, 7_341_234_131];

/// A reference contig held by the index.
#[derive(Debug)]
pub struct Contig {
    pub name: String,
    pub seq: Vec<u8>,
}

/// Outcome of extending one seed against a contig.
#[derive(Debug, Clone, Copy)]
pub struct MapResult {
    pub mapped: bool,
    /// 0-based start of the read on the contig.
    pub start: u32,
    pub len: u32,
    pub ed: u32,
}

impl Default for MapResult {
    fn default() -> Self {
        Self {
            mapped: false,
            start: 0,
            len: 0,
            ed: u32::MAX,
        }
    }
}

fn pack_id_pos(id: u32, pos: u32) -> u32 {
    (id << 24) | pos
}

fn unpack_id_pos(data: u32) -> (u32, u32) {
    (data >> 24, data & 0x00FF_FFFF)
}

fn auto_bin_size(max_contig_len: usize) -> usize {
    let raw = max_contig_len / TARGET_BIN_COUNT;
    if raw < 1 {
        1
    } else if raw < 10 {
        raw
    } else if raw < 100 {
        raw / 10 * 10
    } else if raw < 1000 {
        raw / 100 * 100
    } else if raw < 10_000 {
        raw / 1000 * 1000
    } else if raw < 100_000 {
        raw / 10_000 * 10_000
    } else {
        100_000
    }
}

/// Keys within Hamming distance two of a constant string are treated as
/// low-complexity and never seeded.
fn low_complexity_keys(k: usize) -> FxHashSet<u64> {
    const BASES: [u8; 4] = [b'A', b'T', b'C', b'G'];
    let mut keys = FxHashSet::default();
    for origin in BASES {
        for diff1 in BASES {
            for diff2 in BASES {
                for p in 0..k {
                    for q in 0..k {
                        let mut seq = vec![origin; k];
                        seq[p] = diff1;
                        seq[q] = diff2;
                        if let Some(key) = codec::encode(&seq, 0, k) {
                            keys.insert(key);
                        }
                    }
                }
            }
        }
    }
    keys
}

/// Immutable genome index shared across scanners.
#[derive(Debug)]
pub struct GenomeIndex {
    k: usize,
    bin_size: usize,
    ed_threshold: u32,
    contigs: Vec<Contig>,
    /// key -> packed `(id, pos)` seeds in insertion order.
    seed_table: FxHashMap<u64, Vec<u32>>,
    bloom: Vec<u8>,
    bloom_mask: u64,
    hit_count: AtomicU64,
    missed_count: AtomicU64,
}

impl GenomeIndex {
    /// Builds the index from a reference FASTA.
    ///
    /// `config.kmer_key_len` must already be set (from a k-mer FASTA or the
    /// option surface). When `config.stats_bin_size` is 0 the bin size is
    /// auto-selected and written back.
    pub fn from_fasta(path: &Path, config: &mut Config) -> Result<Self, ScanError> {
        let contigs = FastaSource::new(path).read_all()?;
        Self::from_contigs(contigs, config)
    }

    /// Builds the index from in-memory contigs, in iteration order.
    pub fn from_contigs(
        contigs: impl IntoIterator<Item = (String, Vec<u8>)>,
        config: &mut Config,
    ) -> Result<Self, ScanError> {
        let k = config.kmer_key_len;
        if k == 0 || k > codec::MAX_KEY_LEN {
            return Err(ScanError::InvalidOption {
                details: format!("k-mer key length must be 1 ~ 32 before building a genome index, got {k}"),
            });
        }

        let mut kept: Vec<Contig> = Vec::new();
        for (name, seq) in contigs {
            if kept.len() >= MAX_CONTIGS {
                warn!("only up to {MAX_CONTIGS} contigs are supported, the rest are skipped");
                break;
            }
            if seq.len() >= MAX_CONTIG_LEN {
                warn!("contig size is limited to 16M, skip {} ({} bp)", name, seq.len());
                continue;
            }
            kept.push(Contig { name, seq });
        }

        if config.stats_bin_size == 0 {
            let max_len = kept.iter().map(|c| c.seq.len()).max().unwrap_or(0);
            config.stats_bin_size = auto_bin_size(max_len);
        }

        let low_complexity = low_complexity_keys(k);
        let mut seed_table: FxHashMap<u64, Vec<u32>> = FxHashMap::default();
        for (id, contig) in kept.iter().enumerate() {
            let Some(end) = contig.seq.len().checked_sub(k + POLY_A_TAIL_LEN) else {
                continue;
            };
            for (pos, key) in KeyStream::new(&contig.seq, k) {
                if pos >= end {
                    break;
                }
                if low_complexity.contains(&key) {
                    continue;
                }
                seed_table
                    .entry(key)
                    .or_default()
                    .push(pack_id_pos(id as u32, pos as u32));
            }
        }

        let bloom_len = config.bloom_filter_len;
        debug_assert!(bloom_len.is_power_of_two());
        let mut bloom = vec![0u8; bloom_len];
        let bloom_mask = bloom_len as u64 - 1;
        for &key in seed_table.keys() {
            for factor in BLOOM_FACTORS {
                bloom[(factor.wrapping_mul(key) & bloom_mask) as usize] = 1;
            }
        }

        info!(
            contigs = kept.len(),
            seeded_keys = seed_table.len(),
            bin_size = config.stats_bin_size,
            "genome index ready"
        );

        Ok(Self {
            k,
            bin_size: config.stats_bin_size,
            ed_threshold: config.ed_threshold,
            contigs: kept,
            seed_table,
            bloom,
            bloom_mask,
            hit_count: AtomicU64::new(0),
            missed_count: AtomicU64::new(0),
        })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn bin_size(&self) -> usize {
        self.bin_size
    }

    pub fn contigs(&self) -> &[Contig] {
        &self.contigs
    }

    /// Diagnostic counters: seed-table hits and Bloom-passing misses.
    pub fn telemetry(&self) -> (u64, u64) {
        (
            self.hit_count.load(Ordering::Relaxed),
            self.missed_count.load(Ordering::Relaxed),
        )
    }

    /// Bloom-filtered membership test for a key.
    ///
    /// The filter can pass keys that are absent (they fall through to the
    /// seed table), but never rejects a key that was seeded.
    pub fn probably_has(&self, key: u64) -> bool {
        for factor in BLOOM_FACTORS {
            if self.bloom[(factor.wrapping_mul(key) & self.bloom_mask) as usize] == 0 {
                return false;
            }
        }
        let hit = self.seed_table.contains_key(&key);
        if hit {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
        } else {
            self.missed_count.fetch_add(1, Ordering::Relaxed);
        }
        hit
    }

    /// Seeds recorded for `key`, in insertion order.
    pub fn seeds(&self, key: u64) -> &[u32] {
        self.seed_table.get(&key).map_or(&[], Vec::as_slice)
    }

    /// Aligns a read against every contig it seeds to, accumulating
    /// coverage into `stats`. Returns true when any match was accepted.
    ///
    /// K-mers past position 10 are sampled one in ten. Once a contig has an
    /// accepted match it is not re-entered at later read positions, but the
    /// remaining seeds of that contig at the discovering position are all
    /// extended so multi-mapped placements share coverage weight.
    pub fn align(&self, seq: &[u8], stats: &mut GenomeStats) -> bool {
        if seq.len() < self.k {
            return false;
        }
        let mut results: Vec<Vec<MapResult>> = vec![Vec::new(); self.contigs.len()];

        for (pos, key) in KeyStream::new(seq, self.k) {
            if pos > 10 && pos % 10 != 0 {
                continue;
            }
            if !self.probably_has(key) {
                continue;
            }
            let seeds = self.seeds(key);
            let mut i = 0;
            while i < seeds.len() {
                let (id, contig_pos) = unpack_id_pos(seeds[i]);
                let id = id as usize;
                if !results[id].is_empty() {
                    i += 1;
                    continue;
                }
                let first = self.map_to_contig(seq, pos as u32, id, contig_pos);
                if !first.mapped {
                    i += 1;
                    continue;
                }
                results[id].push(first);
                // sweep the remaining seeds of this contig at the same
                // read position to collect multi-mapped placements
                let mut j = i + 1;
                while j < seeds.len() {
                    let (next_id, next_pos) = unpack_id_pos(seeds[j]);
                    if next_id as usize != id {
                        break;
                    }
                    let next = self.map_to_contig(seq, pos as u32, id, next_pos);
                    if next.mapped {
                        results[id].push(next);
                    }
                    j += 1;
                }
                i = j;
            }
        }

        let mut mapped = false;
        for (id, matches) in results.iter().enumerate() {
            if matches.is_empty() {
                continue;
            }
            mapped = true;
            let frac = 1.0 / matches.len() as f32;
            let mut min_ed = u32::MAX;
            for m in matches {
                stats.cover(id, m.start, m.len, m.ed, frac);
                min_ed = min_ed.min(m.ed);
            }
            stats.reads[id] += 1;
            stats.bases[id] += u64::from(matches[0].len);
            stats.total_edit_distance[id] += u64::from(min_ed);
        }
        mapped
    }

    /// Extends the seed `(read pos, contig, contig pos)` into a full-read
    /// comparison against the implied contig window.
    ///
    /// Hamming distance is tried first; only reads with more than two
    /// mismatches pay for an edit distance. A match is accepted when the
    /// distance is within the threshold and below a quarter of the read.
    pub(crate) fn map_to_contig(
        &self,
        seq: &[u8],
        seq_pos: u32,
        id: usize,
        contig_pos: u32,
    ) -> MapResult {
        if contig_pos < seq_pos {
            return MapResult::default();
        }
        let start = (contig_pos - seq_pos) as usize;
        let contig = &self.contigs[id].seq;
        if contig.len() - (contig_pos as usize) < seq.len() {
            return MapResult::default();
        }
        let window = &contig[start..start + seq.len()];

        let hd = dna::hamming(seq, window);
        let ed = if hd <= 2 {
            hd
        } else {
            dna::edit_distance(seq, window)
        };

        MapResult {
            mapped: ed <= self.ed_threshold && (ed as usize) < seq.len() / 4,
            start: start as u32,
            len: seq.len() as u32,
            ed,
        }
    }
}

/// Per-scanner coverage accumulator, merged at end of run.
pub struct GenomeStats {
    bin_size: usize,
    coverage: Vec<Vec<f32>>,
    edit_distance: Vec<Vec<f32>>,
    reads: Vec<u64>,
    bases: Vec<u64>,
    total_edit_distance: Vec<u64>,
}

impl GenomeStats {
    pub fn new(index: &GenomeIndex) -> Self {
        let bin_size = index.bin_size();
        let bins: Vec<usize> = index
            .contigs()
            .iter()
            .map(|c| (c.seq.len() + 1) / bin_size)
            .collect();
        Self {
            bin_size,
            coverage: bins.iter().map(|&n| vec![0.0; n]).collect(),
            edit_distance: bins.iter().map(|&n| vec![0.0; n]).collect(),
            reads: vec![0; bins.len()],
            bases: vec![0; bins.len()],
            total_edit_distance: vec![0; bins.len()],
        }
    }

    /// Spreads one accepted match over the bins it overlaps.
    ///
    /// Each bin receives `overlap * frac` coverage and the proportional
    /// share of the edit distance. Bases past the last bin are dropped.
    pub fn cover(&mut self, id: usize, pos: u32, len: u32, ed: u32, frac: f32) {
        assert!(id < self.coverage.len(), "invalid contig id {id} in coverage update");
        if len == 0 {
            return;
        }
        let start = pos as usize;
        let stop = start + len as usize;
        let left_bin = start / self.bin_size;
        let right_bin = stop / self.bin_size;
        for bin in left_bin..=right_bin {
            if bin >= self.coverage[id].len() {
                break;
            }
            let left = start.max(bin * self.bin_size);
            let right = stop.min((bin + 1) * self.bin_size);
            if right <= left {
                continue;
            }
            let overlap = (right - left) as f32;
            let proportion = overlap / len as f32;
            self.coverage[id][bin] += overlap * frac;
            self.edit_distance[id][bin] += ed as f32 * proportion * frac;
        }
    }

    /// Fraction of bins whose depth reaches `depth_threshold`.
    pub fn coverage_rate(&self, id: usize, depth_threshold: f64) -> f64 {
        let bins = &self.coverage[id];
        if bins.is_empty() {
            return 0.0;
        }
        let covered = bins
            .iter()
            .filter(|&&c| f64::from(c) / self.bin_size as f64 >= depth_threshold)
            .count();
        covered as f64 / bins.len() as f64
    }

    /// Folds another accumulator into this one.
    pub fn merge(&mut self, other: GenomeStats) {
        assert_eq!(self.coverage.len(), other.coverage.len(), "mismatched genome stats");
        for id in 0..self.coverage.len() {
            for (a, b) in self.coverage[id].iter_mut().zip(&other.coverage[id]) {
                *a += b;
            }
            for (a, b) in self.edit_distance[id].iter_mut().zip(&other.edit_distance[id]) {
                *a += b;
            }
            self.reads[id] += other.reads[id];
            self.bases[id] += other.bases[id];
            self.total_edit_distance[id] += other.total_edit_distance[id];
        }
    }

    pub fn coverage(&self, id: usize) -> &[f32] {
        &self.coverage[id]
    }

    pub fn edit_distance(&self, id: usize) -> &[f32] {
        &self.edit_distance[id]
    }

    pub fn reads(&self, id: usize) -> u64 {
        self.reads[id]
    }

    pub fn bases(&self, id: usize) -> u64 {
        self.bases[id]
    }

    pub fn total_edit_distance(&self, id: usize) -> u64 {
        self.total_edit_distance[id]
    }
}
