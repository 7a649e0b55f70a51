//! Per-read scanning against the three indices.
//!
//! One scanner walks a read forward and reverse-complement, feeding every
//! valid k-mer key to the unique-k-mer and collection counters while
//! probing the genome Bloom filter; a read whose key stream touches the
//! genome index is then seed-and-extend aligned. Reads longer than the
//! long-read threshold are split into segments scanned independently.
//!
//! Scanners are cheap per-task objects. The indices are shared by
//! reference; genome coverage accumulates into a scanner-owned
//! [`GenomeStats`] that the caller merges at end of run.

use crate::collection::KmerCollectionIndex;
use crate::codec::KeyStream;
use crate::config::Config;
use crate::dna;
use crate::genome::{GenomeIndex, GenomeStats};
use crate::unique::UniqueKmerIndex;

/// Scans reads against whichever indices are present.
pub struct Scanner<'a> {
    k: usize,
    long_read_threshold: usize,
    segment_length: usize,
    unique: Option<&'a UniqueKmerIndex>,
    genomes: Option<&'a GenomeIndex>,
    collection: Option<&'a KmerCollectionIndex>,
    genome_stats: Option<GenomeStats>,
}

impl<'a> Scanner<'a> {
    pub fn new(
        config: &Config,
        unique: Option<&'a UniqueKmerIndex>,
        genomes: Option<&'a GenomeIndex>,
        collection: Option<&'a KmerCollectionIndex>,
    ) -> Self {
        Self {
            k: config.kmer_key_len,
            long_read_threshold: config.long_read_threshold,
            segment_length: config.segment_length,
            unique,
            genomes,
            collection,
            genome_stats: genomes.map(GenomeStats::new),
        }
    }

    /// Scans one cleaned read in both orientations.
    ///
    /// Returns true when the read is detected: it produced at least one
    /// unique-k-mer hit or one accepted alignment. Collection hits alone do
    /// not detect a read. Long reads are split into non-overlapping
    /// segments and detected when any segment is.
    pub fn scan(&mut self, seq: &[u8]) -> bool {
        if seq.len() > self.long_read_threshold {
            let mut detected = false;
            for segment in seq.chunks(self.segment_length) {
                detected |= self.scan(segment);
            }
            return detected;
        }
        if self.k == 0 || seq.len() < self.k {
            return false;
        }
        let forward = self.scan_oriented(seq);
        let rc = dna::reverse_complement(seq);
        let reverse = self.scan_oriented(&rc);
        forward || reverse
    }

    fn scan_oriented(&mut self, seq: &[u8]) -> bool {
        let mut unique_hits = 0u32;
        let mut need_alignment = false;

        for (_, key) in KeyStream::new(seq, self.k) {
            if !need_alignment {
                if let Some(genomes) = self.genomes {
                    if genomes.probably_has(key) {
                        need_alignment = true;
                        // nothing else to feed once alignment is queued
                        if self.unique.is_none() {
                            break;
                        }
                    }
                }
            }
            if let Some(unique) = self.unique {
                if unique.add(key) {
                    unique_hits += 1;
                }
            }
            if let Some(collection) = self.collection {
                collection.add(key);
            }
        }

        let mut mapped = false;
        if need_alignment {
            if let (Some(genomes), Some(stats)) = (self.genomes, self.genome_stats.as_mut()) {
                mapped = genomes.align(seq, stats);
            }
        }
        unique_hits > 0 || mapped
    }

    /// Hands back the coverage accumulated by this scanner.
    pub fn into_stats(self) -> Option<GenomeStats> {
        self.genome_stats
    }
}
