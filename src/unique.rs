//! Index of species-diagnostic unique k-mers.
//!
//! Loaded from a FASTA whose records are single k-mers. Scanning increments
//! a per-key hit counter; the mean depth across all keys drives the
//! POSITIVE/NEGATIVE verdict.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use dashmap::DashMap;
use rustc_hash::FxHashMap;
use tracing::{info, warn};

use crate::codec;
use crate::config::Config;
use crate::error::ScanError;
use crate::fasta::FastaSource;

/// Binary call made from the mean unique-k-mer depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Positive,
    Negative,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Positive => write!(f, "POSITIVE"),
            Verdict::Negative => write!(f, "NEGATIVE"),
        }
    }
}

/// Hit counter over a fixed set of target k-mers.
///
/// The key set is frozen at build time; [`add`](Self::add) never inserts.
/// Counters live in a concurrent map so scanners can share the index by
/// reference.
#[derive(Debug)]
pub struct UniqueKmerIndex {
    k: usize,
    hits: DashMap<u64, u32>,
    names: FxHashMap<u64, String>,
    sequences: FxHashMap<u64, String>,
}

impl UniqueKmerIndex {
    /// Builds the index from a FASTA of single-k-mer records.
    ///
    /// The first record fixes `K` when `config.kmer_key_len` is 0; records
    /// of any other length, or containing ambiguous bases, are skipped with
    /// a warning. An empty result is fatal.
    pub fn from_fasta(path: &Path, config: &mut Config) -> Result<Self, ScanError> {
        let contigs = FastaSource::new(path).read_all()?;
        Self::from_records(contigs, config, &path.display().to_string())
    }

    /// Builds the index from in-memory `(name, k-mer)` records.
    pub fn from_records(
        records: BTreeMap<String, Vec<u8>>,
        config: &mut Config,
        origin: &str,
    ) -> Result<Self, ScanError> {
        let hits = DashMap::new();
        let mut names = FxHashMap::default();
        let mut sequences = FxHashMap::default();

        for (name, seq) in &records {
            if config.kmer_key_len == 0 {
                if seq.len() > codec::MAX_KEY_LEN {
                    return Err(ScanError::KeyTooLong { len: seq.len() });
                }
                config.kmer_key_len = seq.len();
            }
            if seq.len() != config.kmer_key_len {
                warn!(
                    "k-mer length must be {}, skipped {}",
                    config.kmer_key_len,
                    String::from_utf8_lossy(seq)
                );
                continue;
            }
            match codec::encode(seq, 0, seq.len()) {
                Some(key) => {
                    hits.insert(key, 0);
                    names.insert(key, name.clone());
                    sequences.insert(key, String::from_utf8_lossy(seq).into_owned());
                }
                None => {
                    warn!("{}: {} skipped", name, String::from_utf8_lossy(seq));
                }
            }
        }

        if hits.is_empty() {
            return Err(ScanError::EmptyUniqueSet {
                origin: origin.to_string(),
            });
        }
        info!(kmers = hits.len(), k = config.kmer_key_len, "unique k-mer index ready");

        Ok(Self {
            k: config.kmer_key_len,
            hits,
            names,
            sequences,
        })
    }

    /// Increments the counter for `key` when it is a target k-mer.
    ///
    /// Returns false, inserting nothing, for any other key.
    pub fn add(&self, key: u64) -> bool {
        match self.hits.get_mut(&key) {
            Some(mut count) => {
                *count += 1;
                true
            }
            None => false,
        }
    }

    /// Arithmetic mean of every hit counter; 0 when the index is empty.
    pub fn mean_hit(&self) -> f64 {
        if self.hits.is_empty() {
            return 0.0;
        }
        let total: u64 = self.hits.iter().map(|entry| u64::from(*entry.value())).sum();
        total as f64 / self.hits.len() as f64
    }

    /// POSITIVE when the mean hit depth reaches `threshold`.
    pub fn verdict(&self, threshold: f64) -> Verdict {
        if self.mean_hit() >= threshold {
            Verdict::Positive
        } else {
            Verdict::Negative
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn kmer_count(&self) -> usize {
        self.hits.len()
    }

    /// Hit counts labelled `"{name}_{sequence}"`, ordered by that label.
    pub fn hit_counts(&self) -> BTreeMap<String, u32> {
        self.hits
            .iter()
            .map(|entry| {
                let key = *entry.key();
                let label = format!(
                    "{}_{}",
                    self.names.get(&key).map_or("", String::as_str),
                    self.sequences.get(&key).map_or("", String::as_str)
                );
                (label, *entry.value())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(pairs: &[(&str, &str)]) -> BTreeMap<String, Vec<u8>> {
        pairs
            .iter()
            .map(|(name, seq)| (name.to_string(), seq.as_bytes().to_vec()))
            .collect()
    }

    fn build(pairs: &[(&str, &str)]) -> (UniqueKmerIndex, Config) {
        let mut config = Config::default();
        let index = UniqueKmerIndex::from_records(records(pairs), &mut config, "test").unwrap();
        (index, config)
    }

    #[test]
    fn infers_k_from_first_record() {
        let (index, config) = build(&[("a", "AAAAA"), ("t", "TTTTT")]);
        assert_eq!(index.k(), 5);
        assert_eq!(config.kmer_key_len, 5);
        assert_eq!(index.kmer_count(), 2);
    }

    #[test]
    fn skips_records_of_wrong_length() {
        let (index, _) = build(&[("a", "AAAAA"), ("long", "AAAAAAA")]);
        assert_eq!(index.kmer_count(), 1);
    }

    #[test]
    fn skips_ambiguous_records() {
        let (index, _) = build(&[("a", "AAAAA"), ("n", "AANAA")]);
        assert_eq!(index.kmer_count(), 1);
    }

    #[test]
    fn empty_set_is_fatal() {
        let mut config = Config::default();
        let err =
            UniqueKmerIndex::from_records(records(&[("n", "NNNNN")]), &mut config, "test")
                .unwrap_err();
        assert!(matches!(err, ScanError::EmptyUniqueSet { .. }));
    }

    #[test]
    fn oversized_kmer_is_fatal() {
        let mut config = Config::default();
        let long = "A".repeat(40);
        let err = UniqueKmerIndex::from_records(
            records(&[("a", long.as_str())]),
            &mut config,
            "test",
        )
        .unwrap_err();
        assert!(matches!(err, ScanError::KeyTooLong { len: 40 }));
    }

    #[test]
    fn add_only_counts_known_keys() {
        let (index, _) = build(&[("a", "AAAAA")]);
        let aaaaa = codec::encode(b"AAAAA", 0, 5).unwrap();
        let ccccc = codec::encode(b"CCCCC", 0, 5).unwrap();
        assert!(index.add(aaaaa));
        assert!(index.add(aaaaa));
        assert!(!index.add(ccccc));
        assert_eq!(index.hit_counts()["a_AAAAA"], 2);
    }

    #[test]
    fn mean_hit_and_verdict() {
        let (index, _) = build(&[("a", "AAAAA"), ("t", "TTTTT")]);
        let aaaaa = codec::encode(b"AAAAA", 0, 5).unwrap();
        let ttttt = codec::encode(b"TTTTT", 0, 5).unwrap();
        for _ in 0..3 {
            assert!(index.add(aaaaa));
        }
        assert!(index.add(ttttt));

        let counts = index.hit_counts();
        assert_eq!(counts["a_AAAAA"], 3);
        assert_eq!(counts["t_TTTTT"], 1);
        assert!((index.mean_hit() - 2.0).abs() < f64::EPSILON);
        assert_eq!(index.verdict(1.0), Verdict::Positive);
        assert_eq!(index.verdict(2.5), Verdict::Negative);
    }

    #[test]
    fn hit_counts_sorted_by_label() {
        let (index, _) = build(&[("z", "AAAAA"), ("a", "TTTTT")]);
        let labels: Vec<String> = index.hit_counts().into_keys().collect();
        assert_eq!(labels, vec!["a_TTTTT".to_string(), "z_AAAAA".to_string()]);
    }

    #[test]
    fn verdict_display() {
        assert_eq!(Verdict::Positive.to_string(), "POSITIVE");
        assert_eq!(Verdict::Negative.to_string(), "NEGATIVE");
    }

    #[test]
    fn respects_preset_key_length() {
        let mut config = Config {
            kmer_key_len: 3,
            ..Config::default()
        };
        let index = UniqueKmerIndex::from_records(
            records(&[("a", "AAAAA"), ("b", "ACG")]),
            &mut config,
            "test",
        )
        .unwrap();
        assert_eq!(index.k(), 3);
        assert_eq!(index.kmer_count(), 1);
    }
}
