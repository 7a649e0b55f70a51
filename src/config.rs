//! Configuration surface consumed by the detection core.
//!
//! Defaults follow the thresholds the detection pipeline ships with; the CLI
//! maps one flag onto each field. `kmer_key_len` and `stats_bin_size` start
//! at 0, meaning "infer from the first k-mer FASTA" and "auto-select from
//! the largest contig" respectively.

use crate::error::ScanError;

/// Default Bloom filter length: 2^29 single-byte slots (~512 MiB).
pub const DEFAULT_BLOOM_FILTER_LEN: usize = 1 << 29;

/// Default collection slot table length: 2^30 32-bit slots (~4 GiB).
///
/// This is a build-time memory floor when a k-mer collection is loaded.
pub const DEFAULT_COLLECTION_HASH_LEN: usize = 1 << 30;

/// Tuning options for index building and scanning.
#[derive(Debug, Clone)]
pub struct Config {
    /// K-mer key length; 0 means infer from the first k-mer FASTA loaded.
    pub kmer_key_len: usize,
    /// Mean unique-k-mer depth at or above which the verdict is POSITIVE.
    pub positive_threshold: f64,
    /// Maximum edit distance for an accepted alignment.
    pub ed_threshold: u32,
    /// Minimum per-bin depth for a bin to count as covered.
    pub depth_threshold: f64,
    /// Coverage bin size in bases; 0 means auto-select.
    pub stats_bin_size: usize,
    /// Reads longer than this are split into segments before scanning.
    pub long_read_threshold: usize,
    /// Segment size used when splitting long reads.
    pub segment_length: usize,
    /// Minimum k-mer coverage for a collection to be reported at all.
    pub kc_coverage_threshold: f64,
    /// Coverage cutoff for a high-confidence collection result.
    pub kc_coverage_high_confidence: f64,
    /// Median-depth cutoff for a high-confidence collection result.
    pub kc_median_hit_high_confidence: u32,
    /// Bloom filter length in slots; must be a power of two.
    pub bloom_filter_len: usize,
    /// Collection slot table length; must be a power of two.
    pub collection_hash_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            kmer_key_len: 0,
            positive_threshold: 0.1,
            ed_threshold: 8,
            depth_threshold: 1.0,
            stats_bin_size: 0,
            long_read_threshold: 200,
            segment_length: 100,
            kc_coverage_threshold: 0.1,
            kc_coverage_high_confidence: 0.9,
            kc_median_hit_high_confidence: 10,
            bloom_filter_len: DEFAULT_BLOOM_FILTER_LEN,
            collection_hash_len: DEFAULT_COLLECTION_HASH_LEN,
        }
    }
}

impl Config {
    /// Checks every option against its accepted range.
    pub fn validate(&self) -> Result<(), ScanError> {
        fn reject(details: impl Into<String>) -> Result<(), ScanError> {
            Err(ScanError::InvalidOption {
                details: details.into(),
            })
        }

        if self.kmer_key_len > crate::codec::MAX_KEY_LEN {
            return Err(ScanError::KeyTooLong {
                len: self.kmer_key_len,
            });
        }
        if !(0.001..=100.0).contains(&self.positive_threshold) {
            return reject("positive threshold should be 0.001 ~ 100, suggest 0.1");
        }
        if self.ed_threshold > 50 {
            return reject("edit distance threshold should be 0 ~ 50, suggest 8");
        }
        if !(0.001..=1000.0).contains(&self.depth_threshold) {
            return reject("depth threshold should be 0.001 ~ 1000, suggest 1");
        }
        if !(100..=10000).contains(&self.long_read_threshold) {
            return reject("long read threshold should be 100 ~ 10000, suggest 200");
        }
        if !(50..=5000).contains(&self.segment_length) {
            return reject("long read segment length should be 50 ~ 5000, suggest 100");
        }
        if self.segment_length >= self.long_read_threshold {
            return reject("segment length must be less than the long read threshold");
        }
        if !self.bloom_filter_len.is_power_of_two() {
            return reject("Bloom filter length must be a power of two");
        }
        if !self.collection_hash_len.is_power_of_two() {
            return reject("collection hash length must be a power of two");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn default_table_sizes() {
        let config = Config::default();
        assert_eq!(config.bloom_filter_len, 1 << 29);
        assert_eq!(config.collection_hash_len, 1 << 30);
    }

    #[test]
    fn rejects_oversized_key_len() {
        let config = Config {
            kmer_key_len: 33,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ScanError::KeyTooLong { len: 33 })
        ));
    }

    #[test]
    fn rejects_segment_length_at_long_read_threshold() {
        let config = Config {
            long_read_threshold: 100,
            segment_length: 100,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_non_power_of_two_tables() {
        let config = Config {
            bloom_filter_len: 1000,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            collection_hash_len: 3000,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_thresholds() {
        let config = Config {
            positive_threshold: 0.0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            ed_threshold: 51,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
