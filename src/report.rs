//! Serialisable views over the index accumulators.
//!
//! The detection core only produces counters; these structs turn them into
//! the shapes a reporter renders. Everything derives `Serialize` so the
//! binary can dump one JSON document per run.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::collection::{KcResult, KmerCollectionIndex};
use crate::config::Config;
use crate::genome::{GenomeIndex, GenomeStats};
use crate::unique::UniqueKmerIndex;

/// Unique-k-mer hit counts and the POSITIVE/NEGATIVE verdict.
#[derive(Debug, Serialize)]
pub struct UniqueReport {
    pub kmer_count: usize,
    pub mean_hit: f64,
    pub verdict: String,
    pub positive_threshold: f64,
    /// `"{name}_{sequence}"` labels mapped to hit counts, label-ordered.
    pub hits: BTreeMap<String, u32>,
}

impl UniqueReport {
    pub fn new(index: &UniqueKmerIndex, config: &Config) -> Self {
        Self {
            kmer_count: index.kmer_count(),
            mean_hit: index.mean_hit(),
            verdict: index.verdict(config.positive_threshold).to_string(),
            positive_threshold: config.positive_threshold,
            hits: index.hit_counts(),
        }
    }
}

/// Per-contig coverage summary.
#[derive(Debug, Serialize)]
pub struct ContigCoverage {
    pub name: String,
    pub size: usize,
    pub reads: u64,
    pub bases: u64,
    pub coverage_rate: f64,
    pub avg_mismatch_ratio: f64,
    /// Mean depth per bin; the final partial bin is normalised by its
    /// actual width.
    pub coverage: Vec<f64>,
    /// Edit-distance mass per covered base, per bin.
    pub mismatch_ratios: Vec<f64>,
}

/// Genome mapping results across every contig.
#[derive(Debug, Serialize)]
pub struct GenomeReport {
    pub genome_number: usize,
    pub bin_size: usize,
    pub genome_coverage: Vec<ContigCoverage>,
}

impl GenomeReport {
    pub fn new(index: &GenomeIndex, stats: &GenomeStats, config: &Config) -> Self {
        let bin_size = index.bin_size();
        let genome_coverage = index
            .contigs()
            .iter()
            .enumerate()
            .map(|(id, contig)| {
                let cov = stats.coverage(id);
                let ed = stats.edit_distance(id);
                let coverage: Vec<f64> = cov
                    .iter()
                    .enumerate()
                    .map(|(x, &c)| {
                        if x + 1 < cov.len() {
                            f64::from(c) / bin_size as f64
                        } else {
                            let remainder = contig.seq.len() - x * bin_size;
                            if remainder == 0 {
                                0.0
                            } else {
                                f64::from(c) / remainder as f64
                            }
                        }
                    })
                    .collect();
                let mismatch_ratios: Vec<f64> = cov
                    .iter()
                    .zip(ed.iter())
                    .map(|(&c, &e)| if c > 0.0 { f64::from(e) / f64::from(c) } else { 0.0 })
                    .collect();
                let bases = stats.bases(id);
                let avg_mismatch_ratio = if bases == 0 {
                    0.0
                } else {
                    stats.total_edit_distance(id) as f64 / bases as f64
                };
                ContigCoverage {
                    name: contig.name.clone(),
                    size: contig.seq.len(),
                    reads: stats.reads(id),
                    bases,
                    coverage_rate: stats.coverage_rate(id, config.depth_threshold),
                    avg_mismatch_ratio,
                    coverage,
                    mismatch_ratios,
                }
            })
            .collect();
        Self {
            genome_number: index.contigs().len(),
            bin_size,
            genome_coverage,
        }
    }
}

/// Ranked k-mer collection results.
#[derive(Debug, Serialize)]
pub struct CollectionReport {
    pub result_count: usize,
    pub high_confidence_count: usize,
    pub results: Vec<KcResult>,
}

impl CollectionReport {
    pub fn new(index: &KmerCollectionIndex, config: &Config) -> Self {
        let results = index.results(config);
        let high_confidence_count = results.iter().filter(|r| r.high_confidence).count();
        Self {
            result_count: results.len(),
            high_confidence_count,
            results,
        }
    }
}

/// Everything one run produces, ready for JSON.
#[derive(Debug, Serialize)]
pub struct ScanReport {
    pub reads_scanned: u64,
    pub reads_detected: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_kmer_result: Option<UniqueReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genome_mapping_result: Option<GenomeReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kmer_collection_scan_result: Option<CollectionReport>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use std::collections::BTreeMap;

    fn test_config() -> Config {
        Config {
            kmer_key_len: 5,
            stats_bin_size: 10,
            bloom_filter_len: 1 << 16,
            collection_hash_len: 1 << 20,
            ..Config::default()
        }
    }

    #[test]
    fn unique_report_carries_verdict() {
        let mut config = test_config();
        let records: BTreeMap<String, Vec<u8>> =
            [("a".to_string(), b"AAAAA".to_vec())].into_iter().collect();
        let index = UniqueKmerIndex::from_records(records, &mut config, "test").unwrap();
        index.add(codec::encode(b"AAAAA", 0, 5).unwrap());

        let report = UniqueReport::new(&index, &config);
        assert_eq!(report.kmer_count, 1);
        assert_eq!(report.verdict, "POSITIVE");
        assert!((report.mean_hit - 1.0).abs() < f64::EPSILON);
        assert_eq!(report.hits["a_AAAAA"], 1);
    }

    #[test]
    fn genome_report_normalises_bins() {
        let mut config = test_config();
        config.ed_threshold = 8;
        let head = "ACGTGACTTGCAGTACCGATGGATCCTAGCAAGGTCAGCT";
        let contig = format!("{}{}", head, "A".repeat(28));
        let index = GenomeIndex::from_contigs(
            vec![("c".to_string(), contig.into_bytes())],
            &mut config,
        )
        .unwrap();
        let mut stats = GenomeStats::new(&index);
        assert!(index.align(&head.as_bytes()[..20], &mut stats));

        let report = GenomeReport::new(&index, &stats, &config);
        assert_eq!(report.genome_number, 1);
        assert_eq!(report.bin_size, 10);
        let contig_report = &report.genome_coverage[0];
        assert_eq!(contig_report.size, 68);
        assert_eq!(contig_report.reads, 1);
        assert_eq!(contig_report.bases, 20);
        // bins 0 and 1 fully covered at depth 1
        assert!((contig_report.coverage[0] - 1.0).abs() < 1e-9);
        assert!((contig_report.coverage[1] - 1.0).abs() < 1e-9);
        assert_eq!(contig_report.coverage[2], 0.0);
        assert_eq!(contig_report.avg_mismatch_ratio, 0.0);
    }

    #[test]
    fn genome_report_last_bin_uses_remainder_width() {
        let mut config = test_config();
        // 25 bp contig -> 2 bins, the last one 15 bp wide
        let index = GenomeIndex::from_contigs(
            vec![("c".to_string(), b"ACGTGACTTGCAGTACCGATGGATC".to_vec())],
            &mut config,
        )
        .unwrap();
        let mut stats = GenomeStats::new(&index);
        stats.cover(0, 10, 10, 0, 1.0);

        let report = GenomeReport::new(&index, &stats, &config);
        let contig_report = &report.genome_coverage[0];
        // 10 covered bases over the 15 bp final bin
        assert!((contig_report.coverage[1] - 10.0 / 15.0).abs() < 1e-9);
    }

    #[test]
    fn collection_report_counts_high_confidence() {
        let mut config = test_config();
        let kmers: Vec<String> = (0..100).map(|i| codec::decode(i, 5)).collect();
        let index = KmerCollectionIndex::from_records(
            vec![("candidate", kmers)],
            &mut config,
            "test",
        )
        .unwrap();
        for key in 0..95u64 {
            for _ in 0..20 {
                index.add(key);
            }
        }

        let report = CollectionReport::new(&index, &config);
        assert_eq!(report.result_count, 1);
        assert_eq!(report.high_confidence_count, 1);
        assert!(report.results[0].high_confidence);
    }

    #[test]
    fn scan_report_serialises_to_json() {
        let report = ScanReport {
            reads_scanned: 10,
            reads_detected: 2,
            unique_kmer_result: None,
            genome_mapping_result: None,
            kmer_collection_scan_result: None,
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"reads_scanned\":10"));
        assert!(json.contains("\"reads_detected\":2"));
        assert!(!json.contains("unique_kmer_result"));
    }
}
