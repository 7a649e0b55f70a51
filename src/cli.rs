//! Command-line interface definition.

use clap::Parser;
use std::path::PathBuf;

use crate::config::Config;
use crate::error::ScanError;

/// Scan sequencing reads for microbial sequences.
///
/// Reads are checked against up to three reference indices built from FASTA
/// files: a set of species-diagnostic unique k-mers (`--kmer`), full
/// reference genomes (`--genomes`) and a collection of per-candidate k-mer
/// sets (`--collection`). At least one must be given.
#[derive(Parser, Debug)]
#[command(name = "virascan")]
#[command(version, author, about, long_about = None)]
pub struct Args {
    /// Input reads: FASTA or FASTQ, optionally gzipped
    #[arg(short = 'i', long = "in")]
    pub input: PathBuf,

    /// FASTA of unique (species-diagnostic) k-mers
    #[arg(short = 'k', long = "kmer")]
    pub kmer: Option<PathBuf>,

    /// FASTA of reference genome contigs
    #[arg(short = 'g', long = "genomes")]
    pub genomes: Option<PathBuf>,

    /// K-mer collection FASTA, one k-mer literal per line
    #[arg(short = 'c', long = "collection")]
    pub collection: Option<PathBuf>,

    /// Write the JSON report to this path
    #[arg(short = 'j', long = "json")]
    pub json: Option<PathBuf>,

    /// K-mer key length; 0 infers it from the first k-mer FASTA
    #[arg(long, default_value_t = 0)]
    pub kmer_key_len: usize,

    /// Mean unique-k-mer depth for a POSITIVE verdict
    #[arg(short = 'p', long, default_value_t = 0.1)]
    pub positive_threshold: f64,

    /// Maximum edit distance for an accepted alignment
    #[arg(short = 'E', long, default_value_t = 8)]
    pub ed_threshold: u32,

    /// Minimum per-bin depth for a bin to count as covered
    #[arg(short = 'd', long, default_value_t = 1.0)]
    pub depth_threshold: f64,

    /// Coverage bin size in bases; 0 auto-selects from the largest contig
    #[arg(long, default_value_t = 0)]
    pub stats_bin_size: usize,

    /// Reads longer than this are split into segments before scanning
    #[arg(long, default_value_t = 200)]
    pub long_read_threshold: usize,

    /// Segment size used when splitting long reads
    #[arg(long, default_value_t = 100)]
    pub segment_length: usize,

    /// Minimum k-mer coverage for a collection to be reported
    #[arg(long, default_value_t = 0.1)]
    pub kc_coverage_threshold: f64,

    /// Coverage cutoff for a high-confidence collection result
    #[arg(long, default_value_t = 0.9)]
    pub kc_coverage_high_confidence: f64,

    /// Median-depth cutoff for a high-confidence collection result
    #[arg(long, default_value_t = 10)]
    pub kc_median_hit_high_confidence: u32,

    /// Suppress the stderr summary
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Checks the option combination before any index is built.
    pub fn check(&self) -> Result<(), ScanError> {
        if self.kmer.is_none() && self.genomes.is_none() && self.collection.is_none() {
            return Err(ScanError::InvalidOption {
                details: "at least one of --kmer, --genomes or --collection is required".into(),
            });
        }
        Ok(())
    }

    /// Maps the parsed flags onto the core configuration.
    pub fn to_config(&self) -> Config {
        Config {
            kmer_key_len: self.kmer_key_len,
            positive_threshold: self.positive_threshold,
            ed_threshold: self.ed_threshold,
            depth_threshold: self.depth_threshold,
            stats_bin_size: self.stats_bin_size,
            long_read_threshold: self.long_read_threshold,
            segment_length: self.segment_length,
            kc_coverage_threshold: self.kc_coverage_threshold,
            kc_coverage_high_confidence: self.kc_coverage_high_confidence,
            kc_median_hit_high_confidence: self.kc_median_hit_high_confidence,
            ..Config::default()
        }
    }
}
