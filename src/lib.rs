//! # virascan
//!
//! Detects microbial (for example viral) sequences in short- and long-read
//! sequencing data by scanning reads against three complementary indices
//! built from FASTA references:
//!
//! - a [unique k-mer index](unique::UniqueKmerIndex) of species-diagnostic
//!   k-mers whose mean hit depth drives a POSITIVE/NEGATIVE verdict,
//! - a [genome index](genome::GenomeIndex) mapping reads onto reference
//!   contigs by seed-and-extend, accumulating per-bin coverage and
//!   mismatch rates behind a Bloom pre-filter,
//! - a [k-mer collection index](collection::KmerCollectionIndex) of many
//!   labelled candidate k-mer sets, reporting per-candidate coverage and
//!   hit depth through a collision-tolerant slot table.
//!
//! A [`Scanner`](scanner::Scanner) fuses all three lookups into a single
//! forward plus reverse-complement pass per read. Indices are built once
//! and shared across scanner tasks; only their hit counters mutate during
//! scanning.
//!
//! Memory: the genome Bloom filter defaults to 2^29 slots (~512 MiB) and
//! the collection slot table to 2^30 32-bit slots (~4 GiB); both are
//! configurable through [`Config`](config::Config).

pub mod cli;
pub mod codec;
pub mod collection;
pub mod config;
pub mod dna;
pub mod error;
pub mod fasta;
pub mod genome;
pub mod report;
pub mod scanner;
pub mod unique;

pub use collection::{KcResult, KmerCollectionIndex};
pub use config::Config;
pub use error::ScanError;
pub use fasta::FastaSource;
pub use genome::{GenomeIndex, GenomeStats, MapResult};
pub use report::ScanReport;
pub use scanner::Scanner;
pub use unique::{UniqueKmerIndex, Verdict};
