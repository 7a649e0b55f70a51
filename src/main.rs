use std::path::Path;
use std::process;

use clap::Parser;
use colored::Colorize;
use rayon::prelude::*;
use tracing::warn;

use virascan::cli::Args;
use virascan::collection::KmerCollectionIndex;
use virascan::config::Config;
use virascan::error::ScanError;
use virascan::fasta;
use virascan::genome::{GenomeIndex, GenomeStats};
use virascan::report::{CollectionReport, GenomeReport, ScanReport, UniqueReport};
use virascan::scanner::Scanner;
use virascan::unique::UniqueKmerIndex;

/// Set `RUST_LOG=virascan=debug` to see build and scan diagnostics.
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();

    let args = Args::parse();
    if let Err(e) = run(&args) {
        eprintln!(
            "{}\n {}",
            "Application error:".red().bold(),
            e.to_string().red()
        );
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), ScanError> {
    args.check()?;
    let mut config = args.to_config();
    config.validate()?;

    // the k-mer indices fix the key length the genome index then requires
    let unique = args
        .kmer
        .as_deref()
        .map(|path| UniqueKmerIndex::from_fasta(path, &mut config))
        .transpose()?;
    let collection = args
        .collection
        .as_deref()
        .map(|path| KmerCollectionIndex::from_fasta(path, &mut config))
        .transpose()?;
    let genomes = args
        .genomes
        .as_deref()
        .map(|path| GenomeIndex::from_fasta(path, &mut config))
        .transpose()?;

    let records = read_records(&args.input)?;
    let (stats, reads_scanned, reads_detected) = records
        .par_bridge()
        .fold(
            || {
                (
                    Scanner::new(
                        &config,
                        unique.as_ref(),
                        genomes.as_ref(),
                        collection.as_ref(),
                    ),
                    0u64,
                    0u64,
                )
            },
            |(mut scanner, scanned, detected), record| match record {
                Ok(seq) => {
                    let hit = scanner.scan(&seq);
                    (scanner, scanned + 1, detected + u64::from(hit))
                }
                Err(details) => {
                    warn!("skipping unreadable record: {details}");
                    (scanner, scanned, detected)
                }
            },
        )
        .map(|(scanner, scanned, detected)| (scanner.into_stats(), scanned, detected))
        .reduce(
            || (None, 0, 0),
            |a, b| (merge_stats(a.0, b.0), a.1 + b.1, a.2 + b.2),
        );

    // a run with zero reads still reports empty coverage
    let stats = stats.or_else(|| genomes.as_ref().map(GenomeStats::new));

    let report = ScanReport {
        reads_scanned,
        reads_detected,
        unique_kmer_result: unique.as_ref().map(|u| UniqueReport::new(u, &config)),
        genome_mapping_result: match (&genomes, &stats) {
            (Some(g), Some(s)) => Some(GenomeReport::new(g, s, &config)),
            _ => None,
        },
        kmer_collection_scan_result: collection
            .as_ref()
            .map(|c| CollectionReport::new(c, &config)),
    };

    if !args.quiet {
        print_summary(&report, &config);
    }

    if let Some(path) = &args.json {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json).map_err(|source| ScanError::Io {
            source,
            path: path.clone(),
        })?;
    }

    Ok(())
}

/// Streams read sequences from a FASTA or FASTQ file, upper-cased.
fn read_records(
    path: &Path,
) -> Result<Box<dyn Iterator<Item = Result<Vec<u8>, String>> + Send>, ScanError> {
    let reader = fasta::open_reader(path)?;
    if is_fastq_path(path) {
        let records = bio::io::fastq::Reader::new(reader).records().map(|r| {
            r.map(|record| record.seq().to_ascii_uppercase())
                .map_err(|e| e.to_string())
        });
        Ok(Box::new(records))
    } else {
        let records = bio::io::fasta::Reader::new(reader).records().map(|r| {
            r.map(|record| record.seq().to_ascii_uppercase())
                .map_err(|e| e.to_string())
        });
        Ok(Box::new(records))
    }
}

fn is_fastq_path(path: &Path) -> bool {
    let name = path.to_string_lossy();
    let stem = name.strip_suffix(".gz").unwrap_or(&name);
    stem.ends_with(".fq") || stem.ends_with(".fastq")
}

fn merge_stats(a: Option<GenomeStats>, b: Option<GenomeStats>) -> Option<GenomeStats> {
    match (a, b) {
        (Some(mut a), Some(b)) => {
            a.merge(b);
            Some(a)
        }
        (a, None) => a,
        (None, b) => b,
    }
}

fn print_summary(report: &ScanReport, config: &Config) {
    eprintln!(
        "{}: {} / {} reads detected",
        "scan".bold(),
        report.reads_detected.to_string().bold(),
        report.reads_scanned
    );

    if let Some(unique) = &report.unique_kmer_result {
        eprintln!();
        eprintln!("Mean coverage: {:.4}", unique.mean_hit);
        let verdict = if unique.verdict == "POSITIVE" {
            unique.verdict.green().bold()
        } else {
            unique.verdict.red().bold()
        };
        eprintln!(
            "Result: {} (threshold: {})",
            verdict, unique.positive_threshold
        );
    }

    if let Some(genomes) = &report.genome_mapping_result {
        eprintln!();
        eprintln!("{}", "Coverage of genomes:".bold());
        for contig in &genomes.genome_coverage {
            eprintln!(
                "{} reads/{} bases/{:.4} mismatch ratio: {}",
                contig.reads, contig.bases, contig.avg_mismatch_ratio, contig.name
            );
        }
    }

    if let Some(collections) = &report.kmer_collection_scan_result {
        eprintln!();
        let mut shown = 0;
        for result in &collections.results {
            if !result.high_confidence {
                continue;
            }
            shown += 1;
            eprintln!(
                "{}, {}, coverage:{:.4}, kmer_count:{}, median_depth:{}, mean_depth:{:.2}",
                shown,
                result.name,
                result.coverage,
                result.kmer_count,
                result.median_hit,
                result.mean_hit
            );
        }
        if shown == 0 {
            eprintln!(
                "No high confidence k-mer coverage found (coverage >= {}, median depth >= {}).",
                config.kc_coverage_high_confidence, config.kc_median_hit_high_confidence
            );
        }
    }
}
