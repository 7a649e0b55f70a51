//! Error types for virascan.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced while building indices or ingesting sequence files.
///
/// Build-time errors are fatal to the run. Per-read conditions (a read too
/// short to key, hash-slot aliasing) are not errors; the scan paths recover
/// from them locally.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The file does not carry a recognised FASTA extension.
    #[error(
        "FASTA file should have a name like *.fasta, *.fa or *.fna \
         (optionally .gz), not: '{path}'"
    )]
    NotFasta { path: PathBuf },

    /// I/O failure while reading an input file.
    #[error("failed to read '{path}': {source}")]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failure while parsing FASTA records.
    #[error("failed to parse FASTA record in '{path}': {details}")]
    FastaParse { path: PathBuf, details: String },

    /// The unique k-mer file produced no usable k-mer.
    #[error("no unique k-mer loaded from {origin}")]
    EmptyUniqueSet { origin: String },

    /// A k-mer longer than 32 bases cannot be packed into a 64-bit key.
    #[error("k-mer key length cannot be >32: {len}")]
    KeyTooLong { len: usize },

    /// More collections than the slot table can address.
    #[error("too many collections in {origin}: at most {max} are supported")]
    TooManyCollections { origin: String, max: u32 },

    /// A configuration value is out of its accepted range.
    #[error("invalid option: {details}")]
    InvalidOption { details: String },

    /// Report serialisation failure.
    #[error("failed to serialise report: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScanError {
    pub(crate) fn io(source: std::io::Error, path: &std::path::Path) -> Self {
        Self::Io {
            source,
            path: path.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_fasta_display() {
        let err = ScanError::NotFasta {
            path: PathBuf::from("reads.txt"),
        };
        assert!(err.to_string().contains("reads.txt"));
        assert!(err.to_string().contains("*.fasta"));
    }

    #[test]
    fn key_too_long_display() {
        let err = ScanError::KeyTooLong { len: 40 };
        assert_eq!(err.to_string(), "k-mer key length cannot be >32: 40");
    }

    #[test]
    fn io_error_keeps_path() {
        let err = ScanError::io(
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
            std::path::Path::new("ref.fa"),
        );
        assert!(err.to_string().contains("ref.fa"));
    }
}
