//! FASTA ingestion for reference and k-mer files.
//!
//! Accepts plain or gzip-compressed files ending in `.fa`, `.fna` or
//! `.fasta` (plus `.gz` variants); anything else is rejected up front. The
//! record id is the first whitespace-free token after `>`. Sequence lines
//! are concatenated with line endings stripped and are optionally
//! upper-cased; invalid characters are kept in place, since downstream
//! components treat any non-ACGT byte as ambiguous.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use tracing::debug;

use crate::error::ScanError;

const FASTA_EXTENSIONS: [&str; 6] = [".fasta", ".fa", ".fna", ".fasta.gz", ".fa.gz", ".fna.gz"];

/// Returns true when the path carries a recognised FASTA extension.
pub fn is_fasta_path(path: &Path) -> bool {
    let name = path.to_string_lossy();
    FASTA_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

fn is_gzipped(path: &Path) -> bool {
    path.to_string_lossy().ends_with(".gz")
}

/// Opens a text file for buffered reading, decompressing gzip by extension.
///
/// No extension validation; callers that require FASTA naming go through
/// [`open_fasta`].
pub fn open_reader(path: &Path) -> Result<Box<dyn BufRead + Send>, ScanError> {
    let file = File::open(path).map_err(|e| ScanError::io(e, path))?;
    if is_gzipped(path) {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Validates the FASTA extension whitelist, then opens the file.
pub fn open_fasta(path: &Path) -> Result<Box<dyn BufRead + Send>, ScanError> {
    if !is_fasta_path(path) {
        return Err(ScanError::NotFasta {
            path: path.to_path_buf(),
        });
    }
    open_reader(path)
}

/// A FASTA file yielding `(id, sequence)` records.
pub struct FastaSource {
    path: PathBuf,
    force_uppercase: bool,
}

impl FastaSource {
    /// Creates a source that upper-cases sequences on read.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            force_uppercase: true,
        }
    }

    /// Keeps sequence case as found in the file.
    pub fn preserve_case(mut self) -> Self {
        self.force_uppercase = false;
        self
    }

    /// Reads every record into an id-ordered map.
    ///
    /// A repeated id keeps the last record seen, matching plain map
    /// assignment semantics.
    pub fn read_all(&self) -> Result<BTreeMap<String, Vec<u8>>, ScanError> {
        let reader = bio::io::fasta::Reader::new(open_fasta(&self.path)?);
        let mut contigs = BTreeMap::new();
        for record in reader.records() {
            let record = record.map_err(|e| ScanError::io(e, &self.path))?;
            record.check().map_err(|details| ScanError::FastaParse {
                path: self.path.clone(),
                details: details.to_string(),
            })?;
            let mut seq = record.seq().to_vec();
            if self.force_uppercase {
                seq.make_ascii_uppercase();
            }
            contigs.insert(record.id().to_string(), seq);
        }
        debug!(
            path = %self.path.display(),
            contigs = contigs.len(),
            "read FASTA"
        );
        Ok(contigs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_fasta(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(suffix)
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn recognises_fasta_extensions() {
        for name in [
            "ref.fa",
            "ref.fna",
            "ref.fasta",
            "ref.fa.gz",
            "ref.fna.gz",
            "ref.fasta.gz",
        ] {
            assert!(is_fasta_path(Path::new(name)), "{name}");
        }
        for name in ["ref.txt", "ref.fq", "ref.fa.bz2", "ref"] {
            assert!(!is_fasta_path(Path::new(name)), "{name}");
        }
    }

    #[test]
    fn rejects_non_fasta_path() {
        let file = write_fasta(".txt", ">a\nACGT\n");
        let err = FastaSource::new(file.path()).read_all().unwrap_err();
        assert!(matches!(err, ScanError::NotFasta { .. }));
    }

    #[test]
    fn reads_multiline_records() {
        let file = write_fasta(".fa", ">contig1\nACGT\nACGT\n>contig2\nTTTT\n");
        let contigs = FastaSource::new(file.path()).read_all().unwrap();
        assert_eq!(contigs.len(), 2);
        assert_eq!(contigs["contig1"], b"ACGTACGT");
        assert_eq!(contigs["contig2"], b"TTTT");
    }

    #[test]
    fn id_is_first_whitespace_free_token() {
        let file = write_fasta(".fa", ">contig1 some description here\nACGT\n");
        let contigs = FastaSource::new(file.path()).read_all().unwrap();
        assert!(contigs.contains_key("contig1"));
    }

    #[test]
    fn uppercases_by_default() {
        let file = write_fasta(".fa", ">c\nacgtn\n");
        let contigs = FastaSource::new(file.path()).read_all().unwrap();
        assert_eq!(contigs["c"], b"ACGTN");
    }

    #[test]
    fn preserve_case_keeps_soft_masking() {
        let file = write_fasta(".fa", ">c\nacgt\n");
        let contigs = FastaSource::new(file.path())
            .preserve_case()
            .read_all()
            .unwrap();
        assert_eq!(contigs["c"], b"acgt");
    }

    #[test]
    fn ambiguous_characters_stay_in_sequence() {
        let file = write_fasta(".fa", ">c\nACNNGT\n");
        let contigs = FastaSource::new(file.path()).read_all().unwrap();
        assert_eq!(contigs["c"], b"ACNNGT");
    }

    #[test]
    fn reads_gzipped_fasta() {
        use flate2::write::GzEncoder;

        let mut file = tempfile::Builder::new().suffix(".fa.gz").tempfile().unwrap();
        let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b">c\nACGT\n").unwrap();
        file.write_all(&encoder.finish().unwrap()).unwrap();
        file.flush().unwrap();

        let contigs = FastaSource::new(file.path()).read_all().unwrap();
        assert_eq!(contigs["c"], b"ACGT");
    }

    #[test]
    fn crlf_line_endings_are_stripped() {
        let file = write_fasta(".fa", ">c\r\nACGT\r\nACGT\r\n");
        let contigs = FastaSource::new(file.path()).read_all().unwrap();
        assert_eq!(contigs["c"], b"ACGTACGT");
    }

    #[test]
    fn duplicate_id_keeps_last_record() {
        let file = write_fasta(".fa", ">c\nAAAA\n>c\nTTTT\n");
        let contigs = FastaSource::new(file.path()).read_all().unwrap();
        assert_eq!(contigs["c"], b"TTTT");
    }
}
