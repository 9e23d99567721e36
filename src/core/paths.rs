use crate::Result;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// Cache the paths to avoid repeated environment lookups
static REGIONPLEX_HOME: OnceLock<PathBuf> = OnceLock::new();
static REGIONPLEX_GENOME_DIR: OnceLock<PathBuf> = OnceLock::new();

pub const OUTPUT_PREFIX: &str = "Regionplex_on_";
pub const RUNNING_LOG: &str = "RUNNING_LOG.txt";
pub const REGION_REPORT: &str = "REGION_REPORT.tsv";
pub const RUN_SUMMARY: &str = "RUN_SUMMARY.json";
pub const AMPLICONS_FASTA: &str = "AMPLICONS.fa";
pub const AMPLICON_INDEX: &str = "CUSTOM_BOWTIE2_INDEX";
pub const UNASSIGNED_READS: &str = "UNASSIGNED.fastq.gz";
pub const AMPLICON_UNASSIGNED_READS: &str = "NOT_ALIGNED_TO_AMPLICONS.fastq.gz";
pub const GENOME_PLACEMENTS: &str = "GENOME_PLACEMENTS.fastq.gz";

/// Get the Regionplex home directory
/// Checks REGIONPLEX_HOME environment variable, falls back to ${HOME}/.regionplex
pub fn regionplex_home() -> PathBuf {
    REGIONPLEX_HOME
        .get_or_init(|| {
            if let Ok(path) = std::env::var("REGIONPLEX_HOME") {
                PathBuf::from(path)
            } else {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".regionplex")
            }
        })
        .clone()
}

/// Get the directory holding uncompressed genome references
/// Checks REGIONPLEX_GENOME_DIR environment variable, falls back to REGIONPLEX_HOME/genomes
pub fn genome_dir() -> PathBuf {
    REGIONPLEX_GENOME_DIR
        .get_or_init(|| {
            if let Ok(path) = std::env::var("REGIONPLEX_GENOME_DIR") {
                PathBuf::from(path)
            } else {
                regionplex_home().join("genomes")
            }
        })
        .clone()
}

/// Cached reference FASTA extracted from an aligner index basename.
pub fn uncompressed_reference_path(genome_dir: &Path, index: &Path) -> PathBuf {
    let flattened = index.to_string_lossy().replace('/', "_");
    genome_dir.join(format!("UNCOMPRESSED_REFERENCE_FROM_{}.fa", flattened))
}

/// Strip read-file extensions: `sample.fastq.gz` -> `sample`.
pub fn read_file_stem(path: &Path) -> String {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    for ext in [".gz", ".fastq", ".fq"] {
        if let Some(stripped) = name.strip_suffix(ext) {
            name = stripped.to_string();
        }
    }
    name
}

/// Run name derived from the read file names.
pub fn run_name_from_reads(r1: &Path, r2: Option<&Path>) -> String {
    match r2 {
        Some(r2) => format!("{}_{}", read_file_stem(r1), read_file_stem(r2)),
        None => read_file_stem(r1),
    }
}

/// File layout of one run's output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    root: PathBuf,
}

impl RunLayout {
    pub fn new(parent: Option<&Path>, name: &str) -> Self {
        let dir = format!("{}{}", OUTPUT_PREFIX, name);
        let root = match parent {
            Some(parent) => parent.join(dir),
            None => PathBuf::from(dir),
        };
        Self { root }
    }

    pub fn at(root: PathBuf) -> Self {
        Self { root }
    }

    /// Create the directory. Returns `false` when it already existed.
    pub fn create(&self) -> Result<bool> {
        if self.root.is_dir() {
            return Ok(false);
        }
        std::fs::create_dir_all(&self.root)?;
        Ok(true)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn join<P: AsRef<Path>>(&self, name: P) -> PathBuf {
        self.root.join(name)
    }

    pub fn running_log(&self) -> PathBuf {
        self.join(RUNNING_LOG)
    }

    pub fn region_report(&self) -> PathBuf {
        self.join(REGION_REPORT)
    }

    pub fn run_summary(&self) -> PathBuf {
        self.join(RUN_SUMMARY)
    }

    pub fn amplicons_fasta(&self) -> PathBuf {
        self.join(AMPLICONS_FASTA)
    }

    pub fn amplicon_index(&self) -> PathBuf {
        self.join(AMPLICON_INDEX)
    }

    pub fn unassigned_reads(&self) -> PathBuf {
        self.join(UNASSIGNED_READS)
    }

    /// Reads no amplicon claimed, handed on to the genome in combined mode.
    pub fn amplicon_unassigned_reads(&self) -> PathBuf {
        self.join(AMPLICON_UNASSIGNED_READS)
    }

    pub fn genome_placements(&self) -> PathBuf {
        self.join(GENOME_PLACEMENTS)
    }

    /// Compressed read container for a region file stem.
    pub fn region_reads(&self, stem: &str) -> PathBuf {
        self.join(format!("{}.fastq.gz", stem))
    }

    pub fn analysis_log(&self, stem: &str) -> PathBuf {
        self.join(format!("{}.analysis.log", stem))
    }
}

/// Point `link` at `target`, replacing whatever `link` was.
pub fn force_symlink(target: &Path, link: &Path) -> Result<()> {
    if link.symlink_metadata().is_ok() {
        std::fs::remove_file(link)?;
    }
    let target = if target.is_absolute() {
        target.to_path_buf()
    } else {
        std::env::current_dir()?.join(target)
    };

    #[cfg(unix)]
    std::os::unix::fs::symlink(&target, link)?;
    #[cfg(not(unix))]
    std::fs::copy(&target, link).map(|_| ())?;

    Ok(())
}

/// Get a human-readable description of the current path configuration
pub fn describe_paths() -> String {
    format!(
        "Regionplex Paths:\n  \
        Home: {}\n  \
        Genomes: {}",
        regionplex_home().display(),
        genome_dir().display(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_run_name_from_reads() {
        assert_eq!(
            run_name_from_reads(Path::new("/data/sample_R1.fastq.gz"), None),
            "sample_R1"
        );
        assert_eq!(
            run_name_from_reads(
                Path::new("lib_R1.fq.gz"),
                Some(Path::new("/x/lib_R2.fastq"))
            ),
            "lib_R1_lib_R2"
        );
    }

    #[test]
    fn test_layout_file_names() {
        let layout = RunLayout::new(Some(Path::new("/tmp/out")), "sample");
        assert_eq!(layout.root(), Path::new("/tmp/out/Regionplex_on_sample"));
        assert_eq!(
            layout.region_reads("AMPL_site1"),
            Path::new("/tmp/out/Regionplex_on_sample/AMPL_site1.fastq.gz")
        );
        assert_eq!(
            layout.analysis_log("AMPL_site1"),
            Path::new("/tmp/out/Regionplex_on_sample/AMPL_site1.analysis.log")
        );
    }

    #[test]
    fn test_uncompressed_reference_name() {
        let path = uncompressed_reference_path(Path::new("/genomes"), Path::new("/idx/hg38/hg38"));
        assert_eq!(
            path,
            Path::new("/genomes/UNCOMPRESSED_REFERENCE_FROM__idx_hg38_hg38.fa")
        );
    }

    #[test]
    fn test_create_reports_existing_directory() {
        let dir = TempDir::new().unwrap();
        let layout = RunLayout::new(Some(dir.path()), "run");
        assert!(layout.create().unwrap());
        assert!(!layout.create().unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_force_symlink_replaces_existing() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.fastq");
        let b = dir.path().join("b.fastq");
        std::fs::write(&a, "A").unwrap();
        std::fs::write(&b, "B").unwrap();
        let link = dir.path().join("link.fastq");

        force_symlink(&a, &link).unwrap();
        force_symlink(&b, &link).unwrap();
        assert_eq!(std::fs::read_to_string(&link).unwrap(), "B");
        assert!(link.symlink_metadata().unwrap().file_type().is_symlink());
    }
}
