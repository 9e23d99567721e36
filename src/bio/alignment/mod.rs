//! Interpretation of aligner output.
//!
//! Nothing here runs an aligner; it turns reported placements into genomic
//! spans that the demultiplexer can bucket and cluster.

pub mod cigar;
pub mod sam;

pub use cigar::{Cigar, CigarOp, CigarKind};
pub use sam::SamRecord;

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Strand {
    Forward,
    Reverse,
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strand::Forward => write!(f, "+"),
            Strand::Reverse => write!(f, "-"),
        }
    }
}

/// Half-open reference interval `[start, end)` covered by one placement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GenomicSpan {
    pub reference: String,
    pub start: i64,
    pub end: i64,
    pub strand: Strand,
}

impl GenomicSpan {
    pub fn len(&self) -> i64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Region string understood by `samtools faidx` (1-based, inclusive).
    pub fn faidx_region(&self) -> String {
        format!(
            "{}:{}-{}",
            self.reference,
            self.start.max(1),
            (self.end - 1).max(self.start.max(1))
        )
    }
}

impl fmt::Display for GenomicSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}({})", self.reference, self.start, self.end, self.strand)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_faidx_region_is_inclusive() {
        let span = GenomicSpan {
            reference: "chr2".to_string(),
            start: 100,
            end: 150,
            strand: Strand::Reverse,
        };
        assert_eq!(span.faidx_region(), "chr2:100-149");
        assert_eq!(span.len(), 50);
        assert_eq!(span.to_string(), "chr2:100-150(-)");
    }
}
