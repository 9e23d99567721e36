pub mod alignment;
pub mod fasta;
pub mod fastq;
pub mod genes;
pub mod region;
pub mod sequence;

pub use sequence::{reverse_complement, Sequence};
