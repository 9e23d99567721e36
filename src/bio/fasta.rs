//! FASTA I/O for amplicon references and extracted genome slices.
//!
//! Input comes from `samtools faidx` (wrapped lines, `chr:start-end` ids) and
//! from `bowtie2-inspect`; output is the one-line-per-sequence layout used
//! for `AMPLICONS.fa`.

use crate::bio::fastq::open_reader;
use crate::bio::sequence::Sequence;
use crate::{RegionplexError, Result};
use nom::{
    bytes::complete::{tag, take_till},
    character::complete::{line_ending, not_line_ending, space1},
    combinator::opt,
    sequence::{preceded, terminated},
    IResult,
};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

fn is_line_break(c: u8) -> bool {
    c == b'\n' || c == b'\r'
}

/// `>id description` up to and including the line break.
fn header(input: &[u8]) -> IResult<&[u8], (&[u8], Option<&[u8]>)> {
    let (input, _) = tag(b">")(input)?;
    let (input, id) = take_till(|c: u8| c.is_ascii_whitespace())(input)?;
    let (input, description) = opt(preceded(space1, not_line_ending))(input)?;
    let (input, _) = opt(line_ending)(input)?;
    Ok((input, (id, description)))
}

fn residue_line(input: &[u8]) -> IResult<&[u8], &[u8]> {
    terminated(take_till(is_line_break), opt(line_ending))(input)
}

/// Residue lines up to the next header, whitespace dropped and uppercased.
fn residues(mut input: &[u8]) -> IResult<&[u8], Vec<u8>> {
    let mut bases = Vec::new();
    while !input.is_empty() && input[0] != b'>' {
        let (rest, line) = residue_line(input)?;
        bases.extend(
            line.iter()
                .filter(|c| !c.is_ascii_whitespace())
                .map(u8::to_ascii_uppercase),
        );
        // a lone '\r' is neither content nor a line ending
        input = if rest.len() == input.len() { &rest[1..] } else { rest };
    }
    Ok((input, bases))
}

fn record(input: &[u8]) -> IResult<&[u8], Sequence> {
    let (input, (id, description)) = header(input)?;
    let (input, bases) = residues(input)?;
    let mut sequence = Sequence::new(String::from_utf8_lossy(id).to_string(), bases);
    let description = description.map(|d| String::from_utf8_lossy(d).trim().to_string());
    if let Some(description) = description.filter(|d| !d.is_empty()) {
        sequence = sequence.with_description(description);
    }
    Ok((input, sequence))
}

/// Parse every record in `data`. Leading blank lines are allowed; anything
/// else before the first `>` is an error.
pub fn parse_fasta_from_bytes(data: &[u8]) -> Result<Vec<Sequence>> {
    let start = data
        .iter()
        .position(|c| !c.is_ascii_whitespace())
        .unwrap_or(data.len());
    let mut remaining = &data[start..];
    let mut sequences = Vec::new();

    while !remaining.is_empty() {
        if remaining[0] != b'>' {
            return Err(RegionplexError::Parse(
                "FASTA record does not start with '>'".to_string(),
            ));
        }
        let (rest, sequence) = record(remaining)
            .map_err(|_| RegionplexError::Parse("Malformed FASTA record".to_string()))?;
        sequences.push(sequence);
        remaining = rest;
    }

    Ok(sequences)
}

/// Parse a FASTA file, plain or gzip-compressed.
pub fn parse_fasta<P: AsRef<Path>>(path: P) -> Result<Vec<Sequence>> {
    let path = path.as_ref();
    let mut data = Vec::new();
    open_reader(path)?.read_to_end(&mut data)?;
    parse_fasta_from_bytes(&data).map_err(|e| match e {
        RegionplexError::Parse(msg) => {
            RegionplexError::Parse(format!("{}: {}", path.display(), msg))
        }
        other => other,
    })
}

/// Write sequences one line each, the layout aligner index builders expect.
pub fn write_fasta<P: AsRef<Path>>(path: P, sequences: &[Sequence]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for sequence in sequences {
        writeln!(writer, "{}", sequence.header())?;
        writer.write_all(&sequence.sequence)?;
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_header_with_description() {
        let (remaining, (id, description)) = header(b">chr1:100-120 extracted\nACGT").unwrap();
        assert_eq!(id, b"chr1:100-120");
        assert_eq!(description, Some(&b"extracted"[..]));
        assert_eq!(remaining, b"ACGT");
    }

    #[test]
    fn test_parse_wrapped_faidx_output() {
        let fasta = b">chr1:11-30\nacgtacgtac\nGTACGTACGT\n";
        let sequences = parse_fasta_from_bytes(fasta).unwrap();
        assert_eq!(sequences.len(), 1);
        assert_eq!(sequences[0].id, "chr1:11-30");
        assert_eq!(sequences[0].to_string(), "ACGTACGTACGTACGTACGT");
    }

    #[test]
    fn test_crlf_and_blank_lines() {
        let fasta = b"\r\n>a\r\nAC\r\nGT\r\n\r\n>b\r\nTT\r\n";
        let sequences = parse_fasta_from_bytes(fasta).unwrap();
        assert_eq!(sequences.len(), 2);
        assert_eq!(sequences[0].to_string(), "ACGT");
        assert_eq!(sequences[1].to_string(), "TT");
    }

    #[test]
    fn test_header_without_sequence() {
        let sequences = parse_fasta_from_bytes(b">empty\n>full\nAC\n").unwrap();
        assert_eq!(sequences.len(), 2);
        assert!(sequences[0].is_empty());
        assert_eq!(sequences[1].to_string(), "AC");
    }

    #[test]
    fn test_rejects_non_fasta() {
        assert!(parse_fasta_from_bytes(b"@read\nACGT\n+\nIIII\n").is_err());
    }

    #[test]
    fn test_write_then_parse_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("AMPLICONS.fa");
        let sequences = vec![
            Sequence::new("AMPL_one".to_string(), b"ACGTACGT".to_vec()),
            Sequence::new("AMPL_two".to_string(), b"TTTTCCCC".to_vec()),
        ];
        write_fasta(&path, &sequences).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, ">AMPL_one\nACGTACGT\n>AMPL_two\nTTTTCCCC\n");
        assert_eq!(parse_fasta(&path).unwrap(), sequences);
    }
}
