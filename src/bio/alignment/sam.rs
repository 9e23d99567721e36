use super::cigar::Cigar;
use super::{GenomicSpan, Strand};
use crate::{RegionplexError, Result};

pub const FLAG_UNMAPPED: u16 = 0x4;
pub const FLAG_REVERSE: u16 = 0x10;
pub const FLAG_SECONDARY: u16 = 0x100;
pub const FLAG_SUPPLEMENTARY: u16 = 0x800;

/// One alignment line: reference, leftmost position, run encoding, strand
/// flag, and the read itself.
#[derive(Debug, Clone, PartialEq)]
pub struct SamRecord {
    pub qname: String,
    pub flag: u16,
    pub rname: String,
    /// 1-based leftmost position, 0 when unavailable
    pub pos: i64,
    pub mapq: u8,
    pub cigar: Cigar,
    pub seq: String,
    pub qual: String,
    /// `AS:i` alignment score, when the aligner reports one
    pub score: Option<i64>,
}

impl SamRecord {
    /// Parse a SAM body line. Header lines (`@..`) yield `None`.
    pub fn parse_line(line: &str) -> Result<Option<Self>> {
        let line = line.trim_end_matches(['\n', '\r']);
        if line.is_empty() || line.starts_with('@') {
            return Ok(None);
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 11 {
            return Err(RegionplexError::Parse(format!(
                "SAM line has {} columns, expected at least 11: {}",
                fields.len(),
                line
            )));
        }

        let parse_num = |value: &str, column: &str| -> Result<i64> {
            value.parse::<i64>().map_err(|_| {
                RegionplexError::Parse(format!("Invalid SAM {} value '{}'", column, value))
            })
        };

        let flag = parse_num(fields[1], "FLAG")? as u16;
        let pos = parse_num(fields[3], "POS")?;
        let mapq = parse_num(fields[4], "MAPQ")?.clamp(0, 255) as u8;
        let cigar: Cigar = fields[5].parse()?;

        let score = fields[11..]
            .iter()
            .find_map(|tag| tag.strip_prefix("AS:i:"))
            .and_then(|v| v.parse::<i64>().ok());

        Ok(Some(SamRecord {
            qname: fields[0].to_string(),
            flag,
            rname: fields[2].to_string(),
            pos,
            mapq,
            cigar,
            seq: fields[9].to_string(),
            qual: fields[10].to_string(),
            score,
        }))
    }

    /// Unmapped flag, or a placement without a usable reference name.
    pub fn is_unmapped(&self) -> bool {
        self.flag & FLAG_UNMAPPED != 0 || self.rname == "*"
    }

    pub fn is_reverse(&self) -> bool {
        self.flag & FLAG_REVERSE != 0
    }

    pub fn is_secondary(&self) -> bool {
        self.flag & FLAG_SECONDARY != 0
    }

    pub fn is_supplementary(&self) -> bool {
        self.flag & FLAG_SUPPLEMENTARY != 0
    }

    /// Every input read gets exactly one primary line, mapped or not.
    pub fn is_primary(&self) -> bool {
        !self.is_secondary() && !self.is_supplementary()
    }

    pub fn strand(&self) -> Strand {
        if self.is_reverse() {
            Strand::Reverse
        } else {
            Strand::Forward
        }
    }

    /// Reference span of a mapped placement.
    pub fn span(&self) -> Option<GenomicSpan> {
        if self.is_unmapped() {
            return None;
        }
        let (start, end) = self.cigar.reference_span(self.pos);
        Some(GenomicSpan {
            reference: self.rname.clone(),
            start,
            end,
            strand: self.strand(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAPPED: &str =
        "read1\t16\tchr1\t100\t42\t5S10M3D10M\t*\t0\t0\tACGTACGTACGTACGTACGTACGTA\tIIIIIIIIIIIIIIIIIIIIIIIII\tAS:i:-12\tXS:i:-20";

    #[test]
    fn test_parse_mapped_record() {
        let record = SamRecord::parse_line(MAPPED).unwrap().unwrap();
        assert_eq!(record.qname, "read1");
        assert_eq!(record.rname, "chr1");
        assert_eq!(record.pos, 100);
        assert_eq!(record.mapq, 42);
        assert_eq!(record.score, Some(-12));
        assert!(record.is_reverse());
        assert!(!record.is_unmapped());

        let span = record.span().unwrap();
        assert_eq!(span.start, 95);
        assert_eq!(span.end, 118);
        assert_eq!(span.strand, Strand::Reverse);
    }

    #[test]
    fn test_header_lines_are_skipped() {
        assert!(SamRecord::parse_line("@HD\tVN:1.0\tSO:unsorted").unwrap().is_none());
        assert!(SamRecord::parse_line("").unwrap().is_none());
    }

    #[test]
    fn test_unmapped_record_has_no_span() {
        let line = "read2\t4\t*\t0\t0\t*\t*\t0\t0\tACGT\tIIII\tYT:Z:UU";
        let record = SamRecord::parse_line(line).unwrap().unwrap();
        assert!(record.is_unmapped());
        assert!(record.span().is_none());
        assert_eq!(record.score, None);
    }

    #[test]
    fn test_flagged_unmapped_with_reference_is_unmapped() {
        let line = "read3\t4\tAMPL_one\t12\t0\t10M\t*\t0\t0\tACGTACGTAC\tIIIIIIIIII";
        let record = SamRecord::parse_line(line).unwrap().unwrap();
        assert!(record.is_unmapped());
        assert!(record.span().is_none());
    }

    #[test]
    fn test_truncated_line_is_rejected() {
        assert!(SamRecord::parse_line("read\t0\tchr1\t1").is_err());
        assert!(SamRecord::parse_line("read\tx\tchr1\t1\t0\t4M\t*\t0\t0\tACGT\tIIII").is_err());
    }
}
