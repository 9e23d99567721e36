use crate::RegionplexError;
use nom::{
    character::complete::{digit1, one_of},
    combinator::{all_consuming, map, map_res},
    multi::many1,
    sequence::pair,
    IResult,
};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CigarKind {
    Match,
    Insertion,
    Deletion,
    Skip,
    SoftClip,
    HardClip,
    Padding,
    SequenceMatch,
    SequenceMismatch,
}

impl CigarKind {
    fn from_code(code: char) -> Self {
        match code {
            'M' => CigarKind::Match,
            'I' => CigarKind::Insertion,
            'D' => CigarKind::Deletion,
            'N' => CigarKind::Skip,
            'S' => CigarKind::SoftClip,
            'H' => CigarKind::HardClip,
            'P' => CigarKind::Padding,
            '=' => CigarKind::SequenceMatch,
            _ => CigarKind::SequenceMismatch,
        }
    }

    pub fn code(&self) -> char {
        match self {
            CigarKind::Match => 'M',
            CigarKind::Insertion => 'I',
            CigarKind::Deletion => 'D',
            CigarKind::Skip => 'N',
            CigarKind::SoftClip => 'S',
            CigarKind::HardClip => 'H',
            CigarKind::Padding => 'P',
            CigarKind::SequenceMatch => '=',
            CigarKind::SequenceMismatch => 'X',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CigarOp {
    pub kind: CigarKind,
    pub len: u32,
}

/// Run-length encoded alignment operations. `*` parses to an empty CIGAR.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Cigar(Vec<CigarOp>);

fn parse_op(input: &str) -> IResult<&str, CigarOp> {
    map(
        pair(
            map_res(digit1, u32::from_str),
            one_of("MIDNSHP=X"),
        ),
        |(len, code)| CigarOp {
            kind: CigarKind::from_code(code),
            len,
        },
    )(input)
}

impl Cigar {
    pub fn new(ops: Vec<CigarOp>) -> Self {
        Self(ops)
    }

    pub fn ops(&self) -> &[CigarOp] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Reference interval `[start, end)` covered by a placement at `pos`.
    ///
    /// Soft-clip runs move the start left by the clipped length; a clip seen
    /// before any reference-consuming run also drags the end with it, so a
    /// leading clip shifts the whole window left. Insertion and hard-clip runs
    /// leave the span unchanged; every other run extends the end.
    pub fn reference_span(&self, pos: i64) -> (i64, i64) {
        let mut start = pos;
        let mut end = pos;

        for op in &self.0 {
            let len = op.len as i64;
            match op.kind {
                CigarKind::SoftClip => {
                    start -= len;
                    if end == pos {
                        end = start;
                    }
                }
                CigarKind::Insertion | CigarKind::HardClip => {}
                _ => end += len,
            }
        }

        (start, end)
    }
}

impl FromStr for Cigar {
    type Err = RegionplexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "*" {
            return Ok(Cigar::default());
        }
        all_consuming(many1(parse_op))(s)
            .map(|(_, ops)| Cigar(ops))
            .map_err(|_| RegionplexError::Parse(format!("Invalid CIGAR string: {}", s)))
    }
}

impl fmt::Display for Cigar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "*");
        }
        for op in &self.0 {
            write!(f, "{}{}", op.len, op.kind.code())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_parse_and_display() {
        let cigar: Cigar = "5S10M3D10M2I4M".parse().unwrap();
        assert_eq!(cigar.ops().len(), 6);
        assert_eq!(cigar.ops()[0], CigarOp { kind: CigarKind::SoftClip, len: 5 });
        assert_eq!(cigar.ops()[2], CigarOp { kind: CigarKind::Deletion, len: 3 });
        assert_eq!(cigar.to_string(), "5S10M3D10M2I4M");
    }

    #[test]
    fn test_unavailable_cigar() {
        let cigar: Cigar = "*".parse().unwrap();
        assert!(cigar.is_empty());
        assert_eq!(cigar.reference_span(40), (40, 40));
    }

    #[rstest]
    #[case("")]
    #[case("10")]
    #[case("M10")]
    #[case("10Q")]
    #[case("10M 5S")]
    fn test_invalid_cigar(#[case] input: &str) {
        assert!(input.parse::<Cigar>().is_err());
    }

    #[rstest]
    #[case("50M", 100, (100, 150))]
    #[case("20M5I20M", 100, (100, 140))]
    #[case("20M5D20M", 100, (100, 145))]
    #[case("5H20M", 100, (100, 120))]
    #[case("20M100N20M", 100, (100, 240))]
    #[case("5S10M3D10M", 100, (95, 118))]
    #[case("10M4S", 100, (96, 110))]
    fn test_reference_span(#[case] cigar: &str, #[case] pos: i64, #[case] expected: (i64, i64)) {
        let cigar: Cigar = cigar.parse().unwrap();
        assert_eq!(cigar.reference_span(pos), expected);
    }
}
