//! Region catalog: amplicon definitions loaded from a tab-separated file.
//!
//! Columns are `Name, Amplicon_Sequence, sgRNA, Expected_HDR, Coding_sequence`;
//! `#` starts a comment line. Validation never stops at the first problem:
//! every row is checked and all issues are returned together in a
//! [`ValidationReport`] before any reads are aligned.

use crate::bio::sequence::{clean_filename, invalid_nucleotides, reverse_complement, Sequence};
use crate::{RegionplexError, Result};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// File-name prefix of amplicon references and their read containers.
pub const AMPLICON_PREFIX: &str = "AMPL_";

const MISSING_VALUES: &[&str] = &["NA", "N/A", "NaN", "nan", "null", "None"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Region {
    pub name: String,
    pub sequence: String,
    pub guide: Option<String>,
    pub expected_hdr: Option<String>,
    pub coding_sequence: Option<String>,
    /// Expected cleavage offsets of the guide within `sequence`
    pub cut_offsets: Vec<usize>,
}

impl Region {
    /// Name used for this region's reference header and read container.
    pub fn file_stem(&self) -> String {
        amplicon_file_stem(&self.name)
    }
}

pub fn amplicon_file_stem(name: &str) -> String {
    format!("{}{}", AMPLICON_PREFIX, clean_filename(name))
}

/// One raw row of the region description file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionRow {
    pub name: Option<String>,
    pub amplicon_sequence: Option<String>,
    pub sgrna: Option<String>,
    pub expected_hdr: Option<String>,
    pub coding_sequence: Option<String>,
}

fn field(record: &csv::StringRecord, index: usize) -> Option<String> {
    record
        .get(index)
        .map(str::trim)
        .filter(|v| !v.is_empty() && !MISSING_VALUES.contains(v))
        .map(str::to_string)
}

fn uppercase(value: Option<String>) -> Option<String> {
    value.map(|v| v.to_ascii_uppercase())
}

impl RegionRow {
    fn from_record(record: &csv::StringRecord) -> Self {
        Self {
            name: field(record, 0),
            amplicon_sequence: field(record, 1),
            sgrna: field(record, 2),
            expected_hdr: field(record, 3),
            coding_sequence: field(record, 4),
        }
    }

    fn is_column_header(&self) -> bool {
        matches!(
            (&self.name, &self.amplicon_sequence),
            (Some(name), Some(seq))
                if name.eq_ignore_ascii_case("name") && seq.eq_ignore_ascii_case("amplicon_sequence")
        )
    }

    fn normalized(self) -> Self {
        Self {
            name: self.name,
            amplicon_sequence: uppercase(self.amplicon_sequence),
            sgrna: uppercase(self.sgrna),
            expected_hdr: uppercase(self.expected_hdr),
            coding_sequence: uppercase(self.coding_sequence),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceField {
    Amplicon,
    Guide,
}

impl fmt::Display for SequenceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceField::Amplicon => write!(f, "amplicon"),
            SequenceField::Guide => write!(f, "sgRNA"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    DuplicateSequence { first: String, second: String },
    DuplicateName { name: String },
    InvalidNucleotide { region: String, field: SequenceField, characters: Vec<char> },
    GuideNotFound { region: String, guide: String },
    FilenameCollision { first: String, second: String, file_name: String },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::DuplicateSequence { first, second } => write!(
                f,
                "amplicons {} and {} have the same sequence; amplicon sequences must be distinct",
                first, second
            ),
            ValidationIssue::DuplicateName { name } => {
                write!(f, "amplicon name {} is used more than once", name)
            }
            ValidationIssue::InvalidNucleotide { region, field, characters } => {
                let chars: Vec<String> = characters.iter().map(|c| c.to_string()).collect();
                write!(
                    f,
                    "the {} sequence of {} contains invalid characters: {}",
                    field,
                    region,
                    chars.join(" ")
                )
            }
            ValidationIssue::GuideNotFound { region, guide } => write!(
                f,
                "the sgRNA {} is not present in the amplicon sequence of {} (either orientation)",
                guide, region
            ),
            ValidationIssue::FilenameCollision { first, second, file_name } => write!(
                f,
                "amplicons {} and {} would both be written to {}",
                first, second, file_name
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn new(issues: Vec<ValidationIssue>) -> Self {
        Self { issues }
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn has_duplicate_sequence(&self) -> bool {
        self.issues
            .iter()
            .any(|i| matches!(i, ValidationIssue::DuplicateSequence { .. }))
    }

    pub fn has_duplicate_name(&self) -> bool {
        self.issues
            .iter()
            .any(|i| matches!(i, ValidationIssue::DuplicateName { .. }))
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, issue) in self.issues.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "  - {}", issue)?;
        }
        Ok(())
    }
}

/// Cut offsets of `guide` within `amplicon`: `start + len - 3` for each forward
/// match, `start + 2` for each reverse-complement match.
pub fn guide_cut_offsets(amplicon: &str, guide: &str) -> Vec<usize> {
    if guide.is_empty() {
        return Vec::new();
    }

    let forward = amplicon
        .match_indices(guide)
        .map(|(start, _)| (start + guide.len()).saturating_sub(3));
    let rc = reverse_complement(guide);
    let reverse = amplicon.match_indices(rc.as_str()).map(|(start, _)| start + 2);

    forward.chain(reverse).collect()
}

/// Validate one normalized row on its own: alphabet and guide placement.
pub fn validate_region(
    name: &str,
    sequence: &str,
    guide: Option<&str>,
) -> std::result::Result<Vec<usize>, ValidationIssue> {
    let wrong = invalid_nucleotides(sequence);
    if !wrong.is_empty() {
        return Err(ValidationIssue::InvalidNucleotide {
            region: name.to_string(),
            field: SequenceField::Amplicon,
            characters: wrong,
        });
    }

    let Some(guide) = guide else {
        return Ok(Vec::new());
    };

    let wrong = invalid_nucleotides(guide);
    if !wrong.is_empty() {
        return Err(ValidationIssue::InvalidNucleotide {
            region: name.to_string(),
            field: SequenceField::Guide,
            characters: wrong,
        });
    }

    let offsets = guide_cut_offsets(sequence, guide);
    if offsets.is_empty() {
        return Err(ValidationIssue::GuideNotFound {
            region: name.to_string(),
            guide: guide.to_string(),
        });
    }
    Ok(offsets)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionCatalog {
    regions: IndexMap<String, Region>,
}

impl RegionCatalog {
    /// Load and validate a region description file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| RegionplexError::input_access(path, e))?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let rows = Self::parse_rows(reader)?;
        Self::from_rows(rows).map_err(RegionplexError::Validation)
    }

    pub fn parse_rows<R: Read>(reader: R) -> Result<Vec<RegionRow>> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .comment(Some(b'#'))
            .flexible(true)
            .from_reader(reader);

        let mut rows = Vec::new();
        for (index, record) in csv_reader.records().enumerate() {
            let record = record
                .map_err(|e| RegionplexError::Parse(format!("Region file row {}: {}", index + 1, e)))?;
            let row = RegionRow::from_record(&record);
            if index == 0 && row.is_column_header() {
                continue;
            }
            rows.push(row);
        }
        Ok(rows)
    }

    /// Build a catalog from raw rows, collecting every validation issue.
    pub fn from_rows(rows: Vec<RegionRow>) -> std::result::Result<Self, ValidationReport> {
        let rows: Vec<(String, String, RegionRow)> = rows
            .into_iter()
            .map(RegionRow::normalized)
            .filter_map(|row| match (row.name.clone(), row.amplicon_sequence.clone()) {
                (Some(name), Some(seq)) => Some((name, seq, row)),
                _ => {
                    tracing::debug!("Dropping region row without name or sequence: {:?}", row);
                    None
                }
            })
            .collect();

        let mut issues = Vec::new();

        let mut seen_sequences: HashMap<&str, &str> = HashMap::new();
        for (name, seq, _) in &rows {
            if let Some(first) = seen_sequences.get(seq.as_str()) {
                issues.push(ValidationIssue::DuplicateSequence {
                    first: first.to_string(),
                    second: name.clone(),
                });
            } else {
                seen_sequences.insert(seq, name);
            }
        }

        let mut name_counts: IndexMap<&str, usize> = IndexMap::new();
        for (name, _, _) in &rows {
            *name_counts.entry(name.as_str()).or_insert(0) += 1;
        }
        for (name, count) in &name_counts {
            if *count > 1 {
                issues.push(ValidationIssue::DuplicateName {
                    name: name.to_string(),
                });
            }
        }

        let mut file_names: HashMap<String, &str> = HashMap::new();
        for name in name_counts.keys() {
            let file_name = amplicon_file_stem(name);
            if let Some(first) = file_names.get(&file_name) {
                issues.push(ValidationIssue::FilenameCollision {
                    first: first.to_string(),
                    second: name.to_string(),
                    file_name,
                });
            } else {
                file_names.insert(file_name, name);
            }
        }

        let mut regions = IndexMap::new();
        for (name, sequence, row) in &rows {
            match validate_region(name, sequence, row.sgrna.as_deref()) {
                Ok(cut_offsets) => {
                    regions.entry(name.clone()).or_insert_with(|| Region {
                        name: name.clone(),
                        sequence: sequence.clone(),
                        guide: row.sgrna.clone(),
                        expected_hdr: row.expected_hdr.clone(),
                        coding_sequence: row.coding_sequence.clone(),
                        cut_offsets,
                    });
                }
                Err(issue) => issues.push(issue),
            }
        }

        if issues.is_empty() {
            Ok(Self { regions })
        } else {
            Err(ValidationReport::new(issues))
        }
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Region> {
        self.regions.get(name)
    }

    /// Regions in file order.
    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.values()
    }

    /// Reference records for the amplicon alignment index, headed by file stem.
    pub fn reference_sequences(&self) -> Vec<Sequence> {
        self.iter()
            .map(|r| Sequence::new(r.file_stem(), r.sequence.as_bytes().to_vec()))
            .collect()
    }

    /// Map from reference header (as written by [`reference_sequences`]) to region name.
    ///
    /// [`reference_sequences`]: RegionCatalog::reference_sequences
    pub fn reference_names(&self) -> HashMap<String, String> {
        self.iter()
            .map(|r| (r.file_stem(), r.name.clone()))
            .collect()
    }
}
