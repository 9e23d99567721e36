use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

/// Nucleotides accepted in region and guide sequences.
pub const NUCLEOTIDE_ALPHABET: &[u8] = b"ACGTN";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sequence {
    pub id: String,
    pub description: Option<String>,
    pub sequence: Vec<u8>,
}

impl Sequence {
    pub fn new(id: String, sequence: Vec<u8>) -> Self {
        Self {
            id,
            description: None,
            sequence,
        }
    }

    pub fn with_description(mut self, description: String) -> Self {
        self.description = Some(description);
        self
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn to_string(&self) -> String {
        String::from_utf8_lossy(&self.sequence).to_string()
    }

    pub fn header(&self) -> String {
        match &self.description {
            Some(desc) => format!(">{} {}", self.id, desc),
            None => format!(">{}", self.id),
        }
    }
}

fn complement(base: char) -> char {
    match base {
        'A' => 'T',
        'C' => 'G',
        'G' => 'C',
        'T' => 'A',
        'N' => 'N',
        '_' => '_',
        other => other,
    }
}

/// Reverse complement of a nucleotide string, uppercased.
pub fn reverse_complement(seq: &str) -> String {
    seq.chars()
        .rev()
        .map(|c| complement(c.to_ascii_uppercase()))
        .collect()
}

/// Distinct characters of `seq` outside {A,C,G,T,N}, in order of first appearance.
pub fn invalid_nucleotides(seq: &str) -> Vec<char> {
    let mut wrong = Vec::new();
    for c in seq.chars().map(|c| c.to_ascii_uppercase()) {
        let valid = c.is_ascii() && NUCLEOTIDE_ALPHABET.contains(&(c as u8));
        if !valid && !wrong.contains(&c) {
            wrong.push(c);
        }
    }
    wrong
}

const FILENAME_PUNCTUATION: &str = "+-_.()";

/// Reduce a region name to characters that are safe in a file name.
///
/// Accented letters are decomposed first so they keep their base letter.
pub fn clean_filename(name: &str) -> String {
    name.nfkd()
        .filter(|c| c.is_ascii_alphanumeric() || FILENAME_PUNCTUATION.contains(*c))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reverse_complement() {
        assert_eq!(reverse_complement("ACGTN"), "NACGT");
        assert_eq!(reverse_complement("aacc"), "GGTT");
        assert_eq!(reverse_complement(""), "");
    }

    #[test]
    fn test_invalid_nucleotides_reports_each_once() {
        assert!(invalid_nucleotides("ACGTNacgtn").is_empty());
        assert_eq!(invalid_nucleotides("ACXGTXR"), vec!['X', 'R']);
        assert_eq!(invalid_nucleotides("AC GT"), vec![' ']);
    }

    #[test]
    fn test_clean_filename() {
        assert_eq!(clean_filename("AMPL_site 1/β"), "AMPL_site1");
        assert_eq!(clean_filename("EMX1(+).v2"), "EMX1(+).v2");
    }

    #[test]
    fn test_clean_filename_folds_accents() {
        assert_eq!(clean_filename("Exón1"), "Exon1");
        assert_eq!(clean_filename("Ångström_ﬁx"), "Angstrom_fix");
    }

    #[test]
    fn test_header() {
        let seq = Sequence::new("amp".to_string(), b"ACGT".to_vec());
        assert_eq!(seq.header(), ">amp");
        let seq = seq.with_description("target".to_string());
        assert_eq!(seq.header(), ">amp target");
        assert_eq!(seq.len(), 4);
    }
}
