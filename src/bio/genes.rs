//! Gene annotation lookup for discovered and placed regions.
//!
//! The table is a (usually gzip-compressed) tab-separated export of a gene
//! track with at least `chrom`, `txStart`, `txEnd` and `name` columns; `name2`
//! is used as the display symbol when present.

use crate::bio::alignment::GenomicSpan;
use crate::bio::fastq::open_reader;
use crate::{RegionplexError, Result};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneRecord {
    pub chrom: String,
    pub tx_start: i64,
    pub tx_end: i64,
    pub name: String,
    pub name2: Option<String>,
}

impl GeneRecord {
    /// `symbol (transcript)` label.
    pub fn label(&self) -> String {
        format!("{} ({})", self.name2.as_deref().unwrap_or(&self.name), self.name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct GeneAnnotations {
    by_chrom: HashMap<String, Vec<GeneRecord>>,
}

fn column(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.trim_start_matches('#').eq_ignore_ascii_case(name))
}

impl GeneAnnotations {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = open_reader(path)?;
        Self::from_reader(reader).map_err(|e| match e {
            RegionplexError::Parse(msg) => {
                RegionplexError::Parse(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .flexible(true)
            .from_reader(reader);

        let headers = csv_reader
            .headers()
            .map_err(|e| RegionplexError::Parse(format!("Gene annotation header: {}", e)))?
            .clone();

        let required = |name: &str| {
            column(&headers, name).ok_or_else(|| {
                RegionplexError::Parse(format!("Gene annotation table has no '{}' column", name))
            })
        };
        let chrom_col = required("chrom")?;
        let start_col = required("txStart")?;
        let end_col = required("txEnd")?;
        let name_col = required("name")?;
        let name2_col = column(&headers, "name2");

        let mut by_chrom: HashMap<String, Vec<GeneRecord>> = HashMap::new();
        for (line, record) in csv_reader.records().enumerate() {
            let record = record
                .map_err(|e| RegionplexError::Parse(format!("Gene annotation row {}: {}", line + 2, e)))?;

            let get = |idx: usize| record.get(idx).unwrap_or("").trim();
            let coord = |idx: usize| {
                get(idx).parse::<i64>().map_err(|_| {
                    RegionplexError::Parse(format!(
                        "Gene annotation row {}: invalid coordinate '{}'",
                        line + 2,
                        get(idx)
                    ))
                })
            };

            let gene = GeneRecord {
                chrom: get(chrom_col).to_string(),
                tx_start: coord(start_col)?,
                tx_end: coord(end_col)?,
                name: get(name_col).to_string(),
                name2: name2_col.map(get).filter(|v| !v.is_empty()).map(str::to_string),
            };
            by_chrom.entry(gene.chrom.clone()).or_default().push(gene);
        }

        for genes in by_chrom.values_mut() {
            genes.sort_by_key(|g| (g.tx_start, g.tx_end));
        }

        tracing::debug!(
            "Loaded {} gene records on {} references",
            by_chrom.values().map(Vec::len).sum::<usize>(),
            by_chrom.len()
        );

        Ok(Self { by_chrom })
    }

    /// Genes whose transcript touches `span` (inclusive on both ends).
    pub fn overlapping(&self, span: &GenomicSpan) -> Vec<&GeneRecord> {
        let Some(genes) = self.by_chrom.get(&span.reference) else {
            return Vec::new();
        };
        genes
            .iter()
            .take_while(|g| g.tx_start <= span.end)
            .filter(|g| span.start <= g.tx_end)
            .collect()
    }

    /// Comma-joined labels of the overlapping genes; empty when none.
    pub fn describe(&self, span: &GenomicSpan) -> String {
        self.overlapping(span)
            .iter()
            .map(|g| g.label())
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn len(&self) -> usize {
        self.by_chrom.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_chrom.is_empty()
    }
}
