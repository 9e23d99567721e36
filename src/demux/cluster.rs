//! Region discovery from read placements.
//!
//! Placements are grouped per reference into maximal clusters of
//! overlapping half-open intervals. Strand is ignored: reads from both
//! orientations of a locus land in the same region.

use crate::bio::alignment::{GenomicSpan, Strand};
use crate::bio::sequence::clean_filename;
use crate::{RegionplexError, Result};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// A region discovered from overlapping read placements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenomicRegion {
    pub reference: String,
    pub start: i64,
    pub end: i64,
    /// Placements merged into this region
    pub reads: u64,
}

impl GenomicRegion {
    pub fn name(&self) -> String {
        format!("REGION_{}_{}_{}", self.reference, self.start, self.end)
    }

    pub fn file_stem(&self) -> String {
        clean_filename(&self.name())
    }

    pub fn span(&self) -> GenomicSpan {
        GenomicSpan {
            reference: self.reference.clone(),
            start: self.start,
            end: self.end,
            strand: Strand::Forward,
        }
    }

    pub fn contains(&self, span: &GenomicSpan) -> bool {
        self.covers(&span.reference, span.start, span.end)
    }

    fn covers(&self, reference: &str, start: i64, end: i64) -> bool {
        reference == self.reference && self.start <= start && end <= self.end
    }
}

/// Interval of one placed read; the reference is an id into `Placements`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Placement {
    pub reference: u32,
    pub start: i64,
    pub end: i64,
}

/// Placements of every read in input order, with reference names stored
/// once. Genome-wide runs hold one entry per placed read, so entries stay
/// fixed-size.
#[derive(Debug, Default)]
pub struct Placements {
    references: Vec<String>,
    ids: HashMap<String, u32>,
    entries: Vec<Placement>,
}

impl Placements {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, span: &GenomicSpan) -> Result<()> {
        let reference = match self.ids.get(&span.reference) {
            Some(&id) => id,
            None => {
                let id = u32::try_from(self.references.len()).map_err(|_| {
                    RegionplexError::Parse("too many reference sequences".to_string())
                })?;
                self.references.push(span.reference.clone());
                self.ids.insert(span.reference.clone(), id);
                id
            }
        };
        self.entries.push(Placement {
            reference,
            start: span.start,
            end: span.end,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&Placement> {
        self.entries.get(position)
    }

    pub fn reference_name(&self, placement: &Placement) -> &str {
        self.references
            .get(placement.reference as usize)
            .map_or("", String::as_str)
    }

    /// Merge placements into regions, sorted by reference name then start.
    ///
    /// Two intervals join the same region when they share at least one base;
    /// intervals that merely touch stay separate. Empty intervals are ignored.
    pub fn cluster(&self) -> Vec<GenomicRegion> {
        let mut sorted: Vec<Placement> = self
            .entries
            .iter()
            .filter(|p| p.end > p.start)
            .copied()
            .collect();
        sorted.sort_unstable();

        let mut regions = Vec::new();
        let mut current: Option<(u32, GenomicRegion)> = None;
        for placement in sorted {
            match current.as_mut() {
                Some((reference, region))
                    if *reference == placement.reference && placement.start < region.end =>
                {
                    region.end = region.end.max(placement.end);
                    region.reads += 1;
                }
                _ => {
                    regions.extend(current.take().map(|(_, region)| region));
                    current = Some((
                        placement.reference,
                        GenomicRegion {
                            reference: self.reference_name(&placement).to_string(),
                            start: placement.start,
                            end: placement.end,
                            reads: 1,
                        },
                    ));
                }
            }
        }
        regions.extend(current.map(|(_, region)| region));

        // ids follow first appearance, names decide the report order
        regions.sort_by(|a, b| a.reference.cmp(&b.reference).then(a.start.cmp(&b.start)));
        regions
    }
}

/// Cluster a set of spans; see [`Placements::cluster`].
pub fn cluster_spans<'a, I>(spans: I) -> Vec<GenomicRegion>
where
    I: IntoIterator<Item = &'a GenomicSpan>,
{
    let mut placements = Placements::new();
    for span in spans {
        // only fails past u32::MAX distinct references
        if placements.push(span).is_err() {
            break;
        }
    }
    placements.cluster()
}

/// Lookup from a placement to the region that absorbed it.
pub struct RegionIndex<'a> {
    by_reference: BTreeMap<&'a str, Vec<(i64, usize)>>,
    regions: &'a [GenomicRegion],
}

impl<'a> RegionIndex<'a> {
    pub fn new(regions: &'a [GenomicRegion]) -> Self {
        let mut by_reference: BTreeMap<&str, Vec<(i64, usize)>> = BTreeMap::new();
        for (i, region) in regions.iter().enumerate() {
            by_reference
                .entry(region.reference.as_str())
                .or_default()
                .push((region.start, i));
        }
        for starts in by_reference.values_mut() {
            starts.sort_unstable();
        }
        Self {
            by_reference,
            regions,
        }
    }

    /// Index into the region slice of the region containing `span`.
    pub fn find(&self, span: &GenomicSpan) -> Option<usize> {
        self.locate(&span.reference, span.start, span.end)
    }

    pub fn locate(&self, reference: &str, start: i64, end: i64) -> Option<usize> {
        let starts = self.by_reference.get(reference)?;
        let pos = starts.partition_point(|(s, _)| *s <= start);
        let (_, idx) = *starts.get(pos.checked_sub(1)?)?;
        self.regions[idx].covers(reference, start, end).then_some(idx)
    }
}
