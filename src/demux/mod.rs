//! Alignment-based demultiplexing of the processed read stream.
//!
//! Every read ends up in exactly one container: the region it aligned to, or
//! the unassigned bucket. Containers are finished before any count is
//! reported, so counts are always complete.

pub mod buckets;
pub mod cluster;

pub use buckets::{BucketSet, DEFAULT_MAX_OPEN_BUCKETS};
pub use cluster::{cluster_spans, GenomicRegion, Placement, Placements, RegionIndex};

use crate::bio::alignment::{GenomicSpan, SamRecord};
use crate::bio::fasta::write_fasta;
use crate::bio::fastq::{for_each_record, FastqWriter};
use crate::bio::region::RegionCatalog;
use crate::bio::sequence::reverse_complement;
use crate::core::mode::OperatingMode;
use crate::core::paths::RunLayout;
use crate::tools::{Aligner, ReadSource};
use crate::{RegionplexError, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum BucketKey {
    Amplicon(String),
    Genomic(String),
    Unassigned,
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BucketKey::Amplicon(name) | BucketKey::Genomic(name) => write!(f, "{}", name),
            BucketKey::Unassigned => write!(f, "unassigned"),
        }
    }
}

/// Reads routed to one destination, materialized as a compressed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadBucket {
    pub key: BucketKey,
    pub path: PathBuf,
    pub reads: u64,
}

#[derive(Debug, Clone)]
pub struct AmpliconAssignment {
    /// One bucket per catalog region, in catalog order
    pub buckets: Vec<ReadBucket>,
    pub unassigned: ReadBucket,
    pub total_reads: u64,
}

#[derive(Debug, Clone)]
pub struct DiscoveredRegion {
    pub region: GenomicRegion,
    pub bucket: ReadBucket,
}

#[derive(Debug, Clone)]
pub struct GenomeAssignment {
    pub regions: Vec<DiscoveredRegion>,
    pub unassigned: ReadBucket,
    pub total_reads: u64,
}

/// Outcome of demultiplexing a run in any mode.
#[derive(Debug, Clone)]
pub struct DemuxResult {
    pub amplicons: Vec<ReadBucket>,
    pub discovered: Vec<DiscoveredRegion>,
    pub unassigned: ReadBucket,
    pub total_reads: u64,
}

impl DemuxResult {
    pub fn aligned_reads(&self) -> u64 {
        self.total_reads.saturating_sub(self.unassigned.reads)
    }
}

/// Pick the placement a read is assigned to.
///
/// Unmapped and supplementary records never win. Among the rest the highest
/// `AS:i` score wins; equal scores go to the lexicographically lowest
/// reference name, so the choice does not depend on aligner output order.
pub fn best_placement(records: &[SamRecord]) -> Option<&SamRecord> {
    records
        .iter()
        .filter(|r| !r.is_unmapped() && !r.is_supplementary())
        .filter(|r| r.span().map_or(false, |s| !s.is_empty()))
        .max_by(|a, b| {
            a.score
                .cmp(&b.score)
                .then_with(|| b.rname.cmp(&a.rname))
                .then_with(|| b.pos.cmp(&a.pos))
        })
}

/// Read bases and qualities oriented like `target`.
///
/// Secondary records may omit the sequence (`*`); it is then taken from a
/// sibling record and flipped when that record lies on the other strand.
fn read_bases<'r>(records: &'r [SamRecord], target: Option<&'r SamRecord>) -> (String, String) {
    let target = match target.or_else(|| records.first()) {
        Some(t) => t,
        None => return (String::new(), String::new()),
    };
    if target.seq != "*" {
        return (target.seq.clone(), target.qual.clone());
    }
    match records.iter().find(|r| r.seq != "*") {
        Some(source) if source.is_reverse() != target.is_reverse() => (
            reverse_complement(&source.seq),
            source.qual.chars().rev().collect(),
        ),
        Some(source) => (source.seq.clone(), source.qual.clone()),
        None => (String::new(), String::new()),
    }
}

/// Group consecutive records of the same read and hand each group on.
///
/// A second primary record opens a new group even under the same name, so
/// input reads sharing a name are still counted and routed one by one.
fn for_each_read(
    aligner: &dyn Aligner,
    index: &Path,
    reads: &ReadSource<'_>,
    mut on_read: impl FnMut(&[SamRecord]) -> Result<()>,
) -> Result<u64> {
    let mut pending: Vec<SamRecord> = Vec::new();
    let mut has_primary = false;
    let mut total = 0u64;

    aligner.align(index, reads, &mut |record| {
        let new_read = pending.first().map_or(false, |p| {
            p.qname != record.qname || (has_primary && record.is_primary())
        });
        if new_read {
            on_read(&pending)?;
            total += 1;
            pending.clear();
            has_primary = false;
        }
        has_primary |= record.is_primary();
        pending.push(record);
        Ok(())
    })?;

    if !pending.is_empty() {
        on_read(&pending)?;
        total += 1;
    }
    Ok(total)
}

pub struct Demultiplexer<'a> {
    aligner: &'a dyn Aligner,
    layout: &'a RunLayout,
    max_open_buckets: usize,
}

impl<'a> Demultiplexer<'a> {
    pub fn new(aligner: &'a dyn Aligner, layout: &'a RunLayout) -> Self {
        Self {
            aligner,
            layout,
            max_open_buckets: DEFAULT_MAX_OPEN_BUCKETS,
        }
    }

    pub fn with_max_open_buckets(mut self, max_open: usize) -> Self {
        self.max_open_buckets = max_open;
        self
    }

    /// Resolve reads for the run's mode. Combined mode sends only the reads
    /// no amplicon claimed on to the genome.
    pub fn run(
        &self,
        mode: OperatingMode,
        catalog: Option<&RegionCatalog>,
        genome_index: Option<&Path>,
        reads: &Path,
    ) -> Result<DemuxResult> {
        let missing = |what: &str| {
            RegionplexError::Configuration(format!("{} mode needs {}", mode, what))
        };

        match mode {
            OperatingMode::AmpliconsOnly => {
                let catalog = catalog.ok_or_else(|| missing("a region catalog"))?;
                let assigned =
                    self.assign_amplicons(catalog, reads, &self.layout.unassigned_reads())?;
                Ok(DemuxResult {
                    amplicons: assigned.buckets,
                    discovered: Vec::new(),
                    unassigned: assigned.unassigned,
                    total_reads: assigned.total_reads,
                })
            }
            OperatingMode::GenomeOnly => {
                let index = genome_index.ok_or_else(|| missing("a genome index"))?;
                let discovered =
                    self.discover_regions(index, reads, &self.layout.unassigned_reads())?;
                Ok(DemuxResult {
                    amplicons: Vec::new(),
                    discovered: discovered.regions,
                    unassigned: discovered.unassigned,
                    total_reads: discovered.total_reads,
                })
            }
            OperatingMode::AmpliconsAndGenome => {
                let catalog = catalog.ok_or_else(|| missing("a region catalog"))?;
                let index = genome_index.ok_or_else(|| missing("a genome index"))?;

                let assigned =
                    self.assign_amplicons(catalog, reads, &self.layout.amplicon_unassigned_reads())?;
                if assigned.unassigned.reads == 0 {
                    tracing::info!("Every read aligned to an amplicon, skipping the genome");
                    let mut unassigned = BucketSet::new(1);
                    unassigned.register(BucketKey::Unassigned, self.layout.unassigned_reads())?;
                    let unassigned = unassigned.finish()?.pop().ok_or_else(|| {
                        RegionplexError::Parse("unassigned container missing".to_string())
                    })?;
                    return Ok(DemuxResult {
                        amplicons: assigned.buckets,
                        discovered: Vec::new(),
                        unassigned,
                        total_reads: assigned.total_reads,
                    });
                }

                tracing::info!(
                    "{} of {} reads did not align to any amplicon, aligning them to the genome",
                    assigned.unassigned.reads,
                    assigned.total_reads
                );
                let discovered = self.discover_regions(
                    index,
                    &assigned.unassigned.path,
                    &self.layout.unassigned_reads(),
                )?;

                Ok(DemuxResult {
                    amplicons: assigned.buckets,
                    discovered: discovered.regions,
                    unassigned: discovered.unassigned,
                    total_reads: assigned.total_reads,
                })
            }
        }
    }

    /// Align reads against an index built from the catalog's sequences and
    /// split them into one container per region.
    pub fn assign_amplicons(
        &self,
        catalog: &RegionCatalog,
        reads: &Path,
        unassigned_path: &Path,
    ) -> Result<AmpliconAssignment> {
        let fasta = self.layout.amplicons_fasta();
        let index = self.layout.amplicon_index();
        write_fasta(&fasta, &catalog.reference_sequences())?;
        tracing::info!("Building alignment index for {} amplicons", catalog.len());
        self.aligner.build_index(&fasta, &index)?;

        let mut buckets = BucketSet::new(self.max_open_buckets);
        let mut keys_by_reference = HashMap::new();
        for region in catalog.iter() {
            let key = BucketKey::Amplicon(region.name.clone());
            let stem = region.file_stem();
            buckets.register(key.clone(), self.layout.region_reads(&stem))?;
            keys_by_reference.insert(stem, key);
        }
        let unassigned_key = BucketKey::Unassigned;
        buckets.register(unassigned_key.clone(), unassigned_path.to_path_buf())?;

        tracing::info!("Aligning reads to the amplicons");
        let total_reads = for_each_read(
            self.aligner,
            &index,
            &ReadSource::fastq(reads),
            |records| {
                let best = best_placement(records);
                let key = match best.and_then(|r| keys_by_reference.get(&r.rname)) {
                    Some(key) => key,
                    None => {
                        if let Some(record) = best {
                            tracing::warn!(
                                "Read {} aligned to unknown reference {}",
                                record.qname,
                                record.rname
                            );
                        }
                        &unassigned_key
                    }
                };
                let (seq, qual) = read_bases(records, best);
                buckets.write(key, records[0].qname.as_bytes(), seq.as_bytes(), qual.as_bytes())
            },
        )?;

        let mut finished = buckets.finish()?;
        let unassigned = finished
            .pop()
            .ok_or_else(|| RegionplexError::Parse("unassigned container missing".to_string()))?;

        Ok(AmpliconAssignment {
            buckets: finished,
            unassigned,
            total_reads,
        })
    }

    /// Align reads to the genome, discover regions from overlapping
    /// placements and split reads by region.
    ///
    /// Runs in two passes: compact placements are kept in memory while placed
    /// reads are spooled to a temporary container; once regions are known the
    /// spool is read back and routed.
    pub fn discover_regions(
        &self,
        genome_index: &Path,
        reads: &Path,
        unassigned_path: &Path,
    ) -> Result<GenomeAssignment> {
        let spool_path = self.layout.genome_placements();
        let mut spool = FastqWriter::create(&spool_path)?;
        let mut unassigned = FastqWriter::create(unassigned_path)?;
        let mut placements = Placements::new();

        tracing::info!("Aligning reads to the genome");
        let total_reads = for_each_read(
            self.aligner,
            genome_index,
            &ReadSource::fastq(reads),
            |records| {
                let best = best_placement(records);
                let (seq, qual) = read_bases(records, best);
                let name = records[0].qname.as_bytes();
                match best.and_then(SamRecord::span) {
                    Some(span) => {
                        placements.push(&span)?;
                        spool.write_record(name, seq.as_bytes(), qual.as_bytes())
                    }
                    None => unassigned.write_record(name, seq.as_bytes(), qual.as_bytes()),
                }
            },
        )?;
        spool.finish()?;
        let unassigned_reads = unassigned.finish()?;

        let regions = placements.cluster();
        tracing::info!(
            "{} reads placed on the genome form {} regions",
            placements.len(),
            regions.len()
        );

        let mut buckets = BucketSet::new(self.max_open_buckets);
        for region in &regions {
            buckets.register(
                BucketKey::Genomic(region.name()),
                self.layout.region_reads(&region.file_stem()),
            )?;
        }
        let keys: Vec<BucketKey> = regions
            .iter()
            .map(|r| BucketKey::Genomic(r.name()))
            .collect();

        let index = RegionIndex::new(&regions);
        let mut position = 0usize;
        for_each_record(&spool_path, |record| {
            let placement = placements.get(position).ok_or_else(|| {
                RegionplexError::Parse("placement spool has more reads than placements".to_string())
            })?;
            position += 1;
            let reference = placements.reference_name(placement);
            let idx = index
                .locate(reference, placement.start, placement.end)
                .ok_or_else(|| {
                    RegionplexError::Parse(format!(
                        "placement {}:{}-{} is outside every region",
                        reference, placement.start, placement.end
                    ))
                })?;
            buckets.write(&keys[idx], record.name(), record.seq, record.qual.unwrap_or(b""))
        })?;
        std::fs::remove_file(&spool_path)?;

        let finished = buckets.finish()?;
        let regions = regions
            .into_iter()
            .zip(finished)
            .map(|(region, bucket)| DiscoveredRegion { region, bucket })
            .collect();

        Ok(GenomeAssignment {
            regions,
            unassigned: ReadBucket {
                key: BucketKey::Unassigned,
                path: unassigned_path.to_path_buf(),
                reads: unassigned_reads,
            },
            total_reads,
        })
    }
}

/// Genomic placement of each amplicon, keyed by region name.
///
/// Amplicons that do not align are absent from the map.
pub fn place_amplicons(
    aligner: &dyn Aligner,
    genome_index: &Path,
    amplicons_fasta: &Path,
    catalog: &RegionCatalog,
) -> Result<HashMap<String, GenomicSpan>> {
    let names = catalog.reference_names();
    let mut placements = HashMap::new();

    for_each_read(
        aligner,
        genome_index,
        &ReadSource::fasta(amplicons_fasta),
        |records| {
            if let Some(span) = best_placement(records).and_then(SamRecord::span) {
                if let Some(name) = names.get(&records[0].qname) {
                    placements.insert(name.clone(), span);
                }
            }
            Ok(())
        },
    )?;

    Ok(placements)
}
