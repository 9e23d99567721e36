use crate::{RegionplexError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which references the run resolves reads against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatingMode {
    AmpliconsOnly,
    GenomeOnly,
    AmpliconsAndGenome,
}

impl OperatingMode {
    /// Derive the mode from which reference inputs were supplied.
    pub fn from_inputs(has_amplicons: bool, has_genome: bool) -> Result<Self> {
        match (has_amplicons, has_genome) {
            (true, false) => Ok(OperatingMode::AmpliconsOnly),
            (false, true) => Ok(OperatingMode::GenomeOnly),
            (true, true) => Ok(OperatingMode::AmpliconsAndGenome),
            (false, false) => Err(RegionplexError::Configuration(
                "provide an amplicon description file, a genome alignment index, or both"
                    .to_string(),
            )),
        }
    }

    pub fn uses_amplicons(&self) -> bool {
        matches!(self, OperatingMode::AmpliconsOnly | OperatingMode::AmpliconsAndGenome)
    }

    pub fn uses_genome(&self) -> bool {
        matches!(self, OperatingMode::GenomeOnly | OperatingMode::AmpliconsAndGenome)
    }

    pub fn description(&self) -> &'static str {
        match self {
            OperatingMode::AmpliconsOnly => {
                "reads are resolved against the supplied amplicon sequences only"
            }
            OperatingMode::GenomeOnly => {
                "regions are discovered from reads aligned to the reference genome"
            }
            OperatingMode::AmpliconsAndGenome => {
                "reads are resolved against the amplicons first, then the remainder against the genome"
            }
        }
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatingMode::AmpliconsOnly => write!(f, "amplicons only"),
            OperatingMode::GenomeOnly => write!(f, "genome only"),
            OperatingMode::AmpliconsAndGenome => write!(f, "amplicons and genome"),
        }
    }
}
