pub mod bowtie2;
pub mod crispresso;
pub mod flash;
pub mod runner;
pub mod samtools;
pub mod traits;
pub mod trimmomatic;

pub use runner::CommandLog;
pub use traits::{
    Aligner, AnalysisRequest, MergeOutputs, Merger, PairedTrimOutputs, ReadFormat, ReadSource,
    ReferenceSequences, RegionAnalyzer, Trimmer,
};

use crate::core::config::ToolsConfig;
use crate::core::mode::OperatingMode;
use crate::{RegionplexError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// External programs a run may need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tool {
    Bowtie2,
    Bowtie2Build,
    Bowtie2Inspect,
    Samtools,
    Flash,
    Java,
    Crispresso,
}

impl Tool {
    pub fn all() -> [Tool; 7] {
        [
            Tool::Bowtie2,
            Tool::Bowtie2Build,
            Tool::Bowtie2Inspect,
            Tool::Samtools,
            Tool::Flash,
            Tool::Java,
            Tool::Crispresso,
        ]
    }

    /// Get the binary name for the tool
    pub fn binary_name(&self) -> &'static str {
        match self {
            Tool::Bowtie2 => "bowtie2",
            Tool::Bowtie2Build => "bowtie2-build",
            Tool::Bowtie2Inspect => "bowtie2-inspect",
            Tool::Samtools => "samtools",
            Tool::Flash => "flash",
            Tool::Java => "java",
            Tool::Crispresso => "CRISPResso",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Tool::Bowtie2 => "Bowtie2",
            Tool::Bowtie2Build => "Bowtie2 (index builder)",
            Tool::Bowtie2Inspect => "Bowtie2 (index inspector)",
            Tool::Samtools => "SAMtools",
            Tool::Flash => "FLASH",
            Tool::Java => "Java (for Trimmomatic)",
            Tool::Crispresso => "CRISPResso",
        }
    }

    pub fn install_hint(&self) -> &'static str {
        match self {
            Tool::Bowtie2 | Tool::Bowtie2Build | Tool::Bowtie2Inspect => {
                "Install Bowtie2 (http://bowtie-bio.sourceforge.net/bowtie2) and make sure it is on PATH."
            }
            Tool::Samtools => "Install SAMtools (http://www.htslib.org) and make sure it is on PATH.",
            Tool::Flash => "Install FLASH (https://ccb.jhu.edu/software/FLASH) and make sure it is on PATH.",
            Tool::Java => "Install a Java runtime; it is needed to run Trimmomatic.",
            Tool::Crispresso => "Install CRISPResso and make sure the CRISPResso command is on PATH.",
        }
    }

    fn configured(&self, config: &ToolsConfig) -> Option<PathBuf> {
        match self {
            Tool::Bowtie2 => config.bowtie2.clone(),
            Tool::Bowtie2Build => config.bowtie2_build.clone(),
            Tool::Bowtie2Inspect => config.bowtie2_inspect.clone(),
            Tool::Samtools => config.samtools.clone(),
            Tool::Flash => config.flash.clone(),
            Tool::Java => config.java.clone(),
            Tool::Crispresso => config.crispresso.clone(),
        }
    }

    /// Configured location if it exists, otherwise a `PATH` lookup.
    pub fn locate(&self, config: &ToolsConfig) -> Option<PathBuf> {
        match self.configured(config) {
            Some(path) => which::which(&path).ok(),
            None => which::which(self.binary_name()).ok(),
        }
    }
}

impl std::fmt::Display for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.binary_name())
    }
}

impl std::str::FromStr for Tool {
    type Err = RegionplexError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "bowtie2" => Ok(Tool::Bowtie2),
            "bowtie2-build" => Ok(Tool::Bowtie2Build),
            "bowtie2-inspect" => Ok(Tool::Bowtie2Inspect),
            "samtools" => Ok(Tool::Samtools),
            "flash" => Ok(Tool::Flash),
            "java" | "trimmomatic" => Ok(Tool::Java),
            "crispresso" => Ok(Tool::Crispresso),
            _ => Err(RegionplexError::Configuration(format!("Unknown tool: {}", s))),
        }
    }
}

/// Tools needed for a run with the given shape, in check order.
pub fn required_tools(mode: OperatingMode, paired: bool, trimming: bool) -> Vec<Tool> {
    let mut tools = vec![Tool::Bowtie2];
    if mode.uses_amplicons() {
        tools.push(Tool::Bowtie2Build);
    }
    if mode.uses_genome() {
        tools.push(Tool::Bowtie2Inspect);
        tools.push(Tool::Samtools);
    }
    if paired {
        tools.push(Tool::Flash);
    }
    if trimming {
        tools.push(Tool::Java);
    }
    tools.push(Tool::Crispresso);
    tools
}

/// Status line of one tool for `regionplex tools`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolStatus {
    pub tool: Tool,
    pub path: Option<PathBuf>,
}

pub fn tool_status(config: &ToolsConfig) -> Vec<ToolStatus> {
    Tool::all()
        .into_iter()
        .map(|tool| ToolStatus {
            tool,
            path: tool.locate(config),
        })
        .collect()
}

/// Resolved executable paths of the tools a run needs.
#[derive(Debug, Clone, Default)]
pub struct Toolchain {
    paths: HashMap<Tool, PathBuf>,
}

impl Toolchain {
    /// Resolve every required tool, failing on the first one missing.
    pub fn resolve(config: &ToolsConfig, required: &[Tool]) -> Result<Self> {
        let mut paths = HashMap::new();
        for tool in required {
            let path = tool.locate(config).ok_or_else(|| RegionplexError::MissingDependency {
                tool: tool.binary_name().to_string(),
                hint: tool.install_hint().to_string(),
            })?;
            tracing::debug!("{} found at {}", tool.display_name(), path.display());
            paths.insert(*tool, path);
        }
        Ok(Self { paths })
    }

    /// A toolchain with explicit paths, no lookup.
    pub fn with_paths(paths: HashMap<Tool, PathBuf>) -> Self {
        Self { paths }
    }

    pub fn path(&self, tool: Tool) -> Result<&Path> {
        self.paths
            .get(&tool)
            .map(PathBuf::as_path)
            .ok_or_else(|| RegionplexError::MissingDependency {
                tool: tool.binary_name().to_string(),
                hint: tool.install_hint().to_string(),
            })
    }
}
