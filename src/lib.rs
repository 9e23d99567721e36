pub mod bio;
pub mod cli;
pub mod core;
pub mod demux;
pub mod report;
pub mod tools;

pub use crate::bio::region::{Region, RegionCatalog, ValidationIssue, ValidationReport};
pub use crate::core::mode::OperatingMode;
pub use crate::core::pipeline::{Pipeline, PipelineRun, RunInputs, Toolkit};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegionplexError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Missing dependency: {tool} is required but was not found. {hint}")]
    MissingDependency { tool: String, hint: String },

    #[error("Cannot open input file {}: {source}", path.display())]
    InputAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Region validation failed:\n{0}")]
    Validation(ValidationReport),

    #[error("Read trimming failed: {0}")]
    Preprocessing(String),

    #[error("Paired-end merging failed: {0}")]
    Merge(String),

    #[error("{tool} failed: {message}")]
    ExternalTool { tool: String, message: String },

    #[error("Analysis of region {region} failed: {message}")]
    RegionAnalysis { region: String, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RegionplexError {
    /// Wrap an IO error raised while opening one of the run's inputs.
    pub fn input_access(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RegionplexError::InputAccess {
            path: path.into(),
            source,
        }
    }

    pub fn external(tool: impl ToString, message: impl Into<String>) -> Self {
        RegionplexError::ExternalTool {
            tool: tool.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RegionplexError>;
