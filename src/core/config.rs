use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Placeholder in trimming steps replaced by the adapter file for the read layout.
pub const ADAPTERS_PLACEHOLDER: &str = "{adapters}";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub thresholds: ThresholdConfig,
    pub alignment: AlignmentConfig,
    pub merge: MergeConfig,
    pub trimming: TrimmingConfig,
    pub analysis: AnalysisConfig,
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Minimum number of reads a region needs to be analyzed
    pub min_reads_to_use_region: u64,
    /// Minimum percentage of aligned reads a region needs to be analyzed
    pub min_perc_reads_to_use_region: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            min_reads_to_use_region: 50,
            min_perc_reads_to_use_region: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentConfig {
    /// Placements reported per read (`-k`)
    pub max_placements: u32,
    pub end_to_end: bool,
    /// Mismatches allowed in the seed (`-N`)
    pub seed_mismatches: u8,
    /// Penalty for ambiguous bases (`--np`)
    pub n_penalty: u32,
    /// Aligner threads; 0 uses the run's thread count
    pub threads: usize,
    pub extra_args: Vec<String>,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            max_placements: 1,
            end_to_end: true,
            seed_mismatches: 0,
            n_penalty: 0,
            threads: 0,
            extra_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    pub min_overlap: u32,
    pub max_overlap: u32,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            min_overlap: 4,
            max_overlap: 80,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrimmingConfig {
    pub enabled: bool,
    /// Trimmomatic jar; required when trimming is enabled
    pub jar: Option<PathBuf>,
    pub single_end_adapters: Option<PathBuf>,
    pub paired_end_adapters: Option<PathBuf>,
    pub steps: Vec<String>,
}

impl Default for TrimmingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            jar: None,
            single_end_adapters: None,
            paired_end_adapters: None,
            steps: vec![
                format!("ILLUMINACLIP:{}:0:90:10:0:true", ADAPTERS_PLACEHOLDER),
                "MINLEN:40".to_string(),
            ],
        }
    }
}

impl TrimmingConfig {
    /// Trimming steps with the adapter placeholder resolved for one read layout.
    pub fn resolved_steps(&self, paired: bool) -> Result<Vec<String>, crate::RegionplexError> {
        let adapters = if paired {
            self.paired_end_adapters.as_ref()
        } else {
            self.single_end_adapters.as_ref()
        };

        self.steps
            .iter()
            .map(|step| {
                if !step.contains(ADAPTERS_PLACEHOLDER) {
                    return Ok(step.clone());
                }
                let adapters = adapters.ok_or_else(|| {
                    crate::RegionplexError::Configuration(format!(
                        "Trimming step '{}' needs a {} adapter file",
                        step,
                        if paired { "paired-end" } else { "single-end" }
                    ))
                })?;
                Ok(step.replace(ADAPTERS_PLACEHOLDER, &adapters.display().to_string()))
            })
            .collect()
    }
}

/// Options forwarded unchanged to every per-region analysis call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub min_average_read_quality: u32,
    pub min_single_bp_quality: u32,
    pub min_identity_score: f64,
    /// Window in bp around each guide; -1 disables the filter
    pub window_around_sgrna: i32,
    pub exclude_bp_from_left: u32,
    pub exclude_bp_from_right: u32,
    pub hdr_perfect_alignment_threshold: f64,
    pub needle_options: String,
    pub keep_intermediate: bool,
    pub save_also_png: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_average_read_quality: 0,
            min_single_bp_quality: 0,
            min_identity_score: 50.0,
            window_around_sgrna: 50,
            exclude_bp_from_left: 0,
            exclude_bp_from_right: 0,
            hdr_perfect_alignment_threshold: 98.0,
            needle_options: "-gapopen=10 -gapextend=0.5 -awidth3=5000".to_string(),
            keep_intermediate: false,
            save_also_png: false,
        }
    }
}

/// Explicit locations of external tools; unset entries are looked up on `PATH`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub bowtie2: Option<PathBuf>,
    pub bowtie2_build: Option<PathBuf>,
    pub bowtie2_inspect: Option<PathBuf>,
    pub samtools: Option<PathBuf>,
    pub flash: Option<PathBuf>,
    pub java: Option<PathBuf>,
    pub crispresso: Option<PathBuf>,
}

impl Config {
    pub fn validate(&self) -> Result<(), crate::RegionplexError> {
        let perc = self.thresholds.min_perc_reads_to_use_region;
        if !(0.0..=100.0).contains(&perc) {
            return Err(crate::RegionplexError::Configuration(format!(
                "min_perc_reads_to_use_region must be between 0 and 100, got {}",
                perc
            )));
        }
        if self.merge.min_overlap == 0 || self.merge.min_overlap > self.merge.max_overlap {
            return Err(crate::RegionplexError::Configuration(format!(
                "merge overlap bounds are invalid: min {} max {}",
                self.merge.min_overlap, self.merge.max_overlap
            )));
        }
        if self.alignment.max_placements == 0 {
            return Err(crate::RegionplexError::Configuration(
                "max_placements must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn default_config() -> Config {
    Config::default()
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, crate::RegionplexError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .map_err(|e| crate::RegionplexError::input_access(path, e))?;
    let config: Config = toml::from_str(&contents).map_err(|e| {
        crate::RegionplexError::Configuration(format!("Failed to parse config: {}", e))
    })?;
    config.validate()?;
    Ok(config)
}

pub fn save_config<P: AsRef<Path>>(path: P, config: &Config) -> Result<(), crate::RegionplexError> {
    let contents = toml::to_string_pretty(config).map_err(|e| {
        crate::RegionplexError::Configuration(format!("Failed to serialize config: {}", e))
    })?;
    std::fs::write(path, contents)?;
    Ok(())
}
