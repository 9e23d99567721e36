use super::runner::{run_logged, CommandLog};
use super::traits::{PairedTrimOutputs, Trimmer};
use super::{Tool, Toolchain};
use crate::core::config::TrimmingConfig;
use crate::{RegionplexError, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

/// Adapter trimming with Trimmomatic, run through `java -jar`.
pub struct Trimmomatic {
    java: PathBuf,
    jar: PathBuf,
    single_end_steps: Option<Vec<String>>,
    paired_end_steps: Option<Vec<String>>,
    log: Arc<CommandLog>,
}

impl Trimmomatic {
    pub fn new(toolchain: &Toolchain, config: &TrimmingConfig, log: Arc<CommandLog>) -> Result<Self> {
        let jar = config.jar.clone().ok_or_else(|| RegionplexError::MissingDependency {
            tool: "trimmomatic".to_string(),
            hint: "Set [trimming] jar to the Trimmomatic jar file.".to_string(),
        })?;
        if !jar.is_file() {
            return Err(RegionplexError::MissingDependency {
                tool: "trimmomatic".to_string(),
                hint: format!("Trimmomatic jar not found at {}.", jar.display()),
            });
        }

        Ok(Self {
            java: toolchain.path(Tool::Java)?.to_path_buf(),
            jar,
            // a missing adapter file only matters for the read layout in use
            single_end_steps: config.resolved_steps(false).ok(),
            paired_end_steps: config.resolved_steps(true).ok(),
            log,
        })
    }

    fn steps(&self, paired: bool) -> Result<&[String]> {
        let steps = if paired {
            self.paired_end_steps.as_deref()
        } else {
            self.single_end_steps.as_deref()
        };
        steps.ok_or_else(|| {
            RegionplexError::Configuration(format!(
                "no {} adapter file configured for trimming",
                if paired { "paired-end" } else { "single-end" }
            ))
        })
    }

    fn command(&self, mode: &str, files: Vec<OsString>, steps: &[String]) -> Command {
        let mut cmd = Command::new(&self.java);
        cmd.arg("-jar")
            .arg(&self.jar)
            .arg(mode)
            .arg("-phred33")
            .args(files)
            .args(steps);
        cmd
    }

    fn run(&self, mut cmd: Command) -> Result<()> {
        run_logged("trimmomatic", &mut cmd, &self.log)
            .map_err(|e| RegionplexError::Preprocessing(e.to_string()))?;
        Ok(())
    }
}

impl Trimmer for Trimmomatic {
    fn name(&self) -> &str {
        "trimmomatic"
    }

    fn trim_single(&self, input: &Path, output: &Path) -> Result<()> {
        let files = vec![input.into(), output.into()];
        let cmd = self.command("SE", files, self.steps(false)?);
        self.run(cmd)
    }

    fn trim_paired(&self, r1: &Path, r2: &Path, outputs: &PairedTrimOutputs) -> Result<()> {
        let files = vec![
            r1.into(),
            r2.into(),
            outputs.r1.as_os_str().to_owned(),
            outputs.r1_unpaired.as_os_str().to_owned(),
            outputs.r2.as_os_str().to_owned(),
            outputs.r2_unpaired.as_os_str().to_owned(),
        ];
        let cmd = self.command("PE", files, self.steps(true)?);
        self.run(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::runner::describe;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn trimmer(dir: &TempDir) -> Trimmomatic {
        let jar = dir.path().join("trimmomatic-0.33.jar");
        std::fs::write(&jar, "").unwrap();
        let config = TrimmingConfig {
            enabled: true,
            jar: Some(jar),
            single_end_adapters: Some(PathBuf::from("TruSeq3-SE.fa")),
            ..Default::default()
        };
        let toolchain =
            Toolchain::with_paths(HashMap::from([(Tool::Java, PathBuf::from("/usr/bin/java"))]));
        Trimmomatic::new(&toolchain, &config, Arc::new(CommandLog::disabled())).unwrap()
    }

    #[test]
    fn test_single_end_command() {
        let dir = TempDir::new().unwrap();
        let trimmer = trimmer(&dir);
        let cmd = trimmer.command(
            "SE",
            vec!["in.fq".into(), "out.fq.gz".into()],
            trimmer.steps(false).unwrap(),
        );
        let line = describe(&cmd);
        assert!(line.starts_with("/usr/bin/java -jar "));
        assert!(line.ends_with(
            "SE -phred33 in.fq out.fq.gz ILLUMINACLIP:TruSeq3-SE.fa:0:90:10:0:true MINLEN:40"
        ));
    }

    #[test]
    fn test_paired_end_without_adapters_is_configuration_error() {
        let dir = TempDir::new().unwrap();
        let trimmer = trimmer(&dir);
        let outputs = PairedTrimOutputs::in_dir(dir.path());
        let err = trimmer
            .trim_paired(Path::new("r1.fq"), Path::new("r2.fq"), &outputs)
            .unwrap_err();
        assert!(matches!(err, RegionplexError::Configuration(_)));
    }

    #[test]
    fn test_missing_jar_is_missing_dependency() {
        let toolchain = Toolchain::default();
        let config = TrimmingConfig {
            enabled: true,
            ..Default::default()
        };
        let err = Trimmomatic::new(&toolchain, &config, Arc::new(CommandLog::disabled()))
            .err()
            .unwrap();
        assert!(matches!(err, RegionplexError::MissingDependency { .. }));
    }
}
