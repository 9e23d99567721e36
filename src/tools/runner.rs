//! Structured subprocess execution with a shared command log.
//!
//! Commands are built as argument lists and never passed through a shell.
//! Every invocation is appended to the run's `RUNNING_LOG.txt` together with
//! whatever the tool wrote to its console.

use crate::{RegionplexError, Result};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

const ERROR_TAIL_LINES: usize = 5;

/// Append-only log of executed commands, safe to share across workers.
pub struct CommandLog {
    path: Option<PathBuf>,
    file: Mutex<Option<File>>,
}

impl CommandLog {
    /// Start a fresh log recording the invoking command line.
    pub fn create(path: &Path, invocation: &str) -> Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        writeln!(file, "[Command used]:\n{}\n\n[Execution log]:", invocation)?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            file: Mutex::new(Some(file)),
        })
    }

    /// A log that discards everything.
    pub fn disabled() -> Self {
        Self {
            path: None,
            file: Mutex::new(None),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn record(&self, message: &str) {
        let mut guard = self.file.lock();
        if let Some(file) = guard.as_mut() {
            let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
            if let Err(e) = writeln!(file, "[{}] {}", stamp, message) {
                tracing::warn!("Failed to write running log: {}", e);
            }
        }
    }

    pub fn command(&self, cmd: &Command) {
        let line = describe(cmd);
        tracing::debug!("Running: {}", line);
        self.record(&line);
    }

    /// Append raw tool output below the last command.
    pub fn output(&self, text: &[u8]) {
        if text.is_empty() {
            return;
        }
        let mut guard = self.file.lock();
        if let Some(file) = guard.as_mut() {
            let mut write = || -> std::io::Result<()> {
                file.write_all(text)?;
                if !text.ends_with(b"\n") {
                    file.write_all(b"\n")?;
                }
                Ok(())
            };
            if let Err(e) = write() {
                tracing::warn!("Failed to write running log: {}", e);
            }
        }
    }
}

fn quote(arg: &str) -> String {
    if !arg.is_empty() && !arg.contains(|c: char| c.is_whitespace() || c == '\'' || c == '"') {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
}

/// Shell-like rendering of a command, for logs only.
pub fn describe(cmd: &Command) -> String {
    let mut parts = vec![quote(&cmd.get_program().to_string_lossy())];
    parts.extend(cmd.get_args().map(|a| quote(&a.to_string_lossy())));
    parts.join(" ")
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(ERROR_TAIL_LINES);
    lines[start..].join("; ")
}

fn exit_failure(tool: &str, output: &Output) -> RegionplexError {
    let code = output
        .status
        .code()
        .map(|c| c.to_string())
        .unwrap_or_else(|| "signal".to_string());
    let tail = stderr_tail(&output.stderr);
    let message = if tail.is_empty() {
        format!("exited with status {}", code)
    } else {
        format!("exited with status {}: {}", code, tail)
    };
    RegionplexError::external(tool, message)
}

fn spawn_failure(tool: &str, e: std::io::Error) -> RegionplexError {
    RegionplexError::external(tool, format!("could not be started: {}", e))
}

/// Run to completion, log console output, fail on non-zero exit.
pub fn run_logged(tool: &str, cmd: &mut Command, log: &CommandLog) -> Result<Output> {
    log.command(cmd);
    let output = cmd
        .stdin(Stdio::null())
        .output()
        .map_err(|e| spawn_failure(tool, e))?;

    log.output(&output.stdout);
    log.output(&output.stderr);

    if !output.status.success() {
        return Err(exit_failure(tool, &output));
    }
    Ok(output)
}

/// Run with stdout and stderr redirected into `log_path`.
pub fn run_to_file(tool: &str, cmd: &mut Command, log: &CommandLog, log_path: &Path) -> Result<()> {
    log.command(cmd);
    let out = File::create(log_path)?;
    let err = out.try_clone()?;
    let status = cmd
        .stdin(Stdio::null())
        .stdout(out)
        .stderr(err)
        .status()
        .map_err(|e| spawn_failure(tool, e))?;

    if !status.success() {
        let code = status
            .code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        return Err(RegionplexError::external(
            tool,
            format!("exited with status {}, see {}", code, log_path.display()),
        ));
    }
    Ok(())
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> std::thread::JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buffer = Vec::new();
        let _ = reader.read_to_end(&mut buffer);
        buffer
    })
}

/// Run while streaming stdout line by line into `on_line`.
///
/// Stderr is collected on a separate thread and appended to the log once the
/// process exits. An error from `on_line` stops the process and is returned.
pub fn stream_stdout(
    tool: &str,
    cmd: &mut Command,
    log: &CommandLog,
    on_line: &mut dyn FnMut(&str) -> Result<()>,
) -> Result<()> {
    log.command(cmd);
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| spawn_failure(tool, e))?;

    let stderr_handle = child.stderr.take().map(drain);
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| RegionplexError::external(tool, "stdout was not captured"))?;

    let mut consumer_error = None;
    let mut reader = BufReader::new(stdout);
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {
                if let Err(e) = on_line(&line) {
                    consumer_error = Some(e);
                    break;
                }
            }
            Err(e) => {
                consumer_error = Some(RegionplexError::external(
                    tool,
                    format!("failed reading output: {}", e),
                ));
                break;
            }
        }
    }

    if consumer_error.is_some() {
        let _ = child.kill();
    }
    let status = child
        .wait()
        .map_err(|e| RegionplexError::external(tool, format!("failed waiting for exit: {}", e)))?;
    let stderr = stderr_handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();
    log.output(&stderr);

    if let Some(e) = consumer_error {
        return Err(e);
    }
    if !status.success() {
        return Err(exit_failure(
            tool,
            &Output {
                status,
                stdout: Vec::new(),
                stderr,
            },
        ));
    }
    Ok(())
}
