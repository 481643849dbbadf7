//! Fetching the status report from the Mirth Connect CLI.

use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, trace};

use crate::config::MccliConfig;
use crate::error::{FetchError, Result};

/// Commands run by the CLI on every fetch.
pub const QUERY_SCRIPT: &str = "status\nchannel stats\n";

/// Default bound on a single CLI invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Minimum number of lines a report must have to be considered valid.
const MIN_REPORT_LINES: usize = 3;

/// Source of the raw report lines for one scrape.
pub trait ReportFetcher: Send + Sync {
    /// Fetch the current report, split into lines.
    fn fetch(&self) -> impl Future<Output = Result<Vec<String>>> + Send;
}

/// Fetcher that runs `mccommand -s <query file>` as a subprocess.
#[derive(Debug, Clone)]
pub struct CommandFetcher {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandFetcher {
    /// Create a fetcher for the given CLI executable.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Create a fetcher from the `mccli` configuration section.
    pub fn from_config(config: &MccliConfig) -> Self {
        Self::new(&config.path)
            .with_args(config.args.clone())
            .with_timeout(Duration::from_secs(config.timeout_secs))
    }

    /// Arguments placed before `-s <query file>`.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Bound on the CLI run time; the process is killed when it is exceeded.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The configured timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl ReportFetcher for CommandFetcher {
    async fn fetch(&self) -> Result<Vec<String>> {
        debug!("Fetching Mirth status report");

        // Removed from disk when dropped, whatever the outcome.
        let query_file = write_query_file().map_err(FetchError::TempFile)?;
        debug!(path = %query_file.path().display(), "Using query file");

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg("-s")
            .arg(query_file.path())
            .stdin(Stdio::null())
            .kill_on_drop(true);

        trace!(program = %self.program.display(), args = ?self.args, "spawn");

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(result) => result.map_err(|source| FetchError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?,
            Err(_) => return Err(FetchError::Timeout(self.timeout)),
        };

        if !output.status.success() {
            return Err(FetchError::ExitStatus {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let lines = split_report(&stdout)?;
        debug!(lines = lines.len(), output = %stdout, "Fetched Mirth status report");

        Ok(lines)
    }
}

/// Write the query script to a fresh temporary file.
fn write_query_file() -> std::io::Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("mirth_exporter")
        .tempfile()?;
    file.write_all(QUERY_SCRIPT.as_bytes())?;
    file.as_file().sync_all()?;
    Ok(file)
}

/// Split CLI output into lines, rejecting reports that are too short.
///
/// Splitting is on `'\n'` only, so a trailing newline yields a trailing
/// empty line.
pub fn split_report(output: &str) -> Result<Vec<String>> {
    let lines: Vec<String> = output.split('\n').map(str::to_string).collect();

    if lines.len() < MIN_REPORT_LINES {
        return Err(FetchError::UnexpectedOutput(output.to_string()));
    }

    Ok(lines)
}
