//! Key/value configuration sources.
//!
//! Both sources yield `package.section[.attribute]` keys with raw string
//! values, in the format printed by `uci show`.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::config::ConfigError;
use crate::openwrt::DEFAULT_COMMAND_TIMEOUT;

/// How often a running command is checked for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// A source of raw configuration entries.
pub trait ConfigSource {
    /// All entries, in source order.
    fn entries(&self) -> Result<Vec<(String, String)>, ConfigError>;

    /// Short description for log messages.
    fn describe(&self) -> String;
}

/// Reads a package through the `uci` command line tool.
///
/// `uci` is killed when it runs longer than the timeout.
#[derive(Debug, Clone)]
pub struct UciSource {
    package: String,
    timeout: Duration,
}

impl UciSource {
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl ConfigSource for UciSource {
    fn entries(&self) -> Result<Vec<(String, String)>, ConfigError> {
        let output = run_bounded("uci", &["show", self.package.as_str()], self.timeout)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ConfigError::Source(format!(
                "uci show {} exited with {}: {}",
                self.package,
                output.status,
                stderr.trim()
            )));
        }

        Ok(parse_show_output(&String::from_utf8_lossy(&output.stdout)))
    }

    fn describe(&self) -> String {
        format!("uci:{}", self.package)
    }
}

/// Run a command to completion, killing it after `timeout`.
///
/// Pipes are drained on helper threads so a chatty child cannot block on a
/// full pipe while it is being waited on.
fn run_bounded(program: &str, args: &[&str], timeout: Duration) -> Result<Output, ConfigError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());
    let deadline = Instant::now() + timeout;

    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            if let Err(e) = child.kill() {
                tracing::debug!(program = %program, error = %e, "Failed to kill command");
            }
            let _ = child.wait();
            tracing::warn!(
                program = %program,
                args = ?args,
                timeout_secs = timeout.as_secs_f64(),
                "Command timed out"
            );
            return Err(ConfigError::Source(format!(
                "{} {} timed out after {:?}",
                program,
                args.join(" "),
                timeout
            )));
        }
        thread::sleep(POLL_INTERVAL);
    };

    Ok(Output {
        status,
        stdout: stdout.join().unwrap_or_default(),
        stderr: stderr.join().unwrap_or_default(),
    })
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

/// Reads a file holding saved `uci show` output.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ConfigSource for FileSource {
    fn entries(&self) -> Result<Vec<(String, String)>, ConfigError> {
        let text = std::fs::read_to_string(&self.path)?;
        Ok(parse_show_output(&text))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Split `uci show` output into key/value pairs.
///
/// Lines without `=` are skipped. Surrounding quotes are stripped from
/// values.
pub fn parse_show_output(text: &str) -> Vec<(String, String)> {
    text.lines()
        .filter_map(|line| {
            let (key, value) = line.trim().split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), unquote(value.trim()).to_string()))
        })
        .collect()
}

fn unquote(value: &str) -> &str {
    for quote in ['\'', '"'] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}
