//! Running the platform diagnostic binaries.
//!
//! Every command runs under a deadline; a child still alive at the deadline
//! is killed and reaped before returning.

use super::Platform;
use super::gateway::parse_default_gateway;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

const AIRPORT_PATH: &str =
    "/System/Library/PrivateFrameworks/Apple80211.framework/Versions/Current/Resources/airport";
const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to run `{program}`: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("`{program}` timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },
    #[error("`{program}` exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("io error while waiting for `{program}`: {source}")]
    Io {
        program: String,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct CapturedOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Run a command to completion or until `timeout` elapses.
pub fn run_with_timeout(
    command: &mut Command,
    timeout: Duration,
) -> Result<CapturedOutput, CaptureError> {
    let program = command.get_program().to_string_lossy().into_owned();
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| CaptureError::Spawn {
            program: program.clone(),
            source,
        })?;

    // Drain both pipes while waiting so a chatty child cannot block on a full pipe.
    let stdout_reader = drain(child.stdout.take());
    let stderr_reader = drain(child.stderr.take());

    let status = match wait_until(&mut child, Instant::now() + timeout) {
        Ok(Some(status)) => status,
        Ok(None) => {
            let _ = child.kill();
            let _ = child.wait();
            debug!(program = %program, ?timeout, "Killed command at deadline");
            return Err(CaptureError::Timeout { program, timeout });
        }
        Err(source) => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(CaptureError::Io { program, source });
        }
    };

    Ok(CapturedOutput {
        status,
        stdout: collect(stdout_reader),
        stderr: collect(stderr_reader),
    })
}

/// Like [`run_with_timeout`], but a non-zero exit is an error.
pub fn run_checked(command: &mut Command, timeout: Duration) -> Result<String, CaptureError> {
    let program = command.get_program().to_string_lossy().into_owned();
    let output = run_with_timeout(command, timeout)?;
    if !output.status.success() {
        return Err(CaptureError::Failed {
            program,
            status: output.status,
            stderr: output.stderr.trim().to_string(),
        });
    }
    Ok(output.stdout)
}

fn wait_until(child: &mut Child, deadline: Instant) -> std::io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        std::thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    })
}

fn collect(reader: Option<JoinHandle<Vec<u8>>>) -> String {
    reader
        .and_then(|handle| handle.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

/// Command printing the current link status for `platform`.
pub fn wifi_status_command(platform: Platform, interface: &str) -> Command {
    match platform {
        Platform::MacOs => {
            let program = if Path::new(AIRPORT_PATH).exists() {
                AIRPORT_PATH
            } else {
                "airport"
            };
            let mut command = Command::new(program);
            command.arg("-I");
            command
        }
        Platform::Linux => {
            let mut command = Command::new("iw");
            command.args(["dev", interface, "link"]);
            command
        }
        Platform::Windows => {
            let mut command = Command::new("netsh");
            command.args(["wlan", "show", "interfaces"]);
            command
        }
    }
}

/// Command listing the default route for `platform`.
pub fn gateway_command(platform: Platform) -> Command {
    match platform {
        Platform::MacOs => {
            let mut command = Command::new("route");
            command.args(["-n", "get", "default"]);
            command
        }
        Platform::Linux => {
            let mut command = Command::new("ip");
            command.args(["route", "show", "default"]);
            command
        }
        Platform::Windows => Command::new("ipconfig"),
    }
}

/// Source of the raw link status and default route.
pub trait LinkCapture {
    fn wifi_status(&mut self) -> Result<String, CaptureError>;
    fn default_gateway(&mut self) -> Result<Option<String>, CaptureError>;
}

/// Captures by running the platform's own diagnostic commands.
#[derive(Debug, Clone)]
pub struct SystemCapture {
    platform: Platform,
    interface: String,
    timeout: Duration,
}

impl SystemCapture {
    pub fn new(platform: Platform, interface: impl Into<String>, timeout: Duration) -> Self {
        Self {
            platform,
            interface: interface.into(),
            timeout,
        }
    }
}

impl LinkCapture for SystemCapture {
    fn wifi_status(&mut self) -> Result<String, CaptureError> {
        capture_wifi_status(self.platform, &self.interface, self.timeout)
    }

    fn default_gateway(&mut self) -> Result<Option<String>, CaptureError> {
        capture_default_gateway(self.platform, self.timeout)
    }
}

pub fn capture_wifi_status(
    platform: Platform,
    interface: &str,
    timeout: Duration,
) -> Result<String, CaptureError> {
    run_checked(&mut wifi_status_command(platform, interface), timeout)
}

pub fn capture_default_gateway(
    platform: Platform,
    timeout: Duration,
) -> Result<Option<String>, CaptureError> {
    let raw = run_checked(&mut gateway_command(platform), timeout)?;
    Ok(parse_default_gateway(platform, &raw))
}
