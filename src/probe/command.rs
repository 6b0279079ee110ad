//! Probe transports backed by the system `ping` and `iperf3` binaries.

use super::{EchoTransport, ProbeError, ThroughputTransport, TransferMode, TransferReport};
use crate::platform::Platform;
use crate::platform::capture::run_with_timeout;
use serde::Deserialize;
use std::process::Command;
use std::time::Duration;

/// Extra time granted to the child beyond its own reply timeout.
const PROCESS_GRACE: Duration = Duration::from_secs(1);
/// iperf3 needs time to connect and exchange results after the test itself.
const TRANSFER_GRACE: Duration = Duration::from_secs(10);
const UDP_TARGET_BANDWIDTH: &str = "100M";

/// One `ping` invocation per echo, so every probe has its own timeout.
#[derive(Debug, Clone, Copy)]
pub struct PingTransport {
    platform: Platform,
}

impl PingTransport {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }

    fn command(&self, host: &str, timeout: Duration) -> Command {
        let mut command = Command::new("ping");
        match self.platform {
            Platform::Linux => {
                // iputils takes whole seconds
                let secs = timeout.as_secs_f64().ceil().max(1.0) as u64;
                command.args(["-c", "1", "-W", &secs.to_string(), host]);
            }
            Platform::MacOs => {
                let millis = timeout.as_millis().max(1);
                command.args(["-c", "1", "-W", &millis.to_string(), host]);
            }
            Platform::Windows => {
                let millis = timeout.as_millis().max(1);
                command.args(["-n", "1", "-w", &millis.to_string(), host]);
            }
        }
        command
    }
}

impl EchoTransport for PingTransport {
    fn echo(&mut self, host: &str, timeout: Duration) -> Result<f64, ProbeError> {
        let output = run_with_timeout(&mut self.command(host, timeout), timeout + PROCESS_GRACE)?;
        match parse_ping_rtt(&output.stdout) {
            Some(rtt_ms) => Ok(rtt_ms),
            None if output.status.success() => Err(ProbeError::Parse(format!(
                "no round-trip time in ping output for {host}"
            ))),
            None => Err(ProbeError::Timeout(timeout)),
        }
    }
}

/// Round-trip time in ms from a single-probe `ping` output.
///
/// Windows reports sub-millisecond replies as `time<1ms`; those count as 1 ms.
pub fn parse_ping_rtt(stdout: &str) -> Option<f64> {
    stdout.lines().find_map(|line| {
        if let Some((_, rest)) = line.split_once("time=") {
            leading_number(rest)
        } else if line.contains("time<") {
            Some(1.0)
        } else {
            None
        }
    })
}

fn leading_number(text: &str) -> Option<f64> {
    let end = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(text.len());
    text[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Iperf3Transport;

impl Iperf3Transport {
    fn command(host: &str, mode: TransferMode, duration: Duration) -> Command {
        let secs = duration.as_secs().max(1).to_string();
        let mut command = Command::new("iperf3");
        command.args(["-c", host, "-t", &secs, "-J"]);
        if mode == TransferMode::Udp {
            command.args(["-u", "-b", UDP_TARGET_BANDWIDTH]);
        }
        command
    }
}

impl ThroughputTransport for Iperf3Transport {
    fn transfer(
        &mut self,
        host: &str,
        mode: TransferMode,
        duration: Duration,
    ) -> Result<TransferReport, ProbeError> {
        let mut command = Self::command(host, mode, duration);
        // iperf3 prints its JSON report (including errors) even on non-zero exit
        let output = run_with_timeout(&mut command, duration + TRANSFER_GRACE)?;
        parse_iperf3_report(&output.stdout, mode)
    }
}

#[derive(Debug, Deserialize)]
struct Iperf3Output {
    #[serde(default)]
    end: Option<Iperf3End>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Iperf3End {
    #[serde(default)]
    sum: Option<Iperf3Sum>,
    #[serde(default)]
    sum_sent: Option<Iperf3Sum>,
    #[serde(default)]
    sum_received: Option<Iperf3Sum>,
}

#[derive(Debug, Deserialize)]
struct Iperf3Sum {
    bits_per_second: f64,
    #[serde(default)]
    retransmits: Option<u64>,
    #[serde(default)]
    jitter_ms: Option<f64>,
    #[serde(default)]
    lost_percent: Option<f64>,
}

/// Read the summary of an `iperf3 -J` run.
///
/// TCP throughput is the receiver-side rate; UDP uses the combined `sum`
/// block, falling back to the receiver summary on newer iperf3 releases.
pub fn parse_iperf3_report(json: &str, mode: TransferMode) -> Result<TransferReport, ProbeError> {
    let output: Iperf3Output = serde_json::from_str(json)
        .map_err(|err| ProbeError::Parse(format!("iperf3 report: {err}")))?;

    if let Some(message) = output.error {
        return Err(ProbeError::Unreachable(message));
    }
    let end = output
        .end
        .ok_or_else(|| ProbeError::Parse("iperf3 report has no summary".to_string()))?;

    let report = match mode {
        TransferMode::Tcp => {
            let received = end
                .sum_received
                .ok_or_else(|| ProbeError::Parse("missing sum_received".to_string()))?;
            TransferReport {
                mbps: received.bits_per_second / 1e6,
                retransmits: end.sum_sent.and_then(|sent| sent.retransmits),
                jitter_ms: None,
                lost_percent: None,
            }
        }
        TransferMode::Udp => {
            let sum = end
                .sum
                .or(end.sum_received)
                .ok_or_else(|| ProbeError::Parse("missing udp sum".to_string()))?;
            TransferReport {
                mbps: sum.bits_per_second / 1e6,
                retransmits: None,
                jitter_ms: sum.jitter_ms,
                lost_percent: sum.lost_percent,
            }
        }
    };

    if !report.mbps.is_finite() || report.mbps < 0.0 {
        return Err(ProbeError::Parse(format!(
            "invalid throughput {}",
            report.mbps
        )));
    }
    Ok(report)
}
