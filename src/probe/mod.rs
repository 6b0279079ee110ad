//! Active network probing: echo latency/jitter/loss and optional throughput.
//!
//! Failures never escape a probe cycle. An unreachable host turns into 100%
//! loss with `None` latency; a failed transfer leaves its throughput `None`.

use crate::platform::capture::CaptureError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod command;
pub mod mock;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("no reply within {0:?}")]
    Timeout(Duration),
    #[error("host unreachable: {0}")]
    Unreachable(String),
    #[error("unexpected probe output: {0}")]
    Parse(String),
    #[error(transparent)]
    Capture(#[from] CaptureError),
}

/// Sends one echo request and returns the round-trip time in milliseconds.
pub trait EchoTransport {
    fn echo(&mut self, host: &str, timeout: Duration) -> Result<f64, ProbeError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    Tcp,
    Udp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransferReport {
    pub mbps: f64,
    pub retransmits: Option<u64>,
    pub jitter_ms: Option<f64>,
    pub lost_percent: Option<f64>,
}

/// Runs one bulk transfer test against a throughput server.
pub trait ThroughputTransport {
    fn transfer(
        &mut self,
        host: &str,
        mode: TransferMode,
        duration: Duration,
    ) -> Result<TransferReport, ProbeError>;
}

#[derive(Debug, Clone)]
pub struct ProbeSettings {
    pub probe_count: u32,
    pub probe_timeout: Duration,
    pub throughput_host: Option<String>,
    pub throughput_duration: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            probe_count: crate::config::DEFAULT_PROBE_COUNT,
            probe_timeout: Duration::from_millis(crate::config::DEFAULT_PROBE_TIMEOUT_MS),
            throughput_host: None,
            throughput_duration: Duration::from_secs(
                crate::config::DEFAULT_THROUGHPUT_DURATION_SECS,
            ),
        }
    }
}

/// Echo statistics. Latency fields are `None` when nothing came back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    #[serde(default)]
    pub avg_latency_ms: Option<f64>,
    #[serde(default)]
    pub packet_loss_percent: f64,
    #[serde(default)]
    pub jitter_ms: Option<f64>,
    #[serde(default)]
    pub min_latency_ms: Option<f64>,
    #[serde(default)]
    pub max_latency_ms: Option<f64>,
    #[serde(default)]
    pub packets_sent: u32,
    #[serde(default)]
    pub packets_received: u32,
    #[serde(default)]
    pub target: Option<String>,
}

impl LatencyStats {
    /// Stats for a cycle where no echo target could be determined.
    pub fn unmeasured() -> Self {
        Self {
            avg_latency_ms: None,
            packet_loss_percent: 100.0,
            jitter_ms: None,
            min_latency_ms: None,
            max_latency_ms: None,
            packets_sent: 0,
            packets_received: 0,
            target: None,
        }
    }

    /// Summarize successful round-trip times out of `sent` probes.
    pub fn from_round_trips(target: Option<String>, sent: u32, rtts_ms: &[f64]) -> Self {
        let received = (rtts_ms.len() as u32).min(sent);
        let packet_loss_percent = if sent == 0 {
            100.0
        } else {
            (100.0 * (sent - received) as f64 / sent as f64).clamp(0.0, 100.0)
        };

        let avg_latency_ms = if rtts_ms.is_empty() {
            None
        } else {
            Some(rtts_ms.iter().sum::<f64>() / rtts_ms.len() as f64)
        };

        Self {
            avg_latency_ms,
            packet_loss_percent,
            jitter_ms: jitter(rtts_ms),
            min_latency_ms: rtts_ms.iter().copied().reduce(f64::min),
            max_latency_ms: rtts_ms.iter().copied().reduce(f64::max),
            packets_sent: sent,
            packets_received: received,
            target,
        }
    }

    pub fn was_measured(&self) -> bool {
        self.packets_sent > 0
    }
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self::unmeasured()
    }
}

/// Throughput results; each field is `None` when its transfer failed or was skipped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThroughputStats {
    #[serde(default)]
    pub tcp_throughput_mbps: Option<f64>,
    #[serde(default)]
    pub udp_throughput_mbps: Option<f64>,
    #[serde(default)]
    pub tcp_retransmits: Option<u64>,
    #[serde(default)]
    pub udp_jitter_ms: Option<f64>,
    #[serde(default)]
    pub udp_lost_percent: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkProbeResult {
    pub latency: LatencyStats,
    pub throughput: ThroughputStats,
}

impl NetworkProbeResult {
    pub fn avg_latency_ms(&self) -> Option<f64> {
        self.latency.avg_latency_ms
    }

    pub fn jitter_ms(&self) -> Option<f64> {
        self.latency.jitter_ms
    }

    pub fn packet_loss_percent(&self) -> f64 {
        self.latency.packet_loss_percent
    }

    pub fn tcp_throughput_mbps(&self) -> Option<f64> {
        self.throughput.tcp_throughput_mbps
    }

    pub fn udp_throughput_mbps(&self) -> Option<f64> {
        self.throughput.udp_throughput_mbps
    }
}

/// Mean absolute difference between consecutive round-trip samples.
///
/// `None` with fewer than two samples.
pub fn jitter(rtts_ms: &[f64]) -> Option<f64> {
    if rtts_ms.len() < 2 {
        return None;
    }
    let total: f64 = rtts_ms
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).abs())
        .sum();
    Some(total / (rtts_ms.len() - 1) as f64)
}

/// Send `count` echo probes to `host`, one at a time.
pub fn measure_latency<E>(echo: &mut E, host: &str, count: u32, timeout: Duration) -> LatencyStats
where
    E: EchoTransport + ?Sized,
{
    let mut rtts = Vec::with_capacity(count as usize);
    for seq in 0..count {
        match echo.echo(host, timeout) {
            Ok(rtt_ms) if rtt_ms.is_finite() && rtt_ms >= 0.0 => {
                debug!(host, seq, rtt_ms, "Echo reply");
                rtts.push(rtt_ms);
            }
            Ok(rtt_ms) => {
                warn!(host, seq, rtt_ms, "Discarding invalid round-trip time");
            }
            Err(err) => {
                debug!(host, seq, error = %err, "Echo probe failed");
            }
        }
    }

    let stats = LatencyStats::from_round_trips(Some(host.to_string()), count, &rtts);
    if stats.avg_latency_ms.is_none() {
        warn!(host, count, "No echo replies received");
    }
    stats
}

/// One TCP and one UDP transfer against `host`.
pub fn measure_throughput<T>(transport: &mut T, host: &str, duration: Duration) -> ThroughputStats
where
    T: ThroughputTransport + ?Sized,
{
    let mut stats = ThroughputStats::default();

    match transport.transfer(host, TransferMode::Tcp, duration) {
        Ok(report) => {
            stats.tcp_throughput_mbps = Some(report.mbps);
            stats.tcp_retransmits = report.retransmits;
        }
        Err(err) => warn!(host, error = %err, "TCP throughput test failed"),
    }

    match transport.transfer(host, TransferMode::Udp, duration) {
        Ok(report) => {
            stats.udp_throughput_mbps = Some(report.mbps);
            stats.udp_jitter_ms = report.jitter_ms;
            stats.udp_lost_percent = report.lost_percent;
        }
        Err(err) => warn!(host, error = %err, "UDP throughput test failed"),
    }

    stats
}

/// Run a full probe cycle. `target` is the echo host, normally the gateway.
pub fn probe<E, T>(
    echo: &mut E,
    throughput: &mut T,
    target: Option<&str>,
    settings: &ProbeSettings,
) -> NetworkProbeResult
where
    E: EchoTransport + ?Sized,
    T: ThroughputTransport + ?Sized,
{
    let latency = match target {
        Some(host) => {
            info!(host, count = settings.probe_count, "Measuring latency");
            measure_latency(echo, host, settings.probe_count, settings.probe_timeout)
        }
        None => {
            warn!("No echo target available, latency not measured");
            LatencyStats::unmeasured()
        }
    };

    let throughput = match settings.throughput_host.as_deref() {
        Some(host) => {
            info!(host, "Measuring throughput");
            measure_throughput(throughput, host, settings.throughput_duration)
        }
        None => ThroughputStats::default(),
    };

    NetworkProbeResult {
        latency,
        throughput,
    }
}
