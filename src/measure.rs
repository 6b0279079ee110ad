//! One measurement cycle: capture → extract → probe → assemble → store.

use crate::platform::capture::LinkCapture;
use crate::platform::{Platform, WifiSample, parse_wifi_status};
use crate::probe::{self, EchoTransport, ProbeSettings, ThroughputTransport};
use crate::record::{self, Coordinates, MeasurementRecord, RecordContext, RecordError};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use tracing::{info, warn};

const STOP_POLL: Duration = Duration::from_millis(100);

/// Everything a cycle needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct CyclePlan {
    pub platform: Platform,
    pub interface: String,
    /// Echo target; the default gateway is looked up when `None`.
    pub target_host: Option<String>,
    pub settings: ProbeSettings,
}

/// Transports a cycle talks to.
pub struct Collaborators<'a> {
    pub capture: &'a mut dyn LinkCapture,
    pub echo: &'a mut dyn EchoTransport,
    pub throughput: &'a mut dyn ThroughputTransport,
}

/// Take one measurement at `coordinates`. Capture and probe failures degrade
/// the record instead of aborting the cycle.
pub fn run_cycle(
    io: &mut Collaborators<'_>,
    plan: &CyclePlan,
    coordinates: Coordinates,
    captured_at: OffsetDateTime,
) -> Result<MeasurementRecord, RecordError> {
    let wifi = match io.capture.wifi_status() {
        Ok(raw) => parse_wifi_status(plan.platform, &raw),
        Err(err) => {
            warn!(platform = %plan.platform, error = %err, "WiFi status capture failed");
            WifiSample::unparseable(err.to_string())
        }
    };

    let gateway = match io.capture.default_gateway() {
        Ok(gateway) => gateway,
        Err(err) => {
            warn!(error = %err, "Default gateway lookup failed");
            None
        }
    };
    let target = plan.target_host.clone().or_else(|| gateway.clone());

    let result = probe::probe(
        &mut *io.echo,
        &mut *io.throughput,
        target.as_deref(),
        &plan.settings,
    );

    let record = MeasurementRecord::assemble(
        wifi,
        result,
        coordinates,
        captured_at,
        RecordContext {
            os: Some(plan.platform.as_str().to_string()),
            interface: Some(plan.interface.clone()),
            gateway_ip: gateway,
        },
    )?;

    info!(
        x = coordinates.x,
        y = coordinates.y,
        ssid = record.wifi_info.ssid.as_deref().unwrap_or("-"),
        rssi = ?record.wifi_info.rssi,
        avg_latency_ms = ?record.latency.avg_latency_ms,
        packet_loss_percent = record.latency.packet_loss_percent,
        "Measurement taken"
    );
    Ok(record)
}

/// Run one cycle and persist the record under `output_dir`.
pub fn measure_and_store(
    io: &mut Collaborators<'_>,
    plan: &CyclePlan,
    coordinates: Coordinates,
    output_dir: &Path,
) -> Result<(MeasurementRecord, PathBuf), RecordError> {
    let captured_at = OffsetDateTime::now_utc();
    let record = run_cycle(io, plan, coordinates, captured_at)?;
    let path = record::store(output_dir, &record, captured_at)?;
    Ok((record, path))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonitorSchedule {
    pub interval: Duration,
    /// Stop after this long; runs until stopped when `None`.
    pub duration: Option<Duration>,
    /// Stop after this many cycles.
    pub max_cycles: Option<usize>,
}

/// Measure repeatedly at a fixed position until the schedule ends or `stop` is set.
///
/// A cycle that fails to store is logged and the loop carries on.
pub fn monitor(
    io: &mut Collaborators<'_>,
    plan: &CyclePlan,
    coordinates: Coordinates,
    output_dir: &Path,
    schedule: MonitorSchedule,
    stop: &AtomicBool,
) -> Vec<PathBuf> {
    let started = Instant::now();
    let mut stored = Vec::new();
    let mut cycles = 0usize;

    info!(
        interval_ms = schedule.interval.as_millis(),
        duration_secs = schedule.duration.map(|d| d.as_secs()),
        "Monitoring started"
    );

    while !stop.load(Ordering::Relaxed) {
        if schedule.max_cycles.is_some_and(|max| cycles >= max)
            || schedule.duration.is_some_and(|limit| started.elapsed() >= limit)
        {
            break;
        }

        let cycle_start = Instant::now();
        cycles += 1;
        match measure_and_store(io, plan, coordinates, output_dir) {
            Ok((_, path)) => stored.push(path),
            Err(err) => warn!(cycle = cycles, error = %err, "Monitoring cycle failed"),
        }

        if schedule.max_cycles.is_some_and(|max| cycles >= max) {
            break;
        }
        sleep_with_stop(schedule.interval, stop, cycle_start);
    }

    info!(cycles, stored = stored.len(), "Monitoring finished");
    stored
}

fn sleep_with_stop(interval: Duration, stop: &AtomicBool, start: Instant) {
    while !stop.load(Ordering::Relaxed) {
        let elapsed = start.elapsed();
        if elapsed >= interval {
            return;
        }
        std::thread::sleep(STOP_POLL.min(interval - elapsed));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::capture::CaptureError;
    use crate::probe::mock::{MockEcho, MockThroughput, MockTransferBehavior};

    struct FixedCapture {
        status: Option<&'static str>,
        gateway: Option<&'static str>,
    }

    impl LinkCapture for FixedCapture {
        fn wifi_status(&mut self) -> Result<String, CaptureError> {
            self.status
                .map(str::to_string)
                .ok_or_else(|| CaptureError::Timeout {
                    program: "iw".to_string(),
                    timeout: Duration::from_secs(1),
                })
        }

        fn default_gateway(&mut self) -> Result<Option<String>, CaptureError> {
            Ok(self.gateway.map(str::to_string))
        }
    }

    fn idle_throughput() -> MockThroughput {
        MockThroughput::new(MockTransferBehavior::ok(1.0), MockTransferBehavior::ok(1.0))
    }

    fn plan(target_host: Option<&str>) -> CyclePlan {
        CyclePlan {
            platform: Platform::Linux,
            interface: "wlan0".to_string(),
            target_host: target_host.map(str::to_string),
            settings: ProbeSettings {
                probe_count: 3,
                probe_timeout: Duration::from_millis(10),
                throughput_host: None,
                throughput_duration: Duration::from_secs(1),
            },
        }
    }

    #[test]
    fn cycle_uses_gateway_as_default_target() -> Result<(), RecordError> {
        let mut capture = FixedCapture {
            status: Some(
                "Connected to aa:bb:cc:dd:ee:ff (on wlan0)\n\tSSID: Lab\n\tsignal: -58 dBm\n",
            ),
            gateway: Some("192.168.1.1"),
        };
        let mut echo = MockEcho::with_replies(vec![Some(2.0), Some(3.0), Some(4.0)]);
        let mut throughput = idle_throughput();
        let mut io = Collaborators {
            capture: &mut capture,
            echo: &mut echo,
            throughput: &mut throughput,
        };

        let record = run_cycle(
            &mut io,
            &plan(None),
            Coordinates::new(3.0, 4.0),
            OffsetDateTime::UNIX_EPOCH,
        )?;

        assert_eq!(record.wifi_info.rssi, Some(-58));
        assert_eq!(record.latency.target.as_deref(), Some("192.168.1.1"));
        assert_eq!(record.latency.avg_latency_ms, Some(3.0));
        assert_eq!(record.gateway_ip.as_deref(), Some("192.168.1.1"));
        assert_eq!(record.os.as_deref(), Some("linux"));
        assert_eq!(record.throughput.tcp_throughput_mbps, None);
        Ok(())
    }

    #[test]
    fn capture_failure_still_produces_record() -> Result<(), RecordError> {
        let mut capture = FixedCapture {
            status: None,
            gateway: None,
        };
        let mut echo = MockEcho::unreachable();
        let mut throughput = idle_throughput();
        let mut io = Collaborators {
            capture: &mut capture,
            echo: &mut echo,
            throughput: &mut throughput,
        };

        let record = run_cycle(
            &mut io,
            &plan(Some("10.0.0.9")),
            Coordinates::new(0.0, 0.0),
            OffsetDateTime::UNIX_EPOCH,
        )?;

        assert!(record.wifi_info.is_empty());
        assert!(record.wifi_info.diagnostic.is_some());
        assert_eq!(record.latency.packet_loss_percent, 100.0);
        assert_eq!(record.latency.avg_latency_ms, None);
        assert_eq!(record.latency.target.as_deref(), Some("10.0.0.9"));
        Ok(())
    }

    #[test]
    fn monitor_stops_after_max_cycles() -> Result<(), Box<dyn std::error::Error>> {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)?
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("wifi-heatmap-monitor-{nanos}"));
        let mut capture = FixedCapture {
            status: Some("\tSSID: Lab\n"),
            gateway: Some("gw"),
        };
        let mut echo = MockEcho::with_replies(vec![Some(1.0); 6]);
        let mut throughput = idle_throughput();
        let mut io = Collaborators {
            capture: &mut capture,
            echo: &mut echo,
            throughput: &mut throughput,
        };
        let stop = AtomicBool::new(false);

        let stored = monitor(
            &mut io,
            &plan(None),
            Coordinates::new(1.0, 1.0),
            &dir,
            MonitorSchedule {
                interval: Duration::ZERO,
                duration: None,
                max_cycles: Some(2),
            },
            &stop,
        );
        let loaded = record::load_dir(&dir)?;
        std::fs::remove_dir_all(&dir)?;

        assert_eq!(stored.len(), 2);
        assert_eq!(loaded.len(), 2);
        Ok(())
    }

    #[test]
    fn monitor_does_nothing_once_stopped() {
        let mut capture = FixedCapture {
            status: None,
            gateway: None,
        };
        let mut echo = MockEcho::unreachable();
        let mut throughput = idle_throughput();
        let mut io = Collaborators {
            capture: &mut capture,
            echo: &mut echo,
            throughput: &mut throughput,
        };
        let stop = AtomicBool::new(true);

        let stored = monitor(
            &mut io,
            &plan(None),
            Coordinates::new(1.0, 1.0),
            Path::new("/nonexistent"),
            MonitorSchedule {
                interval: Duration::from_secs(60),
                duration: None,
                max_cycles: None,
            },
            &stop,
        );

        assert!(stored.is_empty());
        assert_eq!(echo.calls(), 0);
    }
}
