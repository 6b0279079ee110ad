use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use time::OffsetDateTime;
use wifi_heatmap::dataset::{Metric, ScatteredMetricDataset};
use wifi_heatmap::interpolation::{self, Bounds, EdgePolicy, GridSpec, Method, Region};
use wifi_heatmap::measure::{self, Collaborators, CyclePlan};
use wifi_heatmap::platform::Platform;
use wifi_heatmap::platform::capture::{CaptureError, LinkCapture};
use wifi_heatmap::probe::ProbeSettings;
use wifi_heatmap::probe::mock::{MockEcho, MockThroughput, MockTransferBehavior};
use wifi_heatmap::record::{self, Coordinates};

struct ScriptedCapture {
    rssi: i32,
}

impl LinkCapture for ScriptedCapture {
    fn wifi_status(&mut self) -> Result<String, CaptureError> {
        Ok(format!(
            "Connected to 00:11:22:33:44:55 (on wlan0)\n\tSSID: Survey\n\tfreq: 5180\n\
             \tsignal: {} dBm\n\ttx bitrate: 433.3 MBit/s\n",
            self.rssi
        ))
    }

    fn default_gateway(&mut self) -> Result<Option<String>, CaptureError> {
        Ok(Some("192.168.1.1".to_string()))
    }
}

fn plan(probe_count: u32) -> CyclePlan {
    CyclePlan {
        platform: Platform::Linux,
        interface: "wlan0".to_string(),
        target_host: None,
        settings: ProbeSettings {
            probe_count,
            probe_timeout: Duration::from_millis(50),
            throughput_host: Some("192.168.1.100".to_string()),
            throughput_duration: Duration::from_secs(1),
        },
    }
}

fn temp_dir(name: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let unique = SystemTime::now().duration_since(UNIX_EPOCH)?.as_nanos();
    Ok(std::env::temp_dir().join(format!("wifi-heatmap-{name}-{unique}")))
}

#[test]
fn mock_cycles_feed_a_nearest_field() -> Result<(), Box<dyn std::error::Error>> {
    let dir = temp_dir("pipeline")?;
    let samples = [((0.0, 0.0), -30), ((10.0, 0.0), -70), ((5.0, 10.0), -50)];

    for (index, ((x, y), rssi)) in samples.into_iter().enumerate() {
        let mut capture = ScriptedCapture { rssi };
        let mut echo = MockEcho::with_replies(vec![Some(2.0), Some(4.0), Some(3.0)]);
        let mut throughput = MockThroughput::new(
            MockTransferBehavior::ok(180.0).with_retransmits(2),
            MockTransferBehavior::ok(95.0).with_datagram_stats(0.4, 1.5),
        );
        let mut io = Collaborators {
            capture: &mut capture,
            echo: &mut echo,
            throughput: &mut throughput,
        };
        let captured_at = OffsetDateTime::from_unix_timestamp(1_767_225_600 + index as i64)?;

        let record = measure::run_cycle(&mut io, &plan(3), Coordinates::new(x, y), captured_at)?;
        record::store(&dir, &record, captured_at)?;
    }

    let records = record::load_dir(&dir)?;
    std::fs::remove_dir_all(&dir)?;
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.latency.avg_latency_ms == Some(3.0)));
    assert!(records.iter().all(|r| r.throughput.tcp_throughput_mbps == Some(180.0)));
    assert!(records.iter().all(|r| r.gateway_ip.as_deref() == Some("192.168.1.1")));

    let dataset = ScatteredMetricDataset::from_records(&records, Metric::Rssi);
    let spec = GridSpec {
        resolution_x: 3,
        resolution_y: 3,
        method: Method::Nearest,
        edge_policy: EdgePolicy::NearestFill,
        region: Region::Explicit(Bounds {
            min_x: 0.0,
            max_x: 10.0,
            min_y: 0.0,
            max_y: 10.0,
        }),
    };
    let field = interpolation::interpolate(&dataset, &spec)?;

    assert_eq!(field.grid_x, vec![0.0, 5.0, 10.0]);
    assert_eq!(field.grid_y, vec![0.0, 5.0, 10.0]);
    assert_eq!(field.values[1], vec![Some(-30.0), Some(-50.0), Some(-70.0)]);
    assert_eq!(field.values[0][0], Some(-30.0));
    assert_eq!(field.values[0][2], Some(-70.0));
    assert_eq!(field.values[2][1], Some(-50.0));
    assert_eq!(field.undefined_cells(), 0);
    Ok(())
}

#[test]
fn unreachable_gateway_is_recorded_as_total_loss() -> Result<(), Box<dyn std::error::Error>> {
    let mut capture = ScriptedCapture { rssi: -64 };
    let mut echo = MockEcho::unreachable();
    let mut throughput =
        MockThroughput::new(MockTransferBehavior::timeout(), MockTransferBehavior::timeout());
    let mut io = Collaborators {
        capture: &mut capture,
        echo: &mut echo,
        throughput: &mut throughput,
    };

    let record = measure::run_cycle(
        &mut io,
        &plan(10),
        Coordinates::new(2.0, 3.0),
        OffsetDateTime::UNIX_EPOCH,
    )?;

    assert_eq!(echo.calls(), 10);
    assert_eq!(record.latency.packet_loss_percent, 100.0);
    assert_eq!(record.latency.packets_sent, 10);
    assert_eq!(record.latency.packets_received, 0);
    assert_eq!(record.latency.avg_latency_ms, None);
    assert_eq!(record.latency.jitter_ms, None);
    assert_eq!(record.throughput.tcp_throughput_mbps, None);
    assert_eq!(record.throughput.udp_throughput_mbps, None);
    assert_eq!(record.wifi_info.rssi, Some(-64));
    assert_eq!(Metric::PacketLoss.value_of(&record), Some(100.0));
    assert_eq!(Metric::AvgLatency.value_of(&record), None);
    Ok(())
}

#[test]
fn loaded_records_reject_degenerate_fields() -> Result<(), Box<dyn std::error::Error>> {
    let dir = temp_dir("collinear")?;
    for (index, x) in [0.0, 5.0, 10.0].into_iter().enumerate() {
        let mut capture = ScriptedCapture { rssi: -40 - index as i32 };
        let mut echo = MockEcho::with_replies(vec![Some(1.0)]);
        let mut throughput =
            MockThroughput::new(MockTransferBehavior::ok(1.0), MockTransferBehavior::ok(1.0));
        let mut io = Collaborators {
            capture: &mut capture,
            echo: &mut echo,
            throughput: &mut throughput,
        };
        let captured_at = OffsetDateTime::from_unix_timestamp(1_767_225_600 + index as i64)?;
        let record = measure::run_cycle(&mut io, &plan(1), Coordinates::new(x, 0.0), captured_at)?;
        record::store(&dir, &record, captured_at)?;
    }

    let records = record::load_dir(&dir)?;
    std::fs::remove_dir_all(&dir)?;
    let dataset = ScatteredMetricDataset::from_records(&records, Metric::Rssi);

    let linear = interpolation::interpolate(&dataset, &GridSpec::default());
    assert!(matches!(
        linear,
        Err(interpolation::InterpolationError::NumericFailure(_))
    ));

    let nearest = interpolation::interpolate(
        &dataset,
        &GridSpec {
            method: Method::Nearest,
            ..GridSpec::default()
        },
    )?;
    assert_eq!(nearest.undefined_cells(), 0);
    Ok(())
}
