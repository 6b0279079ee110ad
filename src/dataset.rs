//! Scattered per-metric datasets built from measurement records.

use crate::record::MeasurementRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Distinct locations needed before a field can be interpolated.
pub const MIN_DISTINCT_POINTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Rssi,
    AvgLatency,
    Jitter,
    PacketLoss,
    TcpThroughput,
    UdpThroughput,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown metric `{0}`")]
pub struct UnknownMetric(pub String);

impl Metric {
    pub const ALL: [Metric; 6] = [
        Metric::Rssi,
        Metric::AvgLatency,
        Metric::Jitter,
        Metric::PacketLoss,
        Metric::TcpThroughput,
        Metric::UdpThroughput,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Rssi => "rssi",
            Metric::AvgLatency => "avg_latency",
            Metric::Jitter => "jitter",
            Metric::PacketLoss => "packet_loss",
            Metric::TcpThroughput => "tcp_throughput",
            Metric::UdpThroughput => "udp_throughput",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Metric::Rssi => "Signal Strength (dBm)",
            Metric::AvgLatency => "Average Latency (ms)",
            Metric::Jitter => "Jitter (ms)",
            Metric::PacketLoss => "Packet Loss (%)",
            Metric::TcpThroughput => "TCP Throughput (Mbps)",
            Metric::UdpThroughput => "UDP Throughput (Mbps)",
        }
    }

    /// True when larger values mean a better link.
    pub fn higher_is_better(self) -> bool {
        matches!(
            self,
            Metric::Rssi | Metric::TcpThroughput | Metric::UdpThroughput
        )
    }

    /// The metric's value in `record`, if it was measured.
    ///
    /// Older files store `0` for an unparsed RSSI and for latency with no
    /// replies; those placeholders count as absent.
    pub fn value_of(self, record: &MeasurementRecord) -> Option<f64> {
        let replied = record.latency.packet_loss_percent < 100.0;
        let value = match self {
            Metric::Rssi => record.wifi_info.rssi.filter(|rssi| *rssi != 0).map(f64::from),
            Metric::AvgLatency => record.latency.avg_latency_ms.filter(|_| replied),
            Metric::Jitter => record.latency.jitter_ms.filter(|_| replied),
            Metric::PacketLoss => record
                .latency
                .was_measured()
                .then_some(record.latency.packet_loss_percent),
            Metric::TcpThroughput => record.throughput.tcp_throughput_mbps,
            Metric::UdpThroughput => record.throughput.udp_throughput_mbps,
        };
        value.filter(|v| v.is_finite())
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = UnknownMetric;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "rssi" | "signal" => Ok(Metric::Rssi),
            "avg_latency" | "avg_latency_ms" | "latency" => Ok(Metric::AvgLatency),
            "jitter" | "jitter_ms" => Ok(Metric::Jitter),
            "packet_loss" | "packet_loss_percent" | "loss" => Ok(Metric::PacketLoss),
            "tcp_throughput" | "tcp_throughput_mbps" | "tcp" => Ok(Metric::TcpThroughput),
            "udp_throughput" | "udp_throughput_mbps" | "udp" => Ok(Metric::UdpThroughput),
            _ => Err(UnknownMetric(s.to_string())),
        }
    }
}

/// `(x, y) → value` samples of one metric, index-aligned.
#[derive(Debug, Clone, PartialEq)]
pub struct ScatteredMetricDataset {
    metric: Metric,
    points: Vec<(f64, f64)>,
    values: Vec<f64>,
}

impl ScatteredMetricDataset {
    /// Records without the metric or with non-finite coordinates are skipped.
    /// Duplicate coordinates are kept.
    pub fn from_records<'a, I>(records: I, metric: Metric) -> Self
    where
        I: IntoIterator<Item = &'a MeasurementRecord>,
    {
        let mut points = Vec::new();
        let mut values = Vec::new();
        for record in records {
            if !record.coordinates.is_finite() {
                continue;
            }
            if let Some(value) = metric.value_of(record) {
                points.push((record.coordinates.x, record.coordinates.y));
                values.push(value);
            }
        }
        Self {
            metric,
            points,
            values,
        }
    }

    /// Build from raw samples; `None` if the lengths differ or a value is not finite.
    pub fn from_samples(metric: Metric, points: Vec<(f64, f64)>, values: Vec<f64>) -> Option<Self> {
        let finite = points.iter().all(|(x, y)| x.is_finite() && y.is_finite())
            && values.iter().all(|v| v.is_finite());
        if points.len() != values.len() || !finite {
            return None;
        }
        Some(Self {
            metric,
            points,
            values,
        })
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn distinct_point_count(&self) -> usize {
        self.points
            .iter()
            .map(|&point| point_key(point))
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn is_sufficient(&self) -> bool {
        self.distinct_point_count() >= MIN_DISTINCT_POINTS
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSummary {
    pub metric: Metric,
    pub label: &'static str,
    pub higher_is_better: bool,
    pub count: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
}

impl MetricSummary {
    fn from_dataset(dataset: &ScatteredMetricDataset) -> Self {
        let values = dataset.values();
        let mean = if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        };
        Self {
            metric: dataset.metric(),
            label: dataset.metric().label(),
            higher_is_better: dataset.metric().higher_is_better(),
            count: values.len(),
            min: values.iter().copied().reduce(f64::min),
            max: values.iter().copied().reduce(f64::max),
            mean,
        }
    }
}

/// Overview of a record collection: extents, networks seen and per-metric stats.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub record_count: usize,
    pub x_range: Option<ValueRange>,
    pub y_range: Option<ValueRange>,
    pub ssids: Vec<String>,
    pub metrics: Vec<MetricSummary>,
}

impl DatasetSummary {
    pub fn from_records(records: &[MeasurementRecord]) -> Self {
        let finite: Vec<_> = records
            .iter()
            .map(|record| record.coordinates)
            .filter(|coords| coords.is_finite())
            .collect();

        let ssids = records
            .iter()
            .filter_map(|record| record.wifi_info.ssid.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let metrics = Metric::ALL
            .iter()
            .map(|metric| {
                MetricSummary::from_dataset(&ScatteredMetricDataset::from_records(records, *metric))
            })
            .collect();

        Self {
            record_count: records.len(),
            x_range: range(finite.iter().map(|c| c.x)),
            y_range: range(finite.iter().map(|c| c.y)),
            ssids,
            metrics,
        }
    }

    pub fn metric(&self, metric: Metric) -> Option<&MetricSummary> {
        self.metrics.iter().find(|summary| summary.metric == metric)
    }
}

/// Bitwise identity of a location, with `-0.0` folded into `0.0`.
pub(crate) fn point_key((x, y): (f64, f64)) -> (u64, u64) {
    ((x + 0.0).to_bits(), (y + 0.0).to_bits())
}

fn range(values: impl Iterator<Item = f64>) -> Option<ValueRange> {
    values.fold(None, |acc, v| match acc {
        None => Some(ValueRange { min: v, max: v }),
        Some(r) => Some(ValueRange {
            min: r.min.min(v),
            max: r.max.max(v),
        }),
    })
}
