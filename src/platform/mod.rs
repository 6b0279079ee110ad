//! Per-platform WiFi status extraction.
//!
//! Each supported operating system prints link status in its own dialect.
//! An extractor turns one captured blob into a [`WifiSample`]; it never fails,
//! fields it cannot find stay `None`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub mod airport;
pub mod capture;
pub mod gateway;
pub mod iw;
pub mod netsh;

use airport::AirportExtractor;
use iw::IwExtractor;
use netsh::NetshExtractor;

/// Signal quality reported as 0% maps to this level.
pub const PERCENT_FLOOR_DBM: f64 = -100.0;
/// Signal quality reported as 100% maps to this level.
pub const PERCENT_CEILING_DBM: f64 = -30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// BSD-style `airport -I` output
    MacOs,
    /// `iw dev <iface> link` output
    Linux,
    /// `netsh wlan show interfaces` output
    Windows,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown platform: {0}")]
pub struct UnknownPlatform(pub String);

impl Platform {
    /// Platform of the running binary, if it is one we can parse.
    pub fn current() -> Option<Self> {
        if cfg!(target_os = "macos") {
            Some(Self::MacOs)
        } else if cfg!(target_os = "linux") {
            Some(Self::Linux)
        } else if cfg!(target_os = "windows") {
            Some(Self::Windows)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::MacOs => "darwin",
            Self::Linux => "linux",
            Self::Windows => "windows",
        }
    }

    pub fn default_interface(self) -> &'static str {
        match self {
            Self::MacOs => "en0",
            Self::Linux => "wlan0",
            Self::Windows => "Wi-Fi",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "darwin" | "macos" | "osx" => Ok(Self::MacOs),
            "linux" => Ok(Self::Linux),
            "windows" | "win32" => Ok(Self::Windows),
            other => Err(UnknownPlatform(other.to_string())),
        }
    }
}

/// One snapshot of the current wireless link.
///
/// Every field is independently optional. Absent values serialize as `null`
/// so a reader can tell "not measured" from "measured zero".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WifiSample {
    #[serde(default)]
    pub ssid: Option<String>,
    #[serde(default)]
    pub bssid: Option<String>,
    /// Signal strength in dBm.
    #[serde(default)]
    pub rssi: Option<i32>,
    #[serde(default)]
    pub channel: Option<String>,
    /// Transmit rate, always `"<n> Mbps"`.
    #[serde(default)]
    pub tx_rate: Option<String>,
    #[serde(default)]
    pub frequency_mhz: Option<u32>,
    /// Raw signal quality when the platform reports a percentage.
    #[serde(default)]
    pub signal_percent: Option<u8>,
    /// True when `rssi` is the linear approximation of `signal_percent`.
    #[serde(default)]
    pub rssi_estimated: bool,
    /// Why nothing could be extracted.
    #[serde(default)]
    pub diagnostic: Option<String>,
}

impl WifiSample {
    /// Sample for output that yielded no field at all.
    pub fn unparseable(reason: impl Into<String>) -> Self {
        Self {
            diagnostic: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ssid.is_none()
            && self.bssid.is_none()
            && self.rssi.is_none()
            && self.channel.is_none()
            && self.tx_rate.is_none()
            && self.frequency_mhz.is_none()
            && self.signal_percent.is_none()
    }

    /// Store a percentage quality and its approximate dBm equivalent.
    pub fn set_signal_percent(&mut self, percent: u8) {
        let percent = percent.min(100);
        self.signal_percent = Some(percent);
        self.rssi = Some(percent_to_dbm(percent as f64).round() as i32);
        self.rssi_estimated = true;
    }

    /// Attach a diagnostic if the blob produced nothing usable.
    fn finish(mut self, variant: &str, raw: &str) -> Self {
        if self.is_empty() {
            let reason = if raw.trim().is_empty() {
                format!("{variant}: empty output")
            } else {
                format!("{variant}: no recognised fields in output")
            };
            self.diagnostic = Some(reason);
        }
        self
    }
}

/// Parses one platform's WiFi status output.
pub trait WifiExtractor: Send + Sync + fmt::Debug {
    fn parse(&self, raw: &str) -> WifiSample;
}

/// Returns the extractor for the given platform tag.
pub fn extractor_for(platform: Platform) -> &'static dyn WifiExtractor {
    match platform {
        Platform::MacOs => &AirportExtractor,
        Platform::Linux => &IwExtractor,
        Platform::Windows => &NetshExtractor,
    }
}

pub fn parse_wifi_status(platform: Platform, raw: &str) -> WifiSample {
    let sample = extractor_for(platform).parse(raw);
    if let Some(reason) = sample.diagnostic.as_deref() {
        tracing::warn!(%platform, reason, "WiFi status could not be parsed");
    }
    sample
}

/// Approximate dBm for a signal-quality percentage.
///
/// Linear map 0% → -100 dBm, 100% → -30 dBm. Vendors do not publish the
/// real curve, so results carry the `rssi_estimated` flag.
pub fn percent_to_dbm(percent: f64) -> f64 {
    let percent = percent.clamp(0.0, 100.0);
    PERCENT_FLOOR_DBM + (PERCENT_CEILING_DBM - PERCENT_FLOOR_DBM) * percent / 100.0
}

/// Normalize a free-text rate to `"<n> Mbps"`.
///
/// Accepts bare numbers (taken as Mbps) and Mbit/s, Mb/s, Gbit/s, kbit/s
/// units in any case. Trailing descriptors such as MCS info are dropped.
pub fn normalize_rate(raw: &str) -> Option<String> {
    let mut tokens = raw.split_whitespace();
    let first = tokens.next()?;

    // Allow the unit glued to the number, e.g. "650Mbps".
    let split_at = first
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(first.len());
    let (number, glued_unit) = first.split_at(split_at);
    let value: f64 = number.parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }

    let unit = if glued_unit.is_empty() {
        tokens.next().unwrap_or("")
    } else {
        glued_unit
    };
    let scale = match unit.to_ascii_lowercase().as_str() {
        "gbit/s" | "gbps" | "gb/s" => 1000.0,
        "kbit/s" | "kbps" | "kb/s" => 0.001,
        _ => 1.0,
    };

    Some(format!("{} Mbps", value * scale))
}

/// Map a WiFi centre frequency to its channel number.
pub fn freq_to_channel(freq_mhz: u32) -> Option<u32> {
    match freq_mhz {
        2484 => Some(14),
        2412..=2472 => Some((freq_mhz - 2407) / 5),
        5160..=5885 => Some((freq_mhz - 5000) / 5),
        5955..=7115 => Some((freq_mhz - 5950) / 5),
        _ => None,
    }
}

/// Split a `key: value` line on the first colon, trimming both sides.
pub(crate) fn split_key_value(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key, value.trim()))
}

pub(crate) fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
