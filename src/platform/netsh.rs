//! Windows `netsh wlan show interfaces` output.
//!
//! The table is `Name : value` with padded names. Signal is a quality
//! percentage; recent builds add an `Rssi` row with the real dBm figure and
//! rename `BSSID` to `AP BSSID`.

use super::{WifiExtractor, WifiSample, non_empty, normalize_rate, split_key_value};

#[derive(Debug, Clone, Copy, Default)]
pub struct NetshExtractor;

impl WifiExtractor for NetshExtractor {
    fn parse(&self, raw: &str) -> WifiSample {
        let mut sample = WifiSample::default();
        let mut measured_rssi = None;

        for line in raw.lines() {
            let Some((key, value)) = split_key_value(line) else {
                continue;
            };

            match key.to_ascii_lowercase().as_str() {
                "ssid" => sample.ssid = non_empty(value),
                "bssid" | "ap bssid" => {
                    sample.bssid = non_empty(value).map(|mac| mac.to_lowercase())
                }
                "channel" => sample.channel = non_empty(value),
                "signal" => {
                    if let Some(percent) = value
                        .trim_end_matches('%')
                        .trim()
                        .parse::<u8>()
                        .ok()
                    {
                        sample.set_signal_percent(percent);
                    }
                }
                "rssi" => measured_rssi = value.parse::<i32>().ok(),
                key if key.starts_with("transmit rate") => {
                    // "Transmit rate (Mbps)" carries the unit in the key
                    sample.tx_rate = normalize_rate(value);
                }
                _ => {}
            }
        }

        if let Some(rssi) = measured_rssi {
            sample.rssi = Some(rssi);
            sample.rssi_estimated = false;
        }

        sample.finish("netsh", raw)
    }
}
