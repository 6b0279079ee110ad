//! Linux `iw dev <iface> link` output.
//!
//! ```text
//! Connected to aa:bb:cc:dd:ee:ff (on wlan0)
//!         SSID: HomeNet
//!         freq: 5180
//!         signal: -52 dBm
//!         tx bitrate: 650.0 MBit/s VHT-MCS 7 80MHz short GI VHT-NSS 2
//! ```

use super::{
    WifiExtractor, WifiSample, freq_to_channel, non_empty, normalize_rate, split_key_value,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct IwExtractor;

impl WifiExtractor for IwExtractor {
    fn parse(&self, raw: &str) -> WifiSample {
        let mut sample = WifiSample::default();

        for line in raw.lines() {
            let line = line.trim();

            if let Some(rest) = line.strip_prefix("Connected to ") {
                sample.bssid = rest
                    .split_whitespace()
                    .next()
                    .filter(|mac| mac.len() == 17)
                    .map(|mac| mac.to_lowercase());
                continue;
            }

            let Some((key, value)) = split_key_value(line) else {
                continue;
            };

            match key {
                "SSID" => sample.ssid = non_empty(value),
                "freq" => {
                    // newer iw prints fractional MHz, e.g. "5180.0"
                    let mhz = value
                        .split_whitespace()
                        .next()
                        .and_then(|v| v.parse::<f64>().ok())
                        .filter(|v| v.is_finite() && *v > 0.0)
                        .map(|v| v.round() as u32);
                    sample.frequency_mhz = mhz;
                    if sample.channel.is_none() {
                        sample.channel = mhz.and_then(freq_to_channel).map(|ch| ch.to_string());
                    }
                }
                "signal" => {
                    sample.rssi = value
                        .split_whitespace()
                        .next()
                        .and_then(|v| v.parse::<i32>().ok());
                }
                "tx bitrate" => sample.tx_rate = normalize_rate(value),
                _ => {}
            }
        }

        sample.finish("iw", raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONNECTED: &str = "Connected to AA:BB:CC:DD:EE:FF (on wlan0)
\tSSID: HomeNet
\tfreq: 5180
\tRX: 1234567 bytes (8910 packets)
\tTX: 765432 bytes (4321 packets)
\tsignal: -52 dBm
\trx bitrate: 866.7 MBit/s VHT-MCS 9 80MHz short GI VHT-NSS 2
\ttx bitrate: 650.0 MBit/s VHT-MCS 7 80MHz short GI VHT-NSS 2

\tbss flags:\tshort-slot-time
\tdtim period:\t1
\tbeacon int:\t100
";

    #[test]
    fn parses_connected_output() {
        let sample = IwExtractor.parse(CONNECTED);

        assert_eq!(sample.bssid.as_deref(), Some("aa:bb:cc:dd:ee:ff"));
        assert_eq!(sample.ssid.as_deref(), Some("HomeNet"));
        assert_eq!(sample.frequency_mhz, Some(5180));
        assert_eq!(sample.channel.as_deref(), Some("36"));
        assert_eq!(sample.rssi, Some(-52));
        assert_eq!(sample.tx_rate.as_deref(), Some("650 Mbps"));
        assert!(!sample.rssi_estimated);
        assert_eq!(sample.diagnostic, None);
    }

    #[test]
    fn rx_bitrate_is_not_taken_as_tx_rate() {
        let sample = IwExtractor.parse("\trx bitrate: 72.2 MBit/s\n\tSSID: Lab\n");

        assert_eq!(sample.tx_rate, None);
        assert_eq!(sample.ssid.as_deref(), Some("Lab"));
    }

    #[test]
    fn fractional_frequency_is_rounded() {
        let sample = IwExtractor.parse("\tfreq: 2437.0\n");

        assert_eq!(sample.frequency_mhz, Some(2437));
        assert_eq!(sample.channel.as_deref(), Some("6"));
    }

    #[test]
    fn not_connected_is_unparseable() {
        let sample = IwExtractor.parse("Not connected.\n");

        assert!(sample.is_empty());
        assert!(
            sample
                .diagnostic
                .as_deref()
                .is_some_and(|reason| reason.starts_with("iw"))
        );
    }
}
