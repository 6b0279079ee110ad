//! macOS `airport -I` output.
//!
//! ```text
//!      agrCtlRSSI: -55
//!     agrCtlNoise: -89
//!           state: running
//!      lastTxRate: 867
//!           BSSID: a4:2b:b0:fe:ee:21
//!            SSID: HomeNet
//!         channel: 36,80
//! ```

use super::{WifiExtractor, WifiSample, non_empty, normalize_rate, split_key_value};

#[derive(Debug, Clone, Copy, Default)]
pub struct AirportExtractor;

impl WifiExtractor for AirportExtractor {
    fn parse(&self, raw: &str) -> WifiSample {
        let mut sample = WifiSample::default();

        for line in raw.lines() {
            let Some((key, value)) = split_key_value(line) else {
                continue;
            };

            match key {
                "SSID" => sample.ssid = non_empty(value),
                "BSSID" => sample.bssid = non_empty(value).map(|mac| mac.to_lowercase()),
                "agrCtlRSSI" => {
                    // 0 means the card reported no link
                    sample.rssi = value.parse::<i32>().ok().filter(|rssi| *rssi != 0);
                }
                "channel" => sample.channel = non_empty(value),
                "lastTxRate" => sample.tx_rate = normalize_rate(value),
                _ => {}
            }
        }

        sample.finish("airport", raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONNECTED: &str = "     agrCtlRSSI: -55
     agrExtRSSI: 0
    agrCtlNoise: -89
    agrExtNoise: 0
          state: running
        op mode: station
     lastTxRate: 867
        maxRate: 867
lastAssocStatus: 0
    802.11 auth: open
      link auth: wpa2-psk
          BSSID: A4:2B:B0:FE:EE:21
           SSID: HomeNet
            MCS: 9
  guardInterval: 800
            NSS: 2
        channel: 36,80
";

    #[test]
    fn parses_connected_output() {
        let sample = AirportExtractor.parse(CONNECTED);

        assert_eq!(sample.ssid.as_deref(), Some("HomeNet"));
        assert_eq!(sample.bssid.as_deref(), Some("a4:2b:b0:fe:ee:21"));
        assert_eq!(sample.rssi, Some(-55));
        assert_eq!(sample.channel.as_deref(), Some("36,80"));
        assert_eq!(sample.tx_rate.as_deref(), Some("867 Mbps"));
        assert!(!sample.rssi_estimated);
        assert_eq!(sample.diagnostic, None);
    }

    #[test]
    fn missing_keys_stay_absent() {
        let sample = AirportExtractor.parse("           SSID: Cafe\n     agrCtlRSSI: bogus\n");

        assert_eq!(sample.ssid.as_deref(), Some("Cafe"));
        assert_eq!(sample.rssi, None);
        assert_eq!(sample.bssid, None);
        assert_eq!(sample.tx_rate, None);
        assert_eq!(sample.diagnostic, None);
    }

    #[test]
    fn airport_off_is_unparseable() {
        let sample = AirportExtractor.parse("AirPort: Off\n");

        assert!(sample.is_empty());
        assert!(sample.diagnostic.is_some());
    }
}
