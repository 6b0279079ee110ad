//! Default-gateway lookup output parsing.

use super::Platform;

/// Extract the default gateway address from the platform's route listing.
///
/// Linux: `ip route show default`, macOS: `route -n get default`,
/// Windows: `ipconfig`.
pub fn parse_default_gateway(platform: Platform, raw: &str) -> Option<String> {
    match platform {
        Platform::Linux => parse_ip_route(raw),
        Platform::MacOs => parse_route_get(raw),
        Platform::Windows => parse_ipconfig(raw),
    }
}

fn parse_ip_route(raw: &str) -> Option<String> {
    raw.lines()
        .filter(|line| line.trim_start().starts_with("default"))
        .find_map(|line| {
            let mut tokens = line.split_whitespace();
            tokens.find(|token| *token == "via")?;
            tokens.next().map(str::to_string)
        })
}

fn parse_route_get(raw: &str) -> Option<String> {
    raw.lines().find_map(|line| {
        let (key, value) = line.trim().split_once(':')?;
        if key.trim() == "gateway" {
            super::non_empty(value)
        } else {
            None
        }
    })
}

fn parse_ipconfig(raw: &str) -> Option<String> {
    let mut in_gateway = false;
    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("Default Gateway") {
            in_gateway = true;
            if let Some((_, value)) = trimmed.split_once(" : ")
                && let Some(addr) = usable_ipconfig_address(value)
            {
                return Some(addr);
            }
            continue;
        }
        // continuation lines hold further gateways (often IPv4 after IPv6)
        if in_gateway {
            if trimmed.is_empty() || trimmed.contains(" : ") {
                in_gateway = false;
                continue;
            }
            if let Some(addr) = usable_ipconfig_address(trimmed) {
                return Some(addr);
            }
        }
    }
    None
}

fn usable_ipconfig_address(value: &str) -> Option<String> {
    let value = value.trim();
    // link-local IPv6 gateways carry a zone index and are useless as a ping target
    if value.is_empty() || value.starts_with("fe80") {
        return None;
    }
    Some(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linux_route_output() {
        let raw = "default via 192.168.1.1 dev wlan0 proto dhcp src 192.168.1.23 metric 600\n";
        assert_eq!(
            parse_default_gateway(Platform::Linux, raw).as_deref(),
            Some("192.168.1.1")
        );
    }

    #[test]
    fn macos_route_output() {
        let raw = "   route to: default
destination: default
       mask: default
    gateway: 10.0.0.1
  interface: en0
";
        assert_eq!(
            parse_default_gateway(Platform::MacOs, raw).as_deref(),
            Some("10.0.0.1")
        );
    }

    #[test]
    fn windows_ipconfig_prefers_usable_address() {
        let raw = "Wireless LAN adapter Wi-Fi:

   Connection-specific DNS Suffix  . : home
   IPv4 Address. . . . . . . . . . . : 192.168.0.42
   Subnet Mask . . . . . . . . . . . : 255.255.255.0
   Default Gateway . . . . . . . . . : fe80::1%12
                                       192.168.0.1
";
        assert_eq!(
            parse_default_gateway(Platform::Windows, raw).as_deref(),
            Some("192.168.0.1")
        );
    }

    #[test]
    fn windows_ipconfig_skips_empty_gateways() {
        let raw = "Ethernet adapter Ethernet:

   Default Gateway . . . . . . . . . :

Wireless LAN adapter Wi-Fi:

   Default Gateway . . . . . . . . . : 172.16.0.1
";
        assert_eq!(
            parse_default_gateway(Platform::Windows, raw).as_deref(),
            Some("172.16.0.1")
        );
    }

    #[test]
    fn missing_gateway_is_none() {
        assert_eq!(parse_default_gateway(Platform::Linux, ""), None);
        assert_eq!(parse_default_gateway(Platform::MacOs, "route: not in table"), None);
    }
}
