//! Classification of addresses that IP geolocation cannot say anything about.

/// Returns true when `ip` is missing, loopback, or in a private IPv4 range.
///
/// This is a prefix check over the raw string, not a parser: malformed input
/// is treated as routable unless one of the prefixes matches.
pub fn is_private(ip: Option<&str>) -> bool {
    let Some(ip) = ip else {
        return true;
    };

    if ip == "127.0.0.1" || ip.starts_with("10.") || ip.starts_with("192.168.") {
        return true;
    }

    if let Some(rest) = ip.strip_prefix("172.") {
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        if let Ok(second) = digits.parse::<u32>() {
            return (16..=31).contains(&second);
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_ranges_are_detected() {
        for ip in [
            "127.0.0.1",
            "10.0.0.1",
            "10.255.3.4",
            "192.168.1.5",
            "172.16.0.1",
            "172.20.10.3",
            "172.31.255.255",
        ] {
            assert!(is_private(Some(ip)), "{ip} should be private");
        }
    }

    #[test]
    fn public_addresses_are_not_private() {
        for ip in ["8.8.8.8", "172.32.0.1", "172.15.9.9", "1.1.1.1", "127.0.0.2"] {
            assert!(!is_private(Some(ip)), "{ip} should not be private");
        }
    }

    #[test]
    fn missing_address_counts_as_private() {
        assert!(is_private(None));
    }

    #[test]
    fn malformed_second_octet_is_not_private() {
        assert!(!is_private(Some("172.abc.1.1")));
        assert!(!is_private(Some("172.")));
        assert!(!is_private(Some("garbage")));
    }
}
