//! `X-Forwarded-For` chain parsing (§4.8): the IP used for geolocation is
//! the left-most entry that is not a known proxy, else the direct remote
//! address.

use std::net::IpAddr;

/// Picks the client IP out of a forwarded-for header, skipping any entry
/// that matches a known proxy address, falling back to `remote_addr`.
#[must_use]
pub fn resolve_client_ip(forwarded_for: Option<&str>, known_proxies: &[IpAddr], remote_addr: IpAddr) -> IpAddr {
    let Some(header) = forwarded_for else { return remote_addr };

    for candidate in header.split(',') {
        let trimmed = candidate.trim();
        let Ok(ip) = trimmed.parse::<IpAddr>() else { continue };
        if !known_proxies.contains(&ip) {
            return ip;
        }
    }
    remote_addr
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_header_falls_back_to_remote_addr() {
        let remote: IpAddr = "203.0.113.9".parse().unwrap();
        assert_eq!(resolve_client_ip(None, &[], remote), remote);
    }

    #[test]
    fn leftmost_non_proxy_entry_wins() {
        let proxy: IpAddr = "10.0.0.1".parse().unwrap();
        let remote: IpAddr = "10.0.0.1".parse().unwrap();
        let header = "203.0.113.5, 10.0.0.1";
        assert_eq!(resolve_client_ip(Some(header), &[proxy], remote), "203.0.113.5".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn all_entries_are_known_proxies_falls_back_to_remote_addr() {
        let proxy: IpAddr = "10.0.0.1".parse().unwrap();
        let remote: IpAddr = "198.51.100.1".parse().unwrap();
        let header = "10.0.0.1";
        assert_eq!(resolve_client_ip(Some(header), &[proxy], remote), remote);
    }
}
