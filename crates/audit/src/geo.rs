//! Two-tier IP geolocation (§4.8): private ranges resolve to a sentinel
//! without any lookup; a local offline database is consulted first, with a
//! remote HTTP service as fallback, both behind an LRU cache.

use std::net::IpAddr;
use std::sync::Mutex;

use async_trait::async_trait;
use core::audit_event::GeoLocation;
use lru::LruCache;
use serde::Deserialize;
use std::num::NonZeroUsize;

/// A source of country/city data for a public IP, swappable so the local
/// database and the remote fallback share one call site (§4.8).
#[async_trait]
pub trait GeoSource: Send + Sync {
    async fn lookup(&self, ip: IpAddr) -> Option<GeoLocation>;
}

/// Offline database tier. A real deployment points `local_db_path` at a
/// MaxMind-style extract; absent a configured database this tier simply
/// never resolves, falling through to the remote tier.
pub struct LocalGeoSource {
    entries: Vec<(ipnet_range::CidrRange, String)>
}

mod ipnet_range {
    use std::net::IpAddr;

    /// A minimal CIDR range sufficient for a small embedded offline table;
    /// real MaxMind-scale databases are loaded from `local_db_path` into
    /// the same shape at startup.
    pub struct CidrRange {
        pub network: IpAddr,
        pub prefix_len: u8
    }

    impl CidrRange {
        pub fn contains(&self, ip: IpAddr) -> bool {
            match (self.network, ip) {
                (IpAddr::V4(net), IpAddr::V4(candidate)) => {
                    let mask = if self.prefix_len == 0 { 0 } else { u32::MAX << (32 - self.prefix_len) };
                    (u32::from(net) & mask) == (u32::from(candidate) & mask)
                }
                (IpAddr::V6(net), IpAddr::V6(candidate)) => {
                    let mask = if self.prefix_len == 0 { 0 } else { u128::MAX << (128 - self.prefix_len) };
                    (u128::from(net) & mask) == (u128::from(candidate) & mask)
                }
                _ => false
            }
        }
    }
}

impl LocalGeoSource {
    /// An empty local database; every lookup misses and falls through to
    /// the remote tier. `local_db_path` wiring to a real extract is left to
    /// the deployment that configures one.
    #[must_use]
    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }
}

#[async_trait]
impl GeoSource for LocalGeoSource {
    async fn lookup(&self, ip: IpAddr) -> Option<GeoLocation> {
        self.entries.iter().find(|(range, _)| range.contains(ip)).map(|(_, country)| GeoLocation::Resolved {
            country: country.clone(),
            city: None
        })
    }
}

#[derive(Deserialize)]
struct RemoteGeoResponse {
    success: Option<bool>,
    country_code: Option<String>,
    city: Option<String>
}

/// Remote HTTP fallback tier, queried only on a local-database miss.
pub struct RemoteGeoSource {
    client: reqwest::Client,
    url_template: String
}

impl RemoteGeoSource {
    #[must_use]
    pub fn new(url_template: String, timeout: std::time::Duration) -> Self {
        let client = reqwest::Client::builder().timeout(timeout).build().unwrap_or_else(|_| reqwest::Client::new());
        Self { client, url_template }
    }
}

#[async_trait]
impl GeoSource for RemoteGeoSource {
    async fn lookup(&self, ip: IpAddr) -> Option<GeoLocation> {
        let url = self.url_template.replace("{ip}", &ip.to_string());
        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "remote geo lookup failed");
                return None;
            }
        };
        let parsed = match response.json::<RemoteGeoResponse>().await {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "remote geo response could not be parsed");
                return None;
            }
        };
        if parsed.success == Some(false) {
            return None;
        }
        parsed.country_code.map(|country| GeoLocation::Resolved { country, city: parsed.city })
    }
}

/// Checks RFC 1918, loopback, and link-local ranges without consulting any
/// geo source (§4.8).
#[must_use]
pub fn classify_private(ip: IpAddr) -> Option<GeoLocation> {
    let is_private = match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_link_local(),
        IpAddr::V6(v6) => v6.is_loopback() || (v6.segments()[0] & 0xffc0) == 0xfe80
    };
    is_private.then_some(GeoLocation::Private)
}

/// An LRU-cached, two-tier resolver: private sentinel, then local database,
/// then remote fallback, in that order.
pub struct GeoResolver {
    local: Box<dyn GeoSource>,
    remote: Box<dyn GeoSource>,
    cache: Mutex<LruCache<IpAddr, GeoLocation>>
}

impl GeoResolver {
    #[must_use]
    pub fn new(local: Box<dyn GeoSource>, remote: Box<dyn GeoSource>, cache_capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(cache_capacity.max(1)).expect("max(1) is never zero");
        Self { local, remote, cache: Mutex::new(LruCache::new(capacity)) }
    }

    pub async fn resolve(&self, ip: IpAddr) -> GeoLocation {
        if let Some(private) = classify_private(ip) {
            return private;
        }
        if let Some(cached) = self.cache.lock().unwrap().get(&ip).cloned() {
            return cached;
        }
        let resolved = match self.local.lookup(ip).await {
            Some(location) => location,
            None => self.remote.lookup(ip).await.unwrap_or(GeoLocation::Unknown)
        };
        self.cache.lock().unwrap().put(ip, resolved.clone());
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc1918_ranges_are_private() {
        assert_eq!(classify_private("10.0.0.5".parse().unwrap()), Some(GeoLocation::Private));
        assert_eq!(classify_private("192.168.1.1".parse().unwrap()), Some(GeoLocation::Private));
        assert_eq!(classify_private("172.16.0.1".parse().unwrap()), Some(GeoLocation::Private));
    }

    #[test]
    fn loopback_is_private() {
        assert_eq!(classify_private("127.0.0.1".parse().unwrap()), Some(GeoLocation::Private));
    }

    #[test]
    fn public_address_is_not_private() {
        assert_eq!(classify_private("8.8.8.8".parse().unwrap()), None);
    }

    #[tokio::test]
    async fn private_ip_never_reaches_a_geo_source() {
        let resolver = GeoResolver::new(Box::new(LocalGeoSource::empty()), Box::new(LocalGeoSource::empty()), 10);
        let result = resolver.resolve("10.1.2.3".parse().unwrap()).await;
        assert_eq!(result, GeoLocation::Private);
    }
}
