//! SSRF guard: a URL is only fetched when every address its host resolves to
//! is publicly routable.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use docconv_logging::docconv_warn;
use url::{Host, Url};

use crate::{FailureKind, PipelineError};

pub const SSRF_MESSAGE: &str = "SSRF attack suspected: URL resolves to a non-public IP";

#[async_trait::async_trait]
pub trait HostResolver: Send + Sync {
    async fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>>;
}

/// Resolves through the operating system. IP literals resolve to themselves.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

#[async_trait::async_trait]
impl HostResolver for SystemResolver {
    async fn resolve(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(vec![ip]);
        }
        let addrs = tokio::net::lookup_host((host, 0)).await?;
        Ok(addrs.map(|addr| addr.ip()).collect())
    }
}

pub async fn validate_public_url(
    url: &str,
    resolver: &dyn HostResolver,
) -> Result<Url, PipelineError> {
    let parsed = Url::parse(url).map_err(|err| validation_error(err.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(validation_error(format!("unsupported scheme '{other}'"))),
    }
    let host = match parsed.host() {
        Some(Host::Domain(domain)) => domain.to_string(),
        Some(Host::Ipv4(ip)) => ip.to_string(),
        Some(Host::Ipv6(ip)) => ip.to_string(),
        None => return Err(validation_error("missing host")),
    };

    let addrs = resolver
        .resolve(&host)
        .await
        .map_err(|err| validation_error(format!("lookup {host}: {err}")))?;
    if addrs.is_empty() {
        return Err(validation_error(format!("lookup {host}: no addresses")));
    }

    // A single non-public address vetoes the whole URL.
    if let Some(blocked) = addrs.iter().find(|ip| !is_public_ip(ip)) {
        docconv_warn!("Blocked {url}: host {host} resolves to {blocked}");
        return Err(PipelineError::new(FailureKind::SsrfBlocked, SSRF_MESSAGE));
    }
    Ok(parsed)
}

fn validation_error(detail: impl std::fmt::Display) -> PipelineError {
    PipelineError::new(
        FailureKind::Validation,
        format!("URL validation failed: {detail}"),
    )
}

pub fn is_public_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_public_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_public_v4(&v4),
            None => is_public_v6(v6),
        },
    }
}

fn is_public_v4(ip: &Ipv4Addr) -> bool {
    let [a, b, c, _] = ip.octets();
    let link_local_multicast = a == 224 && b == 0 && c == 0;
    !(ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || link_local_multicast)
}

fn is_public_v6(ip: &Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    let unique_local = first & 0xfe00 == 0xfc00;
    let link_local_unicast = first & 0xffc0 == 0xfe80;
    let link_local_multicast = first & 0xff0f == 0xff02;
    !(ip.is_loopback()
        || ip.is_unspecified()
        || unique_local
        || link_local_unicast
        || link_local_multicast)
}

#[cfg(test)]
mod tests {
    use super::is_public_ip;
    use std::net::IpAddr;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn private_ranges_are_not_public() {
        for addr in [
            "127.0.0.1",
            "10.1.2.3",
            "172.16.0.1",
            "172.31.255.255",
            "192.168.1.1",
            "169.254.169.254",
            "224.0.0.251",
            "0.0.0.0",
            "::1",
            "::",
            "fc00::1",
            "fd12:3456::1",
            "fe80::1",
            "ff02::1",
            "::ffff:10.0.0.1",
        ] {
            assert!(!is_public_ip(&ip(addr)), "{addr} should be blocked");
        }
    }

    #[test]
    fn routable_addresses_are_public() {
        for addr in ["93.184.216.34", "8.8.8.8", "172.32.0.1", "2606:4700::1111", "::ffff:1.1.1.1"] {
            assert!(is_public_ip(&ip(addr)), "{addr} should be allowed");
        }
    }
}
