//! SSRF guard: refuses hosts whose literal IP address falls in a private,
//! loopback, or link-local range (spec §8 property 8).

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// `true` if `ip` falls within one of the disallowed ranges: `127/8`,
/// `10/8`, `172.16/12`, `192.168/16`, `169.254/16`, `0.0.0.0/8`, or the
/// IPv6 loopback/unique-local/link-local equivalents.
#[must_use]
pub fn is_disallowed(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_disallowed_v4(v4),
        IpAddr::V6(v6) => is_disallowed_v6(v6),
    }
}

fn is_disallowed_v4(ip: Ipv4Addr) -> bool {
    let octets = ip.octets();
    ip.is_loopback()
        || ip.is_link_local()
        || ip.is_unspecified()
        || octets[0] == 0
        || octets[0] == 10
        || (octets[0] == 172 && (16..=31).contains(&octets[1]))
        || (octets[0] == 192 && octets[1] == 168)
}

fn is_disallowed_v6(ip: Ipv6Addr) -> bool {
    ip.is_loopback() || ip.is_unspecified() || (ip.segments()[0] & 0xfe00) == 0xfc00
}

/// Parse `host` as a literal IP address and check it against
/// [`is_disallowed`]. Returns `false` (allowed) for non-literal hostnames
/// — DNS-resolved SSRF protection is the DNS signal source's job at
/// extraction time, not the constructor's.
#[must_use]
pub fn literal_host_is_disallowed(host: &str) -> bool {
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    match bare.parse::<IpAddr>() {
        Ok(ip) => is_disallowed(ip),
        Err(_) => false,
    }
}
