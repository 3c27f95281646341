//! IP privacy classification.
//!
//! Decides whether an IP literal is internal (loopback, RFC1918,
//! carrier-grade NAT) or externally routable. Pure: no state beyond the
//! reserved range list fixed at construction.

use std::net::IpAddr;

use ipnet::IpNet;

/// Address blocks that never count as external traffic.
pub const RESERVED_RANGES: &[&str] = &[
    "127.0.0.0/8",
    "10.0.0.0/8",
    "172.16.0.0/12",
    "192.168.0.0/16",
    "100.64.0.0/10",
    "::1/128",
];

#[derive(Debug, Clone)]
pub struct PrivacyClassifier {
    reserved: Vec<IpNet>,
}

impl Default for PrivacyClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl PrivacyClassifier {
    pub fn new() -> Self {
        let reserved = RESERVED_RANGES
            .iter()
            .filter_map(|cidr| match cidr.parse::<IpNet>() {
                Ok(net) => Some(net),
                Err(e) => {
                    tracing::error!(cidr, error = %e, "Invalid reserved CIDR, skipping");
                    None
                }
            })
            .collect();
        Self { reserved }
    }

    /// Classifier over an explicit set of reserved blocks.
    pub fn with_ranges(reserved: Vec<IpNet>) -> Self {
        Self { reserved }
    }

    /// True when `ip` falls inside any reserved block.
    ///
    /// IPv4-mapped IPv6 addresses are classified by their IPv4 form.
    pub fn is_private(&self, ip: IpAddr) -> bool {
        let ip = match ip {
            IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(ip),
            v4 => v4,
        };
        self.reserved.iter().any(|net| net.contains(&ip))
    }

    /// True when at least one literal parses and is not private.
    ///
    /// Unparsable literals are ignored: they count neither way.
    pub fn has_external_ip<I, S>(&self, ips: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        ips.into_iter()
            .filter_map(|raw| raw.as_ref().trim().parse::<IpAddr>().ok())
            .any(|ip| !self.is_private(ip))
    }
}
