//! Allowed-network policy
//!
//! Source addresses outside the app record's `allowedNetworks` are refused
//! before the responder runs.

use dyndns_core::AppRecordData;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use tracing::warn;

/// A CIDR network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpNetwork {
    addr: IpAddr,
    prefix: u8,
}

impl IpNetwork {
    /// Create a network, masking host bits
    pub fn new(addr: IpAddr, prefix: u8) -> Result<Self, dyndns_core::Error> {
        let max = match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        if prefix > max {
            return Err(dyndns_core::Error::invalid_input(format!(
                "Prefix /{} too long for {}",
                prefix, addr
            )));
        }

        let addr = match addr {
            IpAddr::V4(ip) => IpAddr::V4((u32::from(ip) & mask_v4(prefix)).into()),
            IpAddr::V6(ip) => IpAddr::V6((u128::from(ip) & mask_v6(prefix)).into()),
        };
        Ok(Self { addr, prefix })
    }

    /// Whether an address falls inside this network
    ///
    /// IPv4-mapped IPv6 addresses are matched as IPv4.
    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.addr, ip.to_canonical()) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                u32::from(ip) & mask_v4(self.prefix) == u32::from(net)
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                u128::from(ip) & mask_v6(self.prefix) == u128::from(net)
            }
            _ => false,
        }
    }
}

fn mask_v4(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    }
}

fn mask_v6(prefix: u8) -> u128 {
    if prefix == 0 {
        0
    } else {
        u128::MAX << (128 - u32::from(prefix))
    }
}

impl FromStr for IpNetwork {
    type Err = dyndns_core::Error;

    /// Parse `addr/prefix`; a bare address is a host network
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (addr, prefix) = match s.split_once('/') {
            Some((addr, prefix)) => {
                let prefix = prefix.parse::<u8>().map_err(|_| {
                    dyndns_core::Error::invalid_input(format!("Invalid prefix in {}", s))
                })?;
                (addr, Some(prefix))
            }
            None => (s, None),
        };

        let addr = addr
            .parse::<IpAddr>()
            .map_err(|_| dyndns_core::Error::invalid_input(format!("Invalid network {}", s)))?;
        let prefix = prefix.unwrap_or(match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        });

        Self::new(addr, prefix)
    }
}

impl fmt::Display for IpNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix)
    }
}

/// Set of networks allowed to query
#[derive(Debug, Clone, Default)]
pub struct NetworkPolicy {
    networks: Vec<IpNetwork>,
}

impl NetworkPolicy {
    /// Build a policy from networks
    pub fn new(networks: Vec<IpNetwork>) -> Self {
        Self { networks }
    }

    /// Build a policy from app record data
    ///
    /// Unparseable entries are logged and skipped.
    pub fn from_app_record_data(data: &AppRecordData) -> Self {
        let networks = data
            .allowed_networks
            .iter()
            .filter_map(|entry| match entry.parse::<IpNetwork>() {
                Ok(network) => Some(network),
                Err(e) => {
                    warn!("Ignoring allowed network entry: {}", e);
                    None
                }
            })
            .collect();
        Self { networks }
    }

    /// Whether a source address may query
    pub fn allows(&self, ip: IpAddr) -> bool {
        self.networks.iter().any(|network| network.contains(ip))
    }

    pub fn networks(&self) -> &[IpNetwork] {
        &self.networks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_contains() {
        let net: IpNetwork = "10.1.2.3/8".parse().unwrap();
        assert_eq!(net.to_string(), "10.0.0.0/8");
        assert!(net.contains("10.200.0.1".parse().unwrap()));
        assert!(!net.contains("11.0.0.1".parse().unwrap()));
        assert!(net.contains("::ffff:10.0.0.9".parse().unwrap()));

        let v6: IpNetwork = "2001:db8::/32".parse().unwrap();
        assert!(v6.contains("2001:db8:1::1".parse().unwrap()));
        assert!(!v6.contains("10.0.0.1".parse().unwrap()));

        let host: IpNetwork = "192.0.2.1".parse().unwrap();
        assert!(host.contains("192.0.2.1".parse().unwrap()));
        assert!(!host.contains("192.0.2.2".parse().unwrap()));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("10.0.0.0/33".parse::<IpNetwork>().is_err());
        assert!("not-a-net".parse::<IpNetwork>().is_err());
        assert!("10.0.0.0/x".parse::<IpNetwork>().is_err());
    }

    #[test]
    fn test_default_data_allows_everything() {
        let policy = NetworkPolicy::from_app_record_data(&AppRecordData::default());
        assert!(policy.allows("203.0.113.9".parse().unwrap()));
        assert!(policy.allows("2001:db8::9".parse().unwrap()));
    }

    #[test]
    fn test_restricted_policy_skips_bad_entries() {
        let data = AppRecordData {
            allowed_networks: vec!["192.168.0.0/16".into(), "bogus".into()],
            require_auth: true,
        };
        let policy = NetworkPolicy::from_app_record_data(&data);
        assert_eq!(policy.networks().len(), 1);
        assert!(policy.allows("192.168.4.4".parse().unwrap()));
        assert!(!policy.allows("8.8.8.8".parse().unwrap()));
    }
}
