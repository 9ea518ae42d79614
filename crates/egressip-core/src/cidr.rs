//! IPv4 CIDR ranges used by failure domains

use crate::error::EgressIpError;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

/// IPv4 network in `a.b.c.d/n` notation. Host bits are masked off on parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cidr {
    network: Ipv4Addr,
    prefix: u8,
}

impl Cidr {
    pub fn new(address: Ipv4Addr, prefix: u8) -> Result<Self, EgressIpError> {
        if prefix > 32 {
            return Err(EgressIpError::InvalidConfig(format!(
                "prefix length {} is out of range",
                prefix
            )));
        }
        let network = Ipv4Addr::from(u32::from(address) & mask(prefix));
        Ok(Self { network, prefix })
    }

    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    pub fn contains(&self, ip: &IpAddr) -> bool {
        match ip {
            IpAddr::V4(v4) => u32::from(*v4) & mask(self.prefix) == u32::from(self.network),
            IpAddr::V6(_) => false,
        }
    }

    /// Usable host addresses. Network and broadcast address are skipped
    /// unless the range is a /31 or /32.
    pub fn hosts(&self) -> impl Iterator<Item = Ipv4Addr> {
        let first = u64::from(u32::from(self.network));
        let size = 1u64 << (32 - u32::from(self.prefix));
        let last = first + size - 1;
        let (start, end) = if self.prefix >= 31 {
            (first, last)
        } else {
            (first + 1, last - 1)
        };
        (start..=end).map(|n| Ipv4Addr::from(n as u32))
    }
}

fn mask(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    }
}

impl std::fmt::Display for Cidr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

impl FromStr for Cidr {
    type Err = EgressIpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (address, prefix) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| EgressIpError::InvalidConfig(format!("'{}' is not a CIDR", s)))?;
        let address = address
            .parse::<Ipv4Addr>()
            .map_err(|e| EgressIpError::InvalidConfig(format!("'{}': {}", s, e)))?;
        let prefix = prefix
            .parse::<u8>()
            .map_err(|e| EgressIpError::InvalidConfig(format!("'{}': {}", s, e)))?;
        Self::new(address, prefix)
    }
}

impl TryFrom<String> for Cidr {
    type Error = EgressIpError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Cidr> for String {
    fn from(cidr: Cidr) -> Self {
        cidr.to_string()
    }
}
