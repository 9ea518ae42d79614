//! Per-host routing record

use egressip_core::Cidr;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;

/// Egress configuration of one cluster host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSubnet {
    /// Host name, identical to the cloud's private DNS name
    pub host: String,

    /// Node labels, matched against failure domain selectors
    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    /// Individually assigned egress addresses
    #[serde(default)]
    pub egress_ips: Vec<IpAddr>,

    /// Ranges the cluster may place on this host by itself
    #[serde(default)]
    pub egress_cidrs: Vec<Cidr>,
}

impl HostSubnet {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            labels: BTreeMap::new(),
            egress_ips: Vec::new(),
            egress_cidrs: Vec::new(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_ip(mut self, ip: IpAddr) -> Self {
        self.egress_ips.push(ip);
        self
    }

    pub fn has_ip(&self, ip: &IpAddr) -> bool {
        self.egress_ips.contains(ip)
    }

    /// Returns false when the address was not present.
    pub fn remove_ip(&mut self, ip: &IpAddr) -> bool {
        let before = self.egress_ips.len();
        self.egress_ips.retain(|existing| existing != ip);
        self.egress_ips.len() != before
    }
}
