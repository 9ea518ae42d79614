//! Data model shared between the control loop, the coordinator and the backends

use crate::cidr::Cidr;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;

/// Lifecycle phase of a single egress IP assignment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Pending,
    Initializing,
    Provisioned,
    Failed,
    Deprovisioned,
}

impl Phase {
    /// Provisioned, failed and deprovisioned end an attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Phase::Provisioned | Phase::Failed | Phase::Deprovisioned
        )
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Pending => write!(f, "pending"),
            Phase::Initializing => write!(f, "initializing"),
            Phase::Provisioned => write!(f, "provisioned"),
            Phase::Failed => write!(f, "failed"),
            Phase::Deprovisioned => write!(f, "deprovisioned"),
        }
    }
}

/// Status written back onto the egress IP resource by the control loop
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EgressIpStatus {
    pub phase: Phase,

    pub failure_domain: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<IpAddr>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_name: Option<String>,

    /// Human readable message for this state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl EgressIpStatus {
    pub fn new(phase: Phase, failure_domain: impl Into<String>) -> Self {
        Self {
            phase,
            failure_domain: failure_domain.into(),
            ..Default::default()
        }
    }

    pub fn with_ip(mut self, ip: IpAddr) -> Self {
        self.ip = Some(ip);
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host_name = Some(host.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Host and address picked for a new egress IP
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub host: String,
    pub ip: IpAddr,
}

/// Label predicate selecting the hosts of a failure domain
///
/// Every entry of `match_labels` has to be present with the same value. An
/// empty selector matches every host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSelector {
    #[serde(default)]
    pub match_labels: BTreeMap<String, String>,
}

impl NodeSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.match_labels.insert(key.into(), value.into());
        self
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.match_labels
            .iter()
            .all(|(key, value)| labels.get(key) == Some(value))
    }
}

/// Named pool of eligible hosts and addresses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDomain {
    pub name: String,

    /// Only needed by the pool managed cluster backends
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr: Option<Cidr>,

    #[serde(default)]
    pub node_selector: NodeSelector,
}

impl FailureDomain {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cidr: None,
            node_selector: NodeSelector::default(),
        }
    }

    pub fn with_cidr(mut self, cidr: Cidr) -> Self {
        self.cidr = Some(cidr);
        self
    }

    pub fn with_selector(mut self, node_selector: NodeSelector) -> Self {
        self.node_selector = node_selector;
        self
    }
}
