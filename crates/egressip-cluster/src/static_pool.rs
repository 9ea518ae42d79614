//! Statically pool-managed cluster backend
//!
//! Each egress IP is listed on the host subnet of the host that carries it.
//! The cluster then configures the address on the host's main interface.
//! New addresses are drawn from the CIDR of the failure domain, which has to
//! be reserved for this operator by the cluster admin.

use crate::store::HostSubnetStore;
use crate::subnet::HostSubnet;
use async_trait::async_trait;
use egressip_core::{
    Assignment, ClusterBackend, Context, EgressIpError, FailureDomain, Result,
};
use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct StaticClusterBackend {
    store: Arc<dyn HostSubnetStore>,
    domains: Vec<FailureDomain>,
    // host subnet updates are read-modify-write
    write_lock: Mutex<()>,
}

impl StaticClusterBackend {
    pub fn new(store: Arc<dyn HostSubnetStore>, domains: Vec<FailureDomain>) -> Self {
        Self {
            store,
            domains,
            write_lock: Mutex::new(()),
        }
    }

    fn domain(&self, name: &str) -> Result<&FailureDomain> {
        self.domains
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| EgressIpError::NotFound(format!("failure domain '{}'", name)))
    }

    async fn subnet(&self, host: &str) -> Result<HostSubnet> {
        self.store
            .get(host)
            .await?
            .ok_or_else(|| EgressIpError::NotFound(format!("host subnet for '{}'", host)))
    }
}

#[async_trait]
impl ClusterBackend for StaticClusterBackend {
    fn name(&self) -> &str {
        "ocp-static"
    }

    async fn find_host_for_new_ip(&self, ctx: &Context, failure_domain: &str) -> Result<Assignment> {
        let domain = self.domain(failure_domain)?;
        let cidr = domain.cidr.ok_or_else(|| {
            EgressIpError::NotFound(format!("failure domain '{}' has no cidr", domain.name))
        })?;

        let subnets = self.store.list().await?;
        let used: HashSet<IpAddr> = subnets
            .iter()
            .flat_map(|s| s.egress_ips.iter().copied())
            .collect();

        // least loaded eligible host, ties broken by name
        let host = subnets
            .iter()
            .filter(|s| domain.node_selector.matches(&s.labels))
            .min_by(|a, b| {
                a.egress_ips
                    .len()
                    .cmp(&b.egress_ips.len())
                    .then_with(|| a.host.cmp(&b.host))
            })
            .ok_or_else(|| {
                EgressIpError::NotFound(format!(
                    "no eligible host in failure domain '{}'",
                    domain.name
                ))
            })?;

        let ip = cidr
            .hosts()
            .map(IpAddr::V4)
            .find(|ip| !used.contains(ip))
            .ok_or_else(|| {
                EgressIpError::CapacityExceeded(format!(
                    "all addresses of {} in failure domain '{}' are in use",
                    cidr, domain.name
                ))
            })?;

        tracing::debug!(
            request_id = ctx.request_id(),
            failure_domain,
            host = %host.host,
            %ip,
            "Selected host for new egress ip"
        );

        Ok(Assignment {
            host: host.host.clone(),
            ip,
        })
    }

    async fn add_specified_ip(&self, ctx: &Context, ip: IpAddr, host: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let subnets = self.store.list().await?;
        let mut subnet = subnets
            .iter()
            .find(|s| s.host == host)
            .cloned()
            .ok_or_else(|| EgressIpError::NotFound(format!("host subnet for '{}'", host)))?;

        if subnet.has_ip(&ip) {
            return Err(EgressIpError::Conflict(format!(
                "host '{}' already has egress ip '{}'",
                host, ip
            )));
        }
        if let Some(other) = subnets.iter().find(|s| s.host != host && s.has_ip(&ip)) {
            return Err(EgressIpError::Conflict(format!(
                "egress ip '{}' is already routed by host '{}'",
                ip, other.host
            )));
        }

        subnet.egress_ips.push(ip);
        self.store.put(subnet).await?;

        tracing::info!(request_id = ctx.request_id(), %ip, host, "Added egress ip to host subnet");
        Ok(())
    }

    async fn check_ip(&self, _ctx: &Context, ip: IpAddr, host: &str) -> Result<()> {
        let subnet = self.subnet(host).await?;
        if subnet.has_ip(&ip) {
            Ok(())
        } else {
            Err(EgressIpError::NotAssigned(format!(
                "egress ip '{}' is not assigned to host '{}'",
                ip, host
            )))
        }
    }

    async fn move_ip(&self, ctx: &Context, ip: IpAddr, old_host: &str, new_host: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut old = self.subnet(old_host).await?;
        if !old.has_ip(&ip) {
            return Err(EgressIpError::NotAssigned(format!(
                "egress ip '{}' is not assigned to host '{}'",
                ip, old_host
            )));
        }
        let mut new = self.subnet(new_host).await?;

        old.remove_ip(&ip);
        if !new.has_ip(&ip) {
            new.egress_ips.push(ip);
        }
        self.store.put_all(vec![old, new]).await?;

        tracing::info!(
            request_id = ctx.request_id(),
            %ip,
            old_host,
            new_host,
            "Moved egress ip between host subnets"
        );
        Ok(())
    }

    async fn remove_ip(&self, ctx: &Context, ip: IpAddr, host: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let Some(mut subnet) = self.store.get(host).await? else {
            tracing::info!(request_id = ctx.request_id(), %ip, host, "Host subnet not found, nothing to remove");
            return Ok(());
        };

        if !subnet.remove_ip(&ip) {
            tracing::info!(request_id = ctx.request_id(), %ip, host, "Egress ip not on host subnet");
            return Ok(());
        }

        self.store.put(subnet).await?;
        tracing::info!(request_id = ctx.request_id(), %ip, host, "Removed egress ip from host subnet");
        Ok(())
    }

    async fn assign_cidr(&self, _ctx: &Context, _host: &str) -> Result<()> {
        Ok(())
    }
}
