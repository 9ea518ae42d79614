//! CIDR-per-host cluster backend
//!
//! Every host matching a failure domain gets the whole domain range on its
//! host subnet. The cluster then decides at runtime which host answers for
//! which address, so the per-address operations have nothing to record.

use crate::store::HostSubnetStore;
use async_trait::async_trait;
use egressip_core::{
    Assignment, ClusterBackend, Context, EgressIpError, FailureDomain, Result,
};
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct DynamicCidrClusterBackend {
    store: Arc<dyn HostSubnetStore>,
    domains: Vec<FailureDomain>,
    write_lock: Mutex<()>,
}

impl DynamicCidrClusterBackend {
    pub fn new(store: Arc<dyn HostSubnetStore>, domains: Vec<FailureDomain>) -> Self {
        Self {
            store,
            domains,
            write_lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl ClusterBackend for DynamicCidrClusterBackend {
    fn name(&self) -> &str {
        "ocp-dynamic"
    }

    async fn find_host_for_new_ip(&self, _ctx: &Context, failure_domain: &str) -> Result<Assignment> {
        Err(EgressIpError::NotImplemented(format!(
            "ocp-dynamic does not pick hosts for failure domain '{}'",
            failure_domain
        )))
    }

    async fn add_specified_ip(&self, _ctx: &Context, _ip: IpAddr, _host: &str) -> Result<()> {
        Ok(())
    }

    async fn check_ip(&self, _ctx: &Context, _ip: IpAddr, _host: &str) -> Result<()> {
        Ok(())
    }

    async fn move_ip(&self, _ctx: &Context, _ip: IpAddr, _old_host: &str, _new_host: &str) -> Result<()> {
        Ok(())
    }

    async fn remove_ip(&self, _ctx: &Context, _ip: IpAddr, _host: &str) -> Result<()> {
        Ok(())
    }

    async fn assign_cidr(&self, ctx: &Context, host: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut subnet = self
            .store
            .get(host)
            .await?
            .ok_or_else(|| EgressIpError::NotFound(format!("host subnet for '{}'", host)))?;

        let cidrs: Vec<_> = self
            .domains
            .iter()
            .filter(|d| d.node_selector.matches(&subnet.labels))
            .filter_map(|d| d.cidr)
            .collect();

        if cidrs.is_empty() {
            return Err(EgressIpError::NotFound(format!(
                "no failure domain with a cidr matches host '{}'",
                host
            )));
        }

        let mut changed = false;
        for cidr in cidrs {
            if !subnet.egress_cidrs.contains(&cidr) {
                subnet.egress_cidrs.push(cidr);
                changed = true;
            }
        }

        if changed {
            self.store.put(subnet).await?;
            tracing::info!(request_id = ctx.request_id(), host, "Assigned egress cidrs to host subnet");
        } else {
            tracing::debug!(request_id = ctx.request_id(), host, "Egress cidrs already assigned");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryHostSubnetStore;
    use crate::subnet::HostSubnet;
    use egressip_core::{ErrorKind, NodeSelector};

    const ZONE: &str = "topology.kubernetes.io/zone";

    fn backend(subnets: Vec<HostSubnet>) -> (DynamicCidrClusterBackend, Arc<MemoryHostSubnetStore>) {
        let store = Arc::new(MemoryHostSubnetStore::with_subnets(subnets));
        let domains = vec![
            FailureDomain::new("zone-a")
                .with_cidr("10.1.1.0/24".parse().unwrap())
                .with_selector(NodeSelector::new().with_label(ZONE, "a")),
            FailureDomain::new("zone-b")
                .with_cidr("10.1.2.0/24".parse().unwrap())
                .with_selector(NodeSelector::new().with_label(ZONE, "b")),
        ];
        (DynamicCidrClusterBackend::new(store.clone(), domains), store)
    }

    #[tokio::test]
    async fn test_assign_cidr_is_idempotent() {
        let (backend, store) = backend(vec![HostSubnet::new("host-1").with_label(ZONE, "a")]);
        let ctx = Context::new();

        backend.assign_cidr(&ctx, "host-1").await.unwrap();
        backend.assign_cidr(&ctx, "host-1").await.unwrap();

        let subnet = store.get("host-1").await.unwrap().unwrap();
        let expected: egressip_core::Cidr = "10.1.1.0/24".parse().unwrap();
        assert_eq!(subnet.egress_cidrs, vec![expected]);
    }

    #[tokio::test]
    async fn test_assign_cidr_errors() {
        let (backend, _) = backend(vec![HostSubnet::new("host-1").with_label(ZONE, "c")]);
        let ctx = Context::new();

        let unknown = backend.assign_cidr(&ctx, "host-9").await.unwrap_err();
        assert_eq!(unknown.kind(), ErrorKind::NotFound);

        let unmatched = backend.assign_cidr(&ctx, "host-1").await.unwrap_err();
        assert_eq!(unmatched.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_find_host_not_implemented() {
        let (backend, _) = backend(vec![]);
        let err = backend
            .find_host_for_new_ip(&Context::new(), "zone-a")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotImplemented);
    }

    #[tokio::test]
    async fn test_address_operations_are_noops() {
        let (backend, store) = backend(vec![HostSubnet::new("host-1")]);
        let ctx = Context::new();
        let ip: IpAddr = "10.1.1.5".parse().unwrap();

        backend.add_specified_ip(&ctx, ip, "host-1").await.unwrap();
        backend.check_ip(&ctx, ip, "host-1").await.unwrap();
        backend.move_ip(&ctx, ip, "host-1", "host-2").await.unwrap();
        backend.remove_ip(&ctx, ip, "host-1").await.unwrap();

        assert_eq!(store.get("host-1").await.unwrap().unwrap(), HostSubnet::new("host-1"));
    }
}
