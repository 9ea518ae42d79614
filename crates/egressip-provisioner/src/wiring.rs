//! Composition of a [`Coordinator`] from the provisioner configuration

use crate::bare_metal::BareMetalCloudBackend;
use crate::coordinator::Coordinator;
use egressip_cloud_aws::AwsCloudBackend;
use egressip_cluster::{
    DynamicCidrClusterBackend, FileHostSubnetStore, HostSubnetStore, StaticClusterBackend,
};
use egressip_config::{CloudConfig, EgressIpConfig, ProvisionerConfig};
use egressip_core::{CloudBackend, ClusterBackend, EgressIpError, FailureDomain, Result};
use std::sync::Arc;

/// Validate `config` and build the coordinator it describes, with host
/// subnets kept in the configured state file.
pub async fn build_coordinator(config: &EgressIpConfig) -> Result<Coordinator> {
    config
        .validate()
        .map_err(|e| EgressIpError::InvalidConfig(e.to_string()))?;
    let provisioner = config
        .provisioner()
        .map_err(|e| EgressIpError::InvalidConfig(e.to_string()))?;

    let store = Arc::new(FileHostSubnetStore::new(&config.state_file));
    Ok(assemble(provisioner, store, config.failure_domains.clone()).await)
}

/// | provisioner   | cloud       | cluster      |
/// |---------------|-------------|--------------|
/// | `cloud`       | AWS         | static pool  |
/// | `ocp-static`  | bare metal  | static pool  |
/// | `ocp-dynamic` | bare metal  | CIDR per host|
pub async fn assemble(
    provisioner: &ProvisionerConfig,
    store: Arc<dyn HostSubnetStore>,
    domains: Vec<FailureDomain>,
) -> Coordinator {
    let coordinator = Coordinator::new(
        cloud_backend(provisioner).await,
        cluster_backend(provisioner, store, domains),
    );
    tracing::info!(
        provisioner = provisioner.name(),
        cloud = coordinator.cloud_name(),
        cluster = coordinator.cluster_name(),
        "Provisioner ready"
    );
    coordinator
}

pub async fn cloud_backend(provisioner: &ProvisionerConfig) -> Arc<dyn CloudBackend> {
    match provisioner {
        ProvisionerConfig::Cloud {
            cloud:
                CloudConfig::Aws {
                    failure_region,
                    max_ips_per_instance,
                },
        } => Arc::new(AwsCloudBackend::connect(failure_region.clone(), *max_ips_per_instance).await),
        ProvisionerConfig::OcpStatic | ProvisionerConfig::OcpDynamic => {
            Arc::new(BareMetalCloudBackend::new())
        }
    }
}

pub fn cluster_backend(
    provisioner: &ProvisionerConfig,
    store: Arc<dyn HostSubnetStore>,
    domains: Vec<FailureDomain>,
) -> Arc<dyn ClusterBackend> {
    match provisioner {
        ProvisionerConfig::Cloud { .. } | ProvisionerConfig::OcpStatic => {
            Arc::new(StaticClusterBackend::new(store, domains))
        }
        ProvisionerConfig::OcpDynamic => Arc::new(DynamicCidrClusterBackend::new(store, domains)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egressip_cluster::{HostSubnet, MemoryHostSubnetStore};
    use egressip_core::{Context, ErrorKind, NodeSelector};

    const ZONE: &str = "topology.kubernetes.io/zone";

    fn domains() -> Vec<FailureDomain> {
        vec![
            FailureDomain::new("zone-a")
                .with_cidr("10.1.1.0/29".parse().unwrap())
                .with_selector(NodeSelector::new().with_label(ZONE, "a")),
        ]
    }

    fn store() -> Arc<MemoryHostSubnetStore> {
        Arc::new(MemoryHostSubnetStore::with_subnets([
            HostSubnet::new("host-1").with_label(ZONE, "a"),
            HostSubnet::new("host-2").with_label(ZONE, "a"),
        ]))
    }

    #[test]
    fn test_cluster_backend_selection() {
        let aws = ProvisionerConfig::Cloud {
            cloud: CloudConfig::Aws {
                failure_region: "eu-central-1".to_string(),
                max_ips_per_instance: 8,
            },
        };

        assert_eq!(cluster_backend(&aws, store(), domains()).name(), "ocp-static");
        assert_eq!(
            cluster_backend(&ProvisionerConfig::OcpStatic, store(), domains()).name(),
            "ocp-static"
        );
        assert_eq!(
            cluster_backend(&ProvisionerConfig::OcpDynamic, store(), domains()).name(),
            "ocp-dynamic"
        );
    }

    #[tokio::test]
    async fn test_ocp_static_end_to_end() {
        let store = store();
        let coordinator = assemble(&ProvisionerConfig::OcpStatic, store.clone(), domains()).await;
        assert_eq!(coordinator.cloud_name(), "bare-metal");

        let ctx = Context::new();
        let assignment = coordinator.find_host_for_new_ip(&ctx, "zone-a").await.unwrap();
        coordinator
            .add_specified_ip(&ctx, assignment.ip, &assignment.host)
            .await
            .unwrap();
        coordinator
            .check_ip(&ctx, assignment.ip, &assignment.host)
            .await
            .unwrap();

        let subnet = store.get(&assignment.host).await.unwrap().unwrap();
        assert!(subnet.has_ip(&assignment.ip));

        coordinator
            .remove_ip(&ctx, assignment.ip, &assignment.host)
            .await
            .unwrap();
        let subnet = store.get(&assignment.host).await.unwrap().unwrap();
        assert!(subnet.egress_ips.is_empty());
    }

    #[tokio::test]
    async fn test_ocp_dynamic_end_to_end() {
        let store = store();
        let coordinator = assemble(&ProvisionerConfig::OcpDynamic, store.clone(), domains()).await;
        let ctx = Context::new();

        coordinator.assign_cidr(&ctx, "host-1").await.unwrap();
        let subnet = store.get("host-1").await.unwrap().unwrap();
        assert_eq!(subnet.egress_cidrs.len(), 1);

        let err = coordinator
            .add_random_ip(&ctx, "host-1", "zone-a")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotImplemented);
    }

    #[tokio::test]
    async fn test_build_rejects_missing_provisioner() {
        let err = build_coordinator(&EgressIpConfig::default()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }
}
