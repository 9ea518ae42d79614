//! EC2 call seam

use async_trait::async_trait;
use aws_sdk_ec2::Client;
use aws_sdk_ec2::config::Region;
use aws_sdk_ec2::error::DisplayErrorContext;
use aws_sdk_ec2::types::Filter;
use egressip_core::{EgressIpError, Result};

/// The parts of an EC2 instance the backend looks at
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ec2Instance {
    pub instance_id: String,
    pub interfaces: Vec<Ec2Interface>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ec2Interface {
    pub interface_id: String,
    /// Primary and secondary private addresses
    pub private_ips: Vec<String>,
}

/// What to assign to a network interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignRequest {
    /// Let EC2 pick this many unused secondary addresses.
    Count(i32),
    Addresses {
        addresses: Vec<String>,
        allow_reassignment: bool,
    },
}

#[async_trait]
pub trait Ec2Api: Send + Sync {
    /// First instance whose private DNS name equals `host`.
    async fn describe_instance(&self, host: &str) -> Result<Option<Ec2Instance>>;

    /// Returns the addresses EC2 reports as assigned.
    async fn assign_private_ips(&self, interface_id: &str, request: AssignRequest)
    -> Result<Vec<String>>;

    async fn unassign_private_ips(&self, interface_id: &str, addresses: Vec<String>) -> Result<()>;
}

/// [`Ec2Api`] backed by the AWS SDK
pub struct SdkEc2Api {
    client: Client,
}

impl SdkEc2Api {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Load credentials from the environment and target `region`.
    pub async fn connect(region: impl Into<String>) -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(region.into()))
            .load()
            .await;
        Self::new(Client::new(&config))
    }
}

#[async_trait]
impl Ec2Api for SdkEc2Api {
    async fn describe_instance(&self, host: &str) -> Result<Option<Ec2Instance>> {
        let output = self
            .client
            .describe_instances()
            .filters(
                Filter::builder()
                    .name("private-dns-name")
                    .values(host)
                    .build(),
            )
            .send()
            .await
            .map_err(|e| EgressIpError::backend(DisplayErrorContext(e)))?;

        let instance = output
            .reservations()
            .iter()
            .flat_map(|r| r.instances())
            .next()
            .map(|instance| Ec2Instance {
                instance_id: instance.instance_id().unwrap_or_default().to_string(),
                interfaces: instance
                    .network_interfaces()
                    .iter()
                    .map(|eni| Ec2Interface {
                        interface_id: eni.network_interface_id().unwrap_or_default().to_string(),
                        private_ips: eni
                            .private_ip_addresses()
                            .iter()
                            .filter_map(|a| a.private_ip_address())
                            .map(str::to_string)
                            .collect(),
                    })
                    .collect(),
            });

        Ok(instance)
    }

    async fn assign_private_ips(
        &self,
        interface_id: &str,
        request: AssignRequest,
    ) -> Result<Vec<String>> {
        let mut call = self
            .client
            .assign_private_ip_addresses()
            .network_interface_id(interface_id);

        call = match request {
            AssignRequest::Count(count) => call.secondary_private_ip_address_count(count),
            AssignRequest::Addresses {
                addresses,
                allow_reassignment,
            } => addresses
                .into_iter()
                .fold(call.allow_reassignment(allow_reassignment), |call, ip| {
                    call.private_ip_addresses(ip)
                }),
        };

        let output = call
            .send()
            .await
            .map_err(|e| EgressIpError::backend(DisplayErrorContext(e)))?;

        Ok(output
            .assigned_private_ip_addresses()
            .iter()
            .filter_map(|a| a.private_ip_address())
            .map(str::to_string)
            .collect())
    }

    async fn unassign_private_ips(&self, interface_id: &str, addresses: Vec<String>) -> Result<()> {
        addresses
            .into_iter()
            .fold(
                self.client
                    .unassign_private_ip_addresses()
                    .network_interface_id(interface_id),
                |call, ip| call.private_ip_addresses(ip),
            )
            .send()
            .await
            .map_err(|e| EgressIpError::backend(DisplayErrorContext(e)))?;
        Ok(())
    }
}
