//! [`CloudBackend`] implementation for AWS

use crate::ec2::{AssignRequest, Ec2Api, Ec2Instance, Ec2Interface, SdkEc2Api};
use async_trait::async_trait;
use egressip_core::{CloudBackend, Context, EgressIpError, Result};
use std::net::IpAddr;
use std::sync::Arc;

pub struct AwsCloudBackend {
    ec2: Arc<dyn Ec2Api>,
    failure_region: String,
    max_ips_per_instance: usize,
}

impl AwsCloudBackend {
    pub fn new(
        ec2: Arc<dyn Ec2Api>,
        failure_region: impl Into<String>,
        max_ips_per_instance: usize,
    ) -> Self {
        Self {
            ec2,
            failure_region: failure_region.into(),
            max_ips_per_instance,
        }
    }

    /// Backend talking to the real EC2 API of `failure_region`.
    pub async fn connect(failure_region: impl Into<String>, max_ips_per_instance: usize) -> Self {
        let failure_region = failure_region.into();
        let ec2 = SdkEc2Api::connect(failure_region.clone()).await;
        Self::new(Arc::new(ec2), failure_region, max_ips_per_instance)
    }

    pub fn failure_region(&self) -> &str {
        &self.failure_region
    }

    pub fn max_ips_per_instance(&self) -> usize {
        self.max_ips_per_instance
    }

    async fn instance(&self, host: &str) -> Result<Ec2Instance> {
        let instance = self
            .ec2
            .describe_instance(host)
            .await?
            .ok_or_else(|| EgressIpError::NotFound(format!("no instance found for host '{}'", host)))?;

        tracing::debug!(host, instance_id = %instance.instance_id, "Found instance");
        Ok(instance)
    }

    /// The interface egress addresses live on, after the capacity check.
    fn usable_interface<'a>(&self, instance: &'a Ec2Instance) -> Result<&'a Ec2Interface> {
        let eni = primary_interface(instance)?;
        if eni.private_ips.len() >= self.max_ips_per_instance {
            return Err(EgressIpError::CapacityExceeded(format!(
                "instance '{}' has already {} IP addresses - maximum of {} reached",
                instance.instance_id,
                eni.private_ips.len(),
                self.max_ips_per_instance
            )));
        }
        Ok(eni)
    }

    async fn assign_specified(&self, ctx: &Context, ip: IpAddr, host: &str, allow_reassignment: bool) -> Result<()> {
        let instance = self.instance(host).await?;
        let eni = self.usable_interface(&instance)?;

        let address = ip.to_string();
        if eni.private_ips.contains(&address) {
            return Err(EgressIpError::Conflict(format!(
                "instance '{}' has already a secondary ip '{}' - can not add it again",
                instance.instance_id, ip
            )));
        }

        let assigned = self
            .ec2
            .assign_private_ips(
                &eni.interface_id,
                AssignRequest::Addresses {
                    addresses: vec![address],
                    allow_reassignment,
                },
            )
            .await?;

        if assigned.len() != 1 {
            return Err(EgressIpError::backend(format!(
                "there has been no or too much IP address assigned to the eni '{}': [{}]",
                eni.interface_id,
                assigned.join(",")
            )));
        }

        tracing::info!(
            request_id = ctx.request_id(),
            eni = %eni.interface_id,
            %ip,
            "Assigned IP to eni"
        );
        Ok(())
    }
}

fn primary_interface(instance: &Ec2Instance) -> Result<&Ec2Interface> {
    instance.interfaces.first().ok_or_else(|| {
        EgressIpError::NotFound(format!(
            "instance '{}' has no network interface",
            instance.instance_id
        ))
    })
}

fn not_assigned(ip: IpAddr, instance: &Ec2Instance) -> EgressIpError {
    EgressIpError::NotAssigned(format!(
        "ip '{}' is not assigned to instance '{}'",
        ip, instance.instance_id
    ))
}

#[async_trait]
impl CloudBackend for AwsCloudBackend {
    fn name(&self) -> &str {
        "aws"
    }

    async fn add_random_ip(&self, ctx: &Context, host: &str) -> Result<IpAddr> {
        let instance = self.instance(host).await?;
        let eni = self.usable_interface(&instance)?;

        let assigned = self
            .ec2
            .assign_private_ips(&eni.interface_id, AssignRequest::Count(1))
            .await?;

        let [address] = assigned.as_slice() else {
            return Err(EgressIpError::backend(format!(
                "there are no or too much IP address assigned to the eni '{}': [{}]",
                eni.interface_id,
                assigned.join(",")
            )));
        };

        let ip: IpAddr = address.parse().map_err(|e| {
            EgressIpError::backend(format!("EC2 returned invalid address '{}': {}", address, e))
        })?;

        tracing::info!(
            request_id = ctx.request_id(),
            eni = %eni.interface_id,
            %ip,
            "Assigned IP to eni"
        );
        Ok(ip)
    }

    async fn add_specified_ip(&self, ctx: &Context, ip: IpAddr, host: &str) -> Result<()> {
        self.assign_specified(ctx, ip, host, false).await
    }

    async fn check_ip(&self, _ctx: &Context, ip: IpAddr, host: &str) -> Result<()> {
        let instance = self.instance(host).await?;
        let address = ip.to_string();

        match instance.interfaces.first() {
            Some(eni) if eni.private_ips.contains(&address) => Ok(()),
            _ => Err(not_assigned(ip, &instance)),
        }
    }

    async fn move_ip(&self, ctx: &Context, ip: IpAddr, old_host: &str, new_host: &str) -> Result<()> {
        self.check_ip(ctx, ip, old_host).await?;
        self.assign_specified(ctx, ip, new_host, true).await
    }

    async fn remove_ip(&self, ctx: &Context, ip: IpAddr, host: &str) -> Result<()> {
        let instance = self.instance(host).await?;

        let Some(eni) = instance.interfaces.first() else {
            tracing::info!(
                request_id = ctx.request_id(),
                instance_id = %instance.instance_id,
                %ip,
                "Host has no network interface or no IPs attached"
            );
            return Ok(());
        };

        let address = ip.to_string();
        if !eni.private_ips.contains(&address) {
            tracing::info!(
                request_id = ctx.request_id(),
                instance_id = %instance.instance_id,
                eni = %eni.interface_id,
                %ip,
                "IP is not assigned on instance"
            );
            return Ok(());
        }

        tracing::info!(
            request_id = ctx.request_id(),
            instance_id = %instance.instance_id,
            eni = %eni.interface_id,
            %ip,
            "Removing IP from instance"
        );
        self.ec2
            .unassign_private_ips(&eni.interface_id, vec![address])
            .await
    }
}
