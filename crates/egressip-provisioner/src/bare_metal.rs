//! Cloud backend for clusters whose addresses no cloud API owns

use async_trait::async_trait;
use egressip_core::{CloudBackend, Context, EgressIpError, Result};
use std::net::IpAddr;

/// The ocp-static and ocp-dynamic provisioners only configure the cluster.
/// Their cloud side accepts every change and has no say in address selection.
#[derive(Debug, Default, Clone, Copy)]
pub struct BareMetalCloudBackend;

impl BareMetalCloudBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CloudBackend for BareMetalCloudBackend {
    fn name(&self) -> &str {
        "bare-metal"
    }

    async fn add_random_ip(&self, _ctx: &Context, host: &str) -> Result<IpAddr> {
        Err(EgressIpError::NotImplemented(format!(
            "bare-metal can not pick an address for host '{}', ask the cluster backend",
            host
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
}
