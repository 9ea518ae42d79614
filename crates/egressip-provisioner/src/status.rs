//! Turns coordinator results into egress IP status and alarms

use crate::alarm::AlarmStore;
use egressip_core::{EgressIpError, EgressIpStatus, Phase};
use std::net::IpAddr;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct StatusReporter {
    alarms: Arc<AlarmStore>,
}

impl StatusReporter {
    pub fn new(alarms: Arc<AlarmStore>) -> Self {
        Self { alarms }
    }

    pub fn alarms(&self) -> &Arc<AlarmStore> {
        &self.alarms
    }

    pub fn pending(&self, failure_domain: &str) -> EgressIpStatus {
        EgressIpStatus::new(Phase::Pending, failure_domain)
    }

    pub fn initializing(&self, failure_domain: &str) -> EgressIpStatus {
        EgressIpStatus::new(Phase::Initializing, failure_domain)
            .with_message("provisioning egress ip")
    }

    pub fn provisioned(
        &self,
        namespace: &str,
        failure_domain: &str,
        ip: IpAddr,
        host: &str,
    ) -> EgressIpStatus {
        self.alarms.remove_alarm_for_ip(namespace, ip);
        EgressIpStatus::new(Phase::Provisioned, failure_domain)
            .with_ip(ip)
            .with_host(host)
    }

    pub fn deprovisioned(
        &self,
        namespace: &str,
        failure_domain: &str,
        ip: IpAddr,
        host: &str,
    ) -> EgressIpStatus {
        self.alarms.remove_alarm_for_ip(namespace, ip);
        EgressIpStatus::new(Phase::Deprovisioned, failure_domain)
            .with_ip(ip)
            .with_host(host)
    }

    /// Failed attempt. The alarm is raised for `ip`; an operation that failed
    /// before an address was known raises it with no address. Such an alarm
    /// has nothing left to remove, so the next [`provisioned`] or
    /// [`deprovisioned`] in the namespace clears it.
    ///
    /// [`provisioned`]: StatusReporter::provisioned
    /// [`deprovisioned`]: StatusReporter::deprovisioned
    pub fn failed(
        &self,
        namespace: &str,
        failure_domain: &str,
        ip: Option<IpAddr>,
        host: Option<&str>,
        error: &EgressIpError,
    ) -> EgressIpStatus {
        self.alarms.add_alarm(namespace, ip);

        let message = if error.is_fatal() {
            tracing::error!(namespace, error = %error, "Egress ip needs manual intervention");
            format!("manual intervention required: {}", error)
        } else {
            tracing::warn!(namespace, kind = %error.kind(), error = %error, "Egress ip failed");
            error.to_string()
        };

        let mut status = EgressIpStatus::new(Phase::Failed, failure_domain).with_message(message);
        status.ip = ip;
        status.host_name = host.map(str::to_string);
        status
    }
}
