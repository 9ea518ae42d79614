pub mod inspect;
pub mod provision;
pub mod validate;

use egressip_config::EgressIpConfig;
use egressip_core::{Context, EgressIpError, EgressIpStatus};
use egressip_provisioner::{AlarmStore, Coordinator, StatusReporter, build_coordinator};
use std::sync::Arc;
use std::time::Duration;

/// Exit code for a failed operation
pub const EXIT_FAILED: i32 = 1;
/// Exit code when cloud and cluster were left out of sync
pub const EXIT_DIVERGED: i32 = 2;

pub struct Session {
    pub coordinator: Coordinator,
    pub reporter: StatusReporter,
    pub namespace: String,
    timeout: Option<Duration>,
}

impl Session {
    pub async fn new(
        config: &EgressIpConfig,
        namespace: &str,
        timeout_secs: Option<u64>,
    ) -> anyhow::Result<Self> {
        let coordinator = build_coordinator(config).await?;
        Ok(Self {
            coordinator,
            reporter: StatusReporter::new(Arc::new(AlarmStore::new())),
            namespace: namespace.to_string(),
            timeout: timeout_secs.map(Duration::from_secs),
        })
    }

    /// Fresh context per command, tied to Ctrl-C.
    pub fn context(&self) -> Context {
        let ctx = match self.timeout {
            Some(timeout) => Context::new().with_timeout(timeout),
            None => Context::new(),
        };

        let cancel = ctx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!(request_id = cancel.request_id(), "Interrupted, cancelling");
                cancel.cancel();
            }
        });
        ctx
    }
}

pub fn print_status(status: &EgressIpStatus) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(status)?);
    Ok(())
}

pub fn exit_code(error: &EgressIpError) -> i32 {
    if error.is_fatal() {
        EXIT_DIVERGED
    } else {
        EXIT_FAILED
    }
}
