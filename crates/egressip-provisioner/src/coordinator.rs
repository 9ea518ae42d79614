//! Two step saga over the cloud and the cluster backend

use egressip_core::{
    Assignment, CloudBackend, ClusterBackend, Context, EgressIpError, ErrorKind, Result,
};
use std::future::Future;
use std::net::IpAddr;
use std::sync::Arc;

/// Keeps cloud and cluster consistent for every egress IP change.
///
/// The cloud is always changed first. When the cluster step fails the cloud
/// change is undone once. The caller then sees the cluster error, or
/// [`EgressIpError::StateDivergence`] if the undo failed as well.
///
/// A cluster step cut short by cancellation may still have been applied.
/// The cluster is asked first: an applied change is kept and the operation
/// succeeds, an unknown cluster state is a divergence.
///
/// The coordinator holds no mutable state and may be shared between tasks.
#[derive(Clone)]
pub struct Coordinator {
    cloud: Arc<dyn CloudBackend>,
    cluster: Arc<dyn ClusterBackend>,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("cloud", &self.cloud.name())
            .field("cluster", &self.cluster.name())
            .finish()
    }
}

impl Coordinator {
    pub fn new(cloud: Arc<dyn CloudBackend>, cluster: Arc<dyn ClusterBackend>) -> Self {
        Self { cloud, cluster }
    }

    pub fn cloud_name(&self) -> &str {
        self.cloud.name()
    }

    pub fn cluster_name(&self) -> &str {
        self.cluster.name()
    }

    /// Let the cloud pick an address on `host` and route it there.
    pub async fn add_random_ip(&self, ctx: &Context, host: &str, failure_domain: &str) -> Result<IpAddr> {
        tracing::info!(request_id = ctx.request_id(), host, failure_domain, "Adding random egress ip");

        let ip = ctx
            .run("cloud add_random_ip", self.cloud.add_random_ip(ctx, host))
            .await?;

        if let Err(err) = ctx
            .run("cluster add_specified_ip", self.cluster.add_specified_ip(ctx, ip, host))
            .await
        {
            let owned_host = host.to_string();
            self.compensate(
                ctx,
                format!("adding random ip '{}' to host '{}'", ip, host),
                err,
                Landing::present(ip, host),
                move |cloud, ctx| async move { cloud.remove_ip(&ctx, ip, &owned_host).await },
            )
            .await?;
        }

        tracing::info!(request_id = ctx.request_id(), %ip, host, "Egress ip provisioned");
        Ok(ip)
    }

    pub async fn add_specified_ip(&self, ctx: &Context, ip: IpAddr, host: &str) -> Result<()> {
        tracing::info!(request_id = ctx.request_id(), %ip, host, "Adding egress ip");

        ctx.run("cloud add_specified_ip", self.cloud.add_specified_ip(ctx, ip, host))
            .await?;

        if let Err(err) = ctx
            .run("cluster add_specified_ip", self.cluster.add_specified_ip(ctx, ip, host))
            .await
        {
            let owned_host = host.to_string();
            self.compensate(
                ctx,
                format!("adding ip '{}' to host '{}'", ip, host),
                err,
                Landing::present(ip, host),
                move |cloud, ctx| async move { cloud.remove_ip(&ctx, ip, &owned_host).await },
            )
            .await?;
        }

        tracing::info!(request_id = ctx.request_id(), %ip, host, "Egress ip provisioned");
        Ok(())
    }

    pub async fn move_ip(&self, ctx: &Context, ip: IpAddr, old_host: &str, new_host: &str) -> Result<()> {
        tracing::info!(request_id = ctx.request_id(), %ip, old_host, new_host, "Moving egress ip");

        ctx.run("cloud move_ip", self.cloud.move_ip(ctx, ip, old_host, new_host))
            .await?;

        if let Err(err) = ctx
            .run("cluster move_ip", self.cluster.move_ip(ctx, ip, old_host, new_host))
            .await
        {
            let (from, to) = (new_host.to_string(), old_host.to_string());
            self.compensate(
                ctx,
                format!("moving ip '{}' from '{}' to '{}'", ip, old_host, new_host),
                err,
                Landing::present(ip, new_host),
                move |cloud, ctx| async move { cloud.move_ip(&ctx, ip, &from, &to).await },
            )
            .await?;
        }

        tracing::info!(request_id = ctx.request_id(), %ip, old_host, new_host, "Egress ip moved");
        Ok(())
    }

    /// Release `ip` from `host`. An address the cloud does not know on this
    /// host is already released and succeeds without touching the cluster.
    pub async fn remove_ip(&self, ctx: &Context, ip: IpAddr, host: &str) -> Result<()> {
        tracing::info!(request_id = ctx.request_id(), %ip, host, "Removing egress ip");

        match ctx
            .run("cloud check_ip", self.cloud.check_ip(ctx, ip, host))
            .await
        {
            Ok(()) => {}
            Err(err) if err.is_absent() => {
                tracing::info!(
                    request_id = ctx.request_id(),
                    %ip,
                    host,
                    reason = %err,
                    "Egress ip already absent in cloud"
                );
                return Ok(());
            }
            Err(err) => return Err(err),
        }

        ctx.run("cloud remove_ip", self.cloud.remove_ip(ctx, ip, host))
            .await?;

        if let Err(err) = ctx
            .run("cluster remove_ip", self.cluster.remove_ip(ctx, ip, host))
            .await
        {
            let owned_host = host.to_string();
            self.compensate(
                ctx,
                format!("removing ip '{}' from host '{}'", ip, host),
                err,
                Landing::absent(ip, host),
                move |cloud, ctx| async move { cloud.add_specified_ip(&ctx, ip, &owned_host).await },
            )
            .await?;
        }

        tracing::info!(request_id = ctx.request_id(), %ip, host, "Egress ip deprovisioned");
        Ok(())
    }

    /// Cloud first; the cluster is only asked when the cloud agrees.
    pub async fn check_ip(&self, ctx: &Context, ip: IpAddr, host: &str) -> Result<()> {
        ctx.run("cloud check_ip", self.cloud.check_ip(ctx, ip, host))
            .await?;
        ctx.run("cluster check_ip", self.cluster.check_ip(ctx, ip, host))
            .await
    }

    pub async fn find_host_for_new_ip(&self, ctx: &Context, failure_domain: &str) -> Result<Assignment> {
        ctx.run(
            "cluster find_host_for_new_ip",
            self.cluster.find_host_for_new_ip(ctx, failure_domain),
        )
        .await
    }

    pub async fn assign_cidr(&self, ctx: &Context, host: &str) -> Result<()> {
        ctx.run("cluster assign_cidr", self.cluster.assign_cidr(ctx, host))
            .await
    }

    /// Undo the cloud step after `primary` failed the cluster step.
    ///
    /// Returns `Ok` only when an interrupted cluster step turns out to have
    /// been applied. The check and the undo run on their own task with a
    /// detached context, so neither a cancelled context nor a dropped caller
    /// can abandon them halfway.
    async fn compensate<F, Fut>(
        &self,
        ctx: &Context,
        operation: String,
        primary: EgressIpError,
        landing: Landing,
        undo: F,
    ) -> Result<()>
    where
        F: FnOnce(Arc<dyn CloudBackend>, Context) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        tracing::warn!(
            request_id = ctx.request_id(),
            error = %primary,
            "Cluster step failed while {}, rolling back cloud",
            operation
        );

        let interrupted = primary.kind() == ErrorKind::Cancelled;
        let cloud = self.cloud.clone();
        let cluster = self.cluster.clone();
        let detached = ctx.detached();

        let task = tokio::spawn(async move {
            if interrupted {
                match landing.applied(cluster.as_ref(), &detached).await {
                    Ok(true) => return Ok(Settled::Applied),
                    Ok(false) => {}
                    Err(e) => return Ok(Settled::Unknown(e)),
                }
            }
            undo(cloud, detached).await.map(|()| Settled::RolledBack)
        });
        let outcome = match task.await {
            Ok(outcome) => outcome,
            Err(e) => Err(EgressIpError::backend(format!("compensation task failed: {}", e))),
        };

        let compensation = match outcome {
            Ok(Settled::Applied) => {
                tracing::warn!(
                    request_id = ctx.request_id(),
                    "Cancelled too late, cluster already applied the change while {}",
                    operation
                );
                return Ok(());
            }
            Ok(Settled::RolledBack) => {
                tracing::info!(request_id = ctx.request_id(), "Rolled back cloud while {}", operation);
                return Err(primary);
            }
            Ok(Settled::Unknown(e)) => EgressIpError::backend(format!(
                "cluster state unknown after cancellation, cloud left unchanged: {}",
                e
            )),
            Err(e) => e,
        };

        tracing::error!(
            request_id = ctx.request_id(),
            error = %primary,
            rollback_error = %compensation,
            "Rollback failed while {}, cloud and cluster diverge",
            operation
        );
        Err(EgressIpError::StateDivergence {
            operation,
            source: Box::new(primary),
            compensation: Box::new(compensation),
        })
    }
}

enum Settled {
    Applied,
    RolledBack,
    Unknown(EgressIpError),
}

/// Cluster state left behind by a cluster step that went through
struct Landing {
    ip: IpAddr,
    host: String,
    present: bool,
}

impl Landing {
    fn present(ip: IpAddr, host: &str) -> Self {
        Self {
            ip,
            host: host.to_string(),
            present: true,
        }
    }

    fn absent(ip: IpAddr, host: &str) -> Self {
        Self {
            ip,
            host: host.to_string(),
            present: false,
        }
    }

    async fn applied(&self, cluster: &dyn ClusterBackend, ctx: &Context) -> Result<bool> {
        match cluster.check_ip(ctx, self.ip, &self.host).await {
            Ok(()) => Ok(self.present),
            Err(e) if e.is_absent() => Ok(!self.present),
            Err(e) => Err(e),
        }
    }
}
