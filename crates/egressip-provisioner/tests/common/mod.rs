use async_trait::async_trait;
use egressip_core::{
    Assignment, CloudBackend, ClusterBackend, Context, EgressIpError, Result,
};
use egressip_provisioner::Coordinator;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::net::IpAddr;
use std::sync::{Arc, Mutex};

pub fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

/// In-memory address book shared by both fake backends
#[derive(Default)]
pub struct FakeState {
    hosts: Mutex<HashMap<String, BTreeSet<IpAddr>>>,
    // op -> (successful calls still to go, failure message)
    failures: Mutex<HashMap<String, (usize, String)>>,
    hanging: Mutex<HashSet<String>>,
    stalling: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
}

impl FakeState {
    pub fn with_ip(self, host: &str, ip: IpAddr) -> Self {
        self.hosts
            .lock()
            .unwrap()
            .entry(host.to_string())
            .or_default()
            .insert(ip);
        self
    }

    /// The next call of `op` fails with a backend error carrying `message`.
    pub fn fail_next(&self, op: &str, message: &str) {
        self.fail_after(op, 0, message);
    }

    /// Let `skip` calls of `op` pass, then fail the following one.
    pub fn fail_after(&self, op: &str, skip: usize, message: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(op.to_string(), (skip, message.to_string()));
    }

    /// Every call of `op` blocks forever.
    pub fn hang(&self, op: &str) {
        self.hanging.lock().unwrap().insert(op.to_string());
    }

    /// Every call of `op` applies its change, then blocks forever.
    pub fn stall_after_apply(&self, op: &str) {
        self.stalling.lock().unwrap().insert(op.to_string());
    }

    /// Names of the operations called so far
    pub fn ops(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn has_ip(&self, host: &str, ip: IpAddr) -> bool {
        self.hosts
            .lock()
            .unwrap()
            .get(host)
            .is_some_and(|ips| ips.contains(&ip))
    }

    pub fn hosts_of(&self, ip: IpAddr) -> Vec<String> {
        let mut hosts: Vec<String> = self
            .hosts
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, ips)| ips.contains(&ip))
            .map(|(host, _)| host.clone())
            .collect();
        hosts.sort();
        hosts
    }

    async fn enter(&self, op: &str) -> Result<()> {
        self.calls.lock().unwrap().push(op.to_string());

        let hang = self.hanging.lock().unwrap().contains(op);
        if hang {
            std::future::pending::<()>().await;
        }

        let mut failures = self.failures.lock().unwrap();
        let Some((skip, _)) = failures.get_mut(op) else {
            return Ok(());
        };
        if *skip > 0 {
            *skip -= 1;
            return Ok(());
        }
        let (_, message) = failures.remove(op).unwrap();
        Err(EgressIpError::backend(message))
    }

    async fn leave(&self, op: &str) {
        let stall = self.stalling.lock().unwrap().contains(op);
        if stall {
            std::future::pending::<()>().await;
        }
    }

    fn add(&self, ip: IpAddr, host: &str) -> Result<()> {
        let mut hosts = self.hosts.lock().unwrap();
        if !hosts.entry(host.to_string()).or_default().insert(ip) {
            return Err(EgressIpError::Conflict(format!("'{}' already on '{}'", ip, host)));
        }
        Ok(())
    }

    fn check(&self, ip: IpAddr, host: &str) -> Result<()> {
        if self.has_ip(host, ip) {
            Ok(())
        } else {
            Err(EgressIpError::NotAssigned(format!("'{}' not on '{}'", ip, host)))
        }
    }

    fn relocate(&self, ip: IpAddr, old_host: &str, new_host: &str) -> Result<()> {
        self.check(ip, old_host)?;
        let mut hosts = self.hosts.lock().unwrap();
        if let Some(ips) = hosts.get_mut(old_host) {
            ips.remove(&ip);
        }
        hosts.entry(new_host.to_string()).or_default().insert(ip);
        Ok(())
    }

    fn remove(&self, ip: IpAddr, host: &str) {
        if let Some(ips) = self.hosts.lock().unwrap().get_mut(host) {
            ips.remove(&ip);
        }
    }
}

#[derive(Default)]
pub struct FakeCloud {
    pub state: FakeState,
    next_random: Mutex<Option<IpAddr>>,
}

impl FakeCloud {
    pub fn with_ip(self, host: &str, ip: IpAddr) -> Self {
        Self {
            state: self.state.with_ip(host, ip),
            next_random: self.next_random,
        }
    }

    pub fn with_next_random(self, ip: IpAddr) -> Self {
        *self.next_random.lock().unwrap() = Some(ip);
        self
    }
}

#[async_trait]
impl CloudBackend for FakeCloud {
    fn name(&self) -> &str {
        "fake-cloud"
    }

    async fn add_random_ip(&self, _ctx: &Context, host: &str) -> Result<IpAddr> {
        self.state.enter("add_random_ip").await?;
        let address = self
            .next_random
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| ip("10.0.0.100"));
        self.state.add(address, host)?;
        Ok(address)
    }

    async fn add_specified_ip(&self, _ctx: &Context, ip: IpAddr, host: &str) -> Result<()> {
        self.state.enter("add_specified_ip").await?;
        self.state.add(ip, host)
    }

    async fn check_ip(&self, _ctx: &Context, ip: IpAddr, host: &str) -> Result<()> {
        self.state.enter("check_ip").await?;
        self.state.check(ip, host)
    }

    async fn move_ip(&self, _ctx: &Context, ip: IpAddr, old_host: &str, new_host: &str) -> Result<()> {
        self.state.enter("move_ip").await?;
        self.state.relocate(ip, old_host, new_host)
    }

    async fn remove_ip(&self, _ctx: &Context, ip: IpAddr, host: &str) -> Result<()> {
        self.state.enter("remove_ip").await?;
        self.state.remove(ip, host);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeCluster {
    pub state: FakeState,
    pub next_assignment: Mutex<Option<Assignment>>,
}

impl FakeCluster {
    pub fn with_ip(self, host: &str, ip: IpAddr) -> Self {
        Self {
            state: self.state.with_ip(host, ip),
            next_assignment: self.next_assignment,
        }
    }
}

#[async_trait]
impl ClusterBackend for FakeCluster {
    fn name(&self) -> &str {
        "fake-cluster"
    }

    async fn find_host_for_new_ip(&self, _ctx: &Context, failure_domain: &str) -> Result<Assignment> {
        self.state.enter("find_host_for_new_ip").await?;
        self.next_assignment
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| EgressIpError::NotFound(format!("no host in '{}'", failure_domain)))
    }

    async fn add_specified_ip(&self, _ctx: &Context, ip: IpAddr, host: &str) -> Result<()> {
        self.state.enter("add_specified_ip").await?;
        self.state.add(ip, host)?;
        self.state.leave("add_specified_ip").await;
        Ok(())
    }

    async fn check_ip(&self, _ctx: &Context, ip: IpAddr, host: &str) -> Result<()> {
        self.state.enter("check_ip").await?;
        self.state.check(ip, host)
    }

    async fn move_ip(&self, _ctx: &Context, ip: IpAddr, old_host: &str, new_host: &str) -> Result<()> {
        self.state.enter("move_ip").await?;
        self.state.relocate(ip, old_host, new_host)?;
        self.state.leave("move_ip").await;
        Ok(())
    }

    async fn remove_ip(&self, _ctx: &Context, ip: IpAddr, host: &str) -> Result<()> {
        self.state.enter("remove_ip").await?;
        self.state.remove(ip, host);
        self.state.leave("remove_ip").await;
        Ok(())
    }

    async fn assign_cidr(&self, _ctx: &Context, _host: &str) -> Result<()> {
        self.state.enter("assign_cidr").await
    }
}

pub struct Harness {
    pub cloud: Arc<FakeCloud>,
    pub cluster: Arc<FakeCluster>,
    pub coordinator: Coordinator,
}

impl Harness {
    pub fn new(cloud: FakeCloud, cluster: FakeCluster) -> Self {
        let cloud = Arc::new(cloud);
        let cluster = Arc::new(cluster);
        let coordinator = Coordinator::new(cloud.clone(), cluster.clone());
        Self {
            cloud,
            cluster,
            coordinator,
        }
    }

    pub fn empty() -> Self {
        Self::new(FakeCloud::default(), FakeCluster::default())
    }
}
