//! Per namespace failure alarms
//!
//! One [`AlarmStore`] is created at startup and shared as `Arc<AlarmStore>`
//! with every worker. Each alarm is mirrored into the
//! `egress_ip_handling_failures{namespace}` gauge of the `metrics` facade.
//! Installing a recorder/exporter is up to the embedding process.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::net::IpAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub const FAILURE_GAUGE: &str = "egress_ip_handling_failures";

/// Failure record of one namespace
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedEgressIp {
    pub namespace: String,
    /// Addresses of the latest failure report
    pub failed_ips: BTreeSet<IpAddr>,
    pub first_occurrence: DateTime<Utc>,
    pub last_occurrence: DateTime<Utc>,
    pub counter: f64,
}

#[derive(Debug, Default)]
pub struct AlarmStore {
    failures: Mutex<HashMap<String, FailedEgressIp>>,
}

impl AlarmStore {
    pub fn new() -> Self {
        metrics::describe_gauge!(FAILURE_GAUGE, "Failures while handling egress-ips");
        Self::default()
    }

    fn failures(&self) -> MutexGuard<'_, HashMap<String, FailedEgressIp>> {
        self.failures.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a failure. A repeated failure bumps the counter and replaces
    /// the failed addresses with `ips`.
    pub fn add_alarm(&self, namespace: &str, ips: impl IntoIterator<Item = IpAddr>) {
        let ips: BTreeSet<IpAddr> = ips.into_iter().collect();
        let now = Utc::now();
        let mut failures = self.failures();

        let counter = match failures.get_mut(namespace) {
            Some(alarm) => {
                alarm.counter += 1.0;
                alarm.last_occurrence = if now > alarm.last_occurrence {
                    now
                } else {
                    alarm.last_occurrence + Duration::nanoseconds(1)
                };
                alarm.failed_ips = ips;
                alarm.counter
            }
            None => {
                failures.insert(
                    namespace.to_string(),
                    FailedEgressIp {
                        namespace: namespace.to_string(),
                        failed_ips: ips,
                        first_occurrence: now,
                        last_occurrence: now,
                        counter: 1.0,
                    },
                );
                1.0
            }
        };

        metrics::gauge!(FAILURE_GAUGE, "namespace" => namespace.to_string()).set(counter);
        tracing::warn!(namespace, counter, "Egress ip failure alarm raised");
    }

    /// Drop the alarm of `namespace`, no-op if there is none.
    pub fn remove_alarm(&self, namespace: &str) {
        let mut failures = self.failures();
        Self::clear(&mut failures, namespace);
    }

    /// Drop `ip` from the alarm. The alarm goes away with its last address.
    pub fn remove_alarm_for_ip(&self, namespace: &str, ip: IpAddr) {
        let mut failures = self.failures();
        let Some(alarm) = failures.get_mut(namespace) else {
            return;
        };

        alarm.failed_ips.remove(&ip);
        if alarm.failed_ips.is_empty() {
            Self::clear(&mut failures, namespace);
        }
    }

    /// Snapshot of all alarms.
    pub fn get_failed(&self) -> HashMap<String, FailedEgressIp> {
        self.failures().clone()
    }

    pub fn get(&self, namespace: &str) -> Option<FailedEgressIp> {
        self.failures().get(namespace).cloned()
    }

    fn clear(failures: &mut HashMap<String, FailedEgressIp>, namespace: &str) {
        if failures.remove(namespace).is_some() {
            metrics::gauge!(FAILURE_GAUGE, "namespace" => namespace.to_string()).set(0.0);
            tracing::info!(namespace, "Egress ip failure alarm cleared");
        }
    }
}
