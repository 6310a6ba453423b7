use crate::config::{EngineConfig, Receiver};
use crate::device::DeviceState;
use crate::events::EventDetector;
use crate::lifecycle::{DeviceStatus, LifecyclePolicy};
use crate::record::{NormalizedBatch, Observation};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Result of merging a single observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// First fix of a new sonde
    Created,
    /// Newer fix appended to an existing sonde
    Appended,
    /// Not newer than the latest fix; history and snapshot untouched
    Ignored,
}

/// Summary of one merged batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Sondes created or extended by the batch, sorted
    pub updated: Vec<String>,
    /// Sondes pruned by the post-batch sweep
    pub removed: Vec<String>,
    pub created: usize,
    pub appended: usize,
    pub ignored: usize,
}

/// Sole owner of all sonde state
#[derive(Debug, Clone)]
pub struct DeviceStore {
    devices: HashMap<String, DeviceState>,
    capacity: usize,
    policy: LifecyclePolicy,
    receiver: Receiver,
    detector: EventDetector,
}

impl DeviceStore {
    pub fn new(capacity: usize, policy: LifecyclePolicy, receiver: Receiver, detector: EventDetector) -> Self {
        Self {
            devices: HashMap::new(),
            capacity: capacity.max(1),
            policy,
            receiver,
            detector,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.history.capacity,
            config.lifecycle,
            config.receiver.clone(),
            EventDetector::new(config.events.burst_hysteresis_m),
        )
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> &LifecyclePolicy {
        &self.policy
    }

    pub fn receiver(&self) -> &Receiver {
        &self.receiver
    }

    /// Merge one observation into its sonde, creating the sonde if needed.
    ///
    /// Derived quantities and events are recomputed only when the fix is
    /// accepted; age and status are refreshed either way.
    pub fn merge(&mut self, obs: &Observation, now: DateTime<Utc>) -> MergeOutcome {
        let created = !self.devices.contains_key(&obs.id);
        let device = self
            .devices
            .entry(obs.id.clone())
            .or_insert_with(|| DeviceState::new(obs.id.clone()));

        let accepted = device.apply(obs, self.capacity);
        device.refresh_lifecycle(now, &self.policy);
        if !accepted {
            debug!(id = %obs.id, time = %obs.point.time, "fix not newer than latest, ignored");
            return MergeOutcome::Ignored;
        }
        device.recompute(&self.receiver, &self.detector);

        if created {
            info!(id = %obs.id, kind = device.type_label.as_deref().unwrap_or("-"), "new sonde");
            MergeOutcome::Created
        } else {
            MergeOutcome::Appended
        }
    }

    /// Merge a normalised batch per sonde in time order, then sweep.
    pub fn merge_batch(&mut self, batch: NormalizedBatch, now: DateTime<Utc>) -> BatchReport {
        let mut report = BatchReport::default();
        for (id, observations) in batch.into_device_groups() {
            let mut touched = false;
            for obs in &observations {
                match self.merge(obs, now) {
                    MergeOutcome::Created => {
                        report.created += 1;
                        touched = true;
                    }
                    MergeOutcome::Appended => {
                        report.appended += 1;
                        touched = true;
                    }
                    MergeOutcome::Ignored => report.ignored += 1,
                }
            }
            if touched {
                report.updated.push(id);
            }
        }
        report.removed = self.sweep(now);
        report.updated.retain(|id| !report.removed.contains(id));
        info!(
            updated = report.updated.len(),
            removed = report.removed.len(),
            ignored = report.ignored,
            total = self.devices.len(),
            "batch merged"
        );
        report
    }

    /// Refresh every sonde's status and drop expired ones.
    ///
    /// Returns the removed identifiers, sorted.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> Vec<String> {
        let policy = self.policy;
        let mut removed = Vec::new();
        self.devices.retain(|id, device| {
            device.refresh_lifecycle(now, &policy);
            let expired = device
                .age_secs
                .is_some_and(|age| policy.is_expired(device.status, age));
            if expired {
                info!(%id, age_secs = device.age_secs, "sonde expired");
                removed.push(id.clone());
            }
            !expired
        });
        removed.sort();
        removed
    }

    pub fn get(&self, id: &str) -> Option<&DeviceState> {
        self.devices.get(id)
    }

    /// All sondes, most recent fix first
    pub fn list(&self) -> Vec<&DeviceState> {
        let mut list: Vec<&DeviceState> = self.devices.values().collect();
        list.sort_by(|a, b| b.latest_time().cmp(&a.latest_time()).then_with(|| a.id.cmp(&b.id)));
        list
    }

    pub fn remove(&mut self, id: &str) -> Option<DeviceState> {
        self.devices.remove(id)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Number of sondes currently in `status`
    pub fn count_status(&self, status: DeviceStatus) -> usize {
        self.devices.values().filter(|d| d.status == status).count()
    }
}

impl Default for DeviceStore {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

/// Store handle shared between the scheduler (single writer) and readers
#[derive(Debug, Clone)]
pub struct SharedStore {
    inner: Arc<RwLock<DeviceStore>>,
}

impl SharedStore {
    pub fn new(store: DeviceStore) -> Self {
        Self {
            inner: Arc::new(RwLock::new(store)),
        }
    }

    /// Run `f` with exclusive access; writers are serialised
    pub async fn write<R>(&self, f: impl FnOnce(&mut DeviceStore) -> R) -> R {
        let mut guard = self.inner.write().await;
        f(&mut guard)
    }

    /// Run `f` with shared access; readers may run concurrently
    pub async fn read<R>(&self, f: impl FnOnce(&DeviceStore) -> R) -> R {
        let guard = self.inner.read().await;
        f(&guard)
    }

    /// Owned copy of one sonde
    pub async fn snapshot(&self, id: &str) -> Option<DeviceState> {
        self.read(|store| store.get(id).cloned()).await
    }

    /// Owned copies of all sondes, most recent fix first
    pub async fn snapshot_all(&self) -> Vec<DeviceState> {
        self.read(|store| store.list().into_iter().cloned().collect()).await
    }
}
