use crate::device::DeviceState;
use crate::scheduler::CycleStatus;
use crate::store::{BatchReport, DeviceStore};

/// Receives store changes keyed by sonde identifier.
///
/// Rendering adapters implement this to keep their own per-sonde resources
/// and release them on removal.
pub trait StoreObserver: Send + Sync {
    fn device_updated(&self, device: &DeviceState);

    fn device_removed(&self, id: &str);

    /// Called once per poll cycle, after the store notifications
    fn cycle_finished(&self, _status: &CycleStatus) {}
}

/// Observer that ignores every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl StoreObserver for NullObserver {
    fn device_updated(&self, _device: &DeviceState) {}

    fn device_removed(&self, _id: &str) {}
}

/// Deliver the changes of one merged batch: removals first, then updates.
pub fn notify(observer: &dyn StoreObserver, store: &DeviceStore, report: &BatchReport) {
    for id in &report.removed {
        observer.device_removed(id);
    }
    for id in &report.updated {
        if let Some(device) = store.get(id) {
            observer.device_updated(device);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl StoreObserver for Recorder {
        fn device_updated(&self, device: &DeviceState) {
            self.0.lock().unwrap().push(format!("+{}", device.id));
        }

        fn device_removed(&self, id: &str) {
            self.0.lock().unwrap().push(format!("-{id}"));
        }
    }

    #[test]
    fn test_removals_come_first_and_unknown_ids_are_skipped() {
        let store = DeviceStore::default();
        let report = BatchReport {
            updated: vec!["GONE".to_string()],
            removed: vec!["OLD".to_string()],
            ..Default::default()
        };
        let recorder = Recorder::default();
        notify(&recorder, &store, &report);
        assert_eq!(*recorder.0.lock().unwrap(), ["-OLD"]);
    }
}
