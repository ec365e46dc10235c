//! Per-run state shared by the sources, the cache, the engine and plugins.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use log::{info, warn};
use uuid::Uuid;

/// Device metadata published by core artifacts for later artifacts to read
#[derive(Debug, Default)]
pub struct DeviceInfo {
    values: RwLock<BTreeMap<String, String>>,
}

impl DeviceInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a value, replacing any earlier one
    pub fn set(&self, key: &str, value: &str) {
        match self.values.write() {
            Ok(mut values) => {
                if let Some(previous) = values.insert(key.to_string(), value.to_string()) {
                    if previous != value {
                        warn!("Device value {} changed from {} to {}", key, previous, value);
                    }
                } else {
                    info!("Device {}: {}", key, value);
                }
            }
            Err(e) => warn!("Failed to record device value {}: {}", key, e),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.read().ok().and_then(|values| values.get(key).cloned())
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.values.read().map(|values| values.clone()).unwrap_or_default()
    }

    /// Major component of a dotted version value, e.g. `ProductVersion` "15.4.1" -> 15
    pub fn major_version(&self, key: &str) -> Option<u32> {
        self.get(key)?.split('.').next()?.trim().parse().ok()
    }
}

/// Explicit run context passed to every component instead of global state.
#[derive(Debug)]
pub struct RunContext {
    run_id: Uuid,
    started_at: String,
    temp_dir: PathBuf,
    device: DeviceInfo,
    stop: Arc<AtomicBool>,
}

impl RunContext {
    pub fn new(temp_dir: &Path) -> Self {
        RunContext {
            run_id: Uuid::new_v4(),
            started_at: chrono::Utc::now().to_rfc3339(),
            temp_dir: temp_dir.to_path_buf(),
            device: DeviceInfo::new(),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn started_at(&self) -> &str {
        &self.started_at
    }

    /// Staging directory for files materialized out of containers
    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    /// Ask the engine to stop after the artifact currently running
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Shareable handle on the stop flag, e.g. for a signal handler or GUI
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_info_values() {
        let device = DeviceInfo::new();
        assert_eq!(device.get("ProductVersion"), None);

        device.set("ProductVersion", "15.4.1");
        assert_eq!(device.get("ProductVersion"), Some("15.4.1".to_string()));
        assert_eq!(device.major_version("ProductVersion"), Some(15));

        device.set("ProductName", "iPhone OS");
        assert_eq!(device.snapshot().len(), 2);
    }

    #[test]
    fn test_major_version_unparseable() {
        let device = DeviceInfo::new();
        device.set("ProductVersion", "unknown");
        assert_eq!(device.major_version("ProductVersion"), None);
    }

    #[test]
    fn test_stop_flag() {
        let ctx = RunContext::new(Path::new("/tmp/staging"));
        assert!(!ctx.stop_requested());

        let flag = ctx.stop_flag();
        flag.store(true, Ordering::SeqCst);
        assert!(ctx.stop_requested());
        assert_eq!(ctx.temp_dir(), Path::new("/tmp/staging"));
    }
}
