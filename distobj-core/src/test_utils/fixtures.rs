//! Test fixtures
//!
//! [`TestStore`] wires an [`ObjectStore`] to the in-memory collaborators and
//! keeps typed references to them so tests can script and inspect them.

use crate::config::Config;
use crate::core_object::adapters::{MemoryCacheProxy, MemoryEngine, StaticDiscovery};
use crate::core_object::{DeviceInfo, ObjectStore, ObjectWatcher, StatusNotifier};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Watcher that records every notification it receives
#[derive(Default)]
pub struct RecordingWatcher {
    calls: Mutex<Vec<(String, Vec<String>)>>,
    events: Mutex<Option<mpsc::UnboundedSender<(String, Vec<String>)>>>,
}

impl RecordingWatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Also forward each notification to a channel
    pub fn with_channel() -> (Arc<Self>, mpsc::UnboundedReceiver<(String, Vec<String>)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let watcher = Self::default();
        *watcher.events.lock().unwrap_or_else(|e| e.into_inner()) = Some(tx);
        (Arc::new(watcher), rx)
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl ObjectWatcher for RecordingWatcher {
    fn on_changed(&self, session_id: &str, changed_keys: &[String]) {
        let call = (session_id.to_string(), changed_keys.to_vec());
        if let Some(tx) = self.events.lock().unwrap_or_else(|e| e.into_inner()).as_ref() {
            let _ = tx.send(call.clone());
        }
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(call);
    }
}

/// Status notifier that records every transition it receives
#[derive(Default)]
pub struct RecordingNotifier {
    calls: Mutex<Vec<(String, String, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<(String, String, String)> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl StatusNotifier for RecordingNotifier {
    fn on_changed(&self, session_id: &str, network_id: &str, online_status: &str) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push((
            session_id.to_string(),
            network_id.to_string(),
            online_status.to_string(),
        ));
    }
}

/// Config with a short restore loop, suitable for tests
pub fn test_config(max_rounds: u32) -> Config {
    let mut config = Config::default();
    config.store.bundle_name = "com.example.test".to_string();
    config.restore.max_rounds = max_rounds;
    config.restore.round_interval = Duration::from_millis(10);
    config.cache.timeout = Duration::from_secs(2);
    config
}

/// `n` peer devices named dev-1..dev-n
pub fn peers(n: usize) -> Vec<DeviceInfo> {
    (1..=n)
        .map(|i| DeviceInfo::new(format!("dev-{}", i), format!("net-{}", i)))
        .collect()
}

/// Object store over in-memory collaborators
pub struct TestStore {
    pub store: ObjectStore,
    pub engine: Arc<MemoryEngine>,
    pub discovery: Arc<StaticDiscovery>,
    pub cache: Arc<MemoryCacheProxy>,
}

impl TestStore {
    pub fn new(config: Config, devices: Vec<DeviceInfo>) -> Self {
        let engine = Arc::new(MemoryEngine::new());
        let discovery = Arc::new(StaticDiscovery::new(devices));
        let cache = Arc::new(MemoryCacheProxy::new());
        let store = ObjectStore::open(config, engine.clone(), discovery.clone()).with_cache_proxy(cache.clone());
        Self {
            store,
            engine,
            discovery,
            cache,
        }
    }

    /// Store whose topology is just the local device
    pub fn single_device() -> Self {
        Self::new(test_config(50), Vec::new())
    }

    /// Store with `n` reachable peers
    pub fn with_peers(n: usize) -> Self {
        Self::new(test_config(50), peers(n))
    }
}
