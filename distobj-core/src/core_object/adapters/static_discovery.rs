//! Discovery layer backed by a mutable device list

use crate::core_object::traits::DeviceDiscovery;
use crate::core_object::types::DeviceInfo;
use async_trait::async_trait;
use std::sync::RwLock;

/// Device list set by hand; every call sees the latest list
#[derive(Default)]
pub struct StaticDiscovery {
    devices: RwLock<Vec<DeviceInfo>>,
}

impl StaticDiscovery {
    pub fn new(devices: Vec<DeviceInfo>) -> Self {
        Self {
            devices: RwLock::new(devices),
        }
    }

    /// No peers: the local device is alone
    pub fn single_device() -> Self {
        Self::default()
    }

    pub fn set_devices(&self, devices: Vec<DeviceInfo>) {
        *self.devices.write().unwrap_or_else(|p| p.into_inner()) = devices;
    }

    pub fn add_device(&self, device: DeviceInfo) {
        self.devices.write().unwrap_or_else(|p| p.into_inner()).push(device);
    }

    pub fn remove_device(&self, device_id: &str) {
        self.devices
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .retain(|d| d.device_id != device_id);
    }

    fn snapshot(&self) -> Vec<DeviceInfo> {
        self.devices.read().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl DeviceDiscovery for StaticDiscovery {
    async fn device_list(&self) -> Vec<DeviceInfo> {
        self.snapshot()
    }

    fn resolve_node_id(&self, device_id: &str) -> Option<String> {
        self.snapshot()
            .into_iter()
            .find(|d| d.device_id == device_id)
            .map(|d| d.network_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_device_list_reflects_updates() {
        let discovery = StaticDiscovery::single_device();
        assert!(discovery.device_list().await.is_empty());

        discovery.add_device(DeviceInfo::new("dev-1", "net-1"));
        discovery.add_device(DeviceInfo::new("dev-2", "net-2"));
        assert_eq!(discovery.device_list().await.len(), 2);
        assert_eq!(discovery.resolve_node_id("dev-2").as_deref(), Some("net-2"));

        discovery.remove_device("dev-1");
        let ids: Vec<_> = discovery.device_list().await.into_iter().map(|d| d.device_id).collect();
        assert_eq!(ids, vec!["dev-2".to_string()]);
        assert_eq!(discovery.resolve_node_id("dev-1"), None);
    }
}
