//! Shared value types for the object store

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Key/value snapshot of one object's items
pub type ObjectData = BTreeMap<String, Vec<u8>>;

/// A peer device as reported by the discovery layer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Stable device identifier used for sync targeting
    pub device_id: String,
    /// Transport-level node id, used in diagnostics
    pub network_id: String,
    /// Human readable name
    pub device_name: String,
}

impl DeviceInfo {
    pub fn new(device_id: impl Into<String>, network_id: impl Into<String>) -> Self {
        let device_id = device_id.into();
        Self {
            device_name: device_id.clone(),
            device_id,
            network_id: network_id.into(),
        }
    }
}

/// Per-device status reported by the storage engine when a sync completes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbStatus {
    Ok,
    Busy,
    TimeOut,
    NotFound,
    DbError,
    Other(i32),
}

impl DbStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, DbStatus::Ok)
    }
}

/// Sync progress of one session within a single restore run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SyncStatus {
    #[default]
    Start,
    Syncing,
    Success,
    Fail,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncStatus::Start => "start",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Success => "success",
            SyncStatus::Fail => "fail",
        };
        f.write_str(s)
    }
}

/// Peer reachability as carried by status notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OnlineStatus {
    Online,
    Offline,
}

impl OnlineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OnlineStatus::Online => "online",
            OnlineStatus::Offline => "offline",
        }
    }
}

impl fmt::Display for OnlineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generate a random 8-digit decimal session id
pub fn gen_session_id() -> String {
    let n: u32 = rand::rng().random_range(0..100_000_000);
    format!("{:08}", n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gen_session_id_shape() {
        for _ in 0..32 {
            let id = gen_session_id();
            assert_eq!(id.len(), 8);
            assert!(id.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_db_status_ok() {
        assert!(DbStatus::Ok.is_ok());
        assert!(!DbStatus::Other(0).is_ok());
        assert!(!DbStatus::TimeOut.is_ok());
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(OnlineStatus::Online.to_string(), "online");
        assert_eq!(SyncStatus::Syncing.to_string(), "syncing");
        assert_eq!(SyncStatus::default(), SyncStatus::Start);
    }
}
