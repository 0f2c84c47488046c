//! Collaborator contracts
//!
//! The object store does not own replication, discovery, or the remote
//! cache service. It talks to them through the traits below; production
//! bindings and the in-memory [`adapters`](super::adapters) both implement
//! them.

use super::errors::ObjectResult;
use super::types::{DbStatus, DeviceInfo, ObjectData};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Completion for a full sync, keyed by device id
pub type SyncCompletion = Box<dyn FnOnce(HashMap<String, DbStatus>) + Send + 'static>;

/// Per-device result map of a cache save (0 is success)
pub type SaveCallback = Box<dyn FnOnce(HashMap<String, i32>) + Send + 'static>;

/// Single result code of a cache revoke (0 is success)
pub type RevokeCallback = Box<dyn FnOnce(i32) + Send + 'static>;

/// Items retrieved from the remote cache
pub type RetrieveCallback = Box<dyn FnOnce(ObjectData) + Send + 'static>;

/// How the engine handled a full-sync request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncRequest {
    /// Request issued; the completion will fire later
    Accepted,
    /// No peers in the topology; nothing to replicate and the completion
    /// will not fire
    SingleDevice,
}

/// Engine-side receiver of per-session change notifications
pub trait ChangeObserver: Send + Sync {
    fn on_changed(&self, session_id: &str, changed_keys: &[String]);
}

/// Engine-side receiver of device online/offline transitions
pub trait StatusObserver: Send + Sync {
    fn on_status(&self, session_id: &str, network_id: &str, online_status: &str);
}

/// Replicated key-value storage engine
///
/// Failures are reported as `ObjectError::Engine { code }`.
pub trait StorageEngine: Send + Sync {
    fn open(&self, bundle_name: &str) -> ObjectResult<()>;

    fn close(&self) -> ObjectResult<()>;

    fn is_opened(&self) -> bool;

    fn create_table(&self, session_id: &str) -> ObjectResult<()>;

    fn delete_table(&self, session_id: &str) -> ObjectResult<()>;

    fn update_item(&self, session_id: &str, key: &str, value: Vec<u8>) -> ObjectResult<()>;

    fn update_items(&self, session_id: &str, items: ObjectData) -> ObjectResult<()>;

    fn get_item(&self, session_id: &str, key: &str) -> ObjectResult<Vec<u8>>;

    fn get_items(&self, session_id: &str) -> ObjectResult<ObjectData>;

    fn register_observer(&self, session_id: &str, observer: Arc<dyn ChangeObserver>) -> ObjectResult<()>;

    fn unregister_observer(&self, session_id: &str) -> ObjectResult<()>;

    fn set_status_observer(&self, observer: Arc<dyn StatusObserver>) -> ObjectResult<()>;

    /// Pull `session_id` from every device in `device_ids`.
    ///
    /// `on_complete` may be invoked on any thread, including inline before
    /// this call returns.
    fn sync_all_data(
        &self,
        session_id: &str,
        device_ids: &[String],
        on_complete: SyncCompletion,
    ) -> ObjectResult<SyncRequest>;
}

/// Device discovery / transport layer
#[async_trait]
pub trait DeviceDiscovery: Send + Sync {
    /// Currently reachable peer devices, excluding the local one
    async fn device_list(&self) -> Vec<DeviceInfo>;

    /// Map a device id to its network id (diagnostics only)
    fn resolve_node_id(&self, device_id: &str) -> Option<String>;
}

/// Callback-based remote cache service
///
/// Each method returns whether the request was issued; results arrive
/// through the callback.
pub trait CacheProxy: Send + Sync {
    fn save(
        &self,
        bundle_name: &str,
        session_id: &str,
        device_id: &str,
        data: ObjectData,
        callback: SaveCallback,
    ) -> ObjectResult<()>;

    fn revoke_save(&self, bundle_name: &str, session_id: &str, callback: RevokeCallback) -> ObjectResult<()>;

    fn retrieve(&self, bundle_name: &str, session_id: &str, callback: RetrieveCallback) -> ObjectResult<()>;
}
