/*
    core_object - Distributed object synchronization core

    Keeps named key/value objects consistent across the devices of one
    account. Replication itself belongs to the storage engine; this layer
    handles:
    - Object lifecycle and the live-handle registry
    - Watcher / status notifier multiplexing
    - The remote cache bridge (save, revoke, resume)
    - The restore loop that pulls every object from all known peers
*/

pub mod adapters;
pub mod cache;
pub mod errors;
pub mod handle;
pub mod store;
pub mod sync;
pub mod traits;
pub mod types;
pub mod value;
pub mod watcher;

pub use cache::CacheBridge;
pub use errors::{status_code, ObjectError, ObjectResult, SUCCESS};
pub use handle::DistributedObject;
pub use store::ObjectStore;
pub use sync::{RestoreHandle, RestoreOutcome, RestoreResult, SyncCoordinator};
pub use traits::{
    CacheProxy, ChangeObserver, DeviceDiscovery, StatusObserver, StorageEngine, SyncCompletion, SyncRequest,
};
pub use types::{gen_session_id, DbStatus, DeviceInfo, ObjectData, OnlineStatus, SyncStatus};
pub use value::ObjectValue;
pub use watcher::{ObjectWatcher, StatusNotifier, StatusNotifierProxy, WatcherProxy};
