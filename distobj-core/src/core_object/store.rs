/*
    store.rs - Distributed object store

    Application entry point. Owns the registry of live object handles and
    composes the collaborators:

      create/delete/get ──► registry + engine tables (+ cache resume)
      watch/unwatch     ──► WatcherProxy registered with the engine
      save/revoke       ──► CacheBridge ──► remote cache proxy
      trigger_restore   ──► SyncCoordinator (spawned task)

    The registry sits behind one RwLock: lookups share it, every mutation
    takes it exclusively. The lock is never held across a collaborator
    callback.
*/

use super::cache::CacheBridge;
use super::errors::{ObjectError, ObjectResult};
use super::handle::DistributedObject;
use super::sync::{RestoreHandle, SyncCoordinator};
use super::traits::{CacheProxy, DeviceDiscovery, StorageEngine};
use super::watcher::{ObjectWatcher, StatusNotifier, StatusNotifierProxy, WatcherProxy};
use crate::config::Config;
use crate::metrics;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Registry state shared with the restore coordinator
pub(crate) struct Registry {
    engine: Option<Arc<dyn StorageEngine>>,
    objects: Vec<Arc<DistributedObject>>,
    watchers: HashMap<String, Arc<WatcherProxy>>,
    status_notifier: Option<Arc<StatusNotifierProxy>>,
}

impl Registry {
    pub(crate) fn engine(&self) -> Option<Arc<dyn StorageEngine>> {
        self.engine.clone()
    }

    pub(crate) fn session_ids(&self) -> Vec<String> {
        self.objects.iter().map(|o| o.session_id().to_string()).collect()
    }

    pub(crate) fn contains(&self, session_id: &str) -> bool {
        self.find(session_id).is_some()
    }

    fn find(&self, session_id: &str) -> Option<&Arc<DistributedObject>> {
        self.objects.iter().find(|o| o.session_id() == session_id)
    }

    fn is_live(&self, object: &Arc<DistributedObject>) -> bool {
        self.objects.iter().any(|o| Arc::ptr_eq(o, object))
    }

    /// Engine usable for a new operation
    fn open_engine(&self) -> ObjectResult<Arc<dyn StorageEngine>> {
        let engine = self.engine.clone().ok_or_else(|| {
            error!("object store is closed");
            ObjectError::NullStore
        })?;
        if !engine.is_opened() {
            error!("storage engine has not been opened");
            return Err(ObjectError::StoreNotOpen);
        }
        Ok(engine)
    }
}

/// Store of distributed objects for one application bundle
pub struct ObjectStore {
    config: Config,
    registry: Arc<RwLock<Registry>>,
    discovery: Arc<dyn DeviceDiscovery>,
    cache: CacheBridge,
}

impl ObjectStore {
    /// Open the engine for the configured bundle
    ///
    /// A failing `open` is logged, not returned: the store is still built and
    /// its operations report `StoreNotOpen`.
    pub fn open(config: Config, engine: Arc<dyn StorageEngine>, discovery: Arc<dyn DeviceDiscovery>) -> Self {
        let bundle_name = &config.store.bundle_name;
        match engine.open(bundle_name) {
            Ok(()) => info!(bundle = %bundle_name, "object store opened"),
            Err(e) => error!(bundle = %bundle_name, error = %e, "failed to open storage engine"),
        }

        Self {
            registry: Arc::new(RwLock::new(Registry {
                engine: Some(engine),
                objects: Vec::new(),
                watchers: HashMap::new(),
                status_notifier: None,
            })),
            discovery,
            cache: CacheBridge::new(None),
            config,
        }
    }

    /// Attach the remote cache service
    pub fn with_cache_proxy(self, proxy: Arc<dyn CacheProxy>) -> Self {
        self.cache.set_proxy(Some(proxy));
        self
    }

    /// Replace or remove the remote cache service
    pub fn set_cache_proxy(&self, proxy: Option<Arc<dyn CacheProxy>>) {
        self.cache.set_proxy(proxy);
    }

    pub fn bundle_name(&self) -> &str {
        &self.config.store.bundle_name
    }

    /// Create the object for `session_id` and start pulling its cached
    /// snapshot
    ///
    /// Creating a session that is already live fails with the engine's
    /// table error; the live handle is left as it was.
    pub async fn create_object(&self, session_id: &str) -> ObjectResult<Arc<DistributedObject>> {
        let mut registry = self.registry.write().await;
        let engine = registry.open_engine()?;

        engine.create_table(session_id).inspect_err(|e| {
            error!(session_id, error = %e, "create table failed");
        })?;

        let object = Arc::new(DistributedObject::new(session_id, engine.clone()));
        registry.objects.push(object.clone());
        drop(registry);

        metrics::record_counter(metrics::OBJECTS_CREATED, 1);
        info!(session_id, "object created");

        if let Err(e) = self.cache.resume(self.bundle_name(), session_id, engine) {
            warn!(session_id, error = %e, "resume from cache skipped");
        }

        Ok(object)
    }

    /// Delete the object and drop its watcher
    ///
    /// A watched session is unregistered from the engine first, so the
    /// engine holds no reference to the application's watcher afterwards.
    pub async fn delete_object(&self, session_id: &str) -> ObjectResult<()> {
        let mut registry = self.registry.write().await;
        let engine = registry.open_engine()?;

        if registry.watchers.contains_key(session_id) {
            engine
                .unregister_observer(session_id)
                .inspect_err(|e| error!(session_id, error = %e, "unregister observer failed"))?;
            registry.watchers.remove(session_id);
            debug!(session_id, "watcher released");
        }

        engine.delete_table(session_id).inspect_err(|e| {
            error!(session_id, error = %e, "delete table failed");
        })?;

        registry.objects.retain(|o| o.session_id() != session_id);

        metrics::record_counter(metrics::OBJECTS_DELETED, 1);
        info!(session_id, "object deleted");
        Ok(())
    }

    /// Look up the live object for `session_id`
    pub async fn get(&self, session_id: &str) -> ObjectResult<Arc<DistributedObject>> {
        let registry = self.registry.read().await;
        registry.find(session_id).cloned().ok_or_else(|| {
            debug!(session_id, "no such object");
            ObjectError::ObjectNotFound(session_id.to_string())
        })
    }

    /// Route change notifications for `object` to `watcher`
    pub async fn watch(&self, object: &Arc<DistributedObject>, watcher: Arc<dyn ObjectWatcher>) -> ObjectResult<()> {
        let mut registry = self.registry.write().await;
        if !registry.is_live(object) {
            error!(session_id = object.session_id(), "watch on a dead handle");
            return Err(ObjectError::NullObject);
        }
        let engine = registry.open_engine()?;

        let session_id = object.session_id();
        if registry.watchers.contains_key(session_id) {
            error!(session_id, "object already watched");
            return Err(ObjectError::AlreadyWatched(session_id.to_string()));
        }

        let proxy = Arc::new(WatcherProxy::new(session_id, watcher));
        engine
            .register_observer(session_id, proxy.clone())
            .inspect_err(|e| error!(session_id, error = %e, "register observer failed"))?;

        registry.watchers.insert(session_id.to_string(), proxy);
        info!(session_id, "watch object success");
        Ok(())
    }

    /// Stop routing change notifications for `object`
    pub async fn unwatch(&self, object: &Arc<DistributedObject>) -> ObjectResult<()> {
        let mut registry = self.registry.write().await;
        if !registry.is_live(object) {
            error!(session_id = object.session_id(), "unwatch on a dead handle");
            return Err(ObjectError::NullObject);
        }
        let engine = registry.open_engine()?;

        let session_id = object.session_id();
        engine
            .unregister_observer(session_id)
            .inspect_err(|e| error!(session_id, error = %e, "unregister observer failed"))?;

        registry.watchers.remove(session_id);
        info!(session_id, "unwatch object success");
        Ok(())
    }

    pub async fn is_watched(&self, session_id: &str) -> bool {
        self.registry.read().await.watchers.contains_key(session_id)
    }

    /// Replace the device online/offline notifier
    pub async fn set_status_notifier(&self, notifier: Arc<dyn StatusNotifier>) -> ObjectResult<()> {
        let mut registry = self.registry.write().await;
        let engine = registry.open_engine()?;

        let proxy = Arc::new(StatusNotifierProxy::new(Some(notifier)));
        engine
            .set_status_observer(proxy.clone())
            .inspect_err(|e| error!(error = %e, "set status notifier failed"))?;

        registry.status_notifier = Some(proxy);
        Ok(())
    }

    /// Hook for push-style sync; objects currently replicate on their own
    pub fn trigger_sync(&self) {
        debug!("trigger_sync is a no-op");
    }

    /// Pull every registered object from all known peers in the background
    ///
    /// `on_done` runs exactly once when the run ends, whether every object
    /// synced, the round budget ran out, or the run was cancelled. It says
    /// nothing about individual objects; use the returned handle for that.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime, since the run is spawned
    /// onto the current one.
    pub fn trigger_restore<F>(&self, on_done: F) -> RestoreHandle
    where
        F: FnOnce() + Send + 'static,
    {
        SyncCoordinator::new(self.registry.clone(), self.discovery.clone(), &self.config.restore).start(on_done)
    }

    /// Save the object's current items to the remote cache for `device_id`
    pub async fn save(&self, session_id: &str, device_id: &str) -> ObjectResult<()> {
        let engine = self.registry.read().await.open_engine()?;
        let data = engine
            .get_items(session_id)
            .inspect_err(|e| error!(session_id, error = %e, "reading items for save failed"))?;

        self.cache
            .save(self.bundle_name(), session_id, device_id, data, self.config.cache.timeout)
            .await
            .inspect(|_| info!(session_id, device_id, "object saved"))
    }

    /// Withdraw the object's saved snapshot
    pub async fn revoke_save(&self, session_id: &str) -> ObjectResult<()> {
        self.cache
            .revoke_save(self.bundle_name(), session_id, self.config.cache.timeout)
            .await
            .inspect(|_| info!(session_id, "save revoked"))
    }

    /// Close the engine and drop every handle; later calls report `NullStore`
    pub async fn close(&self) -> ObjectResult<()> {
        let mut registry = self.registry.write().await;
        let Some(engine) = registry.engine.take() else {
            return Ok(());
        };

        registry.objects.clear();
        registry.watchers.clear();
        registry.status_notifier = None;
        drop(registry);

        info!(bundle = %self.bundle_name(), "object store closed");
        engine.close()
    }
}
