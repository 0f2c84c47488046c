/*
    cache.rs - Remote cache bridge

    The remote cache service answers through callbacks. The bridge turns a
    save or revoke into a single awaited result:

      caller ──lock──► proxy.save(.., callback) ──► remote
         │                                            │
         └──── await oneshot (bounded by timeout) ◄───┘ callback(result)

    One save/revoke is in flight per bridge at a time, across all sessions.
    Resume is not serialized: its callback writes straight into the engine.
*/

use super::errors::{ObjectError, ObjectResult};
use super::traits::{CacheProxy, StorageEngine};
use super::types::ObjectData;
use crate::metrics::{self, Timer};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, error, info, warn};

const SUCCESS_CODE: i32 = 0;

/// Converts callback-based cache operations into awaited results
pub struct CacheBridge {
    proxy: RwLock<Option<Arc<dyn CacheProxy>>>,
    in_flight: Mutex<()>,
}

impl CacheBridge {
    pub fn new(proxy: Option<Arc<dyn CacheProxy>>) -> Self {
        Self {
            proxy: RwLock::new(proxy),
            in_flight: Mutex::new(()),
        }
    }

    /// Swap the remote service (None marks it unreachable)
    pub fn set_proxy(&self, proxy: Option<Arc<dyn CacheProxy>>) {
        match self.proxy.write() {
            Ok(mut slot) => *slot = proxy,
            Err(poisoned) => *poisoned.into_inner() = proxy,
        }
    }

    fn proxy(&self) -> ObjectResult<Arc<dyn CacheProxy>> {
        let slot = match self.proxy.read() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        slot.clone().ok_or_else(|| {
            error!("cache proxy is not available");
            ObjectError::NullProxy
        })
    }

    /// Persist `data` for `session_id` on `device_id`
    pub async fn save(
        &self,
        bundle_name: &str,
        session_id: &str,
        device_id: &str,
        data: ObjectData,
        timeout: Duration,
    ) -> ObjectResult<()> {
        let proxy = self.proxy()?;
        let _guard = self.in_flight.lock().await;

        let (tx, rx) = oneshot::channel();
        let target = device_id.to_string();
        let callback = Box::new(move |results: HashMap<String, i32>| {
            let status = match results.get(&target) {
                Some(code) => Ok(*code),
                None => Err(ObjectError::RemoteFetchFailed(format!(
                    "no result for device {}",
                    target
                ))),
            };
            let _ = tx.send(status);
        });

        metrics::record_counter(metrics::CACHE_SAVE, 1);
        proxy
            .save(bundle_name, session_id, device_id, data, callback)
            .inspect_err(|e| error!(session_id, device_id, error = %e, "cache save request failed"))?;

        debug!(session_id, device_id, "waiting for cache save");
        let code = Self::wait(rx, timeout, "cache save").await?;
        debug!(session_id, device_id, code, "cache save answered");
        Self::check(code, "save")
    }

    /// Withdraw the saved snapshot for `session_id`
    pub async fn revoke_save(&self, bundle_name: &str, session_id: &str, timeout: Duration) -> ObjectResult<()> {
        let proxy = self.proxy()?;
        let _guard = self.in_flight.lock().await;

        let (tx, rx) = oneshot::channel();
        let callback = Box::new(move |code: i32| {
            let _ = tx.send(Ok(code));
        });

        metrics::record_counter(metrics::CACHE_REVOKE, 1);
        proxy
            .revoke_save(bundle_name, session_id, callback)
            .inspect_err(|e| error!(session_id, error = %e, "cache revoke request failed"))?;

        debug!(session_id, "waiting for cache revoke");
        let code = Self::wait(rx, timeout, "cache revoke").await?;
        debug!(session_id, code, "cache revoke answered");
        Self::check(code, "revoke")
    }

    /// Pull the saved snapshot for `session_id` into `engine`
    ///
    /// Returns once the request is issued; the items land whenever the
    /// remote answers.
    pub fn resume(&self, bundle_name: &str, session_id: &str, engine: Arc<dyn StorageEngine>) -> ObjectResult<()> {
        let proxy = self.proxy()?;
        let session = session_id.to_string();
        let callback = Box::new(move |items: ObjectData| {
            if items.is_empty() {
                info!(session_id = %session, "retrieve empty");
                return;
            }
            info!(session_id = %session, items = items.len(), "retrieve success");
            if let Err(e) = engine.update_items(&session, items) {
                error!(session_id = %session, error = %e, "applying retrieved items failed");
            }
        });

        proxy
            .retrieve(bundle_name, session_id, callback)
            .inspect_err(|e| error!(session_id, error = %e, "cache retrieve request failed"))
    }

    async fn wait(
        rx: oneshot::Receiver<ObjectResult<i32>>,
        timeout: Duration,
        what: &str,
    ) -> ObjectResult<i32> {
        let timer = Timer::new(metrics::CACHE_WAIT_MS);
        let outcome = tokio::time::timeout(timeout, rx).await;
        timer.stop();

        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                warn!("{} callback dropped without answering", what);
                metrics::record_counter(metrics::CACHE_FAILED, 1);
                Err(ObjectError::RemoteFetchFailed(format!("{} callback dropped", what)))
            }
            Err(_) => {
                warn!(?timeout, "{} timed out", what);
                metrics::record_counter(metrics::CACHE_FAILED, 1);
                Err(ObjectError::Timeout(what.to_string()))
            }
        }
    }

    fn check(code: i32, op: &str) -> ObjectResult<()> {
        if code == SUCCESS_CODE {
            Ok(())
        } else {
            metrics::record_counter(metrics::CACHE_FAILED, 1);
            Err(ObjectError::RemoteFetchFailed(format!("{} returned {}", op, code)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_object::adapters::{MemoryCacheProxy, MemoryEngine, SaveResponse};
    use crate::core_object::traits::StorageEngine;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn items(pairs: &[(&str, &str)]) -> ObjectData {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.as_bytes().to_vec()))
            .collect()
    }

    #[tokio::test]
    async fn test_save_success() {
        let proxy = Arc::new(MemoryCacheProxy::new());
        let bridge = CacheBridge::new(Some(proxy.clone()));

        bridge
            .save("bundle", "s1", "dev-1", items(&[("k", "v")]), TIMEOUT)
            .await
            .unwrap();

        assert_eq!(proxy.snapshot("bundle", "s1"), Some(items(&[("k", "v")])));
    }

    #[tokio::test]
    async fn test_save_absent_device_is_remote_fetch_failed() {
        let proxy = Arc::new(MemoryCacheProxy::new());
        proxy.set_save_response(SaveResponse::Devices(vec![("other".to_string(), 0)]));
        let bridge = CacheBridge::new(Some(proxy));

        let err = bridge
            .save("bundle", "s1", "dev-1", ObjectData::new(), TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, ObjectError::RemoteFetchFailed(_)));
    }

    #[tokio::test]
    async fn test_save_non_zero_code_is_remote_fetch_failed() {
        let proxy = Arc::new(MemoryCacheProxy::new());
        proxy.set_save_response(SaveResponse::Code(13));
        let bridge = CacheBridge::new(Some(proxy));

        let err = bridge
            .save("bundle", "s1", "dev-1", ObjectData::new(), TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, ObjectError::RemoteFetchFailed(_)));
    }

    #[tokio::test]
    async fn test_missing_proxy_fails_fast() {
        let bridge = CacheBridge::new(None);
        assert_eq!(
            bridge.save("b", "s", "d", ObjectData::new(), TIMEOUT).await,
            Err(ObjectError::NullProxy)
        );
        assert_eq!(bridge.revoke_save("b", "s", TIMEOUT).await, Err(ObjectError::NullProxy));

        let engine: Arc<dyn StorageEngine> = Arc::new(MemoryEngine::new());
        assert_eq!(bridge.resume("b", "s", engine), Err(ObjectError::NullProxy));
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_times_out_when_callback_never_fires() {
        let proxy = Arc::new(MemoryCacheProxy::new());
        proxy.set_save_response(SaveResponse::Silent);
        let bridge = CacheBridge::new(Some(proxy));

        let err = bridge
            .save("b", "s", "d", ObjectData::new(), Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, ObjectError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_save_dropped_callback() {
        let proxy = Arc::new(MemoryCacheProxy::new());
        proxy.set_save_response(SaveResponse::Dropped);
        let bridge = CacheBridge::new(Some(proxy));

        let err = bridge
            .save("b", "s", "d", ObjectData::new(), TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, ObjectError::RemoteFetchFailed(_)));
    }

    #[tokio::test]
    async fn test_revoke_save() {
        let proxy = Arc::new(MemoryCacheProxy::new());
        let bridge = CacheBridge::new(Some(proxy.clone()));

        bridge.save("b", "s1", "d", items(&[("k", "v")]), TIMEOUT).await.unwrap();
        bridge.revoke_save("b", "s1", TIMEOUT).await.unwrap();
        assert_eq!(proxy.snapshot("b", "s1"), None);

        proxy.set_revoke_code(5);
        assert!(matches!(
            bridge.revoke_save("b", "s1", TIMEOUT).await,
            Err(ObjectError::RemoteFetchFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_resume_applies_items_and_ignores_empty() {
        let proxy = Arc::new(MemoryCacheProxy::new());
        proxy.seed("b", "s1", items(&[("name", "panda")]));
        let bridge = CacheBridge::new(Some(proxy));

        let engine = Arc::new(MemoryEngine::new());
        engine.open("b").unwrap();
        engine.create_table("s1").unwrap();
        engine.create_table("s2").unwrap();

        bridge.resume("b", "s1", engine.clone()).unwrap();
        bridge.resume("b", "s2", engine.clone()).unwrap();

        assert_eq!(engine.get_item("s1", "name").unwrap(), b"panda".to_vec());
        assert!(engine.get_items("s2").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_proxy_can_be_swapped() {
        let bridge = CacheBridge::new(None);
        bridge.set_proxy(Some(Arc::new(MemoryCacheProxy::new())));
        assert!(bridge.save("b", "s", "d", ObjectData::new(), TIMEOUT).await.is_ok());

        bridge.set_proxy(None);
        assert_eq!(bridge.revoke_save("b", "s", TIMEOUT).await, Err(ObjectError::NullProxy));
    }
}
