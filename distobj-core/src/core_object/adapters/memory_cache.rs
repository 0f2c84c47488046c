//! In-memory remote cache service

use crate::core_object::errors::ObjectResult;
use crate::core_object::traits::{CacheProxy, RetrieveCallback, RevokeCallback, SaveCallback};
use crate::core_object::types::ObjectData;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// How `save` answers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveResponse {
    /// Store the snapshot and report 0 for the target device
    Ok,
    /// Report the given code for the target device
    Code(i32),
    /// Report exactly this device map, ignoring the target
    Devices(Vec<(String, i32)>),
    /// Keep the callback and never answer
    Silent,
    /// Drop the callback without answering
    Dropped,
}

#[derive(Default)]
struct CacheState {
    snapshots: HashMap<(String, String), ObjectData>,
    save_response: Option<SaveResponse>,
    revoke_code: i32,
    delay: Option<Duration>,
    held: Vec<SaveCallback>,
}

/// Remote cache service keeping snapshots in process memory
///
/// With a delay set, answers are delivered from a spawned task, which lets
/// tests observe how many saves overlap.
#[derive(Default)]
pub struct MemoryCacheProxy {
    state: Mutex<CacheState>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    save_calls: AtomicUsize,
}

impl MemoryCacheProxy {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_save_response(&self, response: SaveResponse) {
        self.state().save_response = Some(response);
    }

    pub fn set_revoke_code(&self, code: i32) {
        self.state().revoke_code = code;
    }

    /// Answer after `delay` instead of inline
    pub fn set_delay(&self, delay: Duration) {
        self.state().delay = Some(delay);
    }

    /// Pre-populate a snapshot, as if another device had saved it
    pub fn seed(&self, bundle_name: &str, session_id: &str, data: ObjectData) {
        self.state()
            .snapshots
            .insert((bundle_name.to_string(), session_id.to_string()), data);
    }

    pub fn snapshot(&self, bundle_name: &str, session_id: &str) -> Option<ObjectData> {
        self.state()
            .snapshots
            .get(&(bundle_name.to_string(), session_id.to_string()))
            .cloned()
    }

    /// Highest number of saves observed outstanding at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    fn answer(&self, delay: Option<Duration>, callback: SaveCallback, results: HashMap<String, i32>) {
        let in_flight = self.in_flight.clone();
        match (delay, tokio::runtime::Handle::try_current()) {
            (Some(delay), Ok(handle)) => {
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    callback(results);
                });
            }
            _ => {
                in_flight.fetch_sub(1, Ordering::SeqCst);
                callback(results);
            }
        }
    }
}

impl CacheProxy for MemoryCacheProxy {
    fn save(
        &self,
        bundle_name: &str,
        session_id: &str,
        device_id: &str,
        data: ObjectData,
        callback: SaveCallback,
    ) -> ObjectResult<()> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let (response, delay) = {
            let mut state = self.state();
            let response = state.save_response.clone().unwrap_or(SaveResponse::Ok);
            if response == SaveResponse::Ok {
                state
                    .snapshots
                    .insert((bundle_name.to_string(), session_id.to_string()), data);
            }
            (response, state.delay)
        };

        let results = match response {
            SaveResponse::Ok => HashMap::from([(device_id.to_string(), 0)]),
            SaveResponse::Code(code) => HashMap::from([(device_id.to_string(), code)]),
            SaveResponse::Devices(devices) => devices.into_iter().collect(),
            SaveResponse::Silent => {
                self.state().held.push(callback);
                return Ok(());
            }
            SaveResponse::Dropped => {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                drop(callback);
                return Ok(());
            }
        };

        self.answer(delay, callback, results);
        Ok(())
    }

    fn revoke_save(&self, bundle_name: &str, session_id: &str, callback: RevokeCallback) -> ObjectResult<()> {
        let code = {
            let mut state = self.state();
            if state.revoke_code == 0 {
                state
                    .snapshots
                    .remove(&(bundle_name.to_string(), session_id.to_string()));
            }
            state.revoke_code
        };
        callback(code);
        Ok(())
    }

    fn retrieve(&self, bundle_name: &str, session_id: &str, callback: RetrieveCallback) -> ObjectResult<()> {
        let data = self.snapshot(bundle_name, session_id).unwrap_or_default();
        callback(data);
        Ok(())
    }
}
