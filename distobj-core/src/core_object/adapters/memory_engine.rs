//! In-memory storage engine

use crate::core_object::errors::{ObjectError, ObjectResult};
use crate::core_object::traits::{ChangeObserver, StatusObserver, StorageEngine, SyncCompletion, SyncRequest};
use crate::core_object::types::{DbStatus, ObjectData, OnlineStatus};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

pub const ERR_TABLE_EXISTS: u32 = 21;
pub const ERR_TABLE_NOT_FOUND: u32 = 22;
pub const ERR_KEY_NOT_FOUND: u32 = 23;

/// How `sync_all_data` answers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncBehavior {
    /// Every device reports OK, inline
    AllOk,
    /// Every device reports the given status, inline
    AllFail(DbStatus),
    /// The first `n` requests fail on every device, later ones succeed
    FailFirst(u32),
    /// Accept the request and hold the completion until
    /// [`MemoryEngine::complete_pending`]
    Silent,
    /// Refuse the request with an engine error code
    Reject(u32),
}

/// Completion held back by [`SyncBehavior::Silent`]
struct PendingSync {
    session_id: String,
    device_ids: Vec<String>,
    on_complete: SyncCompletion,
}

struct EngineState {
    opened: bool,
    bundle_name: Option<String>,
    tables: HashMap<String, ObjectData>,
    observers: HashMap<String, Arc<dyn ChangeObserver>>,
    status_observer: Option<Arc<dyn StatusObserver>>,
    default_behavior: SyncBehavior,
    session_behavior: HashMap<String, SyncBehavior>,
    failures_seen: HashMap<String, u32>,
    sync_requests: HashMap<String, u32>,
    pending: Vec<PendingSync>,
}

/// Storage engine keeping tables in process memory
pub struct MemoryEngine {
    state: Mutex<EngineState>,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(EngineState {
                opened: false,
                bundle_name: None,
                tables: HashMap::new(),
                observers: HashMap::new(),
                status_observer: None,
                default_behavior: SyncBehavior::AllOk,
                session_behavior: HashMap::new(),
                failures_seen: HashMap::new(),
                sync_requests: HashMap::new(),
                pending: Vec::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Behaviour for sessions without an override
    pub fn set_sync_behavior(&self, behavior: SyncBehavior) {
        self.state().default_behavior = behavior;
    }

    /// Behaviour for one session
    pub fn set_session_sync_behavior(&self, session_id: &str, behavior: SyncBehavior) {
        self.state().session_behavior.insert(session_id.to_string(), behavior);
    }

    /// Number of `sync_all_data` calls seen for `session_id`
    pub fn sync_requests(&self, session_id: &str) -> u32 {
        self.state().sync_requests.get(session_id).copied().unwrap_or(0)
    }

    pub fn has_table(&self, session_id: &str) -> bool {
        self.state().tables.contains_key(session_id)
    }

    pub fn has_observer(&self, session_id: &str) -> bool {
        self.state().observers.contains_key(session_id)
    }

    pub fn bundle_name(&self) -> Option<String> {
        self.state().bundle_name.clone()
    }

    /// Simulate a replicated change arriving for `session_id`
    pub fn deliver_change(&self, session_id: &str, changed_keys: &[String]) {
        let observer = self.state().observers.get(session_id).cloned();
        if let Some(observer) = observer {
            observer.on_changed(session_id, changed_keys);
        }
    }

    /// Simulate a peer going online or offline
    pub fn deliver_status(&self, session_id: &str, network_id: &str, online_status: OnlineStatus) {
        let observer = self.state().status_observer.clone();
        if let Some(observer) = observer {
            observer.on_status(session_id, network_id, online_status.as_str());
        }
    }

    /// Number of held completions
    pub fn pending_syncs(&self) -> usize {
        self.state().pending.len()
    }

    /// Answer every held completion, reporting `status` for each device
    ///
    /// Completions run on the caller's thread after the engine lock is
    /// released. Returns how many were answered.
    pub fn complete_pending(&self, status: DbStatus) -> usize {
        let pending = std::mem::take(&mut self.state().pending);
        let count = pending.len();
        for held in pending {
            debug!(session_id = %held.session_id, ?status, "completing held sync");
            let results = held.device_ids.into_iter().map(|id| (id, status)).collect();
            (held.on_complete)(results);
        }
        count
    }

    fn check_open(state: &EngineState) -> ObjectResult<()> {
        if state.opened {
            Ok(())
        } else {
            Err(ObjectError::StoreNotOpen)
        }
    }

    fn table_missing(session_id: &str) -> ObjectError {
        debug!(session_id, "table not found");
        ObjectError::Engine { code: ERR_TABLE_NOT_FOUND }
    }
}

impl StorageEngine for MemoryEngine {
    fn open(&self, bundle_name: &str) -> ObjectResult<()> {
        let mut state = self.state();
        state.opened = true;
        state.bundle_name = Some(bundle_name.to_string());
        Ok(())
    }

    fn close(&self) -> ObjectResult<()> {
        let mut state = self.state();
        state.opened = false;
        state.observers.clear();
        state.status_observer = None;
        Ok(())
    }

    fn is_opened(&self) -> bool {
        self.state().opened
    }

    fn create_table(&self, session_id: &str) -> ObjectResult<()> {
        let mut state = self.state();
        Self::check_open(&state)?;
        if state.tables.contains_key(session_id) {
            return Err(ObjectError::Engine { code: ERR_TABLE_EXISTS });
        }
        state.tables.insert(session_id.to_string(), ObjectData::new());
        Ok(())
    }

    fn delete_table(&self, session_id: &str) -> ObjectResult<()> {
        let mut state = self.state();
        Self::check_open(&state)?;
        state.observers.remove(session_id);
        state
            .tables
            .remove(session_id)
            .map(|_| ())
            .ok_or_else(|| Self::table_missing(session_id))
    }

    fn update_item(&self, session_id: &str, key: &str, value: Vec<u8>) -> ObjectResult<()> {
        let mut state = self.state();
        Self::check_open(&state)?;
        let table = state
            .tables
            .get_mut(session_id)
            .ok_or_else(|| Self::table_missing(session_id))?;
        table.insert(key.to_string(), value);
        Ok(())
    }

    fn update_items(&self, session_id: &str, items: ObjectData) -> ObjectResult<()> {
        let mut state = self.state();
        Self::check_open(&state)?;
        let table = state
            .tables
            .get_mut(session_id)
            .ok_or_else(|| Self::table_missing(session_id))?;
        table.extend(items);
        Ok(())
    }

    fn get_item(&self, session_id: &str, key: &str) -> ObjectResult<Vec<u8>> {
        let state = self.state();
        Self::check_open(&state)?;
        let table = state
            .tables
            .get(session_id)
            .ok_or_else(|| Self::table_missing(session_id))?;
        table
            .get(key)
            .cloned()
            .ok_or(ObjectError::Engine { code: ERR_KEY_NOT_FOUND })
    }

    fn get_items(&self, session_id: &str) -> ObjectResult<ObjectData> {
        let state = self.state();
        Self::check_open(&state)?;
        state
            .tables
            .get(session_id)
            .cloned()
            .ok_or_else(|| Self::table_missing(session_id))
    }

    fn register_observer(&self, session_id: &str, observer: Arc<dyn ChangeObserver>) -> ObjectResult<()> {
        let mut state = self.state();
        Self::check_open(&state)?;
        if !state.tables.contains_key(session_id) {
            return Err(Self::table_missing(session_id));
        }
        state.observers.insert(session_id.to_string(), observer);
        Ok(())
    }

    fn unregister_observer(&self, session_id: &str) -> ObjectResult<()> {
        let mut state = self.state();
        Self::check_open(&state)?;
        state.observers.remove(session_id);
        Ok(())
    }

    fn set_status_observer(&self, observer: Arc<dyn StatusObserver>) -> ObjectResult<()> {
        let mut state = self.state();
        Self::check_open(&state)?;
        state.status_observer = Some(observer);
        Ok(())
    }

    fn sync_all_data(
        &self,
        session_id: &str,
        device_ids: &[String],
        on_complete: SyncCompletion,
    ) -> ObjectResult<SyncRequest> {
        let status = {
            let mut state = self.state();
            Self::check_open(&state)?;
            if !state.tables.contains_key(session_id) {
                return Err(Self::table_missing(session_id));
            }
            *state.sync_requests.entry(session_id.to_string()).or_insert(0) += 1;

            if device_ids.is_empty() {
                return Ok(SyncRequest::SingleDevice);
            }

            let behavior = state
                .session_behavior
                .get(session_id)
                .cloned()
                .unwrap_or_else(|| state.default_behavior.clone());

            match behavior {
                SyncBehavior::AllOk => DbStatus::Ok,
                SyncBehavior::AllFail(status) => status,
                SyncBehavior::FailFirst(n) => {
                    let seen = state.failures_seen.entry(session_id.to_string()).or_insert(0);
                    if *seen < n {
                        *seen += 1;
                        DbStatus::DbError
                    } else {
                        DbStatus::Ok
                    }
                }
                SyncBehavior::Silent => {
                    state.pending.push(PendingSync {
                        session_id: session_id.to_string(),
                        device_ids: device_ids.to_vec(),
                        on_complete,
                    });
                    return Ok(SyncRequest::Accepted);
                }
                SyncBehavior::Reject(code) => return Err(ObjectError::Engine { code }),
            }
        };

        let results = device_ids.iter().map(|id| (id.clone(), status)).collect();
        on_complete(results);
        Ok(SyncRequest::Accepted)
    }
}
