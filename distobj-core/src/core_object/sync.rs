/*
    sync.rs - Restore coordinator

    Polling loop that pulls every registered object from all currently
    known peers:

      round k:  devices = discovery.device_list()
                for session not in {Syncing, Success}:
                    engine.sync_all_data(session, devices, on_complete)
                all Success?  -> done
                else sleep(round_interval)

    Fail is not terminal; the session is requested again next round. The
    run ends when every session reached Success, the round budget is spent,
    or the handle cancels it. The completion notifier fires exactly once in
    every case.
*/

use super::store::Registry;
use super::traits::{DeviceDiscovery, SyncCompletion, SyncRequest};
use super::types::{DbStatus, SyncStatus};
use crate::config::RestoreConfig;
use crate::metrics;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{oneshot, Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

type StatusMap = Arc<Mutex<HashMap<String, SyncStatus>>>;

/// How a restore run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreResult {
    /// Every tracked session reached Success
    Completed,
    /// The round budget ran out first
    Exhausted,
    /// Stopped through [`RestoreHandle::cancel`]
    Cancelled,
}

impl RestoreResult {
    fn as_str(&self) -> &'static str {
        match self {
            RestoreResult::Completed => "completed",
            RestoreResult::Exhausted => "exhausted",
            RestoreResult::Cancelled => "cancelled",
        }
    }
}

/// Final report of a restore run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreOutcome {
    pub result: RestoreResult,
    /// Rounds started
    pub rounds: u32,
    /// Last known status per tracked session, in registry order
    pub statuses: Vec<(String, SyncStatus)>,
}

impl RestoreOutcome {
    /// Sessions that did not reach Success
    pub fn unfinished(&self) -> Vec<&str> {
        self.statuses
            .iter()
            .filter(|(_, status)| *status != SyncStatus::Success)
            .map(|(id, _)| id.as_str())
            .collect()
    }
}

#[derive(Default)]
struct CancelSignal {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelSignal {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Handle to a running restore
///
/// Dropping the handle does not stop the run.
pub struct RestoreHandle {
    cancel: Arc<CancelSignal>,
    outcome: oneshot::Receiver<RestoreOutcome>,
    task: JoinHandle<()>,
}

impl RestoreHandle {
    /// Ask the run to stop before its next round
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the run to end
    pub async fn wait(self) -> Result<RestoreOutcome, oneshot::error::RecvError> {
        self.outcome.await
    }
}

/// Drives one restore run over the objects registered at start
pub struct SyncCoordinator {
    registry: Arc<RwLock<Registry>>,
    discovery: Arc<dyn DeviceDiscovery>,
    max_rounds: u32,
    round_interval: Duration,
}

impl SyncCoordinator {
    pub(crate) fn new(
        registry: Arc<RwLock<Registry>>,
        discovery: Arc<dyn DeviceDiscovery>,
        config: &RestoreConfig,
    ) -> Self {
        Self {
            registry,
            discovery,
            max_rounds: config.max_rounds,
            round_interval: config.round_interval,
        }
    }

    /// Spawn the run onto the current tokio runtime
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start<F>(self, on_done: F) -> RestoreHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let cancel = Arc::new(CancelSignal::default());
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let signal = cancel.clone();

        let task = tokio::spawn(async move {
            let outcome = self.run(&signal).await;
            info!(
                result = outcome.result.as_str(),
                rounds = outcome.rounds,
                unfinished = outcome.unfinished().len(),
                "restore finished"
            );
            metrics::record_outcome(metrics::RESTORE_COMPLETED, outcome.result.as_str());
            on_done();
            let _ = outcome_tx.send(outcome);
        });

        RestoreHandle {
            cancel,
            outcome: outcome_rx,
            task,
        }
    }

    async fn run(&self, cancel: &CancelSignal) -> RestoreOutcome {
        let tracked: Vec<String> = self.registry.read().await.session_ids();
        let statuses: StatusMap = Arc::new(Mutex::new(
            tracked.iter().map(|id| (id.clone(), SyncStatus::Start)).collect(),
        ));
        info!(sessions = tracked.len(), max_rounds = self.max_rounds, "restore started");

        let mut result = RestoreResult::Exhausted;
        let mut rounds = 0;

        for round in 0..self.max_rounds {
            if cancel.is_cancelled() {
                result = RestoreResult::Cancelled;
                break;
            }
            rounds = round + 1;
            metrics::record_counter(metrics::RESTORE_ROUNDS, 1);

            let device_ids: Vec<String> = self
                .discovery
                .device_list()
                .await
                .into_iter()
                .map(|d| d.device_id)
                .collect();

            if !self.issue_round(round, &device_ids, &statuses).await {
                break;
            }

            if Self::all_success(&statuses) {
                result = RestoreResult::Completed;
                break;
            }

            if rounds < self.max_rounds && self.pause(cancel).await {
                result = RestoreResult::Cancelled;
                break;
            }
        }

        let statuses = lock(&statuses);
        RestoreOutcome {
            result,
            rounds,
            statuses: tracked
                .iter()
                .filter_map(|id| statuses.get(id).map(|s| (id.clone(), *s)))
                .collect(),
        }
    }

    /// Request sync for every pending session; false if the store is gone
    async fn issue_round(&self, round: u32, device_ids: &[String], statuses: &StatusMap) -> bool {
        let registry = self.registry.read().await;
        let Some(engine) = registry.engine() else {
            warn!(round, "store closed during restore");
            return false;
        };

        lock(statuses).retain(|id, _| registry.contains(id));

        for session_id in registry.session_ids() {
            let previous = {
                let mut statuses = lock(statuses);
                match statuses.get(&session_id).copied() {
                    None | Some(SyncStatus::Syncing) | Some(SyncStatus::Success) => continue,
                    Some(previous) => {
                        statuses.insert(session_id.clone(), SyncStatus::Syncing);
                        previous
                    }
                }
            };

            trace!(round, session_id = %session_id, devices = device_ids.len(), "start sync");
            let on_complete = Self::completion(statuses.clone(), session_id.clone(), self.discovery.clone());

            match engine.sync_all_data(&session_id, device_ids, on_complete) {
                Ok(SyncRequest::Accepted) => {}
                Ok(SyncRequest::SingleDevice) => {
                    debug!(session_id = %session_id, "single device, nothing to pull");
                    lock(statuses).insert(session_id, SyncStatus::Success);
                }
                Err(e) => {
                    warn!(round, session_id = %session_id, error = %e, "sync request refused");
                    lock(statuses).insert(session_id, previous);
                }
            }
        }

        true
    }

    fn completion(statuses: StatusMap, session_id: String, discovery: Arc<dyn DeviceDiscovery>) -> SyncCompletion {
        Box::new(move |devices: HashMap<String, DbStatus>| {
            let mut result = SyncStatus::Success;
            for (device_id, status) in &devices {
                if !status.is_ok() {
                    result = SyncStatus::Fail;
                    let network_id = discovery.resolve_node_id(device_id).unwrap_or_default();
                    warn!(
                        session_id = %session_id,
                        network_id = %network_id,
                        ?status,
                        "pull data failed"
                    );
                }
            }
            debug!(session_id = %session_id, %result, "pull data finished");

            if let Some(slot) = lock(&statuses).get_mut(&session_id) {
                *slot = result;
            }
        })
    }

    fn all_success(statuses: &StatusMap) -> bool {
        let statuses = lock(statuses);
        match statuses.iter().find(|(_, s)| **s != SyncStatus::Success) {
            Some((id, status)) => {
                trace!(session_id = %id, %status, "not ready");
                false
            }
            None => true,
        }
    }

    /// Sleep one interval; true if cancelled meanwhile
    async fn pause(&self, cancel: &CancelSignal) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(self.round_interval) => cancel.is_cancelled(),
            _ = cancel.notify.notified() => true,
        }
    }
}

fn lock(statuses: &StatusMap) -> MutexGuard<'_, HashMap<String, SyncStatus>> {
    statuses.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_object::adapters::SyncBehavior;
    use crate::test_utils::{test_config, TestStore};
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = count.clone();
        (count, move || {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    async fn wait_for_request(t: &TestStore, session_id: &str) {
        while t.engine.sync_requests(session_id) == 0 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_single_device_completes_in_first_round() {
        let t = TestStore::single_device();
        t.store.create_object("a").await.unwrap();
        t.store.create_object("b").await.unwrap();

        let (done, on_done) = counter();
        let outcome = t.store.trigger_restore(on_done).wait().await.unwrap();

        assert_eq!(outcome.result, RestoreResult::Completed);
        assert_eq!(outcome.rounds, 1);
        assert_eq!(
            outcome.statuses,
            vec![
                ("a".to_string(), SyncStatus::Success),
                ("b".to_string(), SyncStatus::Success)
            ]
        );
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_registry_completes() {
        let t = TestStore::with_peers(2);
        let outcome = t.store.trigger_restore(|| {}).wait().await.unwrap();
        assert_eq!(outcome.result, RestoreResult::Completed);
        assert!(outcome.statuses.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_pull_is_retried() {
        let t = TestStore::with_peers(2);
        t.store.create_object("a").await.unwrap();
        t.engine.set_sync_behavior(SyncBehavior::FailFirst(2));

        let outcome = t.store.trigger_restore(|| {}).wait().await.unwrap();

        assert_eq!(outcome.result, RestoreResult::Completed);
        assert_eq!(outcome.rounds, 3);
        assert_eq!(t.engine.sync_requests("a"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_engine_exhausts_budget() {
        let t = TestStore::new(test_config(4), crate::test_utils::peers(1));
        t.store.create_object("a").await.unwrap();
        t.engine.set_sync_behavior(SyncBehavior::Silent);

        let (done, on_done) = counter();
        let outcome = t.store.trigger_restore(on_done).wait().await.unwrap();

        assert_eq!(outcome.result, RestoreResult::Exhausted);
        assert_eq!(outcome.rounds, 4);
        assert_eq!(outcome.unfinished(), vec!["a"]);
        // a session already syncing is not asked again
        assert_eq!(t.engine.sync_requests("a"), 1);
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refused_request_is_retried_until_budget() {
        let t = TestStore::new(test_config(3), crate::test_utils::peers(1));
        t.store.create_object("a").await.unwrap();
        t.engine.set_sync_behavior(SyncBehavior::Reject(99));

        let outcome = t.store.trigger_restore(|| {}).wait().await.unwrap();

        assert_eq!(outcome.result, RestoreResult::Exhausted);
        assert_eq!(outcome.statuses, vec![("a".to_string(), SyncStatus::Start)]);
        assert_eq!(t.engine.sync_requests("a"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_reports_fail() {
        let t = TestStore::new(test_config(2), crate::test_utils::peers(1));
        t.store.create_object("a").await.unwrap();
        t.store.create_object("b").await.unwrap();
        t.engine
            .set_session_sync_behavior("b", SyncBehavior::AllFail(DbStatus::TimeOut));

        let outcome = t.store.trigger_restore(|| {}).wait().await.unwrap();

        assert_eq!(outcome.result, RestoreResult::Exhausted);
        assert_eq!(
            outcome.statuses,
            vec![
                ("a".to_string(), SyncStatus::Success),
                ("b".to_string(), SyncStatus::Fail)
            ]
        );
        assert_eq!(t.engine.sync_requests("a"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_completion_finishes_syncing_session() {
        let mut config = test_config(10);
        config.restore.round_interval = Duration::from_secs(60);
        let t = TestStore::new(config, crate::test_utils::peers(2));
        t.store.create_object("a").await.unwrap();
        t.engine.set_sync_behavior(SyncBehavior::Silent);

        let handle = t.store.trigger_restore(|| {});
        wait_for_request(&t, "a").await;
        assert_eq!(t.engine.pending_syncs(), 1);

        let engine = t.engine.clone();
        let answered = tokio::spawn(async move { engine.complete_pending(DbStatus::Ok) })
            .await
            .unwrap();
        assert_eq!(answered, 1);

        let outcome = handle.wait().await.unwrap();
        assert_eq!(outcome.result, RestoreResult::Completed);
        assert_eq!(outcome.rounds, 2);
        assert_eq!(outcome.statuses, vec![("a".to_string(), SyncStatus::Success)]);
        assert_eq!(t.engine.sync_requests("a"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_failure_is_requested_again() {
        let mut config = test_config(10);
        config.restore.round_interval = Duration::from_secs(60);
        let t = TestStore::new(config, crate::test_utils::peers(1));
        t.store.create_object("a").await.unwrap();
        t.engine.set_sync_behavior(SyncBehavior::Silent);

        let handle = t.store.trigger_restore(|| {});
        wait_for_request(&t, "a").await;

        let engine = t.engine.clone();
        tokio::spawn(async move {
            engine.complete_pending(DbStatus::DbError);
            engine.set_sync_behavior(SyncBehavior::AllOk);
        })
        .await
        .unwrap();

        let outcome = handle.wait().await.unwrap();
        assert_eq!(outcome.result, RestoreResult::Completed);
        assert_eq!(outcome.rounds, 2);
        assert_eq!(t.engine.sync_requests("a"), 2);
        assert_eq!(t.engine.pending_syncs(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_ends_with_session_still_syncing() {
        let mut config = test_config(1);
        config.restore.round_interval = Duration::from_secs(60);
        let t = TestStore::new(config, crate::test_utils::peers(1));
        t.store.create_object("a").await.unwrap();
        t.engine.set_sync_behavior(SyncBehavior::Silent);

        let handle = t.store.trigger_restore(|| {});
        let outcome = handle.wait().await.unwrap();
        assert_eq!(outcome.statuses, vec![("a".to_string(), SyncStatus::Syncing)]);

        // a completion arriving after the run ended is harmless
        assert_eq!(t.engine.complete_pending(DbStatus::DbError), 1);
    }

    #[tokio::test]
    async fn test_cancel_stops_between_rounds() {
        let mut config = test_config(100);
        config.restore.round_interval = Duration::from_secs(3600);
        let t = TestStore::new(config, crate::test_utils::peers(1));
        t.store.create_object("a").await.unwrap();
        t.engine.set_sync_behavior(SyncBehavior::Silent);

        let (done, on_done) = counter();
        let handle = t.store.trigger_restore(on_done);
        wait_for_request(&t, "a").await;
        handle.cancel();

        let outcome = tokio::time::timeout(Duration::from_secs(5), handle.wait())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.result, RestoreResult::Cancelled);
        assert_eq!(outcome.rounds, 1);
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deleted_session_leaves_tracking() {
        let mut config = test_config(10);
        config.restore.round_interval = Duration::from_secs(3600);
        let t = TestStore::new(config, crate::test_utils::peers(1));
        t.store.create_object("a").await.unwrap();
        t.store.create_object("b").await.unwrap();
        t.engine.set_session_sync_behavior("b", SyncBehavior::Silent);

        let handle = t.store.trigger_restore(|| {});
        wait_for_request(&t, "b").await;
        t.store.delete_object("b").await.unwrap();

        let outcome = handle.wait().await.unwrap();
        assert_eq!(outcome.result, RestoreResult::Completed);
        assert_eq!(outcome.statuses, vec![("a".to_string(), SyncStatus::Success)]);
    }

    #[tokio::test]
    async fn test_closed_store_ends_run() {
        let t = TestStore::with_peers(1);
        t.store.create_object("a").await.unwrap();
        t.store.close().await.unwrap();

        let (done, on_done) = counter();
        let outcome = t.store.trigger_restore(on_done).wait().await.unwrap();

        assert_eq!(outcome.result, RestoreResult::Exhausted);
        assert!(outcome.statuses.is_empty());
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }
}
