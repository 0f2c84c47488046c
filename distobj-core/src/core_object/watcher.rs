/*
    watcher.rs - Change and status multiplexing

    The engine never holds the application's watcher directly. It holds a
    proxy, and the proxy holds the watcher. The store unregisters the proxy
    from the engine on unwatch and on delete, which drops the last
    reference to the application's watcher.
*/

use super::traits::{ChangeObserver, StatusObserver};
use std::sync::Arc;
use tracing::trace;

/// Application callback for key-level changes to one object
pub trait ObjectWatcher: Send + Sync {
    fn on_changed(&self, session_id: &str, changed_keys: &[String]);
}

impl<F> ObjectWatcher for F
where
    F: Fn(&str, &[String]) + Send + Sync,
{
    fn on_changed(&self, session_id: &str, changed_keys: &[String]) {
        self(session_id, changed_keys)
    }
}

/// Application callback for peer online/offline transitions
pub trait StatusNotifier: Send + Sync {
    fn on_changed(&self, session_id: &str, network_id: &str, online_status: &str);
}

impl<F> StatusNotifier for F
where
    F: Fn(&str, &str, &str) + Send + Sync,
{
    fn on_changed(&self, session_id: &str, network_id: &str, online_status: &str) {
        self(session_id, network_id, online_status)
    }
}

/// Adapter registered with the engine for one watched session
pub struct WatcherProxy {
    session_id: String,
    watcher: Arc<dyn ObjectWatcher>,
}

impl WatcherProxy {
    pub fn new(session_id: impl Into<String>, watcher: Arc<dyn ObjectWatcher>) -> Self {
        Self {
            session_id: session_id.into(),
            watcher,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl ChangeObserver for WatcherProxy {
    fn on_changed(&self, session_id: &str, changed_keys: &[String]) {
        trace!(session_id, keys = changed_keys.len(), "forwarding change");
        self.watcher.on_changed(session_id, changed_keys);
    }
}

/// Adapter registered with the engine for online/offline transitions
pub struct StatusNotifierProxy {
    notifier: Option<Arc<dyn StatusNotifier>>,
}

impl StatusNotifierProxy {
    pub fn new(notifier: Option<Arc<dyn StatusNotifier>>) -> Self {
        Self { notifier }
    }
}

impl StatusObserver for StatusNotifierProxy {
    fn on_status(&self, session_id: &str, network_id: &str, online_status: &str) {
        if let Some(notifier) = &self.notifier {
            notifier.on_changed(session_id, network_id, online_status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_watcher_proxy_forwards_each_notification() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let watcher: Arc<dyn ObjectWatcher> = Arc::new(move |session: &str, keys: &[String]| {
            sink.lock().unwrap().push((session.to_string(), keys.to_vec()));
        });

        let proxy = WatcherProxy::new("s1", watcher);
        proxy.on_changed("s1", &["a".to_string()]);
        proxy.on_changed("s1", &["b".to_string(), "c".to_string()]);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], ("s1".to_string(), vec!["a".to_string()]));
        assert_eq!(seen[1].1, vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_status_proxy_without_notifier_is_silent() {
        let proxy = StatusNotifierProxy::new(None);
        proxy.on_status("s1", "net-1", "online");
    }

    #[test]
    fn test_status_proxy_forwards() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let notifier: Arc<dyn StatusNotifier> = Arc::new(move |s: &str, n: &str, st: &str| {
            sink.lock().unwrap().push(format!("{s}/{n}/{st}"));
        });

        StatusNotifierProxy::new(Some(notifier)).on_status("s1", "net-1", "offline");
        assert_eq!(*seen.lock().unwrap(), vec!["s1/net-1/offline".to_string()]);
    }
}
