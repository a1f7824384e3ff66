use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Per-session run locks. Two invocations for the same session serialize
/// here; different sessions proceed independently. The registry never
/// shrinks; session counts are small enough not to care.
#[derive(Clone, Default)]
pub struct SessionLocks {
    inner: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to one session's lock; hold its guard for the whole run.
    /// A poisoned lock is recovered, not propagated: the lock only fences
    /// execution order and protects no data of its own.
    pub fn lock_for(&self, session_id: &str) -> Arc<Mutex<()>> {
        let mut registry = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        registry.entry(session_id.to_string()).or_default().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn same_session_shares_one_lock() {
        let locks = SessionLocks::new();
        let a = locks.lock_for("s-1");
        let b = locks.lock_for("s-1");
        let other = locks.lock_for("s-2");

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &other));
    }

    #[test]
    fn clones_see_the_same_registry() {
        let locks = SessionLocks::new();
        let cloned = locks.clone();
        assert!(Arc::ptr_eq(
            &locks.lock_for("s-1"),
            &cloned.lock_for("s-1")
        ));
    }

    #[test]
    fn holders_exclude_each_other() {
        let locks = SessionLocks::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for label in ["first", "second"] {
            let locks = locks.clone();
            let order = order.clone();
            handles.push(thread::spawn(move || {
                let lock = locks.lock_for("s-1");
                let _guard = lock.lock().unwrap();
                order.lock().unwrap().push(format!("{label}-in"));
                thread::sleep(Duration::from_millis(20));
                order.lock().unwrap().push(format!("{label}-out"));
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let order = order.lock().unwrap();
        // whichever entered first must have left before the other entered
        assert_eq!(order.len(), 4);
        assert_eq!(order[0].trim_end_matches("-in"), order[1].trim_end_matches("-out"));
    }
}
