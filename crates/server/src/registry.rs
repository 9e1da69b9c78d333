//! Call registry
//!
//! Keyed store correlating webhook callbacks with reminder records. Each
//! entry carries its own lock, so mutation of one call is serialized while
//! unrelated calls proceed independently. Terminal records are evicted by a
//! periodic sweeper after a grace period.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;

use medcall_core::{CallId, ReminderCall};

use crate::ServerError;

/// A registered reminder record behind its per-call lock.
pub type SharedCall = Arc<Mutex<ReminderCall>>;

/// In-memory store of active reminder calls, keyed by correlation token.
pub struct CallRegistry {
    calls: RwLock<HashMap<CallId, SharedCall>>,
    max_calls: usize,
    eviction_grace: Duration,
    sweep_interval: Duration,
}

impl CallRegistry {
    pub fn new(max_calls: usize) -> Self {
        Self::with_config(
            max_calls,
            Duration::from_secs(900),
            Duration::from_secs(60),
        )
    }

    pub fn with_config(
        max_calls: usize,
        eviction_grace: Duration,
        sweep_interval: Duration,
    ) -> Self {
        Self {
            calls: RwLock::new(HashMap::new()),
            max_calls,
            eviction_grace,
            sweep_interval,
        }
    }

    /// Register a new reminder record.
    ///
    /// When the registry is at capacity, terminal entries past their grace
    /// period are swept first; if it is still full the insert is refused.
    pub fn insert(&self, call: ReminderCall) -> Result<SharedCall, ServerError> {
        let mut calls = self.calls.write();

        if calls.len() >= self.max_calls {
            self.sweep_terminal_internal(&mut calls);

            if calls.len() >= self.max_calls {
                return Err(ServerError::Capacity);
            }
        }

        let id = call.id.clone();
        let entry = Arc::new(Mutex::new(call));
        calls.insert(id.clone(), entry.clone());

        tracing::info!(call_id = %id, "registered reminder call");
        Ok(entry)
    }

    /// Look up a call by correlation token.
    pub fn get(&self, id: &CallId) -> Option<SharedCall> {
        self.calls.read().get(id).cloned()
    }

    /// Remove a call unconditionally.
    pub fn remove(&self, id: &CallId) {
        if self.calls.write().remove(id).is_some() {
            tracing::info!(call_id = %id, "removed reminder call");
        }
    }

    pub fn count(&self) -> usize {
        self.calls.read().len()
    }

    /// Evict terminal records older than the grace period. Returns how many
    /// were removed.
    pub fn sweep_terminal(&self) -> usize {
        let mut calls = self.calls.write();
        self.sweep_terminal_internal(&mut calls)
    }

    fn sweep_terminal_internal(&self, calls: &mut HashMap<CallId, SharedCall>) -> usize {
        let grace = chrono::Duration::from_std(self.eviction_grace)
            .unwrap_or_else(|_| chrono::Duration::seconds(900));
        let cutoff = chrono::Utc::now() - grace;

        let expired: Vec<CallId> = calls
            .iter()
            .filter(|(_, entry)| {
                let call = entry.lock();
                call.is_terminal() && call.updated_at < cutoff
            })
            .map(|(id, _)| id.clone())
            .collect();

        let removed = expired.len();
        for id in expired {
            calls.remove(&id);
            tracing::info!(call_id = %id, "evicted terminal reminder call");
        }
        removed
    }

    /// List all registered correlation tokens.
    pub fn list(&self) -> Vec<CallId> {
        self.calls.read().keys().cloned().collect()
    }

    /// Start a background task that periodically sweeps terminal entries.
    ///
    /// Returns a shutdown sender; send `true` to stop the sweeper.
    pub fn start_sweeper(self: &Arc<Self>) -> watch::Sender<bool> {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let registry = Arc::clone(self);
        let interval = registry.sweep_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = registry.sweep_terminal();
                        if removed > 0 {
                            tracing::info!(removed, remaining = registry.count(), "registry sweep");
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::info!("registry sweeper shutting down");
                            break;
                        }
                    }
                }
            }
        });

        shutdown_tx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medcall_core::CallState;

    fn sample_call() -> ReminderCall {
        ReminderCall::new("+15551234567", Some("Metformin".to_string()))
    }

    #[test]
    fn test_insert_and_get() {
        let registry = CallRegistry::new(10);
        let entry = registry.insert(sample_call()).unwrap();
        let id = entry.lock().id.clone();

        let found = registry.get(&id).unwrap();
        assert_eq!(found.lock().id, id);
        assert_eq!(registry.count(), 1);

        registry.remove(&id);
        assert!(registry.get(&id).is_none());
    }

    #[test]
    fn test_capacity_refused_when_entries_are_live() {
        let registry = CallRegistry::new(1);
        registry.insert(sample_call()).unwrap();

        let err = registry.insert(sample_call()).unwrap_err();
        assert!(matches!(err, ServerError::Capacity));
    }

    #[test]
    fn test_sweep_evicts_only_aged_terminal_entries() {
        let registry =
            CallRegistry::with_config(10, Duration::from_secs(0), Duration::from_secs(60));

        let live = registry.insert(sample_call()).unwrap();
        let live_id = live.lock().id.clone();

        let done = registry.insert(sample_call()).unwrap();
        let done_id = done.lock().id.clone();
        {
            let mut call = done.lock();
            call.transition_to(CallState::Dialing).unwrap();
            call.transition_to(CallState::Failed).unwrap();
            call.transition_to(CallState::Completed).unwrap();
        }

        let removed = registry.sweep_terminal();
        assert_eq!(removed, 1);
        assert!(registry.get(&done_id).is_none());
        assert!(registry.get(&live_id).is_some());
    }

    #[test]
    fn test_capacity_recovered_by_sweeping_terminal_entries() {
        let registry =
            CallRegistry::with_config(1, Duration::from_secs(0), Duration::from_secs(60));

        let first = registry.insert(sample_call()).unwrap();
        {
            let mut call = first.lock();
            call.transition_to(CallState::Dialing).unwrap();
            call.transition_to(CallState::Failed).unwrap();
            call.transition_to(CallState::Completed).unwrap();
        }

        // Full, but the terminal entry is reclaimable
        registry.insert(sample_call()).unwrap();
        assert_eq!(registry.count(), 1);
    }
}
