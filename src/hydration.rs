use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Signals that the content store has finished loading from durable storage.
///
/// Starts out false, flips to true exactly once, and never goes back.
/// Consumers either poll `is_hydrated` or register a listener; listeners are
/// invoked synchronously inside the transition, so no subscriber can observe
/// the gate as hydrated before another that registered earlier.
pub struct HydrationGate {
    hydrated: AtomicBool,
    listeners: Mutex<Vec<Box<dyn Fn() + Send + Sync>>>,
}

impl HydrationGate {
    pub fn new() -> Self {
        Self {
            hydrated: AtomicBool::new(false),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn is_hydrated(&self) -> bool {
        self.hydrated.load(Ordering::SeqCst)
    }

    /// Mark the initial load as complete. Returns whether this call performed
    /// the transition; repeated calls are no-ops and notify nobody.
    pub fn mark_hydrated(&self) -> bool {
        if self.hydrated.swap(true, Ordering::SeqCst) {
            return false;
        }
        let listeners: Vec<_> = self.listeners.lock().unwrap().drain(..).collect();
        for listener in &listeners {
            listener();
        }
        true
    }

    /// Run `listener` once the gate opens. Fires immediately when hydration
    /// has already completed.
    pub fn on_hydrated(&self, listener: impl Fn() + Send + Sync + 'static) {
        let mut listeners = self.listeners.lock().unwrap();
        if self.is_hydrated() {
            drop(listeners);
            listener();
        } else {
            listeners.push(Box::new(listener));
        }
    }
}

impl Default for HydrationGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn starts_unhydrated() {
        let gate = HydrationGate::new();
        assert!(!gate.is_hydrated());
    }

    #[test]
    fn transitions_exactly_once() {
        let gate = HydrationGate::new();
        assert!(gate.mark_hydrated());
        assert!(gate.is_hydrated());
        // A second mark is a no-op, and there is no way back to false.
        assert!(!gate.mark_hydrated());
        assert!(gate.is_hydrated());
    }

    #[test]
    fn listeners_fire_once_on_the_transition() {
        let gate = HydrationGate::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let seen = calls.clone();
        gate.on_hydrated(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        gate.mark_hydrated();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        gate.mark_hydrated();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn late_subscribers_fire_immediately() {
        let gate = HydrationGate::new();
        gate.mark_hydrated();

        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        gate.on_hydrated(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn all_listeners_observe_the_same_transition() {
        let gate = HydrationGate::new();
        let calls = Arc::new(AtomicUsize::new(0));
        for _ in 0..5 {
            let seen = calls.clone();
            gate.on_hydrated(move || {
                seen.fetch_add(1, Ordering::SeqCst);
            });
        }
        gate.mark_hydrated();
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }
}
