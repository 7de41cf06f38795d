//! Thread-safe handle around a [`WizardController`].
//!
//! All mutations go through one mutex so a background loader calling `set_selection` cannot
//! interleave with a UI-driven `advance`. Reads are answered under the same lock.

use std::sync::{mpsc, Arc, Mutex, MutexGuard};

use super::controller::{Advance, StepView, WizardController, WizardError, WizardEvent};
use super::registry::SelectionRegistry;
use super::step::StepId;

pub struct SharedWizard<V> {
    inner: Arc<Mutex<WizardController<V>>>,
}

impl<V> Clone for SharedWizard<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: Clone> SharedWizard<V> {
    pub fn new(controller: WizardController<V>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(controller)),
        }
    }

    // A panic while holding the lock cannot leave the controller half-updated (operations
    // validate before mutating), so a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, WizardController<V>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn advance(&self) -> Result<Advance<V>, WizardError> {
        self.lock().advance()
    }

    pub fn retreat(&self) -> Result<StepId, WizardError> {
        self.lock().retreat()
    }

    pub fn jump_to(&self, index: usize) -> Result<StepId, WizardError> {
        self.lock().jump_to(index)
    }

    pub fn set_selection(&self, key: impl Into<String>, value: V) {
        self.lock().set_selection(key, value)
    }

    pub fn clear_selection(&self, key: &str) -> Option<V> {
        self.lock().clear_selection(key)
    }

    pub fn selection(&self, key: &str) -> Option<V> {
        self.lock().selection(key).cloned()
    }

    pub fn has_selection(&self, key: &str) -> bool {
        self.lock().has_selection(key)
    }

    pub fn current_index(&self) -> usize {
        self.lock().current_index()
    }

    pub fn current_step_id(&self) -> StepId {
        self.lock().current_step_id().clone()
    }

    /// Consistent copy of cursor and registry taken under a single lock acquisition.
    pub fn snapshot(&self) -> (usize, SelectionRegistry<V>) {
        let guard = self.lock();
        (guard.current_index(), guard.registry().clone())
    }

    /// `notify` runs while this handle's lock is held, so a view must not call back into the
    /// same `SharedWizard`. Use [`channel`](Self::channel) when the listener needs to read state.
    pub fn subscribe(&self, view: impl StepView<V> + Send + 'static) {
        self.lock().subscribe(view)
    }

    /// Subscribe a channel. Events are queued, so the receiver may read back through this
    /// handle once it has them.
    pub fn channel(&self) -> mpsc::Receiver<WizardEvent<V>>
    where
        V: Send + 'static,
    {
        self.lock().channel()
    }

    /// Run `f` with exclusive access, for compound operations that must not interleave.
    pub fn with<R>(&self, f: impl FnOnce(&mut WizardController<V>) -> R) -> R {
        let mut guard = self.lock();
        f(&mut *guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wizard::step::StepDefinition;
    use std::thread;

    fn wizard() -> SharedWizard<u32> {
        let controller = WizardController::new(vec![
            StepDefinition::new("load").produces("count"),
            StepDefinition::new("review").requires("count"),
        ])
        .expect("valid wizard");
        SharedWizard::new(controller)
    }

    #[test]
    fn background_selection_unblocks_advance() {
        let shared = wizard();
        assert!(shared.advance().is_err());

        let loader = shared.clone();
        thread::spawn(move || loader.set_selection("count", 42))
            .join()
            .expect("loader thread");

        assert!(shared.advance().is_ok());
        assert_eq!(shared.current_step_id().as_str(), "review");
        assert_eq!(shared.selection("count"), Some(42));
    }

    #[test]
    fn concurrent_writers_leave_a_consistent_snapshot() {
        let shared = wizard();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let w = shared.clone();
                thread::spawn(move || {
                    for n in 0..100 {
                        w.set_selection("count", i * 1000 + n);
                        let _ = w.advance();
                        let _ = w.retreat();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().expect("writer thread");
        }

        let (cursor, registry) = shared.snapshot();
        assert!(cursor < 2);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn listener_reads_back_state_after_each_event() {
        let shared = wizard();
        let rx = shared.channel();

        let reader = shared.clone();
        let listener = thread::spawn(move || {
            let mut seen = Vec::new();
            for event in rx.iter() {
                if let WizardEvent::StepEntered { index, .. } = event {
                    seen.push((index, reader.current_index(), reader.selection("count")));
                    break;
                }
            }
            seen
        });

        shared.set_selection("count", 7);
        shared.advance().expect("advance");

        let seen = listener.join().expect("listener thread");
        assert_eq!(seen, vec![(1, 1, Some(7))]);
    }

    #[test]
    fn with_runs_compound_operation_atomically() {
        let shared = wizard();
        let entered = shared.with(|w| {
            w.set_selection("count", 1);
            w.advance()
        });
        assert!(entered.is_ok());
        assert_eq!(shared.current_index(), 1);
    }
}
