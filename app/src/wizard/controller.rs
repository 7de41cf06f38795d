//! Linear wizard state machine.
//!
//! The controller owns the step cursor and the selection registry. UI code calls the inbound
//! operations (`advance`, `retreat`, `jump_to`, `set_selection`) and learns about the outcome
//! both from the return value and from events delivered to every subscribed [`StepView`].
//!
//! Every operation either commits fully or leaves cursor and registry untouched.

use std::fmt;
use std::sync::mpsc;

use log::{debug, info, warn};

use super::registry::SelectionRegistry;
use super::step::{StepDefinition, StepId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WizardError {
    #[error("step '{step}' is incomplete: {reason}")]
    Validation { step: StepId, reason: String },
    #[error("already at the first step")]
    Boundary,
    #[error("step index {index} is out of range (wizard has {len} steps)")]
    Range { index: usize, len: usize },
    #[error("a wizard needs at least one step")]
    NoSteps,
    #[error("duplicate step id '{0}'")]
    DuplicateStep(StepId),
}

/// Notifications sent to step views.
#[derive(Debug, Clone, PartialEq)]
pub enum WizardEvent<V> {
    StepEntered { index: usize, id: StepId },
    StepExited { index: usize, id: StepId },
    ValidationFailed { step: StepId, reason: String },
    BoundaryReached,
    /// Whether the current step may be left forward. Sent after every selection change and
    /// after every cursor move.
    StepValidityChanged(bool),
    Completed(SelectionRegistry<V>),
}

/// Rendering surface that wants to hear about wizard transitions.
pub trait StepView<V> {
    fn notify(&mut self, event: &WizardEvent<V>);
}

impl<V: Clone> StepView<V> for mpsc::Sender<WizardEvent<V>> {
    fn notify(&mut self, event: &WizardEvent<V>) {
        if self.send(event.clone()).is_err() {
            debug!("[PHASE: wizard] [STEP: notify] Event receiver dropped; event discarded");
        }
    }
}

/// What happens to later selections when the user navigates backward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RetreatPolicy {
    /// Keep every selection; going forward again shows the earlier choices.
    #[default]
    Preserve,
    /// Clear the outputs of every step after the new cursor position.
    ClearForward,
}

/// Result of a successful `advance`.
#[derive(Debug, Clone, PartialEq)]
pub enum Advance<V> {
    Entered { index: usize, id: StepId },
    /// `advance` was called on the last step. The cursor does not move.
    Completed(SelectionRegistry<V>),
}

pub struct WizardController<V> {
    steps: Vec<StepDefinition<V>>,
    cursor: usize,
    registry: SelectionRegistry<V>,
    retreat_policy: RetreatPolicy,
    views: Vec<Box<dyn StepView<V> + Send>>,
}

impl<V: fmt::Debug> fmt::Debug for WizardController<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WizardController")
            .field("steps", &self.steps)
            .field("cursor", &self.cursor)
            .field("registry", &self.registry)
            .field("retreat_policy", &self.retreat_policy)
            .field("views", &self.views.len())
            .finish()
    }
}

impl<V: Clone> WizardController<V> {
    pub fn new(steps: Vec<StepDefinition<V>>) -> Result<Self, WizardError> {
        if steps.is_empty() {
            return Err(WizardError::NoSteps);
        }
        for (i, step) in steps.iter().enumerate() {
            if steps[..i].iter().any(|s| s.id() == step.id()) {
                return Err(WizardError::DuplicateStep(step.id().clone()));
            }
        }

        debug!(
            "[PHASE: wizard] [STEP: init] Wizard created with {} steps: {}",
            steps.len(),
            steps
                .iter()
                .map(|s| s.id().as_str())
                .collect::<Vec<_>>()
                .join(" -> ")
        );

        Ok(Self {
            steps,
            cursor: 0,
            registry: SelectionRegistry::new(),
            retreat_policy: RetreatPolicy::default(),
            views: Vec::new(),
        })
    }

    pub fn with_retreat_policy(mut self, policy: RetreatPolicy) -> Self {
        self.retreat_policy = policy;
        self
    }

    pub fn retreat_policy(&self) -> RetreatPolicy {
        self.retreat_policy
    }

    /// Views are notified synchronously from inside the operation that caused the event.
    /// `notify` must not call back into this controller (or a [`SharedWizard`] wrapping it,
    /// whose lock is still held); forward events through [`channel`](Self::channel) instead.
    ///
    /// [`SharedWizard`]: super::SharedWizard
    pub fn subscribe(&mut self, view: impl StepView<V> + Send + 'static) {
        self.views.push(Box::new(view));
    }

    pub fn steps(&self) -> &[StepDefinition<V>] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always false: construction rejects an empty step list.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.cursor
    }

    pub fn current_step(&self) -> &StepDefinition<V> {
        &self.steps[self.cursor]
    }

    pub fn current_step_id(&self) -> &StepId {
        self.current_step().id()
    }

    pub fn is_last_step(&self) -> bool {
        self.cursor + 1 == self.steps.len()
    }

    pub fn registry(&self) -> &SelectionRegistry<V> {
        &self.registry
    }

    pub fn selection(&self, key: &str) -> Option<&V> {
        self.registry.get(key)
    }

    pub fn has_selection(&self, key: &str) -> bool {
        self.registry.has(key)
    }

    pub fn is_current_step_complete(&self) -> bool {
        self.current_step().is_complete(&self.registry)
    }

    pub fn current_unmet_requirement(&self) -> Option<String> {
        self.current_step().unmet_requirement(&self.registry)
    }

    pub fn can_retreat(&self) -> bool {
        self.cursor > 0
    }

    /// Whether step `index` is complete with the current selections.
    pub fn is_step_complete(&self, index: usize) -> bool {
        self.steps
            .get(index)
            .is_some_and(|s| s.is_complete(&self.registry))
    }

    pub fn advance(&mut self) -> Result<Advance<V>, WizardError> {
        let step = &self.steps[self.cursor];
        if let Some(reason) = step.unmet_requirement(&self.registry) {
            let id = step.id().clone();
            warn!(
                "[PHASE: wizard] [STEP: advance] Blocked on step '{}': {}",
                id, reason
            );
            self.emit(WizardEvent::ValidationFailed {
                step: id.clone(),
                reason: reason.clone(),
            });
            return Err(WizardError::Validation { step: id, reason });
        }

        if self.is_last_step() {
            let snapshot = self.registry.clone();
            info!(
                "[PHASE: wizard] [STEP: complete] Wizard completed with selections: {}",
                snapshot.keys().join(", ")
            );
            self.emit(WizardEvent::Completed(snapshot.clone()));
            return Ok(Advance::Completed(snapshot));
        }

        let target = self.cursor + 1;
        self.move_to(target);
        Ok(Advance::Entered {
            index: target,
            id: self.current_step_id().clone(),
        })
    }

    pub fn retreat(&mut self) -> Result<StepId, WizardError> {
        if self.cursor == 0 {
            warn!("[PHASE: wizard] [STEP: retreat] Already at the first step");
            self.emit(WizardEvent::BoundaryReached);
            return Err(WizardError::Boundary);
        }

        self.move_to(self.cursor - 1);
        Ok(self.current_step_id().clone())
    }

    /// Move directly to `index`. Forward jumps require every skipped step (including the
    /// current one) to be complete; backward jumps always succeed.
    pub fn jump_to(&mut self, index: usize) -> Result<StepId, WizardError> {
        let len = self.steps.len();
        if index >= len {
            warn!(
                "[PHASE: wizard] [STEP: jump] Jump target {} out of range (len={})",
                index, len
            );
            return Err(WizardError::Range { index, len });
        }

        if index > self.cursor {
            let blocked = self.steps[self.cursor..index].iter().find_map(|s| {
                s.unmet_requirement(&self.registry)
                    .map(|reason| (s.id().clone(), reason))
            });
            if let Some((step, reason)) = blocked {
                warn!(
                    "[PHASE: wizard] [STEP: jump] Jump to {} blocked by step '{}': {}",
                    index, step, reason
                );
                self.emit(WizardEvent::ValidationFailed {
                    step: step.clone(),
                    reason: reason.clone(),
                });
                return Err(WizardError::Validation { step, reason });
            }
        }

        if index != self.cursor {
            self.move_to(index);
        }
        Ok(self.current_step_id().clone())
    }

    pub fn set_selection(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        debug!("[PHASE: wizard] [STEP: select] Selection '{}' set", key);
        self.registry.set(key, value);
        self.emit_validity();
    }

    pub fn clear_selection(&mut self, key: &str) -> Option<V> {
        let old = self.registry.clear(key);
        if old.is_some() {
            debug!("[PHASE: wizard] [STEP: select] Selection '{}' cleared", key);
        }
        self.emit_validity();
        old
    }

    fn move_to(&mut self, target: usize) {
        let from = self.cursor;

        if target < from && self.retreat_policy == RetreatPolicy::ClearForward {
            for step in &self.steps[target + 1..] {
                for key in step.produced_keys() {
                    if self.registry.clear(key).is_some() {
                        debug!(
                            "[PHASE: wizard] [STEP: retreat] Cleared '{}' from step '{}'",
                            key,
                            step.id()
                        );
                    }
                }
            }
        }

        let left = self.steps[from].id().clone();
        self.emit(WizardEvent::StepExited {
            index: from,
            id: left.clone(),
        });

        self.cursor = target;
        let entered = self.steps[target].id().clone();
        info!(
            "[PHASE: wizard] [STEP: navigate] '{}' ({}) -> '{}' ({})",
            left, from, entered, target
        );
        self.emit(WizardEvent::StepEntered {
            index: target,
            id: entered,
        });
        self.emit_validity();
    }

    fn emit_validity(&mut self) {
        let valid = self.is_current_step_complete();
        self.emit(WizardEvent::StepValidityChanged(valid));
    }

    fn emit(&mut self, event: WizardEvent<V>) {
        for view in self.views.iter_mut() {
            view.notify(&event);
        }
    }
}

impl<V: Clone + Send + 'static> WizardController<V> {
    /// Subscribe a channel and return its receiving end.
    pub fn channel(&mut self) -> mpsc::Receiver<WizardEvent<V>> {
        let (tx, rx) = mpsc::channel();
        self.subscribe(tx);
        rx
    }
}
