//! Generic linear wizard engine: selection registry, declarative steps and the navigation
//! state machine. Nothing in here knows about maps, heroes or terminals.

pub mod controller;
pub mod registry;
pub mod shared;
pub mod step;

pub use controller::{Advance, RetreatPolicy, StepView, WizardController, WizardError, WizardEvent};
pub use registry::SelectionRegistry;
pub use shared::SharedWizard;
pub use step::{StepDefinition, StepId};
