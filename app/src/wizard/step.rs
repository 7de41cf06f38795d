use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use super::registry::SelectionRegistry;

/// Stable identifier of a wizard step (e.g. `"map"`, `"side"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StepId(String);

impl StepId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StepId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for StepId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

type Predicate<V> = Arc<dyn Fn(&SelectionRegistry<V>) -> bool + Send + Sync>;

struct StepRule<V> {
    description: String,
    predicate: Predicate<V>,
}

impl<V> Clone for StepRule<V> {
    fn clone(&self) -> Self {
        Self {
            description: self.description.clone(),
            predicate: Arc::clone(&self.predicate),
        }
    }
}

/// Declarative description of one step.
///
/// A step is complete when every `requires` key and every `produces` key is present in the
/// registry and every extra rule holds. Steps carry no mutable state.
pub struct StepDefinition<V> {
    id: StepId,
    required_keys: BTreeSet<String>,
    produced_keys: BTreeSet<String>,
    rules: Vec<StepRule<V>>,
}

impl<V> Clone for StepDefinition<V> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            required_keys: self.required_keys.clone(),
            produced_keys: self.produced_keys.clone(),
            rules: self.rules.clone(),
        }
    }
}

impl<V> fmt::Debug for StepDefinition<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDefinition")
            .field("id", &self.id)
            .field("required_keys", &self.required_keys)
            .field("produced_keys", &self.produced_keys)
            .field(
                "rules",
                &self.rules.iter().map(|r| r.description.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl<V> StepDefinition<V> {
    pub fn new(id: impl Into<StepId>) -> Self {
        Self {
            id: id.into(),
            required_keys: BTreeSet::new(),
            produced_keys: BTreeSet::new(),
            rules: Vec::new(),
        }
    }

    /// Key that an earlier step must have populated.
    pub fn requires(mut self, key: impl Into<String>) -> Self {
        self.required_keys.insert(key.into());
        self
    }

    /// Key this step writes itself. It must be present before leaving the step.
    pub fn produces(mut self, key: impl Into<String>) -> Self {
        self.produced_keys.insert(key.into());
        self
    }

    /// Extra completion rule. `description` is shown to the user when the rule fails.
    pub fn with_rule<F>(mut self, description: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&SelectionRegistry<V>) -> bool + Send + Sync + 'static,
    {
        self.rules.push(StepRule {
            description: description.into(),
            predicate: Arc::new(predicate),
        });
        self
    }

    pub fn id(&self) -> &StepId {
        &self.id
    }

    pub fn required_keys(&self) -> impl Iterator<Item = &str> {
        self.required_keys.iter().map(String::as_str)
    }

    pub fn produced_keys(&self) -> impl Iterator<Item = &str> {
        self.produced_keys.iter().map(String::as_str)
    }

    pub fn is_complete(&self, registry: &SelectionRegistry<V>) -> bool {
        self.unmet_requirement(registry).is_none()
    }

    /// First unmet requirement, phrased for the user. `None` iff the step is complete.
    pub fn unmet_requirement(&self, registry: &SelectionRegistry<V>) -> Option<String> {
        if let Some(key) = self.required_keys.iter().find(|k| !registry.has(k)) {
            return Some(format!("missing required selection '{}'", key));
        }
        if let Some(key) = self.produced_keys.iter().find(|k| !registry.has(k)) {
            return Some(format!("no '{}' selected yet", key));
        }
        self.rules
            .iter()
            .find(|r| !(r.predicate)(registry))
            .map(|r| r.description.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_without_requirements_is_complete() {
        let step: StepDefinition<u8> = StepDefinition::new("welcome");
        assert!(step.is_complete(&SelectionRegistry::new()));
    }

    #[test]
    fn required_keys_gate_completion() {
        let step: StepDefinition<&str> = StepDefinition::new("side").requires("hero");
        let mut reg = SelectionRegistry::new();

        assert!(!step.is_complete(&reg));
        assert_eq!(
            step.unmet_requirement(&reg).as_deref(),
            Some("missing required selection 'hero'")
        );

        reg.set("hero", "Sova");
        assert!(step.is_complete(&reg));
    }

    #[test]
    fn own_output_must_be_present() {
        let step: StepDefinition<&str> = StepDefinition::new("map").produces("map");
        let mut reg = SelectionRegistry::new();

        assert_eq!(
            step.unmet_requirement(&reg).as_deref(),
            Some("no 'map' selected yet")
        );
        reg.set("map", "Ascent");
        assert!(step.is_complete(&reg));
    }

    #[test]
    fn extra_rule_reports_its_description() {
        let step = StepDefinition::<String>::new("details")
            .produces("details")
            .with_rule("position must not be blank", |reg| {
                reg.get("details").is_some_and(|v| !v.trim().is_empty())
            });
        let mut reg = SelectionRegistry::new();
        reg.set("details", "   ".to_string());

        assert_eq!(
            step.unmet_requirement(&reg).as_deref(),
            Some("position must not be blank")
        );

        reg.set("details", "A main heaven".to_string());
        assert!(step.is_complete(&reg));
    }

    #[test]
    fn debug_lists_rule_descriptions() {
        let step: StepDefinition<u8> =
            StepDefinition::new("x").with_rule("must be even", |_| true);
        let dbg = format!("{:?}", step);
        assert!(dbg.contains("must be even"), "{}", dbg);
    }
}
