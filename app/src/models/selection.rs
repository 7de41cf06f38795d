// Selections made while recording a callout, and the step list that gathers them.

use serde::{Deserialize, Serialize};

use super::callout::CalloutForm;
use super::catalog::{AbilityRecord, HeroRecord, MapRecord};
use crate::wizard::{RetreatPolicy, StepDefinition, WizardController, WizardError};

pub const MAP_KEY: &str = "map";
pub const HERO_KEY: &str = "hero";
pub const SIDE_KEY: &str = "side";
pub const ABILITY_KEY: &str = "ability";
pub const DETAILS_KEY: &str = "details";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Attack,
    Defense,
}

impl Side {
    pub fn as_id(&self) -> &'static str {
        match self {
            Side::Attack => "attack",
            Side::Defense => "defense",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Side::Attack => "Attack",
            Side::Defense => "Defense",
        }
    }

    pub fn toggle(&self) -> Self {
        match self {
            Side::Attack => Side::Defense,
            Side::Defense => Side::Attack,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "attack" | "atk" | "a" => Some(Side::Attack),
            "defense" | "defence" | "def" | "d" => Some(Side::Defense),
            _ => None,
        }
    }
}

/// Value stored in the wizard registry.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Map(MapRecord),
    Hero(HeroRecord),
    Side(Side),
    Ability(AbilityRecord),
    Details(CalloutForm),
}

impl Selection {
    pub fn as_map(&self) -> Option<&MapRecord> {
        match self {
            Selection::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_hero(&self) -> Option<&HeroRecord> {
        match self {
            Selection::Hero(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_side(&self) -> Option<Side> {
        match self {
            Selection::Side(s) => Some(*s),
            _ => None,
        }
    }

    pub fn as_ability(&self) -> Option<&AbilityRecord> {
        match self {
            Selection::Ability(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_details(&self) -> Option<&CalloutForm> {
        match self {
            Selection::Details(d) => Some(d),
            _ => None,
        }
    }
}

/// Map -> hero -> side -> ability -> details.
pub fn callout_steps() -> Vec<StepDefinition<Selection>> {
    vec![
        StepDefinition::new("map").produces(MAP_KEY),
        StepDefinition::new("hero")
            .requires(MAP_KEY)
            .produces(HERO_KEY),
        StepDefinition::new("side")
            .requires(HERO_KEY)
            .produces(SIDE_KEY),
        StepDefinition::new("ability")
            .requires(SIDE_KEY)
            .produces(ABILITY_KEY)
            .with_rule("the selected ability belongs to a different hero", |reg| {
                let hero = reg.get(HERO_KEY).and_then(Selection::as_hero);
                let ability = reg.get(ABILITY_KEY).and_then(Selection::as_ability);
                match (hero, ability) {
                    (Some(h), Some(a)) => h.has_ability(&a.id),
                    _ => false,
                }
            }),
        StepDefinition::new("details")
            .requires(ABILITY_KEY)
            .produces(DETAILS_KEY)
            .with_rule("the position field is required", |reg| {
                reg.get(DETAILS_KEY)
                    .and_then(Selection::as_details)
                    .is_some_and(|f| !f.position.trim().is_empty())
            })
            .with_rule("a form field or attachment is invalid", |reg| {
                reg.get(DETAILS_KEY)
                    .and_then(Selection::as_details)
                    .is_some_and(CalloutForm::is_valid)
            }),
    ]
}

pub fn new_callout_wizard(
    policy: RetreatPolicy,
) -> Result<WizardController<Selection>, WizardError> {
    Ok(WizardController::new(callout_steps())?.with_retreat_policy(policy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::catalog::Catalog;
    use crate::wizard::Advance;

    #[test]
    fn side_parse_accepts_common_spellings() {
        assert_eq!(Side::parse("ATK"), Some(Side::Attack));
        assert_eq!(Side::parse(" defence "), Some(Side::Defense));
        assert_eq!(Side::parse("mid"), None);
        assert_eq!(Side::Attack.toggle(), Side::Defense);
    }

    #[test]
    fn full_callout_session_completes() {
        let catalog = Catalog::builtin();
        let hero = catalog.hero("viper").cloned().expect("viper");
        let mut wiz = new_callout_wizard(RetreatPolicy::Preserve).expect("wizard");

        wiz.set_selection(MAP_KEY, Selection::Map(catalog.maps[1].clone()));
        wiz.advance().expect("map");
        wiz.set_selection(HERO_KEY, Selection::Hero(hero.clone()));
        wiz.advance().expect("hero");
        wiz.set_selection(SIDE_KEY, Selection::Side(Side::Defense));
        wiz.advance().expect("side");
        wiz.set_selection(ABILITY_KEY, Selection::Ability(hero.abilities[2].clone()));
        wiz.advance().expect("ability");

        assert!(wiz.advance().is_err(), "details are required");
        wiz.set_selection(
            DETAILS_KEY,
            Selection::Details(CalloutForm {
                position: "B long".to_string(),
                ..CalloutForm::default()
            }),
        );
        assert!(matches!(wiz.advance(), Ok(Advance::Completed(r)) if r.len() == 5));
    }

    #[test]
    fn changing_hero_invalidates_foreign_ability() {
        let catalog = Catalog::builtin();
        let sova = catalog.hero("sova").cloned().expect("sova");
        let jett = catalog.hero("jett").cloned().expect("jett");
        let mut wiz = new_callout_wizard(RetreatPolicy::Preserve).expect("wizard");

        wiz.set_selection(MAP_KEY, Selection::Map(catalog.maps[0].clone()));
        wiz.set_selection(HERO_KEY, Selection::Hero(sova.clone()));
        wiz.set_selection(SIDE_KEY, Selection::Side(Side::Attack));
        wiz.set_selection(ABILITY_KEY, Selection::Ability(sova.abilities[0].clone()));
        wiz.jump_to(3).expect("earlier steps complete");
        assert!(wiz.is_current_step_complete());

        wiz.set_selection(HERO_KEY, Selection::Hero(jett));
        assert_eq!(
            wiz.current_unmet_requirement().as_deref(),
            Some("the selected ability belongs to a different hero")
        );
    }
}
