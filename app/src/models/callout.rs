// Callout form and saved record

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::catalog::{AbilityRecord, HeroRecord, MapRecord};
use super::selection::{Selection, Side, ABILITY_KEY, DETAILS_KEY, HERO_KEY, MAP_KEY, SIDE_KEY};
use crate::utils::validation;
use crate::wizard::SelectionRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageKind {
    Position,
    AimPoint,
    DropPoint,
}

impl ImageKind {
    pub const ALL: [ImageKind; 3] = [ImageKind::Position, ImageKind::AimPoint, ImageKind::DropPoint];

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageKind::Position => "Position",
            ImageKind::AimPoint => "Aim point",
            ImageKind::DropPoint => "Drop point",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            ImageKind::Position => ImageKind::AimPoint,
            ImageKind::AimPoint => ImageKind::DropPoint,
            ImageKind::DropPoint => ImageKind::Position,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAttachment {
    pub kind: ImageKind,
    pub path: PathBuf,
}

/// Free-text part of a callout, filled in on the last wizard step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CalloutForm {
    pub position: String,
    pub position_detail: String,
    pub aim_point: String,
    pub aim_point_detail: String,
    pub drop_point: String,
    pub drop_point_detail: String,
    pub notes: String,
    pub images: Vec<ImageAttachment>,
}

impl CalloutForm {
    /// First problem that prevents saving, if any.
    pub fn problem(&self) -> Option<String> {
        let fields = [
            ("Position", self.position.as_str(), true),
            ("Position detail", self.position_detail.as_str(), false),
            ("Aim point", self.aim_point.as_str(), false),
            ("Aim point detail", self.aim_point_detail.as_str(), false),
            ("Drop point", self.drop_point.as_str(), false),
            ("Drop point detail", self.drop_point_detail.as_str(), false),
        ];
        for (label, value, required) in fields {
            if let Err(e) = validation::validate_field_text(label, value, required) {
                return Some(e.to_string());
            }
        }
        if let Err(e) = validation::validate_notes(&self.notes) {
            return Some(e.to_string());
        }
        self.images
            .iter()
            .find_map(|img| validation::validate_image_path(&img.path).err())
            .map(|e| e.to_string())
    }

    pub fn is_valid(&self) -> bool {
        self.problem().is_none()
    }

    /// Attach an image; the same path is never attached twice under the same kind.
    pub fn attach_image(&mut self, kind: ImageKind, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        validation::validate_image_path(&path)?;
        if !self.images.iter().any(|i| i.kind == kind && i.path == path) {
            self.images.push(ImageAttachment { kind, path });
        }
        Ok(())
    }

    pub fn remove_image(&mut self, path: &Path) -> bool {
        let before = self.images.len();
        self.images.retain(|i| i.path != path);
        self.images.len() != before
    }

    pub fn images_of(&self, kind: ImageKind) -> impl Iterator<Item = &ImageAttachment> {
        self.images.iter().filter(move |i| i.kind == kind)
    }
}

/// A completed wizard session as persisted by `storage::CalloutStore`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalloutRecord {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub map: MapRecord,
    pub hero: HeroRecord,
    pub side: Side,
    pub ability: AbilityRecord,
    pub form: CalloutForm,
}

impl CalloutRecord {
    /// Build a record from a completed wizard's selections.
    pub fn from_selections(registry: &SelectionRegistry<Selection>) -> Result<Self> {
        let map = registry
            .get(MAP_KEY)
            .and_then(Selection::as_map)
            .context("No map selected")?;
        let hero = registry
            .get(HERO_KEY)
            .and_then(Selection::as_hero)
            .context("No hero selected")?;
        let side = registry
            .get(SIDE_KEY)
            .and_then(Selection::as_side)
            .context("No side selected")?;
        let ability = registry
            .get(ABILITY_KEY)
            .and_then(Selection::as_ability)
            .context("No ability selected")?;
        let form = registry
            .get(DETAILS_KEY)
            .and_then(Selection::as_details)
            .context("Callout details missing")?;

        if let Some(problem) = form.problem() {
            return Err(anyhow::anyhow!("Callout details invalid: {}", problem));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            map: map.clone(),
            hero: hero.clone(),
            side,
            ability: ability.clone(),
            form: form.clone(),
        })
    }

    /// One-line description for listings.
    pub fn summary(&self) -> String {
        format!(
            "{} | {} | {} | {} | {}",
            self.map.display_name,
            self.hero.display_name,
            self.side.label(),
            self.ability.display_name,
            self.form.position.trim()
        )
    }
}
