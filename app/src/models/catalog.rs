// Map and hero catalogs
//
// Catalog files are plain JSON lists maintained by hand (`maps.json`, `hero.json`). Field names
// vary between revisions of those files, so raw records are read leniently and normalized into
// `{id, display_name, image_path}`.

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapRecord {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub local_name: Option<String>,
    pub image_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbilityRecord {
    pub id: String,
    pub display_name: String,
    /// Key binding slot (`C`, `Q`, `E`, `X`).
    #[serde(default)]
    pub key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeroRecord {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub local_name: Option<String>,
    pub image_path: String,
    #[serde(default)]
    pub abilities: Vec<AbilityRecord>,
}

impl HeroRecord {
    /// Listed abilities, or the four generic slots when the catalog has none.
    pub fn abilities_or_default(&self) -> Vec<AbilityRecord> {
        if !self.abilities.is_empty() {
            return self.abilities.clone();
        }
        ["C", "Q", "E", "X"]
            .iter()
            .map(|k| AbilityRecord {
                id: format!("slot-{}", k.to_ascii_lowercase()),
                display_name: format!("Ability {}", k),
                key: Some(k.to_string()),
            })
            .collect()
    }

    pub fn has_ability(&self, ability_id: &str) -> bool {
        self.abilities_or_default().iter().any(|a| a.id == ability_id)
    }
}

#[derive(Debug, Deserialize)]
struct MapsFile {
    maps: Vec<RawMap>,
}

#[derive(Debug, Deserialize)]
struct RawMap {
    #[serde(default)]
    id: Option<String>,
    #[serde(alias = "name")]
    english: String,
    #[serde(default, alias = "chinese_name")]
    chinese: Option<String>,
    #[serde(default, alias = "image")]
    url: String,
}

#[derive(Debug, Deserialize)]
struct HeroesFile {
    #[serde(alias = "heros", alias = "agents")]
    heroes: Vec<RawHero>,
}

#[derive(Debug, Deserialize)]
struct RawHero {
    #[serde(default)]
    id: Option<String>,
    #[serde(alias = "name", alias = "English_name")]
    english: String,
    #[serde(default, rename = "Chinese_name", alias = "Chines_name", alias = "chinese")]
    chinese: Option<String>,
    #[serde(default, alias = "image")]
    url: String,
    #[serde(default)]
    abilities: Vec<RawAbility>,
}

#[derive(Debug, Deserialize)]
struct RawAbility {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    key: Option<String>,
}

/// Lower-case, dash-separated id derived from a display name.
pub fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else if (c.is_whitespace() || c == '-' || c == '_') && !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub fn parse_maps(json: &str) -> Result<Vec<MapRecord>> {
    let file: MapsFile = serde_json::from_str(json).context("Invalid maps catalog JSON")?;
    Ok(file
        .maps
        .into_iter()
        .map(|m| MapRecord {
            id: non_blank(m.id).unwrap_or_else(|| slug(&m.english)),
            display_name: m.english.trim().to_string(),
            local_name: non_blank(m.chinese),
            image_path: m.url.trim_start_matches('/').to_string(),
        })
        .collect())
}

pub fn parse_heroes(json: &str) -> Result<Vec<HeroRecord>> {
    let file: HeroesFile = serde_json::from_str(json).context("Invalid hero catalog JSON")?;
    Ok(file
        .heroes
        .into_iter()
        .map(|h| HeroRecord {
            id: non_blank(h.id).unwrap_or_else(|| slug(&h.english)),
            display_name: h.english.trim().to_string(),
            local_name: non_blank(h.chinese),
            image_path: h.url.trim_start_matches('/').to_string(),
            abilities: h
                .abilities
                .into_iter()
                .map(|a| AbilityRecord {
                    id: non_blank(a.id).unwrap_or_else(|| slug(&a.name)),
                    display_name: a.name.trim().to_string(),
                    key: non_blank(a.key).map(|k| k.to_ascii_uppercase()),
                })
                .collect(),
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    pub maps: Vec<MapRecord>,
    pub heroes: Vec<HeroRecord>,
}

impl Catalog {
    /// Load `maps.json` and `hero.json` from `dir`.
    ///
    /// A missing file falls back to the built-in list for that half of the catalog; a file that
    /// exists but does not parse is an error.
    pub fn load(dir: &Path) -> Result<Self> {
        let builtin = Self::builtin();

        let maps = match find_catalog_file(dir, &["maps.json", "maps/maps.json"]) {
            Some(path) => {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {:?}", path))?;
                let maps =
                    parse_maps(&raw).with_context(|| format!("Failed to parse {:?}", path))?;
                info!(
                    "[PHASE: catalog] [STEP: maps] Loaded {} maps from {:?}",
                    maps.len(),
                    path
                );
                maps
            }
            None => {
                info!(
                    "[PHASE: catalog] [STEP: maps] No maps.json under {:?}; using built-in maps",
                    dir
                );
                builtin.maps
            }
        };

        let heroes = match find_catalog_file(dir, &["hero.json", "heroes.json", "hero/hero.json"]) {
            Some(path) => {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {:?}", path))?;
                let heroes =
                    parse_heroes(&raw).with_context(|| format!("Failed to parse {:?}", path))?;
                info!(
                    "[PHASE: catalog] [STEP: heroes] Loaded {} heroes from {:?}",
                    heroes.len(),
                    path
                );
                heroes
            }
            None => {
                info!(
                    "[PHASE: catalog] [STEP: heroes] No hero.json under {:?}; using built-in heroes",
                    dir
                );
                builtin.heroes
            }
        };

        if maps.is_empty() || heroes.is_empty() {
            warn!(
                "[PHASE: catalog] [STEP: validate] Catalog is incomplete (maps={}, heroes={})",
                maps.len(),
                heroes.len()
            );
        }

        Ok(Self { maps, heroes })
    }

    /// Load from `dir`, falling back to the built-in catalog on any error.
    /// The error (if any) is returned alongside so the UI can report it.
    pub fn load_or_builtin(dir: &Path) -> (Self, Option<anyhow::Error>) {
        match Self::load(dir) {
            Ok(c) => (c, None),
            Err(e) => {
                warn!(
                    "[PHASE: catalog] [STEP: load] Falling back to built-in catalog: {:#}",
                    e
                );
                (Self::builtin(), Some(e))
            }
        }
    }

    pub fn map(&self, id: &str) -> Option<&MapRecord> {
        self.maps.iter().find(|m| m.id == id)
    }

    pub fn hero(&self, id: &str) -> Option<&HeroRecord> {
        self.heroes.iter().find(|h| h.id == id)
    }

    pub fn builtin() -> Self {
        let maps = [
            "Ascent", "Bind", "Haven", "Split", "Icebox", "Breeze", "Fracture", "Pearl", "Lotus",
            "Sunset", "Abyss",
        ]
        .iter()
        .map(|name| {
            let id = slug(name);
            MapRecord {
                image_path: format!("maps/{}.png", id),
                id,
                display_name: name.to_string(),
                local_name: None,
            }
        })
        .collect();

        let heroes = [
            ("Sova", ["Owl Drone", "Shock Bolt", "Recon Bolt", "Hunter's Fury"]),
            ("Viper", ["Snake Bite", "Poison Cloud", "Toxic Screen", "Viper's Pit"]),
            ("Killjoy", ["Alarmbot", "Turret", "Nanoswarm", "Lockdown"]),
            ("Brimstone", ["Stim Beacon", "Incendiary", "Sky Smoke", "Orbital Strike"]),
            ("Jett", ["Cloudburst", "Updraft", "Tailwind", "Blade Storm"]),
            ("Sage", ["Barrier Orb", "Slow Orb", "Healing Orb", "Resurrection"]),
        ]
        .iter()
        .map(|(name, abilities)| {
            let id = slug(name);
            HeroRecord {
                image_path: format!("hero/{}.png", id),
                id,
                display_name: name.to_string(),
                local_name: None,
                abilities: abilities
                    .iter()
                    .zip(["C", "Q", "E", "X"])
                    .map(|(a, k)| AbilityRecord {
                        id: slug(a),
                        display_name: a.to_string(),
                        key: Some(k.to_string()),
                    })
                    .collect(),
            }
        })
        .collect();

        Self { maps, heroes }
    }
}

fn find_catalog_file(dir: &Path, candidates: &[&str]) -> Option<PathBuf> {
    candidates
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.is_file())
}
