// Saved callouts
// One pretty-printed JSON file per record: `<data_dir>/<uuid>.json`.

use anyhow::{Context, Result};
use log::{info, warn};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::models::callout::CalloutRecord;
use crate::models::selection::Side;

/// Filter for `CalloutStore::query`. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalloutQuery {
    pub map: Option<String>,
    pub hero: Option<String>,
    pub side: Option<Side>,
}

impl CalloutQuery {
    /// Map and hero match on id or display name, case-insensitively.
    pub fn matches(&self, record: &CalloutRecord) -> bool {
        let named = |wanted: &Option<String>, id: &str, display: &str| {
            wanted.as_deref().map_or(true, |w| {
                let w = w.trim();
                id.eq_ignore_ascii_case(w) || display.eq_ignore_ascii_case(w)
            })
        };

        named(&self.map, &record.map.id, &record.map.display_name)
            && named(&self.hero, &record.hero.id, &record.hero.display_name)
            && self.side.map_or(true, |s| s == record.side)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_none() && self.hero.is_none() && self.side.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct CalloutStore {
    dir: PathBuf,
}

impl CalloutStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    /// Write `record`, replacing any earlier file with the same id.
    pub fn save(&self, record: &CalloutRecord) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create data folder {:?}", self.dir))?;

        let path = self.record_path(record.id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(record).context("Failed to serialize callout")?;

        std::fs::write(&tmp, json).with_context(|| format!("Failed to write {:?}", tmp))?;
        if let Err(e) = std::fs::rename(&tmp, &path) {
            if let Err(cleanup) = std::fs::remove_file(&tmp) {
                warn!(
                    "[PHASE: storage] [STEP: save] Could not remove {:?}: {}",
                    tmp, cleanup
                );
            }
            return Err(e).with_context(|| format!("Failed to move {:?} into place", tmp));
        }

        info!(
            "[PHASE: storage] [STEP: save] Saved callout {} to {:?}",
            record.id, path
        );
        Ok(path)
    }

    pub fn load(&self, id: Uuid) -> Result<CalloutRecord> {
        let path = self.record_path(id);
        let raw =
            std::fs::read_to_string(&path).with_context(|| format!("Failed to read {:?}", path))?;
        serde_json::from_str(&raw).with_context(|| format!("Failed to parse {:?}", path))
    }

    /// Every readable record, oldest first. Files that fail to parse are skipped with a warning.
    pub fn list(&self) -> Result<Vec<CalloutRecord>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }

        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read data folder {:?}", self.dir))?;

        let mut records = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let parsed = std::fs::read_to_string(&path)
                .map_err(anyhow::Error::from)
                .and_then(|raw| Ok(serde_json::from_str::<CalloutRecord>(&raw)?));
            match parsed {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    "[PHASE: storage] [STEP: list] Skipping unreadable callout {:?}: {}",
                    path, e
                ),
            }
        }

        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(records)
    }

    pub fn query(&self, query: &CalloutQuery) -> Result<Vec<CalloutRecord>> {
        let mut records = self.list()?;
        records.retain(|r| query.matches(r));
        Ok(records)
    }

    pub fn delete(&self, id: Uuid) -> Result<bool> {
        let path = self.record_path(id);
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path).with_context(|| format!("Failed to delete {:?}", path))?;
        info!("[PHASE: storage] [STEP: delete] Deleted callout {}", id);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::callout::CalloutForm;
    use crate::models::catalog::Catalog;
    use chrono::{Duration, Utc};

    fn record(map: &str, hero: &str, side: Side, minutes_ago: i64) -> CalloutRecord {
        let catalog = Catalog::builtin();
        let hero = catalog.hero(hero).cloned().expect("hero");
        CalloutRecord {
            id: Uuid::new_v4(),
            created_at: Utc::now() - Duration::minutes(minutes_ago),
            map: catalog.map(map).cloned().expect("map"),
            ability: hero.abilities[0].clone(),
            hero,
            side,
            form: CalloutForm {
                position: format!("{} spot", map),
                ..CalloutForm::default()
            },
        }
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CalloutStore::new(dir.path().join("callouts"));
        let rec = record("bind", "viper", Side::Defense, 0);

        let path = store.save(&rec).expect("save");
        assert!(path.ends_with(format!("{}.json", rec.id)));
        assert_eq!(store.load(rec.id).expect("load"), rec);
    }

    #[test]
    fn list_is_sorted_and_skips_garbage() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CalloutStore::new(dir.path());
        let newer = record("haven", "sage", Side::Attack, 1);
        let older = record("split", "jett", Side::Attack, 10);
        store.save(&newer).expect("save");
        store.save(&older).expect("save");
        std::fs::write(dir.path().join("broken.json"), "{ nope").expect("write");
        std::fs::write(dir.path().join("readme.txt"), "ignored").expect("write");

        let all = store.list().expect("list");
        assert_eq!(all.iter().map(|r| r.id).collect::<Vec<_>>(), vec![older.id, newer.id]);
    }

    #[test]
    fn list_of_missing_folder_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CalloutStore::new(dir.path().join("never-created"));
        assert!(store.list().expect("list").is_empty());
    }

    #[test]
    fn query_filters_by_map_hero_and_side() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CalloutStore::new(dir.path());
        store.save(&record("ascent", "sova", Side::Attack, 3)).expect("save");
        store.save(&record("ascent", "sova", Side::Defense, 2)).expect("save");
        store.save(&record("lotus", "sova", Side::Attack, 1)).expect("save");

        let q = CalloutQuery {
            map: Some("Ascent".to_string()),
            hero: Some("sova".to_string()),
            side: Some(Side::Attack),
        };
        let hits = store.query(&q).expect("query");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].map.id, "ascent");
        assert_eq!(hits[0].side, Side::Attack);

        assert_eq!(store.query(&CalloutQuery::default()).expect("query").len(), 3);
    }

    #[test]
    fn failed_save_leaves_no_temp_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CalloutStore::new(dir.path());
        let rec = record("icebox", "sage", Side::Attack, 0);

        // A non-empty directory where the record file should go makes the rename fail.
        let blocker = dir.path().join(format!("{}.json", rec.id));
        std::fs::create_dir(&blocker).expect("mkdir");
        std::fs::write(blocker.join("keep"), "x").expect("write");

        assert!(store.save(&rec).is_err());
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .expect("read_dir")
            .filter_map(|e| e.ok())
            .filter(|e| e.path().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "temp files left: {:?}", leftovers);
    }

    #[test]
    fn delete_removes_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CalloutStore::new(dir.path());
        let rec = record("pearl", "killjoy", Side::Defense, 0);
        store.save(&rec).expect("save");

        assert!(store.delete(rec.id).expect("delete"));
        assert!(!store.delete(rec.id).expect("second delete"));
        assert!(store.load(rec.id).is_err());
    }
}
