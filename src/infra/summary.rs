// ============================================================
// Layer 6 — Summary Manager
// ============================================================
// Accumulates named metrics into a JSON file that survives
// across runs. Training writes the best epoch's train and
// validation summaries; `evaluate` merges in one entry per
// evaluated split:
//
//   {
//     "train":      { "loss": 0.21, "acc": 0.93 },
//     "validation": { "loss": 0.33, "acc": 0.88 },
//     "test":       { "loss": 0.35, "acc": 0.87 }
//   }

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use serde_json::{Map, Value};

/// Scalar metrics of one split, e.g. `{"loss": 0.3, "acc": 0.9}`.
pub type Summary = BTreeMap<String, f64>;

pub struct SummaryManager {
    model_dir: PathBuf,
    summary:   Map<String, Value>,
}

impl SummaryManager {
    pub fn new(model_dir: impl AsRef<Path>) -> Self {
        Self { model_dir: model_dir.as_ref().to_path_buf(), summary: Map::new() }
    }

    /// Write the current summary as pretty JSON to `<model_dir>/<filename>`.
    pub fn save(&self, filename: &str) -> Result<()> {
        fs::create_dir_all(&self.model_dir)?;
        let path = self.model_dir.join(filename);
        let json = serde_json::to_string_pretty(&self.summary)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write summary to '{}'", path.display()))?;
        tracing::debug!("Saved summary to '{}'", path.display());
        Ok(())
    }

    /// Merge the contents of `<model_dir>/<filename>` into the current summary.
    /// A missing file leaves the summary unchanged.
    pub fn load(&mut self, filename: &str) -> Result<()> {
        let path = self.model_dir.join(filename);
        if !path.exists() {
            tracing::debug!("No summary at '{}' yet", path.display());
            return Ok(());
        }
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read summary '{}'", path.display()))?;
        match serde_json::from_str::<Value>(&json)
            .with_context(|| format!("Invalid JSON in '{}'", path.display()))?
        {
            Value::Object(map) => {
                self.update(map);
                Ok(())
            }
            _ => Err(anyhow!("Summary '{}' must be a JSON object", path.display())),
        }
    }

    /// Shallow merge: top-level keys of `other` replace existing ones.
    pub fn update(&mut self, other: Map<String, Value>) {
        self.summary.extend(other);
    }

    /// Convenience for the common `{split: summary}` update.
    pub fn update_split(&mut self, split: &str, summary: &Summary) -> Result<()> {
        let mut map = Map::new();
        map.insert(split.to_string(), serde_json::to_value(summary)?);
        self.update(map);
        Ok(())
    }

    pub fn reset(&mut self) {
        self.summary.clear();
    }

    pub fn summary(&self) -> &Map<String, Value> {
        &self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn summary(loss: f64, acc: f64) -> Summary {
        Summary::from([("loss".to_string(), loss), ("acc".to_string(), acc)])
    }

    #[test]
    fn test_save_then_load_merges() {
        let dir = tempfile::tempdir().unwrap();

        let mut first = SummaryManager::new(dir.path());
        first.update_split("train", &summary(0.5, 0.75)).unwrap();
        first.save("summary.json").unwrap();

        let mut second = SummaryManager::new(dir.path());
        second.update_split("test", &summary(0.6, 0.7)).unwrap();
        second.load("summary.json").unwrap();

        assert!(second.summary().contains_key("train"));
        assert!(second.summary().contains_key("test"));
        assert_eq!(second.summary()["train"]["acc"], json!(0.75));
    }

    #[test]
    fn test_update_replaces_top_level_key() {
        let mut m = SummaryManager::new("unused");
        m.update_split("validation", &summary(1.0, 0.1)).unwrap();
        m.update_split("validation", &summary(0.2, 0.9)).unwrap();
        assert_eq!(m.summary()["validation"]["loss"], json!(0.2));
    }

    #[test]
    fn test_reset_clears() {
        let mut m = SummaryManager::new("unused");
        m.update_split("train", &summary(0.1, 0.2)).unwrap();
        m.reset();
        assert!(m.summary().is_empty());
    }

    #[test]
    fn test_load_missing_file_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = SummaryManager::new(dir.path());
        m.load("summary.json").unwrap();
        assert!(m.summary().is_empty());
    }
}
