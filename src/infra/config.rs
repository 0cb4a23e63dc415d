// ============================================================
// Layer 6 — Config Loader
// ============================================================
// Reads a JSON file into a read-only, attribute-style namespace.
//
// Two namespaces are used by every command:
//   <data_dir>/config.json   — corpus and vocabulary paths
//   <model_dir>/config.json  — model hyper-parameters
//
// Example data config:
//   {
//     "train":      "data/train.tsv",
//     "validation": "data/validation.tsv",
//     "test":       "data/test.tsv",
//     "vocab":      "data/vocab.json"
//   }

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

/// A JSON object loaded from disk. Values are read, never written.
#[derive(Debug, Clone)]
pub struct Config {
    path:   PathBuf,
    values: Map<String, Value>,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read config '{}'", path.display()))?;
        let value: Value = serde_json::from_str(&json)
            .with_context(|| format!("Invalid JSON in '{}'", path.display()))?;
        match value {
            Value::Object(values) => Ok(Self { path, values }),
            _ => Err(anyhow!("Config '{}' must be a JSON object", path.display())),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Attribute-style access: `data_config.get::<String>("train")`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self.values.get(key).ok_or_else(|| {
            anyhow!("Key '{}' not found in config '{}'", key, self.path.display())
        })?;
        serde_json::from_value(value.clone()).with_context(|| {
            format!("Key '{}' in '{}' has an unexpected type", key, self.path.display())
        })
    }

    pub fn get_opt<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        if self.contains(key) { self.get(key).map(Some) } else { Ok(None) }
    }

    /// A path-valued key, e.g. the split named by `--dataset`.
    pub fn path_of(&self, key: &str) -> Result<PathBuf> {
        self.get::<String>(key).map(PathBuf::from)
    }

    /// Deserialize the whole namespace into a typed struct.
    pub fn typed<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.values.clone()))
            .with_context(|| format!("Cannot interpret config '{}'", self.path.display()))
    }
}

// ─── Model Configuration ─────────────────────────────────────────────────────
// Union of the hyper-parameters used by the three pipelines.
// Keys missing from config.json fall back to the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub num_classes:           usize,
    /// Fixed input length of the pairwise classifier
    pub length:                usize,
    pub batch_size:            usize,
    pub epochs:                usize,
    pub learning_rate:         f64,
    /// Evaluate the validation loss every N global steps
    pub summary_step:          usize,
    /// Used when the vocabulary carries no pretrained embedding
    pub embedding_dim:         usize,
    pub hidden_dim:            usize,
    pub fine_embedding_dim:    usize,
    pub multi_step:            usize,
    pub prediction_drop_ratio: f64,
    pub d_model:               usize,
    pub num_heads:             usize,
    pub num_layers:            usize,
    pub d_ff:                  usize,
    pub dropout:               f64,
    pub freeze_embedding:      bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            num_classes:           2,
            length:                64,
            batch_size:            64,
            epochs:                5,
            learning_rate:         1e-3,
            summary_step:          500,
            embedding_dim:         300,
            hidden_dim:            128,
            fine_embedding_dim:    32,
            multi_step:            5,
            prediction_drop_ratio: 0.2,
            d_model:               256,
            num_heads:             8,
            num_layers:            4,
            d_ff:                  1024,
            dropout:               0.1,
            freeze_embedding:      true,
        }
    }
}

impl ModelConfig {
    pub fn load(model_dir: impl AsRef<Path>) -> Result<Self> {
        Config::load(model_dir.as_ref().join("config.json"))?.typed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("config.json");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_attribute_access() {
        let dir  = tempfile::tempdir().unwrap();
        let path = write(dir.path(), r#"{"train": "data/train.tsv", "batch_size": 32}"#);
        let cfg  = Config::load(&path).unwrap();
        assert_eq!(cfg.path_of("train").unwrap(), PathBuf::from("data/train.tsv"));
        assert_eq!(cfg.get::<usize>("batch_size").unwrap(), 32);
        assert!(cfg.get_opt::<String>("test").unwrap().is_none());
    }

    #[test]
    fn test_missing_key_names_key() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load(write(dir.path(), r#"{"a": 1}"#)).unwrap();
        let err = cfg.get::<usize>("validation").unwrap_err();
        assert!(err.to_string().contains("validation"));
    }

    #[test]
    fn test_non_object_rejected() {
        let dir  = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "[1, 2, 3]");
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_model_config_defaults_fill_gaps() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), r#"{"num_classes": 3, "learning_rate": 0.0005}"#);
        let cfg = ModelConfig::load(dir.path()).unwrap();
        assert_eq!(cfg.num_classes, 3);
        assert_eq!(cfg.learning_rate, 5e-4);
        assert_eq!(cfg.batch_size, ModelConfig::default().batch_size);
    }
}
