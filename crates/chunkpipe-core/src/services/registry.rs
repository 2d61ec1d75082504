//! Model Registry
//!
//! Static lookup of model capability metadata (token limit, requests per
//! minute, tokens per minute, cost) keyed by model identifier. Loaded once at
//! startup from a JSON file; a missing or broken file yields an empty
//! registry and a warning, never an error.
//!
//! Two file layouts are accepted:
//!
//! ```json
//! { "gpt-4o-mini": { "tokenLimit": 128000, "rpm": 500, "tpm": 200000 } }
//! ```
//!
//! ```json
//! [ { "key": "gpt-4o-mini", "tokenLimit": 128000, "rpm": 500 } ]
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Deserialize;

use crate::models::ModelDescriptor;

/// Token limit assumed for models missing from the registry
pub const DEFAULT_TOKEN_LIMIT: u64 = 100_000;

#[derive(Deserialize)]
#[serde(untagged)]
enum ModelFile {
    Keyed(BTreeMap<String, ModelDescriptor>),
    List(Vec<ModelDescriptor>),
}

/// Immutable map of model key to descriptor
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: HashMap<String, ModelDescriptor>,
}

impl ModelRegistry {
    /// Create an empty registry
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a registry from descriptors, skipping unusable ones
    pub fn from_descriptors(descriptors: impl IntoIterator<Item = ModelDescriptor>) -> Self {
        let mut models = HashMap::new();
        for descriptor in descriptors {
            if descriptor.key.is_empty() {
                log::warn!("Skipping model entry without a key");
                continue;
            }
            if descriptor.token_limit == 0 || descriptor.rpm == 0 {
                log::warn!(
                    "Skipping model {}: tokenLimit and rpm must be positive",
                    descriptor.key
                );
                continue;
            }
            models.insert(descriptor.key.clone(), descriptor);
        }
        Self { models }
    }

    /// Parse a registry from JSON text
    pub fn from_json(json: &str) -> crate::Result<Self> {
        let descriptors = match serde_json::from_str::<ModelFile>(json)? {
            ModelFile::Keyed(map) => map
                .into_iter()
                .map(|(key, mut descriptor)| {
                    descriptor.key = key;
                    descriptor
                })
                .collect::<Vec<_>>(),
            ModelFile::List(list) => list,
        };
        Ok(Self::from_descriptors(descriptors))
    }

    /// Load the registry from a file, degrading to empty on any failure
    pub fn load(path: &Path) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                log::warn!(
                    "Could not read model configuration {}: {}. Continuing without model metadata",
                    path.display(),
                    e
                );
                return Self::empty();
            }
        };

        match Self::from_json(&text) {
            Ok(registry) => {
                log::info!(
                    "Loaded {} model(s) from {}",
                    registry.len(),
                    path.display()
                );
                registry
            }
            Err(e) => {
                log::warn!(
                    "Invalid model configuration {}: {}. Continuing without model metadata",
                    path.display(),
                    e
                );
                Self::empty()
            }
        }
    }

    /// Exact-match lookup
    pub fn lookup(&self, key: &str) -> Option<&ModelDescriptor> {
        self.models.get(key)
    }

    /// Token limit for a model, or `DEFAULT_TOKEN_LIMIT` when unknown
    pub fn token_limit_for(&self, key: &str) -> u64 {
        self.lookup(key)
            .map(|m| m.token_limit)
            .unwrap_or(DEFAULT_TOKEN_LIMIT)
    }

    /// Estimate the cost (in USD) of a call, if the model is known
    pub fn estimate_cost(&self, key: &str, input_tokens: u64, output_tokens: u64) -> Option<f64> {
        self.lookup(key).map(|m| {
            let input_cost = input_tokens as f64 * m.cost_per_million_input / 1_000_000.0;
            let output_cost = output_tokens as f64 * m.cost_per_million_output / 1_000_000.0;
            input_cost + output_cost
        })
    }

    /// All descriptors, sorted by key
    pub fn models(&self) -> Vec<&ModelDescriptor> {
        let mut models: Vec<_> = self.models.values().collect();
        models.sort_by(|a, b| a.key.cmp(&b.key));
        models
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_from_json_keyed() {
        let registry = ModelRegistry::from_json(
            r#"{
                "gpt-4o-mini": { "tokenLimit": 128000, "rpm": 500, "tpm": 200000,
                                 "costPerMillionInput": 0.15, "costPerMillionOutput": 0.6 },
                "claude-3-haiku": { "tokenLimit": 200000, "rpm": 50 }
            }"#,
        )
        .unwrap();

        assert_eq!(registry.len(), 2);
        let model = registry.lookup("gpt-4o-mini").unwrap();
        assert_eq!(model.key, "gpt-4o-mini");
        assert_eq!(model.rpm, 500);
    }

    #[test]
    fn test_from_json_list() {
        let registry = ModelRegistry::from_json(
            r#"[ { "key": "small", "tokenLimit": 4096, "rpm": 3 } ]"#,
        )
        .unwrap();
        assert_eq!(registry.token_limit_for("small"), 4096);
    }

    #[test]
    fn test_invalid_entries_are_skipped() {
        let registry = ModelRegistry::from_json(
            r#"{
                "zero-limit": { "tokenLimit": 0, "rpm": 10 },
                "zero-rpm": { "tokenLimit": 1000, "rpm": 0 },
                "ok": { "tokenLimit": 1000, "rpm": 1 }
            }"#,
        )
        .unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.lookup("ok").is_some());
    }

    #[test]
    fn test_unknown_model_uses_default_limit() {
        let registry = ModelRegistry::empty();
        assert!(registry.lookup("missing").is_none());
        assert_eq!(registry.token_limit_for("missing"), DEFAULT_TOKEN_LIMIT);
    }

    #[test]
    fn test_lookup_is_exact_match() {
        let registry = ModelRegistry::from_descriptors([ModelDescriptor::new("gpt-4o", 128_000, 10)]);
        assert!(registry.lookup("gpt-4o").is_some());
        assert!(registry.lookup("gpt-4o-mini").is_none());
        assert!(registry.lookup("GPT-4O").is_none());
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let registry = ModelRegistry::load(Path::new("/nonexistent/chunkpipe/models.json"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_load_malformed_file_is_empty() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let registry = ModelRegistry::load(file.path());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_load_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "m": {{ "tokenLimit": 2000, "rpm": 2 }} }}"#).unwrap();
        let registry = ModelRegistry::load(file.path());
        assert_eq!(registry.token_limit_for("m"), 2000);
    }

    #[test]
    fn test_estimate_cost() {
        let mut model = ModelDescriptor::new("gpt-4o-mini", 128_000, 500);
        model.cost_per_million_input = 0.15;
        model.cost_per_million_output = 0.60;
        let registry = ModelRegistry::from_descriptors([model]);

        let cost = registry.estimate_cost("gpt-4o-mini", 1000, 500).unwrap();
        // 1000 * 0.15 / 1M + 500 * 0.60 / 1M = 0.00015 + 0.0003 = 0.00045
        assert!((cost - 0.00045).abs() < 1e-10);
        assert!(registry.estimate_cost("unknown", 1000, 500).is_none());
    }

    #[test]
    fn test_models_sorted_by_key() {
        let registry = ModelRegistry::from_descriptors([
            ModelDescriptor::new("b", 10, 1),
            ModelDescriptor::new("a", 10, 1),
        ]);
        let keys: Vec<_> = registry.models().iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }
}
