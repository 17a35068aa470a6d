use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::GenerationError;

/// Options for a synthesis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateOptions {
    /// Run seed. When unset, the client's per-model run counter is used.
    pub seed: Option<String>,
    /// Maximum regeneration attempts per row before a unique constraint is
    /// reported as unsatisfiable.
    pub max_constraint_attempts: u32,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            seed: None,
            max_constraint_attempts: 50,
        }
    }
}

impl GenerateOptions {
    pub fn with_seed(mut self, seed: impl Into<String>) -> Self {
        self.seed = Some(seed.into());
        self
    }

    pub fn with_max_constraint_attempts(mut self, attempts: u32) -> Self {
        self.max_constraint_attempts = attempts;
        self
    }

    /// Parse options from a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, GenerationError> {
        toml::from_str(contents).map_err(|err| GenerationError::Config(err.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, GenerationError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }
}

/// Summary of one model touched by a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelReport {
    pub model: String,
    pub rows_generated: u64,
    pub retries: u64,
}

/// Report for a synthesis run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationReport {
    pub seed: String,
    pub models: Vec<ModelReport>,
    pub rows_total: u64,
    pub retries_total: u64,
    pub duration_ms: u64,
}

impl GenerationReport {
    pub fn new(seed: impl Into<String>) -> Self {
        Self {
            seed: seed.into(),
            ..Self::default()
        }
    }

    pub fn record_row(&mut self, model: &str) {
        self.entry(model).rows_generated += 1;
        self.rows_total += 1;
    }

    pub fn record_retry(&mut self, model: &str) {
        self.entry(model).retries += 1;
        self.retries_total += 1;
    }

    pub fn model(&self, model: &str) -> Option<&ModelReport> {
        self.models.iter().find(|report| report.model == model)
    }

    fn entry(&mut self, model: &str) -> &mut ModelReport {
        let index = match self.models.iter().position(|report| report.model == model) {
            Some(index) => index,
            None => {
                self.models.push(ModelReport {
                    model: model.to_string(),
                    rows_generated: 0,
                    retries: 0,
                });
                self.models.len() - 1
            }
        };
        &mut self.models[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_overrides_keep_defaults() {
        let options = GenerateOptions::from_toml_str("seed = \"fixture\"").expect("parse toml");
        assert_eq!(options.seed.as_deref(), Some("fixture"));
        assert_eq!(options.max_constraint_attempts, 50);
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let err = GenerateOptions::from_toml_str("max_constraint_attempts = \"many\"")
            .expect_err("type mismatch");
        assert!(matches!(err, GenerationError::Config(_)));
    }

    #[test]
    fn report_tracks_models_in_first_seen_order() {
        let mut report = GenerationReport::new("0");
        report.record_row("User");
        report.record_row("Post");
        report.record_retry("User");
        report.record_row("User");

        let names: Vec<_> = report.models.iter().map(|m| m.model.as_str()).collect();
        assert_eq!(names, vec!["User", "Post"]);
        assert_eq!(report.model("User").map(|m| m.rows_generated), Some(2));
        assert_eq!(report.retries_total, 1);
        assert_eq!(report.rows_total, 3);
    }
}
