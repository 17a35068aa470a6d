use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Options handed to a field generator, looked up from the fingerprint.
pub type GenerateFieldOptions = serde_json::Map<String, serde_json::Value>;

/// Per-model, per-field generation hints produced by an external fingerprinting step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint {
    models: BTreeMap<String, BTreeMap<String, FingerprintField>>,
}

/// Hint recorded for a single field. Only the options shape feeds generators.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FingerprintField {
    Options { options: GenerateFieldOptions },
    Other(serde_json::Value),
}

impl Fingerprint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_options(
        mut self,
        model: &str,
        field: &str,
        options: GenerateFieldOptions,
    ) -> Self {
        self.models
            .entry(model.to_string())
            .or_default()
            .insert(field.to_string(), FingerprintField::Options { options });
        self
    }

    /// Options for `model.field`; empty when the field has no options hint.
    pub fn generate_options(&self, model: &str, field: &str) -> GenerateFieldOptions {
        match self.models.get(model).and_then(|fields| fields.get(field)) {
            Some(FingerprintField::Options { options }) => options.clone(),
            _ => GenerateFieldOptions::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_options_or_empty_map() {
        let fingerprint = Fingerprint::from_json_str(
            r#"{
              "User": {
                "age": {"options": {"min": 18, "max": 99}},
                "bio": {"count": 3}
              }
            }"#,
        )
        .expect("decode fingerprint");

        let age = fingerprint.generate_options("User", "age");
        assert_eq!(age.get("min"), Some(&serde_json::json!(18)));
        assert!(fingerprint.generate_options("User", "bio").is_empty());
        assert!(fingerprint.generate_options("Post", "title").is_empty());
    }
}
