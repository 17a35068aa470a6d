use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Typed description of every model the engine can synthesize.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct DataModel {
    /// Models keyed by name.
    #[serde(default)]
    pub models: BTreeMap<String, Model>,
}

impl DataModel {
    /// Build a data model from a list of models, keyed by their names.
    pub fn new(models: impl IntoIterator<Item = Model>) -> Self {
        Self {
            models: models
                .into_iter()
                .map(|model| (model.name.clone(), model))
                .collect(),
        }
    }

    /// Decode a data model from its JSON representation.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn model(&self, name: &str) -> Result<&Model> {
        self.models
            .get(name)
            .ok_or_else(|| Error::UnknownModel(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    /// Find the parent-side relation on the child model that a child field mirrors.
    pub fn inverse_relation(&self, child: &ChildField) -> Result<&ParentField> {
        let model = self.model(&child.target)?;
        model
            .fields
            .iter()
            .find_map(|field| match field {
                Field::Parent(parent) if parent.relation_name == child.relation_name => {
                    Some(parent)
                }
                _ => None,
            })
            .ok_or_else(|| {
                Error::InvalidSchema(format!(
                    "relation '{}' has no parent side on model '{}'",
                    child.relation_name, child.target
                ))
            })
    }
}

/// A table-like model with ordered fields.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Model {
    pub name: String,
    pub fields: Vec<Field>,
    #[serde(default)]
    pub unique_constraints: Vec<UniqueConstraint>,
}

impl Model {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            unique_constraints: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: impl Into<Field>) -> Self {
        self.fields.push(field.into());
        self
    }

    pub fn with_unique<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unique_constraints
            .push(UniqueConstraint::new(fields.into_iter().map(Into::into).collect()));
        self
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name() == name)
    }

    pub fn scalar(&self, name: &str) -> Option<&ScalarField> {
        match self.field(name) {
            Some(Field::Scalar(scalar)) => Some(scalar),
            _ => None,
        }
    }

    pub fn grouped(&self) -> GroupedFields<'_> {
        group_fields(&self.fields)
    }
}

/// Field of a model. The set of kinds is closed.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Field {
    Scalar(ScalarField),
    Parent(ParentField),
    Child(ChildField),
}

impl Field {
    pub fn name(&self) -> &str {
        match self {
            Field::Scalar(field) => &field.name,
            Field::Parent(field) => &field.name,
            Field::Child(field) => &field.name,
        }
    }
}

impl From<ScalarField> for Field {
    fn from(value: ScalarField) -> Self {
        Field::Scalar(value)
    }
}

impl From<ParentField> for Field {
    fn from(value: ParentField) -> Self {
        Field::Parent(value)
    }
}

impl From<ChildField> for Field {
    fn from(value: ChildField) -> Self {
        Field::Child(value)
    }
}

/// Column stored on the model itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ScalarField {
    pub name: String,
    /// Part of the model identifier.
    #[serde(default)]
    pub is_id: bool,
    /// Always computed by the database.
    #[serde(default)]
    pub is_generated: bool,
    /// The database supplies a default value.
    #[serde(default)]
    pub has_default_value: bool,
    /// Defaulted by a sequence that should still be mocked.
    #[serde(default)]
    pub sequence: bool,
}

impl ScalarField {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn id(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_id: true,
            ..Self::default()
        }
    }

    pub fn generated(mut self) -> Self {
        self.is_generated = true;
        self
    }

    pub fn with_default(mut self) -> Self {
        self.has_default_value = true;
        self
    }

    pub fn sequence(mut self) -> Self {
        self.has_default_value = true;
        self.sequence = true;
        self
    }
}

/// Many-to-one reference from this model to `target`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ParentField {
    pub name: String,
    pub target: String,
    /// Columns on this model.
    pub from_fields: Vec<String>,
    /// Columns on the parent model, aligned with `from_fields`.
    pub to_fields: Vec<String>,
    #[serde(default)]
    pub is_required: bool,
    pub relation_name: String,
}

impl ParentField {
    pub fn new(
        name: impl Into<String>,
        target: impl Into<String>,
        relation_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            from_fields: Vec::new(),
            to_fields: Vec::new(),
            is_required: true,
            relation_name: relation_name.into(),
        }
    }

    pub fn columns(mut self, from: &str, to: &str) -> Self {
        self.from_fields.push(from.to_string());
        self.to_fields.push(to.to_string());
        self
    }

    pub fn optional(mut self) -> Self {
        self.is_required = false;
        self
    }

    /// Pairs of (column on this model, column on the parent).
    pub fn column_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.from_fields
            .iter()
            .zip(&self.to_fields)
            .map(|(from, to)| (from.as_str(), to.as_str()))
    }
}

/// One-to-many side of a parent relation declared on `target`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ChildField {
    pub name: String,
    pub target: String,
    pub relation_name: String,
}

impl ChildField {
    pub fn new(
        name: impl Into<String>,
        target: impl Into<String>,
        relation_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            relation_name: relation_name.into(),
        }
    }
}

/// Uniqueness constraint over an ordered tuple of fields.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UniqueConstraint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub fields: Vec<String>,
}

impl UniqueConstraint {
    pub fn new(fields: Vec<String>) -> Self {
        Self { name: None, fields }
    }

    /// Declared name, or the joined field list when unnamed.
    pub fn label(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.fields.join("_"))
    }
}

/// Fields of a model partitioned by kind, each group in declared order.
#[derive(Debug, Clone, Default)]
pub struct GroupedFields<'a> {
    pub scalars: Vec<&'a ScalarField>,
    pub parents: Vec<&'a ParentField>,
    pub children: Vec<&'a ChildField>,
}

pub fn group_fields(fields: &[Field]) -> GroupedFields<'_> {
    let mut grouped = GroupedFields::default();
    for field in fields {
        match field {
            Field::Scalar(scalar) => grouped.scalars.push(scalar),
            Field::Parent(parent) => grouped.parents.push(parent),
            Field::Child(child) => grouped.children.push(child),
        }
    }
    grouped
}
