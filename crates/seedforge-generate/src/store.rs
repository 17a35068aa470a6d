use std::collections::BTreeMap;

use seedforge_core::{Row, Value};

/// Handle to a row stored in a [`Store`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(usize);

/// Lifecycle of a stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowState {
    /// Registered with its identifiers; remaining fields may still be missing.
    UnderConstruction,
    /// The generation call that owns the row has returned.
    Finalized,
}

/// Row entry together with its model and lifecycle state.
#[derive(Debug, Clone)]
pub struct StoredRow {
    pub model: String,
    pub row: Row,
    pub state: RowState,
}

/// Ordered, per-model accumulation of generated rows.
///
/// Rows live in an arena in registration order, which is also a valid
/// insertion order for the relational store: a parent row is always
/// registered before the rows that reference it.
#[derive(Debug, Clone, Default)]
pub struct Store {
    rows: Vec<StoredRow>,
    by_model: BTreeMap<String, Vec<RowId>>,
    model_order: Vec<String>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a row under construction.
    pub fn add(&mut self, model: &str, row: Row) -> RowId {
        self.push(model, row, RowState::UnderConstruction)
    }

    /// Register an already complete row (e.g. rows loaded from elsewhere).
    pub fn add_finalized(&mut self, model: &str, row: Row) -> RowId {
        self.push(model, row, RowState::Finalized)
    }

    pub fn set(&mut self, id: RowId, field: &str, value: Value) {
        if let Some(entry) = self.rows.get_mut(id.0) {
            entry.row.insert(field.to_string(), value);
        }
    }

    pub fn finalize(&mut self, id: RowId) {
        if let Some(entry) = self.rows.get_mut(id.0) {
            entry.state = RowState::Finalized;
        }
    }

    pub fn row(&self, id: RowId) -> Option<&Row> {
        self.rows.get(id.0).map(|entry| &entry.row)
    }

    pub fn state(&self, id: RowId) -> Option<RowState> {
        self.rows.get(id.0).map(|entry| entry.state)
    }

    /// Every row of `model`, including rows still under construction.
    pub fn rows(&self, model: &str) -> Vec<&Row> {
        self.ids(model)
            .iter()
            .filter_map(|id| self.row(*id))
            .collect()
    }

    /// Finalized rows of `model` only.
    pub fn completed(&self, model: &str) -> Vec<&Row> {
        self.ids(model)
            .iter()
            .filter_map(|id| self.rows.get(id.0))
            .filter(|entry| entry.state == RowState::Finalized)
            .map(|entry| &entry.row)
            .collect()
    }

    /// Models in the order their first row was registered.
    pub fn models(&self) -> &[String] {
        &self.model_order
    }

    /// All entries in registration order.
    pub fn entries(&self) -> &[StoredRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append every row of `other`, keeping its order and row states.
    pub fn merge(&mut self, other: &Store) {
        for entry in &other.rows {
            self.push(&entry.model, entry.row.clone(), entry.state);
        }
    }

    /// JSON snapshot: model name to an array of rows.
    pub fn to_json(&self) -> serde_json::Value {
        let mut models = serde_json::Map::new();
        for model in &self.model_order {
            let rows = self
                .rows(model)
                .into_iter()
                .map(|row| {
                    serde_json::Value::Object(
                        row.iter()
                            .map(|(field, value)| (field.clone(), value.to_json()))
                            .collect(),
                    )
                })
                .collect();
            models.insert(model.clone(), serde_json::Value::Array(rows));
        }
        serde_json::Value::Object(models)
    }

    fn ids(&self, model: &str) -> &[RowId] {
        self.by_model
            .get(model)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn push(&mut self, model: &str, row: Row, state: RowState) -> RowId {
        let id = RowId(self.rows.len());
        self.rows.push(StoredRow {
            model: model.to_string(),
            row,
            state,
        });
        let ids = self.by_model.entry(model.to_string()).or_default();
        if ids.is_empty() {
            self.model_order.push(model.to_string());
        }
        ids.push(id);
        id
    }
}
