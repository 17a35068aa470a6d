use std::sync::Mutex;

use async_trait::async_trait;
use seedforge_core::{DataModel, Value};

use crate::errors::{BoxError, GenerationError};
use crate::store::{RowState, Store};

/// Destination for emitted write statements.
#[async_trait]
pub trait ExecutionSink: Send + Sync {
    async fn run(&self, statements: Vec<String>) -> Result<(), BoxError>;
}

/// Sink that keeps every batch in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    batches: Mutex<Vec<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> Vec<Vec<String>> {
        match self.batches.lock() {
            Ok(batches) => batches.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl ExecutionSink for MemorySink {
    async fn run(&self, statements: Vec<String>) -> Result<(), BoxError> {
        self.batches
            .lock()
            .map_err(|err| err.to_string())?
            .push(statements);
        Ok(())
    }
}

/// One `INSERT` per finalized row, in store order.
///
/// Columns follow the declared scalar order and only include fields present
/// on the row.
pub fn to_statements(data_model: &DataModel, store: &Store) -> Result<Vec<String>, GenerationError> {
    let mut statements = Vec::with_capacity(store.len());
    for entry in store.entries() {
        if entry.state != RowState::Finalized {
            continue;
        }
        let model = data_model.model(&entry.model)?;
        let mut columns = Vec::new();
        let mut values = Vec::new();
        for field in model.grouped().scalars {
            if let Some(value) = entry.row.get(&field.name) {
                columns.push(quote_ident(&field.name));
                values.push(sql_literal(value));
            }
        }

        let table = quote_ident(&model.name);
        if columns.is_empty() {
            statements.push(format!("INSERT INTO {table} DEFAULT VALUES;"));
        } else {
            statements.push(format!(
                "INSERT INTO {table} ({}) VALUES ({});",
                columns.join(", "),
                values.join(", ")
            ));
        }
    }
    Ok(statements)
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_text(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

fn sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Int(value) => value.to_string(),
        Value::Float(value) if value.is_finite() => value.to_string(),
        Value::Float(_) => "NULL".to_string(),
        Value::Text(value) | Value::Uuid(value) => quote_text(value),
        Value::Json(value) => quote_text(&value.to_string()),
        other => quote_text(&other.key()),
    }
}

#[cfg(test)]
mod tests {
    use seedforge_core::{Model, Row, ScalarField};

    use super::*;

    fn data_model() -> DataModel {
        DataModel::new([Model::new("User")
            .with_field(ScalarField::id("id"))
            .with_field(ScalarField::new("name"))
            .with_field(ScalarField::new("active"))])
    }

    #[test]
    fn renders_declared_columns_only() {
        let mut store = Store::new();
        store.add_finalized(
            "User",
            Row::from([
                ("name".to_string(), Value::from("O'Hara")),
                ("id".to_string(), Value::Int(7)),
            ]),
        );
        store.add("User", Row::from([("id".to_string(), Value::Int(8))]));

        let statements = to_statements(&data_model(), &store).expect("emit statements");
        assert_eq!(
            statements,
            vec![r#"INSERT INTO "User" ("id", "name") VALUES (7, 'O''Hara');"#.to_string()]
        );
    }

    #[test]
    fn unknown_model_is_a_schema_error() {
        let mut store = Store::new();
        store.add_finalized("Ghost", Row::new());
        let err = to_statements(&data_model(), &store).expect_err("unknown model");
        assert!(matches!(err, GenerationError::Schema(_)));
    }
}
