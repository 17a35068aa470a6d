use seedforge_core::{Row, Value};

/// Normalize a generated value into its storage-ready form.
///
/// Scalar JSON values collapse to their typed variants and non-finite floats
/// become `Null`, so equal data always serializes to the same row.
pub fn serialize_value(value: Value) -> Value {
    match value {
        Value::Float(value) if !value.is_finite() => Value::Null,
        Value::Json(json) => match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(value) => Value::Bool(value),
            serde_json::Value::String(value) => Value::Text(value),
            serde_json::Value::Number(number) => match number.as_i64() {
                Some(value) => Value::Int(value),
                None => number
                    .as_f64()
                    .map(Value::Float)
                    .map(serialize_value)
                    .unwrap_or(Value::Null),
            },
            other => Value::Json(other),
        },
        other => other,
    }
}

pub fn serialize_row(row: Row) -> Row {
    row.into_iter()
        .map(|(field, value)| (field, serialize_value(value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_scalar_json() {
        assert_eq!(serialize_value(Value::Json(serde_json::json!(3))), Value::Int(3));
        assert_eq!(
            serialize_value(Value::Json(serde_json::json!("x"))),
            Value::Text("x".to_string())
        );
        assert_eq!(
            serialize_value(Value::Json(serde_json::json!({"a": 1}))),
            Value::Json(serde_json::json!({"a": 1}))
        );
    }

    #[test]
    fn drops_non_finite_floats() {
        assert_eq!(serialize_value(Value::Float(f64::NAN)), Value::Null);
        assert_eq!(serialize_value(Value::Float(1.5)), Value::Float(1.5));
    }
}
