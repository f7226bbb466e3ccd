//! Result rendering helpers shared by the binary and library callers.

use polars::prelude::*;
use serde_json::{Map, Value};

/// Render every row of `df` as a JSON object keyed by column name. Values
/// without a JSON counterpart fall back to their display text.
pub fn dataframe_to_json(df: &DataFrame) -> Value {
    let columns = df.get_columns();
    let mut out = Vec::with_capacity(df.height());
    for row in 0..df.height() {
        let mut map = Map::with_capacity(columns.len());
        for col in columns {
            let v = match col.get(row) {
                Ok(av) => any_to_json(&av),
                Err(_) => Value::Null,
            };
            map.insert(col.name().to_string(), v);
        }
        out.push(Value::Object(map));
    }
    Value::Array(out)
}

fn any_to_json(av: &AnyValue) -> Value {
    match av {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(b) => Value::Bool(*b),
        AnyValue::Int8(v) => Value::from(*v as i64),
        AnyValue::Int16(v) => Value::from(*v as i64),
        AnyValue::Int32(v) => Value::from(*v as i64),
        AnyValue::Int64(v) => Value::from(*v),
        AnyValue::UInt8(v) => Value::from(*v as u64),
        AnyValue::UInt16(v) => Value::from(*v as u64),
        AnyValue::UInt32(v) => Value::from(*v as u64),
        AnyValue::UInt64(v) => Value::from(*v),
        // NaN and infinities have no JSON form; serde_json maps them to null
        AnyValue::Float32(v) => serde_json::Number::from_f64(*v as f64).map(Value::Number).unwrap_or(Value::Null),
        AnyValue::Float64(v) => serde_json::Number::from_f64(*v).map(Value::Number).unwrap_or(Value::Null),
        AnyValue::String(s) => Value::String(s.to_string()),
        AnyValue::StringOwned(s) => Value::String(s.to_string()),
        other => Value::String(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_become_objects_keyed_by_column() {
        let df = df!(
            "id" => [1i64, 2],
            "name" => [Some("a"), None],
            "score" => [0.5f64, f64::NAN]
        )
        .unwrap();
        let v = dataframe_to_json(&df);
        let rows = v.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], Value::from(1));
        assert_eq!(rows[0]["name"], Value::from("a"));
        assert_eq!(rows[1]["name"], Value::Null);
        assert_eq!(rows[1]["score"], Value::Null);
        assert_eq!(rows[0].as_object().unwrap().len(), 3);
    }
}
