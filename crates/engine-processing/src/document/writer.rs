use model::core::{store_type::StoreType, value::Value};
use serde_json::{Number, Value as JsonValue, json};
use std::fmt;

/// Renders raw column values as store-native JSON scalars.
pub trait JsonValueWriter: Send + Sync + fmt::Debug {
    /// `None` means the value is absent and the property is omitted.
    fn write(&self, value: &Value, store_type: StoreType) -> Option<JsonValue>;
}

/// Stateless writer shared by every entity group of a run.
#[derive(Debug, Default, Clone, Copy)]
pub struct StoreJsonValueWriter;

impl JsonValueWriter for StoreJsonValueWriter {
    fn write(&self, value: &Value, store_type: StoreType) -> Option<JsonValue> {
        match (store_type, value) {
            (_, Value::Null) => None,
            (StoreType::Boolean, Value::Int(v)) => Some(JsonValue::Bool(*v != 0)),
            (StoreType::Boolean, Value::Uint(v)) => Some(JsonValue::Bool(*v != 0)),
            (StoreType::GeoPoint, Value::String(s)) => geo_point_from_text(s),
            (StoreType::Keyword | StoreType::Text, Value::Uuid(v)) => Some(json!(v.to_string())),
            (_, Value::Int(v)) => Some(json!(v)),
            (_, Value::Uint(v)) => Some(json!(v)),
            (_, Value::Float(v)) => Number::from_f64(*v).map(JsonValue::Number),
            (_, Value::Boolean(v)) => Some(JsonValue::Bool(*v)),
            (_, Value::Json(v)) => Some(v.clone()),
            (_, Value::Date(v)) => Some(json!(v.format("%Y-%m-%d").to_string())),
            (_, Value::Timestamp(v)) => Some(json!(v.to_rfc3339())),
            (_, other) => other.to_text().map(JsonValue::String),
        }
    }
}

/// Accepts `"lat,lon"` text.
fn geo_point_from_text(text: &str) -> Option<JsonValue> {
    let (lat, lon) = text.split_once(',')?;
    let lat: f64 = lat.trim().parse().ok()?;
    let lon: f64 = lon.trim().parse().ok()?;
    Some(json!({ "lat": lat, "lon": lon }))
}
