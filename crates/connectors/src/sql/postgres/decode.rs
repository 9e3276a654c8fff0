use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use model::core::value::Value;
use rust_decimal::{Decimal, prelude::ToPrimitive};
use tokio_postgres::{Row, types::Type};
use tracing::warn;
use uuid::Uuid;

/// Decodes one cell by its Postgres type. SQL NULL becomes `Value::Null`.
pub(crate) fn decode_value(row: &Row, idx: usize, ty: &Type) -> Result<Value, tokio_postgres::Error> {
    let value = match ty.name() {
        "bool" => row.try_get::<_, Option<bool>>(idx)?.map(Value::Boolean),
        "int2" => row
            .try_get::<_, Option<i16>>(idx)?
            .map(|v| Value::Int(v as i64)),
        "int4" => row
            .try_get::<_, Option<i32>>(idx)?
            .map(|v| Value::Int(v as i64)),
        "int8" => row.try_get::<_, Option<i64>>(idx)?.map(Value::Int),
        "oid" => row
            .try_get::<_, Option<u32>>(idx)?
            .map(|v| Value::Uint(v as u64)),
        "float4" => row
            .try_get::<_, Option<f32>>(idx)?
            .map(|v| Value::Float(v as f64)),
        "float8" => row.try_get::<_, Option<f64>>(idx)?.map(Value::Float),
        "numeric" => row
            .try_get::<_, Option<Decimal>>(idx)?
            .and_then(|v| v.to_f64())
            .map(Value::Float),
        "json" | "jsonb" => row
            .try_get::<_, Option<serde_json::Value>>(idx)?
            .map(Value::Json),
        "uuid" => row.try_get::<_, Option<Uuid>>(idx)?.map(Value::Uuid),
        "date" => row.try_get::<_, Option<NaiveDate>>(idx)?.map(Value::Date),
        "timestamp" => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(|naive| Value::Timestamp(DateTime::from_naive_utc_and_offset(naive, Utc))),
        "timestamptz" => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(Value::Timestamp),
        "bytea" => row.try_get::<_, Option<Vec<u8>>>(idx)?.map(Value::Bytes),
        _ => match row.try_get::<_, Option<String>>(idx) {
            Ok(text) => text.map(Value::String),
            Err(err) => {
                warn!(column = idx, pg_type = ty.name(), %err, "Unsupported column type, value dropped");
                None
            }
        },
    };

    Ok(value.unwrap_or(Value::Null))
}
