use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use model::core::{data_type::DataType, value::Value};
use mysql_async::{Column, Value as MySqlValue, consts::ColumnType, from_value_opt};
use std::str::FromStr;

/// Binary collation id; text columns with it hold raw bytes.
const BINARY_CHARSET: u16 = 63;

pub(crate) fn column_data_type(column: &Column) -> DataType {
    use ColumnType::*;

    match column.column_type() {
        MYSQL_TYPE_TINY | MYSQL_TYPE_SHORT => DataType::Short,
        MYSQL_TYPE_INT24 | MYSQL_TYPE_LONG => DataType::Int,
        MYSQL_TYPE_LONGLONG => DataType::Long,
        MYSQL_TYPE_FLOAT => DataType::Float,
        MYSQL_TYPE_DOUBLE => DataType::Double,
        MYSQL_TYPE_DECIMAL | MYSQL_TYPE_NEWDECIMAL => DataType::Decimal,
        MYSQL_TYPE_DATE | MYSQL_TYPE_NEWDATE => DataType::Date,
        MYSQL_TYPE_TIME | MYSQL_TYPE_TIME2 => DataType::Time,
        MYSQL_TYPE_DATETIME | MYSQL_TYPE_DATETIME2 | MYSQL_TYPE_TIMESTAMP
        | MYSQL_TYPE_TIMESTAMP2 => DataType::Timestamp,
        MYSQL_TYPE_YEAR => DataType::Year,
        MYSQL_TYPE_BIT => DataType::Bit,
        MYSQL_TYPE_JSON => DataType::Json,
        MYSQL_TYPE_ENUM => DataType::Enum,
        MYSQL_TYPE_SET => DataType::Set,
        MYSQL_TYPE_GEOMETRY => DataType::Geometry,
        MYSQL_TYPE_NULL => DataType::Null,
        MYSQL_TYPE_TINY_BLOB | MYSQL_TYPE_MEDIUM_BLOB | MYSQL_TYPE_LONG_BLOB | MYSQL_TYPE_BLOB
            if column.character_set() == BINARY_CHARSET =>
        {
            DataType::Blob
        }
        MYSQL_TYPE_TINY_BLOB | MYSQL_TYPE_MEDIUM_BLOB | MYSQL_TYPE_LONG_BLOB | MYSQL_TYPE_BLOB => {
            DataType::String
        }
        MYSQL_TYPE_STRING | MYSQL_TYPE_VAR_STRING | MYSQL_TYPE_VARCHAR
            if column.character_set() == BINARY_CHARSET =>
        {
            DataType::Blob
        }
        MYSQL_TYPE_STRING => DataType::Char,
        _ => DataType::VarChar,
    }
}

/// Converts a binary-protocol cell into a pipeline value.
pub(crate) fn decode_value(value: MySqlValue, data_type: &DataType) -> Result<Value, String> {
    let decoded = match value {
        MySqlValue::NULL => Value::Null,
        MySqlValue::Int(v) => Value::Int(v),
        MySqlValue::UInt(v) => Value::Uint(v),
        MySqlValue::Float(v) => Value::Float(v as f64),
        MySqlValue::Double(v) => Value::Float(v),
        date @ MySqlValue::Date(..) => match data_type {
            DataType::Date => from_value_opt::<NaiveDate>(date)
                .map(Value::Date)
                .map_err(|e| e.to_string())?,
            _ => from_value_opt::<NaiveDateTime>(date)
                .map(|naive| Value::Timestamp(DateTime::from_naive_utc_and_offset(naive, Utc)))
                .map_err(|e| e.to_string())?,
        },
        time @ MySqlValue::Time(..) => from_value_opt::<NaiveTime>(time)
            .map(|t| Value::String(t.to_string()))
            .map_err(|e| e.to_string())?,
        MySqlValue::Bytes(bytes) => decode_bytes(bytes, data_type)?,
    };
    Ok(decoded)
}

fn decode_bytes(bytes: Vec<u8>, data_type: &DataType) -> Result<Value, String> {
    match data_type {
        DataType::Blob | DataType::Bit | DataType::Geometry => Ok(Value::Bytes(bytes)),
        DataType::Json => serde_json::from_slice(&bytes)
            .map(Value::Json)
            .map_err(|e| e.to_string()),
        DataType::Decimal => {
            let text = String::from_utf8_lossy(&bytes);
            BigDecimal::from_str(text.trim())
                .map_err(|e| e.to_string())?
                .to_f64()
                .map(Value::Float)
                .ok_or_else(|| format!("decimal {text} does not fit a float"))
        }
        _ => String::from_utf8(bytes)
            .map(Value::String)
            .map_err(|e| e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_text_protocol_cells() {
        assert_eq!(
            decode_value(MySqlValue::Bytes(b"12.50".to_vec()), &DataType::Decimal).unwrap(),
            Value::Float(12.5)
        );
        assert_eq!(
            decode_value(MySqlValue::Bytes(br#"{"a":1}"#.to_vec()), &DataType::Json).unwrap(),
            Value::Json(serde_json::json!({"a": 1}))
        );
        assert_eq!(
            decode_value(MySqlValue::NULL, &DataType::VarChar).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn decodes_date_cells_by_column_type() {
        let cell = MySqlValue::Date(2024, 3, 9, 0, 0, 0, 0);
        assert_eq!(
            decode_value(cell, &DataType::Date).unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap())
        );
    }
}
