use crate::core::store_type::StoreType;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt};

/// Source column type as reported by the relational driver.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DataType {
    Boolean,
    Short,
    Int,
    Long,
    LongUnsigned,
    Float,
    Double,
    Decimal,
    Char,
    VarChar,
    String,
    Json,
    Uuid,
    Date,
    Time,
    Timestamp,
    Year,
    Bit,
    Enum,
    Set,
    Bytea,
    Blob,
    Geometry,
    Null,
    Custom(String),
}

lazy_static! {
    static ref MYSQL_TYPE_MAP: HashMap<&'static str, DataType> = build_mysql_type_map();
    static ref POSTGRES_TYPE_MAP: HashMap<&'static str, DataType> = build_postgres_type_map();
}

impl DataType {
    pub fn from_mysql_type(type_name: &str) -> Self {
        let normalized = normalize_type_name(type_name);
        MYSQL_TYPE_MAP
            .get(normalized.as_str())
            .cloned()
            .unwrap_or(DataType::Custom(normalized))
    }

    pub fn from_postgres_type(type_name: &str) -> Self {
        let normalized = normalize_type_name(type_name);
        POSTGRES_TYPE_MAP
            .get(normalized.as_str())
            .cloned()
            .unwrap_or(DataType::Custom(normalized))
    }

    /// Destination store type a raw column of this type is indexed as.
    pub fn store_type(&self) -> StoreType {
        match self {
            DataType::Boolean => StoreType::Boolean,
            DataType::Short | DataType::Int | DataType::Year => StoreType::Integer,
            DataType::Long | DataType::LongUnsigned => StoreType::Long,
            DataType::Float => StoreType::Float,
            DataType::Double | DataType::Decimal => StoreType::Double,
            DataType::Json => StoreType::Object,
            DataType::Date | DataType::Timestamp => StoreType::Date,
            DataType::Bytea | DataType::Blob | DataType::Bit | DataType::Geometry => {
                StoreType::Binary
            }
            DataType::Char
            | DataType::VarChar
            | DataType::String
            | DataType::Enum
            | DataType::Set
            | DataType::Uuid
            | DataType::Time
            | DataType::Null
            | DataType::Custom(_) => StoreType::Keyword,
        }
    }
}

impl TryFrom<&str> for DataType {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let normalized = normalize_type_name(s);
        POSTGRES_TYPE_MAP
            .get(normalized.as_str())
            .or_else(|| MYSQL_TYPE_MAP.get(normalized.as_str()))
            .cloned()
            .ok_or_else(|| format!("Unknown column type: {s}"))
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Custom(name) => write!(f, "{name}"),
            other => write!(f, "{}", format!("{other:?}").to_uppercase()),
        }
    }
}

fn normalize_type_name(type_name: &str) -> String {
    type_name.trim().to_uppercase()
}

fn build_mysql_type_map() -> HashMap<&'static str, DataType> {
    use DataType::*;

    HashMap::from([
        ("BOOLEAN", Boolean),
        ("BOOL", Boolean),
        ("TINYINT", Short),
        ("SMALLINT", Short),
        ("MEDIUMINT", Int),
        ("INT", Int),
        ("INTEGER", Int),
        ("INT UNSIGNED", Long),
        ("BIGINT", Long),
        ("BIGINT UNSIGNED", LongUnsigned),
        ("FLOAT", Float),
        ("DOUBLE", Double),
        ("DECIMAL", Decimal),
        ("NEWDECIMAL", Decimal),
        ("NUMERIC", Decimal),
        ("CHAR", Char),
        ("VARCHAR", VarChar),
        ("VAR_STRING", VarChar),
        ("TEXT", String),
        ("TINYTEXT", String),
        ("MEDIUMTEXT", String),
        ("LONGTEXT", String),
        ("JSON", Json),
        ("DATE", Date),
        ("TIME", Time),
        ("DATETIME", Timestamp),
        ("TIMESTAMP", Timestamp),
        ("YEAR", Year),
        ("BIT", Bit),
        ("ENUM", Enum),
        ("SET", Set),
        ("BINARY", Blob),
        ("VARBINARY", Blob),
        ("TINYBLOB", Blob),
        ("BLOB", Blob),
        ("MEDIUMBLOB", Blob),
        ("LONGBLOB", Blob),
        ("GEOMETRY", Geometry),
        ("NULL", Null),
    ])
}

fn build_postgres_type_map() -> HashMap<&'static str, DataType> {
    use DataType::*;

    HashMap::from([
        ("BOOL", Boolean),
        ("BOOLEAN", Boolean),
        ("INT2", Short),
        ("SMALLINT", Short),
        ("INT4", Int),
        ("INTEGER", Int),
        ("INT8", Long),
        ("BIGINT", Long),
        ("FLOAT4", Float),
        ("REAL", Float),
        ("FLOAT8", Double),
        ("DOUBLE PRECISION", Double),
        ("NUMERIC", Decimal),
        ("BPCHAR", Char),
        ("CHARACTER", Char),
        ("VARCHAR", VarChar),
        ("CHARACTER VARYING", VarChar),
        ("TEXT", String),
        ("NAME", String),
        ("CITEXT", String),
        ("JSON", Json),
        ("JSONB", Json),
        ("UUID", Uuid),
        ("DATE", Date),
        ("TIME", Time),
        ("TIMETZ", Time),
        ("TIMESTAMP", Timestamp),
        ("TIMESTAMPTZ", Timestamp),
        ("BIT", Bit),
        ("BYTEA", Bytea),
        ("GEOMETRY", Geometry),
    ])
}
