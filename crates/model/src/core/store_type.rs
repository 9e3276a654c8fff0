use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Field type on the search-store side of the pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    Text,
    #[default]
    Keyword,
    Integer,
    Long,
    Float,
    Double,
    Boolean,
    Date,
    Binary,
    Object,
    Nested,
    GeoPoint,
}

impl StoreType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreType::Text => "text",
            StoreType::Keyword => "keyword",
            StoreType::Integer => "integer",
            StoreType::Long => "long",
            StoreType::Float => "float",
            StoreType::Double => "double",
            StoreType::Boolean => "boolean",
            StoreType::Date => "date",
            StoreType::Binary => "binary",
            StoreType::Object => "object",
            StoreType::Nested => "nested",
            StoreType::GeoPoint => "geo_point",
        }
    }
}

impl fmt::Display for StoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "string" => Ok(StoreType::Text),
            "keyword" => Ok(StoreType::Keyword),
            "integer" | "int" => Ok(StoreType::Integer),
            "long" => Ok(StoreType::Long),
            "float" => Ok(StoreType::Float),
            "double" => Ok(StoreType::Double),
            "boolean" | "bool" => Ok(StoreType::Boolean),
            "date" => Ok(StoreType::Date),
            "binary" => Ok(StoreType::Binary),
            "object" => Ok(StoreType::Object),
            "nested" => Ok(StoreType::Nested),
            "geo_point" | "geopoint" => Ok(StoreType::GeoPoint),
            other => Err(format!("Unknown store type: {other}")),
        }
    }
}
