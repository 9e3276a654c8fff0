use serde::{Deserialize, Serialize};
use std::fmt;

/// Named calculated-field transform applied to a raw column's text.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum FieldTransform {
    #[default]
    None,
    Zip3ToGeocode,
    Zip5ToGeocode,
}

impl FieldTransform {
    pub fn is_none(&self) -> bool {
        matches!(self, FieldTransform::None)
    }
}

impl fmt::Display for FieldTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldTransform::None => "none",
            FieldTransform::Zip3ToGeocode => "zip3_to_geocode",
            FieldTransform::Zip5ToGeocode => "zip5_to_geocode",
        };
        f.write_str(name)
    }
}

/// How a data source's rows are placed in the entity document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    /// First row written as a single object.
    #[default]
    Object,
    /// Every row written as an element of an array.
    Nested,
}
