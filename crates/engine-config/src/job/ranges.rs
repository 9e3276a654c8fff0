use model::core::value::Value;
use serde::{Deserialize, Serialize};

/// Key ranges to extract: explicit slices, an integer span to split, or both.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RangeSettings {
    #[serde(default)]
    pub explicit: Vec<(RangeBound, RangeBound)>,
    pub key_range: Option<KeySpan>,
}

/// Integer join-key domain split into contiguous slices of `slice_size` keys.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeySpan {
    pub start: i64,
    pub end: i64,
    pub slice_size: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RangeBound {
    Int(i64),
    Text(String),
}

impl From<&RangeBound> for Value {
    fn from(bound: &RangeBound) -> Self {
        match bound {
            RangeBound::Int(v) => Value::Int(*v),
            RangeBound::Text(v) => Value::String(v.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_bounds_accept_numbers_and_text() {
        let settings: RangeSettings =
            toml::from_str(r#"explicit = [[1, 50], ["A", "M"]]"#).unwrap();

        assert_eq!(settings.explicit.len(), 2);
        assert_eq!(Value::from(&settings.explicit[0].1), Value::Int(50));
        assert_eq!(Value::from(&settings.explicit[1].0), Value::from("A"));
        assert!(settings.key_range.is_none());
    }
}
