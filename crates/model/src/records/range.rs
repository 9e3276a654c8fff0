use crate::core::value::Value;
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, fmt};

/// Inclusive `[start, end]` slice of the join-key domain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeyRange {
    pub start: Value,
    pub end: Value,
}

impl KeyRange {
    pub fn new(start: impl Into<Value>, end: impl Into<Value>) -> Self {
        KeyRange {
            start: start.into(),
            end: end.into(),
        }
    }

    pub fn contains(&self, value: &Value) -> bool {
        matches!(
            value.compare(&self.start),
            Some(Ordering::Greater | Ordering::Equal)
        ) && matches!(
            value.compare(&self.end),
            Some(Ordering::Less | Ordering::Equal)
        )
    }
}

impl fmt::Display for KeyRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}
