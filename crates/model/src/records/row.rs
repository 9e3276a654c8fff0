use crate::core::{data_type::DataType, value::Value};
use serde::{Deserialize, Serialize};

/// Decoded row. Slots line up with the resolved column indices; `Value::Null` marks an absent value.
pub type Row = Vec<Value>;

/// Column as reported by the source, before calculated columns are appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawColumn {
    pub name: String,
    pub data_type: DataType,
}

impl RawColumn {
    pub fn new(name: &str, data_type: DataType) -> Self {
        RawColumn {
            name: name.to_string(),
            data_type,
        }
    }
}

/// Fully read result of one range query, rows in query order.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    pub columns: Vec<RawColumn>,
    pub rows: Vec<Row>,
}

impl ResultSet {
    pub fn new(columns: Vec<RawColumn>, rows: Vec<Row>) -> Self {
        ResultSet { columns, rows }
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(column))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
