use crate::{
    core::{data_type::DataType, store_type::StoreType},
    mapping::field::FieldTransform,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnInfo {
    /// Slot of this column in a decoded row.
    pub index: usize,
    /// Raw column a calculated column reads from.
    pub source_index: Option<usize>,
    pub name: String,
    pub data_type: DataType,
    pub store_type: StoreType,
    pub is_join_column: bool,
    pub is_calculated: bool,
    pub transform: FieldTransform,
}

impl ColumnInfo {
    pub fn raw(index: usize, name: &str, data_type: DataType, is_join_column: bool) -> Self {
        ColumnInfo {
            index,
            source_index: None,
            name: name.to_string(),
            store_type: data_type.store_type(),
            data_type,
            is_join_column,
            is_calculated: false,
            transform: FieldTransform::None,
        }
    }

    /// True when extraction has to run a transform to fill this column.
    pub fn needs_transform(&self) -> bool {
        self.is_calculated && !self.transform.is_none() && self.source_index.is_some()
    }
}
