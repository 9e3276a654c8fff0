use crate::mapping::{column::ColumnInfo, field::PropertyType};
use serde::{Deserialize, Serialize};

/// Resolved binding of one data source onto the destination document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MappingItem {
    pub sequence_number: usize,
    pub property_path: String,
    pub property_type: PropertyType,
    pub columns: Vec<ColumnInfo>,
}

impl MappingItem {
    pub fn join_column(&self) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.is_join_column)
    }

    pub fn raw_column_count(&self) -> usize {
        self.columns.iter().filter(|c| !c.is_calculated).count()
    }

    pub fn calculated_columns(&self) -> impl Iterator<Item = &ColumnInfo> {
        self.columns.iter().filter(|c| c.is_calculated)
    }

    /// Path segments of the property this source writes under. Empty for top-level sources.
    pub fn path_segments(&self) -> Vec<&str> {
        split_property_path(&self.property_path)
    }
}

pub fn split_property_path(path: &str) -> Vec<&str> {
    path.split('.')
        .map(str::trim)
        .filter(|segment| !segment.is_empty() && *segment != "$")
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_level_paths_have_no_segments() {
        assert!(split_property_path("").is_empty());
        assert!(split_property_path("$").is_empty());
        assert_eq!(split_property_path("patient.visits"), vec!["patient", "visits"]);
    }
}
