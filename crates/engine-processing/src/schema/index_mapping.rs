use model::{
    core::store_type::StoreType,
    mapping::{field::PropertyType, item::MappingItem},
};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

#[derive(Debug, Default)]
struct PropertyNode {
    field_type: Option<StoreType>,
    nested: bool,
    properties: BTreeMap<String, PropertyNode>,
}

impl PropertyNode {
    fn child(&mut self, name: &str) -> &mut PropertyNode {
        self.properties.entry(name.to_string()).or_default()
    }

    fn to_json(&self) -> Value {
        if let Some(field_type) = self.field_type
            && self.properties.is_empty()
        {
            return json!({ "type": field_type.as_str() });
        }

        let properties: Map<String, Value> = self
            .properties
            .iter()
            .map(|(name, node)| (name.clone(), node.to_json()))
            .collect();

        let mut object = Map::new();
        if self.nested {
            object.insert("type".into(), json!("nested"));
        }
        object.insert("properties".into(), Value::Object(properties));
        Value::Object(object)
    }
}

/// Index mapping document for the entities produced by `items`.
///
/// The key column sits at the top level as a keyword. Every other column is
/// placed under its source's property path; nested sources are declared
/// `"type": "nested"`.
pub fn build_index_mapping(key_column: &str, items: &[MappingItem]) -> Value {
    let mut root = PropertyNode::default();
    root.child(key_column).field_type = Some(StoreType::Keyword);

    for item in items {
        let mut node = &mut root;
        for segment in item.path_segments() {
            node = node.child(segment);
        }
        if !item.path_segments().is_empty() && item.property_type == PropertyType::Nested {
            node.nested = true;
        }

        for column in item.columns.iter().filter(|c| !c.is_join_column) {
            node.child(&column.name).field_type = Some(column.store_type);
        }
    }

    json!({ "mappings": root.to_json() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{core::data_type::DataType, mapping::column::ColumnInfo};

    fn item(path: &str, property_type: PropertyType, columns: Vec<ColumnInfo>) -> MappingItem {
        MappingItem {
            sequence_number: 1,
            property_path: path.into(),
            property_type,
            columns,
        }
    }

    #[test]
    fn nests_columns_under_property_paths() {
        let patients = item(
            "",
            PropertyType::Object,
            vec![
                ColumnInfo::raw(0, "PatientID", DataType::Int, true),
                ColumnInfo::raw(1, "Name", DataType::VarChar, false),
            ],
        );
        let visits = item(
            "patient.visits",
            PropertyType::Nested,
            vec![
                ColumnInfo::raw(0, "PatientID", DataType::Int, true),
                ColumnInfo::raw(1, "VisitDate", DataType::Date, false),
            ],
        );

        let mapping = build_index_mapping("PatientID", &[patients, visits]);

        assert_eq!(
            mapping,
            json!({
                "mappings": {
                    "properties": {
                        "Name": { "type": "keyword" },
                        "PatientID": { "type": "keyword" },
                        "patient": {
                            "properties": {
                                "visits": {
                                    "type": "nested",
                                    "properties": {
                                        "VisitDate": { "type": "date" }
                                    }
                                }
                            }
                        }
                    }
                }
            })
        );
    }
}
