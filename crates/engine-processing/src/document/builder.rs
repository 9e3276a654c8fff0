use crate::{
    error::DocumentError,
    item::{AssembledDocument, EntityRowGroup},
};
use async_trait::async_trait;
use engine_core::{metrics::Metrics, stage::Stage};
use model::{
    mapping::field::PropertyType,
    records::row::Row,
};
use serde_json::{Map, Value};

pub const STAGE_NAME: &str = "assemble";

/// Turns one entity group into one partial JSON document.
///
/// The document always carries the key column. Rows of a top-level source are
/// merged into the root; rows of a source with a property path are placed
/// under that path, as an array for nested sources and as the first row's
/// object otherwise.
pub struct EntityDocumentBuilder {
    key_column: String,
    metrics: Metrics,
}

impl EntityDocumentBuilder {
    pub fn new(key_column: &str, metrics: Metrics) -> Self {
        EntityDocumentBuilder {
            key_column: key_column.to_string(),
            metrics,
        }
    }

    pub fn build(&self, group: &EntityRowGroup) -> Result<AssembledDocument, DocumentError> {
        let mut root = Map::new();
        root.insert(self.key_column.clone(), Value::String(group.join_key.clone()));

        let segments = group.mapping.path_segments();
        match segments.split_last() {
            None => {
                if let Some(first) = group.rows.first() {
                    root.extend(row_object(group, first));
                }
            }
            Some((leaf, parents)) => {
                let mut target = &mut root;
                for segment in parents {
                    let node = target
                        .entry(segment.to_string())
                        .or_insert_with(|| Value::Object(Map::new()));
                    target = match node {
                        Value::Object(map) => map,
                        _ => {
                            return Err(DocumentError::PathConflict {
                                entity_id: group.join_key.clone(),
                                path: group.mapping.property_path.clone(),
                                segment: segment.to_string(),
                            });
                        }
                    };
                }

                let value = match group.mapping.property_type {
                    PropertyType::Nested => Value::Array(
                        group
                            .rows
                            .iter()
                            .map(|row| Value::Object(row_object(group, row)))
                            .collect(),
                    ),
                    PropertyType::Object => Value::Object(
                        group
                            .rows
                            .first()
                            .map(|row| row_object(group, row))
                            .unwrap_or_default(),
                    ),
                };
                target.insert(leaf.to_string(), value);
            }
        }

        Ok(AssembledDocument {
            query_id: group.query_id.clone(),
            entity_id: group.join_key.clone(),
            body: Value::Object(root),
        })
    }
}

/// Non-join columns of one row. Absent values are skipped.
fn row_object(group: &EntityRowGroup, row: &Row) -> Map<String, Value> {
    group
        .mapping
        .columns
        .iter()
        .filter(|c| !c.is_join_column)
        .filter_map(|column| {
            let value = row.get(column.index)?;
            let json = group.value_writer.write(value, column.store_type)?;
            Some((column.name.clone(), json))
        })
        .collect()
}

#[async_trait]
impl Stage for EntityDocumentBuilder {
    type Input = EntityRowGroup;
    type Output = AssembledDocument;
    type Error = DocumentError;

    fn name(&self) -> &str {
        STAGE_NAME
    }

    async fn handle(&self, group: EntityRowGroup) -> Result<Vec<AssembledDocument>, DocumentError> {
        let document = self.build(&group)?;
        self.metrics.increment_documents(1);
        Ok(vec![document])
    }
}
