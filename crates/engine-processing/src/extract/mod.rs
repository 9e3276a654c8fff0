use crate::{
    document::writer::JsonValueWriter,
    error::ExtractError,
    item::{EntityRowGroup, SqlImportItem},
    transform::TransformRegistry,
};
use async_trait::async_trait;
use connectors::source::{RangeRequest, RowSource};
use engine_core::{metrics::Metrics, stage::Stage};
use model::{
    core::value::Value,
    mapping::column::ColumnInfo,
    records::row::Row,
};
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, trace};

pub const STAGE_NAME: &str = "extract";

/// Reads one key-range slice of a data source and groups its rows by entity.
pub struct RangePartitionedExtractor {
    source: Arc<dyn RowSource>,
    key_column: String,
    transforms: TransformRegistry,
    value_writer: Arc<dyn JsonValueWriter>,
    metrics: Metrics,
}

impl RangePartitionedExtractor {
    pub fn new(
        source: Arc<dyn RowSource>,
        key_column: &str,
        transforms: TransformRegistry,
        value_writer: Arc<dyn JsonValueWriter>,
        metrics: Metrics,
    ) -> Self {
        RangePartitionedExtractor {
            source,
            key_column: key_column.to_string(),
            transforms,
            value_writer,
            metrics,
        }
    }

    pub async fn extract(&self, item: &SqlImportItem) -> Result<Vec<EntityRowGroup>, ExtractError> {
        let request = RangeRequest::new(&item.data_source.sql, &self.key_column, item.range.clone());
        let statement = request.statement();
        trace!(query_id = %item.query_id, statement = %statement, "Start");

        let result = self
            .source
            .fetch_range(&request)
            .await
            .map_err(|source| ExtractError::Query {
                query_id: item.query_id.clone(),
                connection: self.source.describe(),
                source: source.with_statement(&statement),
            })?;

        let mapping = &item.mapping;
        if result.columns.len() != mapping.raw_column_count() {
            return Err(ExtractError::ColumnMismatch {
                query_id: item.query_id.clone(),
                expected: mapping.raw_column_count(),
                actual: result.columns.len(),
            });
        }
        let join_index = mapping
            .join_column()
            .map(|c| c.index)
            .ok_or_else(|| ExtractError::MissingJoinColumn {
                query_id: item.query_id.clone(),
                column: self.key_column.clone(),
            })?;
        let width = mapping.columns.len();
        let calculated: Vec<&ColumnInfo> = mapping.columns.iter().filter(|c| c.needs_transform()).collect();

        let row_count = result.rows.len();
        let mut groups: Vec<(String, Vec<Row>)> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for mut row in result.rows {
            row.resize(width, Value::Null);
            self.apply_transforms(&mut row, &calculated)?;

            let key = row[join_index].to_text().unwrap_or_default();
            match positions.get(&key) {
                Some(&position) => groups[position].1.push(row),
                None => {
                    positions.insert(key.clone(), groups.len());
                    groups.push((key, vec![row]));
                }
            }
        }

        trace!(query_id = %item.query_id, statement = %statement, rows = row_count, "Finish");

        // Fields without a transform are only counted; their calculated slots stay empty.
        let untransformed = item
            .data_source
            .fields
            .iter()
            .filter(|f| f.transform.is_none())
            .count();

        debug!(
            query_id = %item.query_id,
            batch_number = item.batch_number,
            range = %item.range,
            rows = row_count,
            entities = groups.len(),
            untransformed,
            "Finished reading rows"
        );
        self.metrics.increment_rows(row_count as u64);

        Ok(groups
            .into_iter()
            .map(|(join_key, rows)| EntityRowGroup {
                query_id: item.query_id.clone(),
                batch_number: item.batch_number,
                join_key,
                rows,
                mapping: mapping.clone(),
                value_writer: self.value_writer.clone(),
            })
            .collect())
    }

    /// Fills calculated slots. Null source values leave the slot absent.
    fn apply_transforms(&self, row: &mut Row, calculated: &[&ColumnInfo]) -> Result<(), ExtractError> {
        for column in calculated {
            let Some(source_index) = column.source_index else {
                continue;
            };
            let Some(text) = row.get(source_index).and_then(Value::to_text) else {
                continue;
            };
            if let Some(value) = self.transforms.apply(column.transform, &text)? {
                row[column.index] = value;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Stage for RangePartitionedExtractor {
    type Input = SqlImportItem;
    type Output = EntityRowGroup;
    type Error = ExtractError;

    fn name(&self) -> &str {
        STAGE_NAME
    }

    async fn handle(&self, item: SqlImportItem) -> Result<Vec<EntityRowGroup>, ExtractError> {
        self.extract(&item).await
    }
}
