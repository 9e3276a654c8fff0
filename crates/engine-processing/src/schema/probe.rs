use crate::{error::ProbeError, schema::columns::resolve_columns};
use connectors::source::{ProbeRequest, RowSource};
use engine_config::job::DataSource;
use model::mapping::item::MappingItem;
use std::sync::Arc;
use tracing::{debug, info};

/// Derives the column layout of each data source from a zero-row query.
pub struct SchemaProbe {
    source: Arc<dyn RowSource>,
    key_column: String,
}

impl SchemaProbe {
    pub fn new(source: Arc<dyn RowSource>, key_column: &str) -> Self {
        SchemaProbe {
            source,
            key_column: key_column.to_string(),
        }
    }

    pub async fn probe(&self, data_source: &DataSource) -> Result<MappingItem, ProbeError> {
        let request = ProbeRequest::new(&data_source.sql);
        let statement = request.statement();
        debug!(path = %data_source.path, statement = %statement, "Probing data source");

        let raw = self
            .source
            .probe(&request)
            .await
            .map_err(|source| ProbeError::Query {
                path: data_source.path.clone(),
                statement: statement.clone(),
                source,
            })?;

        let columns = resolve_columns(&raw, data_source, &self.key_column);
        if !columns.iter().any(|c| c.is_join_column) {
            return Err(ProbeError::MissingJoinColumn {
                path: data_source.path.clone(),
                column: self.key_column.clone(),
                statement,
            });
        }

        Ok(MappingItem {
            sequence_number: data_source.sequence_number,
            property_path: data_source.path.clone(),
            property_type: data_source.property_type,
            columns,
        })
    }

    /// Probes every data source in order. Stops at the first failure.
    pub async fn probe_all(&self, data_sources: &[DataSource]) -> Result<Vec<MappingItem>, ProbeError> {
        let mut items = Vec::with_capacity(data_sources.len());
        for data_source in data_sources {
            items.push(self.probe(data_source).await?);
        }
        info!(sources = items.len(), source = %self.source.describe(), "Schema probe finished");
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectors::memory::{MemorySource, MemoryTable};
    use engine_config::job::FieldDefinition;
    use model::{
        core::{data_type::DataType, store_type::StoreType},
        mapping::field::{FieldTransform, PropertyType},
        records::row::RawColumn,
    };

    const VISITS: &str = "SELECT PatientID, VisitDate, Zip FROM visits";

    fn visits() -> DataSource {
        DataSource {
            sequence_number: 2,
            sql: VISITS.into(),
            path: "patient.visits".into(),
            property_type: PropertyType::Nested,
            fields: vec![FieldDefinition {
                source: "Zip".into(),
                destination: Some("location".into()),
                destination_type: StoreType::GeoPoint,
                transform: FieldTransform::Zip5ToGeocode,
            }],
        }
    }

    fn source() -> Arc<dyn RowSource> {
        Arc::new(MemorySource::new().with_table(
            VISITS,
            MemoryTable::new(vec![
                RawColumn::new("PatientID", DataType::Int),
                RawColumn::new("VisitDate", DataType::Date),
                RawColumn::new("Zip", DataType::VarChar),
            ]),
        ))
    }

    #[tokio::test]
    async fn probe_builds_mapping_item() {
        let probe = SchemaProbe::new(source(), "PatientID");
        let item = probe.probe(&visits()).await.unwrap();

        assert_eq!(item.sequence_number, 2);
        assert_eq!(item.property_type, PropertyType::Nested);
        assert_eq!(item.raw_column_count(), 3);
        assert_eq!(item.join_column().map(|c| c.index), Some(0));
        assert_eq!(item.columns[1].store_type, StoreType::Date);

        let calculated: Vec<_> = item.calculated_columns().collect();
        assert_eq!(calculated.len(), 1);
        assert_eq!(calculated[0].index, 3);
        assert_eq!(calculated[0].source_index, Some(2));
    }

    #[tokio::test]
    async fn probe_failure_names_the_statement() {
        let probe = SchemaProbe::new(Arc::new(MemorySource::new()), "PatientID");
        let err = probe.probe(&visits()).await.unwrap_err();

        let message = err.to_string();
        assert!(message.contains("patient.visits"), "{message}");
        assert!(message.contains(VISITS), "{message}");
        assert!(message.contains("LIMIT 0"), "{message}");
    }

    #[tokio::test]
    async fn missing_join_column_is_rejected() {
        let probe = SchemaProbe::new(source(), "EncounterID");
        let err = probe.probe(&visits()).await.unwrap_err();
        assert!(matches!(err, ProbeError::MissingJoinColumn { ref column, .. } if column == "EncounterID"));
    }
}
