use crate::document::writer::JsonValueWriter;
use bytes::Bytes;
use engine_config::job::DataSource;
use engine_core::queue::WorkItem;
use model::{
    mapping::item::MappingItem,
    records::{range::KeyRange, row::Row},
};
use serde::Serialize;
use std::sync::Arc;

/// One key-range slice of one data source, to be extracted.
#[derive(Debug, Clone)]
pub struct SqlImportItem {
    pub query_id: String,
    pub data_source: Arc<DataSource>,
    /// Column layout probed once for the data source.
    pub mapping: Arc<MappingItem>,
    pub range: KeyRange,
    pub seed: u64,
    pub batch_number: u64,
}

/// All rows of one entity read from one slice.
#[derive(Debug, Clone)]
pub struct EntityRowGroup {
    pub query_id: String,
    pub batch_number: u64,
    pub join_key: String,
    /// Query order. Every row spans all of the mapping's columns.
    pub rows: Vec<Row>,
    pub mapping: Arc<MappingItem>,
    pub value_writer: Arc<dyn JsonValueWriter>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssembledDocument {
    pub query_id: String,
    pub entity_id: String,
    pub body: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct DocumentBatch {
    pub query_id: String,
    pub documents: Vec<AssembledDocument>,
}

/// Serialized bulk request body for one batch.
#[derive(Debug, Clone)]
pub struct BatchPayload {
    pub batch_number: u64,
    pub query_id: String,
    pub document_count: usize,
    pub content: Bytes,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UploadReceipt {
    pub query_id: String,
    pub batch_number: u64,
    pub document_count: usize,
    pub bytes: usize,
    pub destinations: Vec<String>,
}

impl WorkItem for SqlImportItem {
    fn task_key(&self) -> &str {
        &self.query_id
    }
}

impl WorkItem for EntityRowGroup {
    fn task_key(&self) -> &str {
        &self.query_id
    }
}

impl WorkItem for AssembledDocument {
    fn task_key(&self) -> &str {
        &self.query_id
    }
}

impl WorkItem for DocumentBatch {
    fn task_key(&self) -> &str {
        &self.query_id
    }
}

impl WorkItem for BatchPayload {
    fn task_key(&self) -> &str {
        &self.query_id
    }
}

impl WorkItem for UploadReceipt {
    fn task_key(&self) -> &str {
        &self.query_id
    }
}
