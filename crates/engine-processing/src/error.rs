use connectors::sql::base::error::DbError;
use model::mapping::field::FieldTransform;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Failed to read '{query_id}' from {connection}: {source}")]
    Query {
        query_id: String,
        connection: String,
        #[source]
        source: DbError,
    },

    #[error("Join column '{column}' is missing from the result of '{query_id}'")]
    MissingJoinColumn { query_id: String, column: String },

    #[error("Data source '{query_id}' returned {actual} columns, the probe found {expected}")]
    ColumnMismatch {
        query_id: String,
        expected: usize,
        actual: usize,
    },

    #[error(transparent)]
    Transform(#[from] TransformError),
}

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Failed to read geocode table '{path}': {source}")]
    Table {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("No transformer registered for '{0}'")]
    Unregistered(FieldTransform),

    #[error("Transform '{transform}' failed for input '{input}': {message}")]
    Failed {
        transform: FieldTransform,
        input: String,
        message: String,
    },
}

/// Schema discovery failure. Always names the data source path and the statement.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Failed to probe data source '{path}'. Sql: {statement}. {source}")]
    Query {
        path: String,
        statement: String,
        #[source]
        source: DbError,
    },

    #[error("Join column '{column}' not found in data source '{path}'. Sql: {statement}")]
    MissingJoinColumn {
        path: String,
        column: String,
        statement: String,
    },
}

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Entity '{entity_id}': property '{segment}' of path '{path}' is not an object")]
    PathConflict {
        entity_id: String,
        path: String,
        segment: String,
    },
}

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Failed to serialize document '{entity_id}': {source}")]
    Serialize {
        entity_id: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Failed to create output directory '{path}': {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write batch {batch_number} to '{path}': {source}")]
    File {
        batch_number: u64,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Bulk request for batch {batch_number} failed: {source}")]
    Http {
        batch_number: u64,
        #[source]
        source: reqwest::Error,
    },

    #[error("Bulk endpoint answered {status} for batch {batch_number}: {body}")]
    Status {
        batch_number: u64,
        status: u16,
        body: String,
    },

    #[error("Bulk response for batch {batch_number} reported failed items")]
    ItemErrors { batch_number: u64 },
}
