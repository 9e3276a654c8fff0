use crate::{
    source::{ProbeRequest, RangeRequest, RowSource},
    sql::base::error::DbError,
};
use async_trait::async_trait;
use model::records::row::{RawColumn, ResultSet, Row};
use std::{
    cmp::Ordering,
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering as AtomicOrdering},
};
use tracing::trace;

/// Rows served for one source query text.
#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    pub columns: Vec<RawColumn>,
    pub rows: Vec<Row>,
}

impl MemoryTable {
    pub fn new(columns: Vec<RawColumn>) -> Self {
        MemoryTable {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn with_rows(mut self, rows: Vec<Row>) -> Self {
        self.rows.extend(rows);
        self
    }
}

/// In-process source keyed by the data source's SQL text. Range queries are
/// evaluated against the stored rows instead of a database.
#[derive(Debug, Default)]
pub struct MemorySource {
    tables: HashMap<String, MemoryTable>,
    failures: HashMap<String, String>,
    fetches: AtomicUsize,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, sql: &str, table: MemoryTable) -> Self {
        self.tables.insert(normalize(sql), table);
        self
    }

    /// Makes every range fetch for `sql` fail with `message`.
    pub fn with_failure(mut self, sql: &str, message: &str) -> Self {
        self.failures.insert(normalize(sql), message.to_string());
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(AtomicOrdering::SeqCst)
    }

    fn table(&self, sql: &str, statement: &str) -> Result<&MemoryTable, DbError> {
        self.tables
            .get(&normalize(sql))
            .ok_or_else(|| DbError::query(statement, format!("relation for '{sql}' does not exist")))
    }
}

fn normalize(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[async_trait]
impl RowSource for MemorySource {
    fn describe(&self) -> String {
        "memory://".to_string()
    }

    async fn ping(&self) -> Result<(), DbError> {
        Ok(())
    }

    async fn probe(&self, request: &ProbeRequest) -> Result<Vec<RawColumn>, DbError> {
        let statement = request.statement();
        Ok(self.table(&request.sql, &statement)?.columns.clone())
    }

    async fn fetch_range(&self, request: &RangeRequest) -> Result<ResultSet, DbError> {
        self.fetches.fetch_add(1, AtomicOrdering::SeqCst);
        let statement = request.statement();

        if let Some(message) = self.failures.get(&normalize(&request.sql)) {
            return Err(DbError::query(&statement, message.clone()));
        }

        let table = self.table(&request.sql, &statement)?;
        let key = table
            .columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(&request.key_column))
            .ok_or_else(|| {
                DbError::query(
                    &statement,
                    format!("column '{}' does not exist", request.key_column),
                )
            })?;

        let mut rows: Vec<Row> = table
            .rows
            .iter()
            .filter(|row| row.get(key).is_some_and(|v| request.range.contains(v)))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a[key].compare(&b[key]).unwrap_or(Ordering::Equal));

        trace!(statement = %statement, rows = rows.len(), "Served range from memory");
        Ok(ResultSet::new(table.columns.clone(), rows))
    }
}
