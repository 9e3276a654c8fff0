use crate::{
    error::AdapterError,
    sql::{
        base::{error::DbError, query::QueryGenerator},
        mysql::source::MySqlSource,
        postgres::source::PgSource,
    },
};
use async_trait::async_trait;
use model::records::{
    range::KeyRange,
    row::{RawColumn, ResultSet},
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, sync::Arc, time::Duration};

/// Relational driver a job reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    #[serde(alias = "pg", alias = "postgresql")]
    Postgres,
    #[serde(alias = "mariadb")]
    MySql,
}

impl FromStr for Driver {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pg" | "postgres" | "postgresql" => Ok(Driver::Postgres),
            "mysql" | "mariadb" => Ok(Driver::MySql),
            other => Err(AdapterError::UnsupportedDriver(other.to_string())),
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Driver::Postgres => f.write_str("postgres"),
            Driver::MySql => f.write_str("mysql"),
        }
    }
}

/// Zero-row shape query for one data source.
#[derive(Debug, Clone)]
pub struct ProbeRequest {
    pub sql: String,
}

impl ProbeRequest {
    pub fn new(sql: &str) -> Self {
        ProbeRequest {
            sql: sql.to_string(),
        }
    }

    pub fn statement(&self) -> String {
        QueryGenerator::probe(&self.sql)
    }
}

/// One key-range slice of a data source query.
#[derive(Debug, Clone)]
pub struct RangeRequest {
    pub sql: String,
    pub key_column: String,
    pub range: KeyRange,
}

impl RangeRequest {
    pub fn new(sql: &str, key_column: &str, range: KeyRange) -> Self {
        RangeRequest {
            sql: sql.to_string(),
            key_column: key_column.to_string(),
            range,
        }
    }

    pub fn statement(&self) -> String {
        QueryGenerator::range(&self.sql, &self.key_column, &self.range)
    }
}

/// Source of rows for extraction and schema discovery.
///
/// Implementations acquire a fresh connection for every call and release it
/// before returning; nothing is pooled or shared between callers.
#[async_trait]
pub trait RowSource: Send + Sync {
    /// Connection description with credentials masked, safe for logs and errors.
    fn describe(&self) -> String;

    /// Round-trips a trivial statement.
    async fn ping(&self) -> Result<(), DbError>;

    /// Column names and types of the probe statement, without reading rows.
    async fn probe(&self, request: &ProbeRequest) -> Result<Vec<RawColumn>, DbError>;

    /// Reads every row of the slice, ordered by the key column.
    async fn fetch_range(&self, request: &RangeRequest) -> Result<ResultSet, DbError>;
}

/// Builds the source for a configured driver. No connection is opened here.
pub fn create_source(
    driver: Driver,
    url: &str,
    command_timeout: Option<Duration>,
) -> Arc<dyn RowSource> {
    match driver {
        Driver::Postgres => Arc::new(PgSource::new(url, command_timeout)),
        Driver::MySql => Arc::new(MySqlSource::new(url, command_timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_driver_aliases() {
        assert_eq!("PG".parse::<Driver>().unwrap(), Driver::Postgres);
        assert_eq!("mariadb".parse::<Driver>().unwrap(), Driver::MySql);
        assert!(matches!(
            "oracle".parse::<Driver>(),
            Err(AdapterError::UnsupportedDriver(name)) if name == "oracle"
        ));
    }

    #[test]
    fn range_request_renders_bounded_statement() {
        let request = RangeRequest::new(
            "SELECT id, name FROM people",
            "id",
            KeyRange::new("A", "M"),
        );
        assert_eq!(
            request.statement(),
            "WITH cte AS ( SELECT id, name FROM people ) SELECT * FROM cte \
             WHERE id BETWEEN 'A' AND 'M' ORDER BY id ASC"
        );
    }
}
