use crate::{
    source::{ProbeRequest, RangeRequest, RowSource},
    sql::{
        base::{error::DbError, query::QueryGenerator, utils::redact_url},
        postgres::{decode::decode_value, utils::connect_client},
    },
};
use async_trait::async_trait;
use model::{
    core::data_type::DataType,
    records::row::{RawColumn, ResultSet},
};
use std::time::Duration;
use tokio_postgres::{Client, Statement};
use tracing::{debug, trace};

pub struct PgSource {
    url: String,
    command_timeout: Option<Duration>,
}

impl PgSource {
    pub fn new(url: &str, command_timeout: Option<Duration>) -> Self {
        PgSource {
            url: url.to_string(),
            command_timeout,
        }
    }

    async fn open(&self) -> Result<Client, DbError> {
        let client = connect_client(&self.url).await?;
        if let Some(timeout) = self.command_timeout {
            let statement = format!("SET statement_timeout = {}", timeout.as_millis());
            client
                .batch_execute(&statement)
                .await
                .map_err(|e| DbError::query(&statement, e))?;
        }
        Ok(client)
    }

    async fn prepare(&self, client: &Client, statement: &str) -> Result<Statement, DbError> {
        client
            .prepare(statement)
            .await
            .map_err(|e| DbError::query(statement, e))
    }
}

fn raw_columns(statement: &Statement) -> Vec<RawColumn> {
    statement
        .columns()
        .iter()
        .map(|col| RawColumn::new(col.name(), DataType::from_postgres_type(col.type_().name())))
        .collect()
}

#[async_trait]
impl RowSource for PgSource {
    fn describe(&self) -> String {
        redact_url(&self.url)
    }

    async fn ping(&self) -> Result<(), DbError> {
        let client = self.open().await?;
        let statement = QueryGenerator::ping();
        client
            .simple_query(statement)
            .await
            .map_err(|e| DbError::query(statement, e))?;
        Ok(())
    }

    async fn probe(&self, request: &ProbeRequest) -> Result<Vec<RawColumn>, DbError> {
        let statement = request.statement();
        let client = self.open().await?;
        let prepared = self.prepare(&client, &statement).await?;
        debug!(statement = %statement, columns = prepared.columns().len(), "Probed source shape");
        Ok(raw_columns(&prepared))
    }

    async fn fetch_range(&self, request: &RangeRequest) -> Result<ResultSet, DbError> {
        let statement = request.statement();
        let client = self.open().await?;
        let prepared = self.prepare(&client, &statement).await?;

        trace!(statement = %statement, "Start");
        let rows = client
            .query(&prepared, &[])
            .await
            .map_err(|e| DbError::query(&statement, e))?;

        let columns = raw_columns(&prepared);
        let mut decoded = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut values = Vec::with_capacity(columns.len());
            for (idx, column) in prepared.columns().iter().enumerate() {
                let value = decode_value(row, idx, column.type_()).map_err(|e| DbError::Decode {
                    column: column.name().to_string(),
                    message: e.to_string(),
                })?;
                values.push(value);
            }
            decoded.push(values);
        }
        trace!(statement = %statement, rows = decoded.len(), "Finish");

        Ok(ResultSet::new(columns, decoded))
    }
}
