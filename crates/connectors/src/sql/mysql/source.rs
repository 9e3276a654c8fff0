use crate::{
    source::{ProbeRequest, RangeRequest, RowSource},
    sql::{
        base::{
            error::{ConnectorError, DbError},
            query::QueryGenerator,
            utils::redact_url,
        },
        mysql::decode::{column_data_type, decode_value},
    },
};
use async_trait::async_trait;
use model::{
    core::data_type::DataType,
    records::row::{RawColumn, ResultSet},
};
use mysql_async::{Conn, Opts, Row, Statement, Value as MySqlValue, prelude::Queryable};
use std::time::Duration;
use tracing::{debug, trace};

pub struct MySqlSource {
    url: String,
    command_timeout: Option<Duration>,
}

impl MySqlSource {
    pub fn new(url: &str, command_timeout: Option<Duration>) -> Self {
        MySqlSource {
            url: url.to_string(),
            command_timeout,
        }
    }

    async fn open(&self) -> Result<Conn, DbError> {
        let opts = Opts::from_url(&self.url).map_err(|e| ConnectorError::InvalidUrl(e.to_string()))?;
        let mut conn = Conn::new(opts).await.map_err(ConnectorError::from)?;
        if let Some(timeout) = self.command_timeout {
            let statement = format!("SET SESSION max_execution_time = {}", timeout.as_millis());
            conn.query_drop(statement.as_str())
                .await
                .map_err(|e| DbError::query(&statement, e))?;
        }
        Ok(conn)
    }

    async fn prepare(&self, conn: &mut Conn, statement: &str) -> Result<Statement, DbError> {
        conn.prep(statement)
            .await
            .map_err(|e| DbError::query(statement, e))
    }
}

async fn release(conn: Conn) {
    if let Err(err) = conn.disconnect().await {
        debug!(%err, "MySQL disconnect failed");
    }
}

#[async_trait]
impl RowSource for MySqlSource {
    fn describe(&self) -> String {
        redact_url(&self.url)
    }

    async fn ping(&self) -> Result<(), DbError> {
        let mut conn = self.open().await?;
        let statement = QueryGenerator::ping();
        let result = conn.query_drop(statement).await;
        release(conn).await;
        result.map_err(|e| DbError::query(statement, e))
    }

    async fn probe(&self, request: &ProbeRequest) -> Result<Vec<RawColumn>, DbError> {
        let statement = request.statement();
        let mut conn = self.open().await?;
        let prepared = self.prepare(&mut conn, &statement).await;
        release(conn).await;

        let prepared = prepared?;
        let columns: Vec<RawColumn> = prepared
            .columns()
            .iter()
            .map(|col| RawColumn::new(&col.name_str(), column_data_type(col)))
            .collect();
        debug!(statement = %statement, columns = columns.len(), "Probed source shape");
        Ok(columns)
    }

    async fn fetch_range(&self, request: &RangeRequest) -> Result<ResultSet, DbError> {
        let statement = request.statement();
        let mut conn = self.open().await?;

        trace!(statement = %statement, "Start");
        let fetched = async {
            let prepared = self.prepare(&mut conn, &statement).await?;
            let rows: Vec<Row> = conn
                .exec(&prepared, ())
                .await
                .map_err(|e| DbError::query(&statement, e))?;
            Ok::<_, DbError>((prepared, rows))
        }
        .await;
        release(conn).await;
        let (prepared, rows) = fetched?;

        let types: Vec<DataType> = prepared.columns().iter().map(column_data_type).collect();
        let columns: Vec<RawColumn> = prepared
            .columns()
            .iter()
            .zip(&types)
            .map(|(col, data_type)| RawColumn::new(&col.name_str(), data_type.clone()))
            .collect();

        let mut decoded = Vec::with_capacity(rows.len());
        for mut row in rows {
            let mut values = Vec::with_capacity(columns.len());
            for (idx, data_type) in types.iter().enumerate() {
                let cell = row.take::<MySqlValue, _>(idx).unwrap_or(MySqlValue::NULL);
                let value = decode_value(cell, data_type).map_err(|message| DbError::Decode {
                    column: columns[idx].name.clone(),
                    message,
                })?;
                values.push(value);
            }
            decoded.push(values);
        }
        trace!(statement = %statement, rows = decoded.len(), "Finish");

        Ok(ResultSet::new(columns, decoded))
    }
}
