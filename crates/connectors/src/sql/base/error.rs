use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// All errors coming from the database/query layer.
#[derive(Debug, Error)]
pub enum DbError {
    /// Could not open a connection.
    #[error("Connection failed: {0}")]
    Connect(#[from] ConnectorError),

    /// Preparing or executing a statement failed.
    #[error("Query failed: {source}. Statement: {statement}")]
    Query {
        statement: String,
        #[source]
        source: BoxError,
    },

    /// A column value could not be converted.
    #[error("Failed to decode column '{column}': {message}")]
    Decode { column: String, message: String },
}

impl DbError {
    pub fn query(statement: &str, source: impl Into<BoxError>) -> Self {
        DbError::Query {
            statement: statement.to_string(),
            source: source.into(),
        }
    }

    /// Attaches the statement to errors raised before the query ran.
    pub fn with_statement(self, statement: &str) -> Self {
        match self {
            DbError::Query { .. } => self,
            other => DbError::query(statement, other),
        }
    }

    /// Statement text of a failed query, if the failure came from one.
    pub fn statement(&self) -> Option<&str> {
        match self {
            DbError::Query { statement, .. } => Some(statement),
            _ => None,
        }
    }
}

/// Errors happening during connection setup.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("Invalid connection url: {0}")]
    InvalidUrl(String),

    #[error("TLS setup failed: {0}")]
    Tls(#[from] native_tls::Error),

    #[error("Postgres connection failed: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("MySQL connection failed: {0}")]
    MySql(#[from] mysql_async::Error),
}
