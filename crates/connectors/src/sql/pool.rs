use mysql_async::Pool as MySqlPool;

use crate::error::ConnectorError;
use crate::sql::connect::connect_postgres;
use crate::sql::connection::SqlConnection;
use crate::sql::dialect_kind::DialectKind;

/// Per-dialect connection source.
///
/// MySQL has a real pool in `mysql_async`, so the teacher's pattern of
/// holding a single `Pool` and calling `get_conn()` per task carries over
/// directly. `tokio_postgres` has no native pool, so there the "pool" is
/// just the URL plus dialect: every `acquire()` opens a brand-new client.
/// Either way the caller gets a connection it owns exclusively, which is
/// what the reader/writer pools in a copy job (§6) need.
pub enum ConnectionPool {
    Postgres { url: String },
    MySql(MySqlPool),
}

impl ConnectionPool {
    pub fn new(dialect: DialectKind, url: &str) -> Result<Self, ConnectorError> {
        match dialect {
            DialectKind::Postgres => Ok(ConnectionPool::Postgres {
                url: url.to_string(),
            }),
            DialectKind::MySql => {
                let pool = MySqlPool::from_url(url)
                    .map_err(|e| ConnectorError::InvalidUrl(e.to_string()))?;
                Ok(ConnectionPool::MySql(pool))
            }
            other => Err(ConnectorError::UnsupportedDialect(other.to_string())),
        }
    }

    pub fn dialect_kind(&self) -> DialectKind {
        match self {
            ConnectionPool::Postgres { .. } => DialectKind::Postgres,
            ConnectionPool::MySql(_) => DialectKind::MySql,
        }
    }

    pub async fn acquire(&self) -> Result<SqlConnection, ConnectorError> {
        match self {
            ConnectionPool::Postgres { url } => {
                Ok(SqlConnection::Postgres(connect_postgres(url).await?))
            }
            ConnectionPool::MySql(pool) => {
                let conn = pool.get_conn().await?;
                Ok(SqlConnection::MySql(conn))
            }
        }
    }

    pub async fn close(&self) -> Result<(), ConnectorError> {
        if let ConnectionPool::MySql(pool) = self {
            pool.clone().disconnect().await?;
        }
        Ok(())
    }
}
