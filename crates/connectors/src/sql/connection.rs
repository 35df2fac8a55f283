use model::records::row::Row;
use mysql_async::prelude::Queryable;

use crate::error::ConnectorError;
use crate::sql::connect::connect_postgres;
use crate::sql::dialect_kind::DialectKind;
use crate::sql::row::{
    ColumnMeta, mysql_row_to_row, mysql_rows_with_meta, postgres_row_to_row,
    postgres_rows_with_meta,
};
use crate::sql::transaction::SqlTransaction;

/// A live connection to either engine. Every reader/writer task in a
/// copy job (§6) holds one of these for its own exclusive use; nothing
/// here is shared across tasks.
pub enum SqlConnection {
    Postgres(tokio_postgres::Client),
    MySql(mysql_async::Conn),
}

impl SqlConnection {
    pub async fn connect(dialect: DialectKind, url: &str) -> Result<Self, ConnectorError> {
        match dialect {
            DialectKind::Postgres => Ok(SqlConnection::Postgres(connect_postgres(url).await?)),
            DialectKind::MySql => {
                let opts = mysql_async::Opts::from_url(url)
                    .map_err(|e| ConnectorError::InvalidUrl(e.to_string()))?;
                let conn = mysql_async::Conn::new(opts).await?;
                Ok(SqlConnection::MySql(conn))
            }
            other => Err(ConnectorError::UnsupportedDialect(other.to_string())),
        }
    }

    pub fn dialect_kind(&self) -> DialectKind {
        match self {
            SqlConnection::Postgres(_) => DialectKind::Postgres,
            SqlConnection::MySql(_) => DialectKind::MySql,
        }
    }

    pub async fn execute(&mut self, sql: &str) -> Result<u64, ConnectorError> {
        match self {
            SqlConnection::Postgres(client) => {
                client.execute(sql, &[]).await.map_err(ConnectorError::from)
            }
            SqlConnection::MySql(conn) => {
                conn.query_drop(sql).await.map_err(ConnectorError::from)?;
                Ok(conn.affected_rows())
            }
        }
    }

    pub async fn query_rows(&mut self, sql: &str) -> Result<Vec<Row>, ConnectorError> {
        match self {
            SqlConnection::Postgres(client) => {
                let rows = client.query(sql, &[]).await.map_err(ConnectorError::from)?;
                Ok(rows.iter().map(postgres_row_to_row).collect())
            }
            SqlConnection::MySql(conn) => {
                let rows: Vec<mysql_async::Row> =
                    conn.query(sql).await.map_err(ConnectorError::from)?;
                Ok(rows.iter().map(mysql_row_to_row).collect())
            }
        }
    }

    /// Like `query_rows`, but also returns each column's name and raw
    /// driver type name, for `memory-select`'s DB-type-hint capture (§4.7).
    pub async fn query_rows_with_meta(
        &mut self,
        sql: &str,
    ) -> Result<(Vec<ColumnMeta>, Vec<Row>), ConnectorError> {
        match self {
            SqlConnection::Postgres(client) => {
                let rows = client.query(sql, &[]).await.map_err(ConnectorError::from)?;
                Ok(postgres_rows_with_meta(&rows))
            }
            SqlConnection::MySql(conn) => {
                let rows: Vec<mysql_async::Row> =
                    conn.query(sql).await.map_err(ConnectorError::from)?;
                Ok(mysql_rows_with_meta(&rows))
            }
        }
    }

    pub async fn query_scalar_i64(&mut self, sql: &str) -> Result<Option<i64>, ConnectorError> {
        let rows = self.query_rows(sql).await?;
        Ok(rows
            .first()
            .and_then(|row| row.values().next())
            .and_then(|value| value.as_i64()))
    }

    pub async fn query_scalar_bool(&mut self, sql: &str) -> Result<Option<bool>, ConnectorError> {
        let rows = self.query_rows(sql).await?;
        Ok(rows
            .first()
            .and_then(|row| row.values().next())
            .and_then(|value| value.as_bool()))
    }

    pub async fn begin(&mut self) -> Result<SqlTransaction<'_>, ConnectorError> {
        match self {
            SqlConnection::Postgres(client) => {
                let txn = client.transaction().await?;
                Ok(SqlTransaction::Postgres(txn))
            }
            SqlConnection::MySql(conn) => {
                let txn = conn
                    .start_transaction(mysql_async::TxOpts::default())
                    .await?;
                Ok(SqlTransaction::MySql(txn))
            }
        }
    }
}
