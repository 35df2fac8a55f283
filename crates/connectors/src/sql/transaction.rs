use model::records::row::Row;
use mysql_async::prelude::Queryable;

use crate::error::ConnectorError;
use crate::sql::row::{
    ColumnMeta, mysql_row_to_row, mysql_rows_with_meta, postgres_row_to_row,
    postgres_rows_with_meta,
};

/// A transaction opened on a dedicated connection. Every copy-job writer
/// owns exactly one of these for the lifetime of a batch (§6): the batch
/// commits or rolls back as a unit, preserving all-or-nothing semantics.
pub enum SqlTransaction<'a> {
    Postgres(tokio_postgres::Transaction<'a>),
    MySql(mysql_async::Transaction<'a>),
}

impl<'a> SqlTransaction<'a> {
    pub async fn execute(&mut self, sql: &str) -> Result<u64, ConnectorError> {
        match self {
            SqlTransaction::Postgres(txn) => txn
                .execute(sql, &[])
                .await
                .map_err(ConnectorError::from),
            SqlTransaction::MySql(txn) => {
                txn.query_drop(sql)
                    .await
                    .map_err(ConnectorError::from)?;
                Ok(txn.affected_rows())
            }
        }
    }

    pub async fn query_rows(&mut self, sql: &str) -> Result<Vec<Row>, ConnectorError> {
        match self {
            SqlTransaction::Postgres(txn) => {
                let rows = txn.query(sql, &[]).await.map_err(ConnectorError::from)?;
                Ok(rows.iter().map(postgres_row_to_row).collect())
            }
            SqlTransaction::MySql(txn) => {
                let rows: Vec<mysql_async::Row> =
                    txn.query(sql).await.map_err(ConnectorError::from)?;
                Ok(rows.iter().map(mysql_row_to_row).collect())
            }
        }
    }

    /// See `SqlConnection::query_rows_with_meta`.
    pub async fn query_rows_with_meta(
        &mut self,
        sql: &str,
    ) -> Result<(Vec<ColumnMeta>, Vec<Row>), ConnectorError> {
        match self {
            SqlTransaction::Postgres(txn) => {
                let rows = txn.query(sql, &[]).await.map_err(ConnectorError::from)?;
                Ok(postgres_rows_with_meta(&rows))
            }
            SqlTransaction::MySql(txn) => {
                let rows: Vec<mysql_async::Row> =
                    txn.query(sql).await.map_err(ConnectorError::from)?;
                Ok(mysql_rows_with_meta(&rows))
            }
        }
    }

    pub async fn commit(self) -> Result<(), ConnectorError> {
        match self {
            SqlTransaction::Postgres(txn) => txn.commit().await.map_err(ConnectorError::from),
            SqlTransaction::MySql(txn) => txn.commit().await.map_err(ConnectorError::from),
        }
    }

    pub async fn rollback(self) -> Result<(), ConnectorError> {
        match self {
            SqlTransaction::Postgres(txn) => txn.rollback().await.map_err(ConnectorError::from),
            SqlTransaction::MySql(txn) => txn.rollback().await.map_err(ConnectorError::from),
        }
    }
}
