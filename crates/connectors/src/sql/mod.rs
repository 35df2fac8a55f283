mod connect;
pub mod connection;
pub mod dialect_kind;
pub mod explain;
pub mod pool;
pub mod row;
pub mod transaction;

pub use connection::SqlConnection;
pub use dialect_kind::DialectKind;
pub use explain::MainTable;
pub use pool::ConnectionPool;
pub use row::ColumnMeta;
pub use transaction::SqlTransaction;
