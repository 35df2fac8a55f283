use thiserror::Error;

/// The §7 error taxonomy. Classification is a substring match against the
/// driver's error message, exactly as the spec prescribes — there is no
/// structured error-code table shared across MySQL/Postgres/SQL Server/
/// Access, so pattern matching on the rendered message is the only
/// portable signal available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    DuplicateKey,
    ForeignKey,
    Connection,
    SqlSyntax,
    Permission,
    TableNotFound,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::DuplicateKey => "duplicate_key_error",
            ErrorKind::ForeignKey => "foreign_key_error",
            ErrorKind::Connection => "connection_error",
            ErrorKind::SqlSyntax => "sql_syntax_error",
            ErrorKind::Permission => "permission_error",
            ErrorKind::TableNotFound => "table_not_found",
            ErrorKind::Unknown => "unknown_error",
        }
    }
}

/// Classifies a driver error message into the §7 taxonomy. The match
/// order matters: foreign-key phrasing often also contains "constraint",
/// so the more specific patterns are checked before the generic ones.
pub fn classify(message: &str) -> ErrorKind {
    let m = message.to_ascii_lowercase();

    if m.contains("foreign key") || m.contains("violates foreign key constraint") {
        ErrorKind::ForeignKey
    } else if m.contains("duplicate")
        || m.contains("unique constraint")
        || m.contains("unique violation")
        || m.contains("primary key")
    {
        ErrorKind::DuplicateKey
    } else if m.contains("connection")
        || m.contains("connect")
        || m.contains("broken pipe")
        || m.contains("timed out")
        || m.contains("timeout")
        || m.contains("closed")
        || m.contains("reset by peer")
    {
        ErrorKind::Connection
    } else if m.contains("permission denied") || m.contains("access denied") || m.contains("authentication") {
        ErrorKind::Permission
    } else if m.contains("does not exist") || m.contains("doesn't exist") || m.contains("unknown table") {
        ErrorKind::TableNotFound
    } else if m.contains("syntax error") || m.contains("parse error") {
        ErrorKind::SqlSyntax
    } else {
        ErrorKind::Unknown
    }
}

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("invalid connection url: {0}")]
    InvalidUrl(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("tls configuration error: {0}")]
    TlsConfig(String),

    #[error("unsupported dialect: {0}")]
    UnsupportedDialect(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("mysql error: {0}")]
    MySql(#[from] mysql_async::Error),

    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),
}

impl ConnectorError {
    /// Classifies this error against the §7 taxonomy, using the
    /// driver-rendered message.
    pub fn kind(&self) -> ErrorKind {
        classify(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_duplicate_key() {
        assert_eq!(
            classify("duplicate key value violates unique constraint \"users_pkey\""),
            ErrorKind::DuplicateKey
        );
    }

    #[test]
    fn classifies_foreign_key_before_generic_constraint() {
        assert_eq!(
            classify("insert or update on table violates foreign key constraint \"fk_orders\""),
            ErrorKind::ForeignKey
        );
    }

    #[test]
    fn classifies_connection_errors() {
        assert_eq!(classify("connection timed out"), ErrorKind::Connection);
        assert_eq!(
            classify("server closed the connection unexpectedly"),
            ErrorKind::Connection
        );
    }

    #[test]
    fn unrecognized_message_is_unknown() {
        assert_eq!(classify("something odd happened"), ErrorKind::Unknown);
    }
}
