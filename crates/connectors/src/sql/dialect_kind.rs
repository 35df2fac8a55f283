use std::fmt;
use std::str::FromStr;

/// The dialect identifier accepted in project configuration (§6):
/// `postgres`, `mysql`, `sqlserver`, `access`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialectKind {
    Postgres,
    MySql,
    SqlServer,
    Access,
}

impl FromStr for DialectKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(DialectKind::Postgres),
            "mysql" => Ok(DialectKind::MySql),
            "sqlserver" | "mssql" => Ok(DialectKind::SqlServer),
            "access" => Ok(DialectKind::Access),
            other => Err(format!("unknown dialect identifier: {other}")),
        }
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DialectKind::Postgres => "postgres",
            DialectKind::MySql => "mysql",
            DialectKind::SqlServer => "sqlserver",
            DialectKind::Access => "access",
        };
        write!(f, "{s}")
    }
}
