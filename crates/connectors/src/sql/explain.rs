use model::records::row::Row;

/// The physical relation an EXPLAIN plan resolves the outermost scan to
/// (§C1 `explain_select`, §4 "Derive `main_table`"). `schema` is absent
/// when the plan doesn't qualify the name; `alias` is absent when the
/// query didn't assign one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MainTable {
    pub schema: Option<String>,
    pub name: String,
    pub alias: Option<String>,
}

impl MainTable {
    /// The identifier to use in a hash-partition predicate: schema-qualified
    /// when a schema is known, the alias when one exists and no schema was
    /// reported (an alias always shadows the bare name inside the query).
    pub fn reference(&self) -> String {
        if let Some(alias) = &self.alias {
            alias.clone()
        } else if let Some(schema) = &self.schema {
            format!("{schema}.{}", self.name)
        } else {
            self.name.clone()
        }
    }
}

fn split_schema(token: &str) -> (Option<String>, String) {
    match token.split_once('.') {
        Some((schema, name)) => (Some(schema.to_string()), name.to_string()),
        None => (None, token.to_string()),
    }
}

/// Parses Postgres's textual `EXPLAIN` output. Every scan node is rendered
/// as a line containing `... Scan ... on <table> [alias] ...`; the first
/// such line names the outermost relation.
pub fn parse_postgres_explain(rows: &[Row]) -> Option<MainTable> {
    for row in rows {
        let Some(line) = row.values().next().and_then(|v| v.as_str()) else {
            continue;
        };
        let Some(on_idx) = line.find(" on ") else {
            continue;
        };
        let rest = line[on_idx + 4..].trim_start();
        let mut parts = rest.split_whitespace();
        let table_token = parts.next()?;
        let (schema, name) = split_schema(table_token.trim_matches('"'));
        let alias = parts
            .next()
            .filter(|token| !token.starts_with('('))
            .map(|token| token.trim_matches('"').to_string());
        return Some(MainTable {
            schema,
            name,
            alias,
        });
    }
    None
}

/// Parses MySQL's tabular `EXPLAIN` output. The first row's `table`
/// column is the driving table for the outermost scan; MySQL reports the
/// query alias there directly when one was assigned.
pub fn parse_mysql_explain(rows: &[Row]) -> Option<MainTable> {
    let row = rows.first()?;
    let (_, value) = row.iter().find(|(column, _)| column.eq_ignore_ascii_case("table"))?;
    let name = value.as_str()?.to_string();
    Some(MainTable {
        schema: None,
        name,
        alias: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::core::value::Value;
    use std::collections::HashMap;

    fn row_with(column: &str, value: Value) -> Row {
        let mut row = HashMap::new();
        row.insert(column.to_string(), value);
        row
    }

    #[test]
    fn parses_postgres_seq_scan_with_schema_and_alias() {
        let rows = vec![row_with(
            "QUERY PLAN",
            Value::String("Seq Scan on public.orders o  (cost=0.00..18.50 rows=850 width=40)".into()),
        )];
        let table = parse_postgres_explain(&rows).unwrap();
        assert_eq!(table.schema.as_deref(), Some("public"));
        assert_eq!(table.name, "orders");
        assert_eq!(table.alias.as_deref(), Some("o"));
    }

    #[test]
    fn parses_postgres_index_scan_without_alias() {
        let rows = vec![row_with(
            "QUERY PLAN",
            Value::String("Index Scan using orders_pkey on orders  (cost=0.42..8.44 rows=1 width=40)".into()),
        )];
        let table = parse_postgres_explain(&rows).unwrap();
        assert_eq!(table.schema, None);
        assert_eq!(table.name, "orders");
        assert_eq!(table.alias, None);
    }

    #[test]
    fn parses_mysql_table_column() {
        let rows = vec![row_with("table", Value::String("orders".into()))];
        let table = parse_mysql_explain(&rows).unwrap();
        assert_eq!(table.name, "orders");
    }
}
