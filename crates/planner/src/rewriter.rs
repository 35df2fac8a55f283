//! Structural SQL rewriting that never requires a full parser: a
//! character scanner tracks string/identifier/comment spans and
//! parenthesis depth, and every analysis treats those spans as opaque.

use crate::error::PlannerError;
use crate::table_ref::TableRef;

/// A `Map['key']` token extracted from a job's SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapDirective {
    pub key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Span {
    Code,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
    BlockComment,
}

struct Scan {
    /// `opaque[i]` is true when byte `i` falls inside a string, quoted
    /// identifier, or comment.
    opaque: Vec<bool>,
    /// `depth[i]` is the parenthesis depth in effect at byte `i`, measured
    /// over code spans only.
    depth: Vec<i32>,
}

fn scan(sql: &str) -> Scan {
    let bytes = sql.as_bytes();
    let mut opaque = vec![false; bytes.len()];
    let mut depth = vec![0i32; bytes.len()];
    let mut span = Span::Code;
    let mut current_depth = 0i32;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match span {
            Span::Code => {
                if b == b'\'' {
                    span = Span::SingleQuoted;
                    opaque[i] = true;
                } else if b == b'"' {
                    span = Span::DoubleQuoted;
                    opaque[i] = true;
                } else if b == b'-' && bytes.get(i + 1) == Some(&b'-') {
                    span = Span::LineComment;
                    opaque[i] = true;
                    if i + 1 < bytes.len() {
                        opaque[i + 1] = true;
                    }
                    depth[i] = current_depth;
                    i += 1;
                } else if b == b'/' && bytes.get(i + 1) == Some(&b'*') {
                    span = Span::BlockComment;
                    opaque[i] = true;
                    if i + 1 < bytes.len() {
                        opaque[i + 1] = true;
                    }
                    depth[i] = current_depth;
                    i += 1;
                } else {
                    if b == b'(' {
                        depth[i] = current_depth;
                        current_depth += 1;
                    } else if b == b')' {
                        current_depth -= 1;
                        depth[i] = current_depth;
                    } else {
                        depth[i] = current_depth;
                    }
                }
            }
            Span::SingleQuoted => {
                opaque[i] = true;
                if b == b'\'' {
                    if bytes.get(i + 1) == Some(&b'\'') {
                        opaque[i + 1] = true;
                        i += 1;
                    } else {
                        span = Span::Code;
                    }
                }
            }
            Span::DoubleQuoted => {
                opaque[i] = true;
                if b == b'"' {
                    if bytes.get(i + 1) == Some(&b'"') {
                        opaque[i + 1] = true;
                        i += 1;
                    } else {
                        span = Span::Code;
                    }
                }
            }
            Span::LineComment => {
                opaque[i] = true;
                if b == b'\n' {
                    span = Span::Code;
                }
            }
            Span::BlockComment => {
                opaque[i] = true;
                if b == b'*' && bytes.get(i + 1) == Some(&b'/') {
                    if i + 1 < bytes.len() {
                        opaque[i + 1] = true;
                    }
                    i += 1;
                    span = Span::Code;
                }
            }
        }
        i += 1;
    }

    Scan { opaque, depth }
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Finds the byte offset of `keyword` (a single ASCII word, matched
/// case-insensitively on word boundaries) at parenthesis depth 0 and
/// outside any opaque span. Search starts at `from`.
fn find_keyword_at_depth0(sql: &str, scanned: &Scan, keyword: &str, from: usize) -> Option<usize> {
    let bytes = sql.as_bytes();
    let kw = keyword.as_bytes();
    let mut i = from;
    while i + kw.len() <= bytes.len() {
        if !scanned.opaque[i] && scanned.depth[i] == 0 {
            let slice = &bytes[i..i + kw.len()];
            if slice.eq_ignore_ascii_case(kw) {
                let before_ok = i == 0 || !is_word_byte(bytes[i - 1]);
                let after_idx = i + kw.len();
                let after_ok = after_idx >= bytes.len() || !is_word_byte(bytes[after_idx]);
                if before_ok && after_ok {
                    return Some(i);
                }
            }
        }
        i += 1;
    }
    None
}

/// Skips ASCII whitespace starting at `from`, returning the next index.
fn skip_ws(sql: &str, from: usize) -> usize {
    let bytes = sql.as_bytes();
    let mut i = from;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

/// Returns whether a top-level `WHERE` exists, and `sql` with the
/// top-level `ORDER BY` and `LIMIT`/`OFFSET`/`FETCH` clauses removed.
pub fn analyze_and_modify(sql: &str) -> (bool, String) {
    let scanned = scan(sql);
    let has_where = find_keyword_at_depth0(sql, &scanned, "WHERE", 0).is_some();

    let mut cut_at: Option<usize> = None;
    if let Some(pos) = find_keyword_at_depth0(sql, &scanned, "ORDER", 0) {
        let after = skip_ws(sql, pos + "ORDER".len());
        if find_keyword_at_depth0(&sql[after..], &scan(&sql[after..]), "BY", 0) == Some(0) {
            cut_at = Some(pos);
        }
    }
    for kw in ["LIMIT", "OFFSET", "FETCH"] {
        if let Some(pos) = find_keyword_at_depth0(sql, &scanned, kw, 0) {
            cut_at = Some(cut_at.map_or(pos, |existing| existing.min(pos)));
        }
    }

    let rewritten = match cut_at {
        Some(pos) => sql[..pos].trim_end().to_string(),
        None => sql.to_string(),
    };

    (has_where, rewritten)
}

fn is_valid_map_key_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Extracts every `Map['key']` directive, replacing each occurrence with
/// the empty string. Duplicate keys within one call, or keys containing
/// characters outside `[A-Za-z0-9_]`, are errors.
pub fn extract_map_directives(sql: &str) -> Result<(String, Vec<MapDirective>), PlannerError> {
    let mut out = String::with_capacity(sql.len());
    let mut directives = Vec::new();
    let mut seen = std::collections::HashSet::new();

    let bytes = sql.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if sql[i..].starts_with("Map[") {
            if let Some((key, consumed)) = parse_map_directive(&sql[i..])? {
                if !seen.insert(key.clone()) {
                    return Err(PlannerError::DuplicateMapKey(key));
                }
                directives.push(MapDirective { key });
                i += consumed;
                continue;
            }
        }
        let ch = sql[i..].chars().next().expect("i is a char boundary");
        out.push(ch);
        i += ch.len_utf8();
    }

    Ok((out, directives))
}

/// Attempts to parse one `Map['key'];?` directive starting at the
/// beginning of `rest`. Returns the key and the number of bytes consumed,
/// or `None` if `rest` doesn't actually start a well-formed directive
/// (in which case the caller should treat the leading `Map[` as plain
/// text and keep scanning).
fn parse_map_directive(rest: &str) -> Result<Option<(String, usize)>, PlannerError> {
    let bytes = rest.as_bytes();
    let mut i = "Map[".len();
    i = skip_ws(rest, i);
    if bytes.get(i) != Some(&b'\'') {
        return Ok(None);
    }
    i += 1;
    let key_start = i;
    while i < bytes.len() && bytes[i] != b'\'' {
        i += 1;
    }
    if i >= bytes.len() {
        return Ok(None);
    }
    let key_raw = &rest[key_start..i];
    i += 1;
    i = skip_ws(rest, i);
    if bytes.get(i) != Some(&b']') {
        return Ok(None);
    }
    i += 1;
    if bytes.get(i) == Some(&b';') {
        i += 1;
    }

    if key_raw.is_empty() || !key_raw.bytes().all(is_valid_map_key_char) {
        return Err(PlannerError::InvalidMapKey(key_raw.to_string()));
    }

    Ok(Some((key_raw.to_string(), i)))
}

/// Locates the table named after `INSERT INTO`, respecting double-quoted
/// identifiers; the token ends at the first whitespace or `(` at depth 0.
pub fn extract_insert_table(insert_sql: &str) -> Result<TableRef, PlannerError> {
    let scanned = scan(insert_sql);
    let insert_pos = find_keyword_at_depth0(insert_sql, &scanned, "INSERT", 0)
        .ok_or(PlannerError::MissingInsertTable)?;
    let after_insert = skip_ws(insert_sql, insert_pos + "INSERT".len());
    let into_pos = find_keyword_at_depth0(
        &insert_sql[after_insert..],
        &scan(&insert_sql[after_insert..]),
        "INTO",
        0,
    )
    .ok_or(PlannerError::MissingInsertTable)?;
    let after_into = skip_ws(insert_sql, after_insert + into_pos + "INTO".len());

    let bytes = insert_sql.as_bytes();
    let mut i = after_into;
    let mut token = String::new();
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'"' {
            token.push('"');
            i += 1;
            while i < bytes.len() {
                if bytes[i] == b'"' {
                    if bytes.get(i + 1) == Some(&b'"') {
                        token.push('"');
                        i += 2;
                        continue;
                    }
                    token.push('"');
                    i += 1;
                    break;
                }
                let ch = insert_sql[i..].chars().next().expect("i is a char boundary");
                token.push(ch);
                i += ch.len_utf8();
            }
            continue;
        }
        if b.is_ascii_whitespace() || b == b'(' {
            break;
        }
        let ch = insert_sql[i..].chars().next().expect("i is a char boundary");
        token.push(ch);
        i += ch.len_utf8();
    }

    if token.is_empty() {
        return Err(PlannerError::MissingInsertTable);
    }

    let unquoted: String = token.replace('"', "");
    match unquoted.split_once('.') {
        Some((schema, name)) => Ok(TableRef::qualified(schema, name)),
        None => Ok(TableRef::new(unquoted)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_top_level_where_outside_strings() {
        let (has_where, _) = analyze_and_modify("SELECT * FROM t WHERE id = 1");
        assert!(has_where);

        let (has_where, _) = analyze_and_modify("SELECT 'WHERE' FROM t");
        assert!(!has_where);
    }

    #[test]
    fn strips_top_level_order_by_and_limit() {
        let (_, sql) = analyze_and_modify("SELECT * FROM t WHERE id > 1 ORDER BY id LIMIT 10");
        assert_eq!(sql, "SELECT * FROM t WHERE id > 1");
    }

    #[test]
    fn ignores_order_by_inside_subquery_parens() {
        let (_, sql) =
            analyze_and_modify("SELECT * FROM (SELECT * FROM t ORDER BY id) s LIMIT 5");
        assert_eq!(sql, "SELECT * FROM (SELECT * FROM t ORDER BY id) s");
    }

    #[test]
    fn extracts_single_map_directive() {
        let (clean, directives) =
            extract_map_directives("SELECT * FROM Map['customers'] c").unwrap();
        assert_eq!(clean, "SELECT * FROM  c");
        assert_eq!(directives, vec![MapDirective { key: "customers".into() }]);
    }

    #[test]
    fn rejects_duplicate_map_keys() {
        let err = extract_map_directives("Map['a'] Map['a']").unwrap_err();
        assert!(matches!(err, PlannerError::DuplicateMapKey(_)));
    }

    #[test]
    fn rejects_invalid_map_key_characters() {
        let err = extract_map_directives("Map['bad key!']").unwrap_err();
        assert!(matches!(err, PlannerError::InvalidMapKey(_)));
    }

    #[test]
    fn extracts_schema_qualified_insert_table() {
        let table = extract_insert_table("INSERT INTO public.\"Orders\" (id) VALUES (1)").unwrap();
        assert_eq!(table.schema.as_deref(), Some("public"));
        assert_eq!(table.name, "Orders");
    }

    #[test]
    fn preserves_multibyte_characters_around_map_directives() {
        let (clean, directives) =
            extract_map_directives("SELECT nome_válido FROM Map['cadastro_de_clientes']").unwrap();
        assert_eq!(clean, "SELECT nome_válido FROM ");
        assert_eq!(directives, vec![MapDirective { key: "cadastro_de_clientes".into() }]);
    }

    #[test]
    fn preserves_multibyte_characters_in_quoted_insert_table() {
        let table = extract_insert_table("INSERT INTO \"endereço\" (id) VALUES (1)").unwrap();
        assert_eq!(table.name, "endereço");
    }
}
