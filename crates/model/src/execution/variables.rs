use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One entry of the project-level `variables` config list (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub value: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

/// The flat `name -> string` mapping described in §3. Variables are
/// project-scoped, not pipeline- or job-scoped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VariableMap(pub HashMap<String, String>);

impl VariableMap {
    pub fn from_list(vars: &[Variable]) -> Self {
        VariableMap(
            vars.iter()
                .map(|v| (v.name.clone(), v.value.clone()))
                .collect(),
        )
    }

    /// Plain textual `${name}` replacement, performed exactly once, before
    /// any other SQL processing (§3, §6). No escaping is applied: a
    /// variable value that collides with SQL syntax is the operator's
    /// responsibility, not this layer's.
    pub fn substitute(&self, sql: &str) -> String {
        let mut out = String::with_capacity(sql.len());
        let mut rest = sql;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find('}') {
                Some(close) => {
                    let name = &after[..close];
                    match self.0.get(name) {
                        Some(value) => out.push_str(value),
                        None => {
                            out.push_str("${");
                            out.push_str(name);
                            out.push('}');
                        }
                    }
                    rest = &after[close + 1..];
                }
                None => {
                    out.push_str("${");
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_known_variables_once() {
        let mut map = HashMap::new();
        map.insert("schema".to_string(), "public".to_string());
        let vars = VariableMap(map);
        let sql = "SELECT * FROM ${schema}.users";
        assert_eq!(vars.substitute(sql), "SELECT * FROM public.users");
    }

    #[test]
    fn leaves_unknown_placeholders_untouched() {
        let vars = VariableMap::default();
        let sql = "SELECT * FROM ${missing}.users";
        assert_eq!(vars.substitute(sql), sql);
    }
}
