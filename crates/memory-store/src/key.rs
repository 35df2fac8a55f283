use unicode_normalization::UnicodeNormalization;

use crate::error::MemoryStoreError;

/// Normalizes a memory-select job name (or a `Map['key']` directive key)
/// into the canonical dataset key (§4.3): lowercase, NFD-decompose and
/// strip combining marks (diacritics), collapse whitespace and `-` to
/// `_`, drop anything outside `[a-z0-9_]`, collapse repeated `_`, trim
/// leading/trailing `_`. An empty result is an error.
pub fn normalize(raw: &str) -> Result<String, MemoryStoreError> {
    let lowered = raw.to_lowercase();

    let decomposed: String = lowered
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect();

    let mut collapsed = String::with_capacity(decomposed.len());
    for c in decomposed.chars() {
        if c.is_whitespace() || c == '-' {
            collapsed.push('_');
        } else {
            collapsed.push(c);
        }
    }

    let filtered: String = collapsed
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();

    let mut out = String::with_capacity(filtered.len());
    let mut last_was_underscore = false;
    for c in filtered.chars() {
        if c == '_' {
            if last_was_underscore {
                continue;
            }
            last_was_underscore = true;
        } else {
            last_was_underscore = false;
        }
        out.push(c);
    }

    let trimmed = out.trim_matches('_');

    if trimmed.is_empty() {
        return Err(MemoryStoreError::EmptyKey);
    }

    Ok(trimmed.to_string())
}

/// Unicode combining-mark detection good enough for the accents this
/// normalization targets (NFD decomposition puts accents in the
/// `Mn` general category ranges used here).
fn is_combining_mark(c: char) -> bool {
    matches!(c,
        '\u{0300}'..='\u{036F}' |
        '\u{1AB0}'..='\u{1AFF}' |
        '\u{1DC0}'..='\u{1DFF}' |
        '\u{20D0}'..='\u{20FF}' |
        '\u{FE20}'..='\u{FE2F}'
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_portuguese_example_from_spec() {
        assert_eq!(normalize("Cadastro de Clientes").unwrap(), "cadastro_de_clientes");
    }

    #[test]
    fn strips_accents_and_hyphens() {
        assert_eq!(normalize("nome-válido").unwrap(), "nome_valido");
    }

    #[test]
    fn whitespace_only_is_an_error() {
        assert_eq!(normalize(" ").unwrap_err(), MemoryStoreError::EmptyKey);
    }

    #[test]
    fn idempotent_on_already_normalized_input() {
        let once = normalize("Cadastro de Produtos").unwrap();
        let twice = normalize(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn collapses_repeated_separators() {
        assert_eq!(normalize("a   b---c").unwrap(), "a_b_c");
    }
}
