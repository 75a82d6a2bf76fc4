//! Header sanitization
//!
//! Turns arbitrary CSV header text into an identifier made only of ASCII
//! letters, digits and single underscores, never starting with a digit.
//! Accents are removed by decomposing (NFD) and dropping the combining marks.

use unicode_normalization::UnicodeNormalization;

/// Prefix given to identifiers that would otherwise start with a digit
pub const DIGIT_PREFIX: &str = "col_";

/// Canonical identifier for `text`, case preserved.
///
/// Whitespace and underscore runs become one `_`, every other non
/// alphanumeric character disappears without leaving a separator, and
/// separators at either end are stripped. Text with nothing usable in it
/// sanitizes to the empty string.
///
/// ```
/// use rowcast_producer::sanitize::sanitize;
///
/// assert_eq!(sanitize("Quantidade de Reclamações"), "Quantidade_de_Reclamacoes");
/// assert_eq!(sanitize("123 coluna"), "col_123_coluna");
/// assert_eq!(sanitize("(%)"), "");
/// ```
pub fn sanitize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut separator = false;

    for c in text.nfd() {
        if c.is_ascii_alphanumeric() {
            if separator && !out.is_empty() {
                out.push('_');
            }
            separator = false;
            out.push(c);
        } else if c == '_' || c.is_whitespace() {
            separator = true;
        }
    }

    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert_str(0, DIGIT_PREFIX);
    }
    out
}

/// Record key for a header: sanitized, then lower-cased
pub fn field_key(header: &str) -> String {
    sanitize(header).to_lowercase()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn strips_diacritics() {
        assert_eq!(field_key("Quantidade de Reclamações"), "quantidade_de_reclamacoes");
        assert_eq!(field_key("Instituição financeira"), "instituicao_financeira");
        assert_eq!(sanitize("Índice"), "Indice");
    }

    #[test]
    fn prefixes_leading_digit() {
        assert_eq!(sanitize("123 coluna"), "col_123_coluna");
        assert_eq!(sanitize("  9"), "col_9");
    }

    #[test]
    fn degenerate_inputs_are_empty() {
        assert_eq!(sanitize(""), "");
        assert_eq!(sanitize("   "), "");
        assert_eq!(sanitize("___"), "");
        assert_eq!(sanitize("%&*"), "");
    }

    #[test]
    fn collapses_separators() {
        assert_eq!(sanitize("a  \t b"), "a_b");
        assert_eq!(sanitize("__a__b__"), "a_b");
        assert_eq!(sanitize("a _ b"), "a_b");
        assert_eq!(sanitize("Quantidade total de clientes – CCS e SCR"), "Quantidade_total_de_clientes_CCS_e_SCR");
    }

    #[test]
    fn dropped_punctuation_leaves_no_gap() {
        assert_eq!(sanitize("CNPJ-IF"), "CNPJIF");
        assert_eq!(sanitize("Trimestre (ano)"), "Trimestre_ano");
    }

    #[test]
    fn preserves_case() {
        assert_eq!(sanitize("CamelCase Header"), "CamelCase_Header");
    }

    proptest! {
        #[test]
        fn idempotent(text in "\\PC{0,40}") {
            let once = sanitize(&text);
            prop_assert_eq!(sanitize(&once), once.clone());
        }

        #[test]
        fn output_alphabet(text in "\\PC{0,40}") {
            let out = sanitize(&text);
            prop_assert!(out.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
            prop_assert!(!out.starts_with('_') && !out.ends_with('_'));
            prop_assert!(!out.contains("__"));
            prop_assert!(!out.starts_with(|c: char| c.is_ascii_digit()));
        }
    }
}
