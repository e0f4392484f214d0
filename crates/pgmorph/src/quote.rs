//! SQL identifier and literal quoting.
//!
//! Every DDL builder goes through this module; nothing else in the crate
//! concatenates quotes into SQL.

/// Quotes an identifier when needed. Plain lower-case identifiers pass
/// through unquoted; anything else is double-quoted with `"` doubling.
#[must_use]
pub fn ident(name: &str) -> String {
    let plain = !name.is_empty()
        && name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && !is_reserved(name);

    if plain {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

/// Quotes a string literal with `'` doubling.
#[must_use]
pub fn literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Dollar-quotes a routine body, picking a tag that cannot occur in the
/// body itself.
#[must_use]
pub fn dollar_body(body: &str) -> String {
    let mut tag = String::from("$fn$");
    while body.contains(&tag) {
        tag.insert(tag.len() - 1, '_');
    }
    format!("{tag}{body}{tag}")
}

/// Key words that must be quoted even in lower case. Deliberately a short,
/// conservative list: quoting a non-reserved word is harmless, the reverse
/// is not.
fn is_reserved(word: &str) -> bool {
    const RESERVED: &[&str] = &[
        "all", "and", "any", "as", "asc", "between", "case", "cast", "check", "column",
        "constraint", "create", "default", "desc", "distinct", "do", "else", "end", "except",
        "false", "for", "foreign", "from", "grant", "group", "having", "in", "index", "into",
        "limit", "not", "null", "offset", "on", "or", "order", "primary", "references", "select",
        "table", "then", "to", "true", "union", "unique", "user", "using", "when", "where", "with",
    ];
    RESERVED.contains(&word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_ident_unquoted() {
        assert_eq!(ident("users"), "users");
        assert_eq!(ident("_tmp_2"), "_tmp_2");
    }

    #[test]
    fn test_mixed_case_quoted() {
        assert_eq!(ident("Users"), "\"Users\"");
        assert_eq!(ident("my table"), "\"my table\"");
    }

    #[test]
    fn test_reserved_word_quoted() {
        assert_eq!(ident("user"), "\"user\"");
        assert_eq!(ident("order"), "\"order\"");
    }

    #[test]
    fn test_embedded_quote_doubled() {
        assert_eq!(ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_literal_escaping() {
        assert_eq!(literal("plain"), "'plain'");
        assert_eq!(literal("it's"), "'it''s'");
    }

    #[test]
    fn test_dollar_body_avoids_collision() {
        assert_eq!(dollar_body("select 1"), "$fn$select 1$fn$");

        let tricky = "select '$fn$'";
        let quoted = dollar_body(tricky);
        assert!(quoted.starts_with("$fn_$"));
        assert!(quoted.ends_with("$fn_$"));
    }
}
