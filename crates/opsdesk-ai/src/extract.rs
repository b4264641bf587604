//! Parsing helpers for model output: fenced SQL extraction and permissive
//! yes/no answers.

use std::sync::OnceLock;

use regex::Regex;

fn fenced_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)```(?:sql)?\s*(.*?)```").expect("static regex")
    })
}

fn statement_start() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // A bare "with" is an English word far more often than a CTE; only
    // treat it as a statement start when the CTE shape follows.
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bselect\b|\bwith\s+(recursive\s+)?\w+\s*(\([^)]*\)\s*)?as\s*\(")
            .expect("static regex")
    })
}

/// Strip markdown fences and surrounding prose from a completion, keeping
/// the statement from the first SELECT keyword (or `WITH … AS (` CTE
/// opener) onward. Text with no recognizable statement is returned
/// trimmed in full, for the validator to reject with useful feedback.
pub fn extract_sql(text: &str) -> String {
    let inner = fenced_block()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(text);

    let trimmed = inner.trim();
    match statement_start().find(trimmed) {
        Some(found) => trimmed[found.start()..].trim().to_string(),
        None => trimmed.to_string(),
    }
}

/// Parse a strict yes/no answer permissively.
///
/// Case-insensitive; accepts leading punctuation and trailing prose
/// ("Yes, because…"). Returns `None` when the answer is neither, so the
/// caller can apply its safe default.
pub fn parse_yes_no(text: &str) -> Option<bool> {
    let first = text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .find(|token| !token.is_empty())
        .map(str::to_string)?;
    match first.as_str() {
        "yes" | "y" | "true" | "1" => Some(true),
        "no" | "n" | "false" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_from_sql_fence() {
        let text = "Here you go:\n```sql\nSELECT name FROM customers;\n```\nLet me know!";
        assert_eq!(extract_sql(text), "SELECT name FROM customers;");
    }

    #[test]
    fn extracts_from_bare_fence() {
        let text = "```\nselect 1\n```";
        assert_eq!(extract_sql(text), "select 1");
    }

    #[test]
    fn strips_leading_prose_without_fence() {
        let text = "The statement is SELECT id FROM orders LIMIT 5";
        assert_eq!(extract_sql(text), "SELECT id FROM orders LIMIT 5");
    }

    #[test]
    fn keeps_cte_start() {
        let text = "WITH vip AS (SELECT 1) SELECT * FROM vip";
        assert_eq!(extract_sql(text), text);
        let recursive = "WITH RECURSIVE seq(n) AS (SELECT 1) SELECT n FROM seq";
        assert_eq!(extract_sql(recursive), recursive);
    }

    #[test]
    fn unrecognizable_text_passes_through_trimmed() {
        assert_eq!(extract_sql("  I cannot help with that.  "), "I cannot help with that.");
    }

    #[test]
    fn prose_with_is_not_a_statement_start() {
        // A refusal mentioning "with" must come back whole so the
        // validator can reject it with the full text as feedback.
        let text = "I cannot comply with this request, sorry.";
        assert_eq!(extract_sql(text), text);
        assert_eq!(
            extract_sql("Start with WITH t AS (SELECT 1) SELECT * FROM t"),
            "WITH t AS (SELECT 1) SELECT * FROM t"
        );
    }

    #[test]
    fn yes_no_parsing_is_permissive() {
        assert_eq!(parse_yes_no("yes"), Some(true));
        assert_eq!(parse_yes_no("Yes, the query needs the database."), Some(true));
        assert_eq!(parse_yes_no("  TRUE"), Some(true));
        assert_eq!(parse_yes_no("No."), Some(false));
        assert_eq!(parse_yes_no("n"), Some(false));
        assert_eq!(parse_yes_no("0"), Some(false));
        assert_eq!(parse_yes_no("maybe?"), None);
        assert_eq!(parse_yes_no(""), None);
        assert_eq!(parse_yes_no("!!!"), None);
    }
}
