//! Canonicalization and injection-neutralization of caller-supplied text.
//!
//! Everything that becomes a lockout key, a store lookup key or a stored
//! profile field passes through here first. [`sanitize_text`] is idempotent:
//! already-escaped entities are left alone and operator stripping never
//! produces a new `$word`.

use serde_json::Value;

/// Entities produced by [`sanitize_text`]. An `&` that already starts one of
/// these is not escaped again.
const ENTITIES: &[&str] = &["&amp;", "&lt;", "&gt;", "&quot;", "&#x27;"];

/// Lowercases, removes every whitespace character (not just the ends) and
/// sanitizes an identity such as an email address.
pub fn normalize_identity(raw: &str) -> String {
    let compact: String = raw
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    sanitize_text(&compact)
}

/// HTML-escapes `& < > " '` and strips document-store operators
/// (`$` followed by letters, e.g. `$ne`, `$where`).
pub fn sanitize_text(raw: &str) -> String {
    strip_operators(&escape_html(raw))
}

/// Applies [`sanitize_text`] to every string inside `doc`, recursing into
/// objects and arrays. Numbers, booleans and null pass through unchanged.
/// Object keys are sanitized too, since a key like `$where` is itself an
/// operator.
pub fn sanitize_record(doc: Value) -> Value {
    match doc {
        Value::String(s) => Value::String(sanitize_text(&s)),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize_record).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (sanitize_text(&k), sanitize_record(v)))
                .collect(),
        ),
        other => other,
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for (i, c) in raw.char_indices() {
        match c {
            '&' if ENTITIES.iter().any(|e| raw[i..].starts_with(e)) => out.push('&'),
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn strip_operators(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '$' && chars.peek().is_some_and(|n| n.is_ascii_alphabetic()) {
            while chars.peek().is_some_and(|n| n.is_ascii_alphabetic()) {
                chars.next();
            }
            continue;
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalize_lowercases_and_removes_all_whitespace() {
        assert_eq!(normalize_identity("  USER@Example.com "), "user@example.com");
        assert_eq!(normalize_identity("us er@exa\tmple.com\n"), "user@example.com");
    }

    #[test]
    fn normalize_empty_is_empty() {
        assert_eq!(normalize_identity(""), "");
        assert_eq!(normalize_identity("   "), "");
    }

    #[test]
    fn normalize_strips_operator_in_identity() {
        assert_eq!(normalize_identity("$ne"), "");
        assert_eq!(normalize_identity("a$gt@b.com"), "a@b.com");
    }

    #[test]
    fn escapes_html_specials() {
        assert_eq!(
            sanitize_text(r#"<script>alert("x")</script>"#),
            "&lt;script&gt;alert(&quot;x&quot;)&lt;/script&gt;"
        );
        assert_eq!(sanitize_text("Tom & Jerry's"), "Tom &amp; Jerry&#x27;s");
    }

    #[test]
    fn strips_operator_words() {
        assert_eq!(sanitize_text("$where: 1"), ": 1");
        assert_eq!(sanitize_text("price $100"), "price $100");
        assert_eq!(sanitize_text("$$ne!"), "$!");
        assert_eq!(sanitize_text("trailing $"), "trailing $");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let inputs = [
            "",
            "plain",
            "&",
            "&amp;",
            "&amp;amp;",
            "<b>&lt;",
            "&$xamp;",
            "&a$xmp;",
            "$$$abc$",
            "'\"&<>",
            "&#x27;&quot",
            "naïve $Ω café",
        ];
        for input in inputs {
            let once = sanitize_text(input);
            assert_eq!(sanitize_text(&once), once, "input: {input:?}");
        }
    }

    #[test]
    fn record_sanitizes_nested_strings_only() {
        let doc = json!({
            "name": "<b>Ana</b>",
            "age": 31,
            "admin": false,
            "tags": ["$ne", "ok", 7],
            "address": { "city": "São <Paulo>", "zip": null },
            "$where": "x"
        });

        let clean = sanitize_record(doc);

        assert_eq!(
            clean,
            json!({
                "name": "&lt;b&gt;Ana&lt;/b&gt;",
                "age": 31,
                "admin": false,
                "tags": ["", "ok", 7],
                "address": { "city": "São &lt;Paulo&gt;", "zip": null },
                "": "x"
            })
        );
    }

    #[test]
    fn record_scalar_passes_through() {
        assert_eq!(sanitize_record(json!(3.5)), json!(3.5));
        assert_eq!(sanitize_record(Value::Null), Value::Null);
    }
}
