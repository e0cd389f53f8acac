//! Lexical helpers shared by the filter and condition compilers.

/// Separator between conjoined clauses.
pub const AND: &str = " && ";

/// Quote a string literal, escaping backslashes and double quotes.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Inverse of [`quote`]. Returns `None` unless `literal` is exactly one
/// quoted string.
pub fn unquote(literal: &str) -> Option<String> {
    let inner = literal.trim().strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push(chars.next()?),
            '"' => return None,
            c => out.push(c),
        }
    }
    Some(out)
}

/// Render `["a", "b"]` with the given separator between items.
pub fn string_list<S: AsRef<str>>(items: &[S], separator: &str) -> String {
    let quoted: Vec<String> = items.iter().map(|s| quote(s.as_ref())).collect();
    format!("[{}]", quoted.join(separator))
}

/// Parse a bracketed list of quoted strings. Whitespace around items is ignored.
pub fn parse_string_list(literal: &str) -> Option<Vec<String>> {
    let inner = literal.trim().strip_prefix('[')?.strip_suffix(']')?.trim();
    if inner.is_empty() {
        return Some(Vec::new());
    }
    let mut items = Vec::new();
    let mut current = String::new();
    let mut in_string = false;
    let mut escaped = false;
    for c in inner.chars() {
        if in_string {
            current.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                current.push(c);
            },
            ',' => {
                items.push(unquote(&current)?);
                current.clear();
            },
            c if c.is_whitespace() => {},
            _ => return None,
        }
    }
    if in_string {
        return None;
    }
    items.push(unquote(&current)?);
    Some(items)
}

/// Split a conjunction into trimmed clauses, skipping empty ones. `&&`
/// inside a quoted literal does not split.
pub fn split_conjunction(expression: &str) -> Vec<&str> {
    let mut clauses = Vec::new();
    let mut start = 0;
    let mut in_string = false;
    let mut escaped = false;
    let mut chars = expression.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '&' if matches!(chars.peek(), Some((_, '&'))) => {
                clauses.push(&expression[start..i]);
                chars.next();
                start = i + 2;
            },
            _ => {},
        }
    }
    clauses.push(&expression[start..]);
    clauses
        .into_iter()
        .map(str::trim)
        .filter(|clause| !clause.is_empty())
        .collect()
}

/// Match `<field> == "<value>"` and return the value.
pub fn match_equals(clause: &str, field: &str) -> Option<String> {
    let rest = clause.strip_prefix(field)?.trim_start();
    unquote(rest.strip_prefix("==")?)
}

/// Match `<field> in [..]` and return the list.
pub fn match_in(clause: &str, field: &str) -> Option<Vec<String>> {
    let rest = clause.strip_prefix(field)?.trim_start();
    parse_string_list(rest.strip_prefix("in")?)
}

/// Match `request.time < timestamp("..")` and return the timestamp literal.
pub fn match_expiration(clause: &str) -> Option<String> {
    let rest = clause.strip_prefix("request.time")?.trim_start();
    let rest = rest.strip_prefix('<')?.trim_start();
    let inner = rest.strip_prefix("timestamp(")?.strip_suffix(')')?;
    unquote(inner)
}

/// Render `request.time < timestamp("..")`.
pub fn expiration(timestamp: &str) -> String {
    format!("request.time < timestamp({})", quote(timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote("plain"), "\"plain\"");
        assert_eq!(quote("a\"b"), "\"a\\\"b\"");
        assert_eq!(unquote(&quote("a\"b\\c")).unwrap(), "a\"b\\c");
    }

    #[test]
    fn test_unquote_rejects_garbage() {
        assert!(unquote("plain").is_none());
        assert!(unquote("\"a\" \"b\"").is_none());
        assert!(unquote("\"dangling\\\"").is_none());
    }

    #[test]
    fn test_split_conjunction_respects_literals() {
        assert_eq!(
            split_conjunction(r#"resource.table_name == "a&&b" && resource.column_name == "c""#),
            vec![r#"resource.table_name == "a&&b""#, r#"resource.column_name == "c""#]
        );
        assert_eq!(
            split_conjunction(r#"a == "x\" && y" &&b == "z""#),
            vec![r#"a == "x\" && y""#, r#"b == "z""#]
        );
        assert_eq!(split_conjunction(" && a == \"1\" && "), vec!["a == \"1\""]);
    }

    #[test]
    fn test_string_list_round_trip() {
        let items = vec!["t1".to_string(), "t,2".to_string()];
        let compact = string_list(&items, ",");
        assert_eq!(compact, "[\"t1\",\"t,2\"]");
        assert_eq!(parse_string_list(&compact).unwrap(), items);

        let spaced = string_list(&items, ", ");
        assert_eq!(parse_string_list(&spaced).unwrap(), items);
        assert_eq!(parse_string_list("[]").unwrap(), Vec::<String>::new());
        assert!(parse_string_list("[t1]").is_none());
    }

    #[test]
    fn test_clause_matchers() {
        assert_eq!(
            match_equals("resource.database == \"instances/i/databases/d\"", "resource.database")
                .unwrap(),
            "instances/i/databases/d"
        );
        assert!(match_equals("resource.database != \"x\"", "resource.database").is_none());
        assert_eq!(
            match_in("resource.table in [\"a\", \"b\"]", "resource.table").unwrap(),
            vec!["a", "b"]
        );
        assert_eq!(
            match_expiration("request.time < timestamp(\"2030-01-02T03:04:05Z\")").unwrap(),
            "2030-01-02T03:04:05Z"
        );
    }

    #[test]
    fn test_split_conjunction() {
        assert_eq!(split_conjunction("a == 1 && b == 2"), vec!["a == 1", "b == 2"]);
        assert!(split_conjunction("").is_empty());
    }
}
