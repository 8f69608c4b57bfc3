//! Value escaping.
//!
//! Rule values use `*` and `?` as wildcards and `\` as their escape
//! character. The target dialect matches with `LIKE`, where `%` and `_` are
//! the wildcards. Rendering happens in stages, each one working on the
//! output of the previous:
//!
//! 1. lone backslashes are doubled
//! 2. literal `_` is escaped
//! 3. literal `%` is escaped
//! 4. unescaped `*` becomes `%`
//! 5. unescaped `?` becomes `_`

/// Translate a rule string into dialect text.
pub fn escape_value(raw: &str) -> String {
    let doubled = double_lone_backslashes(raw);
    let escaped = doubled.replace('_', "\\_").replace('%', "\\%");
    let any = translate_wildcard(&escaped, '*', '%');
    translate_wildcard(&any, '?', '_')
}

/// Wrap rendered text in the dialect's string quoting.
pub fn quote(text: &str) -> String {
    format!("\"{}\"", text)
}

/// Whether rendered text requires a pattern match instead of equality.
///
/// Any of the dialect wildcards (`%`, `_`), a leftover rule wildcard
/// (`*`, `?`) or an escaped backslash counts.
pub fn has_wildcard(rendered: &str) -> bool {
    rendered.contains(['*', '?', '_', '%']) || rendered.contains("\\\\")
}

/// Double every backslash that is neither preceded by a backslash nor
/// followed by `\`, `*` or `?`.
fn double_lone_backslashes(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let mut out = String::with_capacity(value.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        out.push(c);
        if c != '\\' {
            continue;
        }
        let escaped = i > 0 && chars[i - 1] == '\\';
        let escapes_next = matches!(chars.get(i + 1), Some('\\' | '*' | '?'));
        if !escaped && !escapes_next {
            out.push('\\');
        }
    }

    out
}

/// Replace `from` with `to` wherever it is preceded by an even number of
/// backslashes.
fn translate_wildcard(value: &str, from: char, to: char) -> String {
    let mut out = String::with_capacity(value.len());
    let mut backslashes = 0usize;

    for c in value.chars() {
        if c == from && backslashes % 2 == 0 {
            out.push(to);
        } else {
            out.push(c);
        }
        backslashes = if c == '\\' { backslashes + 1 } else { 0 };
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_star_becomes_percent() {
        assert_eq!(escape_value("abc*def"), "abc%def");
    }

    #[test]
    fn test_question_mark_becomes_underscore() {
        assert_eq!(escape_value("cmd?.exe"), "cmd_.exe");
    }

    #[test]
    fn test_dialect_wildcards_escaped() {
        assert_eq!(escape_value("a_b"), "a\\_b");
        assert_eq!(escape_value("50%"), "50\\%");
    }

    #[test]
    fn test_escaped_star_stays_literal() {
        assert_eq!(escape_value("a\\*b"), "a\\*b");
        assert_eq!(escape_value("a\\?b"), "a\\?b");
    }

    #[test]
    fn test_lone_backslash_doubled() {
        assert_eq!(escape_value("*\\cmd.exe"), "%\\\\cmd.exe");
        assert_eq!(escape_value("C:\\Windows\\"), "C:\\\\Windows\\\\");
    }

    #[test]
    fn test_escaped_backslash_before_star() {
        // `\\*` is a literal backslash followed by a wildcard
        assert_eq!(escape_value("a\\\\*"), "a\\\\%");
        // `\\\*` is a literal backslash followed by a literal star
        assert_eq!(escape_value("a\\\\\\*"), "a\\\\\\*");
    }

    #[test]
    fn test_underscore_then_wildcards() {
        assert_eq!(escape_value("*_?"), "%\\__");
    }

    #[test]
    fn test_plain_value_unchanged() {
        assert_eq!(escape_value("whoami"), "whoami");
        assert_eq!(escape_value(""), "");
    }

    #[test]
    fn test_has_wildcard() {
        assert!(has_wildcard("\"%\\\\cmd.exe\""));
        assert!(has_wildcard("\"a\\_b\""));
        assert!(has_wildcard("\"a\\*b\""));
        assert!(has_wildcard("\"C:\\\\Windows\""));
        assert!(!has_wildcard("\"4624\""));
        assert!(!has_wildcard("(\"1\", \"2\")"));
    }
}
