use std::sync::LazyLock;

use regex::Regex;

/// `\VAR{ name }`: keyword is case-insensitive, whitespace around the braces
/// is tolerated and the name must start with an ASCII letter.
static MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\(?i:VAR)\s*\{\s*([A-Za-z][A-Za-z0-9_]*)\s*\}")
        .expect("placeholder marker expression is valid")
});

/// One element of a scanned fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Part<'a> {
    Literal(&'a str),
    Placeholder(&'a str),
}

/// Split pattern text on placeholder markers.
///
/// The result alternates literal and name: `[literal, name, literal, ..., literal]`.
/// Text without any marker comes back as a single element equal to the input.
pub fn scan_placeholders(text: &str) -> Vec<String> {
    let mut split = Vec::new();
    let mut last = 0;

    for caps in MARKER.captures_iter(text) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        split.push(text[last..whole.start()].to_string());
        split.push(name.as_str().to_string());
        last = whole.end();
    }
    split.push(text[last..].to_string());

    split
}

/// View a scanned split as typed parts. Even positions are literals, odd
/// positions are placeholder names.
pub fn parts(split: &[String]) -> impl Iterator<Item = Part<'_>> {
    split.iter().enumerate().map(|(i, s)| {
        if i % 2 == 0 {
            Part::Literal(s)
        } else {
            Part::Placeholder(s)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_marker_returns_input() {
        let text = r"no vars here [a-z]+ \VAR{ 404 }";
        assert_eq!(scan_placeholders(text), vec![text.to_string()]);
        assert_eq!(scan_placeholders(""), vec![String::new()]);
    }

    #[test]
    fn single_marker_with_spaces() {
        assert_eq!(scan_placeholders(r"\VAR { a }"), vec!["", "a", ""]);
    }

    #[test]
    fn two_markers() {
        let split = scan_placeholders(r"before\VAR   {    a    } \VAR{ b }after");
        assert_eq!(split, vec!["before", "a", " ", "b", "after"]);
    }

    #[test]
    fn keyword_is_case_insensitive() {
        assert_eq!(scan_placeholders(r"\var{x}|\Var{y}"), vec!["", "x", "|", "y", ""]);
    }

    #[test]
    fn repeated_name_is_separate_slot() {
        let split = scan_placeholders(r"(\VAR{p})(&\VAR{p})*");
        assert_eq!(split, vec!["(", "p", ")(&", "p", ")*"]);
    }

    #[test]
    fn identifier_rules() {
        assert_eq!(scan_placeholders(r"\VAR{a_1b}"), vec!["", "a_1b", ""]);
        assert_eq!(scan_placeholders(r"\VAR{_a}").len(), 1);
        assert_eq!(scan_placeholders(r"\VAR{a-b}").len(), 1);
        assert_eq!(scan_placeholders(r"\VARx{a}").len(), 1);
    }

    #[test]
    fn parts_alternate() {
        let split = scan_placeholders(r"a\VAR{x}b");
        let parts: Vec<_> = parts(&split).collect();
        assert_eq!(
            parts,
            vec![Part::Literal("a"), Part::Placeholder("x"), Part::Literal("b")]
        );
    }
}
