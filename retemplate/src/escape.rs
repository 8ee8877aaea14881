/// Escape a raw string so it matches only itself when embedded in a pattern.
///
/// The output targets the `regex` crate's syntax: besides the usual
/// metacharacters it also escapes `#`, `&`, `-` and `~`, which some other
/// regex dialects reject as identity escapes.
///
/// Control characters such as an actual newline are left untouched.
pub fn escape_literal(raw: &str) -> String {
    regex::escape(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_metacharacters() {
        assert_eq!(escape_literal("?"), r"\?");
        assert_eq!(escape_literal("a.b"), r"a\.b");
        assert_eq!(
            escape_literal(r"\+*?.^$(){}[]|"),
            r"\\\+\*\?\.\^\$\(\)\{\}\[\]\|"
        );
    }

    #[test]
    fn escapes_regex_crate_extras() {
        assert_eq!(escape_literal("a#b&c-d~e"), r"a\#b\&c\-d\~e");
    }

    #[test]
    fn keeps_plain_text_and_newlines() {
        assert_eq!(escape_literal("abc 123"), "abc 123");
        assert_eq!(escape_literal("a\nb"), "a\nb");
    }

    #[test]
    fn escaped_literal_matches_only_itself() {
        let re = regex::Regex::new(&format!("^{}$", escape_literal("1+1=(2)"))).unwrap();
        assert!(re.is_match("1+1=(2)"));
        assert!(!re.is_match("11=2"));
    }
}
