use thiserror::Error;

/// Errors produced while building, binding or compiling a template.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// A fragment was neither a pattern, a nested template nor a literal.
    #[error("unsupported fragment kind: {0}")]
    UnsupportedFragmentKind(String),

    /// Compilation was attempted while placeholders remain unbound.
    #[error("unbound placeholder(s): {}", .0.join(", "))]
    UnboundPlaceholder(Vec<String>),

    /// A fragment referred to a template that is not defined.
    #[error("unknown template: {0}")]
    UnknownTemplate(String),

    /// Text in `/body/flags` form could not be split.
    #[error("invalid delimited pattern: {0}")]
    InvalidDelimitedPattern(String),

    /// The compiled text was rejected by the regex engine.
    #[error("invalid regular expression: {0}")]
    InvalidRegex(#[from] regex::Error),
}
