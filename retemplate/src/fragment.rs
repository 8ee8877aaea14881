use regex::Regex;

use crate::error::TemplateError;
use crate::pattern::Pattern;
use crate::template::Template;

/// One construction or binding input.
#[derive(Debug, Clone)]
pub enum Fragment {
    /// Pattern text, scanned for placeholders.
    Pattern(Pattern),
    /// A nested template, spliced in as an opaque unit.
    Template(Template),
    /// Raw text matched literally; escaped before insertion, never scanned.
    Literal(String),
}

impl Fragment {
    pub fn kind(&self) -> &'static str {
        match self {
            Fragment::Pattern(_) => "pattern",
            Fragment::Template(_) => "template",
            Fragment::Literal(_) => "literal",
        }
    }
}

/// Conversion into a [`Fragment`]. Inputs whose kind is only known at runtime
/// (such as values read from a definition file) may fail with
/// [`TemplateError::UnsupportedFragmentKind`].
pub trait IntoFragment {
    fn into_fragment(self) -> Result<Fragment, TemplateError>;
}

impl IntoFragment for Fragment {
    fn into_fragment(self) -> Result<Fragment, TemplateError> {
        Ok(self)
    }
}

impl IntoFragment for Pattern {
    fn into_fragment(self) -> Result<Fragment, TemplateError> {
        Ok(Fragment::Pattern(self))
    }
}

impl IntoFragment for &Pattern {
    fn into_fragment(self) -> Result<Fragment, TemplateError> {
        Ok(Fragment::Pattern(self.clone()))
    }
}

impl IntoFragment for Template {
    fn into_fragment(self) -> Result<Fragment, TemplateError> {
        Ok(Fragment::Template(self))
    }
}

impl IntoFragment for &Template {
    fn into_fragment(self) -> Result<Fragment, TemplateError> {
        Ok(Fragment::Template(self.clone()))
    }
}

impl IntoFragment for Regex {
    fn into_fragment(self) -> Result<Fragment, TemplateError> {
        Ok(Fragment::Pattern(Pattern::from(&self)))
    }
}

impl IntoFragment for &Regex {
    fn into_fragment(self) -> Result<Fragment, TemplateError> {
        Ok(Fragment::Pattern(Pattern::from(self)))
    }
}

impl From<Pattern> for Fragment {
    fn from(pattern: Pattern) -> Self {
        Fragment::Pattern(pattern)
    }
}

impl From<Template> for Fragment {
    fn from(template: Template) -> Self {
        Fragment::Template(template)
    }
}
