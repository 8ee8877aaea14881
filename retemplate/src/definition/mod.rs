//! Template definition files.
//!
//! A definition is a TOML document holding an ordered list of named
//! templates. Later templates may nest earlier ones by name:
//!
//! ```toml
//! entry = "greeting"
//!
//! [[template]]
//! name = "word"
//! fragments = ['/[A-Z]\VAR{ rest }/']
//! vars = { rest = '/[a-z]+/' }
//!
//! [[template]]
//! name = "greeting"
//! fragments = ['/^hello /', { template = "word" }, { literal = "!" }, '/$/']
//! ```
//!
//! A fragment is either a `/body/flags` string, or a table with exactly one of
//! `pattern` (plus optional `flags`), `literal` or `template`. Vars are bound
//! in the order they are written, so a var may bind a placeholder that an
//! earlier var's value introduced.

pub mod error;

use std::fmt;

use serde::{Deserialize, Deserializer, de};
use toml::Spanned;

pub use error::DefinitionError;

use crate::error::TemplateError;
use crate::fragment::{Fragment, IntoFragment};
use crate::pattern::Pattern;
use crate::template::Template;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DefinitionFile {
    #[serde(default)]
    entry: Option<Spanned<String>>,
    #[serde(default, rename = "template")]
    templates: Vec<TemplateEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TemplateEntry {
    name: Spanned<String>,
    fragments: Vec<Spanned<toml::Value>>,
    #[serde(default, deserialize_with = "ordered_vars")]
    vars: Vec<(String, Spanned<toml::Value>)>,
}

/// Collect a vars table in document order.
fn ordered_vars<'de, D>(deserializer: D) -> Result<Vec<(String, Spanned<toml::Value>)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct VarsVisitor;

    impl<'de> de::Visitor<'de> for VarsVisitor {
        type Value = Vec<(String, Spanned<toml::Value>)>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a table of placeholder values")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: de::MapAccess<'de>,
        {
            let mut vars = Vec::new();
            while let Some((name, value)) = map.next_entry()? {
                vars.push((name, value));
            }
            Ok(vars)
        }
    }

    deserializer.deserialize_map(VarsVisitor)
}

/// A TOML fragment value, resolved against the templates defined before it.
struct FragmentValue<'a> {
    value: &'a toml::Value,
    known: &'a [(String, Template)],
}

impl IntoFragment for FragmentValue<'_> {
    fn into_fragment(self) -> Result<Fragment, TemplateError> {
        let table = match self.value {
            toml::Value::String(text) => return Ok(Fragment::Pattern(Pattern::from_delimited(text)?)),
            toml::Value::Table(table) => table,
            other => return Err(TemplateError::UnsupportedFragmentKind(other.type_str().to_string())),
        };

        let keys: Vec<&str> = table.keys().map(String::as_str).collect();
        let text = |key: &str| table.get(key).and_then(toml::Value::as_str);

        match keys.as_slice() {
            ["pattern"] | ["flags", "pattern"] => {
                let (Some(source), flags) = (text("pattern"), table.get("flags")) else {
                    return Err(unsupported_table(&keys));
                };
                let flags = match flags {
                    None => "",
                    Some(flags) => flags.as_str().ok_or_else(|| unsupported_table(&keys))?,
                };
                Ok(Fragment::Pattern(Pattern::with_flags(source, flags)))
            }
            ["literal"] => text("literal")
                .map(|raw| Fragment::Literal(raw.to_string()))
                .ok_or_else(|| unsupported_table(&keys)),
            ["template"] => {
                let name = text("template").ok_or_else(|| unsupported_table(&keys))?;
                self.known
                    .iter()
                    .find(|(known, _)| known == name)
                    .map(|(_, template)| Fragment::Template(template.clone()))
                    .ok_or_else(|| TemplateError::UnknownTemplate(name.to_string()))
            }
            _ => Err(unsupported_table(&keys)),
        }
    }
}

fn unsupported_table(keys: &[&str]) -> TemplateError {
    TemplateError::UnsupportedFragmentKind(format!("table with keys [{}]", keys.join(", ")))
}

/// The templates of one definition file, in definition order.
#[derive(Debug, Clone)]
pub struct Definition {
    templates: Vec<(String, Template)>,
    entry: Option<String>,
}

impl Definition {
    /// Parse and build every template. Errors from independent templates are
    /// all collected; a template that fails is skipped for later references.
    pub fn parse(source: &str, file_id: usize) -> Result<Self, Vec<DefinitionError>> {
        let file: DefinitionFile = toml::from_str(source).map_err(|e| {
            vec![DefinitionError::new(e.message().to_string(), e.span(), file_id)]
        })?;

        let mut templates: Vec<(String, Template)> = Vec::new();
        let mut errors = Vec::new();

        for entry in &file.templates {
            let name = entry.name.get_ref();
            if templates.iter().any(|(known, _)| known == name) {
                errors.push(DefinitionError::at(
                    format!("duplicate template name '{}'", name),
                    entry.name.span(),
                    file_id,
                ));
                continue;
            }
            match build_template(entry, &templates, file_id) {
                Ok(template) => {
                    tracing::debug!(name = %name, unassigned = ?template.unassigned_vars(), "defined template");
                    templates.push((name.clone(), template));
                }
                Err(mut template_errors) => errors.append(&mut template_errors),
            }
        }

        if file.templates.is_empty() {
            errors.push(
                DefinitionError::new("no templates defined", Some(0..0), file_id)
                    .with_note("add at least one [[template]] table"),
            );
        }

        let entry = match &file.entry {
            Some(entry) if !templates.iter().any(|(known, _)| known == entry.get_ref()) => {
                if errors.is_empty() {
                    errors.push(DefinitionError::at(
                        format!("entry template '{}' is not defined", entry.get_ref()),
                        entry.span(),
                        file_id,
                    ));
                }
                None
            }
            Some(entry) => Some(entry.get_ref().clone()),
            None => None,
        };

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(Definition { templates, entry })
    }

    /// Look up a template by name.
    pub fn get(&self, name: &str) -> Option<&Template> {
        self.templates
            .iter()
            .find(|(known, _)| known == name)
            .map(|(_, template)| template)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.iter().map(|(name, _)| name.as_str())
    }

    /// The declared entry template, or the last one defined.
    pub fn entry_name(&self) -> Option<&str> {
        self.entry
            .as_deref()
            .or_else(|| self.templates.last().map(|(name, _)| name.as_str()))
    }

    pub fn entry(&self) -> Option<&Template> {
        self.entry_name().and_then(|name| self.get(name))
    }
}

fn build_template(
    entry: &TemplateEntry,
    known: &[(String, Template)],
    file_id: usize,
) -> Result<Template, Vec<DefinitionError>> {
    let mut errors = Vec::new();

    let mut fragments = Vec::new();
    for fragment in &entry.fragments {
        let value = FragmentValue { value: fragment.get_ref(), known };
        match value.into_fragment() {
            Ok(fragment) => fragments.push(fragment),
            Err(e) => errors.push(DefinitionError::from_template(&e, fragment.span(), file_id)),
        }
    }

    let mut vars = Vec::new();
    for (name, value) in &entry.vars {
        let resolved = FragmentValue { value: value.get_ref(), known };
        match resolved.into_fragment() {
            Ok(fragment) => vars.push((name.as_str(), fragment)),
            Err(e) => errors.push(DefinitionError::from_template(&e, value.span(), file_id)),
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    let span = entry.name.span();
    Template::new(fragments)
        .and_then(|template| template.with_vars(vars))
        .map_err(|e| vec![DefinitionError::from_template(&e, span, file_id)])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Definition {
        Definition::parse(source, 0).expect("definition should parse")
    }

    fn parse_errors(source: &str) -> Vec<DefinitionError> {
        Definition::parse(source, 0).expect_err("definition should fail")
    }

    #[test]
    fn builds_and_nests_templates() {
        let definition = parse(
            r#"
[[template]]
name = "word"
fragments = ['/[A-Z]\VAR{ rest }/']
vars = { rest = '/[a-z]+/' }

[[template]]
name = "greeting"
fragments = ['/^hello /', { template = "word" }, { literal = "!" }, '/$/']
"#,
        );

        assert_eq!(definition.names().collect::<Vec<_>>(), vec!["word", "greeting"]);
        assert_eq!(definition.entry_name(), Some("greeting"));
        let compiled = definition.entry().unwrap().compile().unwrap();
        assert_eq!(compiled.as_str(), "^hello [A-Z][a-z]+!$");
    }

    #[test]
    fn declared_entry_wins() {
        let definition = parse(
            r#"
entry = "a"

[[template]]
name = "a"
fragments = ['/a/']

[[template]]
name = "b"
fragments = ['/b/']
"#,
        );
        assert_eq!(definition.entry_name(), Some("a"));
    }

    #[test]
    fn pattern_table_with_flags() {
        let definition = parse(
            r#"
[[template]]
name = "t"
fragments = [{ pattern = "x/y", flags = "i" }]
"#,
        );
        assert_eq!(definition.get("t").unwrap().compile_source().unwrap(), "x/y");
    }

    #[test]
    fn rejects_unsupported_fragment_kinds() {
        let errors = parse_errors(
            r#"
[[template]]
name = "t"
fragments = [42, true, { regex = "a" }]
"#,
        );
        assert_eq!(errors.len(), 3);
        assert!(errors[0].message.contains("unsupported fragment kind: integer"));
        assert!(errors[1].message.contains("boolean"));
        assert!(errors[2].message.contains("table with keys [regex]"));
        assert!(errors.iter().all(|e| e.span.is_some()));
    }

    #[test]
    fn reports_unknown_and_duplicate_templates() {
        let errors = parse_errors(
            r#"
[[template]]
name = "a"
fragments = [{ template = "later" }]

[[template]]
name = "later"
fragments = ['/x/']

[[template]]
name = "later"
fragments = ['/y/']
"#,
        );
        assert_eq!(errors.len(), 2);
        assert!(errors[0].message.contains("unknown template: later"));
        assert!(errors[1].message.contains("duplicate template name"));
    }

    #[test]
    fn reports_toml_syntax_errors_with_span() {
        let errors = parse_errors("[[template]\nname = ");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].span.is_some());
    }

    #[test]
    fn reports_bad_delimited_pattern() {
        let errors = parse_errors(
            r#"
[[template]]
name = "t"
fragments = ["a+b"]
"#,
        );
        assert!(errors[0].message.contains("invalid delimited pattern"));
    }

    #[test]
    fn empty_definition_is_an_error() {
        let errors = parse_errors("");
        assert!(errors[0].message.contains("no templates defined"));
    }

    #[test]
    fn unknown_entry_is_an_error() {
        let errors = parse_errors(
            r#"
entry = "missing"

[[template]]
name = "t"
fragments = ['/x/']
"#,
        );
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("entry template 'missing'"));
    }

    #[test]
    fn vars_bind_in_document_order() {
        let definition = parse(
            r#"
[[template]]
name = "t"
fragments = ['/\VAR{outer}/']
vars = { outer = '/[\VAR{inner}]/', inner = '/0-9/' }
"#,
        );
        let template = definition.get("t").unwrap();
        assert!(template.unassigned_vars().is_empty());
        assert_eq!(template.compile_source().unwrap(), "[0-9]");
    }

    #[test]
    fn vars_table_header_keeps_document_order() {
        let definition = parse(
            r#"
[[template]]
name = "t"
fragments = ['/^\VAR{b}$/']

[template.vars]
b = '/\VAR{a}+/'
a = '/x/'
"#,
        );
        assert_eq!(definition.get("t").unwrap().compile_source().unwrap(), "^x+$");
    }

    #[test]
    fn unbound_vars_survive_definition() {
        let definition = parse(
            r#"
[[template]]
name = "t"
fragments = ['/\VAR{a}/']
vars = { unrelated = '/z/' }
"#,
        );
        let template = definition.get("t").unwrap();
        assert_eq!(template.unassigned_vars(), vec!["a"]);
    }
}
