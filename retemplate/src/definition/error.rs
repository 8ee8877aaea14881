use std::ops::Range;

use codespan_reporting::diagnostic::{Diagnostic, Label, Severity};

use crate::error::TemplateError;

/// Definition file errors with source location information.
#[derive(Debug, Clone)]
pub struct DefinitionError {
    pub message: String,
    pub span: Option<Range<usize>>,
    pub file_id: usize,
    pub notes: Vec<String>,
}

impl DefinitionError {
    pub fn new(message: impl Into<String>, span: Option<Range<usize>>, file_id: usize) -> Self {
        DefinitionError {
            message: message.into(),
            span,
            file_id,
            notes: Vec::new(),
        }
    }

    pub fn at(message: impl Into<String>, span: Range<usize>, file_id: usize) -> Self {
        Self::new(message, Some(span), file_id)
    }

    pub fn from_template(error: &TemplateError, span: Range<usize>, file_id: usize) -> Self {
        Self::at(error.to_string(), span, file_id)
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Convert to a codespan-reporting Diagnostic for display.
    pub fn to_diagnostic(&self) -> Diagnostic<usize> {
        let labels: Vec<Label<usize>> = self
            .span
            .iter()
            .map(|span| Label::primary(self.file_id, span.clone()))
            .collect();
        Diagnostic::new(Severity::Error)
            .with_message(&self.message)
            .with_labels(labels)
            .with_notes(self.notes.clone())
    }
}

impl std::fmt::Display for DefinitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for DefinitionError {}
