//! Structured diagnostics with source spans and fix hints.

use crate::span::Span;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// Error taxonomy from. Kinds, not types: every `Diagnostic`
/// carries one so callers can match on category without parsing `message`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiagnosticKind {
    // Lex
    UnterminatedString,
    UnterminatedComment,
    BadEscape,
    StrayCharacter,
    // Parse
    UnexpectedToken,
    MissingToken,
    MalformedPattern,
    // Name
    UndefinedIdentifier,
    DuplicateSymbol,
    AmbiguousImport,
    // Type
    TypeMismatch,
    NarrowingConversionRequired,
    NonBooleanCondition,
    NonIntegerIndex,
    FieldNotFound,
    // Overload
    AmbiguousCall,
    NoMatchingOverload,
    // Interface
    MissingImpl,
    NonExhaustivePattern,
    RedundantPattern,
    // Attribute
    UnknownAttribute,
    InvalidAbiSpec,
    SmcUnavailableOnTarget,
    // IR/Codegen
    InternalVerifierFailure,
    BackendUnsupportedFeature,
    TargetResourceExhausted,
}

/// A compiler diagnostic (error, warning, or hint).
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
    pub span: Span,
    pub notes: Vec<String>,
    pub help: Option<String>,
}

impl Diagnostic {
    pub fn error(kind: DiagnosticKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: Severity::Error,
            kind,
            message: message.into(),
            span,
            notes: Vec::new(),
            help: None,
        }
    }

    pub fn warning(kind: DiagnosticKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: Severity::Warning,
            kind,
            message: message.into(),
            span,
            notes: Vec::new(),
            help: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Render the diagnostic to stderr using ariadne.
    pub fn render(&self, filename: &str, source: &str) {
        use ariadne::{Color, Label, Report, ReportKind, Source};

        let kind = match self.severity {
            Severity::Error => ReportKind::Error,
            Severity::Warning => ReportKind::Warning,
        };
        let color = match self.severity {
            Severity::Error => Color::Red,
            Severity::Warning => Color::Yellow,
        };

        let mut report = Report::build(kind, filename, self.span.start as usize)
            .with_message(&self.message)
            .with_label(
                Label::new((filename, self.span.start as usize..self.span.end as usize))
                    .with_message(&self.message)
                    .with_color(color),
            );

        for note in &self.notes {
            report = report.with_note(note);
        }
        if let Some(help) = &self.help {
            report = report.with_help(help);
        }

        report
            .finish()
            .eprint((filename, Source::from(source)))
            .unwrap();
    }
}

/// Render a batch of diagnostics, sorted by span so that diagnostics produced
/// by any future parallel front-end work never interleave.
pub fn render_diagnostics(diagnostics: &[Diagnostic], filename: &str, source: &str) {
    let mut sorted: Vec<&Diagnostic> = diagnostics.iter().collect();
    sorted.sort_by_key(|d| (d.span.start, d.span.end));
    for diag in sorted {
        diag.render(filename, source);
    }
}

/// `true` if any diagnostic in the list is an error (drives non-zero exit).
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_construction() {
        let span = Span::new(0, 10, 15);
        let d = Diagnostic::error(DiagnosticKind::TypeMismatch, "type mismatch", span);
        assert_eq!(d.severity, Severity::Error);
        assert_eq!(d.message, "type mismatch");
        assert!(d.notes.is_empty());
        assert!(d.help.is_none());
    }

    #[test]
    fn chained_builders() {
        let d = Diagnostic::warning(DiagnosticKind::UnknownAttribute, "hint", Span::new(0, 0, 5))
            .with_note("note 1")
            .with_help("help text")
            .with_note("note 2");
        assert_eq!(d.notes.len(), 2);
        assert!(d.help.is_some());
    }

    #[test]
    fn has_errors_detects_mixed_severity() {
        let warnings = vec![Diagnostic::warning(
            DiagnosticKind::UnknownAttribute,
            "w",
            Span::dummy(),
        )];
        assert!(!has_errors(&warnings));

        let mut both = warnings;
        both.push(Diagnostic::error(
            DiagnosticKind::TypeMismatch,
            "e",
            Span::dummy(),
        ));
        assert!(has_errors(&both));
    }

    #[test]
    fn render_sorts_by_span_without_panicking() {
        let source = "let x = 1\nlet y = 2\n";
        let diagnostics = vec![
            Diagnostic::warning(DiagnosticKind::UnknownAttribute, "second", Span::new(0, 14, 15)),
            Diagnostic::warning(DiagnosticKind::UnknownAttribute, "first", Span::new(0, 4, 5)),
        ];
        render_diagnostics(&diagnostics, "test.minz", source);
    }
}
