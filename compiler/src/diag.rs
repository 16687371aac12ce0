// diag.rs — Unified diagnostics model
//
// Provides the shared diagnostic types used across all composition phases,
// plus the stable code table for the verifier's structural violations.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use std::fmt;

use crate::ast::Span;

// ── Diagnostic code ──────────────────────────────────────────────────────

/// A stable diagnostic code (e.g., `E0801`).
///
/// Codes are `&'static str` constants defined in the `codes` module.
/// Once assigned, a code must never be reassigned to a different semantic
/// meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagCode(pub &'static str);

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable codes for composition verification.
pub mod codes {
    use super::DiagCode;

    /// A pull port with no bound getter.
    pub const E0801: DiagCode = DiagCode("E0801");
    /// A pull port bound to more than one getter.
    pub const E0802: DiagCode = DiagCode("E0802");
    /// A reaction targeted by more than one push port.
    pub const E0803: DiagCode = DiagCode("E0803");
    /// The trigger graph contains a cycle (recursive composition).
    pub const E0804: DiagCode = DiagCode("E0804");
    /// Concurrently triggered computations conflict on a shared instance.
    pub const E0805: DiagCode = DiagCode("E0805");
}

// ── Severity level ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagLevel {
    Error,
    Warning,
}

// ── Related span ─────────────────────────────────────────────────────────

/// A secondary source location providing context for a diagnostic.
#[derive(Debug, Clone)]
pub struct RelatedSpan {
    pub span: Span,
    pub label: String,
}

// ── Diagnostic ───────────────────────────────────────────────────────────

/// A compiler diagnostic emitted by any phase.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: Option<DiagCode>,
    pub level: DiagLevel,
    pub span: Span,
    pub message: String,
    pub hint: Option<String>,
    pub related_spans: Vec<RelatedSpan>,
}

impl Diagnostic {
    /// Create a new diagnostic with no code, hint, or related spans.
    pub fn new(level: DiagLevel, span: Span, message: impl Into<String>) -> Self {
        Self {
            code: None,
            level,
            span,
            message: message.into(),
            hint: None,
            related_spans: Vec::new(),
        }
    }

    /// Attach a stable diagnostic code.
    pub fn with_code(mut self, code: DiagCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Attach a remediation hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Attach a related span.
    pub fn with_related(mut self, span: Span, label: impl Into<String>) -> Self {
        self.related_spans.push(RelatedSpan {
            span,
            label: label.into(),
        });
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            DiagLevel::Error => "error",
            DiagLevel::Warning => "warning",
        };
        if let Some(code) = &self.code {
            write!(f, "{}[{}]: {}", level, code, self.message)?;
        } else {
            write!(f, "{}: {}", level, self.message)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_span() -> Span {
        Span::new(0, 1)
    }

    #[test]
    fn display_without_code() {
        let d = Diagnostic::new(DiagLevel::Error, dummy_span(), "something failed");
        assert_eq!(format!("{d}"), "error: something failed");
    }

    #[test]
    fn display_with_code() {
        let d = Diagnostic::new(DiagLevel::Error, dummy_span(), "unbound pull port")
            .with_code(codes::E0801);
        assert_eq!(format!("{d}"), "error[E0801]: unbound pull port");
    }

    #[test]
    fn builder_chain() {
        let d = Diagnostic::new(DiagLevel::Error, dummy_span(), "conflicting access")
            .with_code(codes::E0805)
            .with_hint("make one of the reactions read-only")
            .with_related(dummy_span(), "second write here");

        assert_eq!(d.code, Some(codes::E0805));
        assert_eq!(d.hint.as_deref(), Some("make one of the reactions read-only"));
        assert_eq!(d.related_spans.len(), 1);
    }
}
