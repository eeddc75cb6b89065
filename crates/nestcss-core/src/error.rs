use std::fmt;

use crate::value::BinaryOperator;

pub type Result<T> = std::result::Result<T, CompileError>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Span {
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub const fn dummy() -> Self {
        Self { line: 0, column: 0 }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 && self.column == 0 {
            write!(f, "<unknown>")
        } else {
            write!(f, "{}:{}", self.line, self.column)
        }
    }
}

/// A line of source text kept for error display.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceLine {
    pub number: usize,
    pub text: String,
}

/// Number of lines shown before the failing line in diagnostics.
const CONTEXT_LINES: usize = 3;

impl SourceLine {
    /// Collects the failing line and the few lines leading up to it.
    pub fn around(source: &str, line: usize) -> Vec<SourceLine> {
        if line == 0 {
            return Vec::new();
        }
        let first = line.saturating_sub(CONTEXT_LINES).max(1);
        source
            .lines()
            .enumerate()
            .map(|(idx, text)| (idx + 1, text))
            .filter(|(number, _)| *number >= first && *number <= line)
            .map(|(number, text)| SourceLine {
                number,
                text: text.to_string(),
            })
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyntaxError {
    pub message: String,
    pub span: Span,
    pub lines: Vec<SourceLine>,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            lines: Vec::new(),
        }
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.lines = SourceLine::around(source, self.span.line);
        self
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at {})", self.message, self.span)
    }
}

/// The resource ceilings enforced during one compilation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Limit {
    NestingDepth,
    Includes,
    Nodes,
    Imports,
    LoopIterations,
    Resolution,
    EvaluationDepth,
}

impl Limit {
    pub const fn max(self) -> usize {
        match self {
            Limit::NestingDepth => 6,
            Limit::Includes => 1_000,
            Limit::Nodes => 50_000,
            Limit::Imports => 200,
            Limit::LoopIterations => 10_000,
            Limit::Resolution => 10_000,
            Limit::EvaluationDepth => 256,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Limit::NestingDepth => "nesting depth",
            Limit::Includes => "include",
            Limit::Nodes => "node",
            Limit::Imports => "import",
            Limit::LoopIterations => "loop iteration",
            Limit::Resolution => "variable resolution",
            Limit::EvaluationDepth => "expression depth",
        }
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Coarse classification of every [`CompileError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Syntax,
    Unresolved,
    LimitExceeded,
    TypeIncompatible,
}

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("Syntax error: {0}")]
    Syntax(SyntaxError),

    #[error("Mixin '{0}' not registered")]
    MixinNotRegistered(String),

    #[error("function named '{0}' not registered")]
    FunctionNotRegistered(String),

    #[error("Self referencing variable ${0}")]
    SelfReference(String),

    #[error("Parent selector '&' used outside of a style rule: {0}")]
    ParentOutsideRule(String),

    #[error("Exceeded {limit} limit of {max}{}", detail_suffix(.detail))]
    LimitExceeded {
        limit: Limit,
        max: usize,
        detail: String,
    },

    #[error("Loop end ({end}) must not be before its start ({start})")]
    InvalidLoopRange { start: i64, end: i64 },

    #[error("Expected a number but found '{0}'")]
    NotANumber(String),

    #[error("Operator '{op}' cannot be applied to '{left}' and '{right}'")]
    TypeIncompatible {
        op: BinaryOperator,
        left: String,
        right: String,
    },
}

fn detail_suffix(detail: &str) -> String {
    if detail.is_empty() {
        String::new()
    } else {
        format!(". Was {detail}")
    }
}

impl CompileError {
    pub fn syntax(message: impl Into<String>, span: Span) -> Self {
        CompileError::Syntax(SyntaxError::new(message, span))
    }

    pub fn limit(limit: Limit) -> Self {
        Self::limit_with(limit, String::new())
    }

    pub fn limit_with(limit: Limit, detail: impl Into<String>) -> Self {
        CompileError::LimitExceeded {
            limit,
            max: limit.max(),
            detail: detail.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CompileError::Syntax(_) => ErrorKind::Syntax,
            CompileError::MixinNotRegistered(_)
            | CompileError::FunctionNotRegistered(_)
            | CompileError::SelfReference(_)
            | CompileError::ParentOutsideRule(_) => ErrorKind::Unresolved,
            CompileError::LimitExceeded { .. } | CompileError::InvalidLoopRange { .. } => {
                ErrorKind::LimitExceeded
            }
            CompileError::TypeIncompatible { .. } | CompileError::NotANumber(_) => {
                ErrorKind::TypeIncompatible
            }
        }
    }

    /// The limit that was hit, when this is a limit error.
    pub fn limit_kind(&self) -> Option<Limit> {
        match self {
            CompileError::LimitExceeded { limit, .. } => Some(*limit),
            _ => None,
        }
    }

    /// Attaches the offending source lines to a syntax error.
    pub fn with_source(self, source: &str) -> Self {
        match self {
            CompileError::Syntax(err) if err.lines.is_empty() => {
                CompileError::Syntax(err.with_source(source))
            }
            other => other,
        }
    }
}

impl From<SyntaxError> for CompileError {
    fn from(err: SyntaxError) -> Self {
        CompileError::Syntax(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_display_hides_dummy() {
        assert_eq!(Span::dummy().to_string(), "<unknown>");
        assert_eq!(Span { line: 3, column: 7 }.to_string(), "3:7");
    }

    #[test]
    fn source_lines_lead_up_to_failure() {
        let src = "a\nb\nc\nd\ne";
        let lines = SourceLine::around(src, 4);
        let numbers: Vec<usize> = lines.iter().map(|l| l.number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
        assert_eq!(lines.last().map(|l| l.text.as_str()), Some("d"));
        assert!(SourceLine::around(src, 0).is_empty());
    }

    #[test]
    fn errors_are_classified() {
        assert_eq!(
            CompileError::syntax("x", Span::dummy()).kind(),
            ErrorKind::Syntax
        );
        assert_eq!(
            CompileError::MixinNotRegistered("m".into()).kind(),
            ErrorKind::Unresolved
        );
        assert_eq!(
            CompileError::limit(Limit::Imports).kind(),
            ErrorKind::LimitExceeded
        );
        assert_eq!(
            CompileError::InvalidLoopRange { start: 2, end: 1 }.kind(),
            ErrorKind::LimitExceeded
        );
    }

    #[test]
    fn limit_message_names_ceiling() {
        let err = CompileError::limit(Limit::Includes);
        assert_eq!(err.to_string(), "Exceeded include limit of 1000");
        let err = CompileError::limit_with(Limit::NestingDepth, "a b c");
        assert_eq!(err.to_string(), "Exceeded nesting depth limit of 6. Was a b c");
    }
}
