use thiserror::Error;
use unfold_ast::DeclId;
use unfold_span::Span;
use unfold_utils::Diagnostic;

/// Failures scoped to a single call site or a single regenerated class.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InlineError {
    #[error("no body available for inline callee `{callee}`")]
    MissingBody {
        callee: String,
        decl: Option<DeclId>,
        span: Span,
    },

    #[error("malformed body in `{class}`: {reason}")]
    MalformedBody {
        class: String,
        reason: String,
        span: Span,
    },

    #[error("return targets {target}, which has no enclosing inline frame")]
    UnsupportedNonLocalTarget { target: DeclId, span: Span },

    #[error("call to `{callee}` passes {given} arguments but it declares {expected} parameters")]
    ArityMismatch {
        callee: String,
        expected: usize,
        given: usize,
        span: Span,
    },

    #[error("inline cycle: `{callee}` is already being expanded")]
    Cycle { callee: String, span: Span },
}

impl InlineError {
    pub fn span(&self) -> Span {
        match self {
            InlineError::MissingBody { span, .. }
            | InlineError::MalformedBody { span, .. }
            | InlineError::UnsupportedNonLocalTarget { span, .. }
            | InlineError::ArityMismatch { span, .. }
            | InlineError::Cycle { span, .. } => *span,
        }
    }

    /// Convert this error to a diagnostic
    pub fn to_diagnostic(&self, source_id: &str) -> Diagnostic {
        let span = self.span();
        match self {
            InlineError::MissingBody { .. } => Diagnostic::error(source_id, span, self.to_string())
                .with_help("the call is left in place; register the callee with the body lookup to inline it"),
            InlineError::MalformedBody { .. } => {
                Diagnostic::error(source_id, span, self.to_string())
            }
            InlineError::UnsupportedNonLocalTarget { .. } => {
                Diagnostic::info(source_id, span, self.to_string())
                    .with_help("the return exits a function that is not being inlined and stays as written")
            }
            InlineError::ArityMismatch { expected, .. } => {
                Diagnostic::error(source_id, span, self.to_string())
                    .with_suggestion(format!("pass at most {expected} arguments"))
            }
            InlineError::Cycle { .. } => Diagnostic::error(source_id, span, self.to_string())
                .with_help("remove the inline marker from one function on the cycle"),
        }
    }
}

pub type Result<T> = std::result::Result<T, InlineError>;
