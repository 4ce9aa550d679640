//! Unified error type for the analysis pipeline.
//!
//! A hand-rolled error shape: a `kind` tag, a message, optional
//! source-file context, and an optional boxed cause. Per the
//! failure-semantics policy almost none of these are fatal — they
//! accumulate into a run's `errors` list rather than aborting it. Only
//! bootstrap failures (seed file missing, source root unreadable) surface
//! through `Result`.

use std::fmt;

use crate::domain::effects::Effect;
use crate::domain::types::Type;

/// A source span in a single file, used to anchor a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct Span {
    pub file: String,
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl Span {
    pub fn new(file: impl Into<String>, start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> Self {
        Self {
            file: file.into(),
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    pub fn unknown() -> Self {
        Self::default()
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}-{}:{}",
            self.file, self.start_line, self.start_col, self.end_line, self.end_col
        )
    }
}

/// The full error taxonomy from the failure-semantics design (§7/§4.10).
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    /// Source text could not be parsed; the file is skipped.
    Parse,
    /// First-order unification of two types failed structurally.
    TypeMismatch,
    /// Unification of two effect rows failed.
    EffectMismatch,
    /// A unification variable occurred in the type/effect it was being
    /// bound to.
    OccursCheck,
    /// An AST node shape the inference engine has no rule for.
    UnknownExpression,
    /// A fixpoint over a strongly-connected component did not stabilize
    /// within the bounded round count.
    FixpointDiverged,
    /// A `redirect_to` chain in the registry looped back on itself.
    RegistryCycle,
    /// Ambient I/O failure (reading a source file, a seed/resolution file).
    Io,
    /// Ambient (de)serialization failure on a registry or config file.
    Serde,
    /// Any other bootstrap-time failure (bad config, missing seed file).
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Parse => "parse error",
            ErrorKind::TypeMismatch => "type mismatch",
            ErrorKind::EffectMismatch => "effect mismatch",
            ErrorKind::OccursCheck => "occurs check",
            ErrorKind::UnknownExpression => "unknown expression",
            ErrorKind::FixpointDiverged => "fixpoint diverged",
            ErrorKind::RegistryCycle => "registry cycle",
            ErrorKind::Io => "io error",
            ErrorKind::Serde => "serialization error",
            ErrorKind::Config => "config error",
        };
        f.write_str(s)
    }
}

/// A single recorded diagnostic. Accumulated into per-function and
/// per-run error lists; never itself aborts the pipeline (see §7).
#[derive(Debug, Clone)]
pub struct AnalysisError {
    pub kind: ErrorKind,
    pub message: String,
    pub span: Option<Span>,
    source: Option<Box<AnalysisErrorSource>>,
}

#[derive(Debug, Clone)]
enum AnalysisErrorSource {
    Io(String),
    Serde(String),
}

impl AnalysisError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            span: None,
            source: None,
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn type_mismatch(t1: &Type, t2: &Type, span: Span) -> Self {
        Self::new(
            ErrorKind::TypeMismatch,
            format!("cannot unify `{t1:?}` with `{t2:?}`"),
        )
        .with_span(span)
    }

    pub fn effect_mismatch(e1: &Effect, e2: &Effect, span: Span) -> Self {
        Self::new(
            ErrorKind::EffectMismatch,
            format!("cannot unify effect `{e1:?}` with `{e2:?}`"),
        )
        .with_span(span)
    }

    pub fn occurs_check(var: u64, t: &Type, span: Span) -> Self {
        Self::new(
            ErrorKind::OccursCheck,
            format!("type variable #{var} occurs in `{t:?}`"),
        )
        .with_span(span)
    }

    pub fn unknown_expression(kind: impl Into<String>, span: Span) -> Self {
        Self::new(ErrorKind::UnknownExpression, kind.into()).with_span(span)
    }

    pub fn fixpoint_diverged(scc_id: usize) -> Self {
        Self::new(
            ErrorKind::FixpointDiverged,
            format!("strongly-connected component #{scc_id} did not converge within the round bound"),
        )
    }

    pub fn registry_cycle(mfa: impl fmt::Display) -> Self {
        Self::new(ErrorKind::RegistryCycle, format!("cycle resolving wrapper `{mfa}`"))
    }

    pub fn parse(file: impl Into<String>, message: impl Into<String>) -> Self {
        let file = file.into();
        Self::new(ErrorKind::Parse, message.into()).with_span(Span::new(file, 0, 0, 0, 0))
    }
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(span) = &self.span {
            write!(f, " ({span})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AnalysisError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

impl From<std::io::Error> for AnalysisError {
    fn from(e: std::io::Error) -> Self {
        Self {
            kind: ErrorKind::Io,
            message: e.to_string(),
            span: None,
            source: Some(Box::new(AnalysisErrorSource::Io(e.to_string()))),
        }
    }
}

impl From<serde_json::Error> for AnalysisError {
    fn from(e: serde_json::Error) -> Self {
        Self {
            kind: ErrorKind::Serde,
            message: e.to_string(),
            span: None,
            source: Some(Box::new(AnalysisErrorSource::Serde(e.to_string()))),
        }
    }
}

/// Bootstrap-boundary result alias; everything past startup prefers
/// accumulating `AnalysisError`s into a result's `errors` list instead.
pub type AnalysisResult<T> = Result<T, AnalysisError>;
