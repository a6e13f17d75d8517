use std::fmt;

/// The kinds of failure the orchestrator surfaces to its callers.
///
/// Kinds are coarse on purpose: callers (in particular the apiserver
/// aggregation layer) map a kind to a transport-level status, so the set
/// must stay small and stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    #[error("not found")]
    NotFound,
    #[error("conflict")]
    Conflict,
    #[error("invalid input")]
    InvalidInput,
    #[error("upstream failure")]
    Upstream,
    #[error("function failed")]
    FunctionFailed,
    #[error("unauthorized")]
    Unauthorized,
    #[error("cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;

/// An error carrying a [`ErrorKind`], a human-readable message, an ordered
/// operation stack (innermost first), and an optional underlying cause.
///
/// Built up via [`OperationContext::op`], mirroring how call sites elsewhere
/// in this codebase wrap fallible steps with `anyhow::Context`, except the
/// kind is preserved through every wrap so callers can still branch on it.
pub struct Error {
    kind: ErrorKind,
    message: String,
    ops: Vec<String>,
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            ops: Vec::new(),
            source: None,
        }
    }

    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            ops: Vec::new(),
            source: Some(Box::new(source)),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn operations(&self) -> &[String] {
        &self.ops
    }

    fn push_op(mut self, op: impl Into<String>) -> Self {
        self.ops.push(op.into());
        self
    }

    /// A single-line rendering: `op1: op2: message`. Used for the common
    /// case; pair with `{:?}` (via `Debug`) when a caller's debug flag asks
    /// for the full multi-line trace including the source chain.
    pub fn flatten(&self) -> String {
        let mut parts: Vec<&str> = self.ops.iter().rev().map(String::as_str).collect();
        parts.push(&self.message);
        parts.join(": ")
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.flatten())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({:?})", self.flatten(), self.kind)?;
        let mut cause = self.source.as_deref();
        while let Some(err) = cause {
            writeln!(f, "caused by: {err}")?;
            cause = err.source();
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_deref().map(|e| e as _)
    }
}

/// Extension trait for building up the operation stack on a [`Result`],
/// analogous to `anyhow::Context::context` but preserving [`ErrorKind`].
pub trait OperationContext<T> {
    /// Record that `op` was in progress when this result's error occurred.
    fn op(self, op: impl Into<String>) -> Result<T>;
}

impl<T, E> OperationContext<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn op(self, op: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().push_op(op))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_orders_ops_outermost_last_applied_first() {
        let result: Result<()> = Err(Error::new(ErrorKind::NotFound, "revision missing"));
        let result = result.op("open revision").op("list revisions");

        let err = result.unwrap_err();
        assert_eq!(err.flatten(), "list revisions: open revision: revision missing");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn kind_survives_wrapping() {
        let result: Result<()> = Err(Error::new(ErrorKind::Conflict, "stale resourceVersion"));
        let wrapped = result.op("update inventory");
        assert_eq!(wrapped.unwrap_err().kind(), ErrorKind::Conflict);
    }
}
