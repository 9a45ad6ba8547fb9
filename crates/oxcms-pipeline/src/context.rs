//! Construction Context
//!
//! Configuration shared by every curve, stage and pipeline constructor:
//! - where construction errors are reported (the error sink)
//! - which parametric curve families are known (the curve registry)
//!
//! A context is a plain value. Nothing here is global; two contexts with
//! different registries can be used side by side.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::curves::{ParametricCurveEvaluator, ParametricRegistry};
use crate::error::{Error, ErrorCode};

/// Receives every construction failure before it is returned to the caller
pub trait ErrorSink: Send + Sync {
    /// Report an error with its class and a human readable message
    fn signal(&self, code: ErrorCode, message: &str);
}

/// Default sink: forwards errors to `tracing` at error level
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn signal(&self, code: ErrorCode, message: &str) {
        tracing::error!(code = %code, raw = code.to_raw(), "{}", message);
    }
}

/// Sink that records every signalled error
///
/// Useful for callers that want to surface the full error history, and for
/// tests asserting that a failure was reported.
#[derive(Debug, Default)]
pub struct CollectingSink {
    errors: Mutex<Vec<(ErrorCode, String)>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded errors, oldest first
    pub fn errors(&self) -> Vec<(ErrorCode, String)> {
        self.errors.lock().clone()
    }

    /// Number of recorded errors
    pub fn len(&self) -> usize {
        self.errors.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.lock().is_empty()
    }

    /// Forget everything recorded so far
    pub fn clear(&self) {
        self.errors.lock().clear();
    }
}

impl ErrorSink for CollectingSink {
    fn signal(&self, code: ErrorCode, message: &str) {
        self.errors.lock().push((code, message.to_string()));
    }
}

/// Construction context
#[derive(Clone)]
pub struct Context {
    sink: Arc<dyn ErrorSink>,
    curves: ParametricRegistry,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            sink: Arc::new(TracingSink),
            curves: ParametricRegistry::default(),
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("curves", &self.curves)
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Create a context with the built-in curves and the tracing sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the error sink
    pub fn with_error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Register a parametric curve plugin
    ///
    /// Plugins are searched before the built-in catalog, latest first, so a
    /// plugin may override a built-in type code.
    pub fn with_parametric_curves(mut self, plugin: Arc<dyn ParametricCurveEvaluator>) -> Self {
        self.curves.register(plugin);
        self
    }

    /// Replace the whole parametric registry
    pub fn with_registry(mut self, registry: ParametricRegistry) -> Self {
        self.curves = registry;
        self
    }

    /// The parametric curve registry
    pub fn curves(&self) -> &ParametricRegistry {
        &self.curves
    }

    /// The error sink
    pub fn error_sink(&self) -> &Arc<dyn ErrorSink> {
        &self.sink
    }

    /// Report an error through the sink and hand it back for returning
    pub fn signal(&self, error: Error) -> Error {
        self.sink.signal(error.code(), error.message());
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_sink_records() {
        let sink = Arc::new(CollectingSink::new());
        let ctx = Context::new().with_error_sink(sink.clone());

        let err = ctx.signal(Error::range("bad size"));

        assert_eq!(err.code(), ErrorCode::Range);
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.errors()[0], (ErrorCode::Range, "bad size".to_string()));

        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn test_context_is_cheap_to_clone() {
        let sink = Arc::new(CollectingSink::new());
        let ctx = Context::new().with_error_sink(sink.clone());
        let other = ctx.clone();

        other.signal(Error::internal("x"));
        assert_eq!(sink.len(), 1);
    }
}
