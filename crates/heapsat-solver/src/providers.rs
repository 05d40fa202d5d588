//! Oracle seam: the boundary between the deterministic pipeline and the
//! language model.
//!
//! An oracle is an opaque text-in/text-out call. Everything behind it
//! (model selection, temperature, token limits, transport retries, timeouts)
//! belongs to the concrete backend; the pipeline only depends on this trait
//! and treats every response as possibly malformed.

use thiserror::Error;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("API error: {0}")]
    Api(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// A synchronous call to a language model. Blocking is deliberate: the solve
/// pipeline is strictly sequential, and cancellation/timeouts are the
/// transport's responsibility.
pub trait Oracle: Send + Sync {
    fn invoke(&self, system: &str, human: &str) -> Result<String, OracleError>;
}

/// Scripted oracle for testing: cycles through a fixed response list.
pub struct MockOracle {
    responses: Vec<String>,
    cursor: AtomicUsize,
}

impl MockOracle {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn always(response: &str) -> Self {
        Self::new(vec![response.to_string()])
    }

    /// Number of invocations so far.
    pub fn calls(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }
}

impl Oracle for MockOracle {
    fn invoke(&self, _system: &str, _human: &str) -> Result<String, OracleError> {
        let idx = self.cursor.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .responses
            .get(idx % self.responses.len().max(1))
            .cloned()
            .unwrap_or_default())
    }
}

/// Oracle that fails every invocation with a transport-class error; used to
/// exercise the degraded paths.
pub struct FailingOracle {
    message: String,
    calls: AtomicUsize,
}

impl FailingOracle {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Oracle for FailingOracle {
    fn invoke(&self, _system: &str, _human: &str) -> Result<String, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(OracleError::Network(self.message.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_cycles_and_counts() {
        let oracle = MockOracle::new(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(oracle.invoke("s", "h").unwrap(), "a");
        assert_eq!(oracle.invoke("s", "h").unwrap(), "b");
        assert_eq!(oracle.invoke("s", "h").unwrap(), "a");
        assert_eq!(oracle.calls(), 3);
    }

    #[test]
    fn failing_oracle_reports_transport_error() {
        let oracle = FailingOracle::new("connection refused");
        let err = oracle.invoke("s", "h").unwrap_err();
        assert!(err.to_string().contains("connection refused"));
        assert_eq!(oracle.calls(), 1);
    }
}
