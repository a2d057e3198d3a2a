//! Failing brain implementation - every call errors.

use std::sync::atomic::{AtomicUsize, Ordering};

use brain_core::{async_trait, Brain, BrainError, Generation, GenerationRequest};

#[derive(Debug, Clone)]
enum Failure {
    Network(String),
    Processing(String),
    Configuration(String),
    Empty,
    Timeout,
}

/// A brain that fails every call with the same kind of error.
#[derive(Debug)]
pub struct FailingBrain {
    failure: Failure,
    calls: AtomicUsize,
}

impl FailingBrain {
    fn with(failure: Failure) -> Self {
        Self {
            failure,
            calls: AtomicUsize::new(0),
        }
    }

    /// Fail with [`BrainError::ProcessingFailed`].
    pub fn processing(message: impl Into<String>) -> Self {
        Self::with(Failure::Processing(message.into()))
    }

    /// Fail with [`BrainError::Network`].
    pub fn network(message: impl Into<String>) -> Self {
        Self::with(Failure::Network(message.into()))
    }

    /// Fail with [`BrainError::Configuration`].
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::with(Failure::Configuration(message.into()))
    }

    /// Fail with [`BrainError::EmptyResponse`].
    pub fn empty() -> Self {
        Self::with(Failure::Empty)
    }

    /// Fail with [`BrainError::Timeout`].
    pub fn timeout() -> Self {
        Self::with(Failure::Timeout)
    }

    /// Number of generate calls received.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn error(&self) -> BrainError {
        match &self.failure {
            Failure::Network(m) => BrainError::Network(m.clone()),
            Failure::Processing(m) => BrainError::ProcessingFailed(m.clone()),
            Failure::Configuration(m) => BrainError::Configuration(m.clone()),
            Failure::Empty => BrainError::EmptyResponse,
            Failure::Timeout => BrainError::Timeout,
        }
    }
}

#[async_trait]
impl Brain for FailingBrain {
    async fn generate(&self, _request: GenerationRequest) -> Result<Generation, BrainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.error())
    }

    fn name(&self) -> &str {
        "FailingBrain"
    }

    async fn is_ready(&self) -> bool {
        false
    }
}
