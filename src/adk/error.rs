// SPDX-License-Identifier: MIT

//! Typed error handling for corrective-rag
//!
//! Gateway failures (`ModelUnavailable`, `RetrievalUnavailable`, `StateStoreFailure`)
//! are raised by the adapters. The engine wraps anything a step raises into
//! `StepFailure`, carrying the step name and the trace executed so far.

use thiserror::Error;

/// Top-level error type for corrective-rag
#[derive(Debug, Error)]
pub enum RagError {
    /// The completion/embedding runtime failed or timed out
    #[error("Model unavailable ({provider}): {message}")]
    ModelUnavailable { provider: String, message: String },

    /// The document store failed or timed out
    #[error("Retrieval unavailable ({provider}): {message}")]
    RetrievalUnavailable { provider: String, message: String },

    /// Loading or saving a checkpoint or profile failed
    #[error("State store failure: {0}")]
    StateStoreFailure(String),

    /// A workflow step raised; nothing from the turn was persisted
    #[error("Step '{step}' failed: {cause}")]
    StepFailure {
        step: String,
        #[source]
        cause: Box<RagError>,
        trace: Vec<String>,
    },

    /// The engine executed more steps than its budget allows
    #[error("Step budget of {limit} exceeded")]
    LoopBoundExceeded { limit: u32, trace: Vec<String> },

    /// Caller supplied an empty conversation id or message
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration errors (missing env vars, invalid config, bad transition table)
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl RagError {
    /// Create a model error
    pub fn model(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ModelUnavailable {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a retrieval error
    pub fn retrieval(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RetrievalUnavailable {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a state store error
    pub fn store(message: impl Into<String>) -> Self {
        Self::StateStoreFailure(message.into())
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Wrap an error raised by a step
    pub fn step(step: impl Into<String>, cause: RagError, trace: Vec<String>) -> Self {
        Self::StepFailure {
            step: step.into(),
            cause: Box::new(cause),
            trace,
        }
    }

    /// Name of the failed step, if this is a step failure
    pub fn failed_step(&self) -> Option<&str> {
        match self {
            Self::StepFailure { step, .. } => Some(step),
            _ => None,
        }
    }

    /// Steps executed before the failure
    pub fn partial_trace(&self) -> &[String] {
        match self {
            Self::StepFailure { trace, .. } | Self::LoopBoundExceeded { trace, .. } => trace,
            _ => &[],
        }
    }

    /// Whether the caller may resubmit the same turn.
    ///
    /// Turns commit atomically, so every runtime failure leaves the conversation at its
    /// last checkpoint. Only malformed input and configuration are not worth retrying.
    pub fn is_retry_safe(&self) -> bool {
        !matches!(self, Self::InvalidInput(_) | Self::Config(_))
    }
}
