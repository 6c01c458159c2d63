/// Convenience result type used across hyperres.
pub type HyperResult<T> = Result<T, HyperError>;

/// Top-level error taxonomy used by engine APIs.
#[derive(thiserror::Error, Debug)]
pub enum HyperError {
    /// Invalid caller-provided input or configuration.
    #[error("validation error: {0}")]
    Validation(String),

    /// A required host capability (codec, external tool) is absent.
    #[error("capability missing: {0}")]
    CapabilityMissing(String),

    /// No pooled resource could be leased.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// A job-level precondition does not hold (e.g. too few keyframes).
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// An external encoder, decoder or process reported a failure.
    #[error("external resource error: {0}")]
    External(String),

    /// The job's cancellation token fired.
    #[error("job cancelled")]
    Cancelled,

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HyperError {
    /// Build a [`HyperError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`HyperError::CapabilityMissing`] value.
    pub fn capability(msg: impl Into<String>) -> Self {
        Self::CapabilityMissing(msg.into())
    }

    /// Build a [`HyperError::ResourceExhausted`] value.
    pub fn exhausted(msg: impl Into<String>) -> Self {
        Self::ResourceExhausted(msg.into())
    }

    /// Build a [`HyperError::Precondition`] value.
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    /// Build a [`HyperError::External`] value.
    pub fn external(msg: impl Into<String>) -> Self {
        Self::External(msg.into())
    }

    /// `true` for [`HyperError::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
