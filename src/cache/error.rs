use thiserror::Error;

use super::keys::MutationKey;

/// Failure of a single network-bound step: a page fetch or a write action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("server responded with status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("invalid response: {0}")]
    Decode(String),
}

impl FetchError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }
}

/// Failure of a mutation as delivered to callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// Input rejected before anything was dispatched.
    #[error("validation failed: {0}")]
    Validation(String),
    /// Another execution with the same key is still in flight.
    #[error("mutation `{key}` is already in flight")]
    Busy { key: MutationKey },
    /// A multi-step mutation stopped after `completed` of `total` steps.
    #[error("mutation aborted after {completed} of {total} steps: {source}")]
    PartialFailure {
        completed: usize,
        total: usize,
        #[source]
        source: Box<MutationError>,
    },
}

impl MutationError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy { .. })
    }

    /// The error that stopped the mutation, looking through partial failures.
    pub fn root_cause(&self) -> &MutationError {
        match self {
            Self::PartialFailure { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_failure_reports_root_cause() {
        let error = MutationError::PartialFailure {
            completed: 2,
            total: 3,
            source: Box::new(MutationError::Fetch(FetchError::network("reset"))),
        };

        assert_eq!(
            error.root_cause(),
            &MutationError::Fetch(FetchError::network("reset"))
        );
        assert_eq!(
            error.to_string(),
            "mutation aborted after 2 of 3 steps: network error: reset"
        );
    }

    #[test]
    fn busy_is_detected() {
        let error = MutationError::Busy {
            key: MutationKey::new("createPost"),
        };
        assert!(error.is_busy());
        assert!(!MutationError::validation("empty").is_busy());
    }
}
