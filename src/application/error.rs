use std::error::Error as StdError;

use thiserror::Error;

use crate::{
    cache::{ErrorInfo, MutationError, QueryKey},
    config::LoadError,
    domain::error::DomainError,
    infra::error::InfraError,
};

/// An error and its chain of sources, outermost first.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self { source, messages }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error(transparent)]
    Mutation(#[from] MutationError),
    #[error("query `{key}` failed: {message}")]
    Query { key: String, message: String },
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Surface a failed query to a caller that cannot render partial data.
    pub fn query(key: &QueryKey, error: &ErrorInfo) -> Self {
        Self::Query {
            key: key.to_string(),
            message: error.message.clone(),
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport::from_error("application::error::AppError", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FetchError;

    #[test]
    fn report_walks_the_source_chain() {
        let error = AppError::from(MutationError::PartialFailure {
            completed: 1,
            total: 2,
            source: Box::new(MutationError::Fetch(FetchError::network("reset"))),
        });

        let report = error.report();
        assert_eq!(
            report.messages,
            vec![
                "mutation aborted after 1 of 2 steps: network error: reset".to_string(),
                "network error: reset".to_string(),
            ]
        );
    }
}
