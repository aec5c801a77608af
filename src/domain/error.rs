use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("domain validation failed: {message}")]
    Validation { message: String },
    #[error("`{action}` is not permitted for this user")]
    Forbidden { action: &'static str },
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn forbidden(action: &'static str) -> Self {
        Self::Forbidden { action }
    }
}
