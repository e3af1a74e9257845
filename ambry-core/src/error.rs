use crate::jsonld::ValidationFailure;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AmbryError>;

#[derive(Debug, Error)]
pub enum AmbryError {
    #[error("malformed locator '{0}': expected '<namespace>:<id>'")]
    MalformedLocator(String),

    #[error("namespace mismatch: expected '{expected}', got '{got}'")]
    NamespaceMismatch { expected: String, got: String },

    #[error("no blob storage connector registered for namespace '{0}'")]
    NoBackendRegistered(String),

    #[error("invalid {property}: {reason}")]
    Validation { property: String, reason: String },

    #[error("metadata validation failed: {}", format_failures(.0))]
    InvalidMetadata(Vec<ValidationFailure>),

    #[error("missing required identity '{0}'")]
    MissingIdentity(&'static str),

    #[error("blob entry not found: {0}")]
    NotFound(String),

    #[error("encryption error: {0}")]
    Encryption(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("create failed")]
    CreateFailed(#[source] Box<AmbryError>),

    #[error("get failed")]
    GetFailed(#[source] Box<AmbryError>),

    #[error("update failed")]
    UpdateFailed(#[source] Box<AmbryError>),

    #[error("remove failed")]
    RemoveFailed(#[source] Box<AmbryError>),
}

impl AmbryError {
    pub fn validation(property: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            property: property.into(),
            reason: reason.into(),
        }
    }

    /// Walk through the operation wrappers to the underlying failure.
    pub fn root_cause(&self) -> &AmbryError {
        match self {
            Self::CreateFailed(cause)
            | Self::GetFailed(cause)
            | Self::UpdateFailed(cause)
            | Self::RemoveFailed(cause) => cause.root_cause(),
            other => other,
        }
    }
}

fn format_failures(failures: &[ValidationFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_cause_unwraps_operation_wrappers() {
        let error = AmbryError::CreateFailed(Box::new(AmbryError::Backend("disk full".to_string())));
        assert!(matches!(error.root_cause(), AmbryError::Backend(_)));

        let nested = AmbryError::GetFailed(Box::new(AmbryError::NotFound("blob:abc".to_string())));
        assert!(matches!(nested.root_cause(), AmbryError::NotFound(_)));
    }

    #[test]
    fn invalid_metadata_aggregates_failures() {
        let error = AmbryError::InvalidMetadata(vec![
            ValidationFailure::new("@context", "must be a string, array or object"),
            ValidationFailure::new("@type", "must be a string or array of strings"),
        ]);
        let message = error.to_string();
        assert!(message.contains("@context"));
        assert!(message.contains("@type"));
    }
}
