//! Messaging Error Types

use recall_core::MessagingProvider;
use recall_store::StoreError;
use thiserror::Error;

/// Messaging Result type
pub type MessagingResult<T> = Result<T, MessagingError>;

/// Errors raised while resolving credentials or talking to a provider
#[derive(Debug, Error)]
pub enum MessagingError {
    /// Tenant row missing; the caller must abort this attempt
    #[error("Tenant not found: {0}")]
    TenantNotFound(String),

    /// Credentials missing or invalid and no fallback allowed
    #[error("Configuration error ({provider}): {message}")]
    Configuration {
        provider: MessagingProvider,
        message: String,
    },

    /// Provider rejected or failed the request
    #[error("Provider error ({provider}): {message}")]
    Provider {
        provider: MessagingProvider,
        message: String,
    },

    /// Provider call exceeded its deadline
    #[error("Provider timed out: {0}")]
    Timeout(String),

    /// Credential encryption failure
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Malformed credential or address
    #[error("Validation error: {0}")]
    Validation(String),

    /// Storage backend error
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl MessagingError {
    pub fn configuration(provider: MessagingProvider, message: impl Into<String>) -> Self {
        Self::Configuration {
            provider,
            message: message.into(),
        }
    }

    pub fn provider(provider: MessagingProvider, message: impl Into<String>) -> Self {
        Self::Provider {
            provider,
            message: message.into(),
        }
    }

    /// Check if error is retryable on a later attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Provider { .. } | Self::Timeout(_) | Self::Store(_))
    }

    /// Provider the failure should be attributed to, when known
    pub fn attributed_provider(&self) -> Option<MessagingProvider> {
        match self {
            Self::Configuration { provider, .. } | Self::Provider { provider, .. } => Some(*provider),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(MessagingError::provider(MessagingProvider::System, "503").is_retryable());
        assert!(MessagingError::Timeout("30s".into()).is_retryable());
        assert!(!MessagingError::TenantNotFound("t".into()).is_retryable());
        assert!(!MessagingError::configuration(MessagingProvider::CustomTwilio, "missing sid")
            .is_retryable());
    }
}
