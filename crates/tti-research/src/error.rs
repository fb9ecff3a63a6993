//! Research client error types.

use crate::types::ProviderKind;

/// Errors from provider configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The API key contains characters that cannot form an HTTP header.
    #[error("invalid API key characters for {provider} provider")]
    InvalidApiKey {
        /// Which provider slot the key was configured for.
        provider: ProviderKind,
    },
    /// The configured base URL is not a valid absolute URL.
    #[error("invalid base URL for {provider} provider: {reason}")]
    InvalidBaseUrl {
        /// Which provider slot the URL was configured for.
        provider: ProviderKind,
        /// URL parse failure description.
        reason: String,
    },
    /// The underlying HTTP client could not be constructed.
    #[error("failed to build HTTP client: {reason}")]
    ClientBuild {
        /// Builder failure description.
        reason: String,
    },
}

/// Errors from external rate research calls.
#[derive(Debug, thiserror::Error)]
pub enum ResearchError {
    /// The provider slot has no credentials configured. Fails fast at
    /// this call site only; the caller falls through to the next
    /// provider or tier.
    #[error("{provider} research provider not configured")]
    NotConfigured {
        /// Which provider slot was attempted.
        provider: ProviderKind,
    },

    /// HTTP transport failure (connection refused, timeout, TLS).
    #[error("transport error calling {provider} provider: {reason}")]
    Transport {
        /// Which provider slot was attempted.
        provider: ProviderKind,
        /// Human-readable transport failure description.
        reason: String,
    },

    /// The provider answered with a non-success status.
    #[error("{provider} provider returned HTTP {status}: {body}")]
    BadStatus {
        /// Which provider slot was attempted.
        provider: ProviderKind,
        /// HTTP status code.
        status: u16,
        /// Response body excerpt for diagnostics.
        body: String,
    },

    /// The response body did not match the expected schema. Treated as
    /// a transient fetch failure, never as a silent empty result.
    #[error("unparseable response from {provider} provider: {reason}")]
    UnparseableResponse {
        /// Which provider slot was attempted.
        provider: ProviderKind,
        /// Deserialization failure description.
        reason: String,
    },

    /// The emergency point lookup found no entry for the HS code.
    #[error("no surcharge entry for HS code {hs_code}")]
    NotFound {
        /// The HS code that was queried.
        hs_code: String,
    },

    /// Both providers failed; the caller decides fallback policy.
    #[error("all research providers failed — primary: {primary}; secondary: {secondary}")]
    AllProvidersFailed {
        /// Failure description from the primary attempt.
        primary: String,
        /// Failure description from the secondary attempt.
        secondary: String,
    },
}
