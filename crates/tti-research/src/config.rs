//! Provider configuration.
//!
//! Both research providers speak the same wire protocol and differ
//! only in endpoint and credentials. Configuration is injected at
//! construction (no process globals); [`ResearchConfig::from_env`] is
//! a convenience for deployments that configure through the
//! environment. A missing provider slot is not an error here — it
//! becomes a `NotConfigured` failure at the call site, where the
//! failover chain can absorb it.

/// Endpoint and credentials for one research provider slot.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URL of the provider API (e.g. `https://rates.example.com/api`).
    pub base_url: String,
    /// Bearer token for provider authentication.
    pub api_key: String,
    /// Per-request timeout in seconds (default: 30).
    pub timeout_secs: u64,
}

impl ProviderConfig {
    /// Create a provider configuration with the default timeout.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: trim_base_url(base_url.into()),
            api_key: api_key.into(),
            timeout_secs: 30,
        }
    }
}

fn trim_base_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

/// Full research configuration: primary and secondary provider slots.
#[derive(Debug, Clone, Default)]
pub struct ResearchConfig {
    pub primary: Option<ProviderConfig>,
    pub secondary: Option<ProviderConfig>,
}

impl ResearchConfig {
    /// Read provider slots from the environment.
    ///
    /// Primary: `TTI_PRIMARY_RESEARCH_URL` / `TTI_PRIMARY_RESEARCH_KEY`.
    /// Secondary: `TTI_SECONDARY_RESEARCH_URL` / `TTI_SECONDARY_RESEARCH_KEY`.
    /// A slot is configured only when both of its variables are set.
    pub fn from_env() -> Self {
        Self {
            primary: slot_from_env("TTI_PRIMARY_RESEARCH_URL", "TTI_PRIMARY_RESEARCH_KEY"),
            secondary: slot_from_env("TTI_SECONDARY_RESEARCH_URL", "TTI_SECONDARY_RESEARCH_KEY"),
        }
    }
}

fn slot_from_env(url_var: &str, key_var: &str) -> Option<ProviderConfig> {
    match (std::env::var(url_var), std::env::var(key_var)) {
        (Ok(url), Ok(key)) if !url.is_empty() && !key.is_empty() => {
            Some(ProviderConfig::new(url, key))
        }
        _ => {
            tracing::debug!(url_var, key_var, "research provider slot not configured");
            None
        }
    }
}
