use std::time::Duration;

/// Well-known location of the published allow-list document.
pub const DEFAULT_ORIGINS_ENDPOINT: &str =
    "https://res.cdn.office.net/teams-js/validDomains/json/validDomains.json";

/// Upper bound on the allow-list fetch before falling back.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_millis(1500);

/// Controls allow-list resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorConfig {
    /// Endpoint serving `{ "validOrigins": [...] }`.
    pub endpoint: String,
    /// Abort the fetch after this long and use the fallback list.
    pub fetch_timeout: Duration,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ORIGINS_ENDPOINT.to_string(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}
