use std::sync::Arc;

use tokio::sync::OnceCell;
use url::Url;

use crate::config::ValidatorConfig;
use crate::error::OriginError;
use crate::fallback::fallback_list;
use crate::pattern::{host_of, matches_host_pattern, normalize_additional_origin};
use crate::source::OriginListSource;

const SECURE_SCHEME: &str = "https";

/// Answers "is this origin trusted" for a session.
///
/// The allow-list is resolved at most once per validator: the first lookup
/// (or [`OriginValidator::prefetch`]) fetches it, concurrent lookups wait on
/// that same fetch, and the outcome is kept until [`OriginValidator::reset`].
pub struct OriginValidator {
    source: Arc<dyn OriginListSource>,
    config: ValidatorConfig,
    cache: OnceCell<Vec<String>>,
    additional: Vec<String>,
}

impl OriginValidator {
    /// Create a validator with default config.
    pub fn new(source: Arc<dyn OriginListSource>) -> Self {
        Self::with_config(source, ValidatorConfig::default())
    }

    /// Create a validator with explicit config.
    pub fn with_config(source: Arc<dyn OriginListSource>, config: ValidatorConfig) -> Self {
        Self {
            source,
            config,
            cache: OnceCell::new(),
            additional: Vec::new(),
        }
    }

    /// Validator that never fetches and always uses the built-in list.
    pub fn offline() -> Self {
        Self::new(Arc::new(crate::source::StaticOriginSource::fallback()))
    }

    /// Validator config.
    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Merge caller-supplied origins into the extra list.
    ///
    /// Entries are normalized to host patterns and deduplicated; entries
    /// with a non-secure scheme are dropped.
    pub fn set_additional_origins<I, S>(&mut self, origins: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for origin in origins {
            let origin = origin.as_ref();
            match normalize_additional_origin(origin) {
                Some(pattern) if !self.additional.contains(&pattern) => {
                    self.additional.push(pattern)
                }
                Some(_) => {}
                None => tracing::warn!(origin, "ignoring invalid additional origin"),
            }
        }
    }

    /// Caller-supplied extra origins.
    pub fn additional_origins(&self) -> &[String] {
        &self.additional
    }

    /// The resolved allow-list, if it has been resolved.
    pub fn cached_list(&self) -> Option<&[String]> {
        self.cache.get().map(Vec::as_slice)
    }

    /// Resolve the allow-list ahead of the first message.
    pub async fn prefetch(&self) {
        let _ = self.allow_list().await;
    }

    /// Whether `origin` may exchange messages with this context.
    pub async fn is_valid_origin(&self, origin: &Url) -> bool {
        if origin.scheme() != SECURE_SCHEME {
            tracing::warn!(
                origin = %origin,
                scheme = origin.scheme(),
                "origin rejected: not using https"
            );
            return false;
        }

        let Some(host) = host_of(origin) else {
            tracing::warn!(origin = %origin, "origin rejected: no host");
            return false;
        };

        let allow_list = self.allow_list().await;
        if allow_list
            .iter()
            .any(|pattern| matches_host_pattern(pattern, &host))
        {
            return true;
        }

        if self
            .additional
            .iter()
            .any(|pattern| matches_host_pattern(pattern, &host))
        {
            return true;
        }

        tracing::warn!(
            origin = %origin,
            allow_list = ?allow_list,
            additional_origins = ?self.additional,
            "origin rejected: not in the allow-list or the additional origins"
        );
        false
    }

    /// Forget the resolved list and the extra origins.
    pub fn reset(&mut self) {
        self.cache = OnceCell::new();
        self.additional.clear();
    }

    async fn allow_list(&self) -> &[String] {
        self.cache
            .get_or_init(|| self.resolve())
            .await
            .as_slice()
    }

    async fn resolve(&self) -> Vec<String> {
        let timeout = self.config.fetch_timeout;
        let outcome = match tokio::time::timeout(timeout, self.source.fetch()).await {
            Ok(result) => result,
            Err(_) => Err(OriginError::Timeout(timeout)),
        };

        match outcome {
            Ok(list) => {
                tracing::debug!(count = list.len(), "retrieved valid origins list");
                list
            }
            Err(err) => {
                tracing::warn!(error = %err, "valid origins fetch failed; using fallback list");
                fallback_list()
            }
        }
    }
}
