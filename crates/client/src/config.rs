//! Client runtime configuration.
//!
//! Resolved once at startup and passed into the loader, reconciler and resolver.

use folio_core::PathRules;
use folio_types::OwnerId;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3000";
pub const DEFAULT_NEGATIVE_TTL: Duration = Duration::from_secs(30);
pub const DEFAULT_POSITIVE_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_CONCURRENCY: usize = 2;
pub const DEFAULT_VISIBILITY_THRESHOLD: f32 = 0.5;
pub const DEFAULT_PLACEHOLDER_URL: &str = "/placeholder.svg";
pub const MANIFEST_PATH: &str = "/manifest.json";

/// What the resolver does once every probe has failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailPolicy {
    /// Resolve anyway: the declared video URL (so a poster still renders) or the placeholder.
    #[default]
    FailOpen,
    /// Report the item as unresolved.
    Strict,
}

/// Reconciliation tunables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconcileOptions {
    /// How long an "absent" cache entry suppresses refetching.
    pub negative_ttl: Duration,
    /// How long a sidecar-confirmed cache entry suppresses refetching.
    pub positive_ttl: Duration,
    /// Concurrent sidecar fetches.
    pub concurrency: usize,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            negative_ttl: DEFAULT_NEGATIVE_TTL,
            positive_ttl: DEFAULT_POSITIVE_TTL,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// Client configuration resolved at startup.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    base_url: String,
    owner: OwnerId,
    cache_dir: PathBuf,
    path_rules: PathRules,
    reconcile: ReconcileOptions,
    fail_policy: FailPolicy,
    visibility_threshold: f32,
    placeholder_url: String,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, owner: OwnerId, cache_dir: PathBuf) -> Self {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        Self {
            base_url,
            owner,
            cache_dir,
            path_rules: PathRules::default(),
            reconcile: ReconcileOptions::default(),
            fail_policy: FailPolicy::default(),
            visibility_threshold: DEFAULT_VISIBILITY_THRESHOLD,
            placeholder_url: DEFAULT_PLACEHOLDER_URL.to_string(),
        }
    }

    pub fn with_path_rules(mut self, rules: PathRules) -> Self {
        self.path_rules = rules;
        self
    }

    pub fn with_reconcile(mut self, options: ReconcileOptions) -> Self {
        self.reconcile = options;
        self
    }

    pub fn with_fail_policy(mut self, policy: FailPolicy) -> Self {
        self.fail_policy = policy;
        self
    }

    pub fn with_visibility_threshold(mut self, threshold: f32) -> Self {
        self.visibility_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn with_placeholder_url(mut self, url: impl Into<String>) -> Self {
        self.placeholder_url = url.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn path_rules(&self) -> &PathRules {
        &self.path_rules
    }

    pub fn reconcile(&self) -> ReconcileOptions {
        self.reconcile
    }

    pub fn fail_policy(&self) -> FailPolicy {
        self.fail_policy
    }

    pub fn visibility_threshold(&self) -> f32 {
        self.visibility_threshold
    }

    pub fn placeholder_url(&self) -> &str {
        &self.placeholder_url
    }
}

/// Parse a duration in whole seconds, falling back to `default` when unset.
pub fn seconds_from_env_value(value: Option<String>, default: Duration) -> Result<Duration, String> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    match value {
        None => Ok(default),
        Some(v) => v
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| format!("expected a number of seconds, got {v:?}")),
    }
}

/// Parse the worker count; zero is rejected.
pub fn concurrency_from_env_value(value: Option<String>) -> Result<usize, String> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    match value {
        None => Ok(DEFAULT_CONCURRENCY),
        Some(v) => match v.parse::<usize>() {
            Ok(0) | Err(_) => Err(format!("concurrency must be a positive number, got {v:?}")),
            Ok(n) => Ok(n),
        },
    }
}

/// `FOLIO_STRICT_RESOLVE`: truthy values select [`FailPolicy::Strict`].
pub fn fail_policy_from_env_value(value: Option<String>) -> FailPolicy {
    match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        Some("1" | "true" | "yes" | "on" | "strict") => FailPolicy::Strict,
        _ => FailPolicy::FailOpen,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let cfg = ClientConfig::new(
            "https://folio.example/ ",
            OwnerId::new("me").unwrap(),
            PathBuf::from("/tmp"),
        );
        assert_eq!(cfg.base_url(), "https://folio.example");
        assert_eq!(cfg.reconcile().concurrency, 2);
        assert_eq!(cfg.fail_policy(), FailPolicy::FailOpen);
    }

    #[test]
    fn test_env_value_parsers() {
        assert_eq!(
            seconds_from_env_value(Some("45".into()), DEFAULT_NEGATIVE_TTL).unwrap(),
            Duration::from_secs(45)
        );
        assert_eq!(
            seconds_from_env_value(None, DEFAULT_POSITIVE_TTL).unwrap(),
            Duration::from_secs(300)
        );
        assert!(concurrency_from_env_value(Some("0".into())).is_err());
        assert_eq!(concurrency_from_env_value(Some("4".into())).unwrap(), 4);
        assert_eq!(
            fail_policy_from_env_value(Some("TRUE".into())),
            FailPolicy::Strict
        );
        assert_eq!(fail_policy_from_env_value(None), FailPolicy::FailOpen);
    }

    #[test]
    fn test_visibility_threshold_clamped() {
        let cfg = ClientConfig::new("http://x", OwnerId::new("me").unwrap(), "/tmp".into())
            .with_visibility_threshold(3.0);
        assert_eq!(cfg.visibility_threshold(), 1.0);
    }
}
