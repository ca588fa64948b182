//! Engine configuration.

use std::time::Duration;

use crate::types::DEFAULT_GUARD;

/// Top-level configuration applied by
/// [`EngineBuilder::from_config`](crate::EngineBuilder::from_config).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GuardConfig {
    /// Guard used when a caller does not name one.
    pub default_guard: String,
    /// Maximum snapshot age in seconds; `None` keeps snapshots until invalidated.
    pub cache_ttl_secs: Option<u64>,
    /// Build the snapshot in [`Engine::boot`](crate::Engine::boot) instead of on first use.
    pub eager_load: bool,
    /// Log failed role/permission lookups at warn level.
    pub log_lookup_failures: bool,
    /// Denial messages.
    pub messages: Messages,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            default_guard: DEFAULT_GUARD.to_string(),
            cache_ttl_secs: None,
            eager_load: false,
            log_lookup_failures: false,
            messages: Messages::default(),
        }
    }
}

impl GuardConfig {
    /// Snapshot TTL as a duration.
    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl_secs.map(Duration::from_secs)
    }
}

/// Human-readable denial messages.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Messages {
    /// Sent when no principal is present.
    pub not_logged_in: String,
    /// Prefix for missing roles; the required names follow.
    pub unauthorized_role: String,
    /// Prefix for missing permissions; the required names follow.
    pub unauthorized_permission: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            not_logged_in: "User is not logged in.".to_string(),
            unauthorized_role: "User does not have the right roles. Necessary roles are"
                .to_string(),
            unauthorized_permission:
                "User does not have the right permissions. Necessary permissions are".to_string(),
        }
    }
}

impl Messages {
    pub(crate) fn unauthorized_role(&self, names: &[String]) -> String {
        format!("{} {}", self.unauthorized_role, names.join(", "))
    }

    pub(crate) fn unauthorized_permission(&self, names: &[String]) -> String {
        format!("{} {}", self.unauthorized_permission, names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_web_guard_and_lazy_cache() {
        let config = GuardConfig::default();
        assert_eq!(config.default_guard, "web");
        assert!(!config.eager_load);
        assert_eq!(config.cache_ttl(), None);
    }

    #[test]
    fn messages_join_required_names() {
        let messages = Messages::default();
        let text = messages.unauthorized_permission(&["edit".to_string(), "publish".to_string()]);
        assert!(text.ends_with("Necessary permissions are edit, publish"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn deserializes_partial_json_with_defaults() {
        let config: GuardConfig =
            serde_json::from_str(r#"{ "default_guard": "api", "cache_ttl_secs": 60 }"#).unwrap();
        assert_eq!(config.default_guard, "api");
        assert_eq!(config.cache_ttl(), Some(Duration::from_secs(60)));
        assert_eq!(config.messages, Messages::default());
    }
}
