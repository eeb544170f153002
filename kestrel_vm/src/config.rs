//! Runtime configuration for the dispatch core.
//!
//! A single struct resolved once when the runtime is built and read without
//! synchronization afterwards.

use crate::call_site::POLY_RULE_LIMIT;

/// Environment variable forcing case-insensitive member binding.
pub const ENV_IGNORE_CASE: &str = "KESTREL_IGNORE_CASE";
/// Environment variable overriding the per-site rule limit.
pub const ENV_MAX_RULES: &str = "KESTREL_MAX_RULES";

// =============================================================================
// Runtime Configuration
// =============================================================================

/// Settings shared by every binder and call site of one runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Bind member names case-insensitively when a call site does not say
    /// otherwise.
    pub ignore_case: bool,

    /// Rules a call site keeps before it goes megamorphic and stops caching.
    pub max_rules_per_site: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            ignore_case: false,
            max_rules_per_site: POLY_RULE_LIMIT,
        }
    }
}

impl RuntimeConfig {
    /// Resolve configuration from `KESTREL_*` environment variables, falling
    /// back to defaults for anything unset or malformed.
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Resolve configuration through an arbitrary variable lookup.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let ignore_case = lookup(ENV_IGNORE_CASE)
            .map(|v| Self::truthy(&v))
            .unwrap_or(defaults.ignore_case);

        let max_rules_per_site = match lookup(ENV_MAX_RULES) {
            Some(v) => match v.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    tracing::warn!(value = %v, "ignoring invalid {ENV_MAX_RULES}");
                    defaults.max_rules_per_site
                }
            },
            None => defaults.max_rules_per_site,
        };

        Self {
            ignore_case,
            max_rules_per_site,
        }
    }

    pub fn with_ignore_case(mut self, ignore_case: bool) -> Self {
        self.ignore_case = ignore_case;
        self
    }

    /// Set the per-site rule limit. Zero is clamped to one.
    pub fn with_max_rules_per_site(mut self, max: usize) -> Self {
        self.max_rules_per_site = max.max(1);
        self
    }

    /// Non-empty and not `0`/`false`/`off`.
    #[inline]
    fn truthy(v: &str) -> bool {
        let v = v.trim();
        !v.is_empty() && !matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | "off")
    }
}

// =============================================================================
// Tests
// =============================================================================
