//! Runtime settings.
//!
//! Settings come from an environment snapshot (`&[(String, String)]`), so
//! tests and embedders can pass their own instead of the process environment.
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `UPDATE_RETURNING_DB_ALIAS` | `default` | Alias stamped onto loaded entities |
//! | `UPDATE_RETURNING_STRICT` | `true` | Reject shapes without a returning form |
//! | `UPDATE_RETURNING_CHUNK_SIZE` | `100` | Rows per fetched chunk |

use crate::constants::{
    DEFAULT_CHUNK_SIZE, DEFAULT_DB_ALIAS, ENV_CHUNK_SIZE, ENV_DB_ALIAS, ENV_STRICT,
};

/// Connection and operation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Connection alias.
    pub alias: String,
    /// Whether a query shape without a returning form is an error.
    pub strict_returning: bool,
    /// Rows per fetched chunk.
    pub chunk_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            alias: DEFAULT_DB_ALIAS.to_string(),
            strict_returning: true,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl Settings {
    /// Read settings from an environment snapshot, falling back to defaults.
    ///
    /// An unparsable or zero chunk size is ignored with a warning.
    pub fn from_env(env: &[(String, String)]) -> Self {
        let defaults = Self::default();
        let chunk_size = match get(env, ENV_CHUNK_SIZE) {
            None => defaults.chunk_size,
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    tracing::warn!(
                        var = ENV_CHUNK_SIZE,
                        value = %raw,
                        "ignoring invalid chunk size"
                    );
                    defaults.chunk_size
                },
            },
        };
        Self {
            alias: get_or(env, ENV_DB_ALIAS, &defaults.alias),
            strict_returning: bool(env, ENV_STRICT, defaults.strict_returning),
            chunk_size,
        }
    }

    /// [`Settings::from_env`] over the current process environment.
    pub fn from_process_env() -> Self {
        let env: Vec<(String, String)> = std::env::vars().collect();
        Self::from_env(&env)
    }

    /// Set the connection alias.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    /// Set strict mode.
    #[must_use]
    pub const fn strict_returning(mut self, strict: bool) -> Self {
        self.strict_returning = strict;
        self
    }

    /// Set rows per chunk; zero is treated as one.
    #[must_use]
    pub fn chunk_size(mut self, rows: usize) -> Self {
        self.chunk_size = rows.max(1);
        self
    }
}

fn get(env: &[(String, String)], name: &str) -> Option<String> {
    env.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone())
}

fn get_or(env: &[(String, String)], name: &str, default: &str) -> String {
    get(env, name).unwrap_or_else(|| default.to_string())
}

/// `true`, `1` and `yes` (any case) are true, `false`, `0` and `no` are
/// false, anything else keeps the default.
fn bool(env: &[(String, String)], name: &str, default: bool) -> bool {
    get(env, name).map_or(default, |v| match v.to_lowercase().as_str() {
        "true" | "1" | "yes" => true,
        "false" | "0" | "no" => false,
        _ => default,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_when_unset() {
        assert_eq!(Settings::from_env(&[]), Settings::default());
        assert_eq!(Settings::default().alias, "default");
        assert!(Settings::default().strict_returning);
    }

    #[test]
    fn test_reads_all_variables() {
        let settings = Settings::from_env(&env(&[
            ("UPDATE_RETURNING_DB_ALIAS", "replica"),
            ("UPDATE_RETURNING_STRICT", "No"),
            ("UPDATE_RETURNING_CHUNK_SIZE", " 25 "),
        ]));
        assert_eq!(settings.alias, "replica");
        assert!(!settings.strict_returning);
        assert_eq!(settings.chunk_size, 25);
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let settings = Settings::from_env(&env(&[
            ("UPDATE_RETURNING_STRICT", "maybe"),
            ("UPDATE_RETURNING_CHUNK_SIZE", "0"),
        ]));
        assert!(settings.strict_returning);
        assert_eq!(settings.chunk_size, DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_builder_setters() {
        let settings = Settings::default().alias("other").strict_returning(false).chunk_size(0);
        assert_eq!(settings.alias, "other");
        assert!(!settings.strict_returning);
        assert_eq!(settings.chunk_size, 1);
    }
}
