use std::{fmt::Display, str::FromStr};

use thiserror::Error;

/// Errors raised while reading configuration from the environment.
#[derive(Debug, Error)]
pub enum EnvError {
    /// An environment variable required by the application is not set.
    #[error("Missing environment variable: {0}")]
    Missing(String),

    /// The variable is set but could not be parsed into the expected type.
    #[error("Invalid value for {name}: {reason}")]
    Invalid {
        /// Variable name.
        name: String,
        /// Parser message.
        reason: String,
    },
}

/// Reads an environment variable, returning a structured error if it's missing.
///
/// Empty values are treated as missing.
///
/// # Arguments
/// * `name` - The name of the environment variable to read.
pub fn get_env_var(name: &str) -> Result<String, EnvError> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(EnvError::Missing(name.to_string())),
    }
}

/// Reads an optional environment variable. Unset and empty both yield `None`.
pub fn get_env_opt(name: &str) -> Option<String> {
    get_env_var(name).ok()
}

/// Reads and parses a variable, falling back to `default` when it is unset.
///
/// A value that is present but unparsable is an error rather than a silent fallback.
pub fn get_env_parsed_or<T>(name: &str, default: T) -> Result<T, EnvError>
where
    T: FromStr,
    T::Err: Display,
{
    match get_env_opt(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| EnvError::Invalid {
            name: name.to_string(),
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test uses its own variable name; the process environment is shared.

    #[test]
    fn missing_var_is_reported_by_name() {
        let err = get_env_var("SHARED_UTILS_TEST_DEFINITELY_UNSET").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing environment variable: SHARED_UTILS_TEST_DEFINITELY_UNSET"
        );
    }

    #[test]
    fn parsed_falls_back_to_default_when_unset() {
        let port: u16 = get_env_parsed_or("SHARED_UTILS_TEST_PORT_UNSET", 8080).unwrap();
        assert_eq!(port, 8080);
    }

    #[test]
    fn parsed_rejects_garbage() {
        unsafe { std::env::set_var("SHARED_UTILS_TEST_PORT_BAD", "eighty") };
        let err = get_env_parsed_or::<u16>("SHARED_UTILS_TEST_PORT_BAD", 8080).unwrap_err();
        assert!(matches!(err, EnvError::Invalid { .. }));
    }

    #[test]
    fn empty_value_counts_as_missing() {
        unsafe { std::env::set_var("SHARED_UTILS_TEST_EMPTY", "  ") };
        assert!(get_env_opt("SHARED_UTILS_TEST_EMPTY").is_none());
    }
}
