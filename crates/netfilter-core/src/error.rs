//! Error types for the network filter core.

use thiserror::Error;

/// Core error type for filter operations.
///
/// None of these ever escape to the host: the dispatcher turns every
/// variant into the result configured with `onerr`.
#[derive(Debug, Error)]
pub enum FilterError {
    /// Module arguments could not be parsed.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The rule source could not be loaded.
    #[error("Rule error: {0}")]
    Rules(#[from] netfilter_rules::RuleError),

    /// The host could not supply a request item.
    #[error("Item error: {0}")]
    Item(#[from] ItemError),
}

/// Problems with the module argument vector.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Key not recognized by this module.
    #[error("unknown option '{0}'")]
    UnknownOption(String),

    /// Key recognized, value not.
    #[error("invalid value '{value}' for option '{key}'")]
    InvalidValue {
        /// Option name.
        key: String,
        /// Rejected value.
        value: String,
    },

    /// Option requires a value and none was given.
    #[error("option '{0}' requires a value")]
    MissingValue(String),
}

/// Failure to read an item from the host's request state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ItemError {
    /// The host handle is absent.
    #[error("no host handle available")]
    NoHandle,

    /// The host reported an error for the item.
    #[error("item '{item}': {reason}")]
    Unavailable {
        /// Item name.
        item: &'static str,
        /// Host-provided reason.
        reason: String,
    },
}

/// Name resolution failure.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("cannot resolve '{target}': {reason}")]
pub struct ResolveError {
    /// Host name or address being resolved.
    pub target: String,
    /// Resolver message.
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidValue {
            key: "onerr".to_string(),
            value: "maybe".to_string(),
        };
        assert_eq!(err.to_string(), "invalid value 'maybe' for option 'onerr'");
    }

    #[test]
    fn test_filter_error_from_config() {
        let err: FilterError = ConfigError::UnknownOption("colour".to_string()).into();
        assert_eq!(err.to_string(), "Configuration error: unknown option 'colour'");
    }
}
