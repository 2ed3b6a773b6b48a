//! Module argument parsing.
//!
//! The host passes the words following the module path in its service
//! configuration, for example:
//!
//! ```text
//! auth required pam_network_filter.so item=rhost file=/etc/security/hosts.rules onerr=fail
//! ```
//!
//! | Option | Values | Default |
//! |--------|--------|---------|
//! | `item` | `user` `ruser` `rhost` `rhost_addr` `rhost_name` `tty` `service` | `rhost` |
//! | `sense` | `allow` `deny` (effect of unmarked rules) | `allow` |
//! | `file` | path, repeatable | none |
//! | `allow` / `deny` | comma-separated patterns, repeatable | none |
//! | `default` | `allow` `deny` (no rule matched) | `deny` |
//! | `onerr` | `succeed` `fail` `ignore` | `fail` |
//! | `debug`, `quiet` | flags | off |

use std::path::PathBuf;

use netfilter_rules::{Effect, ParseOptions};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::phase::ResultCode;

/// Result for an indeterminate decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnErr {
    /// Let the request through.
    Succeed,
    /// Refuse the request.
    #[default]
    Fail,
    /// Abstain.
    Ignore,
}

impl OnErr {
    /// Result code this policy stands for.
    pub fn result_code(self) -> ResultCode {
        match self {
            OnErr::Succeed => ResultCode::Success,
            OnErr::Fail => ResultCode::PermissionDenied,
            OnErr::Ignore => ResultCode::Ignore,
        }
    }

    fn from_value(value: &str) -> Option<Self> {
        match value {
            "succeed" | "success" => Some(OnErr::Succeed),
            "fail" => Some(OnErr::Fail),
            "ignore" => Some(OnErr::Ignore),
            _ => None,
        }
    }

    /// Find the `onerr` policy without parsing anything else.
    ///
    /// Used so that the policy applies even when other arguments are
    /// malformed. The last `onerr=` word decides; if it is absent or its
    /// value is unrecognized the policy fails closed.
    pub fn scan<S: AsRef<str>>(args: &[S]) -> Self {
        args.iter()
            .filter_map(|arg| arg.as_ref().trim().strip_prefix("onerr="))
            .last()
            .and_then(OnErr::from_value)
            .unwrap_or_default()
    }
}

/// Request attribute matched against the rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Item {
    /// Target user name.
    User,
    /// Requesting (remote) user name.
    Ruser,
    /// Remote host as reported by the host application.
    #[default]
    Rhost,
    /// Remote host as an IP address; host names are forward-resolved.
    RhostAddr,
    /// Remote host as a name; IP literals are reverse-resolved.
    RhostName,
    /// Terminal name.
    Tty,
    /// Service name.
    Service,
}

impl Item {
    /// Host-valued items are compared case-insensitively.
    pub fn is_host_name(self) -> bool {
        matches!(self, Item::Rhost | Item::RhostName)
    }

    /// The host item this attribute is derived from.
    pub fn source(self) -> HostItem {
        match self {
            Item::User => HostItem::User,
            Item::Ruser => HostItem::Ruser,
            Item::Rhost | Item::RhostAddr | Item::RhostName => HostItem::Rhost,
            Item::Tty => HostItem::Tty,
            Item::Service => HostItem::Service,
        }
    }

    /// Keyword used for this item in module arguments.
    pub fn name(self) -> &'static str {
        match self {
            Item::User => "user",
            Item::Ruser => "ruser",
            Item::Rhost => "rhost",
            Item::RhostAddr => "rhost_addr",
            Item::RhostName => "rhost_name",
            Item::Tty => "tty",
            Item::Service => "service",
        }
    }

    fn from_value(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Item::User),
            "ruser" => Some(Item::Ruser),
            "rhost" => Some(Item::Rhost),
            "rhost_addr" => Some(Item::RhostAddr),
            "rhost_name" => Some(Item::RhostName),
            "tty" => Some(Item::Tty),
            "service" => Some(Item::Service),
            _ => None,
        }
    }
}

impl std::str::FromStr for Item {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Item::from_value(s).ok_or_else(|| ConfigError::InvalidValue {
            key: "item".to_string(),
            value: s.to_string(),
        })
    }
}

/// Items kept by the host per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostItem {
    /// `PAM_SERVICE`
    Service,
    /// `PAM_USER`
    User,
    /// `PAM_TTY`
    Tty,
    /// `PAM_RHOST`
    Rhost,
    /// `PAM_RUSER`
    Ruser,
}

impl HostItem {
    /// Lower-case item name.
    pub fn name(self) -> &'static str {
        match self {
            HostItem::Service => "service",
            HostItem::User => "user",
            HostItem::Tty => "tty",
            HostItem::Rhost => "rhost",
            HostItem::Ruser => "ruser",
        }
    }
}

/// Where rules come from, in argument order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleSource {
    /// A rule file.
    File(PathBuf),
    /// Patterns given directly as an argument.
    Inline {
        /// Effect of every pattern in the argument.
        effect: Effect,
        /// The patterns, in order.
        patterns: Vec<String>,
        /// 1-based position of the argument in argv.
        position: usize,
    },
}

/// Parsed module arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleArgs {
    /// Attribute matched against the rules.
    pub item: Item,
    /// Effect of rule lines without a marker.
    pub sense: Effect,
    /// Verdict when no rule matches.
    pub default_effect: Effect,
    /// Result for indeterminate decisions.
    pub onerr: OnErr,
    /// Rule sources, concatenated in order.
    pub sources: Vec<RuleSource>,
    /// Log at debug level for this call.
    pub debug: bool,
    /// Do not log successful decisions.
    pub quiet: bool,
}

impl Default for ModuleArgs {
    fn default() -> Self {
        Self {
            item: Item::Rhost,
            sense: Effect::Allow,
            default_effect: Effect::Deny,
            onerr: OnErr::Fail,
            sources: Vec::new(),
            debug: false,
            quiet: false,
        }
    }
}

impl ModuleArgs {
    /// Parse an argument vector.
    ///
    /// # Errors
    ///
    /// Returns the first unknown option, missing value, or invalid value.
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<Self, ConfigError> {
        let mut parsed = Self::default();

        for (index, arg) in args.iter().enumerate() {
            let arg = arg.as_ref().trim();
            if arg.is_empty() {
                continue;
            }

            let (key, value) = match arg.split_once('=') {
                Some((key, value)) => (key, Some(value)),
                None => (arg, None),
            };

            match (key, value) {
                ("debug", None) => parsed.debug = true,
                ("quiet", None) => parsed.quiet = true,
                ("debug" | "quiet", Some(_)) => {
                    return Err(ConfigError::InvalidValue {
                        key: key.to_string(),
                        value: value.unwrap_or_default().to_string(),
                    })
                }
                (_, None) => {
                    return Err(if is_known_key(key) {
                        ConfigError::MissingValue(key.to_string())
                    } else {
                        ConfigError::UnknownOption(key.to_string())
                    })
                }
                (_, Some("")) if is_known_key(key) => {
                    return Err(ConfigError::MissingValue(key.to_string()))
                }
                ("item", Some(v)) => parsed.item = v.parse()?,
                ("sense", Some(v)) => parsed.sense = effect_value(key, v)?,
                ("default", Some(v)) => parsed.default_effect = effect_value(key, v)?,
                ("onerr", Some(v)) => {
                    parsed.onerr = OnErr::from_value(v).ok_or_else(|| invalid(key, v))?
                }
                ("file", Some(v)) => parsed.sources.push(RuleSource::File(PathBuf::from(v))),
                ("allow" | "deny", Some(v)) => {
                    let effect = if key == "allow" { Effect::Allow } else { Effect::Deny };
                    let patterns: Vec<String> = v
                        .split(',')
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(str::to_string)
                        .collect();
                    if patterns.is_empty() {
                        return Err(ConfigError::MissingValue(key.to_string()));
                    }
                    parsed.sources.push(RuleSource::Inline {
                        effect,
                        patterns,
                        position: index + 1,
                    });
                }
                (_, Some(_)) => return Err(ConfigError::UnknownOption(key.to_string())),
            }
        }

        Ok(parsed)
    }

    /// Whether the vector asks for debug logging, without full parsing.
    pub fn wants_debug<S: AsRef<str>>(args: &[S]) -> bool {
        args.iter().any(|arg| arg.as_ref().trim() == "debug")
    }

    /// Rule parsing options implied by these arguments.
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            sense: self.sense,
            fold_case: self.item.is_host_name(),
            user_names: matches!(self.item, Item::User | Item::Ruser),
        }
    }
}

fn is_known_key(key: &str) -> bool {
    matches!(
        key,
        "item" | "sense" | "file" | "allow" | "deny" | "default" | "onerr"
    )
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn effect_value(key: &str, value: &str) -> Result<Effect, ConfigError> {
    Effect::from_keyword(value).ok_or_else(|| invalid(key, value))
}
