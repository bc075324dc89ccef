//! Validation of `set_config` arguments.
//!
//! The argument is a flat `key=value,key=value` list. Each key belongs to a fixed set
//! and carries its own rule; the list is accepted or rejected as a whole.

use core::fmt;
use core::str::FromStr;
use std::net::Ipv4Addr;

use thiserror::Error;

use crate::types::Param;

/// Validation failures for a `set_config` argument.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A pair has no `=` separator.
    #[error("malformed pair {0:?}, expected key=value")]
    MalformedPair(String),

    /// An address-typed key was given something that is not a dotted-decimal IPv4 address.
    #[error("{key} must be an IPv4 address, got {value:?}")]
    InvalidAddress {
        /// Offending key.
        key: ConfigKey,
        /// Offending value.
        value: String,
    },

    /// An enumerated key was given a value outside its set.
    #[error("{key} must be one of {allowed:?}, got {value:?}")]
    InvalidEnum {
        /// Offending key.
        key: ConfigKey,
        /// Offending value.
        value: String,
        /// Accepted values.
        allowed: &'static [&'static str],
    },

    /// The key is not recognized.
    #[error("unknown parameter {0:?}")]
    UnknownParameter(String),
}

/// Rule a configuration value must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueRule {
    /// Dotted-decimal IPv4 address.
    Ipv4,
    /// One of a fixed, case-sensitive set.
    OneOf(&'static [&'static str]),
    /// Anything, including the empty string.
    FreeForm,
}

/// Accepted values for [`ConfigKey::IpMode`].
pub const IP_MODES: &[&str] = &["STATIC", "DHCP"];

/// Keys accepted by `set_config`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    /// `IPAddress`
    IpAddress,
    /// `netMask`
    NetMask,
    /// `defaultGw`
    DefaultGateway,
    /// `DNS`
    Dns,
    /// `IPMode`
    IpMode,
    /// `NTP`
    Ntp,
    /// `NTP2`
    Ntp2,
}

impl ConfigKey {
    /// Every recognized key, in the order they are documented.
    pub const ALL: [ConfigKey; 7] = [
        ConfigKey::IpAddress,
        ConfigKey::NetMask,
        ConfigKey::DefaultGateway,
        ConfigKey::Dns,
        ConfigKey::IpMode,
        ConfigKey::Ntp,
        ConfigKey::Ntp2,
    ];

    /// Wire name of the key.
    pub fn as_str(self) -> &'static str {
        match self {
            ConfigKey::IpAddress => "IPAddress",
            ConfigKey::NetMask => "netMask",
            ConfigKey::DefaultGateway => "defaultGw",
            ConfigKey::Dns => "DNS",
            ConfigKey::IpMode => "IPMode",
            ConfigKey::Ntp => "NTP",
            ConfigKey::Ntp2 => "NTP2",
        }
    }

    /// Validation rule for the key.
    pub fn rule(self) -> ValueRule {
        match self {
            ConfigKey::IpAddress | ConfigKey::NetMask | ConfigKey::DefaultGateway | ConfigKey::Dns => {
                ValueRule::Ipv4
            }
            ConfigKey::IpMode => ValueRule::OneOf(IP_MODES),
            ConfigKey::Ntp | ConfigKey::Ntp2 => ValueRule::FreeForm,
        }
    }

    /// Check `value` against this key's rule.
    pub fn validate(self, value: &str) -> Result<(), ConfigError> {
        match self.rule() {
            ValueRule::Ipv4 => value
                .parse::<Ipv4Addr>()
                .map(drop)
                .map_err(|_| ConfigError::InvalidAddress {
                    key: self,
                    value: value.to_string(),
                }),
            ValueRule::OneOf(allowed) if allowed.contains(&value) => Ok(()),
            ValueRule::OneOf(allowed) => Err(ConfigError::InvalidEnum {
                key: self,
                value: value.to_string(),
                allowed,
            }),
            ValueRule::FreeForm => Ok(()),
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConfigKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownParameter(s.to_string()))
    }
}

/// Parse and validate a `key=value,key=value` argument.
///
/// Pairs split on the first `=`, so values may themselves contain `=`. Input order is
/// preserved. No output is produced unless every pair is valid.
pub fn parse_assignments(argument: &str) -> Result<Vec<Param>, ConfigError> {
    argument
        .split(',')
        .map(|pair| {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| ConfigError::MalformedPair(pair.to_string()))?;
            let key: ConfigKey = key.parse()?;
            key.validate(value)?;
            Ok(Param::new(key.as_str(), value))
        })
        .collect()
}
