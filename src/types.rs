use core::fmt;

use serde::{Deserialize, Serialize};

/// A named parameter attached to a [`Command`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    /// Parameter name as understood by the module.
    pub name: String,
    /// Parameter value. Always transmitted as a string.
    pub value: String,
}

impl Param {
    /// Create a parameter.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Certificate bodies are long; keep debug output to one line.
        const MAX_VALUE_CHARS: usize = 64;

        let mut s = f.debug_struct("Param");
        s.field("name", &self.name);
        if self.value.chars().count() > MAX_VALUE_CHARS {
            s.field("value_len", &self.value.len());
        } else {
            s.field("value", &self.value);
        }
        s.finish()
    }
}

/// A single operation carried inside a request envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Operation name, e.g. `getDeviceInfo`.
    pub name: String,
    /// Ordered parameters. Omitted from the wire form when empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Param>,
}

impl Command {
    /// A command without parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    /// A command with the given parameters.
    pub fn with_params(name: impl Into<String>, params: Vec<Param>) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }
}

/// The plugin application and module a command is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Application identifier (`appGUID` on the wire).
    pub app_guid: String,
    /// Module name (`moduleName` on the wire).
    pub module_name: String,
}

impl Target {
    /// Create a target.
    pub fn new(app_guid: impl Into<String>, module_name: impl Into<String>) -> Self {
        Self {
            app_guid: app_guid.into(),
            module_name: module_name.into(),
        }
    }
}

/// Which of the two catalog routes a command takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// Device configuration and power commands.
    Device,
    /// Client certificate management.
    Certificate,
}

/// Where a module should be checked for server identity.
///
/// Deployed modules present self-signed certificates, so the default accepts any
/// certificate. The channel then provides confidentiality and (optionally) client
/// authentication, but no assurance about which module answered.
#[derive(Clone, Default)]
pub enum ServerTrust {
    /// Do not verify the server certificate or host name.
    #[default]
    AcceptAny,
    /// Verify the server certificate against this PEM CA bundle.
    CaPem(Vec<u8>),
}

impl fmt::Debug for ServerTrust {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerTrust::AcceptAny => f.write_str("AcceptAny"),
            ServerTrust::CaPem(pem) => f
                .debug_struct("CaPem")
                .field("pem_len", &pem.len())
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_without_params_omits_field() {
        let json = serde_json::to_string(&Command::new("getDeviceInfo")).expect("serialize");
        assert_eq!(json, r#"{"name":"getDeviceInfo"}"#);
    }

    #[test]
    fn long_param_values_are_not_dumped_by_debug() {
        let param = Param::new("publicpem", "A".repeat(500));
        let dbg = format!("{param:?}");
        assert!(dbg.contains("value_len: 500"));
        assert!(!dbg.contains("AAAA"));
    }
}
