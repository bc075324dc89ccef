use core::fmt;
use core::str::FromStr;
use std::path::Path;

use crate::device_config::parse_assignments;
use crate::error::{Error, Result};
use crate::types::{Command, Param, Route};

/// Plugin application that handles device configuration and power commands.
pub const DEVICE_APP_GUID: &str = "bdc88ee7-f98b-46e9-9ea4-7fe3c69775a8";
/// Module that handles device configuration and power commands.
pub const DEVICE_MODULE: &str = "IPBased_NXODMDEMO2";

/// Placeholder application for client certificate updates.
///
/// No deployed value is known for this pair. Point the certificate route at the real
/// module with [`ClientBuilder::target`](crate::ClientBuilder::target) or the
/// `--cert-app-guid`/`--cert-module` options of `nxoobctl`.
pub const CERTIFICATE_APP_GUID: &str = "5d0c9e3a-6b1f-4f7e-8a2d-c41e7b90f3d6";
/// Placeholder module for client certificate updates. See [`CERTIFICATE_APP_GUID`].
pub const CERTIFICATE_MODULE: &str = "IPBased_NXOOBCERT";

/// Static description of a catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandDescriptor {
    /// Name used on the command line.
    pub name: &'static str,
    /// One-line description for help output.
    pub summary: &'static str,
    /// Which target (application + module) receives the command.
    pub route: Route,
    /// Whether the command needs an argument.
    pub requires_argument: bool,
    /// What the argument is, for error messages and help output.
    pub argument_hint: &'static str,
}

/// The fixed command catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// `get_config`: read the module configuration.
    GetConfig,
    /// `set_config`: change configuration values.
    SetConfig,
    /// `reboot`: pulse the host reset line.
    Reboot,
    /// `set_certificate`: install a client certificate.
    SetCertificate,
}

impl CommandKind {
    /// Every catalog entry.
    pub const ALL: [CommandKind; 4] = [
        CommandKind::GetConfig,
        CommandKind::SetConfig,
        CommandKind::Reboot,
        CommandKind::SetCertificate,
    ];

    /// Descriptor for this entry.
    pub fn descriptor(self) -> &'static CommandDescriptor {
        const GET_CONFIG: CommandDescriptor = CommandDescriptor {
            name: "get_config",
            summary: "Get target configuration",
            route: Route::Device,
            requires_argument: false,
            argument_hint: "",
        };
        const SET_CONFIG: CommandDescriptor = CommandDescriptor {
            name: "set_config",
            summary: "Set target configuration",
            route: Route::Device,
            requires_argument: true,
            argument_hint: "key=value[,key=value...]",
        };
        const REBOOT: CommandDescriptor = CommandDescriptor {
            name: "reboot",
            summary: "Reboot target system",
            route: Route::Device,
            requires_argument: false,
            argument_hint: "",
        };
        const SET_CERTIFICATE: CommandDescriptor = CommandDescriptor {
            name: "set_certificate",
            summary: "Install client certificate",
            route: Route::Certificate,
            requires_argument: true,
            argument_hint: "path to a PEM certificate",
        };

        match self {
            CommandKind::GetConfig => &GET_CONFIG,
            CommandKind::SetConfig => &SET_CONFIG,
            CommandKind::Reboot => &REBOOT,
            CommandKind::SetCertificate => &SET_CERTIFICATE,
        }
    }

    /// Name used on the command line.
    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    /// Build the command body.
    ///
    /// `set_config` validates its argument; `set_certificate` reads the file its argument
    /// names. Commands that take no argument ignore one if given.
    pub fn build(self, argument: Option<&str>) -> Result<DeviceCommand> {
        match self {
            CommandKind::GetConfig => {
                self.ignore_argument(argument);
                Ok(DeviceCommand::get_config())
            }
            CommandKind::Reboot => {
                self.ignore_argument(argument);
                Ok(DeviceCommand::reboot())
            }
            CommandKind::SetConfig => DeviceCommand::set_config(self.require_argument(argument)?),
            CommandKind::SetCertificate => {
                DeviceCommand::set_certificate_file(self.require_argument(argument)?)
            }
        }
    }

    fn require_argument(self, argument: Option<&str>) -> Result<&str> {
        let descriptor = self.descriptor();
        argument.ok_or(Error::MissingArgument {
            command: descriptor.name,
            expected: descriptor.argument_hint,
        })
    }

    fn ignore_argument(self, argument: Option<&str>) {
        if argument.is_some() {
            crate::debug::note(self.name(), "argument ignored");
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CommandKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        CommandKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| Error::UnsupportedCommand(s.to_string()))
    }
}

/// A catalog command with its body, ready to be wrapped in an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCommand {
    kind: CommandKind,
    command: Command,
}

impl DeviceCommand {
    /// `getDeviceInfo`.
    pub fn get_config() -> Self {
        Self {
            kind: CommandKind::GetConfig,
            command: Command::new("getDeviceInfo"),
        }
    }

    /// `rebootHost` with a 1000 ms reset pulse.
    pub fn reboot() -> Self {
        Self {
            kind: CommandKind::Reboot,
            command: Command::with_params(
                "rebootHost",
                vec![Param::new("highPulseDurationReset", "1000")],
            ),
        }
    }

    /// `deviceConfig` with the validated pairs of `argument`.
    pub fn set_config(argument: &str) -> Result<Self> {
        let params = parse_assignments(argument)?;
        Ok(Self {
            kind: CommandKind::SetConfig,
            command: Command::with_params("deviceConfig", params),
        })
    }

    /// `UpdateClientCert` carrying `pem` verbatim.
    pub fn set_certificate_pem(pem: impl Into<String>) -> Self {
        Self {
            kind: CommandKind::SetCertificate,
            command: Command::with_params("UpdateClientCert", vec![Param::new("publicpem", pem)]),
        }
    }

    /// `UpdateClientCert` carrying the text of the file at `path`.
    pub fn set_certificate_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let pem = std::fs::read_to_string(path).map_err(|e| Error::file(path, e))?;
        Ok(Self::set_certificate_pem(pem))
    }

    /// Catalog entry this command was built from.
    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    /// Target route for this command.
    pub fn route(&self) -> Route {
        self.kind.descriptor().route
    }

    /// The command body.
    pub fn command(&self) -> &Command {
        &self.command
    }

    /// Consume and return the command body.
    pub fn into_command(self) -> Command {
        self.command
    }
}
