use core::fmt;
use core::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rustls::ClientConfig;

use crate::commands::{
    CERTIFICATE_APP_GUID, CERTIFICATE_MODULE, DEVICE_APP_GUID, DEVICE_MODULE, DeviceCommand,
};
use crate::error::Result;
use crate::exchange::{Exchange, Timeouts};
use crate::format::result_pairs;
use crate::protocol::{RequestEnvelope, ResultEnvelope, build_envelope};
use crate::tls::{ClientIdentity, SecretBytes, client_config};
use crate::transport::FrameTransport;
use crate::transport::websocket::{WsTransport, check_scheme};
use crate::types::{Route, ServerTrust, Target};

/// Default bound on connection setup (DNS, TCP, TLS and the HTTP upgrade).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A client for one OOB module.
///
/// Every call opens its own connection, runs exactly one exchange and closes it. Cloning
/// is cheap; clones share the TLS context.
#[derive(Clone)]
pub struct Client {
    uri: String,
    tls: Arc<ClientConfig>,
    verifies_server: bool,
    timeouts: Timeouts,
    connect_timeout: Duration,
    device_target: Target,
    certificate_target: Target,
}

/// Builder for [`Client`].
#[derive(Debug)]
pub struct ClientBuilder {
    uri: String,
    cert_pem: Option<Vec<u8>>,
    key_pem: Option<SecretBytes>,
    server_trust: ServerTrust,
    timeouts: Timeouts,
    connect_timeout: Duration,
    device_target: Target,
    certificate_target: Target,
}

impl ClientBuilder {
    /// Create a new builder for the module at `uri` (`wss://host:port`).
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            cert_pem: None,
            key_pem: None,
            server_trust: ServerTrust::default(),
            timeouts: Timeouts::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            device_target: Target::new(DEVICE_APP_GUID, DEVICE_MODULE),
            certificate_target: Target::new(CERTIFICATE_APP_GUID, CERTIFICATE_MODULE),
        }
    }

    /// Set the client certificate chain (PEM) presented for mutual TLS.
    ///
    /// Must be paired with [`Self::client_key_pem`].
    pub fn client_cert_pem(mut self, pem: impl Into<Vec<u8>>) -> Self {
        self.cert_pem = Some(pem.into());
        self
    }

    /// Set the private key (PEM) matching the client certificate.
    pub fn client_key_pem(mut self, pem: impl Into<Vec<u8>>) -> Self {
        self.key_pem = Some(SecretBytes::new(pem.into()));
        self
    }

    /// Choose how the module's certificate is checked. Defaults to [`ServerTrust::AcceptAny`].
    pub fn server_trust(mut self, trust: ServerTrust) -> Self {
        self.server_trust = trust;
        self
    }

    /// Set the wait for the acknowledgment frame.
    pub fn ack_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.ack = timeout;
        self
    }

    /// Set the wait for the result frame.
    pub fn result_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.result = timeout;
        self
    }

    /// Set the bound on connection setup.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Address commands of `route` to a different application/module pair.
    ///
    /// Useful for modules provisioned with non-default plugin identifiers.
    pub fn target(mut self, route: Route, target: Target) -> Self {
        match route {
            Route::Device => self.device_target = target,
            Route::Certificate => self.certificate_target = target,
        }
        self
    }

    /// Validate the settings and build the [`Client`].
    ///
    /// No connection is made here.
    pub fn build(self) -> Result<Client> {
        check_scheme(&self.uri)?;
        let identity = ClientIdentity::pair(self.cert_pem, self.key_pem)?;
        let tls = client_config(identity.as_ref(), &self.server_trust)?;

        Ok(Client {
            uri: self.uri,
            tls,
            verifies_server: matches!(self.server_trust, ServerTrust::CaPem(_)),
            timeouts: self.timeouts,
            connect_timeout: self.connect_timeout,
            device_target: self.device_target,
            certificate_target: self.certificate_target,
        })
    }
}

impl Client {
    /// Create a [`ClientBuilder`].
    pub fn builder(uri: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(uri)
    }

    /// Module URI.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Reply timeouts in effect.
    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    /// Application/module pair that commands of `route` are sent to.
    pub fn target(&self, route: Route) -> &Target {
        match route {
            Route::Device => &self.device_target,
            Route::Certificate => &self.certificate_target,
        }
    }

    /// Wrap `command` in a fresh request envelope addressed by its route.
    pub fn envelope(&self, command: &DeviceCommand) -> RequestEnvelope {
        let target = self.target(command.route());
        build_envelope(target, command.command().clone(), NonZeroU32::MIN)
    }

    /// Connect, run one exchange for `command` and return the result frame.
    pub async fn execute(&self, command: &DeviceCommand) -> Result<ResultEnvelope> {
        if !self.verifies_server && self.uri.starts_with("wss") {
            crate::observe::insecure_server_trust(&self.uri);
        }

        let started = Instant::now();
        let connected =
            WsTransport::connect(&self.uri, Arc::clone(&self.tls), self.connect_timeout).await;
        let outcome = match connected {
            Ok(transport) => self.exchange(transport, command).await,
            Err(e) => Err(e),
        };
        record(command, started.elapsed(), &outcome);
        outcome
    }

    /// Run one exchange for `command` over a caller-supplied transport.
    ///
    /// The transport is closed when the exchange ends.
    pub async fn execute_on<T: FrameTransport>(
        &self,
        transport: T,
        command: &DeviceCommand,
    ) -> Result<ResultEnvelope> {
        let started = Instant::now();
        let outcome = self.exchange(transport, command).await;
        record(command, started.elapsed(), &outcome);
        outcome
    }

    /// [`Self::execute`], flattened to the result's key/value pairs.
    pub async fn run(&self, command: &DeviceCommand) -> Result<Vec<(String, String)>> {
        let result = self.execute(command).await?;
        Ok(result_pairs(&result))
    }

    async fn exchange<T: FrameTransport>(
        &self,
        transport: T,
        command: &DeviceCommand,
    ) -> Result<ResultEnvelope> {
        let envelope = self.envelope(command);
        Exchange::new(transport, self.timeouts).run(&envelope).await
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("uri", &self.uri)
            .field("verifies_server", &self.verifies_server)
            .field("timeouts", &self.timeouts)
            .field("connect_timeout", &self.connect_timeout)
            .field("device_target", &self.device_target)
            .field("certificate_target", &self.certificate_target)
            .finish_non_exhaustive()
    }
}

fn record(command: &DeviceCommand, elapsed: Duration, outcome: &Result<ResultEnvelope>) {
    let name = command.kind().name();
    match outcome {
        Ok(result) => crate::observe::record_ok(name, elapsed, result_pairs(result).len()),
        Err(e) => crate::observe::record_err(name, elapsed, e),
    }
}
