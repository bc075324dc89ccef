use core::fmt;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use zeroize::Zeroize;

use crate::error::{Error, Result};
use crate::types::ServerTrust;

/// A minimal secret container that zeroizes its contents on drop.
///
/// Holds private key PEM text between loading and TLS context construction, and never
/// shows it via `Debug`.
#[derive(Clone)]
pub(crate) struct SecretBytes(Vec<u8>);

impl SecretBytes {
    pub(crate) fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub(crate) fn expose(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<secret>")
    }
}

impl Drop for SecretBytes {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Client certificate chain and private key, both PEM.
#[derive(Debug, Clone)]
pub(crate) struct ClientIdentity {
    pub(crate) cert_pem: Vec<u8>,
    pub(crate) key_pem: SecretBytes,
}

impl ClientIdentity {
    /// Pair up optional halves. Both or neither must be present.
    pub(crate) fn pair(
        cert_pem: Option<Vec<u8>>,
        key_pem: Option<SecretBytes>,
    ) -> Result<Option<Self>> {
        match (cert_pem, key_pem) {
            (Some(cert_pem), Some(key_pem)) => Ok(Some(Self { cert_pem, key_pem })),
            (None, None) => Ok(None),
            (Some(_), None) => Err(Error::IncompleteCredential(
                "client certificate given without a private key",
            )),
            (None, Some(_)) => Err(Error::IncompleteCredential(
                "private key given without a client certificate",
            )),
        }
    }

    fn cert_chain(&self) -> Result<Vec<CertificateDer<'static>>> {
        parse_certificates(&self.cert_pem, "client certificate")
    }

    fn private_key(&self) -> Result<PrivateKeyDer<'static>> {
        rustls_pemfile::private_key(&mut self.key_pem.expose())
            .map_err(|e| Error::Credential(format!("failed to parse private key: {e}")))?
            .ok_or_else(|| Error::Credential("no private key found in key PEM".to_string()))
    }
}

fn parse_certificates(pem: &[u8], what: &str) -> Result<Vec<CertificateDer<'static>>> {
    let certs = rustls_pemfile::certs(&mut &pem[..])
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::Credential(format!("failed to parse {what} PEM: {e}")))?;
    if certs.is_empty() {
        return Err(Error::Credential(format!("no certificates found in {what} PEM")));
    }
    Ok(certs)
}

fn root_store(ca_pem: &[u8]) -> Result<RootCertStore> {
    let mut roots = RootCertStore::empty();
    let (added, _ignored) = roots.add_parsable_certificates(parse_certificates(ca_pem, "CA bundle")?);
    if added == 0 {
        return Err(Error::Credential(
            "no valid CA certificates found in CA bundle".to_string(),
        ));
    }
    Ok(roots)
}

/// Build the rustls client context for one connection.
pub(crate) fn client_config(
    identity: Option<&ClientIdentity>,
    trust: &ServerTrust,
) -> Result<Arc<ClientConfig>> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::Credential(format!("tls protocol setup failed: {e}")))?;

    let builder = match trust {
        ServerTrust::AcceptAny => builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert { provider })),
        ServerTrust::CaPem(ca_pem) => builder.with_root_certificates(root_store(ca_pem)?),
    };

    let config = match identity {
        Some(identity) => builder
            .with_client_auth_cert(identity.cert_chain()?, identity.private_key()?)
            .map_err(|e| Error::Credential(format!("invalid client certificate/key pair: {e}")))?,
        None => builder.with_no_client_auth(),
    };

    Ok(Arc::new(config))
}

/// Accepts whatever certificate the module presents.
///
/// Handshake signatures are still checked against the presented certificate, so the
/// session key is bound to it; only the certificate's identity and chain are not.
#[derive(Debug)]
struct AcceptAnyServerCert {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
