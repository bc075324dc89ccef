use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use rcgen::{
    BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair,
};
use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use nxoob::{Client, CommandKind, Error, ServerTrust};

const ACCEPTED: &str = r#"{"params":{"commandState":"ACCEPTED"}}"#;
const RESULT: &str = r#"{"params":{"commandAcks":[{"result":{"fwVersion":"1.0.1-20201103-NXOOB"}}]}}"#;

struct Issued {
    cert: rcgen::Certificate,
    key: KeyPair,
}

/// A test CA with one server and one client certificate issued from it.
struct Pki {
    ca: rcgen::Certificate,
    server: Issued,
    client: Issued,
}

impl Pki {
    fn generate() -> Self {
        let ca_key = KeyPair::generate().expect("ca key");
        let mut params = CertificateParams::new(Vec::<String>::new()).expect("ca params");
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params
            .distinguished_name
            .push(DnType::CommonName, "nxoob test ca");
        let ca = params.self_signed(&ca_key).expect("ca cert");

        let server = issue(&ca, &ca_key, "127.0.0.1", ExtendedKeyUsagePurpose::ServerAuth);
        let client = issue(&ca, &ca_key, "nxoob-client", ExtendedKeyUsagePurpose::ClientAuth);
        Self { ca, server, client }
    }
}

fn issue(
    ca: &rcgen::Certificate,
    ca_key: &KeyPair,
    name: &str,
    usage: ExtendedKeyUsagePurpose,
) -> Issued {
    let key = KeyPair::generate().expect("key");
    let mut params = CertificateParams::new(vec![name.to_string()]).expect("params");
    params.distinguished_name.push(DnType::CommonName, name);
    params.extended_key_usages = vec![usage];
    let cert = params.signed_by(&key, ca, ca_key).expect("sign");
    Issued { cert, key }
}

/// Server side: present the issued server certificate and ask for (but do not
/// require) a client certificate from the same CA.
fn server_config(pki: &Pki) -> Arc<ServerConfig> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());

    let mut client_roots = RootCertStore::empty();
    client_roots.add(pki.ca.der().clone()).expect("client root");
    let verifier =
        WebPkiClientVerifier::builder_with_provider(Arc::new(client_roots), Arc::clone(&provider))
            .allow_unauthenticated()
            .build()
            .expect("client verifier");

    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(pki.server.key.serialize_der()));
    let config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .expect("protocol versions")
        .with_client_cert_verifier(verifier)
        .with_single_cert(vec![pki.server.cert.der().clone()], key)
        .expect("server certificate");
    Arc::new(config)
}

/// Serve one TLS WebSocket connection.
///
/// Resolves to `None` when the handshake fails, else whether the client
/// presented a certificate.
async fn serve_tls_once(config: Arc<ServerConfig>) -> (SocketAddr, JoinHandle<Option<bool>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let tls = match TlsAcceptor::from(config).accept(stream).await {
            Ok(tls) => tls,
            Err(_) => return None,
        };
        let presented = tls
            .get_ref()
            .1
            .peer_certificates()
            .is_some_and(|certs| !certs.is_empty());

        let mut ws = match accept_async(tls).await {
            Ok(ws) => ws,
            Err(_) => return None,
        };
        match ws.next().await {
            Some(Ok(Message::Text(_))) => {}
            other => panic!("expected a text request, got {other:?}"),
        }
        for reply in [ACCEPTED, RESULT] {
            ws.send(Message::Text(reply.to_string()))
                .await
                .expect("send");
        }
        while let Some(Ok(message)) = ws.next().await {
            if message.is_close() {
                break;
            }
        }
        Some(presented)
    });

    (addr, handle)
}

fn fw_version() -> Vec<(String, String)> {
    vec![(
        "fwVersion".to_string(),
        "1.0.1-20201103-NXOOB".to_string(),
    )]
}

#[tokio::test]
async fn accept_any_connects_to_self_issued_server() {
    let pki = Pki::generate();
    let (addr, server) = serve_tls_once(server_config(&pki)).await;

    let client = Client::builder(format!("wss://{addr}"))
        .server_trust(ServerTrust::AcceptAny)
        .build()
        .expect("client");
    let command = CommandKind::GetConfig.build(None).expect("command");
    let pairs = client.run(&command).await.expect("run");

    assert_eq!(pairs, fw_version());
    assert_eq!(server.await.expect("server"), Some(false));
}

#[tokio::test]
async fn client_certificate_reaches_the_server() {
    let pki = Pki::generate();
    let (addr, server) = serve_tls_once(server_config(&pki)).await;

    let client = Client::builder(format!("wss://{addr}"))
        .client_cert_pem(pki.client.cert.pem())
        .client_key_pem(pki.client.key.serialize_pem())
        .build()
        .expect("client");
    let command = CommandKind::GetConfig.build(None).expect("command");
    let pairs = client.run(&command).await.expect("run");

    assert_eq!(pairs, fw_version());
    assert_eq!(server.await.expect("server"), Some(true));
}

#[tokio::test]
async fn issuing_ca_verifies_the_server() {
    let pki = Pki::generate();
    let (addr, server) = serve_tls_once(server_config(&pki)).await;

    let client = Client::builder(format!("wss://{addr}"))
        .server_trust(ServerTrust::CaPem(pki.ca.pem().into_bytes()))
        .client_cert_pem(pki.client.cert.pem())
        .client_key_pem(pki.client.key.serialize_pem())
        .build()
        .expect("client");
    let command = CommandKind::GetConfig.build(None).expect("command");
    let pairs = client.run(&command).await.expect("run");

    assert_eq!(pairs, fw_version());
    assert_eq!(server.await.expect("server"), Some(true));
}

#[tokio::test]
async fn unrelated_ca_is_a_connection_error() {
    let pki = Pki::generate();
    let (addr, server) = serve_tls_once(server_config(&pki)).await;

    let unrelated = Pki::generate();
    let client = Client::builder(format!("wss://{addr}"))
        .server_trust(ServerTrust::CaPem(unrelated.ca.pem().into_bytes()))
        .build()
        .expect("client");
    let command = CommandKind::GetConfig.build(None).expect("command");
    let err = client.run(&command).await.expect_err("untrusted server");

    assert!(matches!(err, Error::Connection(_)), "got {err:?}");
    assert_eq!(server.await.expect("server"), None);
}
