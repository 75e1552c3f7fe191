//! A collector behind rustls that only accepts clients presenting a
//! certificate issued by the test CA.

#![allow(dead_code)]

use std::io::BufReader;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use rustls::pki_types::CertificateDer;
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig, ServerConnection, StreamOwned};

use super::{serve, Captured, State};

pub const CA: &str = include_str!("../fixtures/ca.pem");
pub const OTHER_CA: &str = include_str!("../fixtures/other_ca.pem");
pub const CLIENT_CERT: &str = include_str!("../fixtures/client.pem");
pub const CLIENT_KEY: &str = include_str!("../fixtures/client.key");
const SERVER_CERT: &str = include_str!("../fixtures/server.pem");
const SERVER_KEY: &str = include_str!("../fixtures/server.key");

pub struct TlsCollector {
    addr: SocketAddr,
    state: Arc<State>,
    /// Leaf certificate (DER) presented by each client that completed a
    /// handshake.
    peers: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl TlsCollector {
    pub fn start() -> Self {
        let config = Arc::new(server_config());
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(State::default());
        let peers = Arc::new(Mutex::new(Vec::new()));

        let (accept_state, accept_peers) = (state.clone(), peers.clone());
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let config = config.clone();
                let state = accept_state.clone();
                let peers = accept_peers.clone();
                thread::spawn(move || handle(stream, config, &state, &peers));
            }
        });

        Self { addr, state, peers }
    }

    pub fn url(&self, path: &str) -> String {
        format!("https://{}{}", self.addr, path)
    }

    pub fn requests(&self) -> Vec<Captured> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn client_certificates(&self) -> Vec<Vec<u8>> {
        self.peers.lock().unwrap().clone()
    }
}

pub fn pem_certs(pem: &str) -> Vec<CertificateDer<'static>> {
    rustls_pemfile::certs(&mut BufReader::new(pem.as_bytes()))
        .collect::<Result<_, _>>()
        .unwrap()
}

fn server_config() -> ServerConfig {
    let provider = Arc::new(rustls::crypto::ring::default_provider());

    let mut roots = RootCertStore::empty();
    for cert in pem_certs(CA) {
        roots.add(cert).unwrap();
    }
    let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider.clone())
        .build()
        .unwrap();

    let key = rustls_pemfile::private_key(&mut BufReader::new(SERVER_KEY.as_bytes()))
        .unwrap()
        .unwrap();

    ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_client_cert_verifier(verifier)
        .with_single_cert(pem_certs(SERVER_CERT), key)
        .unwrap()
}

fn handle(mut tcp: TcpStream, config: Arc<ServerConfig>, state: &State, peers: &Mutex<Vec<Vec<u8>>>) {
    let mut conn = ServerConnection::new(config).unwrap();
    while conn.is_handshaking() {
        if conn.complete_io(&mut tcp).is_err() {
            return;
        }
    }

    if let Some(leaf) = conn.peer_certificates().and_then(|chain| chain.first()) {
        peers.lock().unwrap().push(leaf.as_ref().to_vec());
    }

    serve(StreamOwned::new(conn, tcp), state, Duration::ZERO);
}
