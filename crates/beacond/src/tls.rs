//! Inbound TLS sockets for the app server.
//!
//! The generic accept loop never builds sockets itself; it asks an
//! [`InboundSocketFactory`]. The adapter here pins the authentication policy
//! (server mode, no client certificate requested) and leaves versions,
//! suites and key material to rustls and the node's [`TlsIdentity`].

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::{ServerConfig, ServerConnection, StreamOwned};
use socket2::{Domain, Protocol, Socket, Type};

use beacon_core::crypto::TlsIdentity;

pub type TlsStream = StreamOwned<ServerConnection, TcpStream>;

/// Produces listening sockets for inbound TLS connections.
pub trait InboundSocketFactory: Send + Sync {
    fn create_inbound_tls_socket(&self) -> io::Result<TlsListenerSocket>;
}

/// A bound TCP listener plus the server-side TLS policy for its connections.
pub struct TlsListenerSocket {
    listener: TcpListener,
    config: Arc<ServerConfig>,
}

impl TlsListenerSocket {
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept one TCP connection and wrap it in a server-mode TLS session.
    ///
    /// The handshake is not driven here; see [`complete_handshake`].
    pub fn accept(&self) -> io::Result<(TlsStream, SocketAddr)> {
        let (tcp, peer) = self.listener.accept()?;
        let conn = ServerConnection::new(self.config.clone()).map_err(io::Error::other)?;
        Ok((StreamOwned::new(conn, tcp), peer))
    }
}

/// Drive `stream` until the TLS handshake is done.
pub fn complete_handshake(stream: &mut TlsStream) -> io::Result<()> {
    while stream.conn.is_handshaking() {
        stream.conn.complete_io(&mut stream.sock)?;
    }
    Ok(())
}

/// The app server's socket factory.
pub struct TlsListenerSocketAdapter {
    bind: SocketAddr,
    config: Arc<ServerConfig>,
}

impl TlsListenerSocketAdapter {
    /// Build the server policy for `identity`. Fails if rustls rejects the
    /// certificate or key.
    pub fn new(bind: SocketAddr, identity: &TlsIdentity) -> io::Result<Self> {
        let cert_chain = vec![CertificateDer::from(identity.cert_der().to_vec())];
        let private_key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(identity.key_der().to_vec()));

        let config = ServerConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?
        .with_no_client_auth()
        .with_single_cert(cert_chain, private_key)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        Ok(Self {
            bind,
            config: Arc::new(config),
        })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        self.bind
    }
}

impl InboundSocketFactory for TlsListenerSocketAdapter {
    fn create_inbound_tls_socket(&self) -> io::Result<TlsListenerSocket> {
        let socket = Socket::new(Domain::for_address(self.bind), Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&self.bind.into())?;
        socket.listen(128)?;

        Ok(TlsListenerSocket {
            listener: socket.into(),
            config: self.config.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
    use rustls::pki_types::{ServerName, UnixTime};
    use rustls::{ClientConfig, ClientConnection, DigitallySignedStruct, SignatureScheme};

    #[derive(Debug)]
    struct AcceptAnyServerCert;

    impl ServerCertVerifier for AcceptAnyServerCert {
        fn verify_server_cert(
            &self,
            _end_entity: &CertificateDer<'_>,
            _intermediates: &[CertificateDer<'_>],
            _server_name: &ServerName<'_>,
            _ocsp_response: &[u8],
            _now: UnixTime,
        ) -> Result<ServerCertVerified, rustls::Error> {
            Ok(ServerCertVerified::assertion())
        }

        fn verify_tls12_signature(
            &self,
            _message: &[u8],
            _cert: &CertificateDer<'_>,
            _dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, rustls::Error> {
            Ok(HandshakeSignatureValid::assertion())
        }

        fn verify_tls13_signature(
            &self,
            _message: &[u8],
            _cert: &CertificateDer<'_>,
            _dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, rustls::Error> {
            Ok(HandshakeSignatureValid::assertion())
        }

        fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
            rustls::crypto::ring::default_provider()
                .signature_verification_algorithms
                .supported_schemes()
        }
    }

    fn client_config() -> Arc<ClientConfig> {
        let config = ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .unwrap()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert))
        .with_no_client_auth();
        Arc::new(config)
    }

    fn adapter() -> TlsListenerSocketAdapter {
        let identity = TlsIdentity::self_signed(vec!["localhost".to_string()]).unwrap();
        TlsListenerSocketAdapter::new("127.0.0.1:0".parse().unwrap(), &identity).unwrap()
    }

    #[test]
    fn accepts_client_without_certificate() {
        let socket = adapter().create_inbound_tls_socket().unwrap();
        let addr = socket.local_addr().unwrap();

        let server = std::thread::spawn(move || {
            let (mut stream, _peer) = socket.accept().unwrap();
            complete_handshake(&mut stream).unwrap();
            let mut buf = [0u8; 4];
            stream.read_exact(&mut buf).unwrap();
            (buf, stream.conn.peer_certificates().is_none())
        });

        let conn = ClientConnection::new(client_config(), ServerName::try_from("localhost").unwrap())
            .unwrap();
        let mut client = StreamOwned::new(conn, TcpStream::connect(addr).unwrap());
        client.write_all(b"ping").unwrap();
        client.flush().unwrap();

        let (received, no_client_cert) = server.join().unwrap();
        assert_eq!(&received, b"ping");
        assert!(no_client_cert);
    }

    #[test]
    fn each_call_creates_a_fresh_socket() {
        let adapter = adapter();
        let a = adapter.create_inbound_tls_socket().unwrap();
        let b = adapter.create_inbound_tls_socket().unwrap();
        assert_ne!(a.local_addr().unwrap().port(), b.local_addr().unwrap().port());
    }

    #[test]
    fn bind_failure_is_reported_unmodified() {
        let identity = TlsIdentity::self_signed(vec!["localhost".to_string()]).unwrap();
        // TEST-NET-1 is never assigned to a local interface.
        let adapter =
            TlsListenerSocketAdapter::new("192.0.2.1:0".parse().unwrap(), &identity).unwrap();
        let err = adapter.create_inbound_tls_socket().err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::AddrNotAvailable);
    }
}
