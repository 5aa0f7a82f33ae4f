//! Inbound app-server listener.
//!
//! Blocking accept loop on its own thread; each connection completes its TLS
//! handshake on a dedicated thread and is logged. No application protocol
//! runs on top yet.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::tls::{complete_handshake, InboundSocketFactory, TlsListenerSocket, TlsStream};

/// Bind a socket through `factory`. Returns the socket and its address.
pub fn bind(factory: &dyn InboundSocketFactory) -> io::Result<(Arc<TlsListenerSocket>, SocketAddr)> {
    let socket = factory.create_inbound_tls_socket()?;
    let addr = socket.local_addr()?;
    Ok((Arc::new(socket), addr))
}

/// Accept connections forever.
pub fn accept_loop(socket: Arc<TlsListenerSocket>) {
    loop {
        match socket.accept() {
            Ok((stream, peer)) => {
                if let Err(e) = std::thread::Builder::new()
                    .name(format!("app-conn-{peer}"))
                    .spawn(move || handle_connection(stream, peer))
                {
                    tracing::warn!(%peer, error = %e, "failed to spawn connection thread");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "accept failed");
            }
        }
    }
}

fn handle_connection(mut stream: TlsStream, peer: SocketAddr) {
    match complete_handshake(&mut stream) {
        Ok(()) => {
            let version = stream
                .conn
                .protocol_version()
                .map(|v| format!("{v:?}"))
                .unwrap_or_default();
            let suite = stream
                .conn
                .negotiated_cipher_suite()
                .map(|s| format!("{:?}", s.suite()))
                .unwrap_or_default();
            tracing::info!(%peer, %version, %suite, "app client connected");
        }
        Err(e) => {
            tracing::debug!(%peer, error = %e, "tls handshake failed");
        }
    }
}
