// Single-threaded, event-driven TLS client multiplexing many concurrent
// requests over mio's kernel readiness API (spec §4.4, §5).

use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use mio::{Events, Poll, Token};

use crate::errors::RequestState;

use super::request::{self, Request};
use super::response::{HttpError, ResponseFuture, Slot};

pub struct AsyncHttpsClient {
    poll: Poll,
    requests: HashMap<Token, Request>,
    next_token: usize,
    tls_config: Arc<rustls::ClientConfig>,
    /// Upper bound passed to `Poll::poll`'s timeout; exposed so a caller
    /// needing a liveness bound can set one (spec §5).
    pub poll_timeout: Option<Duration>,
}

impl AsyncHttpsClient {
    pub fn new() -> io::Result<Self> {
        Self::with_tls_config(request::build_tls_config())
    }

    /// Build a client trusting a caller-supplied root set instead of the
    /// webpki bundle, e.g. a self-signed cert in an in-process TLS test
    /// harness (SPEC_FULL "Test tooling").
    pub fn with_tls_config(tls_config: Arc<rustls::ClientConfig>) -> io::Result<Self> {
        Ok(Self {
            poll: Poll::new()?,
            requests: HashMap::new(),
            next_token: 0,
            tls_config,
            poll_timeout: None,
        })
    }

    /// Submit a request; returns immediately with a future fulfilled once
    /// `run_loop` drives it to completion. DNS failure at submit time
    /// rejects the future immediately without registering it (spec §4.4).
    pub fn post_async(
        &mut self,
        host: &str,
        path: &str,
        body: &[u8],
        headers: &[(String, String)],
    ) -> ResponseFuture {
        let slot = Rc::new(RefCell::new(None));
        let future = ResponseFuture { slot: slot.clone() };

        let addr = match (host, 443u16).to_socket_addrs().ok().and_then(|mut a| a.next()) {
            Some(addr) => addr,
            None => {
                *slot.borrow_mut() = Some(Err(HttpError {
                    state: RequestState::Connecting,
                    detail: format!("dns resolution failed for {host}"),
                }));
                return future;
            }
        };

        self.connect(addr, host, path, body, headers, slot, future)
    }

    /// Same as `post_async` but skips DNS resolution and connects straight
    /// to `addr`, using `sni_host` for the TLS ServerName and `Host`
    /// header. Used by the in-process TLS test harness, which binds an
    /// ephemeral loopback port rather than resolving a real hostname.
    #[cfg(test)]
    pub(crate) fn post_async_to(
        &mut self,
        addr: SocketAddr,
        sni_host: &str,
        path: &str,
        body: &[u8],
        headers: &[(String, String)],
    ) -> ResponseFuture {
        let slot = Rc::new(RefCell::new(None));
        let future = ResponseFuture { slot: slot.clone() };
        self.connect(addr, sni_host, path, body, headers, slot, future)
    }

    fn connect(
        &mut self,
        addr: SocketAddr,
        sni_host: &str,
        path: &str,
        body: &[u8],
        headers: &[(String, String)],
        slot: Slot,
        future: ResponseFuture,
    ) -> ResponseFuture {
        let mio_stream = match mio::net::TcpStream::connect(addr) {
            Ok(s) => s,
            Err(e) => {
                *slot.borrow_mut() = Some(Err(HttpError {
                    state: RequestState::Connecting,
                    detail: e.to_string(),
                }));
                return future;
            }
        };

        let request = match Request::new(self.tls_config.clone(), mio_stream, sni_host, path, body, headers, slot.clone()) {
            Ok(r) => r,
            Err(detail) => {
                *slot.borrow_mut() = Some(Err(HttpError { state: RequestState::TlsHandshake, detail }));
                return future;
            }
        };

        let token = Token(self.next_token);
        self.next_token += 1;

        let mut request = request;
        if let Err(e) = self.poll.registry().register(request.stream_mut(), token, request.interest()) {
            *slot.borrow_mut() = Some(Err(HttpError { state: RequestState::Connecting, detail: e.to_string() }));
            return future;
        }

        self.requests.insert(token, request);
        future
    }

    /// Drive the event loop until every in-flight request reaches DONE or
    /// ERROR (spec §4.4). No ordering is guaranteed across requests.
    pub fn run_loop(&mut self) -> io::Result<()> {
        let mut events = Events::with_capacity(128);
        while !self.requests.is_empty() {
            self.poll.poll(&mut events, self.poll_timeout)?;
            let ready_tokens: Vec<Token> = events.iter().map(|e| e.token()).collect();
            for event in events.iter() {
                let token = event.token();
                let Some(request) = self.requests.get_mut(&token) else { continue };
                request.ready(event);
            }
            for token in ready_tokens {
                let Some(request) = self.requests.get_mut(&token) else { continue };
                if request.is_finished() {
                    let mut request = self.requests.remove(&token).unwrap();
                    let _ = self.poll.registry().deregister(request.stream_mut());
                } else {
                    let interest = request.interest();
                    let _ = self.poll.registry().reregister(request.stream_mut(), token, interest);
                }
            }
        }
        Ok(())
    }
}

impl Default for AsyncHttpsClient {
    fn default() -> Self {
        Self::new().expect("failed to create kernel readiness multiplexer")
    }
}

/// An in-process TLS server driven by a self-signed `rcgen` cert, used to
/// exercise the real `mio` + `rustls` event loop end to end for the
/// Content-Length and chunked body-framing scenarios (spec §8 scenarios
/// 2-3; SPEC_FULL "Test tooling").
#[cfg(test)]
mod tls_roundtrip_tests {
    use std::io::Write;
    use std::net::TcpListener;
    use std::sync::Arc;
    use std::thread;

    use rcgen::{generate_simple_self_signed, CertifiedKey};
    use rustls::{RootCertStore, ServerConfig};
    use rustls_pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};

    use super::AsyncHttpsClient;

    fn self_signed_configs() -> (Arc<ServerConfig>, Arc<rustls::ClientConfig>) {
        let CertifiedKey { cert, key_pair } = generate_simple_self_signed(vec!["127.0.0.1".to_string()])
            .expect("self-signed cert generation");
        let cert_der = cert.der().clone();
        let key_der = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));

        let server_config = ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(vec![cert_der.clone()], key_der)
            .expect("server tls config");

        let mut roots = RootCertStore::empty();
        roots.add(cert_der).expect("trust self-signed cert");
        let client_config = rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();

        (Arc::new(server_config), Arc::new(client_config))
    }

    /// Accept exactly one connection, complete the TLS handshake, and
    /// write `response` in a single call — the way a small HTTP response
    /// naturally arrives in one TLS record, which is what makes the
    /// spillover scenario (header + body in one read) reproducible here.
    fn serve_once(listener: TcpListener, server_config: Arc<ServerConfig>, response: Vec<u8>) {
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept incoming test connection");
            let mut conn = rustls::ServerConnection::new(server_config).expect("server tls session");
            let mut tls = rustls::Stream::new(&mut conn, &mut stream);
            tls.write_all(&response).expect("write response");
            tls.flush().expect("flush response");
        });
    }

    #[test]
    fn content_length_response_round_trips_with_spillover() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local_addr");
        let (server_config, client_config) = self_signed_configs();
        serve_once(
            listener,
            server_config,
            b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello".to_vec(),
        );

        let mut client = AsyncHttpsClient::with_tls_config(client_config).expect("client");
        let future = client.post_async_to(addr, "127.0.0.1", "/", b"{}", &[]);
        client.run_loop().expect("run_loop completes");
        let response = future.take().expect("response fulfilled");
        assert_eq!(response.status, 200);
        assert_eq!(response.body, b"hello");
    }

    #[test]
    fn chunked_response_round_trips() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local_addr");
        let (server_config, client_config) = self_signed_configs();
        serve_once(
            listener,
            server_config,
            b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n7\r\n, world\r\n0\r\n\r\n".to_vec(),
        );

        let mut client = AsyncHttpsClient::with_tls_config(client_config).expect("client");
        let future = client.post_async_to(addr, "127.0.0.1", "/", b"{}", &[]);
        client.run_loop().expect("run_loop completes");
        let response = future.take().expect("response fulfilled");
        assert_eq!(response.body, b"hello, world");
    }
}
