// Per-request state machine: CONNECTING -> TLS_HANDSHAKE -> WRITING ->
// READING_HEADERS -> READING_BODY -> DONE, plus terminal ERROR (spec §4.4).
// Each `Request` exclusively owns its socket and TLS session until it
// reaches DONE or ERROR, at which point the owning `AsyncHttpsClient`
// deregisters and drops it (spec §3 "Ownership").

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::sync::Arc;

use mio::event::Event;
use mio::net::TcpStream;
use mio::Interest;
use rustls::{ClientConnection, RootCertStore};

use crate::errors::RequestState;

use super::chunked::ChunkedDecoder;
use super::response::{HttpError, Response, Slot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    Connecting,
    TlsHandshake,
    Writing,
    ReadingHeaders,
    ReadingBody,
    Done,
    Error,
}

impl Stage {
    fn as_request_state(self) -> RequestState {
        match self {
            Stage::Connecting => RequestState::Connecting,
            Stage::TlsHandshake => RequestState::TlsHandshake,
            Stage::Writing => RequestState::Writing,
            Stage::ReadingHeaders => RequestState::ReadingHeaders,
            Stage::ReadingBody | Stage::Done | Stage::Error => RequestState::ReadingBody,
        }
    }
}

pub(crate) struct Request {
    stage: Stage,
    stream: TcpStream,
    tls: ClientConnection,
    out_buf: Vec<u8>,
    out_written: usize,
    header_buf: Vec<u8>,
    status: Option<u16>,
    headers: HashMap<String, String>,
    body: Vec<u8>,
    content_length: Option<usize>,
    chunked: bool,
    chunked_decoder: ChunkedDecoder,
    close_framed: bool,
    peer_closed: bool,
    slot: Slot,
}

/// Builds the process-wide TLS context once (spec §5 "Shared resources":
/// "The TLS context is process-wide and set up once at program start").
pub(crate) fn build_tls_config() -> Arc<rustls::ClientConfig> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    Arc::new(
        rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth(),
    )
}

impl Request {
    pub(crate) fn new(
        tls_config: Arc<rustls::ClientConfig>,
        stream: TcpStream,
        host: &str,
        path: &str,
        body: &[u8],
        headers: &[(String, String)],
        slot: Slot,
    ) -> Result<Self, String> {
        let server_name = rustls_pki_types::ServerName::try_from(host.to_string())
            .map_err(|e| format!("invalid server name {host:?}: {e}"))?;
        let tls = ClientConnection::new(tls_config, server_name)
            .map_err(|e| format!("tls session init failed: {e}"))?;

        let out_buf = format_request(host, path, body, headers);

        Ok(Self {
            stage: Stage::Connecting,
            stream,
            tls,
            out_buf,
            out_written: 0,
            header_buf: Vec::new(),
            status: None,
            headers: HashMap::new(),
            body: Vec::new(),
            content_length: None,
            chunked: false,
            chunked_decoder: ChunkedDecoder::new(),
            close_framed: false,
            peer_closed: false,
            slot,
        })
    }

    pub(crate) fn is_finished(&self) -> bool {
        matches!(self.stage, Stage::Done | Stage::Error)
    }

    pub(crate) fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    pub(crate) fn interest(&self) -> Interest {
        match self.stage {
            Stage::Connecting => Interest::WRITABLE,
            Stage::Done | Stage::Error => Interest::READABLE,
            _ => {
                let read = self.tls.wants_read();
                let write = self.tls.wants_write() || self.stage == Stage::Writing;
                match (read, write) {
                    (true, true) => Interest::READABLE | Interest::WRITABLE,
                    (true, false) => Interest::READABLE,
                    (false, true) => Interest::WRITABLE,
                    (false, false) => Interest::READABLE,
                }
            }
        }
    }

    pub(crate) fn ready(&mut self, event: &Event) {
        if self.stage == Stage::Connecting {
            if !event.is_writable() {
                return;
            }
            match self.stream.take_error() {
                Ok(None) => self.stage = Stage::TlsHandshake,
                Ok(Some(e)) => return self.fail(e.to_string()),
                Err(e) => return self.fail(e.to_string()),
            }
        }

        if event.is_readable() {
            if let Err(e) = self.do_read() {
                return self.fail(e.to_string());
            }
        }
        if self.stage == Stage::TlsHandshake && !self.tls.is_handshaking() {
            self.stage = Stage::Writing;
        }
        if event.is_writable() || self.stage == Stage::Writing {
            if let Err(e) = self.do_write() {
                return self.fail(e.to_string());
            }
        }
        if self.stage == Stage::TlsHandshake && !self.tls.is_handshaking() {
            self.stage = Stage::Writing;
        }

        if self.stage == Stage::Done {
            self.finish_success();
        }
    }

    fn do_read(&mut self) -> io::Result<()> {
        loop {
            match self.tls.read_tls(&mut self.stream) {
                Ok(0) => {
                    self.peer_closed = true;
                    break;
                }
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e),
            }
        }

        if let Err(e) = self.tls.process_new_packets() {
            return Err(io::Error::new(io::ErrorKind::InvalidData, e));
        }

        let mut plaintext = Vec::new();
        match self.tls.reader().read_to_end(&mut plaintext) {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => return Err(e),
        }
        if !plaintext.is_empty() {
            self.on_plaintext(&plaintext);
        }

        if self.peer_closed && self.stage == Stage::ReadingBody && self.close_framed {
            self.stage = Stage::Done;
        }
        Ok(())
    }

    fn do_write(&mut self) -> io::Result<()> {
        if self.stage == Stage::Writing && self.out_written < self.out_buf.len() {
            match self.tls.writer().write(&self.out_buf[self.out_written..]) {
                Ok(n) => {
                    self.out_written += n;
                    if self.out_written == self.out_buf.len() {
                        self.stage = Stage::ReadingHeaders;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(e),
            }
        }
        while self.tls.wants_write() {
            match self.tls.write_tls(&mut self.stream) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn on_plaintext(&mut self, data: &[u8]) {
        if self.stage == Stage::ReadingHeaders {
            self.header_buf.extend_from_slice(data);
            if let Some(pos) = find_double_crlf(&self.header_buf) {
                let head = self.header_buf[..pos].to_vec();
                let spill = self.header_buf[pos + 4..].to_vec();
                self.parse_headers(&head);
                if self.content_length == Some(0) {
                    self.stage = Stage::Done;
                    return;
                }
                self.stage = Stage::ReadingBody;
                if !spill.is_empty() {
                    self.consume_body(&spill);
                }
            }
            return;
        }
        if self.stage == Stage::ReadingBody {
            self.consume_body(data);
        }
    }

    fn consume_body(&mut self, data: &[u8]) {
        if self.chunked {
            match self.chunked_decoder.feed(data, &mut self.body) {
                Ok(true) => self.stage = Stage::Done,
                Ok(false) => {}
                Err(e) => self.fail(e.to_string()),
            }
            return;
        }
        if let Some(len) = self.content_length {
            self.body.extend_from_slice(data);
            if self.body.len() >= len {
                self.body.truncate(len);
                self.stage = Stage::Done;
            }
            return;
        }
        self.body.extend_from_slice(data);
    }

    fn parse_headers(&mut self, head: &[u8]) {
        let text = String::from_utf8_lossy(head);
        let mut lines = text.split("\r\n");
        if let Some(status_line) = lines.next() {
            self.status = status_line.split_whitespace().nth(1).and_then(|c| c.parse().ok());
        }
        for line in lines {
            if let Some((k, v)) = line.split_once(':') {
                self.headers.insert(k.trim().to_ascii_lowercase(), v.trim().to_string());
            }
        }
        self.chunked = self
            .headers
            .get("transfer-encoding")
            .map(|v| v.eq_ignore_ascii_case("chunked"))
            .unwrap_or(false);
        self.content_length = self.headers.get("content-length").and_then(|v| v.parse().ok());
        self.close_framed = !self.chunked && self.content_length.is_none();
    }

    fn fail(&mut self, detail: String) {
        self.stage = Stage::Error;
        *self.slot.borrow_mut() = Some(Err(HttpError { state: Stage::Error.as_request_state(), detail }));
    }

    fn finish_success(&mut self) {
        if self.slot.borrow().is_some() {
            return;
        }
        let response = Response {
            status: self.status.unwrap_or(0),
            headers: std::mem::take(&mut self.headers),
            body: std::mem::take(&mut self.body),
        };
        *self.slot.borrow_mut() = Some(Ok(response));
    }
}

fn find_double_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn format_request(host: &str, path: &str, body: &[u8], headers: &[(String, String)]) -> Vec<u8> {
    let mut out = format!(
        "POST {path} HTTP/1.1\r\nHost: {host}\r\nContent-Length: {}\r\nConnection: close\r\n",
        body.len()
    );
    for (k, v) in headers {
        out.push_str(k);
        out.push_str(": ");
        out.push_str(v);
        out.push_str("\r\n");
    }
    out.push_str("\r\n");
    let mut bytes = out.into_bytes();
    bytes.extend_from_slice(body);
    bytes
}
