// Error kinds shared across the core pipeline.
//
// `DiffFormat`, `Filesystem`, and `Config` are fatal: they propagate out of
// `Pipeline::run` and abort the process. `Network`, `Tls`, `Protocol`, and
// `ModelResponse` are localized to a single request by the caller (see
// `model_client` and `pipeline`) and never unwind past that boundary.

use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum DiffmuxError {
    #[error("malformed diff at line {line_no}: {detail}")]
    DiffFormat { line_no: usize, detail: String },

    #[error("network error talking to {host}: {detail}")]
    Network { host: String, detail: String },

    #[error("tls error talking to {host}: {detail}")]
    Tls { host: String, detail: String },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("model response missing expected field: {0}")]
    ModelResponse(String),

    #[error("filesystem error writing {path}: {source}")]
    Filesystem {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

/// The state a request had reached when it failed, attached to `ERROR`
/// transitions in the C5 state machine (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Connecting,
    TlsHandshake,
    Writing,
    ReadingHeaders,
    ReadingBody,
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequestState::Connecting => "connecting",
            RequestState::TlsHandshake => "tls_handshake",
            RequestState::Writing => "writing",
            RequestState::ReadingHeaders => "reading_headers",
            RequestState::ReadingBody => "reading_body",
        };
        f.write_str(s)
    }
}
