/// Errors raised by a synthesis oracle call.
///
/// An oracle error is scoped to one step: the pipeline skips the step and
/// carries on with its siblings.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("no API key: set STEPSMITH_API_KEY or {fallback}")]
    MissingApiKey { fallback: &'static str },

    /// The endpoint answered with a non-success HTTP status.
    #[error("oracle returned HTTP {status}")]
    Status { status: u16 },

    #[error("oracle request timed out: {0}")]
    Timeout(String),

    /// Connection-level failure before any HTTP status was received.
    #[error("oracle transport error: {0}")]
    Transport(String),

    /// The request could not be built or sent (bad URL, invalid header).
    #[error("invalid oracle request: {0}")]
    Request(String),

    #[error("failed to parse oracle response: {0}")]
    Parse(String),

    #[error("oracle response contained no text")]
    EmptyResponse,

    /// A replay file has no recorded response for the request.
    #[error("no recorded response: {0}")]
    NotRecorded(String),

    #[error("replay file error: {0}")]
    ReplayFile(String),

    #[error("all {attempts} attempts failed; last error: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<OracleError>,
    },
}

impl OracleError {
    /// Whether the same request may succeed if sent again: rate limiting,
    /// transient server errors, timeouts and dropped connections.
    pub fn is_retryable(&self) -> bool {
        match self {
            OracleError::Status { status } => matches!(status, 429 | 500 | 502 | 503),
            OracleError::Timeout(_) | OracleError::Transport(_) => true,
            _ => false,
        }
    }
}
