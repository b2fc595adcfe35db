use thiserror::Error;

/// A failed fetch of one source. All variants are transient: the poller
/// keeps the last good value and retries on its next tick.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport: {0}")]
    Transport(String),

    #[error("status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("decode: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            FetchError::Decode(e.to_string())
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}
