use thiserror::Error;

/// Errors raised while talking to the note app's local API
#[derive(Error, Debug)]
pub enum LogseqError {
    #[error("Request to {method} failed: {source}")]
    Transport {
        method: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("{method} returned HTTP {status}: {body}")]
    Status {
        method: String,
        status: u16,
        body: String,
    },

    #[error("{method} returned an empty result for {arg}")]
    Empty { method: String, arg: String },

    #[error("Failed to decode {method} response: {source}")]
    Decode {
        method: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Embed nesting exceeded {0} levels at block {1}")]
    EmbedDepthExceeded(usize, String),
}

pub type Result<T> = std::result::Result<T, LogseqError>;
