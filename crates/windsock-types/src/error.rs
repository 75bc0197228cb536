//! Error types for frame payload parsing.

use thiserror::Error;

/// Errors that can occur when decoding a weather frame payload.
///
/// These are per-message errors: a malformed frame is dropped and the next
/// frame is processed independently, so none of these are fatal to a session.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The frame does not begin with a recognized start marker.
    #[error("frame has no recognized start marker: {0:?}")]
    UnrecognizedFrame(String),

    /// Nothing left after stripping the start/end markers and whitespace.
    #[error("empty payload after stripping frame markers")]
    EmptyPayload,

    /// The legacy payload did not contain enough numeric tokens.
    #[error("legacy payload has {found} token(s), need at least 2")]
    TooFewTokens {
        /// Number of tokens found in the payload.
        found: usize,
    },

    /// A token expected to be a number could not be parsed.
    #[error("invalid numeric token {token:?}")]
    InvalidNumber {
        /// The offending token.
        token: String,
    },
}

/// Result type alias using windsock-types' `ParseError`.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
