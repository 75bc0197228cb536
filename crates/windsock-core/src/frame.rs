//! Frame synchronization for the raw station byte stream.
//!
//! The station sends UTF-8 text frames delimited by a start marker (`WS_` for
//! current firmware, `start_` for legacy builds) and the `_end` terminator.
//! Bytes arrive in arbitrary chunk sizes, so this layer accumulates them and
//! carves out complete frames, silently discarding framing junk between them.

/// Modern frame start marker.
pub const START_MODERN: &str = "WS_";
/// Legacy frame start marker.
pub const START_LEGACY: &str = "start_";
/// Frame end marker.
pub const END_MARKER: &str = "_end";

/// Accumulates stream chunks and yields complete marker-delimited frames.
///
/// Frames are emitted in left-to-right order of their end markers. Everything
/// up to and including each matched end marker is discarded from the buffer
/// whether or not a start marker was found, which bounds growth in the face
/// of garbage. A partial frame (end marker not yet received) stays buffered
/// until completed.
#[derive(Debug, Default)]
pub struct FrameSynchronizer {
    buf: String,
}

impl FrameSynchronizer {
    /// Create an empty synchronizer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a decoded text chunk to the buffer.
    pub fn push(&mut self, chunk: &str) {
        self.buf.push_str(chunk);
    }

    /// Append a raw byte chunk, decoding it lossily.
    ///
    /// The wire contract is UTF-8; a multi-byte character split across reads
    /// decodes to replacement characters, which at worst corrupts one payload
    /// that the parser then drops.
    pub fn push_bytes(&mut self, chunk: &[u8]) {
        self.buf.push_str(&String::from_utf8_lossy(chunk));
    }

    /// Extract every complete frame currently in the buffer.
    pub fn drain_frames(&mut self) -> Vec<String> {
        let mut frames = Vec::new();

        while let Some(end_idx) = self.buf.find(END_MARKER) {
            let cut = end_idx + END_MARKER.len();

            if let Some(start_idx) = self.latest_start_before(end_idx) {
                frames.push(self.buf[start_idx..cut].to_string());
            }

            // Drop everything through the end marker, recognized frame or not.
            self.buf.drain(..cut);
        }

        frames
    }

    /// Bytes currently buffered (partial frame or trailing junk).
    #[must_use]
    pub fn buffered(&self) -> &str {
        &self.buf
    }

    /// Discard any buffered bytes.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// The nearest start marker whose first byte is at or before `end_idx`,
    /// preferring whichever of the two markers begins later.
    fn latest_start_before(&self, end_idx: usize) -> Option<usize> {
        let modern = rfind_from(&self.buf, START_MODERN, end_idx);
        let legacy = rfind_from(&self.buf, START_LEGACY, end_idx);
        match (modern, legacy) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }
}

/// Last occurrence of `needle` starting at an index `<= from`.
fn rfind_from(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let limit = haystack.len().min(from + needle.len());
    haystack[..limit].rfind(needle)
}
