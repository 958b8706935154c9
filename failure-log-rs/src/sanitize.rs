//! Text sanitization applied before a failure record is encoded
//!
//! Exception messages and backtrace frames arrive as raw bytes because job
//! frameworks routinely hand over text in encodings other than UTF-8. JSON
//! requires valid UTF-8, so every invalid sequence is replaced with U+FFFD
//! before the record is built. Nothing here can fail.

/// Character substituted for each invalid byte sequence
pub const REPLACEMENT_CHAR: char = char::REPLACEMENT_CHARACTER;

/// Sanitization result containing the cleaned text and whether anything
/// had to change
#[derive(Debug, Clone, PartialEq)]
pub struct SanitizeResult<T> {
    /// Sanitized content
    pub sanitized: T,
    /// Whether any changes were made during sanitization
    pub was_modified: bool,
    /// Optional details about what was modified
    pub details: Option<String>,
}

impl<T> SanitizeResult<T> {
    /// Create a result with unmodified content
    pub fn unmodified(content: T) -> Self {
        Self {
            sanitized: content,
            was_modified: false,
            details: None,
        }
    }

    /// Create a result with modified content
    pub fn modified(content: T, details: Option<String>) -> Self {
        Self {
            sanitized: content,
            was_modified: true,
            details,
        }
    }

    pub fn into_inner(self) -> T {
        self.sanitized
    }
}

/// Decode bytes as UTF-8, replacing each malformed sequence with
/// [`REPLACEMENT_CHAR`]
pub fn clean_utf8(input: &[u8]) -> SanitizeResult<String> {
    let mut sanitized = String::with_capacity(input.len());
    let mut replaced = 0usize;

    for chunk in input.utf8_chunks() {
        sanitized.push_str(chunk.valid());
        if !chunk.invalid().is_empty() {
            sanitized.push(REPLACEMENT_CHAR);
            replaced += 1;
        }
    }

    if replaced == 0 {
        SanitizeResult::unmodified(sanitized)
    } else {
        SanitizeResult::modified(
            sanitized,
            Some(format!("Replaced {} malformed UTF-8 sequence(s)", replaced)),
        )
    }
}

/// Clean every backtrace frame and cut the trace at the first frame that
/// contains `cutoff`.
///
/// Frames from the cutoff onward belong to the job framework itself and are
/// dropped. Without a cutoff, or when no frame matches, the whole trace is
/// kept.
pub fn filter_backtrace<L: AsRef<[u8]>>(frames: &[L], cutoff: Option<&str>) -> Vec<String> {
    let cleaned = frames
        .iter()
        .map(|frame| clean_utf8(frame.as_ref()).into_inner());

    match cutoff.filter(|marker| !marker.is_empty()) {
        Some(marker) => cleaned.take_while(|frame| !frame.contains(marker)).collect(),
        None => cleaned.collect(),
    }
}
