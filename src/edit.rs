use std::ops::Range;
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// The fundamental edit primitive: byte-span replacement on decoded payload
/// text, with verification.
///
/// Every locator (structural or textual) compiles down to this primitive.
/// Intelligence lives in span acquisition, not in application; the codec owns
/// all file I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "SpanEdit does nothing until applied"]
pub struct SpanEdit {
    /// Starting byte offset (inclusive)
    pub byte_start: usize,
    /// Ending byte offset (exclusive)
    pub byte_end: usize,
    /// New text to insert at [byte_start, byte_end)
    pub new_text: String,
    /// Verification of what we expect to find before applying
    pub expected_before: EditVerification,
}

/// Verification strategy for edit safety.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditVerification {
    /// Exact text match required
    ExactMatch(String),
    /// xxh3 hash of expected text (faster for large spans)
    Hash(u64),
}

impl EditVerification {
    /// Check if the provided text matches the verification criteria.
    pub fn matches(&self, text: &str) -> bool {
        match self {
            EditVerification::ExactMatch(expected) => text == expected,
            EditVerification::Hash(expected_hash) => xxh3_64(text.as_bytes()) == *expected_hash,
        }
    }

    /// Create verification from text, using hash for text over 1KB.
    pub fn from_text(text: &str) -> Self {
        if text.len() > 1024 {
            EditVerification::Hash(xxh3_64(text.as_bytes()))
        } else {
            EditVerification::ExactMatch(text.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("before-text verification failed at byte {byte_start}: found {found:?}")]
    BeforeTextMismatch {
        byte_start: usize,
        byte_end: usize,
        found: String,
    },

    #[error("invalid byte range [{byte_start}, {byte_end}) in payload of length {payload_len}")]
    InvalidByteRange {
        byte_start: usize,
        byte_end: usize,
        payload_len: usize,
    },

    #[error("edit boundary at byte {offset} is not a char boundary")]
    NotCharBoundary { offset: usize },

    #[error("overlapping edit spans: [..{first_end}) and [{second_start}..)")]
    OverlappingSpans {
        first_end: usize,
        second_start: usize,
    },
}

/// Result of applying a single span edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanOutcome {
    /// Span was rewritten
    Applied,
    /// Span already held the target text; payload untouched
    AlreadyApplied,
}

impl SpanEdit {
    /// Create a new edit with automatic verification generation.
    pub fn new(span: Range<usize>, new_text: impl Into<String>, expected_before: &str) -> Self {
        Self {
            byte_start: span.start,
            byte_end: span.end,
            new_text: new_text.into(),
            expected_before: EditVerification::from_text(expected_before),
        }
    }

    /// Create an edit with an explicit verification strategy.
    pub fn with_verification(
        span: Range<usize>,
        new_text: impl Into<String>,
        verification: EditVerification,
    ) -> Self {
        Self {
            byte_start: span.start,
            byte_end: span.end,
            new_text: new_text.into(),
            expected_before: verification,
        }
    }

    /// Validate this edit against the payload and return the current span text.
    fn validate<'a>(&self, payload: &'a str) -> Result<&'a str, EditError> {
        if self.byte_start > self.byte_end || self.byte_end > payload.len() {
            return Err(EditError::InvalidByteRange {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                payload_len: payload.len(),
            });
        }

        for offset in [self.byte_start, self.byte_end] {
            if !payload.is_char_boundary(offset) {
                return Err(EditError::NotCharBoundary { offset });
            }
        }

        let current = &payload[self.byte_start..self.byte_end];

        // Idempotency: a span already in the target state needs no verification
        if current == self.new_text {
            return Ok(current);
        }

        if !self.expected_before.matches(current) {
            return Err(EditError::BeforeTextMismatch {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                found: current.to_string(),
            });
        }

        Ok(current)
    }

    /// Apply a set of edits to the payload in one pass.
    ///
    /// Edits are sorted descending by byte_start and applied bottom-to-top so
    /// earlier spans never shift later ones. All edits are validated and
    /// overlapping spans rejected before anything is modified.
    pub fn apply_all(
        payload: &str,
        mut edits: Vec<SpanEdit>,
    ) -> Result<(String, Vec<SpanOutcome>), EditError> {
        if edits.is_empty() {
            return Ok((payload.to_string(), Vec::new()));
        }

        edits.sort_by(|a, b| b.byte_start.cmp(&a.byte_start));

        for edit in &edits {
            edit.validate(payload)?;
        }

        // Sorted descending: the later-in-text edit comes first in the vec
        for window in edits.windows(2) {
            let (later, earlier) = (&window[0], &window[1]);
            if earlier.byte_end > later.byte_start {
                return Err(EditError::OverlappingSpans {
                    first_end: earlier.byte_end,
                    second_start: later.byte_start,
                });
            }
        }

        let mut result = payload.to_string();
        let mut outcomes = Vec::with_capacity(edits.len());

        for edit in &edits {
            if &result[edit.byte_start..edit.byte_end] == edit.new_text {
                outcomes.push(SpanOutcome::AlreadyApplied);
                continue;
            }
            result.replace_range(edit.byte_start..edit.byte_end, &edit.new_text);
            outcomes.push(SpanOutcome::Applied);
        }

        Ok((result, outcomes))
    }
}
