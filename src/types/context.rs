//! Request Context
//!
//! Correlation metadata carried unchanged through every attempt of one
//! logical call.

use uuid::Uuid;

/// Header carrying the correlation id.
pub const CORRELATION_HEADER: &str = "transId";
/// Header carrying the caller's source tag.
pub const SOURCE_TAG_HEADER: &str = "transactionSrc";
/// Longest source tag the downstream APIs accept.
pub const MAX_SOURCE_TAG_LEN: usize = 512;

/// Per-call correlation metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestContext {
    correlation_id: String,
    source_tag: String,
}

impl RequestContext {
    /// Create a context with a fresh correlation id.
    pub fn new(source_tag: impl Into<String>) -> Self {
        Self::with_correlation_id(generate_correlation_id(), source_tag)
    }

    /// Create a context with a caller-supplied correlation id.
    pub fn with_correlation_id(correlation_id: impl Into<String>, source_tag: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            source_tag: truncate_source_tag(source_tag.into()),
        }
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn source_tag(&self) -> &str {
        &self.source_tag
    }

    /// Header pairs identifying this call.
    pub fn headers(&self) -> [(&'static str, &str); 2] {
        [
            (CORRELATION_HEADER, self.correlation_id.as_str()),
            (SOURCE_TAG_HEADER, self.source_tag.as_str()),
        ]
    }
}

/// 32 lowercase hex characters from a random (v4) UUID.
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn truncate_source_tag(mut tag: String) -> String {
    if tag.chars().count() > MAX_SOURCE_TAG_LEN {
        if let Some((idx, _)) = tag.char_indices().nth(MAX_SOURCE_TAG_LEN) {
            tag.truncate(idx);
        }
    }
    tag
}
