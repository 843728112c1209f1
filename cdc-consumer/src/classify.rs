use serde_json::Value;
use thiserror::Error;

pub const NON_JSON_PREVIEW_CHARS: usize = 100;
pub const RAW_PREVIEW_CHARS: usize = 200;

/// What a raw payload turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifiedPayload {
    /// Absent, zero-length, or all zero bytes: a tombstone or compaction marker.
    Empty,
    /// Text that does not start with `{`. Only the preview is kept, it is never parsed.
    NonJson { preview: String },
    Json(Value),
}

/// The payload looked like a JSON object but did not parse.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct MalformedJson {
    #[source]
    pub source: serde_json::Error,
    /// First 200 characters of the decoded text, before cleaning.
    pub preview: String,
}

pub fn classify(payload: Option<&[u8]>) -> Result<ClassifiedPayload, MalformedJson> {
    let bytes = match payload {
        Some(bytes) if !bytes.iter().all(|b| *b == 0) => bytes,
        _ => return Ok(ClassifiedPayload::Empty),
    };

    // Binlog frames can arrive NUL padded around otherwise valid JSON
    let raw = String::from_utf8_lossy(bytes);
    let stripped = raw.replace('\0', "");
    let cleaned = stripped.trim();

    if !cleaned.starts_with('{') {
        return Ok(ClassifiedPayload::NonJson {
            preview: truncate_chars(cleaned, NON_JSON_PREVIEW_CHARS),
        });
    }

    serde_json::from_str(cleaned)
        .map(ClassifiedPayload::Json)
        .map_err(|source| MalformedJson {
            source,
            preview: truncate_chars(&raw, RAW_PREVIEW_CHARS),
        })
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
