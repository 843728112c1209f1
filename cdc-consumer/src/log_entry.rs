use serde::Serialize;
use serde_json::Value;

use crate::classify::MalformedJson;
use crate::decode::{DecodedChange, Operation};
use crate::session::RawMessage;

pub const SOURCE_TICDC: &str = "ticdc";
pub const JSON_PARSE_ERROR: &str = "JSON_PARSE_ERROR";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkipReason {
    EmptyPayload,
    NonJsonPayload,
}

/// One line of the record stream, minus the timestamp which the sink adds on emission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Outcome {
    Skipped {
        skipped: bool,
        reason: SkipReason,
        #[serde(skip_serializing_if = "Option::is_none")]
        preview: Option<String>,
    },
    Failed {
        error: &'static str,
        message: String,
        #[serde(rename = "rawValue")]
        raw_value: String,
    },
    Change {
        source: &'static str,
        table: String,
        operation: Operation,
        data: Value,
    },
    Passthrough {
        source: &'static str,
        data: Value,
    },
}

impl LogEntry {
    fn new(message: &RawMessage, outcome: Outcome) -> Self {
        Self {
            topic: message.topic.clone(),
            partition: message.partition,
            offset: message.offset,
            outcome,
        }
    }

    pub fn skipped(message: &RawMessage, reason: SkipReason, preview: Option<String>) -> Self {
        Self::new(
            message,
            Outcome::Skipped {
                skipped: true,
                reason,
                preview,
            },
        )
    }

    pub fn parse_error(message: &RawMessage, err: &MalformedJson) -> Self {
        Self::new(
            message,
            Outcome::Failed {
                error: JSON_PARSE_ERROR,
                message: err.to_string(),
                raw_value: err.preview.clone(),
            },
        )
    }

    pub fn change(message: &RawMessage, table: &str, change: DecodedChange) -> Self {
        Self::new(
            message,
            Outcome::Change {
                source: SOURCE_TICDC,
                table: table.to_string(),
                operation: change.operation,
                data: change.data,
            },
        )
    }

    pub fn passthrough(message: &RawMessage, data: Value) -> Self {
        Self::new(
            message,
            Outcome::Passthrough {
                source: SOURCE_TICDC,
                data,
            },
        )
    }

    /// Error records go to stderr, everything else to stdout.
    pub fn is_error(&self) -> bool {
        matches!(self.outcome, Outcome::Failed { .. })
    }
}
