use tracing::debug;

use crate::classify::{classify, ClassifiedPayload};
use crate::log_entry::{LogEntry, SkipReason};
use crate::router::TopicRouter;
use crate::session::RawMessage;

/// Turns one broker message into at most one record. Pure: no state survives the call, so
/// messages from different partitions can be processed concurrently.
///
/// Skips and parse errors are reported for every topic, only well-formed JSON needs a route.
pub fn process(router: &TopicRouter, message: &RawMessage) -> Option<LogEntry> {
    let value = match classify(message.payload.as_deref()) {
        Ok(ClassifiedPayload::Json(value)) => value,
        Ok(ClassifiedPayload::Empty) => {
            return Some(LogEntry::skipped(message, SkipReason::EmptyPayload, None));
        }
        Ok(ClassifiedPayload::NonJson { preview }) => {
            return Some(LogEntry::skipped(
                message,
                SkipReason::NonJsonPayload,
                Some(preview),
            ));
        }
        Err(err) => return Some(LogEntry::parse_error(message, &err)),
    };

    let entry = router.route(message, value);
    if entry.is_none() {
        debug!(
            topic = %message.topic,
            partition = message.partition,
            offset = message.offset,
            "Dropping message on unrouted topic"
        );
    }
    entry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::Operation;
    use crate::log_entry::Outcome;
    use serde_json::json;

    fn message(topic: &str, payload: Option<&[u8]>) -> RawMessage {
        RawMessage {
            topic: topic.to_string(),
            partition: 0,
            offset: 42,
            payload: payload.map(<[u8]>::to_vec),
        }
    }

    #[test]
    fn users_insert_end_to_end() {
        let router = TopicRouter::default();
        let entry = process(
            &router,
            &message("users", Some(br#"{"c":{"email":{"v":"a@x.com"}}}"#.as_slice())),
        )
        .unwrap();

        assert_eq!(entry.topic, "users");
        assert_eq!(entry.partition, 0);
        assert_eq!(entry.offset, 42);
        assert_eq!(
            entry.outcome,
            Outcome::Change {
                source: "ticdc",
                table: "users".to_string(),
                operation: Operation::Insert,
                data: json!({"email": "a@x.com"}),
            }
        );
    }

    #[test]
    fn tombstones_are_skipped() {
        let router = TopicRouter::default();
        for payload in [None, Some([0u8; 4].as_slice())] {
            let entry = process(&router, &message("users", payload)).unwrap();
            assert!(matches!(
                entry.outcome,
                Outcome::Skipped {
                    reason: SkipReason::EmptyPayload,
                    ..
                }
            ));
        }
    }

    #[test]
    fn malformed_json_becomes_an_error_record() {
        let router = TopicRouter::default();
        let entry = process(&router, &message("users", Some(b"{bad".as_slice()))).unwrap();
        assert!(entry.is_error());
    }

    #[test]
    fn skips_and_errors_are_reported_on_unrouted_topics() {
        let router = TopicRouter::default();
        assert!(process(&router, &message("payments", Some(b"{}".as_slice()))).is_none());

        let entry = process(&router, &message("payments", Some(b"{oops".as_slice()))).unwrap();
        assert!(entry.is_error());

        let entry = process(&router, &message("payments", Some(b"plain".as_slice()))).unwrap();
        assert!(matches!(
            entry.outcome,
            Outcome::Skipped {
                reason: SkipReason::NonJsonPayload,
                ..
            }
        ));
    }
}
