use serde_json::Value;

use crate::decode::decode;
use crate::log_entry::LogEntry;
use crate::session::RawMessage;

pub const USERS_TOPIC: &str = "users";
pub const ORDERS_TOPIC: &str = "orders";

/// How messages on a topic are shaped into records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Payloads are TiCDC envelopes for `table`, decoded into operation and row data.
    ChangeFeed { table: String },
    /// Payloads are logged verbatim, no envelope is assumed.
    Passthrough,
}

/// Fixed topic to route table. A topic that is not listed here is not an error: its messages are
/// simply not turned into records.
#[derive(Debug, Clone)]
pub struct TopicRouter {
    routes: Vec<(String, Route)>,
}

impl TopicRouter {
    pub fn empty() -> Self {
        Self { routes: Vec::new() }
    }

    pub fn with_route(mut self, topic: impl Into<String>, route: Route) -> Self {
        let topic = topic.into();
        self.routes.retain(|(existing, _)| *existing != topic);
        self.routes.push((topic, route));
        self
    }

    /// Topics in registration order, which is also the subscription order.
    pub fn topics(&self) -> Vec<&str> {
        self.routes.iter().map(|(topic, _)| topic.as_str()).collect()
    }

    pub fn route_for(&self, topic: &str) -> Option<&Route> {
        self.routes
            .iter()
            .find(|(candidate, _)| candidate == topic)
            .map(|(_, route)| route)
    }

    /// Shapes a parsed payload into a record, or `None` when the topic has no route.
    pub fn route(&self, message: &RawMessage, value: Value) -> Option<LogEntry> {
        match self.route_for(&message.topic)? {
            Route::ChangeFeed { table } => Some(LogEntry::change(message, table, decode(&value))),
            Route::Passthrough => Some(LogEntry::passthrough(message, value)),
        }
    }
}

impl Default for TopicRouter {
    fn default() -> Self {
        Self::empty()
            .with_route(
                USERS_TOPIC,
                Route::ChangeFeed {
                    table: USERS_TOPIC.to_string(),
                },
            )
            .with_route(ORDERS_TOPIC, Route::Passthrough)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::Operation;
    use crate::log_entry::Outcome;
    use serde_json::json;

    fn message(topic: &str) -> RawMessage {
        RawMessage {
            topic: topic.to_string(),
            partition: 1,
            offset: 5,
            payload: None,
        }
    }

    #[test]
    fn default_routes() {
        let router = TopicRouter::default();
        assert_eq!(router.topics(), vec!["users", "orders"]);
        assert_eq!(router.route_for("orders"), Some(&Route::Passthrough));
        assert_eq!(router.route_for("payments"), None);
    }

    #[test]
    fn users_are_decoded() {
        let router = TopicRouter::default();
        let entry = router
            .route(&message("users"), json!({"d": {"id": {"v": 4}}}))
            .unwrap();

        assert_eq!(
            entry.outcome,
            Outcome::Change {
                source: "ticdc",
                table: "users".to_string(),
                operation: Operation::Delete,
                data: json!({"id": 4}),
            }
        );
    }

    #[test]
    fn orders_bypass_the_decoder() {
        let router = TopicRouter::default();
        let payload = json!({"c": {"id": {"v": 4}}});
        let entry = router.route(&message("orders"), payload.clone()).unwrap();

        assert_eq!(
            entry.outcome,
            Outcome::Passthrough {
                source: "ticdc",
                data: payload,
            }
        );
    }

    #[test]
    fn unrouted_topic_produces_nothing() {
        let router = TopicRouter::default();
        assert!(router.route(&message("payments"), json!({"a": 1})).is_none());
    }

    #[test]
    fn re_registering_a_topic_replaces_its_route() {
        let router = TopicRouter::default().with_route(USERS_TOPIC, Route::Passthrough);
        assert_eq!(router.topics(), vec!["orders", "users"]);
        assert_eq!(router.route_for("users"), Some(&Route::Passthrough));
    }
}
