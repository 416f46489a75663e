//! Inbound Event Model
//!
//! The shape of the notification contract an event-driven venue SDK
//! delivers: events tagged with a coarse category, each carrying zero or
//! more typed messages. This module defines only the contract the
//! dispatcher assumes; transport and wire format belong to the SDK
//! adapter behind the session port.

use serde::{Deserialize, Serialize};

use super::correlation::CorrelationToken;
use super::field::FieldMap;

// =============================================================================
// Event Categories
// =============================================================================

/// Coarse classification of an inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCategory {
    /// Session lifecycle notifications.
    SessionStatus,
    /// Service open/close notifications.
    ServiceStatus,
    /// Subscription lifecycle notifications.
    SubscriptionStatus,
    /// Subscription field updates and heartbeats.
    SubscriptionData,
    /// Responses to one-shot requests.
    Response,
    /// Administrative notifications (flow control and the like).
    Admin,
    /// Anything else the SDK chooses to deliver.
    Misc,
}

// =============================================================================
// Message Types
// =============================================================================

/// Fine-grained message type tag within an event.
///
/// Well-known lifecycle names get variants; operation responses arrive
/// under the name of the operation that produced them and are decoded by
/// [`crate::domain::report::Report::decode`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageType {
    /// Session is up and usable.
    SessionStarted,
    /// Session never came up.
    SessionStartupFailure,
    /// Session ended; terminal.
    SessionTerminated,
    /// Transport connectivity restored.
    SessionConnectionUp,
    /// Transport connectivity lost (the SDK reconnects internally).
    SessionConnectionDown,
    /// Service open completed.
    ServiceOpened,
    /// Service open failed.
    ServiceOpenFailure,
    /// Subscription confirmed started.
    SubscriptionStarted,
    /// Subscription could not be started.
    SubscriptionFailure,
    /// Subscription ended by the server.
    SubscriptionTerminated,
    /// The SDK is buffering because this client reads too slowly.
    SlowConsumerWarning,
    /// Slow-consumer condition cleared.
    SlowConsumerWarningCleared,
    /// Business error response.
    ErrorInfo,
    /// Ack for order creation plus routing.
    CreateOrderAndRoute,
    /// Ack for route modification.
    ModifyRoute,
    /// Broker specification response.
    BrokerSpecReport,
    /// Fills history response.
    GetFillsResponse,
    /// Order/route subscription tick.
    OrderRouteFields,
    /// Any tag this client does not model.
    Other(String),
}

impl MessageType {
    /// The wire name of this message type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::SessionStarted => "SessionStarted",
            Self::SessionStartupFailure => "SessionStartupFailure",
            Self::SessionTerminated => "SessionTerminated",
            Self::SessionConnectionUp => "SessionConnectionUp",
            Self::SessionConnectionDown => "SessionConnectionDown",
            Self::ServiceOpened => "ServiceOpened",
            Self::ServiceOpenFailure => "ServiceOpenFailure",
            Self::SubscriptionStarted => "SubscriptionStarted",
            Self::SubscriptionFailure => "SubscriptionFailure",
            Self::SubscriptionTerminated => "SubscriptionTerminated",
            Self::SlowConsumerWarning => "SlowConsumerWarning",
            Self::SlowConsumerWarningCleared => "SlowConsumerWarningCleared",
            Self::ErrorInfo => "ErrorInfo",
            Self::CreateOrderAndRoute => "CreateOrderAndRoute",
            Self::ModifyRoute => "ModifyRoute",
            Self::BrokerSpecReport => "BrokerSpecReport",
            Self::GetFillsResponse => "GetFillsResponse",
            Self::OrderRouteFields => "OrderRouteFields",
            Self::Other(name) => name.as_str(),
        }
    }
}

impl From<String> for MessageType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "SessionStarted" => Self::SessionStarted,
            "SessionStartupFailure" => Self::SessionStartupFailure,
            "SessionTerminated" => Self::SessionTerminated,
            "SessionConnectionUp" => Self::SessionConnectionUp,
            "SessionConnectionDown" => Self::SessionConnectionDown,
            "ServiceOpened" => Self::ServiceOpened,
            "ServiceOpenFailure" => Self::ServiceOpenFailure,
            "SubscriptionStarted" => Self::SubscriptionStarted,
            "SubscriptionFailure" => Self::SubscriptionFailure,
            "SubscriptionTerminated" => Self::SubscriptionTerminated,
            "SlowConsumerWarning" => Self::SlowConsumerWarning,
            "SlowConsumerWarningCleared" => Self::SlowConsumerWarningCleared,
            "ErrorInfo" => Self::ErrorInfo,
            "CreateOrderAndRoute" => Self::CreateOrderAndRoute,
            "ModifyRoute" => Self::ModifyRoute,
            "BrokerSpecReport" => Self::BrokerSpecReport,
            "GetFillsResponse" => Self::GetFillsResponse,
            "OrderRouteFields" => Self::OrderRouteFields,
            _ => Self::Other(name),
        }
    }
}

impl From<MessageType> for String {
    fn from(message_type: MessageType) -> Self {
        message_type.as_str().to_string()
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Messages and Events
// =============================================================================

/// A typed, structured record within an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Fine-grained message type tag.
    pub message_type: MessageType,
    /// Token of the request this message answers, when any.
    pub correlation: Option<CorrelationToken>,
    /// Named field payload.
    pub fields: FieldMap,
}

impl Message {
    /// Create a message with no correlation and no fields.
    #[must_use]
    pub fn new(message_type: MessageType) -> Self {
        Self {
            message_type,
            correlation: None,
            fields: FieldMap::new(),
        }
    }

    /// Attach the correlation token of the originating request.
    #[must_use]
    pub fn with_correlation(mut self, token: CorrelationToken) -> Self {
        self.correlation = Some(token);
        self
    }

    /// Attach a field.
    #[must_use]
    pub fn with_field(
        mut self,
        name: impl Into<String>,
        value: impl Into<super::field::FieldValue>,
    ) -> Self {
        self.fields.insert(name, value);
        self
    }

    /// Replace the whole field payload.
    #[must_use]
    pub fn with_fields(mut self, fields: FieldMap) -> Self {
        self.fields = fields;
        self
    }
}

/// An inbound notification: a category plus an ordered list of messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Coarse category tag.
    pub category: EventCategory,
    /// Messages in delivery order.
    pub messages: Vec<Message>,
}

impl Event {
    /// Create an event from its messages.
    #[must_use]
    pub fn new(category: EventCategory, messages: Vec<Message>) -> Self {
        Self { category, messages }
    }

    /// Create a single-message event, the common case.
    #[must_use]
    pub fn single(category: EventCategory, message: Message) -> Self {
        Self {
            category,
            messages: vec![message],
        }
    }
}

// =============================================================================
// Subscription Status Codes
// =============================================================================

/// Field carrying the status code inside subscription data messages.
pub const EVENT_STATUS_FIELD: &str = "eventStatus";

/// Progress signal embedded in subscription data.
///
/// Heartbeats and the end-of-initial-paint marker are never terminal;
/// termination only ever arrives as a subscription-status message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionStatusCode {
    /// Keep-alive on an otherwise idle stream.
    Heartbeat,
    /// The initial snapshot of existing state is complete.
    EndOfInitialPaint,
    /// A live field update.
    Update(i64),
}

impl SubscriptionStatusCode {
    /// Classify a subscription data message by its status field.
    #[must_use]
    pub fn from_message(message: &Message) -> Self {
        match message.fields.i64_or(EVENT_STATUS_FIELD, 0) {
            1 => Self::Heartbeat,
            4 => Self::EndOfInitialPaint,
            code => Self::Update(code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_type_round_trips_through_strings() {
        let known = MessageType::from("ServiceOpened".to_string());
        assert_eq!(known, MessageType::ServiceOpened);
        assert_eq!(known.as_str(), "ServiceOpened");

        let unknown = MessageType::from("SomethingNew".to_string());
        assert_eq!(unknown, MessageType::Other("SomethingNew".to_string()));
        assert_eq!(unknown.as_str(), "SomethingNew");
    }

    #[test]
    fn status_codes_classify_by_event_status_field() {
        let heartbeat =
            Message::new(MessageType::OrderRouteFields).with_field(EVENT_STATUS_FIELD, 1_i64);
        assert_eq!(
            SubscriptionStatusCode::from_message(&heartbeat),
            SubscriptionStatusCode::Heartbeat
        );

        let paint_done =
            Message::new(MessageType::OrderRouteFields).with_field(EVENT_STATUS_FIELD, 4_i64);
        assert_eq!(
            SubscriptionStatusCode::from_message(&paint_done),
            SubscriptionStatusCode::EndOfInitialPaint
        );

        let update = Message::new(MessageType::OrderRouteFields).with_field("status", "WORKING");
        assert_eq!(
            SubscriptionStatusCode::from_message(&update),
            SubscriptionStatusCode::Update(0)
        );
    }
}
