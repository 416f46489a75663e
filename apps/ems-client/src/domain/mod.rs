//! Domain layer - Core session-client types with no I/O dependencies.

/// Correlation tokens linking requests to their responses.
pub mod correlation;

/// Inbound event and message contract.
pub mod event;

/// Typed message fields and decode accessors.
pub mod field;

/// Startup and per-token flow state machines.
pub mod flow;

/// Decoded response payloads.
pub mod report;

/// Outbound request and subscription payloads.
pub mod request;

pub use correlation::CorrelationToken;
pub use event::{Event, EventCategory, Message, MessageType, SubscriptionStatusCode};
pub use field::{DecodeError, FieldMap, FieldValue};
pub use flow::{FailureReason, FlowState, StartupPhase};
pub use report::{ErrorInfo, Report};
pub use request::{Operation, Request, SubscriptionSpec, SubscriptionTopic};
