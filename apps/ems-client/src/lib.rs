#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::too_many_lines,
        clippy::match_same_arms
    )
)]

//! EMS Client - Venue Order-Entry Session Toolkit
//!
//! A reusable session-event dispatcher for clients of an event-driven
//! trading-venue order-entry API, plus example programs for the common
//! flows: order entry with routing, route modification, broker
//! specification lookup, fills history, and order/route field
//! subscriptions.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Correlation tokens, the event/message/field contract,
//!   flow state machines, request builders, and response decoding.
//!
//! - **Application**: The `SessionEventDispatcher`, the session port it
//!   drives, and the runner that awaits completion.
//!
//! - **Infrastructure**: Env configuration, logging setup, and the
//!   simulated venue gateway the examples run against.
//!
//! # Data Flow
//!
//! ```text
//! venue session ──events──► SessionEventDispatcher ──updates──► consumer
//!        ▲                         │
//!        └──── open / send / ──────┘
//!              subscribe / stop
//! ```
//!
//! The dispatcher owns the startup sequencing (never send before the
//! service opens), per-token correlation (ignore what was never asked
//! for), and terminal-state discipline (one completion or failure per
//! flow, no retries).

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core session-client types with no I/O dependencies.
pub mod domain;

/// Application layer - Dispatcher, ports, and runner.
pub mod application;

/// Infrastructure layer - Config, telemetry, simulated gateway.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::correlation::CorrelationToken;
pub use domain::event::{Event, EventCategory, Message, MessageType, SubscriptionStatusCode};
pub use domain::field::{DecodeError, FieldMap, FieldValue};
pub use domain::flow::{FailureReason, FlowState, StartupPhase};
pub use domain::report::{
    BrokerSpecReport, ErrorInfo, Fill, FillsReport, OrderRouted, Report, RouteModified,
};
pub use domain::request::{
    FillsQuery, HandlingInstruction, Operation, OrderTicket, OrderType, Request, RouteAmendment,
    Side, SubscriptionSpec, SubscriptionTopic, TimeInForce, broker_spec_request,
    order_route_chain, order_subscription, route_subscription,
};

// Application surface
pub use application::dispatcher::{
    Disposition, FlowAction, FlowConfig, FlowUpdate, SessionEventDispatcher,
};
pub use application::ports::{SessionError, SessionHandle};
pub use application::runner::{FlowOutcome, FlowRun, run_to_completion, spawn_flow};

// Infrastructure
pub use infrastructure::config::{ConfigError, Settings, load_dotenv};
pub use infrastructure::sim::{SimConfig, SimSession, SimSessionHandle};
pub use infrastructure::telemetry;
