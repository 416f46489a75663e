//! Simulated Venue Gateway
//!
//! In-process [`SessionHandle`] implementation with canned venue
//! behavior: session and service lifecycle events, typed responses for
//! each supported operation, and subscription streams with an initial
//! paint followed by heartbeats.
//!
//! The example binaries and the end-to-end tests run against this
//! gateway; a real SDK adapter would implement the same port and emit
//! the same event shapes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{SessionError, SessionHandle};
use crate::domain::correlation::CorrelationToken;
use crate::domain::event::{EVENT_STATUS_FIELD, Event, EventCategory, Message, MessageType};
use crate::domain::field::{FieldMap, FieldValue};
use crate::domain::request::{Operation, Request, SubscriptionSpec, SubscriptionTopic};

// =============================================================================
// Configuration
// =============================================================================

/// Simulator knobs.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Services the gateway will open.
    pub known_services: Vec<String>,
    /// Delay before each emitted lifecycle or response event.
    pub response_latency: Duration,
    /// Idle interval between subscription heartbeats.
    pub heartbeat_interval: Duration,
    /// Emit a startup failure instead of starting.
    pub fail_startup: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            known_services: vec![
                "//venue/order-entry".to_string(),
                "//venue/fills-history".to_string(),
            ],
            response_latency: Duration::from_millis(5),
            heartbeat_interval: Duration::from_millis(250),
            fail_startup: false,
        }
    }
}

// =============================================================================
// Session
// =============================================================================

/// Entry point mirroring an SDK's `startSession`.
pub struct SimSession;

impl SimSession {
    /// Start a simulated session.
    ///
    /// Returns the call handle and the inbound event stream. The
    /// session-started (or startup-failure) event arrives asynchronously
    /// on the stream, as it would from a real SDK.
    #[must_use]
    pub fn connect(config: SimConfig) -> (Arc<SimSessionHandle>, mpsc::Receiver<Event>) {
        let (events_tx, events_rx) = mpsc::channel(256);
        let handle = Arc::new(SimSessionHandle {
            config,
            events: events_tx,
            cancel: CancellationToken::new(),
            next_sequence: AtomicI64::new(1_000_001),
            stopped: AtomicBool::new(false),
        });

        let startup = Arc::clone(&handle);
        tokio::spawn(async move {
            tokio::time::sleep(startup.config.response_latency).await;
            let message_type = if startup.config.fail_startup {
                MessageType::SessionStartupFailure
            } else {
                MessageType::SessionStarted
            };
            startup
                .emit(Event::single(
                    EventCategory::SessionStatus,
                    Message::new(message_type),
                ))
                .await;
        });

        (handle, events_rx)
    }
}

/// Call handle of the simulated session.
pub struct SimSessionHandle {
    config: SimConfig,
    events: mpsc::Sender<Event>,
    cancel: CancellationToken,
    next_sequence: AtomicI64,
    stopped: AtomicBool,
}

impl SimSessionHandle {
    async fn emit(&self, event: Event) {
        if self.events.send(event).await.is_err() {
            tracing::debug!("Event receiver dropped");
        }
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.stopped.load(Ordering::SeqCst) {
            Err(SessionError::Closed)
        } else {
            Ok(())
        }
    }

    /// Build the response message for a one-shot request.
    fn respond(&self, request: &Request, token: CorrelationToken) -> Message {
        let fields = &request.fields;
        let message = match request.operation {
            Operation::CreateOrderAndRoute => {
                if fields.str_or("ticker", "").is_empty() {
                    error_info(100, "Missing or invalid field: ticker")
                } else if fields.i64_or("amount", 0) <= 0 {
                    error_info(100, "Missing or invalid field: amount")
                } else if fields.str_or("broker", "").is_empty() {
                    error_info(100, "Missing or invalid field: broker")
                } else {
                    let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
                    Message::new(MessageType::CreateOrderAndRoute)
                        .with_field("sequence", sequence)
                        .with_field("routeId", 1_i64)
                        .with_field("message", "Order created and routed")
                }
            }
            Operation::ModifyRoute => {
                if fields.i64_or("sequence", 0) <= 0 || fields.i64_or("routeId", 0) <= 0 {
                    error_info(101, "Route not found")
                } else if fields.i64_or("amount", 0) <= 0 {
                    error_info(100, "Missing or invalid field: amount")
                } else {
                    Message::new(MessageType::ModifyRoute).with_field("message", "Route modified")
                }
            }
            Operation::GetBrokerSpec => {
                if fields.contains("uuid") {
                    Message::new(MessageType::BrokerSpecReport).with_fields(canned_broker_spec())
                } else {
                    error_info(102, "Missing or invalid field: uuid")
                }
            }
            Operation::GetFills => match (
                fields.require_date_time("fromDateTime"),
                fields.require_date_time("toDateTime"),
            ) {
                (Ok(from), Ok(to)) if from <= to => {
                    let fills: Vec<FieldValue> = canned_fills()
                        .into_iter()
                        .filter(|fill| {
                            let at = fill.date_time_or("dateTimeOfFill", DateTime::UNIX_EPOCH);
                            at >= from && at <= to
                        })
                        .map(FieldValue::Group)
                        .collect();
                    Message::new(MessageType::GetFillsResponse).with_field("fills", fills)
                }
                (Ok(_), Ok(_)) => error_info(103, "Invalid window: fromDateTime after toDateTime"),
                _ => error_info(100, "Missing or invalid field: fromDateTime/toDateTime"),
            },
        };
        message.with_correlation(token)
    }
}

/// Stream task for one subscription: started confirmation, initial
/// paint, end-of-paint marker, then heartbeats until the session stops.
fn spawn_stream(
    events: mpsc::Sender<Event>,
    cancel: CancellationToken,
    latency: Duration,
    heartbeat_interval: Duration,
    spec: SubscriptionSpec,
    token: CorrelationToken,
) {
    tokio::spawn(async move {
        tokio::time::sleep(latency).await;
        let _ = events
            .send(Event::single(
                EventCategory::SubscriptionStatus,
                Message::new(MessageType::SubscriptionStarted).with_correlation(token),
            ))
            .await;

        for snapshot in paint_snapshots(spec.topic) {
            let _ = events
                .send(Event::single(
                    EventCategory::SubscriptionData,
                    Message::new(MessageType::OrderRouteFields)
                        .with_correlation(token)
                        .with_fields(snapshot.with(EVENT_STATUS_FIELD, 0_i64)),
                ))
                .await;
        }
        let _ = events
            .send(Event::single(
                EventCategory::SubscriptionData,
                Message::new(MessageType::OrderRouteFields)
                    .with_correlation(token)
                    .with_field(EVENT_STATUS_FIELD, 4_i64),
            ))
            .await;

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(heartbeat_interval) => {
                    if events
                        .send(Event::single(
                            EventCategory::SubscriptionData,
                            Message::new(MessageType::OrderRouteFields)
                                .with_correlation(token)
                                .with_field(EVENT_STATUS_FIELD, 1_i64),
                        ))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
            }
        }
    });
}

#[async_trait::async_trait]
impl SessionHandle for SimSessionHandle {
    async fn open_service(&self, service: &str) -> Result<(), SessionError> {
        self.ensure_open()?;
        let known = self.config.known_services.iter().any(|s| s == service);
        let message_type = if known {
            MessageType::ServiceOpened
        } else {
            MessageType::ServiceOpenFailure
        };
        tracing::debug!(service, known, "Service open requested");
        let events = self.events.clone();
        let latency = self.config.response_latency;
        tokio::spawn(async move {
            tokio::time::sleep(latency).await;
            let _ = events
                .send(Event::single(
                    EventCategory::ServiceStatus,
                    Message::new(message_type),
                ))
                .await;
        });
        Ok(())
    }

    async fn send_request(
        &self,
        request: Request,
        token: CorrelationToken,
    ) -> Result<(), SessionError> {
        self.ensure_open()?;
        tracing::debug!(%token, operation = %request.operation, "Request received");
        let response = self.respond(&request, token);
        let events = self.events.clone();
        let latency = self.config.response_latency;
        tokio::spawn(async move {
            tokio::time::sleep(latency).await;
            let _ = events
                .send(Event::single(EventCategory::Response, response))
                .await;
        });
        Ok(())
    }

    async fn subscribe(
        &self,
        spec: SubscriptionSpec,
        token: CorrelationToken,
    ) -> Result<(), SessionError> {
        self.ensure_open()?;
        tracing::debug!(%token, topic = %spec.topic, "Subscription received");
        spawn_stream(
            self.events.clone(),
            self.cancel.clone(),
            self.config.response_latency,
            self.config.heartbeat_interval,
            spec,
            token,
        );
        Ok(())
    }

    async fn stop(&self) -> Result<(), SessionError> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::debug!("Session stopping");
        self.cancel.cancel();
        self.emit(Event::single(
            EventCategory::SessionStatus,
            Message::new(MessageType::SessionTerminated),
        ))
        .await;
        Ok(())
    }
}

// =============================================================================
// Canned Data
// =============================================================================

fn error_info(code: i64, message: &str) -> Message {
    Message::new(MessageType::ErrorInfo)
        .with_field("errorCode", code)
        .with_field("errorMessage", message)
}

fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or(DateTime::UNIX_EPOCH)
}

/// Three fills on 2024-11-04, in time order.
fn canned_fills() -> Vec<FieldMap> {
    vec![
        FieldMap::new()
            .with("orderId", 1_000_001_i64)
            .with("fillId", 1_i64)
            .with("fillPrice", 187.32)
            .with("fillShares", 1500.0)
            .with("dateTimeOfFill", ts(1_730_730_600)), // 14:30:00Z
        FieldMap::new()
            .with("orderId", 1_000_001_i64)
            .with("fillId", 2_i64)
            .with("fillPrice", 187.41)
            .with("fillShares", 3000.0)
            .with("dateTimeOfFill", ts(1_730_732_700)), // 15:05:00Z
        FieldMap::new()
            .with("orderId", 1_000_002_i64)
            .with("fillId", 1_i64)
            .with("fillPrice", 96.05)
            .with("fillShares", 800.0)
            .with("dateTimeOfFill", ts(1_730_749_500)), // 19:45:00Z
    ]
}

fn fix_mapping(name: &str, fix_value: &str) -> FieldValue {
    FieldValue::Group(FieldMap::new().with("name", name).with("fixValue", fix_value))
}

fn strategy_parameter(name: &str, fix_tag: i64, required: bool, kind: FieldMap) -> FieldValue {
    FieldValue::Group(
        FieldMap::new()
            .with("name", name)
            .with("fixTag", fix_tag)
            .with("isRequired", required)
            .with("isReplaceable", !required)
            .with("type", kind),
    )
}

/// Two brokers: one with a VWAP strategy schema, one plain.
fn canned_broker_spec() -> FieldMap {
    let vwap = FieldMap::new()
        .with("name", "VWAP")
        .with("fixValue", "V")
        .with(
            "parameters",
            vec![
                strategy_parameter(
                    "StartTime",
                    9_100,
                    true,
                    FieldMap::new().with(
                        "string",
                        FieldMap::new().with("possibleValues", Vec::<FieldValue>::new()),
                    ),
                ),
                strategy_parameter(
                    "MaxPctVolume",
                    9_101,
                    false,
                    FieldMap::new().with(
                        "range",
                        FieldMap::new()
                            .with("min", 0_i64)
                            .with("max", 100_i64)
                            .with("step", 5_i64),
                    ),
                ),
                strategy_parameter(
                    "Urgency",
                    9_102,
                    false,
                    FieldMap::new().with(
                        "enumeration",
                        FieldMap::new().with(
                            "enumerators",
                            vec![
                                fix_mapping("Passive", "P"),
                                fix_mapping("Neutral", "N"),
                                fix_mapping("Aggressive", "A"),
                            ],
                        ),
                    ),
                ),
            ],
        );

    let bb = FieldMap::new()
        .with("code", "BB")
        .with("assetClass", "EQTY")
        .with("strategyFixTag", 6_060_i64)
        .with("strategies", vec![FieldValue::Group(vwap)])
        .with(
            "timesInForce",
            vec![fix_mapping("DAY", "0"), fix_mapping("IOC", "3")],
        )
        .with(
            "orderTypes",
            vec![fix_mapping("MKT", "1"), fix_mapping("LMT", "2")],
        )
        .with(
            "handlingInstructions",
            vec![fix_mapping("ANY", "1"), fix_mapping("DIR", "2")],
        );

    let ax = FieldMap::new()
        .with("code", "AX")
        .with("assetClass", "FUT")
        .with("timesInForce", vec![fix_mapping("DAY", "0")])
        .with("orderTypes", vec![fix_mapping("MKT", "1")])
        .with("handlingInstructions", vec![fix_mapping("ANY", "1")]);

    FieldMap::new().with(
        "brokers",
        vec![FieldValue::Group(bb), FieldValue::Group(ax)],
    )
}

/// Initial paint snapshots per topic.
fn paint_snapshots(topic: SubscriptionTopic) -> Vec<FieldMap> {
    match topic {
        SubscriptionTopic::Order => vec![
            FieldMap::new()
                .with("apiSeqNum", 1_i64)
                .with("sequence", 1_000_001_i64)
                .with("ticker", "IBM US")
                .with("side", "BUY")
                .with("amount", 4_500_i64)
                .with("filled", 1_500_i64)
                .with("avgPrice", 187.32)
                .with("broker", "BB")
                .with("status", "PARTFILL")
                .with("working", 1_i64),
            FieldMap::new()
                .with("apiSeqNum", 2_i64)
                .with("sequence", 1_000_002_i64)
                .with("ticker", "VOD LN")
                .with("side", "SELL")
                .with("amount", 800_i64)
                .with("filled", 800_i64)
                .with("avgPrice", 96.05)
                .with("broker", "AX")
                .with("status", "FILLED")
                .with("working", 0_i64),
        ],
        SubscriptionTopic::Route => vec![
            FieldMap::new()
                .with("apiSeqNum", 1_i64)
                .with("sequence", 1_000_001_i64)
                .with("routeId", 1_i64)
                .with("amount", 4_500_i64)
                .with("filled", 1_500_i64)
                .with("avgPrice", 187.32)
                .with("lastPrice", 187.41)
                .with("lastShares", 300_i64)
                .with("status", "PARTFILL")
                .with("working", 1_i64),
        ],
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::request::broker_spec_request;

    #[tokio::test]
    async fn session_starts_and_opens_known_services() {
        let (session, mut events) = SimSession::connect(SimConfig::default());

        let started = events.recv().await.unwrap();
        assert_eq!(started.category, EventCategory::SessionStatus);
        assert_eq!(started.messages[0].message_type, MessageType::SessionStarted);

        session.open_service("//venue/order-entry").await.unwrap();
        let opened = events.recv().await.unwrap();
        assert_eq!(opened.messages[0].message_type, MessageType::ServiceOpened);
    }

    #[tokio::test]
    async fn unknown_services_fail_to_open() {
        let (session, mut events) = SimSession::connect(SimConfig::default());
        let _started = events.recv().await.unwrap();

        session.open_service("//venue/nonexistent").await.unwrap();
        let failed = events.recv().await.unwrap();
        assert_eq!(
            failed.messages[0].message_type,
            MessageType::ServiceOpenFailure
        );
    }

    #[tokio::test]
    async fn responses_carry_the_request_token() {
        let (session, mut events) = SimSession::connect(SimConfig::default());
        let _started = events.recv().await.unwrap();

        let token = CorrelationToken::mint();
        session
            .send_request(broker_spec_request(1234), token)
            .await
            .unwrap();

        let response = events.recv().await.unwrap();
        assert_eq!(response.category, EventCategory::Response);
        assert_eq!(response.messages[0].correlation, Some(token));
        assert_eq!(
            response.messages[0].message_type,
            MessageType::BrokerSpecReport
        );
    }

    #[tokio::test]
    async fn calls_after_stop_are_rejected() {
        let (session, mut events) = SimSession::connect(SimConfig::default());
        let _started = events.recv().await.unwrap();

        session.stop().await.unwrap();
        let terminated = events.recv().await.unwrap();
        assert_eq!(
            terminated.messages[0].message_type,
            MessageType::SessionTerminated
        );

        let err = session.open_service("//venue/order-entry").await;
        assert_eq!(err, Err(SessionError::Closed));
    }
}
