//! Session Event Dispatcher
//!
//! The reusable core of every client program: classify inbound events by
//! category and message type, drive the startup sequence, correlate
//! responses and subscription traffic back to the requests that caused
//! them, and convert every failure into a terminal state plus a reported
//! reason.
//!
//! # Lifecycle
//!
//! ```text
//! SessionStarted ──► open service ──► ServiceOpened ──► send request
//!                                                       or start chain
//!
//! one-shot:      AwaitingResponse ──► Completed (response matched)
//! subscription:  AwaitingStart ──► Streaming ──► Failed (server ends it)
//! any stage:     startup/send/subscription failure ──► Failed
//! ```
//!
//! Handlers run on whatever task drains the event channel; state lives
//! behind one mutex so transitions stay serialized even if an SDK
//! adapter delivers from a pool. No handler blocks waiting for another
//! event; cross-event sequencing is expressed in the state machine.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::domain::correlation::CorrelationToken;
use crate::domain::event::{Event, EventCategory, MessageType, SubscriptionStatusCode};
use crate::domain::field::FieldMap;
use crate::domain::flow::{FailureReason, FlowState, StartupPhase};
use crate::domain::report::Report;
use crate::domain::request::{Request, SubscriptionSpec, SubscriptionTopic};

use super::ports::SessionHandle;

// =============================================================================
// Configuration
// =============================================================================

/// The single outbound action a flow issues once its service is ready.
#[derive(Debug, Clone)]
pub enum FlowAction {
    /// Send one request and wait for its response.
    Request(Request),
    /// Start subscriptions in dependency order: each element is only
    /// subscribed after the previous one is confirmed started.
    Subscribe(Vec<SubscriptionSpec>),
}

/// Configuration of one dispatcher run.
#[derive(Debug, Clone)]
pub struct FlowConfig {
    /// Service the flow targets.
    pub service: String,
    /// The action to perform once the service opens.
    pub action: FlowAction,
}

// =============================================================================
// Outputs
// =============================================================================

/// Signal returned by every handler: keep dispatching or stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Keep processing events.
    Continue,
    /// The flow reached a terminal state; stop dispatching.
    Stop,
}

/// Progress and completion notifications emitted to the consumer.
///
/// This channel replaces the quit flags of callback-style clients: the
/// caller awaits `Completed`/`Failed` instead of polling shared state.
#[derive(Debug, Clone)]
pub enum FlowUpdate {
    /// The target service opened and the outbound action was issued.
    ServiceOpened,
    /// A subscription was confirmed started.
    SubscriptionStarted {
        /// Token of the subscription flow.
        token: CorrelationToken,
        /// Stream topic.
        topic: SubscriptionTopic,
    },
    /// Keep-alive on an idle subscription.
    Heartbeat {
        /// Token of the subscription flow.
        token: CorrelationToken,
    },
    /// The initial snapshot of a subscription is complete.
    InitialPaintComplete {
        /// Token of the subscription flow.
        token: CorrelationToken,
    },
    /// A live field update on a subscription.
    SubscriptionUpdate {
        /// Token of the subscription flow.
        token: CorrelationToken,
        /// Stream topic.
        topic: SubscriptionTopic,
        /// Field snapshot, passed through undecoded.
        fields: FieldMap,
    },
    /// One subscription ended; sibling flows are unaffected.
    SubscriptionEnded {
        /// Token of the subscription flow.
        token: CorrelationToken,
        /// Stream topic.
        topic: SubscriptionTopic,
        /// Why the stream ended.
        reason: FailureReason,
    },
    /// The one-shot flow finished; business errors arrive here as data.
    Completed(Report),
    /// The flow failed; terminal.
    Failed(FailureReason),
}

// =============================================================================
// Internal State
// =============================================================================

/// What kind of flow a token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlowKind {
    OneShot,
    Subscription(SubscriptionTopic),
}

#[derive(Debug)]
struct TrackedFlow {
    state: FlowState,
    kind: FlowKind,
}

#[derive(Debug)]
struct DispatchState {
    startup: StartupPhase,
    flows: HashMap<CorrelationToken, TrackedFlow>,
    /// Chain elements not yet subscribed, in dependency order.
    pending: VecDeque<SubscriptionSpec>,
    /// Set once a terminal update has been emitted.
    done: bool,
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Classifies inbound events and drives one logical flow against an
/// opaque venue session.
pub struct SessionEventDispatcher {
    session: Arc<dyn SessionHandle>,
    config: FlowConfig,
    updates: mpsc::Sender<FlowUpdate>,
    state: Mutex<DispatchState>,
}

impl SessionEventDispatcher {
    /// Create a dispatcher for one flow.
    #[must_use]
    pub fn new(
        session: Arc<dyn SessionHandle>,
        config: FlowConfig,
        updates: mpsc::Sender<FlowUpdate>,
    ) -> Self {
        let pending = match &config.action {
            FlowAction::Request(_) => VecDeque::new(),
            FlowAction::Subscribe(chain) => chain.iter().cloned().collect(),
        };
        Self {
            session,
            config,
            updates,
            state: Mutex::new(DispatchState {
                startup: StartupPhase::Idle,
                flows: HashMap::new(),
                pending,
                done: false,
            }),
        }
    }

    /// Dispatch one inbound event.
    ///
    /// Never panics past this boundary: session-layer failures inside
    /// handlers are caught, logged, and become terminal failures for the
    /// affected flow.
    pub async fn on_event(&self, event: &Event) -> Disposition {
        match event.category {
            EventCategory::SessionStatus => self.handle_session_status(event).await,
            EventCategory::ServiceStatus => self.handle_service_status(event).await,
            EventCategory::SubscriptionStatus => self.handle_subscription_status(event).await,
            EventCategory::SubscriptionData => self.handle_subscription_data(event).await,
            EventCategory::Response => self.handle_response(event).await,
            EventCategory::Admin => Self::handle_admin(event),
            EventCategory::Misc => Self::handle_misc(event),
        }
    }

    // -------------------------------------------------------------------------
    // Category handlers
    // -------------------------------------------------------------------------

    async fn handle_session_status(&self, event: &Event) -> Disposition {
        for message in &event.messages {
            match message.message_type {
                MessageType::SessionStarted => {
                    let proceed = {
                        let mut state = self.state.lock();
                        if state.startup == StartupPhase::Idle {
                            state.startup = StartupPhase::ServiceOpening;
                            true
                        } else {
                            tracing::warn!(
                                phase = ?state.startup,
                                "Unexpected SessionStarted; ignoring"
                            );
                            false
                        }
                    };
                    if proceed {
                        tracing::info!(service = %self.config.service, "Session started; opening service");
                        if let Err(e) = self.session.open_service(&self.config.service).await {
                            tracing::error!(error = %e, "Service open call failed");
                            return self.fail(FailureReason::ServiceOpen).await;
                        }
                    }
                }
                MessageType::SessionStartupFailure => {
                    tracing::error!("Session startup failed");
                    return self.fail(FailureReason::SessionStartup).await;
                }
                MessageType::SessionTerminated => {
                    tracing::warn!("Session terminated");
                    return self.fail(FailureReason::SessionTerminated).await;
                }
                MessageType::SessionConnectionUp => {
                    tracing::info!("Session connection is up");
                }
                MessageType::SessionConnectionDown => {
                    tracing::warn!("Session connection is down");
                }
                ref other => {
                    tracing::debug!(message_type = %other, "Ignoring session status message");
                }
            }
        }
        Disposition::Continue
    }

    async fn handle_service_status(&self, event: &Event) -> Disposition {
        for message in &event.messages {
            match message.message_type {
                MessageType::ServiceOpened => {
                    let proceed = {
                        let mut state = self.state.lock();
                        if state.startup.can_advance_to(StartupPhase::Ready) {
                            state.startup = StartupPhase::Ready;
                            true
                        } else {
                            tracing::warn!(
                                phase = ?state.startup,
                                "Unexpected ServiceOpened; ignoring"
                            );
                            false
                        }
                    };
                    if proceed {
                        tracing::info!(service = %self.config.service, "Service opened");
                        let _ = self.updates.send(FlowUpdate::ServiceOpened).await;
                        let disposition = self.launch_action().await;
                        if disposition == Disposition::Stop {
                            return Disposition::Stop;
                        }
                    }
                }
                MessageType::ServiceOpenFailure => {
                    tracing::error!(service = %self.config.service, "Service failed to open");
                    return self.fail(FailureReason::ServiceOpen).await;
                }
                ref other => {
                    tracing::debug!(message_type = %other, "Ignoring service status message");
                }
            }
        }
        Disposition::Continue
    }

    async fn handle_subscription_status(&self, event: &Event) -> Disposition {
        let mut disposition = Disposition::Continue;
        for message in &event.messages {
            let Some(token) = message.correlation else {
                tracing::debug!(
                    message_type = %message.message_type,
                    "Subscription status without correlation token; ignoring"
                );
                continue;
            };
            match message.message_type {
                MessageType::SubscriptionStarted => {
                    let topic = {
                        let mut state = self.state.lock();
                        match state.flows.get_mut(&token) {
                            Some(flow) if flow.state.can_advance_to(&FlowState::Streaming) => {
                                flow.state = FlowState::Streaming;
                                match flow.kind {
                                    FlowKind::Subscription(topic) => Some(topic),
                                    FlowKind::OneShot => None,
                                }
                            }
                            _ => None,
                        }
                    };
                    let Some(topic) = topic else {
                        tracing::debug!(%token, "SubscriptionStarted for unknown token; ignoring");
                        continue;
                    };
                    tracing::info!(%token, %topic, "Subscription started");
                    let _ = self
                        .updates
                        .send(FlowUpdate::SubscriptionStarted { token, topic })
                        .await;
                    // Dependency ordering: only now start the next element.
                    disposition = self.start_next_subscription().await;
                    if disposition == Disposition::Stop {
                        return disposition;
                    }
                }
                MessageType::SubscriptionFailure => {
                    tracing::error!(%token, "Subscription failed");
                    disposition = self
                        .fail_flow(
                            token,
                            FailureReason::Subscription("reported by venue".to_string()),
                        )
                        .await;
                    if disposition == Disposition::Stop {
                        return disposition;
                    }
                }
                MessageType::SubscriptionTerminated => {
                    tracing::warn!(%token, "Subscription terminated by server");
                    disposition = self
                        .fail_flow(token, FailureReason::SubscriptionTerminated)
                        .await;
                    if disposition == Disposition::Stop {
                        return disposition;
                    }
                }
                ref other => {
                    tracing::debug!(message_type = %other, "Ignoring subscription status message");
                }
            }
        }
        disposition
    }

    async fn handle_subscription_data(&self, event: &Event) -> Disposition {
        for message in &event.messages {
            let Some(token) = message.correlation else {
                tracing::debug!("Subscription data without correlation token; ignoring");
                continue;
            };
            let topic = {
                let state = self.state.lock();
                match state.flows.get(&token) {
                    Some(TrackedFlow {
                        state: FlowState::Streaming,
                        kind: FlowKind::Subscription(topic),
                    }) => Some(*topic),
                    _ => None,
                }
            };
            let Some(topic) = topic else {
                tracing::debug!(%token, "Subscription data for unknown token; ignoring");
                continue;
            };
            match SubscriptionStatusCode::from_message(message) {
                SubscriptionStatusCode::Heartbeat => {
                    let _ = self.updates.send(FlowUpdate::Heartbeat { token }).await;
                }
                SubscriptionStatusCode::EndOfInitialPaint => {
                    tracing::info!(%token, %topic, "Initial paint complete");
                    let _ = self
                        .updates
                        .send(FlowUpdate::InitialPaintComplete { token })
                        .await;
                }
                SubscriptionStatusCode::Update(_) => {
                    let _ = self
                        .updates
                        .send(FlowUpdate::SubscriptionUpdate {
                            token,
                            topic,
                            fields: message.fields.clone(),
                        })
                        .await;
                }
            }
        }
        Disposition::Continue
    }

    async fn handle_response(&self, event: &Event) -> Disposition {
        for message in &event.messages {
            let Some(token) = message.correlation else {
                tracing::debug!(
                    message_type = %message.message_type,
                    "Response without correlation token; ignoring"
                );
                continue;
            };
            let matched = {
                let state = self.state.lock();
                matches!(
                    state.flows.get(&token),
                    Some(TrackedFlow {
                        state: FlowState::AwaitingResponse,
                        kind: FlowKind::OneShot,
                    })
                )
            };
            if !matched {
                tracing::debug!(%token, "Response for unknown or finished token; ignoring");
                continue;
            }
            match Report::decode(message) {
                Ok(report) => return self.complete(token, report).await,
                Err(e) => {
                    // Protocol anomaly: the token matched but the payload
                    // is not a known response shape. Keep waiting.
                    tracing::warn!(%token, error = %e, "Undecodable response message; ignoring");
                }
            }
        }
        Disposition::Continue
    }

    fn handle_admin(event: &Event) -> Disposition {
        for message in &event.messages {
            match message.message_type {
                MessageType::SlowConsumerWarning => {
                    tracing::warn!("Entered slow consumer status");
                }
                MessageType::SlowConsumerWarningCleared => {
                    tracing::info!("Slow consumer status cleared");
                }
                ref other => {
                    tracing::debug!(message_type = %other, "Ignoring admin message");
                }
            }
        }
        Disposition::Continue
    }

    fn handle_misc(event: &Event) -> Disposition {
        for message in &event.messages {
            tracing::debug!(
                message_type = %message.message_type,
                "Unhandled event message"
            );
        }
        Disposition::Continue
    }

    // -------------------------------------------------------------------------
    // Actions and terminal transitions
    // -------------------------------------------------------------------------

    /// Issue the configured outbound action. Called exactly once, on the
    /// ServiceOpening → Ready transition.
    async fn launch_action(&self) -> Disposition {
        match &self.config.action {
            FlowAction::Request(request) => {
                let token = CorrelationToken::mint();
                {
                    let mut state = self.state.lock();
                    state.flows.insert(
                        token,
                        TrackedFlow {
                            state: FlowState::AwaitingResponse,
                            kind: FlowKind::OneShot,
                        },
                    );
                }
                tracing::info!(%token, operation = %request.operation, "Sending request");
                if let Err(e) = self.session.send_request(request.clone(), token).await {
                    tracing::error!(%token, error = %e, "Send failed");
                    return self.fail(FailureReason::Send(e.to_string())).await;
                }
                Disposition::Continue
            }
            FlowAction::Subscribe(_) => self.start_next_subscription().await,
        }
    }

    /// Start the next pending chain element, if any.
    async fn start_next_subscription(&self) -> Disposition {
        let Some(spec) = self.state.lock().pending.pop_front() else {
            return Disposition::Continue;
        };
        let token = CorrelationToken::mint();
        let topic = spec.topic;
        {
            let mut state = self.state.lock();
            state.flows.insert(
                token,
                TrackedFlow {
                    state: FlowState::AwaitingStart,
                    kind: FlowKind::Subscription(topic),
                },
            );
        }
        tracing::info!(%token, %topic, "Starting subscription");
        if let Err(e) = self.session.subscribe(spec, token).await {
            tracing::error!(%token, %topic, error = %e, "Subscribe call failed");
            return self.fail_flow(token, FailureReason::Send(e.to_string())).await;
        }
        Disposition::Continue
    }

    /// Complete a one-shot flow with its decoded report.
    async fn complete(&self, token: CorrelationToken, report: Report) -> Disposition {
        {
            let mut state = self.state.lock();
            if state.done {
                return Disposition::Stop;
            }
            state.done = true;
            if let Some(flow) = state.flows.get_mut(&token) {
                flow.state = FlowState::Completed;
            }
        }
        if let Report::Error(error) = &report {
            tracing::warn!(%token, code = error.code, message = %error.message, "Business error response");
        } else {
            tracing::info!(%token, "Request completed");
        }
        let _ = self.updates.send(FlowUpdate::Completed(report)).await;
        if let Err(e) = self.session.stop().await {
            tracing::debug!(error = %e, "Session stop after completion");
        }
        Disposition::Stop
    }

    /// Fail one token's flow, leaving sibling flows untouched. Stops the
    /// whole run only when nothing live remains.
    async fn fail_flow(&self, token: CorrelationToken, reason: FailureReason) -> Disposition {
        let (topic, any_live) = {
            let mut state = self.state.lock();
            let Some(flow) = state.flows.get_mut(&token) else {
                tracing::debug!(%token, "Failure for unknown token; ignoring");
                return Disposition::Continue;
            };
            if flow.state.is_terminal() {
                return Disposition::Continue;
            }
            // A chain head dying before confirmation strands the rest of
            // the chain; abandon it.
            if flow.state == FlowState::AwaitingStart {
                state.pending.clear();
            }
            let Some(flow) = state.flows.get_mut(&token) else {
                return Disposition::Continue;
            };
            flow.state = FlowState::Failed(reason.clone());
            let topic = match flow.kind {
                FlowKind::Subscription(topic) => Some(topic),
                FlowKind::OneShot => None,
            };
            let any_live = state.flows.values().any(|f| f.state.is_live())
                || !state.pending.is_empty();
            (topic, any_live)
        };
        if let Some(topic) = topic {
            let _ = self
                .updates
                .send(FlowUpdate::SubscriptionEnded {
                    token,
                    topic,
                    reason: reason.clone(),
                })
                .await;
        }
        if any_live {
            return Disposition::Continue;
        }
        self.fail(reason).await
    }

    /// Terminal failure of the whole run.
    async fn fail(&self, reason: FailureReason) -> Disposition {
        {
            let mut state = self.state.lock();
            if state.done {
                return Disposition::Stop;
            }
            state.done = true;
            state.startup = StartupPhase::Failed;
            for flow in state.flows.values_mut() {
                if flow.state.is_live() {
                    flow.state = FlowState::Failed(reason.clone());
                }
            }
            state.pending.clear();
        }
        tracing::error!(%reason, "Flow failed");
        let _ = self.updates.send(FlowUpdate::Failed(reason)).await;
        if let Err(e) = self.session.stop().await {
            tracing::debug!(error = %e, "Session stop after failure");
        }
        Disposition::Stop
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::application::ports::SessionError;
    use crate::domain::event::Message;
    use crate::domain::request::{broker_spec_request, order_route_chain};
    use async_trait::async_trait;

    /// Records every session call for assertions.
    #[derive(Debug, Default)]
    struct RecordingSession {
        calls: Mutex<Vec<Call>>,
        fail_sends: bool,
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        OpenService(String),
        Send(Request, CorrelationToken),
        Subscribe(SubscriptionTopic, CorrelationToken),
        Stop,
    }

    impl RecordingSession {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().clone()
        }

        fn sent_tokens(&self) -> Vec<CorrelationToken> {
            self.calls()
                .into_iter()
                .filter_map(|call| match call {
                    Call::Send(_, token) | Call::Subscribe(_, token) => Some(token),
                    _ => None,
                })
                .collect()
        }
    }

    #[async_trait]
    impl SessionHandle for RecordingSession {
        async fn open_service(&self, service: &str) -> Result<(), SessionError> {
            self.calls.lock().push(Call::OpenService(service.to_string()));
            Ok(())
        }

        async fn send_request(
            &self,
            request: Request,
            token: CorrelationToken,
        ) -> Result<(), SessionError> {
            if self.fail_sends {
                return Err(SessionError::Call("wire down".to_string()));
            }
            self.calls.lock().push(Call::Send(request, token));
            Ok(())
        }

        async fn subscribe(
            &self,
            spec: SubscriptionSpec,
            token: CorrelationToken,
        ) -> Result<(), SessionError> {
            self.calls.lock().push(Call::Subscribe(spec.topic, token));
            Ok(())
        }

        async fn stop(&self) -> Result<(), SessionError> {
            self.calls.lock().push(Call::Stop);
            Ok(())
        }
    }

    fn request_dispatcher(
        session: Arc<RecordingSession>,
    ) -> (SessionEventDispatcher, mpsc::Receiver<FlowUpdate>) {
        let (tx, rx) = mpsc::channel(32);
        let dispatcher = SessionEventDispatcher::new(
            session,
            FlowConfig {
                service: "//venue/order-entry".to_string(),
                action: FlowAction::Request(broker_spec_request(1234)),
            },
            tx,
        );
        (dispatcher, rx)
    }

    fn session_started() -> Event {
        Event::single(
            EventCategory::SessionStatus,
            Message::new(MessageType::SessionStarted),
        )
    }

    fn service_opened() -> Event {
        Event::single(
            EventCategory::ServiceStatus,
            Message::new(MessageType::ServiceOpened),
        )
    }

    #[tokio::test]
    async fn session_started_opens_the_service_exactly_once() {
        let session = Arc::new(RecordingSession::default());
        let (dispatcher, _rx) = request_dispatcher(Arc::clone(&session));

        assert_eq!(
            dispatcher.on_event(&session_started()).await,
            Disposition::Continue
        );
        assert_eq!(
            session.calls(),
            vec![Call::OpenService("//venue/order-entry".to_string())]
        );

        // A duplicate start message is an anomaly, not a second open.
        dispatcher.on_event(&session_started()).await;
        assert_eq!(session.calls().len(), 1);
    }

    #[tokio::test]
    async fn nothing_is_sent_before_the_service_opens() {
        let session = Arc::new(RecordingSession::default());
        let (dispatcher, _rx) = request_dispatcher(Arc::clone(&session));

        // Service opened before session started: out of order, ignored.
        dispatcher.on_event(&service_opened()).await;
        assert!(session.calls().is_empty());

        dispatcher.on_event(&session_started()).await;
        assert_eq!(session.calls().len(), 1);

        dispatcher.on_event(&service_opened()).await;
        let calls = session.calls();
        assert_eq!(calls.len(), 2);
        assert!(matches!(calls[1], Call::Send(_, _)));
    }

    #[tokio::test]
    async fn unknown_tokens_produce_no_effect() {
        let session = Arc::new(RecordingSession::default());
        let (dispatcher, mut rx) = request_dispatcher(Arc::clone(&session));

        dispatcher.on_event(&session_started()).await;
        dispatcher.on_event(&service_opened()).await;
        let calls_before = session.calls();

        let stray = Event::single(
            EventCategory::Response,
            Message::new(MessageType::ErrorInfo)
                .with_correlation(CorrelationToken::mint())
                .with_field("errorCode", 7_i64)
                .with_field("errorMessage", "bad field"),
        );
        assert_eq!(dispatcher.on_event(&stray).await, Disposition::Continue);
        assert_eq!(session.calls(), calls_before);
        // Only the ServiceOpened progress update was emitted.
        assert!(matches!(rx.try_recv(), Ok(FlowUpdate::ServiceOpened)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn matched_error_response_completes_and_stops_once() {
        let session = Arc::new(RecordingSession::default());
        let (dispatcher, mut rx) = request_dispatcher(Arc::clone(&session));

        dispatcher.on_event(&session_started()).await;
        dispatcher.on_event(&service_opened()).await;
        let token = session.sent_tokens()[0];

        let response = Event::single(
            EventCategory::Response,
            Message::new(MessageType::ErrorInfo)
                .with_correlation(token)
                .with_field("errorCode", 7_i64)
                .with_field("errorMessage", "bad field"),
        );
        assert_eq!(dispatcher.on_event(&response).await, Disposition::Stop);

        let stops = session
            .calls()
            .into_iter()
            .filter(|call| *call == Call::Stop)
            .count();
        assert_eq!(stops, 1);

        assert!(matches!(rx.recv().await, Some(FlowUpdate::ServiceOpened)));
        match rx.recv().await {
            Some(FlowUpdate::Completed(Report::Error(error))) => {
                assert_eq!(error.code, 7);
                assert_eq!(error.message, "bad field");
            }
            other => panic!("unexpected update: {other:?}"),
        }

        // Idempotent termination: a replayed response changes nothing.
        assert_eq!(dispatcher.on_event(&response).await, Disposition::Continue);
        assert_eq!(
            session
                .calls()
                .into_iter()
                .filter(|call| *call == Call::Stop)
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn send_failure_is_terminal_without_retry() {
        let session = Arc::new(RecordingSession {
            fail_sends: true,
            ..RecordingSession::default()
        });
        let (dispatcher, mut rx) = request_dispatcher(Arc::clone(&session));

        dispatcher.on_event(&session_started()).await;
        assert_eq!(
            dispatcher.on_event(&service_opened()).await,
            Disposition::Stop
        );

        assert!(matches!(rx.recv().await, Some(FlowUpdate::ServiceOpened)));
        match rx.recv().await {
            Some(FlowUpdate::Failed(FailureReason::Send(detail))) => {
                assert!(detail.contains("wire down"));
            }
            other => panic!("unexpected update: {other:?}"),
        }
    }

    fn subscription_dispatcher(
        session: Arc<RecordingSession>,
    ) -> (SessionEventDispatcher, mpsc::Receiver<FlowUpdate>) {
        let (tx, rx) = mpsc::channel(32);
        let dispatcher = SessionEventDispatcher::new(
            session,
            FlowConfig {
                service: "//venue/order-entry".to_string(),
                action: FlowAction::Subscribe(order_route_chain()),
            },
            tx,
        );
        (dispatcher, rx)
    }

    fn subscription_status(token: CorrelationToken, message_type: MessageType) -> Event {
        Event::single(
            EventCategory::SubscriptionStatus,
            Message::new(message_type).with_correlation(token),
        )
    }

    #[tokio::test]
    async fn route_stream_starts_only_after_order_stream_confirms() {
        let session = Arc::new(RecordingSession::default());
        let (dispatcher, _rx) = subscription_dispatcher(Arc::clone(&session));

        dispatcher.on_event(&session_started()).await;
        dispatcher.on_event(&service_opened()).await;

        let calls = session.calls();
        assert_eq!(calls.len(), 2);
        let Call::Subscribe(SubscriptionTopic::Order, order_token) = calls[1] else {
            panic!("expected order subscribe, got {:?}", calls[1]);
        };

        dispatcher
            .on_event(&subscription_status(
                order_token,
                MessageType::SubscriptionStarted,
            ))
            .await;

        let calls = session.calls();
        assert_eq!(calls.len(), 3);
        assert!(matches!(
            calls[2],
            Call::Subscribe(SubscriptionTopic::Route, _)
        ));
    }

    #[tokio::test]
    async fn one_stream_dying_leaves_the_sibling_alone() {
        let session = Arc::new(RecordingSession::default());
        let (dispatcher, mut rx) = subscription_dispatcher(Arc::clone(&session));

        dispatcher.on_event(&session_started()).await;
        dispatcher.on_event(&service_opened()).await;
        let order_token = session.sent_tokens()[0];
        dispatcher
            .on_event(&subscription_status(
                order_token,
                MessageType::SubscriptionStarted,
            ))
            .await;
        let route_token = session.sent_tokens()[1];
        dispatcher
            .on_event(&subscription_status(
                route_token,
                MessageType::SubscriptionStarted,
            ))
            .await;

        // Server terminates the route stream only.
        let disposition = dispatcher
            .on_event(&subscription_status(
                route_token,
                MessageType::SubscriptionTerminated,
            ))
            .await;
        assert_eq!(disposition, Disposition::Continue);

        // Order heartbeats still flow.
        let heartbeat = Event::single(
            EventCategory::SubscriptionData,
            Message::new(MessageType::OrderRouteFields)
                .with_correlation(order_token)
                .with_field("eventStatus", 1_i64),
        );
        assert_eq!(dispatcher.on_event(&heartbeat).await, Disposition::Continue);

        let mut saw_route_end = false;
        let mut saw_order_heartbeat = false;
        while let Ok(update) = rx.try_recv() {
            match update {
                FlowUpdate::SubscriptionEnded { token, topic, .. } => {
                    assert_eq!(token, route_token);
                    assert_eq!(topic, SubscriptionTopic::Route);
                    saw_route_end = true;
                }
                FlowUpdate::Heartbeat { token } => {
                    assert_eq!(token, order_token);
                    saw_order_heartbeat = true;
                }
                FlowUpdate::Failed(_) => panic!("sibling failure must not end the run"),
                _ => {}
            }
        }
        assert!(saw_route_end);
        assert!(saw_order_heartbeat);
    }

    #[tokio::test]
    async fn heartbeats_never_terminate_a_stream() {
        let session = Arc::new(RecordingSession::default());
        let (dispatcher, _rx) = subscription_dispatcher(Arc::clone(&session));

        dispatcher.on_event(&session_started()).await;
        dispatcher.on_event(&service_opened()).await;
        let order_token = session.sent_tokens()[0];
        dispatcher
            .on_event(&subscription_status(
                order_token,
                MessageType::SubscriptionStarted,
            ))
            .await;

        for _ in 0..50 {
            let heartbeat = Event::single(
                EventCategory::SubscriptionData,
                Message::new(MessageType::OrderRouteFields)
                    .with_correlation(order_token)
                    .with_field("eventStatus", 1_i64),
            );
            assert_eq!(dispatcher.on_event(&heartbeat).await, Disposition::Continue);
        }
        let paint_done = Event::single(
            EventCategory::SubscriptionData,
            Message::new(MessageType::OrderRouteFields)
                .with_correlation(order_token)
                .with_field("eventStatus", 4_i64),
        );
        assert_eq!(
            dispatcher.on_event(&paint_done).await,
            Disposition::Continue
        );
        assert!(!session.calls().contains(&Call::Stop));
    }

    #[tokio::test]
    async fn all_streams_dead_ends_the_run() {
        let session = Arc::new(RecordingSession::default());
        let (dispatcher, mut rx) = subscription_dispatcher(Arc::clone(&session));

        dispatcher.on_event(&session_started()).await;
        dispatcher.on_event(&service_opened()).await;
        let order_token = session.sent_tokens()[0];
        dispatcher
            .on_event(&subscription_status(
                order_token,
                MessageType::SubscriptionStarted,
            ))
            .await;
        let route_token = session.sent_tokens()[1];
        dispatcher
            .on_event(&subscription_status(
                route_token,
                MessageType::SubscriptionStarted,
            ))
            .await;

        dispatcher
            .on_event(&subscription_status(
                route_token,
                MessageType::SubscriptionTerminated,
            ))
            .await;
        let disposition = dispatcher
            .on_event(&subscription_status(
                order_token,
                MessageType::SubscriptionTerminated,
            ))
            .await;
        assert_eq!(disposition, Disposition::Stop);

        let mut failed = false;
        while let Ok(update) = rx.try_recv() {
            if matches!(update, FlowUpdate::Failed(_)) {
                failed = true;
            }
        }
        assert!(failed);
    }

    #[tokio::test]
    async fn admin_and_misc_events_are_inert() {
        let session = Arc::new(RecordingSession::default());
        let (dispatcher, _rx) = request_dispatcher(Arc::clone(&session));

        let admin = Event::single(
            EventCategory::Admin,
            Message::new(MessageType::SlowConsumerWarning),
        );
        let misc = Event::single(
            EventCategory::Misc,
            Message::new(MessageType::Other("VendorNoise".to_string())),
        );
        assert_eq!(dispatcher.on_event(&admin).await, Disposition::Continue);
        assert_eq!(dispatcher.on_event(&misc).await, Disposition::Continue);
        assert!(session.calls().is_empty());
    }
}
