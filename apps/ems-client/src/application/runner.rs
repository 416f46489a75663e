//! Flow Runner
//!
//! Drives a dispatcher from an event channel and turns its update stream
//! into an awaitable outcome. Request-style programs wait for exactly
//! one terminal update under a deadline; subscription-style programs
//! consume the update stream until interrupted.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::domain::event::Event;
use crate::domain::flow::FailureReason;
use crate::domain::report::Report;

use super::dispatcher::{Disposition, FlowConfig, FlowUpdate, SessionEventDispatcher};
use super::ports::SessionHandle;

/// Capacity of the dispatcher update channel.
const UPDATE_CHANNEL_CAPACITY: usize = 64;

/// Terminal result of a request-style flow.
#[derive(Debug, Clone)]
pub enum FlowOutcome {
    /// The flow completed; business errors arrive here as reports.
    Completed(Report),
    /// The flow failed before completing.
    Failed(FailureReason),
    /// No terminal state arrived within the deadline.
    TimedOut,
}

/// A running flow: the dispatch loop plus its update stream.
pub struct FlowRun {
    /// Updates emitted by the dispatcher, ending with a terminal one.
    pub updates: mpsc::Receiver<FlowUpdate>,
    task: JoinHandle<()>,
}

impl FlowRun {
    /// Abort the dispatch loop without waiting for a terminal state.
    pub fn abort(&self) {
        self.task.abort();
    }
}

/// Spawn the dispatch loop for one flow.
///
/// Events are consumed until the dispatcher signals `Stop` or the event
/// channel closes (the session is gone either way).
#[must_use]
pub fn spawn_flow(
    session: Arc<dyn SessionHandle>,
    mut events: mpsc::Receiver<Event>,
    config: FlowConfig,
) -> FlowRun {
    let (updates_tx, updates_rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);
    let dispatcher = SessionEventDispatcher::new(session, config, updates_tx);
    let task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if dispatcher.on_event(&event).await == Disposition::Stop {
                break;
            }
        }
        tracing::debug!("Dispatch loop ended");
    });
    FlowRun {
        updates: updates_rx,
        task,
    }
}

/// Run a request-style flow to its terminal state under a deadline.
///
/// On timeout the session is stopped and the dispatch loop aborted; the
/// deadline is the only cancellation a one-shot flow needs.
pub async fn run_to_completion(
    session: Arc<dyn SessionHandle>,
    events: mpsc::Receiver<Event>,
    config: FlowConfig,
    deadline: Duration,
) -> FlowOutcome {
    let mut run = spawn_flow(Arc::clone(&session), events, config);

    let awaited = tokio::time::timeout(deadline, async {
        while let Some(update) = run.updates.recv().await {
            match update {
                FlowUpdate::Completed(report) => return FlowOutcome::Completed(report),
                FlowUpdate::Failed(reason) => return FlowOutcome::Failed(reason),
                other => tracing::debug!(update = ?other, "Flow progress"),
            }
        }
        // The dispatch loop ended without a terminal update: the event
        // channel closed under us.
        FlowOutcome::Failed(FailureReason::SessionTerminated)
    })
    .await;

    match awaited {
        Ok(outcome) => outcome,
        Err(_) => {
            tracing::warn!(
                deadline_secs = deadline.as_secs(),
                "Timed out awaiting flow completion; stopping session"
            );
            run.abort();
            if let Err(e) = session.stop().await {
                tracing::debug!(error = %e, "Session stop after timeout");
            }
            FlowOutcome::TimedOut
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::application::ports::SessionError;
    use crate::domain::correlation::CorrelationToken;
    use crate::domain::event::{EventCategory, Message, MessageType};
    use crate::domain::request::{Request, SubscriptionSpec, broker_spec_request};
    use async_trait::async_trait;

    /// Session stub that accepts every call and does nothing.
    #[derive(Debug, Default)]
    struct NullSession;

    #[async_trait]
    impl SessionHandle for NullSession {
        async fn open_service(&self, _service: &str) -> Result<(), SessionError> {
            Ok(())
        }

        async fn send_request(
            &self,
            _request: Request,
            _token: CorrelationToken,
        ) -> Result<(), SessionError> {
            Ok(())
        }

        async fn subscribe(
            &self,
            _spec: SubscriptionSpec,
            _token: CorrelationToken,
        ) -> Result<(), SessionError> {
            Ok(())
        }

        async fn stop(&self) -> Result<(), SessionError> {
            Ok(())
        }
    }

    fn config() -> FlowConfig {
        FlowConfig {
            service: "//venue/order-entry".to_string(),
            action: crate::application::dispatcher::FlowAction::Request(broker_spec_request(1)),
        }
    }

    #[tokio::test]
    async fn startup_failure_resolves_the_outcome() {
        let (events_tx, events_rx) = mpsc::channel(8);
        events_tx
            .send(Event::single(
                EventCategory::SessionStatus,
                Message::new(MessageType::SessionStartupFailure),
            ))
            .await
            .unwrap();

        let outcome = run_to_completion(
            Arc::new(NullSession),
            events_rx,
            config(),
            Duration::from_secs(5),
        )
        .await;

        assert!(matches!(
            outcome,
            FlowOutcome::Failed(FailureReason::SessionStartup)
        ));
    }

    #[tokio::test]
    async fn silence_times_out() {
        let (_events_tx, events_rx) = mpsc::channel::<Event>(8);

        let outcome = run_to_completion(
            Arc::new(NullSession),
            events_rx,
            config(),
            Duration::from_millis(50),
        )
        .await;

        assert!(matches!(outcome, FlowOutcome::TimedOut));
    }

    #[tokio::test]
    async fn closed_event_channel_fails_the_flow() {
        let (events_tx, events_rx) = mpsc::channel::<Event>(8);
        drop(events_tx);

        let outcome = run_to_completion(
            Arc::new(NullSession),
            events_rx,
            config(),
            Duration::from_secs(5),
        )
        .await;

        assert!(matches!(
            outcome,
            FlowOutcome::Failed(FailureReason::SessionTerminated)
        ));
    }
}
