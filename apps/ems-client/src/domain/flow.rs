//! Flow State Machines
//!
//! Pure transition logic for the two lifecycles a client program drives:
//! the shared startup sequence (session up, service open) and the
//! per-correlation-token request or subscription flow. Handlers consult
//! these types instead of branching ad hoc, so ordering rules live in
//! one place and invalid transitions cannot be expressed.

use serde::Serialize;

// =============================================================================
// Failure Taxonomy
// =============================================================================

/// Why a flow reached its `Failed` state.
///
/// Every failure is terminal for the flow that carries it; there is no
/// retry policy anywhere in this client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FailureReason {
    /// The session never started.
    SessionStartup,
    /// The session ended while the flow was live.
    SessionTerminated,
    /// The target service failed to open.
    ServiceOpen,
    /// The outbound send or subscribe call itself failed.
    Send(String),
    /// The subscription could not be started.
    Subscription(String),
    /// The server terminated an established subscription.
    SubscriptionTerminated,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SessionStartup => f.write_str("session startup failed"),
            Self::SessionTerminated => f.write_str("session terminated"),
            Self::ServiceOpen => f.write_str("service failed to open"),
            Self::Send(detail) => write!(f, "send failed: {detail}"),
            Self::Subscription(detail) => write!(f, "subscription failed: {detail}"),
            Self::SubscriptionTerminated => f.write_str("subscription terminated by server"),
        }
    }
}

// =============================================================================
// Startup Phase
// =============================================================================

/// The shared session/service startup sequence.
///
/// `Idle` until the session reports started, `ServiceOpening` while the
/// asynchronous service open is in flight, `Ready` once the service
/// opened and the single outbound action has been issued. `Failed` is
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupPhase {
    /// Waiting for the session to start.
    Idle,
    /// Service open requested, completion pending.
    ServiceOpening,
    /// Service opened; the outbound action has been dispatched.
    Ready,
    /// Startup failed; nothing further will be sent.
    Failed,
}

impl StartupPhase {
    /// Whether this phase accepts no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Check a transition against the startup sequence.
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::ServiceOpening)
                | (Self::ServiceOpening, Self::Ready)
                | (Self::Idle | Self::ServiceOpening | Self::Ready, Self::Failed)
        )
    }
}

// =============================================================================
// Per-Token Flow State
// =============================================================================

/// State of one correlated request or subscription flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowState {
    /// One-shot request sent; response pending.
    AwaitingResponse,
    /// Subscribe call issued; start confirmation pending.
    AwaitingStart,
    /// Subscription confirmed; updates flowing.
    Streaming,
    /// One-shot flow finished (success or business error).
    Completed,
    /// Flow ended in failure.
    Failed(FailureReason),
}

impl FlowState {
    /// Whether this flow accepts no further transitions.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_))
    }

    /// Whether this flow still expects inbound traffic.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        !self.is_terminal()
    }

    /// Check a transition against the flow lifecycle.
    #[must_use]
    pub fn can_advance_to(&self, next: &Self) -> bool {
        matches!(
            (self, next),
            (Self::AwaitingResponse, Self::Completed)
                | (Self::AwaitingStart, Self::Streaming)
                | (
                    Self::AwaitingResponse | Self::AwaitingStart | Self::Streaming,
                    Self::Failed(_)
                )
        )
    }
}
