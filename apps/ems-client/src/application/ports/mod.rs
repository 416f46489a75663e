//! Application ports - the seam between the dispatcher and a venue SDK.
//!
//! The dispatcher drives any session implementation exposing this
//! contract: asynchronous calls in, an event stream out. Wire format,
//! authentication, and delivery guarantees live behind the
//! implementation; the bundled simulator and any real SDK adapter plug
//! in here equally.

use async_trait::async_trait;

use crate::domain::correlation::CorrelationToken;
use crate::domain::request::{Request, SubscriptionSpec};

/// Errors surfaced by session calls.
///
/// Every variant is terminal for the flow that triggered the call; the
/// dispatcher converts them into failure reports rather than letting
/// them propagate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The session rejected or could not perform a call.
    #[error("session call failed: {0}")]
    Call(String),

    /// The session is gone; no further calls will succeed.
    #[error("session closed")]
    Closed,
}

/// Handle to an opaque venue session.
///
/// Completion of `open_service` is not signalled by the returned future;
/// the session delivers a service-status event once the open resolves.
/// Likewise responses and subscription data arrive on the event stream,
/// tagged with the correlation token passed here.
#[async_trait]
pub trait SessionHandle: Send + Sync {
    /// Ask the session to open a named service.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when the request cannot be issued at all;
    /// open failures otherwise arrive as service-status events.
    async fn open_service(&self, service: &str) -> Result<(), SessionError>;

    /// Send a one-shot request tagged with a correlation token.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when the send itself fails.
    async fn send_request(
        &self,
        request: Request,
        token: CorrelationToken,
    ) -> Result<(), SessionError>;

    /// Start a standing subscription tagged with a correlation token.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when the subscribe call itself fails.
    async fn subscribe(
        &self,
        spec: SubscriptionSpec,
        token: CorrelationToken,
    ) -> Result<(), SessionError>;

    /// Stop the session. Terminal and irreversible.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when the stop cannot be delivered.
    async fn stop(&self) -> Result<(), SessionError>;
}
