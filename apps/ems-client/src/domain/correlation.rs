//! Correlation Tokens
//!
//! Opaque identifiers minted by the caller and attached to outbound
//! requests and subscriptions. Inbound messages carry the token of the
//! request that produced them; matching is by value equality only.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque caller-minted identifier linking a request to its responses.
///
/// Tokens compare by value. Two tokens minted independently are never
/// equal; a token cloned or copied from another always is. There is no
/// ordering contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationToken(Uuid);

impl CorrelationToken {
    /// Mint a fresh token, unique for the lifetime of the process.
    #[must_use]
    pub fn mint() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short prefix keeps log lines readable; full value stays in Debug.
        let full = self.0.simple().to_string();
        f.write_str(&full[..8])
    }
}
