//! Error types for hub operations.

use std::time::Duration;

use crate::filter::PinFilter;
use crate::transport::TransportError;

/// Result type for hub operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced to callers of the hub.
///
/// Malformed inbound traffic is deliberately not represented here: an update
/// on an unexpected topic or with an undecodable payload is logged and
/// dropped by the dispatch path, and must never abort it.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Two filters in one wait set could both be satisfied by a single
    /// update. Raised before anything is published.
    #[error("conflicting filters: {first} overlaps {second}")]
    FilterConflict { first: PinFilter, second: PinFilter },

    /// The wait deadline elapsed with filters still unsatisfied. The cache
    /// already reflects any partial updates received before the deadline.
    #[error("no matching update within {0:?}")]
    Timeout(Duration),

    /// The wait was torn down before a result was produced.
    #[error("wait cancelled before a result arrived")]
    Cancelled,

    /// The hub has not subscribed to the update stream yet.
    #[error("hub is not started")]
    NotStarted,

    /// Publish or subscription failure in the underlying transport.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Command payload could not be encoded.
    #[error("payload encoding error: {0}")]
    Payload(#[from] serde_json::Error),
}
