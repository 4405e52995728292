//! Error types for the streaming broker.

use thiserror::Error;

/// Errors returned by broker and client operations.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// A client with this id is already registered.
    #[error("a client with id {id} already exists")]
    DuplicateClient {
        /// The colliding client id.
        id: String,
    },

    /// No client with this id is registered.
    #[error("no client with id {id} exists")]
    UnknownClient {
        /// The requested client id.
        id: String,
    },

    /// The write was not taken by a consumer within the client's timeout.
    #[error("failed to write to client {id}, timeout exceeded")]
    WriteTimeout {
        /// The client that did not take the write.
        id: String,
    },
}

/// Aggregate failure from a full-registry broadcast sweep.
///
/// A broadcast never aborts on the first failing client; every per-client
/// failure is collected here.
#[derive(Debug, Error)]
#[error("broadcast failed for {} client(s)", failures.len())]
pub struct FanoutError {
    /// Every per-client failure encountered during the sweep.
    pub failures: Vec<BrokerError>,
}

/// Convenience alias for broker results.
pub type Result<T> = std::result::Result<T, BrokerError>;
