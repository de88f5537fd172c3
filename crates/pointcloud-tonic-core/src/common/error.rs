//! Error types for the clustering service.
//!
//! This module defines the central `Error` enum, which captures all
//! reportable error cases within the streaming pipeline. It implements
//! `From<Error>` for `tonic::Status` to enable gRPC error propagation to
//! clients with appropriate status codes and messages.
//!
//! ## Error Cases
//! - `Transport`: The duplex stream failed mid-flight (read or write side).
//! - `Channel`: An internal communication failure between tasks.
//! - `Percentile`: Threshold derivation failed (empty distribution or an
//!   out-of-range percentile).
//! - `RequestCancelled`: The client canceled the stream mid-flight.
//! - `InvalidRequest`: A chunk was malformed or exceeded bounds.
//! - `ServiceShutdown`: A stream arrived while the service was shutting down.

use tonic::Status;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the clustering service.
#[derive(Clone, thiserror::Error, Debug)]
pub enum Error {
    /// The underlying duplex stream failed; terminal for the session.
    #[error("Transport error: {context}")]
    Transport { context: String },

    /// Internal channel send/receive failure (e.g., closed channel).
    #[error("Channel error: {context}")]
    Channel { context: String },

    /// Percentile threshold derivation failed.
    #[error("Percentile error: {0}")]
    Percentile(#[from] pointcloud_stats::Error),

    /// The client aborted the stream.
    #[error("Request cancelled by client")]
    RequestCancelled,

    /// The client request was invalid or exceeded constraints.
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::Transport { context } => {
                Status::unavailable(format!("Transport error: {context}"))
            }
            Error::Channel { context } => Status::internal(format!("Channel error: {context}")),
            Error::Percentile(e) => match e {
                pointcloud_stats::Error::EmptyDistribution => {
                    Status::cancelled("Percentile requested on an empty distribution")
                }
                pointcloud_stats::Error::InvalidPercentile(p) => {
                    Status::invalid_argument(format!("Percentile {p} out of range"))
                }
            },
            Error::RequestCancelled => Status::cancelled("Request was cancelled"),
            Error::InvalidRequest { reason } => Status::invalid_argument(reason),
            Error::ServiceShutdown => Status::unavailable("Service is shutting down"),
        }
    }
}
