//! Per-stream session state and the duplex session loop.
//!
//! Each open `Cluster` stream owns exactly one [`session::Session`]; sessions
//! share no mutable state with each other or with the service object.

pub mod session;
