//! gRPC service implementation and session coordination logic.
//!
//! This module contains the client-facing `Cluster` handler, which spawns an
//! independent session task per open duplex stream and manages streaming
//! execution, error handling, and shutdown coordination.
//!
//! ## Structure
//!
//! - [`handler`] - gRPC service entry point (`ClusterService`).

pub mod handler;
