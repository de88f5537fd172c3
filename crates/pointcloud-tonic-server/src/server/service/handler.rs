//! gRPC service implementation for streaming point-cloud clustering.
//!
//! This module defines [`ClusterService`], the concrete implementation of the
//! [`PointCloud`] duplex-streaming service defined in the protobuf
//! specification. Each open stream gets its own session task that consumes
//! chunks incrementally and streams one labeled response back per point.
//!
//! ## Responsibilities
//!
//! - Spawn one independent session task per `Cluster` stream.
//! - Refuse new streams once shutdown has begun.
//! - Track in-flight streams so shutdown can drain them gracefully.

use crate::server::{
    config::ServerConfig,
    streaming::session::{Session, run_session},
    telemetry::{
        decrement_streams_inflight, increment_requests, increment_stream_errors,
        increment_streams_inflight, record_stream_duration,
    },
};
use core::pin::Pin;
use core::time::Duration;
use pointcloud_tonic_core::{
    Error,
    proto::{ChunkRequest, ClusterResponse, point_cloud_server::PointCloud},
};
use portable_atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::{
    sync::mpsc,
    time::{sleep, timeout},
};
use tokio_stream::{Stream, wrappers::ReceiverStream};
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status, Streaming};

// Process-wide stream accounting so shutdown can drain without taking a lock
// on every session.
static STREAMS_INFLIGHT: AtomicUsize = AtomicUsize::new(0);
static SHUTTING_DOWN: AtomicBool = AtomicBool::new(false);

pub fn get_streams_inflight() -> usize {
    STREAMS_INFLIGHT.load(Ordering::Acquire)
}

fn set_global_shutdown() {
    SHUTTING_DOWN.store(true, Ordering::Release);
}

/// Duplex-streaming gRPC service for percentile-threshold clustering.
///
/// Implements the [`PointCloud`] service defined in the protobuf schema.
/// Sessions are fully independent: the Z distribution, thresholds, and
/// counters all live inside the session task for one stream, so concurrent
/// streams require no cross-session locking.
#[derive(Clone)]
pub struct ClusterService {
    config: ServerConfig,
    shutdown_token: CancellationToken,
}

impl ClusterService {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Initiates a graceful shutdown.
    ///
    /// New streams are refused immediately; in-flight sessions are given up
    /// to the configured timeout to drain before being cancelled.
    pub async fn shutdown(&self) -> Result<(), Error> {
        // === Phase 0: Stop accepting new streams ===
        #[cfg(feature = "tracing")]
        tracing::info!("Refusing new streams");
        set_global_shutdown();

        // === Phase 1: Wait for in-flight streams to drain ===
        #[cfg(feature = "tracing")]
        tracing::info!(
            "Draining in-flight streams ({} active)",
            get_streams_inflight()
        );
        let drain_result = timeout(Duration::from_secs(self.config.shutdown_timeout), async {
            while get_streams_inflight() > 0 {
                sleep(Duration::from_millis(100)).await;
            }
        })
        .await;

        match drain_result {
            Ok(()) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("All in-flight streams drained successfully");
            }
            Err(_) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    "Graceful drain timed out ({} streams still active)",
                    get_streams_inflight()
                );
            }
        }

        // === Phase 2: Cancel any remaining sessions ===
        self.shutdown_token.cancel();

        Ok(())
    }
}

#[tonic::async_trait]
impl PointCloud for ClusterService {
    type ClusterStream = Pin<Box<dyn Stream<Item = Result<ClusterResponse, Status>> + Send>>;

    /// Handles one duplex clustering stream.
    ///
    /// Spawns a session task that reads chunks as they arrive, feeds each
    /// point's Z value into the session's percentile estimator, recomputes
    /// the thresholds once per chunk, and writes one labeled response per
    /// point in arrival order. The response stream closes with OK when the
    /// client finishes its writes.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    async fn cluster(
        &self,
        req: Request<Streaming<ChunkRequest>>,
    ) -> Result<Response<Self::ClusterStream>, Status> {
        if SHUTTING_DOWN.load(Ordering::Acquire) {
            increment_stream_errors();
            return Err(Error::ServiceShutdown.into());
        }

        let start = std::time::Instant::now();
        increment_requests();
        increment_streams_inflight();
        STREAMS_INFLIGHT.fetch_add(1, Ordering::AcqRel);

        let inbound = req.into_inner();
        let (resp_tx, resp_rx) =
            mpsc::channel::<Result<ClusterResponse, Status>>(self.config.stream_buffer_size);

        let session = Session::new(&self.config);
        let shutdown = self.shutdown_token.child_token();

        let fut = async move {
            let res = run_session(inbound, resp_tx, session, shutdown).await;
            STREAMS_INFLIGHT.fetch_sub(1, Ordering::AcqRel);
            decrement_streams_inflight();
            record_stream_duration(start.elapsed().as_millis() as f64);

            match res {
                Ok(_stats) => {
                    #[cfg(feature = "tracing")]
                    tracing::info!(
                        "Session complete: {} received, {} processed, {} discarded \
                         (dura={}, cortical_surface={}, unknown={})",
                        _stats.received,
                        _stats.processed,
                        _stats.discarded,
                        _stats.dura,
                        _stats.cortical_surface,
                        _stats.unknown
                    );
                }
                Err(_e) => {
                    increment_stream_errors();
                    #[cfg(feature = "tracing")]
                    tracing::warn!("Session ended with error: {}", _e);
                }
            }
        };
        #[cfg(feature = "tracing")]
        let fut = {
            use tracing::Instrument;
            let span = tracing::info_span!("session");
            fut.instrument(span)
        };

        tokio::spawn(fut);

        Ok(Response::new(Box::pin(ReceiverStream::new(resp_rx))))
    }
}
