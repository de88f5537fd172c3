use crate::server::{
    config::ServerConfig,
    telemetry::{increment_points_discarded, increment_points_processed, increment_points_received},
};
use futures::{Stream, StreamExt};
use pointcloud_stats::{Label, RunningPercentileEstimator, classify};
use pointcloud_tonic_core::{
    Error,
    proto::{ChunkRequest, ClusterLabel, ClusterResponse},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tonic::Status;

/// Counters accumulated over the lifetime of one stream.
///
/// A point counts as processed when it received a definitive label (DURA or
/// CORTICAL_SURFACE) and as discarded when it stayed UNKNOWN. Per-label
/// counts are kept alongside for the end-of-session summary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub received: u64,
    pub processed: u64,
    pub discarded: u64,
    pub dura: u64,
    pub cortical_surface: u64,
    pub unknown: u64,
}

/// State scoped to one open duplex stream.
///
/// Owns the growing Z-value distribution and the session counters. Created
/// when a stream opens, dropped when it closes; nothing survives across
/// streams.
pub struct Session {
    estimator: RunningPercentileEstimator,
    upper_percentile: f64,
    lower_percentile: f64,
    max_chunk_points: usize,
    stats: SessionStats,
}

impl Session {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            estimator: RunningPercentileEstimator::new(),
            upper_percentile: config.upper_percentile,
            lower_percentile: config.lower_percentile,
            max_chunk_points: config.max_chunk_points,
            stats: SessionStats::default(),
        }
    }

    /// Labels every point of one chunk, in order.
    ///
    /// The whole chunk is observed before the thresholds are recomputed, so a
    /// non-empty chunk always queries a non-empty distribution — including
    /// the very first chunk of a stream. The thresholds are derived once per
    /// chunk; labels within a chunk are mutually consistent.
    pub fn process_chunk(&mut self, chunk: &ChunkRequest) -> Result<Vec<ClusterResponse>, Error> {
        if chunk.points.len() > self.max_chunk_points {
            return Err(Error::InvalidRequest {
                reason: format!(
                    "Chunk of {} points exceeds maximum allowed ({})",
                    chunk.points.len(),
                    self.max_chunk_points
                ),
            });
        }

        if chunk.points.is_empty() {
            return Ok(Vec::new());
        }

        for point in &chunk.points {
            self.estimator.observe(point.feature());
        }

        let thresholds = self
            .estimator
            .thresholds(self.upper_percentile, self.lower_percentile)?;

        let mut responses = Vec::with_capacity(chunk.points.len());
        for point in &chunk.points {
            let label = classify(point.feature(), &thresholds);
            self.record(label);
            responses.push(ClusterResponse {
                point_id: point.id,
                label: ClusterLabel::from(label).into(),
            });
        }

        Ok(responses)
    }

    fn record(&mut self, label: Label) {
        self.stats.received += 1;
        match label {
            Label::Dura => {
                self.stats.dura += 1;
                self.stats.processed += 1;
            }
            Label::CorticalSurface => {
                self.stats.cortical_surface += 1;
                self.stats.processed += 1;
            }
            Label::Unknown => {
                self.stats.unknown += 1;
                self.stats.discarded += 1;
            }
        }
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Number of feature samples observed so far.
    ///
    /// Tracks the received point count except when NaN features arrive: those
    /// are labeled without being observed, and show up in
    /// [`Self::dropped_samples`] instead.
    pub fn observations(&self) -> usize {
        self.estimator.len()
    }

    /// NaN feature samples rejected by the estimator.
    ///
    /// `observations() + dropped_samples()` equals the received point count.
    pub fn dropped_samples(&self) -> usize {
        self.estimator.dropped()
    }
}

/// Drives one duplex stream to completion.
///
/// Reads chunks off the inbound stream as they arrive, labels them through
/// `session`, and forwards one response per point into `resp_tx` immediately
/// (responses are never buffered for the whole session). Terminates when:
///
/// - the client finishes its writes (graceful end; returns the final stats),
/// - the inbound stream reports a transport error (terminal, no retry),
/// - labeling fails (the error is surfaced to the client, then returned),
/// - the response receiver is dropped (client went away),
/// - `shutdown` fires (the session is cancelled server-side).
pub async fn run_session<S>(
    mut inbound: S,
    resp_tx: mpsc::Sender<Result<ClusterResponse, Status>>,
    mut session: Session,
    shutdown: CancellationToken,
) -> Result<SessionStats, Error>
where
    S: Stream<Item = Result<ChunkRequest, Status>> + Unpin,
{
    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                // Best effort; a client that stopped reading never sees it.
                let _ = resp_tx.try_send(Err(Error::ServiceShutdown.into()));
                return Err(Error::ServiceShutdown);
            }
            next = inbound.next() => match next {
                Some(Ok(chunk)) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        "Processing chunk with {} points ({} observed so far)",
                        chunk.points.len(),
                        session.observations()
                    );

                    let before = session.stats();
                    let responses = match session.process_chunk(&chunk) {
                        Ok(responses) => responses,
                        Err(e) => {
                            // Best effort to surface the failure to the client
                            // before tearing the session down.
                            if let Err(_e) = resp_tx.send(Err(e.clone().into())).await {
                                #[cfg(feature = "tracing")]
                                tracing::warn!("Failed to forward err: {}", _e);
                            }
                            return Err(e);
                        }
                    };

                    // The send parks when the client stops reading; shutdown
                    // must still be able to cancel a parked session.
                    for response in responses {
                        tokio::select! {
                            () = shutdown.cancelled() => {
                                let _ = resp_tx.try_send(Err(Error::ServiceShutdown.into()));
                                return Err(Error::ServiceShutdown);
                            }
                            sent = resp_tx.send(Ok(response)) => {
                                if let Err(e) = sent {
                                    return Err(Error::Channel {
                                        context: format!("Failed to forward response: {e}"),
                                    });
                                }
                            }
                        }
                    }

                    let after = session.stats();
                    increment_points_received(after.received - before.received);
                    increment_points_processed(after.processed - before.processed);
                    increment_points_discarded(after.discarded - before.discarded);
                }
                Some(Err(status)) => {
                    return Err(Error::Transport {
                        context: status.to_string(),
                    });
                }
                None => break,
            }
        }
    }

    Ok(session.stats())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pointcloud_tonic_core::proto::Point;

    fn test_config() -> ServerConfig {
        ServerConfig {
            upper_percentile: 80.0,
            lower_percentile: 20.0,
            max_chunk_points: 10_000,
            stream_buffer_size: 64,
            shutdown_timeout: 3,
            server_addr: String::new(),
            uds: false,
        }
    }

    fn points(zs: &[f64]) -> Vec<Point> {
        zs.iter()
            .enumerate()
            .map(|(i, &z)| Point {
                id: i as u64 + 1,
                x: 0.0,
                y: 0.0,
                z,
            })
            .collect()
    }

    fn chunk(zs: &[f64]) -> ChunkRequest {
        ChunkRequest { points: points(zs) }
    }

    #[test]
    fn labels_single_chunk_scenario() {
        // sorted z = [1, 2, 3, 4, 100]; p80 -> 100, p20 -> 2
        let mut session = Session::new(&test_config());
        let responses = session
            .process_chunk(&chunk(&[1.0, 2.0, 3.0, 4.0, 100.0]))
            .unwrap();

        let labels: Vec<ClusterLabel> = responses.iter().map(|r| r.label()).collect();
        assert_eq!(
            labels,
            vec![
                ClusterLabel::CorticalSurface, // 1 < 2
                ClusterLabel::Unknown,         // 2 is not < 2
                ClusterLabel::Unknown,
                ClusterLabel::Unknown,
                ClusterLabel::Unknown, // 100 is not > 100
            ]
        );

        // Responses preserve arrival order.
        let ids: Vec<u64> = responses.iter().map(|r| r.point_id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);

        let stats = session.stats();
        assert_eq!(stats.received, 5);
        assert_eq!(stats.processed, 1);
        assert_eq!(stats.discarded, 4);
        assert_eq!(stats.cortical_surface, 1);
        assert_eq!(stats.unknown, 4);
        assert_eq!(stats.dura, 0);
    }

    #[test]
    fn single_point_chunk_never_sees_empty_distribution() {
        let mut session = Session::new(&test_config());
        let responses = session.process_chunk(&chunk(&[5.0])).unwrap();
        assert_eq!(responses.len(), 1);
        // The sole observation is both bounds, so the point is Unknown.
        assert_eq!(responses[0].label(), ClusterLabel::Unknown);
    }

    #[test]
    fn empty_chunk_is_skipped_without_observing() {
        let mut session = Session::new(&test_config());
        let responses = session.process_chunk(&ChunkRequest { points: vec![] }).unwrap();
        assert!(responses.is_empty());
        assert_eq!(session.observations(), 0);
        assert_eq!(session.stats(), SessionStats::default());
    }

    #[test]
    fn thresholds_move_as_the_distribution_grows() {
        let mut session = Session::new(&test_config());

        // First chunk: all values equal, everything Unknown.
        let first = session.process_chunk(&chunk(&[10.0, 10.0, 10.0])).unwrap();
        assert!(first.iter().all(|r| r.label() == ClusterLabel::Unknown));

        // Second chunk shifts both thresholds: distribution is now
        // [1, 5, 10, 10, 10, 50, 100], p80 -> rank 5 = 50, p20 -> rank 1 = 5.
        let second = session
            .process_chunk(&chunk(&[1.0, 5.0, 50.0, 100.0]))
            .unwrap();
        let labels: Vec<ClusterLabel> = second.iter().map(|r| r.label()).collect();
        assert_eq!(
            labels,
            vec![
                ClusterLabel::CorticalSurface, // 1 < 5
                ClusterLabel::Unknown,         // 5 is not < 5
                ClusterLabel::Unknown,         // 50 is not > 50
                ClusterLabel::Dura,            // 100 > 50
            ]
        );
        assert_eq!(session.observations(), 7);
    }

    #[test]
    fn nan_features_are_labeled_without_being_observed() {
        let mut session = Session::new(&test_config());
        let responses = session
            .process_chunk(&chunk(&[1.0, f64::NAN, 2.0]))
            .unwrap();

        // The NaN point is still answered, but never enters the distribution.
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[1].label(), ClusterLabel::Unknown);
        assert_eq!(session.observations(), 2);
        assert_eq!(session.dropped_samples(), 1);

        let stats = session.stats();
        assert_eq!(stats.received, 3);
        assert_eq!(
            stats.received as usize,
            session.observations() + session.dropped_samples()
        );
    }

    #[test]
    fn oversized_chunk_is_rejected() {
        let mut config = test_config();
        config.max_chunk_points = 2;
        let mut session = Session::new(&config);

        let err = session
            .process_chunk(&chunk(&[1.0, 2.0, 3.0]))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest { .. }));
        // The oversized chunk must not have contaminated the distribution.
        assert_eq!(session.observations(), 0);
    }

    #[tokio::test]
    async fn session_emits_one_response_per_point_in_order() {
        let inbound = tokio_stream::iter(vec![
            Ok(chunk(&[1.0, 2.0, 3.0])),
            Ok(chunk(&[4.0, 5.0])),
        ]);
        let (tx, mut rx) = mpsc::channel(16);

        let stats = run_session(
            inbound,
            tx,
            Session::new(&test_config()),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(stats.received, 5);

        let mut ids = Vec::new();
        while let Some(resp) = rx.recv().await {
            ids.push(resp.unwrap().point_id);
        }
        // Client ids restart per chunk in this fixture; order within the
        // stream is chunk arrival order then intra-chunk order.
        assert_eq!(ids, vec![1, 2, 3, 1, 2]);
    }

    #[tokio::test]
    async fn empty_stream_ends_with_success_and_no_responses() {
        let inbound = tokio_stream::iter(Vec::<Result<ChunkRequest, Status>>::new());
        let (tx, mut rx) = mpsc::channel(16);

        let stats = run_session(
            inbound,
            tx,
            Session::new(&test_config()),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(stats, SessionStats::default());
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn transport_error_is_terminal() {
        let inbound = tokio_stream::iter(vec![
            Ok(chunk(&[1.0])),
            Err(Status::unavailable("connection reset")),
            Ok(chunk(&[2.0])),
        ]);
        let (tx, mut rx) = mpsc::channel(16);

        let err = run_session(
            inbound,
            tx,
            Session::new(&test_config()),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Transport { .. }));
        // The point read before the failure was still answered.
        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn cancellation_reaches_a_session_parked_on_response_send() {
        let token = CancellationToken::new();
        // Capacity 1 and no reader: the second response send parks.
        let (tx, rx) = mpsc::channel(1);
        let inbound = tokio_stream::iter(vec![Ok(chunk(&[1.0, 2.0, 3.0]))]);

        let handle = tokio::spawn(run_session(
            inbound,
            tx,
            Session::new(&test_config()),
            token.clone(),
        ));

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        token.cancel();

        let err = tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, Error::ServiceShutdown));
        drop(rx);
    }

    #[tokio::test]
    async fn cancellation_surfaces_shutdown_to_the_client() {
        let token = CancellationToken::new();
        token.cancel();

        let inbound = tokio_stream::pending::<Result<ChunkRequest, Status>>();
        let (tx, mut rx) = mpsc::channel(16);

        let err = run_session(inbound, tx, Session::new(&test_config()), token)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ServiceShutdown));
        let surfaced = rx.recv().await.unwrap().unwrap_err();
        assert_eq!(surfaced.code(), tonic::Code::Unavailable);
    }
}
