use crate::chunker::PointChunker;
use pointcloud_tonic_core::{
    Error,
    proto::{ChunkRequest, ClusterResponse, Point, point_cloud_client::PointCloudClient},
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Streaming, codec::CompressionEncoding, transport::Channel};

// Chunks buffered between the writer task and the transport. Small on
// purpose: the transport's flow control is the real backpressure, this only
// decouples file reads from network writes.
const CHUNK_CHANNEL_CAPACITY: usize = 4;

/// Duplex streaming client for the clustering service.
///
/// Turns an unbounded point source into a sequence of bounded chunk messages
/// and concurrently drains the labeled responses. The write loop and the read
/// loop progress independently: the writer runs on its own task, so the read
/// side never waits for all writes to finish first (a duplex stream can
/// deadlock otherwise when the server interleaves responses with chunk
/// consumption).
pub struct ClusterClient {
    inner: PointCloudClient<Channel>,
    chunk_size: usize,
}

impl ClusterClient {
    /// Connects to the service over plaintext HTTP/2.
    ///
    /// Connection failure is fatal; there are no retries.
    pub async fn connect(addr: impl Into<String>, chunk_size: usize) -> Result<Self, Error> {
        let endpoint = Channel::from_shared(addr.into()).map_err(|e| Error::Transport {
            context: format!("Invalid server address: {e}"),
        })?;
        let channel = endpoint.connect().await.map_err(|e| Error::Transport {
            context: format!("Failed to connect: {e}"),
        })?;

        let inner = PointCloudClient::new(channel)
            .send_compressed(CompressionEncoding::Zstd)
            .accept_compressed(CompressionEncoding::Zstd);

        Ok(Self { inner, chunk_size })
    }

    /// Opens the duplex stream and returns the inbound response stream.
    ///
    /// Every full chunk is written as it completes; the final partial chunk
    /// is flushed when the source is exhausted. Dropping the outbound sender
    /// signals end-of-writes exactly once. The point source runs on a
    /// blocking task, so a lazy file-backed iterator keeps memory bounded
    /// over arbitrarily large inputs.
    pub async fn cluster_stream<I>(&mut self, points: I) -> Result<Streaming<ClusterResponse>, Error>
    where
        I: IntoIterator<Item = Point>,
        I::IntoIter: Send + 'static,
    {
        let (chunk_tx, chunk_rx) = mpsc::channel::<ChunkRequest>(CHUNK_CHANNEL_CAPACITY);
        let chunk_size = self.chunk_size;
        let source = points.into_iter();

        tokio::task::spawn_blocking(move || write_chunks(source, chunk_size, chunk_tx));

        let outbound = ReceiverStream::new(chunk_rx);
        let response = self
            .inner
            .cluster(Request::new(outbound))
            .await
            .map_err(|status| Error::Transport {
                context: format!("Cluster call failed: {status}"),
            })?;

        Ok(response.into_inner())
    }

    /// Streams `points` and collects every labeled response.
    ///
    /// Responses arrive in point arrival order; the returned vector preserves
    /// it. Prefer [`Self::cluster_stream`] when the caller can sink responses
    /// incrementally.
    pub async fn cluster<I>(&mut self, points: I) -> Result<Vec<ClusterResponse>, Error>
    where
        I: IntoIterator<Item = Point>,
        I::IntoIter: Send + 'static,
    {
        let mut stream = self.cluster_stream(points).await?;

        let mut responses = Vec::new();
        loop {
            match stream.message().await {
                Ok(Some(response)) => responses.push(response),
                Ok(None) => break,
                Err(status) => {
                    return Err(Error::Transport {
                        context: format!("Response stream failed: {status}"),
                    });
                }
            }
        }
        Ok(responses)
    }
}

/// Drains `source` into `chunk_tx` as bounded chunk messages.
///
/// Runs on a blocking task (the channel sends are `blocking_send`). Every full
/// chunk is written as it completes; the final partial chunk is flushed when
/// the source is exhausted. Returning drops `chunk_tx`, which closes the
/// outbound stream and signals end-of-writes exactly once.
fn write_chunks<I>(source: I, chunk_size: usize, chunk_tx: mpsc::Sender<ChunkRequest>)
where
    I: Iterator<Item = Point>,
{
    let mut chunker = PointChunker::new(chunk_size);
    for point in source {
        chunker.add(point);
        if chunker.is_full() {
            let chunk = ChunkRequest {
                points: chunker.drain(),
            };
            if chunk_tx.blocking_send(chunk).is_err() {
                // Receiver dropped: the stream was torn down.
                tracing::debug!("Outbound stream closed before all chunks were sent");
                return;
            }
        }
    }

    let rest = chunker.drain();
    if !rest.is_empty() {
        let _ = chunk_tx.blocking_send(ChunkRequest { points: rest });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(n: u64) -> Vec<Point> {
        (1..=n)
            .map(|id| Point {
                id,
                x: 0.0,
                y: 0.0,
                z: id as f64,
            })
            .collect()
    }

    #[tokio::test]
    async fn writer_flushes_the_final_partial_chunk_and_closes() {
        let (tx, mut rx) = mpsc::channel(CHUNK_CHANNEL_CAPACITY);
        let writer =
            tokio::task::spawn_blocking(move || write_chunks(points(7).into_iter(), 3, tx));

        let mut sizes = Vec::new();
        let mut ids = Vec::new();
        while let Some(chunk) = rx.recv().await {
            sizes.push(chunk.points.len());
            ids.extend(chunk.points.iter().map(|p| p.id));
        }

        // Two full chunks, then the non-full remainder; the channel closing
        // afterwards is the end-of-writes signal.
        assert_eq!(sizes, vec![3, 3, 1]);
        assert_eq!(ids, (1..=7).collect::<Vec<u64>>());
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn writer_emits_no_trailing_empty_chunk_on_exact_multiple() {
        let (tx, mut rx) = mpsc::channel(CHUNK_CHANNEL_CAPACITY);
        let writer =
            tokio::task::spawn_blocking(move || write_chunks(points(6).into_iter(), 3, tx));

        let mut sizes = Vec::new();
        while let Some(chunk) = rx.recv().await {
            sizes.push(chunk.points.len());
        }
        assert_eq!(sizes, vec![3, 3]);
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn writer_closes_immediately_on_empty_source() {
        let (tx, mut rx) = mpsc::channel(CHUNK_CHANNEL_CAPACITY);
        let writer =
            tokio::task::spawn_blocking(move || write_chunks(points(0).into_iter(), 3, tx));

        assert!(rx.recv().await.is_none());
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn writer_stops_when_the_stream_is_torn_down() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        // Must return instead of looping over the remaining input.
        tokio::task::spawn_blocking(move || write_chunks(points(100).into_iter(), 2, tx))
            .await
            .unwrap();
    }
}
