use pointcloud_tonic_core::proto::Point;

/// Buffers points up to a fixed chunk capacity.
///
/// Capacity is a soft flush trigger, not a hard limit: `add` never fails, and
/// a caller could keep adding past capacity, but the designed usage drains at
/// or before capacity so every emitted chunk except possibly the last holds
/// exactly `chunk_size` points.
#[derive(Debug)]
pub struct PointChunker {
    buf: Vec<Point>,
    chunk_size: usize,
}

impl PointChunker {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            buf: Vec::with_capacity(chunk_size),
            chunk_size,
        }
    }

    pub fn add(&mut self, point: Point) {
        self.buf.push(point);
    }

    pub fn is_full(&self) -> bool {
        self.buf.len() >= self.chunk_size
    }

    /// Returns the buffered points and resets the buffer to empty.
    pub fn drain(&mut self) -> Vec<Point> {
        core::mem::replace(&mut self.buf, Vec::with_capacity(self.chunk_size))
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(id: u64) -> Point {
        Point {
            id,
            x: 0.0,
            y: 0.0,
            z: id as f64,
        }
    }

    #[test]
    fn fills_at_capacity() {
        let mut chunker = PointChunker::new(3);
        chunker.add(point(1));
        chunker.add(point(2));
        assert!(!chunker.is_full());
        chunker.add(point(3));
        assert!(chunker.is_full());
    }

    #[test]
    fn drain_returns_points_in_insertion_order_and_resets() {
        let mut chunker = PointChunker::new(3);
        for id in 1..=3 {
            chunker.add(point(id));
        }

        let drained = chunker.drain();
        assert_eq!(drained.iter().map(|p| p.id).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(chunker.is_empty());
        assert!(!chunker.is_full());
    }

    #[test]
    fn emits_ceil_n_over_c_chunks_with_all_but_last_full() {
        for (n, c) in [(0usize, 1usize), (1, 1), (5, 2), (10, 3), (9, 3), (100, 100)] {
            let mut chunker = PointChunker::new(c);
            let mut chunks: Vec<Vec<Point>> = Vec::new();

            for id in 0..n {
                chunker.add(point(id as u64 + 1));
                if chunker.is_full() {
                    chunks.push(chunker.drain());
                }
            }
            if !chunker.is_empty() {
                chunks.push(chunker.drain());
            }

            assert_eq!(chunks.len(), n.div_ceil(c), "n={n} c={c}");
            if let Some((last, full)) = chunks.split_last() {
                assert!(full.iter().all(|chunk| chunk.len() == c));
                assert!(!last.is_empty() && last.len() <= c);
            }
            let total: usize = chunks.iter().map(Vec::len).sum();
            assert_eq!(total, n);
        }
    }
}
