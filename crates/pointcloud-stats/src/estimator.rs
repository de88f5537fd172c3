use crate::{Error, Result, ThresholdPair};

/// Order statistics over a monotonically growing, unsorted sample stream.
///
/// Every observed value is retained for the lifetime of the estimator; nothing
/// is pruned or windowed. A percentile query returns the value at rank
/// `floor(p / 100 * n)` (clamped to `[0, n - 1]`) of the sorted history, so
/// `percentile(0)` is the observed minimum and `percentile(100)` the maximum.
///
/// Appends are O(1). The history is re-sorted lazily on the first query after
/// a batch of appends, which makes the observe-many-then-query-once pattern
/// (one threshold recomputation per chunk) cost a single sort per chunk. An
/// incremental order-statistics structure can replace the internals without
/// changing this interface.
#[derive(Clone, Debug, Default)]
pub struct RunningPercentileEstimator {
    samples: Vec<f64>,
    dropped: usize,
    sorted: bool,
}

impl RunningPercentileEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
            dropped: 0,
            sorted: true,
        }
    }

    /// Appends a value to the sample history.
    ///
    /// NaN is not a rankable value and would otherwise sort to a fixed end of
    /// the history, skewing every subsequent threshold. NaN samples are
    /// therefore dropped and counted in [`Self::dropped`]; the caller labels
    /// such points without observing them.
    pub fn observe(&mut self, value: f64) {
        if value.is_nan() {
            self.dropped += 1;
            return;
        }
        self.samples.push(value);
        self.sorted = false;
    }

    /// Returns the value at percentile `p` over all samples seen so far.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidPercentile`] if `p` is outside `[0, 100]`.
    /// - [`Error::EmptyDistribution`] if nothing has been observed yet.
    pub fn percentile(&mut self, p: f64) -> Result<f64> {
        if !(0.0..=100.0).contains(&p) {
            return Err(Error::InvalidPercentile(p));
        }
        if self.samples.is_empty() {
            return Err(Error::EmptyDistribution);
        }

        if !self.sorted {
            self.samples.sort_unstable_by(f64::total_cmp);
            self.sorted = true;
        }

        let n = self.samples.len();
        let rank = ((p / 100.0 * n as f64).floor() as usize).min(n - 1);
        Ok(self.samples[rank])
    }

    /// Computes both labeling thresholds in one call.
    ///
    /// Sessions call this once per chunk, after the whole chunk has been
    /// observed, so a non-empty chunk can never hit `EmptyDistribution`.
    pub fn thresholds(&mut self, upper_percentile: f64, lower_percentile: f64) -> Result<ThresholdPair> {
        Ok(ThresholdPair {
            upper: self.percentile(upper_percentile)?,
            lower: self.percentile(lower_percentile)?,
        })
    }

    /// Number of samples observed so far.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Number of NaN samples rejected by [`Self::observe`].
    ///
    /// `len() + dropped()` equals the total number of `observe` calls, so
    /// callers reconciling received-vs-observed counts can account for the
    /// difference.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
