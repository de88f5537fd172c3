pub type Result<T> = core::result::Result<T, Error>;

/// All possible errors that percentile estimation can produce.
#[derive(Clone, Copy, PartialEq, thiserror::Error, Debug)]
pub enum Error {
    /// A percentile was requested before any value was observed.
    ///
    /// Callers must ensure at least one observation exists before deriving
    /// thresholds. The session loop guarantees this by observing an entire
    /// chunk before its first percentile query.
    #[error("percentile requested on an empty distribution")]
    EmptyDistribution,

    /// The requested percentile falls outside `[0, 100]`.
    #[error("percentile {0} is outside the valid range [0, 100]")]
    InvalidPercentile(f64),
}
