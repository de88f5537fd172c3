/// The two percentile thresholds a chunk is labeled against.
///
/// Always derived from the complete observation history, never a sliding
/// window. `upper >= lower` holds whenever the configured percentiles do,
/// since percentiles are monotonic over a fixed sample set.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct ThresholdPair {
    pub upper: f64,
    pub lower: f64,
}

/// Closed set of labels a point can receive.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum Label {
    #[default]
    Unknown,
    CorticalSurface,
    Dura,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Unknown => "UNKNOWN",
            Label::CorticalSurface => "CORTICAL_SURFACE",
            Label::Dura => "DURA",
        }
    }
}

impl core::fmt::Display for Label {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies a feature value against the current thresholds.
///
/// Strictly above the upper bound is dura, strictly below the lower bound is
/// cortical surface, everything else (both bounds included) is unknown. NaN
/// compares false on both sides and therefore maps to unknown.
pub fn classify(value: f64, thresholds: &ThresholdPair) -> Label {
    if value > thresholds.upper {
        Label::Dura
    } else if value < thresholds.lower {
        Label::CorticalSurface
    } else {
        Label::Unknown
    }
}
