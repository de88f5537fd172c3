//! Conversions between wire types and the domain types in
//! [`pointcloud_stats`].
//!
//! The proto [`ClusterLabel`] enum and the domain [`Label`] enum are kept in
//! lockstep; the numeric wire values are part of the client-server contract
//! (`UNKNOWN = 0`, `CORTICAL_SURFACE = 1`, `DURA = 2`).

use crate::proto;
use pointcloud_stats::Label;

/// Default number of points per chunk when the client does not configure one.
pub const DEFAULT_CHUNK_SIZE: usize = 100;

impl proto::Point {
    /// The scalar feature the distribution is built over.
    pub fn feature(&self) -> f64 {
        self.z
    }
}

impl From<Label> for proto::ClusterLabel {
    fn from(label: Label) -> Self {
        match label {
            Label::Unknown => proto::ClusterLabel::Unknown,
            Label::CorticalSurface => proto::ClusterLabel::CorticalSurface,
            Label::Dura => proto::ClusterLabel::Dura,
        }
    }
}

impl From<proto::ClusterLabel> for Label {
    fn from(label: proto::ClusterLabel) -> Self {
        match label {
            proto::ClusterLabel::Unknown => Label::Unknown,
            proto::ClusterLabel::CorticalSurface => Label::CorticalSurface,
            proto::ClusterLabel::Dura => Label::Dura,
        }
    }
}
