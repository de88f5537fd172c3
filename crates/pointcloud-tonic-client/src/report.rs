use pointcloud_stats::Label;
use pointcloud_tonic_core::proto::{ClusterLabel, ClusterResponse};

/// Per-label tallies over the responses of one completed stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LabelReport {
    pub total: u64,
    pub dura: u64,
    pub cortical_surface: u64,
    pub unknown: u64,
}

impl LabelReport {
    pub fn add(&mut self, response: &ClusterResponse) {
        self.total += 1;
        match response.label() {
            ClusterLabel::Dura => self.dura += 1,
            ClusterLabel::CorticalSurface => self.cortical_surface += 1,
            ClusterLabel::Unknown => self.unknown += 1,
        }
    }

    pub fn from_responses<'a>(responses: impl IntoIterator<Item = &'a ClusterResponse>) -> Self {
        let mut report = Self::default();
        for response in responses {
            report.add(response);
        }
        report
    }

    fn percentage(&self, count: u64) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            count as f64 / self.total as f64 * 100.0
        }
    }
}

impl core::fmt::Display for LabelReport {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for (label, count) in [
            (Label::Dura, self.dura),
            (Label::CorticalSurface, self.cortical_surface),
            (Label::Unknown, self.unknown),
        ] {
            writeln!(
                f,
                "Label {}: {} points ({:.2}%)",
                label,
                count,
                self.percentage(count)
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(label: ClusterLabel) -> ClusterResponse {
        ClusterResponse {
            point_id: 1,
            label: label.into(),
        }
    }

    #[test]
    fn tallies_each_label() {
        let responses = vec![
            response(ClusterLabel::Dura),
            response(ClusterLabel::Unknown),
            response(ClusterLabel::Unknown),
            response(ClusterLabel::CorticalSurface),
        ];
        let report = LabelReport::from_responses(&responses);
        assert_eq!(report.total, 4);
        assert_eq!(report.dura, 1);
        assert_eq!(report.cortical_surface, 1);
        assert_eq!(report.unknown, 2);
    }

    #[test]
    fn formats_percentages() {
        let responses = vec![
            response(ClusterLabel::Dura),
            response(ClusterLabel::Unknown),
        ];
        let report = LabelReport::from_responses(&responses);
        let rendered = report.to_string();
        assert!(rendered.contains("Label DURA: 1 points (50.00%)"));
        assert!(rendered.contains("Label UNKNOWN: 1 points (50.00%)"));
    }

    #[test]
    fn empty_report_renders_zero_percent() {
        let report = LabelReport::default();
        assert!(report.to_string().contains("(0.00%)"));
    }
}
