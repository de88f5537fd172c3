use pointcloud_tonic_core::proto::Point;
use std::io::{self, BufRead, Lines};

// Header lines of the PCD text format, skipped without a warning.
const HEADER_KEYWORDS: &[&str] = &[
    "VERSION", "FIELDS", "SIZE", "TYPE", "COUNT", "WIDTH", "HEIGHT", "VIEWPOINT", "POINTS", "DATA",
];

/// Reads points from a PCD-style text source, one `x y z` triple per line.
///
/// Skips empty lines, `#` comments, and recognized PCD header lines. A line
/// whose first three tokens do not parse as floats is skipped with a warning
/// and counted, never surfaced as an error; actual I/O failures are yielded.
/// Ids are assigned in emission order starting at 1.
pub struct PcdReader<R> {
    lines: Lines<R>,
    next_id: u64,
    skipped: u64,
}

impl<R: BufRead> PcdReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            next_id: 1,
            skipped: 0,
        }
    }

    /// Number of malformed data lines skipped so far.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

impl<R: BufRead> Iterator for PcdReader<R> {
    type Item = io::Result<Point>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e)),
            };
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let first = line.split_whitespace().next();
            if first.is_some_and(|token| HEADER_KEYWORDS.contains(&token)) {
                continue;
            }

            match parse_coordinates(line) {
                Some((x, y, z)) => {
                    let id = self.next_id;
                    self.next_id += 1;
                    return Some(Ok(Point { id, x, y, z }));
                }
                None => {
                    self.skipped += 1;
                    tracing::warn!("Skipping invalid line: {line}");
                }
            }
        }
    }
}

/// Parses the first three whitespace-separated tokens as floats. Extra
/// tokens (e.g. an rgb column) are ignored.
fn parse_coordinates(line: &str) -> Option<(f64, f64, f64)> {
    let mut tokens = line.split_whitespace();
    let x = tokens.next()?.parse().ok()?;
    let y = tokens.next()?.parse().ok()?;
    let z = tokens.next()?.parse().ok()?;
    Some((x, y, z))
}
