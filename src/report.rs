//! Plain-text detection report.
//!
//! Layout:
//!
//! ```text
//! person 1
//! dog 1
//!
//! Total Counts:
//! person 1
//! dog 1
//! person - 90%: 10,10,50,80
//! dog - 70%: 100,100,40,30
//! ```
//!
//! The counts block is rendered once and written twice, so the "Total Counts"
//! section is always byte-identical to the first one.

use std::fmt::Write;

use crate::session::{DetectionRecord, DetectionTally, Session};

pub const TOTALS_HEADING: &str = "Total Counts:";

/// Render the report for a session.
pub fn render(session: &Session) -> String {
    render_parts(session.tally(), session.records())
}

pub fn render_parts(tally: &DetectionTally, records: &[DetectionRecord]) -> String {
    let counts = render_counts(tally);

    let mut out = String::with_capacity(counts.len() * 2 + records.len() * 40 + 16);
    out.push_str(&counts);
    out.push('\n');
    out.push_str(TOTALS_HEADING);
    out.push('\n');
    out.push_str(&counts);
    for record in records {
        // Writing to a String cannot fail.
        let _ = writeln!(
            out,
            "{} - {}%: {}",
            record.class,
            record.percent(),
            record.bbox
        );
    }
    out
}

fn render_counts(tally: &DetectionTally) -> String {
    let mut counts = String::new();
    for (class, count) in tally.iter() {
        let _ = writeln!(counts, "{} {}", class, count);
    }
    counts
}
