//! Report command: cumulative window usage as CSV.

use anyhow::Result;

use fbp_core::WindowUsageReport;
use fbp_db::Database;

use super::util;

pub fn run(db: &Database, min_version: i32) -> Result<()> {
    let mut report = WindowUsageReport::new();
    for (session_id, intervals) in util::session_window_intervals(db, min_version)? {
        report.add_stream(session_id.as_str(), intervals);
    }
    print!("{}", report.to_csv());
    Ok(())
}
