//! Stats command: participant-count bounds and session numbers.

use anyhow::Result;

use fbp_db::Database;

pub fn run(db: &Database) -> Result<()> {
    let stats = fbp_core::statistics(db)?;
    println!("sessions:                  {}", stats.sessions);
    println!("duplicated sessions:       {}", stats.duplicated_sessions);
    println!("developers (upper bound):  {}", stats.developers_upper_bound);
    println!("developers (lower bound):  {}", stats.developers_lower_bound);
    Ok(())
}
