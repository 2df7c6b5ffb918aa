//! Consolidate command: merge developers sharing sessions.

use anyhow::Result;

use fbp_db::Database;

pub fn run(db: &mut Database) -> Result<()> {
    let stats = fbp_core::consolidate(db)?;
    println!("passes: {}", stats.passes);
    println!("merges: {}", stats.merges);
    Ok(())
}
