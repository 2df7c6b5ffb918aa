//! Filter command: report what the cleanup chain prunes.

use anyhow::Result;

use fbp_core::FilterChain;
use fbp_db::Database;

pub fn run(db: &Database, min_version: i32) -> Result<()> {
    let events = db.list_events()?;
    let chain = FilterChain::standard(min_version);
    let (_, stats) = chain.run(events);

    println!("events:  {}", stats.seen);
    println!("passed:  {}", stats.passed);
    for (name, rejected) in &stats.rejected {
        println!("{name}: {rejected} rejected");
    }
    Ok(())
}
