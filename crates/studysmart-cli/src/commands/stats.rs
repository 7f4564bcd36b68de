//! Dashboard statistics.

use studysmart_core::storage::Database;

pub fn run(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let stats = db.stats()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let studied_hours = stats.total_studied_secs as f64 / 3600.0;
    println!("Subjects:      {}", stats.subject_count);
    println!("Goal hours:    {:.1}", stats.total_goal_hours);
    println!("Studied hours: {studied_hours:.2}");
    if stats.total_goal_hours > 0.0 {
        let progress = (studied_hours / stats.total_goal_hours * 100.0).min(100.0);
        println!("Progress:      {progress:.0}%");
    }
    Ok(())
}
