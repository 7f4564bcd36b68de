//! Recorded study session commands.

use clap::Subcommand;
use studysmart_core::storage::Database;

#[derive(Subcommand)]
pub enum SessionAction {
    /// List recorded sessions, newest first
    List {
        /// Only sessions for this subject
        #[arg(long)]
        subject_id: Option<i64>,
        /// Limit the number of rows when filtering by subject
        #[arg(long, default_value_t = 10)]
        limit: u32,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a recorded session
    Delete {
        /// Session ID
        id: i64,
    },
}

pub fn run(action: SessionAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        SessionAction::List {
            subject_id,
            limit,
            json,
        } => {
            let sessions = match subject_id {
                Some(sid) => db.recent_sessions_for_subject(sid, limit)?,
                None => db.all_sessions()?,
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&sessions)?);
            } else if sessions.is_empty() {
                println!("No sessions recorded");
            } else {
                for session in sessions {
                    println!(
                        "{:>4}  {}  {:>6}s  {}",
                        session.id,
                        session.started_at.format("%Y-%m-%d %H:%M"),
                        session.duration_secs,
                        session.subject_name
                    );
                }
            }
        }
        SessionAction::Delete { id } => {
            db.delete_session(id)?;
            println!("Session deleted: {id}");
        }
    }
    Ok(())
}
