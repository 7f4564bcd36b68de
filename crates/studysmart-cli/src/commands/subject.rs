//! Subject management commands.

use clap::Subcommand;
use studysmart_core::storage::Database;
use studysmart_core::Subject;

#[derive(Subcommand)]
pub enum SubjectAction {
    /// Add a new subject
    Add {
        /// Subject name
        name: String,
        /// Study goal in hours
        #[arg(long, default_value = "1.0")]
        goal_hours: f64,
    },
    /// List all subjects
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a subject with progress, tasks, and recent sessions
    Show {
        /// Subject ID
        id: i64,
    },
    /// Update a subject
    Update {
        /// Subject ID
        id: i64,
        /// New name
        #[arg(long)]
        name: Option<String>,
        /// New study goal in hours
        #[arg(long)]
        goal_hours: Option<f64>,
    },
    /// Delete a subject (its tasks go with it; session history is kept)
    Delete {
        /// Subject ID
        id: i64,
    },
}

pub fn run(action: SubjectAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        SubjectAction::Add { name, goal_hours } => {
            let id = db.upsert_subject(&Subject {
                id: None,
                name: name.clone(),
                goal_hours,
            })?;
            println!("Subject created: {id} ({name})");
        }
        SubjectAction::List { json } => {
            let subjects = db.all_subjects()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&subjects)?);
            } else if subjects.is_empty() {
                println!("No subjects yet");
            } else {
                for s in subjects {
                    println!(
                        "{:>4}  {}  (goal {:.1}h)",
                        s.id.unwrap_or_default(),
                        s.name,
                        s.goal_hours
                    );
                }
            }
        }
        SubjectAction::Show { id } => {
            let subject = db
                .subject_by_id(id)?
                .ok_or_else(|| format!("no subject with id {id}"))?;
            let studied_secs = db.total_session_duration_for_subject(id)?;
            let studied_hours = studied_secs as f64 / 3600.0;
            let progress = if subject.goal_hours > 0.0 {
                (studied_hours / subject.goal_hours).clamp(0.0, 1.0)
            } else {
                0.0
            };
            println!(
                "{} -- studied {:.1}h of {:.1}h goal ({:.0}%)",
                subject.name,
                studied_hours,
                subject.goal_hours,
                progress * 100.0
            );

            let upcoming = db.upcoming_tasks_for_subject(id)?;
            if !upcoming.is_empty() {
                println!("Upcoming tasks:");
                for task in upcoming {
                    let due = task
                        .due_date
                        .map(|d| d.format(" (due %Y-%m-%d)").to_string())
                        .unwrap_or_default();
                    println!("  [{:>3}] {}{due}", task.id.unwrap_or_default(), task.title);
                }
            }

            let recent = db.recent_sessions_for_subject(id, 10)?;
            if !recent.is_empty() {
                println!("Recent sessions:");
                for session in recent {
                    println!(
                        "  {}  {}s",
                        session.started_at.format("%Y-%m-%d %H:%M"),
                        session.duration_secs
                    );
                }
            }
        }
        SubjectAction::Update {
            id,
            name,
            goal_hours,
        } => {
            let mut subject = db
                .subject_by_id(id)?
                .ok_or_else(|| format!("no subject with id {id}"))?;
            if let Some(name) = name {
                subject.name = name;
            }
            if let Some(goal_hours) = goal_hours {
                subject.goal_hours = goal_hours;
            }
            db.upsert_subject(&subject)?;
            println!("Subject updated: {id}");
        }
        SubjectAction::Delete { id } => {
            db.delete_subject(id)?;
            println!("Subject deleted: {id}");
        }
    }
    Ok(())
}
