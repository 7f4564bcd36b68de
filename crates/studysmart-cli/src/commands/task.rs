//! Task management commands.

use chrono::{NaiveDate, TimeZone, Utc};
use clap::Subcommand;
use studysmart_core::storage::Database;
use studysmart_core::{Priority, Task};

#[derive(Subcommand)]
pub enum TaskAction {
    /// Add a task to a subject
    Add {
        /// Task title
        title: String,
        /// Subject ID the task belongs to
        #[arg(long)]
        subject_id: i64,
        /// Task description
        #[arg(long)]
        description: Option<String>,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,
        /// Priority: low, medium, or high
        #[arg(long, default_value = "medium")]
        priority: String,
    },
    /// List upcoming tasks
    List {
        /// Only tasks for this subject
        #[arg(long)]
        subject_id: Option<i64>,
        /// Show completed instead of upcoming tasks (requires --subject-id)
        #[arg(long)]
        completed: bool,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Toggle a task's completion state
    Done {
        /// Task ID
        id: i64,
    },
    /// Delete a task
    Delete {
        /// Task ID
        id: i64,
    },
}

fn parse_priority(raw: &str) -> Result<Priority, String> {
    match raw {
        "low" => Ok(Priority::Low),
        "medium" => Ok(Priority::Medium),
        "high" => Ok(Priority::High),
        other => Err(format!("unknown priority '{other}' (use low/medium/high)")),
    }
}

pub fn run(action: TaskAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        TaskAction::Add {
            title,
            subject_id,
            description,
            due,
            priority,
        } => {
            if db.subject_by_id(subject_id)?.is_none() {
                return Err(format!("no subject with id {subject_id}").into());
            }
            let due_date = match due {
                Some(raw) => {
                    let date = NaiveDate::parse_from_str(&raw, "%Y-%m-%d")?;
                    let midnight = date
                        .and_hms_opt(0, 0, 0)
                        .ok_or_else(|| format!("invalid due date '{raw}'"))?;
                    Some(Utc.from_utc_datetime(&midnight))
                }
                None => None,
            };
            let id = db.upsert_task(&Task {
                id: None,
                subject_id,
                title: title.clone(),
                description: description.unwrap_or_default(),
                due_date,
                priority: parse_priority(&priority)?,
                is_complete: false,
            })?;
            println!("Task created: {id} ({title})");
        }
        TaskAction::List {
            subject_id,
            completed,
            json,
        } => {
            let tasks = match (subject_id, completed) {
                (Some(sid), false) => db.upcoming_tasks_for_subject(sid)?,
                (Some(sid), true) => db.completed_tasks_for_subject(sid)?,
                (None, false) => db.all_upcoming_tasks()?,
                (None, true) => return Err("--completed requires --subject-id".into()),
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&tasks)?);
            } else if tasks.is_empty() {
                println!("No tasks");
            } else {
                for task in tasks {
                    let due = task
                        .due_date
                        .map(|d| d.format(" (due %Y-%m-%d)").to_string())
                        .unwrap_or_default();
                    let mark = if task.is_complete { "x" } else { " " };
                    println!(
                        "[{mark}] {:>4}  {}{due}",
                        task.id.unwrap_or_default(),
                        task.title
                    );
                }
            }
        }
        TaskAction::Done { id } => {
            let mut task = db
                .task_by_id(id)?
                .ok_or_else(|| format!("no task with id {id}"))?;
            task.is_complete = !task.is_complete;
            db.upsert_task(&task)?;
            if task.is_complete {
                println!("Task marked complete: {id}");
            } else {
                println!("Task moved back to upcoming: {id}");
            }
        }
        TaskAction::Delete { id } => {
            db.delete_task(id)?;
            println!("Task deleted: {id}");
        }
    }
    Ok(())
}
