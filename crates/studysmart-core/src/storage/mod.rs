mod config;
pub mod database;
mod store;

pub use config::Config;
pub use database::{Database, DashboardStats};
pub use store::StudyStore;

use std::path::PathBuf;

/// Returns `~/.config/studysmart[-dev]/` based on STUDYSMART_ENV.
///
/// Set STUDYSMART_ENV=dev to use the development data directory, or
/// STUDYSMART_DATA_DIR to point somewhere else entirely (used by the
/// e2e tests to stay out of the real home directory).
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    if let Ok(dir) = std::env::var("STUDYSMART_DATA_DIR") {
        let dir = PathBuf::from(dir);
        std::fs::create_dir_all(&dir)?;
        return Ok(dir);
    }

    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("STUDYSMART_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("studysmart-dev")
    } else {
        base_dir.join("studysmart")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
