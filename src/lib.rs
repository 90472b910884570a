pub mod clients;
pub mod config;
pub mod error;
pub mod investigation;
pub mod utils;

pub use error::{InvestigationError, Result};

// Load env from a simple, standardized location resolution.
// Honors INVESTIGATOR_ENV_FILE, otherwise loads .env if present and silently ignores if missing.
pub fn load_env() {
    match std::env::var("INVESTIGATOR_ENV_FILE") {
        Ok(path) => {
            let _ = dotenvy::from_path(path);
        }
        Err(_) => {
            let _ = dotenvy::dotenv();
        }
    }
}
