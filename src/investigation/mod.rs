//! The investigation orchestration engine

pub mod classifier;
pub mod controller;
pub mod executor;
pub mod export;
pub mod planner;
pub mod prompts;
pub mod store;
pub mod synthesis;
pub mod types;
pub mod validator;

pub use classifier::{Classification, Classifier};
pub use controller::InvestigationController;
pub use executor::{PhaseExecutor, PhaseReport, RowCountSignificance, SignificancePolicy};
pub use planner::{PlanGenerator, PlanOutline};
pub use store::{InMemoryRepository, InvestigationRepository};
pub use types::*;
pub use validator::{PlanValidation, PlanValidator};
