pub mod cli;
pub mod config;
pub mod generator;
pub mod i18n;
pub mod llm;
pub mod store;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use generator::outlet::SessionDriver;
pub use generator::workflow::{Orchestrator, TurnRequest};
