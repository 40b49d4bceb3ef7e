pub mod message;

pub use message::{Role, TurnMessage, last_report};
