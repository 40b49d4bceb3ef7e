//! 预处理阶段：输入防护、意图识别与研究计划

pub mod guard;
pub mod manager;
pub mod planner;

pub use guard::{InputGuard, RejectionReason};
pub use manager::Manager;
pub use planner::{PlanOutcome, Planner};
