//! 输出阶段：报告撰写、闲聊与澄清

pub mod responders;
pub mod writer;

pub use responders::{Chat, Clarifier};
pub use writer::Writer;

// Include tests
#[cfg(test)]
mod tests;
