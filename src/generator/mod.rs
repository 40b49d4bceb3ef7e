pub mod compose;
pub mod context;
pub mod decode;
pub mod outlet;
pub mod preprocess;
pub mod prompts;
pub mod research;
pub mod state;
pub mod types;
pub mod workflow;

#[cfg(test)]
pub(crate) mod test_support;
