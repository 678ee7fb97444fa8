//! # idra-search
//!
//! Turns a tool invocation (text, optional image reference) into a single
//! ranked hybrid query against the vector store.
//!
//! This crate provides:
//! - [`SearchOrchestrator`] — query construction with the collection pinned
//!   to the configured value, alpha-weighted vector/lexical fusion, and the
//!   exactly-one-retry-on-empty policy
//! - Query reformulation for the second attempt
//! - [`MockVectorStore`] for driving the orchestrator in tests

pub mod mock;
pub mod orchestrator;
pub mod reformulate;

pub use mock::MockVectorStore;
pub use orchestrator::{SearchConfig, SearchOrchestrator};
pub use reformulate::broaden;
