//! # idra-core
//!
//! Core types, traits, and abstractions for idra.
//!
//! This crate provides:
//! - The shared [`Error`]/[`Result`] types used across every subsystem
//! - Credential and search data models
//! - The [`VectorStore`] and [`ImageEmbedder`] seams to external services
//! - An injectable [`Clock`] for deterministic time-dependent tests
//! - Centralized default constants ([`defaults`]) and structured-logging
//!   field names ([`logging`])

pub mod clock;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod traits;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
pub use models::{
    Credential, CredentialSource, QueryVector, SearchHit, SearchRequest, SearchResponse,
};
pub use traits::{HybridQuery, ImageEmbedder, VectorStore};
