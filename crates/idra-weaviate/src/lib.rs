//! # idra-weaviate
//!
//! Thin client for the Weaviate-style vector store.
//!
//! Executes hybrid queries over the store's GraphQL REST endpoint and
//! injects the current embedding-provider credential into every call. The
//! same credential is exposed as gRPC metadata pairs for deployments that
//! talk to the store's RPC channel instead.

pub mod client;
pub mod graphql;

pub use client::{WeaviateClient, WeaviateConfig};
