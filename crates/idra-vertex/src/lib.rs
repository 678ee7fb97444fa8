//! # idra-vertex
//!
//! Client for the Vertex multimodal embedding endpoint.
//!
//! Every prediction call captures the current credential once and carries it
//! in both REST header fields; a refresh landing mid-flight never mutates an
//! in-flight request.

pub mod embedder;

pub use embedder::{VertexConfig, VertexEmbedder};
