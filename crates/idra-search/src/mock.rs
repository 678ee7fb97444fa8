//! Scripted vector store for orchestrator tests.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use idra_core::{Error, HybridQuery, Result, SearchHit, VectorStore};

/// A [`VectorStore`] that replays scripted responses and records every
/// query it receives.
#[derive(Default)]
pub struct MockVectorStore {
    responses: Mutex<VecDeque<Result<Vec<SearchHit>>>>,
    queries: Mutex<Vec<HybridQuery>>,
}

impl MockVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response.
    pub fn push_hits(&self, hits: Vec<SearchHit>) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Ok(hits));
    }

    /// Queue a backend error.
    pub fn push_error(&self, message: &str) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Err(Error::SearchBackend(message.to_string())));
    }

    /// Queries executed so far, in order.
    pub fn recorded_queries(&self) -> Vec<HybridQuery> {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl VectorStore for MockVectorStore {
    async fn hybrid(&self, query: &HybridQuery) -> Result<Vec<SearchHit>> {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(query.clone());

        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn is_ready(&self) -> Result<bool> {
        Ok(true)
    }
}
