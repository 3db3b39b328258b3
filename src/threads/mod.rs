//! Conversation thread store abstraction.
//!
//! The agent search path needs exactly two things from conversation
//! persistence: which tenant owns a thread, and a place to append the
//! assembled answer. Everything else about conversations lives outside the
//! core.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;

/// Errors raised by thread store backends.
#[derive(Debug, Error)]
pub enum ThreadStoreError {
    /// Backend failed to complete the operation.
    #[error("Thread store request failed: {0}")]
    Backend(String),
}

/// Interface to conversation/thread persistence.
#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// Resolve the tenant that owns a thread, or `None` for unknown threads.
    async fn tenant_for_thread(&self, thread_id: &str) -> Result<Option<String>, ThreadStoreError>;

    /// Append an assistant-authored message to the thread.
    async fn append_assistant_message(
        &self,
        thread_id: &str,
        content: &str,
    ) -> Result<(), ThreadStoreError>;
}

struct ThreadState {
    org_id: String,
    assistant_messages: Vec<String>,
}

/// Process-local thread store for development and tests.
#[derive(Default)]
pub struct MemoryThreadStore {
    threads: RwLock<HashMap<String, ThreadState>>,
}

impl MemoryThreadStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a thread as owned by the given tenant.
    pub fn register_thread(&self, thread_id: &str, org_id: &str) {
        let mut threads = self.threads.write().expect("thread lock poisoned");
        threads.insert(
            thread_id.to_string(),
            ThreadState {
                org_id: org_id.to_string(),
                assistant_messages: Vec::new(),
            },
        );
    }

    /// Assistant messages appended to a thread, oldest first.
    pub fn assistant_messages(&self, thread_id: &str) -> Vec<String> {
        let threads = self.threads.read().expect("thread lock poisoned");
        threads
            .get(thread_id)
            .map(|state| state.assistant_messages.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ThreadStore for MemoryThreadStore {
    async fn tenant_for_thread(&self, thread_id: &str) -> Result<Option<String>, ThreadStoreError> {
        let threads = self
            .threads
            .read()
            .map_err(|_| ThreadStoreError::Backend("thread lock poisoned".into()))?;
        Ok(threads.get(thread_id).map(|state| state.org_id.clone()))
    }

    async fn append_assistant_message(
        &self,
        thread_id: &str,
        content: &str,
    ) -> Result<(), ThreadStoreError> {
        let mut threads = self
            .threads
            .write()
            .map_err(|_| ThreadStoreError::Backend("thread lock poisoned".into()))?;
        let state = threads
            .get_mut(thread_id)
            .ok_or_else(|| ThreadStoreError::Backend(format!("unknown thread {thread_id}")))?;
        state.assistant_messages.push(content.to_string());
        Ok(())
    }
}
