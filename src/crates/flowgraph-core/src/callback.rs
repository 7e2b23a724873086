//! Callback surface - lifecycle notifications for collaborators
//!
//! Callback handlers are per-invocation observers passed in through
//! [`RunConfig::callbacks`](crate::config::RunConfig). The engine itself
//! drives only the chain lifecycle (`chain_start` / `chain_end` /
//! `chain_error`); the LLM, tool, and retriever lifecycles exist so external
//! collaborators - LLM clients, tool adapters - can report through the same
//! handlers via the [`CallbackDispatcher`] each node receives in its context.
//!
//! Every method takes a [`CallbackPayload`]; fields irrelevant to a given
//! lifecycle stay empty. Handlers must not assume any field is populated.
//!
//! # Example
//!
//! ```rust,ignore
//! use flowgraph_core::callback::{CallbackHandler, CallbackPayload};
//! use async_trait::async_trait;
//!
//! struct AuditLog;
//!
//! #[async_trait]
//! impl CallbackHandler for AuditLog {
//!     async fn on_chain_start(&self, payload: &CallbackPayload) {
//!         tracing::info!(run_id = %payload.run_id, "run started");
//!     }
//!     async fn on_tool_end(&self, payload: &CallbackPayload) {
//!         tracing::info!(output = ?payload.tool_output, "tool finished");
//!     }
//! }
//! ```

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Payload delivered to every callback method
///
/// One struct serves all lifecycles; unused fields are empty.
#[derive(Debug, Clone, Default)]
pub struct CallbackPayload {
    /// Chain inputs (initial state) for chain lifecycle events
    pub inputs: Option<Value>,

    /// Chain outputs (final state) for `chain_end`
    pub outputs: Option<Value>,

    /// Prompts sent to a model, for LLM lifecycle events
    pub prompts: Vec<String>,

    /// Model response, for `llm_end`
    pub response: Option<Value>,

    /// Tool invocation input, for tool lifecycle events
    pub tool_input: Option<Value>,

    /// Tool invocation output, for `tool_end`
    pub tool_output: Option<Value>,

    /// Retriever query, for retriever lifecycle events
    pub query: Option<String>,

    /// Retrieved documents, for `retriever_end`
    pub documents: Vec<Value>,

    /// Identifier of the invocation this event belongs to
    pub run_id: String,

    /// Identifier of an enclosing invocation, when nested
    pub parent_run_id: Option<String>,

    /// Tags from the invocation config
    pub tags: Vec<String>,

    /// Metadata bag from the invocation config
    pub metadata: HashMap<String, Value>,
}

/// Per-invocation observer for chain, LLM, tool, and retriever lifecycles
///
/// All methods default to no-ops; implement only what you care about.
/// Handlers observe - they never swallow or transform the errors the caller
/// sees.
#[async_trait]
pub trait CallbackHandler: Send + Sync {
    /// An invocation began
    async fn on_chain_start(&self, _payload: &CallbackPayload) {}
    /// An invocation completed successfully
    async fn on_chain_end(&self, _payload: &CallbackPayload) {}
    /// An invocation failed terminally
    async fn on_chain_error(&self, _payload: &CallbackPayload, _error: &str) {}

    /// A collaborator started an LLM call
    async fn on_llm_start(&self, _payload: &CallbackPayload) {}
    /// A collaborator finished an LLM call
    async fn on_llm_end(&self, _payload: &CallbackPayload) {}
    /// A collaborator's LLM call failed
    async fn on_llm_error(&self, _payload: &CallbackPayload, _error: &str) {}

    /// A collaborator started a tool invocation
    async fn on_tool_start(&self, _payload: &CallbackPayload) {}
    /// A collaborator finished a tool invocation
    async fn on_tool_end(&self, _payload: &CallbackPayload) {}
    /// A collaborator's tool invocation failed
    async fn on_tool_error(&self, _payload: &CallbackPayload, _error: &str) {}

    /// A collaborator started a retrieval
    async fn on_retriever_start(&self, _payload: &CallbackPayload) {}
    /// A collaborator finished a retrieval
    async fn on_retriever_end(&self, _payload: &CallbackPayload) {}
    /// A collaborator's retrieval failed
    async fn on_retriever_error(&self, _payload: &CallbackPayload, _error: &str) {}
}

/// Which lifecycle event a dispatcher emission targets
#[derive(Debug, Clone)]
pub enum CallbackEvent {
    ChainStart,
    ChainEnd,
    ChainError(String),
    LlmStart,
    LlmEnd,
    LlmError(String),
    ToolStart,
    ToolEnd,
    ToolError(String),
    RetrieverStart,
    RetrieverEnd,
    RetrieverError(String),
}

/// Fans one event out to every handler of an invocation
///
/// Cheap to clone; nodes receive one through
/// [`NodeContext::callbacks`](crate::config::NodeContext::callbacks) so
/// collaborators report through the run's handlers.
#[derive(Clone, Default)]
pub struct CallbackDispatcher {
    handlers: Arc<Vec<Arc<dyn CallbackHandler>>>,
}

impl CallbackDispatcher {
    /// Build a dispatcher over an invocation's handlers
    pub fn new(handlers: Vec<Arc<dyn CallbackHandler>>) -> Self {
        Self {
            handlers: Arc::new(handlers),
        }
    }

    /// Whether any handlers are registered
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Deliver one event to every handler, in registration order
    ///
    /// The dispatcher awaits each handler; by the time `emit` returns, every
    /// handler has observed the event.
    pub async fn emit(&self, event: CallbackEvent, payload: &CallbackPayload) {
        for handler in self.handlers.iter() {
            match &event {
                CallbackEvent::ChainStart => handler.on_chain_start(payload).await,
                CallbackEvent::ChainEnd => handler.on_chain_end(payload).await,
                CallbackEvent::ChainError(error) => {
                    handler.on_chain_error(payload, error).await
                }
                CallbackEvent::LlmStart => handler.on_llm_start(payload).await,
                CallbackEvent::LlmEnd => handler.on_llm_end(payload).await,
                CallbackEvent::LlmError(error) => handler.on_llm_error(payload, error).await,
                CallbackEvent::ToolStart => handler.on_tool_start(payload).await,
                CallbackEvent::ToolEnd => handler.on_tool_end(payload).await,
                CallbackEvent::ToolError(error) => handler.on_tool_error(payload, error).await,
                CallbackEvent::RetrieverStart => handler.on_retriever_start(payload).await,
                CallbackEvent::RetrieverEnd => handler.on_retriever_end(payload).await,
                CallbackEvent::RetrieverError(error) => {
                    handler.on_retriever_error(payload, error).await
                }
            }
        }
    }
}

impl fmt::Debug for CallbackDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackDispatcher")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
