//! Runtime configuration
//!
//! The options here are exactly the ones spec'd as "recognized,
//! runtime-toggleable" — they are a plain, owned struct rather than a
//! loaded file; settings persistence is someone else's concern (the outer
//! application), matching the scope cut in the module overview.

use serde::{Deserialize, Serialize};

/// The full set of runtime-toggleable engine options.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Gate the whole system. When false, `BrainIntegration` should not be
    /// constructed by the composition root at all; the flag is still
    /// carried here so a caller can toggle it without rebuilding config.
    pub use_unified_brain: bool,
    /// When false, every query is treated as `personal` intent.
    pub use_query_routing: bool,
    /// When false, only vector search contributes to retrieval.
    pub use_hybrid_search: bool,
    /// Selects weighted fusion (`Some(weight)`) over RRF (`None`).
    pub hybrid_vector_weight: Option<f64>,
    /// Gate the unified memory subsystem.
    pub use_memory: bool,
    /// Target chunk size in characters.
    pub chunk_size: usize,
    /// Gate knowledge-graph expansion.
    pub graph_rag_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            use_unified_brain: true,
            use_query_routing: true,
            use_hybrid_search: true,
            hybrid_vector_weight: None,
            use_memory: true,
            chunk_size: 400,
            graph_rag_enabled: true,
        }
    }
}

/// A named token budget for `ContextAssembler`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ContextBudget {
    /// Total token budget `S`.
    pub total: usize,
}

impl ContextBudget {
    /// The default 8192-token budget.
    pub const STANDARD: ContextBudget = ContextBudget { total: 8192 };
    /// The pre-defined 32768-token budget.
    pub const LARGE: ContextBudget = ContextBudget { total: 32768 };

    pub fn system_prompt_budget(&self) -> usize {
        (1000).min(self.total / 8)
    }

    pub fn memory_budget(&self) -> usize {
        (500).min(self.total / 16)
    }

    pub fn rag_budget(&self) -> usize {
        (4000).min(self.total / 4)
    }

    pub fn conversation_budget(&self) -> usize {
        (2000).min(self.total / 4)
    }

    pub fn response_budget(&self) -> usize {
        (2000).min(self.total / 4)
    }
}

impl Default for ContextBudget {
    fn default() -> Self {
        Self::STANDARD
    }
}
