//! Token-budgeted context assembly
//!
//! Packs system prompt, memory, RAG, and conversation history into one
//! `AssembledContext` under a fixed token budget, with a priority-ordered
//! eviction pass. There is no direct teacher analogue (the teacher emits
//! memory nodes straight to its MCP tool responses); this module is
//! grounded in the teacher's token-accounting style in
//! `vestige-mcp/src/tools/search.rs`, generalized into its own budgeted
//! packer per the module contract.

use crate::config::ContextBudget;
use crate::hybrid::RetrievalResult;
use crate::memory::MemoryContext;
use crate::router::Intent;

/// Coarse token estimate: `max(1, len(text)/4)`. Deliberately rough — the
/// per-section budgets below carry slack for this.
pub fn tokens(text: &str) -> usize {
    (text.len() / 4).max(1)
}

/// Clip `text` to `max_tokens * 4` characters, preferring to end on a
/// sentence boundary.
pub fn truncate_to_tokens(text: &str, max_tokens: usize) -> String {
    let max_chars = max_tokens * 4;
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let clipped: String = text.chars().take(max_chars).collect();
    match clipped.rfind('.') {
        Some(idx) => format!("{}\n[truncated]", &clipped[..=idx]),
        None => format!("{clipped}… [truncated]"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

/// The packed context `BrainIntegration` turns into a prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledContext {
    pub system_prompt: String,
    pub memory_block: Option<String>,
    pub rag_block: Option<String>,
    pub conversation: Vec<ConversationTurn>,
    pub estimated_tokens: usize,
}

fn build_rag_block(results: &[RetrievalResult], budget_tokens: usize) -> Option<String> {
    if results.is_empty() || budget_tokens == 0 {
        return None;
    }

    let mut block = String::from("## Relevant information from your documents:\n\n");
    let mut used = tokens(&block);
    let mut included = 0;

    for (i, result) in results.iter().enumerate() {
        let mut entry = format!("[{}] Source: {}\n", i + 1, result.source);
        if let Some(entities) = &result.entity_context {
            if !entities.is_empty() {
                entry.push_str("Related entities: ");
                entry.push_str(&entities.join(", "));
                entry.push('\n');
            }
        }
        entry.push_str(&result.text);
        entry.push_str("\n\n");

        let entry_tokens = tokens(&entry);
        if used + entry_tokens > budget_tokens {
            let remaining = results.len() - included;
            block.push_str(&format!("\n[... {remaining} more results truncated for brevity]"));
            break;
        }

        block.push_str(&entry);
        used += entry_tokens;
        included += 1;
    }

    Some(block)
}

fn build_conversation(conversation: &[ConversationTurn], budget_tokens: usize) -> (Vec<ConversationTurn>, usize) {
    let mut used = 0;
    let mut reversed = Vec::new();

    for turn in conversation.iter().rev() {
        let cost = tokens(&turn.content) + 10;
        if used + cost > budget_tokens {
            break;
        }
        used += cost;
        reversed.push(turn.clone());
    }

    reversed.reverse();
    (reversed, used)
}

/// Stateless packer; all state lives in the `AssembledContext` it produces.
pub struct ContextAssembler;

impl ContextAssembler {
    pub fn new() -> Self {
        Self
    }

    #[allow(clippy::too_many_arguments)]
    pub fn assemble(
        &self,
        intent: Intent,
        system_prompt: &str,
        memory: Option<&MemoryContext>,
        rag_results: &[RetrievalResult],
        conversation: &[ConversationTurn],
        budget: ContextBudget,
    ) -> AssembledContext {
        let mut total = tokens(system_prompt);

        let memory_budget = budget.memory_budget();
        let memory_block = memory.and_then(MemoryContext::format_for_prompt).map(|formatted| {
            if tokens(&formatted) <= memory_budget {
                formatted
            } else {
                truncate_to_tokens(&formatted, memory_budget)
            }
        });
        if let Some(block) = &memory_block {
            total += tokens(block);
        }

        let rag_budget = match intent {
            Intent::Personal => budget.rag_budget(),
            Intent::Hybrid => budget.rag_budget() / 2,
            Intent::Memory | Intent::General => 0,
        };
        let rag_block = build_rag_block(rag_results, rag_budget);
        if let Some(block) = &rag_block {
            total += tokens(block);
        }

        let (included_conversation, conversation_tokens) =
            build_conversation(conversation, budget.conversation_budget());
        total += conversation_tokens;

        AssembledContext {
            system_prompt: system_prompt.to_string(),
            memory_block,
            rag_block,
            conversation: included_conversation,
            estimated_tokens: total,
        }
    }

    /// Evict in priority order until `ctx` fits `budget.total -
    /// budget.response_budget()`, or nothing further can be cut.
    pub fn optimize(&self, ctx: &mut AssembledContext, budget: ContextBudget) {
        let limit = budget.total.saturating_sub(budget.response_budget());

        loop {
            if ctx.estimated_tokens <= limit {
                return;
            }

            if ctx.conversation.len() > 2 {
                let removed = ctx.conversation.remove(0);
                ctx.estimated_tokens = ctx.estimated_tokens.saturating_sub(tokens(&removed.content) + 10);
                continue;
            }

            if let Some(rag) = &ctx.rag_block {
                let rag_tokens = tokens(rag);
                if rag_tokens > 500 {
                    let halved = truncate_to_tokens(rag, rag_tokens / 2);
                    ctx.estimated_tokens = ctx.estimated_tokens - rag_tokens + tokens(&halved);
                    ctx.rag_block = Some(halved);
                    continue;
                }
            }

            if let Some(memory) = &ctx.memory_block {
                let memory_tokens = tokens(memory);
                if memory_tokens > 200 {
                    let halved = truncate_to_tokens(memory, memory_tokens / 2);
                    ctx.estimated_tokens = ctx.estimated_tokens - memory_tokens + tokens(&halved);
                    ctx.memory_block = Some(halved);
                    continue;
                }
            }

            return;
        }
    }
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new()
    }
}
