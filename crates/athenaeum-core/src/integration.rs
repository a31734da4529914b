//! Top-level entry point
//!
//! Composes the router, knowledge brain, memory, and assembler into one
//! `process_message` call. Grounded in the teacher's
//! `vestige-mcp/src/tools/search.rs`, which plays the analogous role of
//! "one tool call fans out to storage + embeddings + formatting" — here
//! generalized to the router-gated, multi-source prompt assembly this
//! crate's contract requires.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::assembler::{ConversationTurn, ContextAssembler, Role};
use crate::brain::KnowledgeBrain;
use crate::chunk::Category;
use crate::config::{ContextBudget, EngineConfig};
use crate::embedder::Embedder;
use crate::memory::UnifiedMemory;
use crate::router::QueryRouter;

const PROMPT_PREAMBLE: &str = "Below is information that may or may not be relevant to my request.\n\nWhen multiple sources provide correct, but conflicting information, ALWAYS use sources from files, not websites.\n\nIf your response uses information from provided sources, your response MUST be directly followed with a single exhaustive LIST OF FILEPATHS AND URLS of ALL referenced sources, in the format [{\"url\": \"/path/to/file.pdf\"}, {\"url\": \"https://website.com\"}]\n\nIf no sources were provided or used, DO NOT mention sources in your response.";

/// One hit returned by an external web-search collaborator.
#[derive(Debug, Clone)]
pub struct WebResult {
    pub text: String,
    pub source: String,
}

/// The narrow web-search capability `BrainIntegration` consumes.
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, count: usize) -> Vec<WebResult>;
}

/// Where `UnifiedMemory` persists, owned by the composition root.
#[derive(Debug, Clone)]
pub struct MemoryPaths {
    pub semantic: PathBuf,
    pub episodic: PathBuf,
    pub procedural: PathBuf,
}

/// Composes `QueryRouter` → `{KnowledgeBrain, UnifiedMemory}` →
/// `ContextAssembler` into one `process_message` call.
pub struct BrainIntegration {
    config: EngineConfig,
    budget: ContextBudget,
    system_prompt: String,
    brain: KnowledgeBrain,
    memory: UnifiedMemory,
    memory_paths: MemoryPaths,
    embedder: Arc<dyn Embedder>,
    web_search: Option<Arc<dyn WebSearch>>,
    router: QueryRouter,
    assembler: ContextAssembler,
    conversation: Vec<ConversationTurn>,
}

impl BrainIntegration {
    pub fn new(
        config: EngineConfig,
        budget: ContextBudget,
        system_prompt: String,
        brain: KnowledgeBrain,
        memory: UnifiedMemory,
        memory_paths: MemoryPaths,
        embedder: Arc<dyn Embedder>,
        web_search: Option<Arc<dyn WebSearch>>,
    ) -> Self {
        Self {
            config,
            budget,
            system_prompt,
            brain,
            memory,
            memory_paths,
            embedder,
            web_search,
            router: QueryRouter::new(),
            assembler: ContextAssembler::new(),
            conversation: Vec::new(),
        }
    }

    /// Classify, recall memory, retrieve, optionally web-search, and
    /// assemble a final prompt block. Returns `(augmented_user_text,
    /// source_count)`; `source_count == 0` means no context was added.
    pub async fn process_message(
        &mut self,
        query: &str,
        use_web_search: bool,
        temporary_sources: &[(String, String)],
    ) -> (String, usize) {
        let classification = self.router.classify(query);
        let intent = classification.intent;
        let strategy = intent.strategy();

        let memory_context = if self.config.use_memory && strategy.use_memory {
            Some(self.memory.recall(query, self.embedder.as_ref(), 5, 3).await)
        } else {
            None
        };

        let rag_results = if strategy.use_rag {
            self.brain.retrieve(query, strategy.max_results, None).await
        } else {
            Vec::new()
        };

        let web_results = if use_web_search && matches!(intent, crate::router::Intent::Personal | crate::router::Intent::Hybrid) {
            let count = if matches!(intent, crate::router::Intent::Personal) { 2 } else { 3 };
            match &self.web_search {
                Some(search) => search.search(query, count).await,
                None => Vec::new(),
            }
        } else {
            Vec::new()
        };

        let assembled = self.assembler.assemble(
            intent,
            &self.system_prompt,
            memory_context.as_ref(),
            &rag_results,
            &self.conversation,
            self.budget,
        );
        let mut assembled = assembled;
        self.assembler.optimize(&mut assembled, self.budget);

        let web_block = format_listing_block("## Web search results:\n\n", web_results.iter().map(|r| (r.source.as_str(), r.text.as_str())));
        let temp_block = format_listing_block(
            "## Provided files:\n\n",
            temporary_sources.iter().map(|(src, text)| (src.as_str(), text.as_str())),
        );

        let sections: Vec<String> = [assembled.memory_block.clone(), assembled.rag_block.clone(), web_block, temp_block]
            .into_iter()
            .flatten()
            .collect();

        let augmented_user_text = if sections.is_empty() {
            format!("{query}\n\n")
        } else {
            format!("{query}\n\n{PROMPT_PREAMBLE}\n\n{}\n", sections.join("\n\n---\n\n"))
        };

        let source_count = rag_results.len() + web_results.len() + temporary_sources.len();
        (augmented_user_text, source_count)
    }

    /// Call once the downstream LLM has replied. Updates memory and the
    /// rolling conversation window; failures here never retroactively
    /// affect a prompt already returned by `process_message`.
    pub async fn record_interaction(&mut self, query: &str, reply: &str, was_helpful: Option<bool>) {
        self.memory.process_interaction(query, reply, was_helpful, self.embedder.as_ref()).await;
        if let Err(e) =
            self.memory.save(&self.memory_paths.semantic, &self.memory_paths.episodic, &self.memory_paths.procedural)
        {
            warn!("failed to persist memory after interaction: {e}");
        }

        self.conversation.push(ConversationTurn { role: Role::User, content: query.to_string() });
        self.conversation.push(ConversationTurn { role: Role::Assistant, content: reply.to_string() });
    }

    pub async fn ingest(
        &mut self,
        content: &str,
        source: &str,
        category: Option<Category>,
        metadata: std::collections::HashMap<String, String>,
        paths: &crate::brain::BrainPaths,
        progress_cb: impl FnMut(crate::brain::IngestProgress),
    ) -> crate::error::Result<usize> {
        self.brain.ingest(content, source, category, metadata, paths, progress_cb).await
    }
}

fn format_listing_block<'a>(header: &str, entries: impl Iterator<Item = (&'a str, &'a str)>) -> Option<String> {
    let mut block = String::from(header);
    let mut any = false;
    for (i, (source, text)) in entries.enumerate() {
        any = true;
        block.push_str(&format!("[{}] {source}\n{text}\n\n", i + 1));
    }
    any.then(|| block.trim_end().to_string())
}
