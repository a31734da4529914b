//! End-to-end scenarios exercising `BrainIntegration`/`KnowledgeBrain`
//! against fixed inputs, mirroring the teacher's own integration-test
//! setup of scratch `tempfile` directories per test.

use std::collections::HashMap;
use std::sync::Arc;

use athenaeum_core::{
    BrainIntegration, BrainPaths, Category, Community, ContextBudget, Entity, EngineConfig, KnowledgeBrain,
    KnowledgeGraph, MemoryPaths, UnifiedMemory,
};

fn brain_paths(dir: &std::path::Path) -> BrainPaths {
    BrainPaths {
        bm25_index: dir.join("bm25_index.json"),
        metadata: dir.join("metadata.json"),
        knowledge_graph: dir.join("knowledge_graph.sqlite"),
    }
}

fn memory_paths(dir: &std::path::Path) -> MemoryPaths {
    MemoryPaths {
        semantic: dir.join("semantic.json"),
        episodic: dir.join("episodic.json"),
        procedural: dir.join("procedural.json"),
    }
}

fn integration_with_brain(dir: &std::path::Path, brain: KnowledgeBrain) -> BrainIntegration {
    BrainIntegration::new(
        EngineConfig::default(),
        ContextBudget::STANDARD,
        "You are a helpful assistant.".to_string(),
        brain,
        UnifiedMemory::new(),
        memory_paths(dir),
        Arc::new(athenaeum_core::CachedEmbedder::new(athenaeum_core::HashingEmbedder::default(), 64)),
        None,
    )
}

fn fresh_brain() -> KnowledgeBrain {
    let vector_index: Arc<dyn athenaeum_core::VectorIndex> =
        Arc::new(athenaeum_core::BruteForceVectorIndex::new(athenaeum_core::HashingEmbedder::default()));
    KnowledgeBrain::new(EngineConfig::default(), vector_index)
}

/// E1 — a general-knowledge query produces no context block at all, just
/// the original query followed by a blank line.
#[tokio::test]
async fn general_query_skips_retrieval_entirely() {
    let dir = tempfile::tempdir().unwrap();
    let mut integration = integration_with_brain(dir.path(), fresh_brain());

    let (text, source_count) = integration.process_message("Explain how photosynthesis works", false, &[]).await;

    assert_eq!(text, "Explain how photosynthesis works\n\n");
    assert_eq!(source_count, 0);
}

/// E2 — an exact invoice-number query against five preloaded documents
/// surfaces only the one document containing all three query tokens.
#[tokio::test]
async fn personal_query_hits_bm25_exact_match() {
    let dir = tempfile::tempdir().unwrap();
    let paths = brain_paths(dir.path());
    let mut brain = fresh_brain();

    let documents: [(&str, &str, Category); 5] = [
        ("Meeting with John about the Q4 budget review scheduled for Monday", "calendar", Category::Calendar),
        ("Email from Sarah regarding the marketing campaign results", "email", Category::Email),
        ("Invoice #INV-2024-0847 from ACME Corp for $5,000", "documents", Category::Documents),
        ("Notes from team standup: discussed sprint priorities and blockers", "notes", Category::Notes),
        ("John mentioned we need to finalize the budget proposal by Friday", "email", Category::Email),
    ];
    for (text, source, category) in documents {
        brain.ingest(text, source, Some(category), HashMap::new(), &paths, |_| {}).await.unwrap();
    }

    let results = brain.search_direct("INV-2024-0847", 5, None).await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].source, "documents");
    assert!(results[0].fused_score > 0.0);
}

/// E4 — a stated preference becomes a recallable semantic fact that
/// shows up verbatim in the assembled memory block on a later turn.
#[tokio::test]
async fn memory_extraction_survives_into_a_later_recall() {
    let dir = tempfile::tempdir().unwrap();
    let mut integration = integration_with_brain(dir.path(), fresh_brain());

    integration
        .record_interaction("I prefer tea over coffee in the morning.", "Noted, I'll remember that.", None)
        .await;

    let (text, _) = integration.process_message("What do I like to drink?", false, &[]).await;
    assert!(text.contains("- The user prefer tea over coffee in the morning"));
}

/// E6 — a chunk that mentions a graph entity gets entity context and,
/// when a community intersects it, that community's summary.
#[tokio::test]
async fn graph_expansion_adds_entity_context_on_retrieval() {
    let dir = tempfile::tempdir().unwrap();
    let paths = brain_paths(dir.path());
    let mut brain = fresh_brain();

    brain
        .ingest(
            "Meeting with John about the Q4 budget review scheduled for Monday",
            "calendar",
            Some(Category::Calendar),
            HashMap::new(),
            &paths,
            |_| {},
        )
        .await
        .unwrap();

    let mut graph = KnowledgeGraph::new();
    graph.entities.insert(
        "e-john".to_string(),
        Entity {
            id: "e-john".to_string(),
            name: "John".to_string(),
            entity_type: "person".to_string(),
            description: String::new(),
            mentioned_in: vec![athenaeum_core::graph::chunk_key("calendar", 0)],
        },
    );
    graph.communities.push(Community {
        id: "c-budget".to_string(),
        level: 0,
        members: vec!["e-john".to_string()],
        title: "Budget planning".to_string(),
        summary: "Budget planning Q4".to_string(),
        embedding: None,
    });
    brain.set_graph(Arc::new(graph));

    let results = brain.retrieve("What did I schedule with John for Monday?", 5, None).await;
    assert!(!results.is_empty());
    assert!(results[0].entity_context.as_deref().unwrap_or(&[]).contains(&"John".to_string()));
    assert_eq!(results[0].community_summary.as_deref(), Some("Budget planning Q4"));
}
