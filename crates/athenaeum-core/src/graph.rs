//! Knowledge graph and graph expansion
//!
//! The graph itself is produced by an external graph-builder and consumed
//! read-only; this module only defines the in-memory shape (two flat
//! tables keyed by stable string ids, per the "never embed entity pointers
//! inside relationships" design note) and the one-hop expansion operation.
//! A reference SQLite loader is provided behind the `graph` feature for
//! tests and the CLI demo — grounded in the teacher's use of `rusqlite`
//! for durable storage (`storage/sqlite.rs`) — since no external
//! graph-builder schema was supplied with this spec.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::embedder::cosine_similarity;
use crate::hybrid::{MatchType, RetrievalResult};

/// An entity mentioned across one or more chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub name: String,
    pub entity_type: String,
    pub description: String,
    /// Chunk keys (`"source#chunk_index"`) where this entity is mentioned.
    pub mentioned_in: Vec<String>,
}

/// An undirected relationship between two entities, referenced by id —
/// never by embedding an `Entity` pointer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub entity_a: String,
    pub entity_b: String,
    pub strength: f32,
}

/// A connected cluster of entities with a human-authored summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Community {
    pub id: String,
    pub level: u32,
    pub members: Vec<String>,
    pub title: String,
    pub summary: String,
    pub embedding: Option<Vec<f32>>,
}

/// Two flat tables plus the chunk→entity inverted index GraphExpander
/// needs. Entities and communities never hold pointers into each other;
/// all traversal is a lookup through `entities_by_id` / `relationships`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    pub entities: HashMap<String, Entity>,
    pub relationships: Vec<Relationship>,
    pub communities: Vec<Community>,
}

pub fn chunk_key(source: &str, chunk_index: u32) -> String {
    format!("{source}#{chunk_index}")
}

impl KnowledgeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn entities_for_chunk(&self, key: &str) -> Vec<&Entity> {
        self.entities
            .values()
            .filter(|e| e.mentioned_in.iter().any(|m| m == key))
            .collect()
    }

    fn one_hop_neighbors(&self, entity_ids: &HashSet<String>) -> HashSet<String> {
        let mut neighbors = HashSet::new();
        for rel in &self.relationships {
            if entity_ids.contains(&rel.entity_a) {
                neighbors.insert(rel.entity_b.clone());
            }
            if entity_ids.contains(&rel.entity_b) {
                neighbors.insert(rel.entity_a.clone());
            }
        }
        neighbors
    }

    #[cfg(feature = "graph")]
    pub fn load_sqlite(path: &std::path::Path) -> crate::error::GraphResult<Self> {
        use rusqlite::Connection;

        let conn = Connection::open(path)?;
        let mut graph = Self::new();

        let mut entity_stmt = conn.prepare(
            "SELECT id, name, entity_type, description, mentioned_in FROM entities",
        )?;
        let entities = entity_stmt.query_map([], |row| {
            let mentioned_raw: String = row.get(4)?;
            Ok(Entity {
                id: row.get(0)?,
                name: row.get(1)?,
                entity_type: row.get(2)?,
                description: row.get(3)?,
                mentioned_in: mentioned_raw.split(',').filter(|s| !s.is_empty()).map(String::from).collect(),
            })
        })?;
        for entity in entities {
            let entity = entity?;
            graph.entities.insert(entity.id.clone(), entity);
        }

        let mut rel_stmt = conn.prepare("SELECT entity_a, entity_b, strength FROM relationships")?;
        let rels = rel_stmt.query_map([], |row| {
            Ok(Relationship { entity_a: row.get(0)?, entity_b: row.get(1)?, strength: row.get(2)? })
        })?;
        for rel in rels {
            graph.relationships.push(rel?);
        }

        let mut comm_stmt =
            conn.prepare("SELECT id, level, members, title, summary FROM communities")?;
        let comms = comm_stmt.query_map([], |row| {
            let members_raw: String = row.get(2)?;
            Ok(Community {
                id: row.get(0)?,
                level: row.get(1)?,
                members: members_raw.split(',').filter(|s| !s.is_empty()).map(String::from).collect(),
                title: row.get(3)?,
                summary: row.get(4)?,
                embedding: None,
            })
        })?;
        for comm in comms {
            graph.communities.push(comm?);
        }

        Ok(graph)
    }
}

/// Enriches retrieval results with entity context and community summaries,
/// and optionally pulls in one-hop related chunks.
pub struct GraphExpander;

impl GraphExpander {
    pub fn new() -> Self {
        Self
    }

    /// See spec §4.8. `query_embedding` is optional — communities without
    /// embeddings, or calls made without one, fall back to "first
    /// intersecting community wins".
    pub fn expand(
        &self,
        results: Vec<RetrievalResult>,
        graph: &KnowledgeGraph,
        max_results: usize,
        query_embedding: Option<&[f32]>,
    ) -> Vec<RetrievalResult> {
        let mut results = results;

        // Step 1-2: attach entity context per chunk.
        let mut touched_entities: HashSet<String> = HashSet::new();
        for result in &mut results {
            let key = chunk_key(&result.source, result.chunk_index);
            let entities = graph.entities_for_chunk(&key);
            if entities.is_empty() {
                continue;
            }
            let names: Vec<String> = entities.iter().map(|e| e.name.clone()).collect();
            for e in &entities {
                touched_entities.insert(e.id.clone());
            }
            result.entity_context = Some(names);
        }

        // Step 3: find the best-matching community and attach its summary
        // to the top 3 chunks whose entities belong to it.
        if !touched_entities.is_empty() {
            let mut candidate_communities: Vec<&Community> = graph
                .communities
                .iter()
                .filter(|c| c.members.iter().any(|m| touched_entities.contains(m)))
                .collect();

            if !candidate_communities.is_empty() {
                if let Some(q) = query_embedding {
                    candidate_communities.sort_by(|a, b| {
                        let score_a = a.embedding.as_deref().map(|e| cosine_similarity(q, e)).unwrap_or(-1.0);
                        let score_b = b.embedding.as_deref().map(|e| cosine_similarity(q, e)).unwrap_or(-1.0);
                        score_b.partial_cmp(&score_a).unwrap_or(std::cmp::Ordering::Equal)
                    });
                }
                let best = candidate_communities[0];
                let member_set: HashSet<&String> = best.members.iter().collect();

                let mut attached = 0;
                for result in &mut results {
                    if attached >= 3 {
                        break;
                    }
                    let key = chunk_key(&result.source, result.chunk_index);
                    let entities = graph.entities_for_chunk(&key);
                    if entities.iter().any(|e| member_set.contains(&e.id)) {
                        result.community_summary = Some(best.summary.clone());
                        attached += 1;
                    }
                }
            }
        }

        // Step 4: one-hop expansion to fill out to max_results.
        if results.len() < max_results && !touched_entities.is_empty() {
            let neighbors = graph.one_hop_neighbors(&touched_entities);
            let mut seen_keys: HashSet<(String, u32)> =
                results.iter().map(|r| (r.source.clone(), r.chunk_index)).collect();
            let best_known_score = results.iter().map(|r| r.fused_score).fold(0.0_f64, f64::max);

            'neighbors: for neighbor_id in &neighbors {
                let Some(entity) = graph.entities.get(neighbor_id) else { continue };
                for chunk in &entity.mentioned_in {
                    if results.len() >= max_results {
                        break 'neighbors;
                    }
                    let Some((source, idx_str)) = chunk.rsplit_once('#') else { continue };
                    let Ok(chunk_index) = idx_str.parse::<u32>() else { continue };
                    if !seen_keys.insert((source.to_string(), chunk_index)) {
                        continue;
                    }
                    results.push(RetrievalResult {
                        fingerprint: uuid::Uuid::new_v4(),
                        text: format!("[related via {}]", entity.name),
                        source: source.to_string(),
                        category: None,
                        chunk_index,
                        fused_score: best_known_score,
                        match_type: MatchType::GraphExpanded,
                        entity_context: Some(vec![entity.name.clone()]),
                        community_summary: None,
                    });
                }
            }
        }

        results
    }
}

impl Default for GraphExpander {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result(source: &str, chunk_index: u32) -> RetrievalResult {
        RetrievalResult {
            fingerprint: uuid::Uuid::new_v4(),
            text: "Meeting with John about Q4 budget".to_string(),
            source: source.to_string(),
            category: None,
            chunk_index,
            fused_score: 0.9,
            match_type: MatchType::Hybrid,
            entity_context: None,
            community_summary: None,
        }
    }

    fn sample_graph() -> KnowledgeGraph {
        let mut graph = KnowledgeGraph::new();
        graph.entities.insert(
            "e-john".to_string(),
            Entity {
                id: "e-john".to_string(),
                name: "John".to_string(),
                entity_type: "person".to_string(),
                description: "".to_string(),
                mentioned_in: vec![chunk_key("calendar-1", 0)],
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
        graph
    }

    #[test]
    fn attaches_entity_context_and_community_summary() {
        let graph = sample_graph();
        let results = vec![sample_result("calendar-1", 0)];
        let expander = GraphExpander::new();
        let expanded = expander.expand(results, &graph, 1, None);

        assert_eq!(expanded[0].entity_context.as_deref(), Some(&["John".to_string()][..]));
        assert_eq!(expanded[0].community_summary.as_deref(), Some("Budget planning Q4"));
    }

    #[test]
    fn no_entities_means_no_expansion() {
        let graph = KnowledgeGraph::new();
        let results = vec![sample_result("calendar-1", 0)];
        let expander = GraphExpander::new();
        let expanded = expander.expand(results, &graph, 5, None);
        assert!(expanded[0].entity_context.is_none());
        assert_eq!(expanded.len(), 1);
    }

    #[test]
    fn one_hop_expansion_fills_out_to_max_results() {
        let mut graph = sample_graph();
        graph.entities.insert(
            "e-sarah".to_string(),
            Entity {
                id: "e-sarah".to_string(),
                name: "Sarah".to_string(),
                entity_type: "person".to_string(),
                description: "".to_string(),
                mentioned_in: vec![chunk_key("email-2", 0)],
            },
        );
        graph.relationships.push(Relationship {
            entity_a: "e-john".to_string(),
            entity_b: "e-sarah".to_string(),
            strength: 0.8,
        });

        let results = vec![sample_result("calendar-1", 0)];
        let expander = GraphExpander::new();
        let expanded = expander.expand(results, &graph, 3, None);

        assert!(expanded.iter().any(|r| r.match_type == MatchType::GraphExpanded));
        assert!(expanded.iter().any(|r| r.source == "email-2"));
    }
}
