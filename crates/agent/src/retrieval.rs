//! Keyword retrieval over the knowledge base.
//!
//! Scoring for one item against the lowercased query:
//! - +1 for every keyword that occurs as a substring of the query
//! - +1 if the item's lowercased content contains the whole query
//!
//! The item with the strictly greatest score wins; ties keep the item
//! declared first. A best score of zero means no passage.

use clonechat_core::knowledge::{KnowledgeBase, KnowledgeItem};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// The winning item of a retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetrievalMatch {
    pub topic: String,
    /// Position of the item in the knowledge base
    pub index: usize,
    pub score: usize,
    pub content: String,
}

/// Scores queries against a shared, immutable knowledge base.
#[derive(Clone)]
pub struct Retriever {
    knowledge: Arc<KnowledgeBase>,
}

impl Retriever {
    pub fn new(knowledge: Arc<KnowledgeBase>) -> Self {
        Self { knowledge }
    }

    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    /// The best-matching passage for `query`, if any item scores above zero.
    pub fn retrieve(&self, query: &str) -> Option<String> {
        self.retrieve_match(query).map(|m| m.content)
    }

    /// Like [`retrieve`](Self::retrieve), but reports which item won and why.
    pub fn retrieve_match(&self, query: &str) -> Option<RetrievalMatch> {
        let normalized = query.to_lowercase();

        let mut best: Option<(usize, usize)> = None;
        for (index, item) in self.knowledge.iter().enumerate() {
            let score = score_item(item, &normalized);
            if score > best.map_or(0, |(_, s)| s) {
                best = Some((index, score));
            }
        }

        let (index, score) = best?;
        let item = &self.knowledge.items()[index];
        debug!(topic = %item.topic, score, "Retrieved passage");

        Some(RetrievalMatch {
            topic: item.topic.clone(),
            index,
            score,
            content: item.content.clone(),
        })
    }
}

fn score_item(item: &KnowledgeItem, normalized_query: &str) -> usize {
    let keyword_hits = item
        .keywords
        .iter()
        .filter(|keyword| normalized_query.contains(keyword.as_str()))
        .count();
    let content_hit = item.content.to_lowercase().contains(normalized_query);
    keyword_hits + usize::from(content_hit)
}
