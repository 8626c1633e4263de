use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::debug;

use crate::config::ResolutionConfig;

use super::types::Entity;

/// Tokens too generic to narrow a candidate set: articles, conjunctions
/// and legal/organizational suffixes.
const STOPWORDS: &[&str] = &[
    "the", "and", "for", "from", "with", "are", "was", "were", "inc", "llc", "ltd", "plc", "gmbh",
    "corp", "corporation", "company", "group", "holdings", "university", "college", "department",
    "institute", "institution", "association", "organization", "foundation",
];

/// Lowercased word tokens of a mention, deduplicated in order of first
/// appearance; tokens of length <= 2 and stopwords are dropped.
pub fn mention_tokens(mention: &str) -> Vec<String> {
    let lowered = mention.to_lowercase();
    let mut seen = HashSet::new();
    let mut tokens = Vec::new();
    for raw in lowered.split(|c: char| !c.is_alphanumeric()) {
        if raw.chars().count() <= 2 || STOPWORDS.contains(&raw) {
            continue;
        }
        if seen.insert(raw) {
            tokens.push(raw.to_string());
        }
    }
    tokens
}

/// Token -> entity-indices inverted index. Built once per resolution run
/// and only read afterwards.
///
/// Inactive below `blocking_threshold`, where the exhaustive pairwise
/// scan is cheap enough; active indexes every entity's mention tokens.
pub struct BlockingIndex {
    postings: HashMap<String, Vec<usize>>,
    entity_count: usize,
    max_block_size: usize,
    active: bool,
}

impl BlockingIndex {
    pub fn build(entities: &[Entity], config: &ResolutionConfig) -> Self {
        let active = entities.len() >= config.blocking_threshold;
        let mut postings: HashMap<String, Vec<usize>> = HashMap::new();

        if active {
            for (idx, entity) in entities.iter().enumerate() {
                for token in mention_tokens(&entity.mention) {
                    postings.entry(token).or_default().push(idx);
                }
            }
            debug!(
                entities = entities.len(),
                tokens = postings.len(),
                "built blocking index"
            );
        }

        Self {
            postings,
            entity_count: entities.len(),
            max_block_size: config.max_block_size,
            active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Candidate indices `j > i` to compare entity `i` against, sorted
    /// ascending. Exhaustive when the index is inactive; otherwise the
    /// union of this mention's posting lists, skipping lists larger than
    /// `max_block_size`. A mention with no qualifying tokens gets no
    /// blocked candidates.
    pub fn candidates_for(&self, i: usize, mention: &str) -> Vec<usize> {
        if !self.active {
            return (i + 1..self.entity_count).collect();
        }

        let mut candidates = BTreeSet::new();
        for token in mention_tokens(mention) {
            let Some(posting) = self.postings.get(&token) else {
                continue;
            };
            if posting.len() > self.max_block_size {
                continue;
            }
            candidates.extend(posting.iter().copied().filter(|&j| j > i));
        }
        candidates.into_iter().collect()
    }
}
