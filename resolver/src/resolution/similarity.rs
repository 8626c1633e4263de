use std::collections::{HashMap, HashSet};

use crate::config::ResolutionConfig;
use crate::embedding::cosine_similarity;

use super::types::{Entity, Relation, ResolutionMethod};

/// Score of a containment match ("Eze" inside "Eberechi Eze"). Strong
/// lexical evidence, but weaker than an exact match.
const CONTAINMENT_SCORE: f32 = 0.9;

/// Pairwise gate-then-score model over one resolution run.
///
/// Read-only once constructed; the embedding map is fully collected
/// before any scoring starts, so the scorer can be shared across
/// concurrent scan tasks.
pub struct SimilarityScorer<'a> {
    config: &'a ResolutionConfig,
    embeddings: &'a HashMap<String, Vec<f32>>,
    neighbors: HashMap<String, HashSet<String>>,
}

impl<'a> SimilarityScorer<'a> {
    pub fn new(
        config: &'a ResolutionConfig,
        embeddings: &'a HashMap<String, Vec<f32>>,
        relations: &[Relation],
    ) -> Self {
        Self {
            config,
            embeddings,
            neighbors: neighbor_map(relations),
        }
    }

    /// Cheap admissibility check. Exact mention matches pass outright;
    /// otherwise a type-overlap veto applies, then a weighted blend of
    /// string similarity, type overlap and (when both entities carry
    /// vectors) embedding cosine must clear `merge_threshold`.
    pub fn should_consider_merge(&self, a: &Entity, b: &Entity) -> bool {
        let left = normalize(&a.mention);
        let right = normalize(&b.mention);
        if left.is_empty() || right.is_empty() {
            return false;
        }
        if left == right {
            return true;
        }

        let overlap = type_overlap(&a.types, &b.types);
        if self.config.require_type_overlap
            && !a.types.is_empty()
            && !b.types.is_empty()
            && overlap < self.config.min_type_overlap
        {
            return false;
        }

        let mut score = self.config.string_weight * string_similarity(&a.mention, &b.mention)
            + self.config.type_weight * overlap;
        let mut total = self.config.string_weight + self.config.type_weight;
        if let Some(cosine) = self.embedding_cosine(a, b) {
            score += self.config.embedding_weight * cosine;
            total += self.config.embedding_weight;
        }

        total > 0.0 && score / total >= self.config.merge_threshold
    }

    /// Full blended similarity for a gated-in pair: string, type,
    /// shared-neighbor and optional embedding evidence, normalized by
    /// the weights actually applicable to the pair.
    pub fn entity_similarity(&self, a: &Entity, b: &Entity) -> f32 {
        if normalize(&a.mention) == normalize(&b.mention) {
            return 1.0;
        }

        let mut score = self.config.string_weight * string_similarity(&a.mention, &b.mention)
            + self.config.type_weight * type_overlap(&a.types, &b.types);
        let mut total = self.config.string_weight + self.config.type_weight;

        if let Some(overlap) = self.neighbor_overlap(a, b) {
            score += self.config.neighbor_weight * overlap;
            total += self.config.neighbor_weight;
        }
        if let Some(cosine) = self.embedding_cosine(a, b) {
            score += self.config.embedding_weight * cosine;
            total += self.config.embedding_weight;
        }

        if total > 0.0 { score / total } else { 0.0 }
    }

    /// Dominant signal that justified the merge, for provenance.
    pub fn detect_method(&self, a: &Entity, b: &Entity) -> ResolutionMethod {
        let left = normalize(&a.mention);
        let right = normalize(&b.mention);
        if left == right {
            return ResolutionMethod::Exact;
        }
        if is_word_containment(&left, &right) {
            return ResolutionMethod::Containment;
        }

        let lexical = self.config.string_weight * string_similarity(&a.mention, &b.mention);
        let neighbor =
            self.config.neighbor_weight * self.neighbor_overlap(a, b).unwrap_or_default();
        let embedding =
            self.config.embedding_weight * self.embedding_cosine(a, b).unwrap_or_default();

        if neighbor > lexical && neighbor >= embedding {
            ResolutionMethod::SharedNeighbor
        } else if embedding > lexical {
            ResolutionMethod::Embedding
        } else {
            ResolutionMethod::Lexical
        }
    }

    /// Clamped cosine between the pair's embeddings, if both are present.
    fn embedding_cosine(&self, a: &Entity, b: &Entity) -> Option<f32> {
        if self.config.embedding_weight <= 0.0 {
            return None;
        }
        let left = self.embeddings.get(&a.id)?;
        let right = self.embeddings.get(&b.id)?;
        Some(cosine_similarity(left, right).max(0.0))
    }

    /// Jaccard overlap of relation neighborhoods, excluding the pair
    /// itself. `None` when either entity has no neighbors to speak of.
    fn neighbor_overlap(&self, a: &Entity, b: &Entity) -> Option<f32> {
        let left = self.neighbors.get(&a.id)?;
        let right = self.neighbors.get(&b.id)?;

        let left: HashSet<&String> = left.iter().filter(|id| **id != b.id).collect();
        let right: HashSet<&String> = right.iter().filter(|id| **id != a.id).collect();
        if left.is_empty() || right.is_empty() {
            return None;
        }

        let intersection = left.intersection(&right).count();
        let union = left.union(&right).count();
        Some(intersection as f32 / union as f32)
    }
}

/// Undirected neighborhoods over entity-valued relations. Literal
/// objects contribute nothing.
fn neighbor_map(relations: &[Relation]) -> HashMap<String, HashSet<String>> {
    let mut neighbors: HashMap<String, HashSet<String>> = HashMap::new();
    for relation in relations {
        let Some(object_id) = relation.object.as_entity_id() else {
            continue;
        };
        neighbors
            .entry(relation.subject_id.clone())
            .or_default()
            .insert(object_id.to_string());
        neighbors
            .entry(object_id.to_string())
            .or_default()
            .insert(relation.subject_id.clone());
    }
    neighbors
}

fn normalize(mention: &str) -> String {
    mention.trim().to_lowercase()
}

fn words(mention: &str) -> Vec<&str> {
    mention
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Whether the shorter mention's words are a subset of the longer's.
/// Requires at least three characters of shorter mention, so initials
/// alone never count as containment.
fn is_word_containment(a: &str, b: &str) -> bool {
    let (shorter, longer) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };
    if shorter == longer || shorter.chars().filter(|c| c.is_alphanumeric()).count() < 3 {
        return false;
    }

    let shorter_words = words(shorter);
    if shorter_words.is_empty() {
        return false;
    }
    let longer_words: HashSet<&str> = words(longer).into_iter().collect();
    shorter_words.iter().all(|w| longer_words.contains(w))
}

/// Normalized string similarity of two mentions: the strongest of
/// Jaro-Winkler distance, token Jaccard overlap and the containment
/// score.
pub fn string_similarity(a: &str, b: &str) -> f32 {
    let left = normalize(a);
    let right = normalize(b);
    if left == right {
        return 1.0;
    }
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }

    let jaro = strsim::jaro_winkler(&left, &right) as f32;
    let jaccard = token_jaccard(&left, &right);
    let containment = if is_word_containment(&left, &right) {
        CONTAINMENT_SCORE
    } else {
        0.0
    };

    jaro.max(jaccard).max(containment)
}

fn token_jaccard(a: &str, b: &str) -> f32 {
    let left: HashSet<&str> = words(a).into_iter().collect();
    let right: HashSet<&str> = words(b).into_iter().collect();
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }

    let intersection = left.intersection(&right).count();
    let union = left.union(&right).count();
    intersection as f32 / union as f32
}

/// Jaccard overlap of two type-label sets. Two empty sets overlap
/// perfectly; one empty set is missing evidence and scores 0.0.
pub fn type_overlap(a: &[String], b: &[String]) -> f32 {
    let left: HashSet<&str> = a.iter().map(String::as_str).collect();
    let right: HashSet<&str> = b.iter().map(String::as_str).collect();
    if left.is_empty() && right.is_empty() {
        return 1.0;
    }
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }

    let intersection = left.intersection(&right).count();
    let union = left.union(&right).count();
    intersection as f32 / union as f32
}
