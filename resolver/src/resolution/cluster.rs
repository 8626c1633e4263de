use std::collections::{BTreeSet, HashMap, HashSet};

use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::{Bfs, EdgeRef};
use tracing::debug;

use super::types::{Entity, EntityCluster, ResolvedEntity, SimilarityEdge};

/// A qualifying candidate pair, produced by the scan stage. `left` and
/// `right` are input-order entity indices with `left < right`.
#[derive(Debug, Clone)]
pub struct ScoredPair {
    pub left: usize,
    pub right: usize,
    pub edge: SimilarityEdge,
}

/// Transitive clustering: one undirected graph node per input entity,
/// one edge per qualifying pair, connected components as clusters.
///
/// Components realize the transitive closure: if A merges with B and B
/// with C, all three land in one cluster even when A and C were never
/// directly compared.
pub fn cluster_entities(entities: &[Entity], pairs: &[ScoredPair]) -> Vec<EntityCluster> {
    if entities.is_empty() {
        return Vec::new();
    }
    if entities.len() == 1 {
        return vec![EntityCluster {
            entities: vec![entities[0].clone()],
            min_similarity: 1.0,
            methods: BTreeSet::new(),
        }];
    }

    let mut graph: UnGraph<usize, SimilarityEdge> = UnGraph::new_undirected();
    let nodes: Vec<NodeIndex> = (0..entities.len()).map(|i| graph.add_node(i)).collect();
    for pair in pairs {
        graph.add_edge(nodes[pair.left], nodes[pair.right], pair.edge);
    }

    let mut visited: HashSet<NodeIndex> = HashSet::with_capacity(entities.len());
    let mut clusters = Vec::new();

    for &start in &nodes {
        if visited.contains(&start) {
            continue;
        }

        let mut members = Vec::new();
        let mut bfs = Bfs::new(&graph, start);
        while let Some(node) = bfs.next(&graph) {
            visited.insert(node);
            members.push(graph[node]);
        }
        members.sort_unstable();

        let mut min_similarity = 1.0_f32;
        let mut methods = BTreeSet::new();
        for &index in &members {
            for edge in graph.edges(nodes[index]) {
                let weight = edge.weight();
                min_similarity = min_similarity.min(weight.similarity);
                methods.insert(weight.method);
            }
        }

        clusters.push(EntityCluster {
            entities: members.iter().map(|&i| entities[i].clone()).collect(),
            min_similarity,
            methods,
        });
    }

    debug!(
        entities = entities.len(),
        edges = pairs.len(),
        clusters = clusters.len(),
        "clustered entities"
    );
    clusters
}

/// Deterministic, order-independent merge of one cluster into its
/// canonical entity.
///
/// Canonical member: longest mention, first-in-input-order on ties.
/// Types: any label appearing in at least ceil(n/2) members, falling
/// back to the canonical member's own types when none clears the bar.
/// Attributes: first-writer-wins over members sorted by mention length
/// descending.
pub fn merge_cluster(cluster: &EntityCluster) -> ResolvedEntity {
    // max_by_key would return the last maximum; ties must go to the
    // first member in input order.
    let mut members = cluster.entities.iter();
    let mut canonical = members.next().expect("cluster has at least one member");
    for entity in members {
        if entity.mention.chars().count() > canonical.mention.chars().count() {
            canonical = entity;
        }
    }

    let threshold = cluster.entities.len().div_ceil(2);
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for entity in &cluster.entities {
        let distinct: BTreeSet<&str> = entity.types.iter().map(String::as_str).collect();
        for label in distinct {
            let count = counts.entry(label).or_insert(0);
            if *count == 0 {
                order.push(label);
            }
            *count += 1;
        }
    }
    let mut types: Vec<String> = order
        .into_iter()
        .filter(|label| counts[label] >= threshold)
        .map(str::to_string)
        .collect();
    if types.is_empty() {
        types = canonical.types.clone();
    }

    let mut by_length: Vec<&Entity> = cluster.entities.iter().collect();
    by_length.sort_by_key(|entity| std::cmp::Reverse(entity.mention.chars().count()));
    let mut attributes = HashMap::new();
    for entity in by_length {
        for (key, value) in &entity.attributes {
            attributes
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }

    ResolvedEntity {
        canonical_id: canonical.id.clone(),
        mention: canonical.mention.clone(),
        types,
        attributes,
    }
}
