use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::json;

use resolver::resolution::{BlockingIndex, GraphSnapshot};
use resolver::{
    EmbeddingProvider, EmbeddingPurpose, Entity, EntityResolver, KnowledgeGraph, Relation,
    RelationObject, ResolutionConfig, ResolutionMethod,
};

fn entity(id: &str, mention: &str, types: &[&str]) -> Entity {
    Entity {
        id: id.to_string(),
        mention: mention.to_string(),
        types: types.iter().map(|t| t.to_string()).collect(),
        attributes: HashMap::new(),
        chunk_index: None,
    }
}

fn lexical_config() -> ResolutionConfig {
    ResolutionConfig {
        embedding_weight: 0.0,
        ..ResolutionConfig::default()
    }
}

/// Deterministic provider returning preset vectors; errors on unknown
/// text like a real provider would on an outage.
#[derive(Default)]
struct StaticEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    calls: AtomicUsize,
}

impl StaticEmbedder {
    fn with_vectors(vectors: &[(&str, Vec<f32>)]) -> Self {
        Self {
            vectors: vectors
                .iter()
                .map(|(text, vector)| (text.to_string(), vector.clone()))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for StaticEmbedder {
    async fn embed(&self, text: &str, _purpose: EmbeddingPurpose) -> anyhow::Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.vectors
            .get(text)
            .cloned()
            .ok_or_else(|| anyhow!("no embedding for {text}"))
    }
}

fn resolver_with(config: ResolutionConfig) -> EntityResolver {
    EntityResolver::new(Arc::new(StaticEmbedder::default()), config)
}

/// Cluster membership as sorted id groups, independent of graph layout.
fn cluster_groups(snapshot: &GraphSnapshot) -> BTreeSet<Vec<String>> {
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for link in &snapshot.resolution_links {
        groups
            .entry(link.canonical_id.clone())
            .or_default()
            .push(link.mention_id.clone());
    }
    groups
        .into_values()
        .map(|mut ids| {
            ids.sort();
            ids
        })
        .collect()
}

#[tokio::test]
async fn scenario_coreferent_mentions_merge_into_longest() -> anyhow::Result<()> {
    let input = KnowledgeGraph {
        entities: vec![
            entity("e1", "Eze", &["Person"]),
            entity("e2", "Eberechi Eze", &["Person", "Athlete"]),
        ],
        relations: vec![],
    };

    let graph = resolver_with(lexical_config()).resolve(&input).await?;
    assert_eq!(graph.stats.cluster_count, 1);
    assert_eq!(graph.canonical_map["e1"], "e2");
    assert_eq!(graph.canonical_map["e2"], "e2");

    let snapshot = graph.snapshot();
    assert_eq!(snapshot.resolved.len(), 1);
    let merged = &snapshot.resolved[0];
    assert_eq!(merged.canonical_id, "e2");
    assert_eq!(merged.mention, "Eberechi Eze");
    // Two members, so the voting threshold is ceil(2/2) = 1 and both
    // labels survive.
    assert!(merged.types.contains(&"Person".to_string()));
    assert!(merged.types.contains(&"Athlete".to_string()));

    let e1_link = snapshot
        .resolution_links
        .iter()
        .find(|link| link.mention_id == "e1")
        .unwrap();
    assert_eq!(e1_link.method, ResolutionMethod::Containment);
    let e2_link = snapshot
        .resolution_links
        .iter()
        .find(|link| link.mention_id == "e2")
        .unwrap();
    assert_eq!(e2_link.method, ResolutionMethod::Exact);
    assert_eq!(e2_link.confidence, 1.0);
    Ok(())
}

#[tokio::test]
async fn empty_input_yields_empty_graph_and_no_provider_calls() -> anyhow::Result<()> {
    let provider = Arc::new(StaticEmbedder::default());
    let resolver = EntityResolver::new(provider.clone(), ResolutionConfig::default());

    let graph = resolver.resolve(&KnowledgeGraph::default()).await?;
    assert_eq!(graph.stats.mention_count, 0);
    assert_eq!(graph.stats.resolved_count, 0);
    assert_eq!(graph.stats.relation_count, 0);
    assert_eq!(graph.stats.cluster_count, 0);
    assert!(graph.canonical_map.is_empty());
    assert_eq!(provider.call_count(), 0);
    Ok(())
}

#[tokio::test]
async fn singleton_input_resolves_to_itself() -> anyhow::Result<()> {
    let input = KnowledgeGraph {
        entities: vec![entity("only", "Selhurst Park", &["Venue"])],
        relations: vec![],
    };

    let graph = resolver_with(lexical_config()).resolve(&input).await?;
    assert_eq!(graph.stats.cluster_count, 1);
    assert_eq!(graph.canonical_map["only"], "only");

    let snapshot = graph.snapshot();
    let link = &snapshot.resolution_links[0];
    assert_eq!(link.confidence, 1.0);
    assert_eq!(link.method, ResolutionMethod::Exact);
    Ok(())
}

#[tokio::test]
async fn canonical_map_is_total_and_mentions_partition_input() -> anyhow::Result<()> {
    let input = KnowledgeGraph {
        entities: vec![
            entity("e1", "Eze", &["Person"]),
            entity("e2", "Eberechi Eze", &["Person", "Athlete"]),
            entity("e3", "Crystal Palace", &["Club"]),
            entity("e4", "Selhurst Park", &["Venue"]),
            entity("e5", "", &["Unknown"]),
        ],
        relations: vec![],
    };

    let graph = resolver_with(lexical_config()).resolve(&input).await?;
    let ids: BTreeSet<&str> = input.entities.iter().map(|e| e.id.as_str()).collect();
    let mapped: BTreeSet<&str> = graph.canonical_map.keys().map(String::as_str).collect();
    assert_eq!(ids, mapped);

    let snapshot = graph.snapshot();
    assert_eq!(snapshot.mentions.len(), input.entities.len());
    let mention_ids: BTreeSet<&str> =
        snapshot.mentions.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, mention_ids);

    // Every mention appears in exactly one cluster group.
    let groups = cluster_groups(&snapshot);
    let total: usize = groups.iter().map(Vec::len).sum();
    assert_eq!(total, input.entities.len());
    Ok(())
}

#[tokio::test]
async fn type_voting_keeps_majority_labels() -> anyhow::Result<()> {
    let input = KnowledgeGraph {
        entities: vec![
            entity("e1", "Eze", &["Person"]),
            entity("e2", "Eberechi Eze", &["Person", "Athlete"]),
            entity("e3", "Eberechi Oluchi Eze", &["Person"]),
        ],
        relations: vec![],
    };

    let graph = resolver_with(lexical_config()).resolve(&input).await?;
    assert_eq!(graph.stats.cluster_count, 1);
    assert_eq!(graph.canonical_map["e1"], "e3");

    let snapshot = graph.snapshot();
    // "Athlete" appears in 1 of 3 members, below ceil(3/2) = 2.
    assert_eq!(snapshot.resolved[0].types, vec!["Person".to_string()]);
    Ok(())
}

#[tokio::test]
async fn attribute_merge_prefers_longer_mentions() -> anyhow::Result<()> {
    let mut short = entity("e1", "Eze", &["Person"]);
    short.attributes.insert("club".into(), json!("Palace"));
    short.attributes.insert("shirt".into(), json!(10));
    let mut long = entity("e2", "Eberechi Eze", &["Person"]);
    long.attributes.insert("club".into(), json!("Crystal Palace"));

    let input = KnowledgeGraph {
        entities: vec![short, long],
        relations: vec![],
    };

    let graph = resolver_with(lexical_config()).resolve(&input).await?;
    let snapshot = graph.snapshot();
    let merged = &snapshot.resolved[0];
    assert_eq!(merged.attributes["club"], json!("Crystal Palace"));
    assert_eq!(merged.attributes["shirt"], json!(10));
    Ok(())
}

#[tokio::test]
async fn relations_canonicalize_or_drop() -> anyhow::Result<()> {
    let input = KnowledgeGraph {
        entities: vec![
            entity("e1", "Eze", &["Person"]),
            entity("e2", "Eberechi Eze", &["Person"]),
            entity("e3", "Crystal Palace", &["Club"]),
        ],
        relations: vec![
            Relation {
                subject_id: "e1".into(),
                predicate: "plays_for".into(),
                object: RelationObject::Entity("e3".into()),
            },
            // Literal object: never a relation edge.
            Relation {
                subject_id: "e1".into(),
                predicate: "mentions".into(),
                object: RelationObject::Literal(json!("42.5")),
            },
            // Unknown subject: dropped.
            Relation {
                subject_id: "ghost".into(),
                predicate: "plays_for".into(),
                object: RelationObject::Entity("e3".into()),
            },
        ],
    };

    let graph = resolver_with(lexical_config()).resolve(&input).await?;
    assert_eq!(graph.stats.relation_count, 1);

    let snapshot = graph.snapshot();
    assert_eq!(snapshot.relation_links.len(), 1);
    let link = &snapshot.relation_links[0];
    // e1 canonicalizes to e2, so the edge runs between canonical ids.
    assert_eq!(link.subject_id, "e2");
    assert_eq!(link.object_id, "e3");
    assert_eq!(link.predicate, "plays_for");
    assert!(!link.grounded);
    Ok(())
}

#[tokio::test]
async fn blocking_matches_exhaustive_clustering() -> anyhow::Result<()> {
    let mut entities = vec![
        entity("dup1a", "Acme Robotics", &["Organization"]),
        entity("dup1b", "Acme Robotics Limited", &["Organization"]),
        entity("dup2a", "Eberechi Eze", &["Person"]),
        entity("dup2b", "Eze", &["Person"]),
        entity("dup3a", "Crystal Palace", &["Club"]),
        entity("dup3b", "Crystal Palace Football Club", &["Club"]),
        entity("dup4a", "Selhurst Park", &["Venue"]),
        entity("dup4b", "Selhurst Park Stadium", &["Venue"]),
        entity("dup5a", "Premier League", &["Competition"]),
        entity("dup5b", "The Premier League", &["Competition"]),
    ];
    // Filler with pairwise-disjoint types, so the type-overlap gate
    // keeps every filler entity a singleton in both runs.
    for i in 0..50 {
        let mention = format!(
            "{} {} {i}",
            random_word::get(random_word::Lang::En),
            random_word::get(random_word::Lang::En)
        );
        entities.push(entity(&format!("filler{i}"), &mention, &[&format!("T{i}")]));
    }
    let input = KnowledgeGraph {
        entities,
        relations: vec![],
    };

    let blocked_config = lexical_config();
    assert!(input.entities.len() >= blocked_config.blocking_threshold);
    let index = BlockingIndex::build(&input.entities, &blocked_config);
    assert!(index.is_active());

    let exhaustive_config = ResolutionConfig {
        blocking_threshold: 1_000,
        ..lexical_config()
    };

    let blocked = resolver_with(blocked_config).resolve(&input).await?;
    let exhaustive = resolver_with(exhaustive_config).resolve(&input).await?;

    let blocked_groups = cluster_groups(&blocked.snapshot());
    let exhaustive_groups = cluster_groups(&exhaustive.snapshot());
    assert_eq!(blocked_groups, exhaustive_groups);

    // The five seeded pairs cluster under both strategies.
    for (a, b) in [
        ("dup1a", "dup1b"),
        ("dup2a", "dup2b"),
        ("dup3a", "dup3b"),
        ("dup4a", "dup4b"),
        ("dup5a", "dup5b"),
    ] {
        assert_eq!(blocked.canonical_map[a], blocked.canonical_map[b]);
    }
    Ok(())
}

#[tokio::test]
async fn reruns_are_deterministic() -> anyhow::Result<()> {
    let mut first = entity("e1", "Eze", &["Person"]);
    first.attributes.insert("club".into(), json!("Palace"));
    let input = KnowledgeGraph {
        entities: vec![
            first,
            entity("e2", "Eberechi Eze", &["Person", "Athlete"]),
            entity("e3", "Crystal Palace", &["Club"]),
            entity("e4", "Crystal Palace Football Club", &["Club"]),
        ],
        relations: vec![Relation {
            subject_id: "e1".into(),
            predicate: "plays_for".into(),
            object: RelationObject::Entity("e3".into()),
        }],
    };

    let one = resolver_with(lexical_config()).resolve(&input).await?;
    let two = resolver_with(lexical_config()).resolve(&input).await?;

    assert_eq!(one.canonical_map, two.canonical_map);

    let mut resolved_one: Vec<_> = one
        .snapshot()
        .resolved
        .iter()
        .map(|r| (r.canonical_id.clone(), r.mention.clone(), r.types.clone()))
        .collect();
    let mut resolved_two: Vec<_> = two
        .snapshot()
        .resolved
        .iter()
        .map(|r| (r.canonical_id.clone(), r.mention.clone(), r.types.clone()))
        .collect();
    resolved_one.sort();
    resolved_two.sort();
    assert_eq!(resolved_one, resolved_two);
    Ok(())
}

#[tokio::test]
async fn embedding_failures_degrade_to_lexical_signals() -> anyhow::Result<()> {
    // Provider knows none of the mentions, so every lookup fails; the
    // run must still merge on lexical evidence alone.
    let provider = Arc::new(StaticEmbedder::default());
    let resolver = EntityResolver::new(provider.clone(), ResolutionConfig::default());

    let input = KnowledgeGraph {
        entities: vec![
            entity("e1", "Eze", &["Person"]),
            entity("e2", "Eberechi Eze", &["Person"]),
        ],
        relations: vec![],
    };

    let graph = resolver.resolve(&input).await?;
    assert_eq!(provider.call_count(), 2);
    assert_eq!(graph.stats.cluster_count, 1);
    assert_eq!(graph.canonical_map["e1"], "e2");
    Ok(())
}

#[tokio::test]
async fn zero_embedding_weight_skips_provider_entirely() -> anyhow::Result<()> {
    let provider = Arc::new(StaticEmbedder::default());
    let resolver = EntityResolver::new(provider.clone(), lexical_config());

    let input = KnowledgeGraph {
        entities: vec![
            entity("e1", "Eze", &["Person"]),
            entity("e2", "Eberechi Eze", &["Person"]),
        ],
        relations: vec![],
    };

    resolver.resolve(&input).await?;
    assert_eq!(provider.call_count(), 0);
    Ok(())
}

#[tokio::test]
async fn embedding_evidence_merges_dissimilar_mentions() -> anyhow::Result<()> {
    let provider = Arc::new(StaticEmbedder::with_vectors(&[
        ("Arsenal FC", vec![1.0, 0.0, 0.0]),
        ("Gunners", vec![1.0, 0.0, 0.0]),
    ]));
    let config = ResolutionConfig {
        string_weight: 0.1,
        type_weight: 0.2,
        neighbor_weight: 0.15,
        embedding_weight: 0.7,
        ..ResolutionConfig::default()
    };
    let resolver = EntityResolver::new(provider, config);

    let input = KnowledgeGraph {
        entities: vec![
            entity("e1", "Arsenal FC", &["Club"]),
            entity("e2", "Gunners", &["Club"]),
        ],
        relations: vec![],
    };

    let graph = resolver.resolve(&input).await?;
    assert_eq!(graph.stats.cluster_count, 1);
    assert_eq!(graph.canonical_map["e2"], "e1");

    let snapshot = graph.snapshot();
    let link = snapshot
        .resolution_links
        .iter()
        .find(|link| link.mention_id == "e2")
        .unwrap();
    assert_eq!(link.method, ResolutionMethod::Embedding);
    Ok(())
}

#[tokio::test]
async fn shared_neighbors_dominate_when_weighted() -> anyhow::Result<()> {
    let config = ResolutionConfig {
        merge_threshold: 0.6,
        string_weight: 0.2,
        type_weight: 0.2,
        neighbor_weight: 0.6,
        embedding_weight: 0.0,
        ..ResolutionConfig::default()
    };

    let input = KnowledgeGraph {
        entities: vec![
            entity("c1", "Selhurst Club", &["Club"]),
            entity("c2", "Selhurst FC", &["Club"]),
            entity("p1", "Selhurst Park", &["Venue"]),
            entity("l1", "South London", &["Place"]),
        ],
        relations: vec![
            Relation {
                subject_id: "c1".into(),
                predicate: "plays_at".into(),
                object: RelationObject::Entity("p1".into()),
            },
            Relation {
                subject_id: "c2".into(),
                predicate: "plays_at".into(),
                object: RelationObject::Entity("p1".into()),
            },
            Relation {
                subject_id: "c1".into(),
                predicate: "based_in".into(),
                object: RelationObject::Entity("l1".into()),
            },
            Relation {
                subject_id: "c2".into(),
                predicate: "based_in".into(),
                object: RelationObject::Entity("l1".into()),
            },
        ],
    };

    let graph = resolver_with(config).resolve(&input).await?;
    assert_eq!(graph.canonical_map["c2"], graph.canonical_map["c1"]);

    let snapshot = graph.snapshot();
    let link = snapshot
        .resolution_links
        .iter()
        .find(|link| link.mention_id == "c2")
        .unwrap();
    assert_eq!(link.method, ResolutionMethod::SharedNeighbor);
    Ok(())
}
