use std::collections::BTreeMap;

use anyhow::Result;
use serde_json::json;

use contentdbx::event::{
    NodeAggregateWithNodeWasCreated, NodePropertyWasSet, NodeReferencesWereSet, NodeWasMoved,
};
use contentdbx::{
    ContentRepository, ContentStreamId, DimensionSpacePoint, DimensionSpacePointSet, DomainEvent,
    NodeAggregateId, NodeId, PropertyName, StreamLineage,
};

fn stream(id: &str) -> ContentStreamId {
    ContentStreamId::new(id).unwrap()
}

fn aggregate(id: &str) -> NodeAggregateId {
    NodeAggregateId::new(id).unwrap()
}

fn node(id: &str) -> NodeId {
    NodeId::new(id).unwrap()
}

fn property(name: &str) -> PropertyName {
    PropertyName::new(name).unwrap()
}

fn language(value: &str) -> DimensionSpacePoint {
    let mut coordinates = BTreeMap::new();
    coordinates.insert("language".to_string(), value.to_string());
    DimensionSpacePoint::new(coordinates)
}

/// A small multi-dimensional history: two aggregates, per-language variants,
/// properties, references, and a reparenting.
fn seed_history(repository: &ContentRepository, stream_id: &ContentStreamId) -> Result<u64> {
    let events = vec![
        DomainEvent::NodeAggregateWithNodeWasCreated(NodeAggregateWithNodeWasCreated {
            content_stream_id: stream_id.clone(),
            node_aggregate_id: aggregate("site"),
            node_id: node("site-node"),
            parent_node_aggregate_id: None,
            dimension_space_point_set: DimensionSpacePointSet::new(vec![
                language("en"),
                language("de"),
            ]),
            initial_property_values: BTreeMap::new(),
        }),
        DomainEvent::NodeAggregateWithNodeWasCreated(NodeAggregateWithNodeWasCreated {
            content_stream_id: stream_id.clone(),
            node_aggregate_id: aggregate("page"),
            node_id: node("page-node"),
            parent_node_aggregate_id: Some(aggregate("site")),
            dimension_space_point_set: DimensionSpacePointSet::new(vec![
                language("en"),
                language("de"),
            ]),
            initial_property_values: BTreeMap::from([(property("title"), json!("Untitled"))]),
        }),
        DomainEvent::NodePropertyWasSet(NodePropertyWasSet {
            content_stream_id: stream_id.clone(),
            node_aggregate_id: aggregate("page"),
            dimension_space_point_set: DimensionSpacePointSet::single(language("en")),
            property_name: property("title"),
            value: json!("Welcome"),
        }),
        DomainEvent::NodeReferencesWereSet(NodeReferencesWereSet {
            content_stream_id: stream_id.clone(),
            dimension_space_point_set: DimensionSpacePointSet::new(vec![
                language("en"),
                language("de"),
            ]),
            node_id: node("page-node"),
            property_name: property("related"),
            destination_node_aggregate_ids: vec![aggregate("site"), aggregate("page")],
        }),
        DomainEvent::NodeWasMoved(NodeWasMoved {
            content_stream_id: stream_id.clone(),
            node_aggregate_id: aggregate("page"),
            dimension_space_point_set: DimensionSpacePointSet::single(language("de")),
            new_parent_node_aggregate_id: None,
        }),
    ];
    let count = events.len() as u64;
    repository.append_to_stream(stream_id, 0, events)?;
    Ok(count)
}

#[test]
fn forked_stream_replays_to_the_source_state_at_the_snapshot() -> Result<()> {
    let repository = ContentRepository::in_memory()?;
    let live = stream("live");
    let draft = stream("user-1");

    repository.create_content_stream(&live)?;
    let seeded = seed_history(&repository, &live)?;
    let copied = repository.fork_content_stream(&live, &draft)?;
    assert_eq!(copied, seeded);

    assert_eq!(
        repository.lineage(&draft)?,
        Some(StreamLineage {
            source: live.clone(),
            source_version: seeded,
        })
    );

    for aggregate_id in ["site", "page"] {
        let source_state = repository.node_aggregate(&live, &aggregate(aggregate_id))?;
        let forked_state = repository.node_aggregate(&draft, &aggregate(aggregate_id))?;
        assert_eq!(source_state, forked_state, "aggregate {aggregate_id} diverged");
    }
    Ok(())
}

#[test]
fn events_appended_after_the_snapshot_are_not_forked() -> Result<()> {
    let repository = ContentRepository::in_memory()?;
    let live = stream("live");
    let draft = stream("user-1");

    repository.create_content_stream(&live)?;
    let seeded = seed_history(&repository, &live)?;
    repository.fork_content_stream(&live, &draft)?;

    repository.append_to_stream(
        &live,
        seeded,
        vec![DomainEvent::NodePropertyWasSet(NodePropertyWasSet {
            content_stream_id: live.clone(),
            node_aggregate_id: aggregate("page"),
            dimension_space_point_set: DimensionSpacePointSet::single(language("en")),
            property_name: property("title"),
            value: json!("Changed after fork"),
        })],
    )?;

    let draft_page = repository
        .node_aggregate(&draft, &aggregate("page"))?
        .expect("page exists on the draft");
    let en_variant = draft_page.variants.get(&language("en")).unwrap();
    assert_eq!(
        en_variant.properties.get(&property("title")),
        Some(&json!("Welcome"))
    );
    Ok(())
}

#[test]
fn copied_reference_events_carry_their_payload_verbatim() -> Result<()> {
    let repository = ContentRepository::in_memory()?;
    let live = stream("live");
    let draft = stream("user-1");

    repository.create_content_stream(&live)?;
    seed_history(&repository, &live)?;
    repository.fork_content_stream(&live, &draft)?;

    let source_references: Vec<_> = repository
        .read_stream(&live)?
        .into_iter()
        .filter_map(|envelope| match envelope.event {
            DomainEvent::NodeReferencesWereSet(event) => Some(event),
            _ => None,
        })
        .collect();
    let forked_references: Vec<_> = repository
        .read_stream(&draft)?
        .into_iter()
        .filter_map(|envelope| match envelope.event {
            DomainEvent::NodeReferencesWereSet(event) => Some(event),
            _ => None,
        })
        .collect();

    assert_eq!(source_references.len(), 1);
    assert_eq!(forked_references.len(), 1);
    let source = &source_references[0];
    let forked = &forked_references[0];

    assert_eq!(forked.content_stream_id, draft);
    assert_eq!(forked.dimension_space_point_set, source.dimension_space_point_set);
    assert_eq!(forked.node_id, source.node_id);
    assert_eq!(forked.property_name, source.property_name);
    assert_eq!(
        forked.destination_node_aggregate_ids,
        source.destination_node_aggregate_ids
    );
    Ok(())
}

#[test]
fn replaying_a_forked_stream_twice_is_idempotent() -> Result<()> {
    let repository = ContentRepository::in_memory()?;
    let live = stream("live");
    let draft = stream("user-1");

    repository.create_content_stream(&live)?;
    seed_history(&repository, &live)?;
    repository.fork_content_stream(&live, &draft)?;

    let first = repository.node_aggregate(&draft, &aggregate("page"))?;
    // Catching up again with nothing new must not change anything.
    repository.catch_up(&draft)?;
    let second = repository.node_aggregate(&draft, &aggregate("page"))?;
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn fork_chains_preserve_state_across_generations() -> Result<()> {
    let repository = ContentRepository::in_memory()?;
    let live = stream("live");
    let draft = stream("user-1");
    let review = stream("review");

    repository.create_content_stream(&live)?;
    let seeded = seed_history(&repository, &live)?;
    repository.fork_content_stream(&live, &draft)?;
    repository.append_to_stream(
        &draft,
        seeded,
        vec![DomainEvent::NodePropertyWasSet(NodePropertyWasSet {
            content_stream_id: draft.clone(),
            node_aggregate_id: aggregate("page"),
            dimension_space_point_set: DimensionSpacePointSet::single(language("en")),
            property_name: property("title"),
            value: json!("Draft edit"),
        })],
    )?;

    repository.fork_content_stream(&draft, &review)?;

    let review_page = repository
        .node_aggregate(&review, &aggregate("page"))?
        .expect("page exists on the second-generation fork");
    let en_variant = review_page.variants.get(&language("en")).unwrap();
    assert_eq!(
        en_variant.properties.get(&property("title")),
        Some(&json!("Draft edit"))
    );
    assert_eq!(
        repository.lineage(&review)?,
        Some(StreamLineage {
            source: draft.clone(),
            source_version: seeded + 1,
        })
    );
    Ok(())
}
