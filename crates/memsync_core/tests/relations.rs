use memsync_core::db::open_db_in_memory;
use memsync_core::{
    Entity, EntityRepository, GraphService, Metadata, NewEntity, NewRelation, RelationQuery,
    RelationRepository, RepoError, SqliteEntityRepository, SqliteRelationRepository,
};
use rusqlite::Connection;
use serde_json::json;

fn entity(conn: &Connection, name: &str) -> Entity {
    SqliteEntityRepository::new(conn)
        .create_entity(NewEntity {
            name: Some(name.to_string()),
            ..NewEntity::default()
        })
        .unwrap()
}

#[test]
fn create_relation_persists_properties() {
    let conn = open_db_in_memory().unwrap();
    let relations = SqliteRelationRepository::new(&conn);
    let a = entity(&conn, "a");
    let b = entity(&conn, "b");

    let properties: Metadata = json!({"weight": 0.5}).as_object().cloned().unwrap();
    let created = relations
        .create_relation(&NewRelation::new(&a.id, &b.id, "depends_on").with_properties(properties))
        .unwrap();

    let loaded = relations.get_relation(created.id).unwrap().unwrap();
    assert_eq!(loaded, created);
    assert_eq!(loaded.source_id, a.id);
    assert_eq!(loaded.target_id, b.id);
    assert_eq!(loaded.properties["weight"], json!(0.5));
}

#[test]
fn create_relation_with_missing_endpoint_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let relations = SqliteRelationRepository::new(&conn);
    let a = entity(&conn, "a");

    let err = relations
        .create_relation(&NewRelation::new(&a.id, "ghost", "links_to"))
        .unwrap_err();
    assert!(matches!(err, RepoError::EntityNotFound(ref id) if id == "ghost"));
    assert!(relations
        .get_relations(&RelationQuery::default())
        .unwrap()
        .is_empty());
}

#[test]
fn duplicate_triple_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let relations = SqliteRelationRepository::new(&conn);
    let a = entity(&conn, "a");
    let b = entity(&conn, "b");

    relations
        .create_relation(&NewRelation::new(&a.id, &b.id, "links_to"))
        .unwrap();
    let err = relations
        .create_relation(&NewRelation::new(&a.id, &b.id, "links_to"))
        .unwrap_err();
    assert!(err.is_conflict());

    // Same endpoints with another type, or reversed, are distinct triples.
    relations
        .create_relation(&NewRelation::new(&a.id, &b.id, "cites"))
        .unwrap();
    relations
        .create_relation(&NewRelation::new(&b.id, &a.id, "links_to"))
        .unwrap();
    assert_eq!(
        relations
            .get_relations(&RelationQuery::for_entity(a.id.as_str()))
            .unwrap()
            .len(),
        3
    );
}

#[test]
fn get_relations_filters_and_orders_newest_first() {
    let conn = open_db_in_memory().unwrap();
    let relations = SqliteRelationRepository::new(&conn);
    let a = entity(&conn, "a");
    let b = entity(&conn, "b");
    let c = entity(&conn, "c");

    let first = relations
        .create_relation(&NewRelation::new(&a.id, &b.id, "links_to"))
        .unwrap();
    let second = relations
        .create_relation(&NewRelation::new(&c.id, &a.id, "cites"))
        .unwrap();
    let unrelated = relations
        .create_relation(&NewRelation::new(&b.id, &c.id, "links_to"))
        .unwrap();

    let touching_a = relations
        .get_relations(&RelationQuery::for_entity(a.id.as_str()))
        .unwrap();
    let ids: Vec<_> = touching_a.iter().map(|relation| relation.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);

    let links = relations
        .get_relations(&RelationQuery::default().with_kind("links_to"))
        .unwrap();
    let ids: Vec<_> = links.iter().map(|relation| relation.id).collect();
    assert_eq!(ids, vec![unrelated.id, first.id]);
}

#[test]
fn delete_relation_reports_whether_a_row_was_removed() {
    let conn = open_db_in_memory().unwrap();
    let relations = SqliteRelationRepository::new(&conn);
    let a = entity(&conn, "a");
    let b = entity(&conn, "b");

    let relation = relations
        .create_relation(&NewRelation::new(&a.id, &b.id, "links_to"))
        .unwrap();
    assert!(relations.delete_relation(relation.id).unwrap());
    assert!(!relations.delete_relation(relation.id).unwrap());
    assert!(relations.get_relation(relation.id).unwrap().is_none());
}

#[test]
fn deleting_source_entity_removes_its_relations() {
    let conn = open_db_in_memory().unwrap();
    let entities = SqliteEntityRepository::new(&conn);
    let relations = SqliteRelationRepository::new(&conn);
    let source = entity(&conn, "source");
    let target = entity(&conn, "target");
    let other = entity(&conn, "other");

    relations
        .create_relation(&NewRelation::new(&source.id, &target.id, "links_to"))
        .unwrap();
    let kept = relations
        .create_relation(&NewRelation::new(&other.id, &target.id, "links_to"))
        .unwrap();

    assert!(entities.delete_entity(&source.id).unwrap());

    let remaining = relations
        .get_relations(&RelationQuery::for_entity(target.id.as_str()))
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, kept.id);
}

#[test]
fn neighborhood_is_breadth_first_and_bounded() {
    let conn = open_db_in_memory().unwrap();
    let relations = SqliteRelationRepository::new(&conn);
    let root = entity(&conn, "root");
    let child = entity(&conn, "child");
    let grandchild = entity(&conn, "grandchild");
    let parent = entity(&conn, "parent");

    relations
        .create_relation(&NewRelation::new(&root.id, &child.id, "links_to"))
        .unwrap();
    relations
        .create_relation(&NewRelation::new(&child.id, &grandchild.id, "links_to"))
        .unwrap();
    relations
        .create_relation(&NewRelation::new(&parent.id, &root.id, "contains"))
        .unwrap();

    let graph = GraphService::new(
        SqliteEntityRepository::new(&conn),
        SqliteRelationRepository::new(&conn),
    );

    let only_root = graph.neighborhood(&root.id, 0).unwrap();
    assert_eq!(only_root.len(), 1);
    assert_eq!(only_root[0].entity.id, root.id);

    let one_hop = graph.neighborhood(&root.id, 1).unwrap();
    let mut names: Vec<_> = one_hop
        .iter()
        .map(|node| (node.entity.name.as_str(), node.depth))
        .collect();
    names.sort();
    assert_eq!(names, vec![("child", 1), ("parent", 1), ("root", 0)]);

    let two_hops = graph.neighborhood(&root.id, 2).unwrap();
    assert_eq!(two_hops.len(), 4);
    let last = two_hops.last().unwrap();
    assert_eq!(last.entity.id, grandchild.id);
    assert_eq!(last.depth, 2);
}

#[test]
fn neighborhood_terminates_on_cycles() {
    let conn = open_db_in_memory().unwrap();
    let relations = SqliteRelationRepository::new(&conn);
    let a = entity(&conn, "a");
    let b = entity(&conn, "b");
    let c = entity(&conn, "c");

    for (from, to) in [(&a, &b), (&b, &c), (&c, &a)] {
        relations
            .create_relation(&NewRelation::new(&from.id, &to.id, "links_to"))
            .unwrap();
    }

    let graph = GraphService::new(
        SqliteEntityRepository::new(&conn),
        SqliteRelationRepository::new(&conn),
    );
    let reached = graph.neighborhood(&a.id, 10).unwrap();
    assert_eq!(reached.len(), 3);
    assert!(reached.iter().all(|node| node.depth <= 1));
}

#[test]
fn neighborhood_of_unknown_root_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let graph = GraphService::new(
        SqliteEntityRepository::new(&conn),
        SqliteRelationRepository::new(&conn),
    );
    let err = graph.neighborhood("ghost", 3).unwrap_err();
    assert!(err.is_not_found());
}
