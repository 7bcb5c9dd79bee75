use merlin_bridge::ops::{BridgeHost, TargetAddress};
use merlin_bridge::reflect::{FieldFlags, TypeDescriptor};
use merlin_bridge::resolve::ResolveScopes;
use merlin_bridge::value::{ObjectRef, Value};
use serde_json::{json, Map};

fn host_with_player() -> (BridgeHost, i64, i64) {
    let mut host = BridgeHost::new(ResolveScopes::default());
    let core = host.registry.core();
    let health = host
        .registry
        .register(TypeDescriptor::class("Scripts.Health", "GameScripts", core.component));
    let stats = host.registry.register(
        TypeDescriptor::class("Scripts.Stats", "GameScripts", core.component)
            .with_member("hits", core.integer, FieldFlags::PUBLIC)
            .with_member("speed", core.number, FieldFlags::PUBLIC)
            .with_member("label", core.string, FieldFlags::PUBLIC)
            .with_member("spawn", core.vec3, FieldFlags::PUBLIC)
            .with_member("ally", health, FieldFlags::PUBLIC),
    );
    let player = host.scene.spawn_node("Player", None, core.node, &host.registry).expect("spawn");
    host.scene.attach_component(player, health, &host.registry).expect("attach health");
    let stats_id = host.scene.attach_component(player, stats, &host.registry).expect("attach stats");
    (host, player, stats_id)
}

fn parse_document(raw: &str) -> Map<String, serde_json::Value> {
    serde_json::from_str(raw).expect("document parses")
}

#[test]
fn one_bad_key_among_five_mutates_the_other_four() {
    let (mut host, _player, stats) = host_with_player();
    let address = TargetAddress::Instance { instance_id: stats };
    let document = parse_document(
        r#"{
            "hits": 3,
            "speed": 9.5,
            "label": "vanguard",
            "spawn": { "x": 1.0, "y": 0.0, "z": -1.0 },
            "morale": 100
        }"#,
    );
    let report = host.write_object(&address, &document);

    assert!(!report.success);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].field, "morale");

    let read = host.read_object(&address).expect("read back");
    assert_eq!(read.get("hits"), Some(&json!(3)));
    assert_eq!(read.get("speed"), Some(&json!(9.5)));
    assert_eq!(read.get("label"), Some(&json!("vanguard")));
    assert_eq!(read.get("spawn"), Some(&json!({ "x": 1.0, "y": 0.0, "z": -1.0 })));
}

#[test]
fn null_clears_references_but_not_numbers() {
    let (mut host, player, stats) = host_with_player();
    let health_id = host.scene.node(player).expect("node").components[0];
    {
        let object = host.scene.object_mut(stats).expect("stats object");
        object.set("hits", Value::Int(8));
        object.set("ally", Value::Ref(ObjectRef::Component(health_id)));
    }
    let address = TargetAddress::Instance { instance_id: stats };
    let document = parse_document(r#"{ "hits": null, "ally": null }"#);
    let report = host.write_object(&address, &document);
    assert!(report.success, "write failed: {}", report.message);

    let object = host.scene.object(stats).expect("stats object");
    assert_eq!(object.get("hits"), Some(&Value::Int(8)), "null must not clobber a number");
    assert_eq!(object.get("ally"), Some(&Value::Null), "null must clear a reference");
}

#[test]
fn mismatched_component_hint_leaves_field_unchanged() {
    let (mut host, _player, stats) = host_with_player();
    host.scene.object_mut(stats).expect("stats object").set("label", Value::String("keep".to_string()));
    let address = TargetAddress::Instance { instance_id: stats };
    let document = parse_document(
        r#"{
            "ally": { "$ref": "scene", "objectPath": "Player", "componentType": "Scripts.Stats" }
        }"#,
    );
    let report = host.write_object(&address, &document);

    assert!(!report.success);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].message.contains("not assignable"));
    let object = host.scene.object(stats).expect("stats object");
    assert_eq!(object.get("ally"), Some(&Value::Null), "failed decode must not assign");
}

#[test]
fn component_reference_resolves_through_the_declared_type() {
    let (mut host, _player, stats) = host_with_player();
    let address = TargetAddress::Instance { instance_id: stats };
    let document = parse_document(r#"{ "ally": { "$ref": "scene", "objectPath": "Player" } }"#);
    let report = host.write_object(&address, &document);
    assert!(report.success, "write failed: {}", report.message);

    let object = host.scene.object(stats).expect("stats object");
    match object.get("ally") {
        Some(Value::Ref(ObjectRef::Component(id))) => {
            let ally = host.scene.object(*id).expect("ally object");
            assert_eq!(host.registry.name(ally.ty()), "Scripts.Health");
        }
        other => panic!("unexpected ally value: {other:?}"),
    }
}

#[test]
fn undo_reverts_a_whole_batch_as_one_action() {
    let (mut host, _player, stats) = host_with_player();
    let address = TargetAddress::Instance { instance_id: stats };
    let before = host.read_object(&address).expect("read before");

    let document = parse_document(r#"{ "hits": 42, "label": "changed" }"#);
    let report = host.write_object(&address, &document);
    assert!(report.success, "write failed: {}", report.message);

    let message = host.undo_last().expect("undo succeeds");
    assert!(message.contains("2 field(s)"));
    let after = host.read_object(&address).expect("read after undo");
    assert_eq!(after, before);

    let err = host.undo_last().unwrap_err();
    assert!(err.to_string().contains("nothing to undo"));
}

#[test]
fn writes_through_path_and_id_hit_the_same_object() {
    let (mut host, player, _stats) = host_with_player();
    let document = parse_document(r#"{ "tag": "boss", "layer": 4 }"#);
    let report = host.write_object(&TargetAddress::Path { path: "Player".to_string() }, &document);
    assert!(report.success, "write failed: {}", report.message);

    let read = host
        .read_object(&TargetAddress::Instance { instance_id: player })
        .expect("read by id");
    assert_eq!(read.get("tag"), Some(&json!("boss")));
    assert_eq!(read.get("layer"), Some(&json!(4)));
}
