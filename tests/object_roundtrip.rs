use glam::Vec3;
use merlin_bridge::context::BridgeContext;
use merlin_bridge::ops::BridgeHost;
use merlin_bridge::reflect::{FieldFlags, TypeDescriptor};
use merlin_bridge::resolve::ResolveScopes;
use merlin_bridge::snapshot;
use merlin_bridge::value::{ObjectRef, Value};
use serde_json::json;

fn marker_host() -> (BridgeHost, i64, i64, i64) {
    let mut host = BridgeHost::new(ResolveScopes::default());
    let core = host.registry.core();
    let marker = host.registry.register(
        TypeDescriptor::class("Scripts.Marker", "GameScripts", core.component)
            .with_member("position", core.vec3, FieldFlags::PUBLIC)
            .with_member("label", core.string, FieldFlags::PUBLIC)
            .with_member("target", core.node, FieldFlags::PUBLIC),
    );
    let a = host.scene.spawn_node("A", None, core.node, &host.registry).expect("spawn A");
    let b = host.scene.spawn_node("B", None, core.node, &host.registry).expect("spawn B");
    let component = host.scene.attach_component(a, marker, &host.registry).expect("attach marker");
    (host, a, b, component)
}

#[test]
fn snapshot_shapes_match_the_wire_contract() {
    let (mut host, _a, b, component) = marker_host();
    {
        let object = host.scene.object_mut(component).expect("marker object");
        object.set("position", Value::Vec3(Vec3::new(1.0, 2.0, 3.0)));
        object.set("label", Value::String("hi".to_string()));
        object.set("target", Value::Ref(ObjectRef::Node(b)));
    }

    let object = host.scene.object(component).expect("marker object");
    let ctx = host.context();
    let document = snapshot::snapshot(object, &ctx);

    assert_eq!(document.get("position"), Some(&json!({ "x": 1.0, "y": 2.0, "z": 3.0 })));
    assert_eq!(document.get("label"), Some(&json!("hi")));
    assert_eq!(
        document.get("target"),
        Some(&json!({ "$ref": "scene", "instanceId": b, "objectPath": "B" }))
    );
}

#[test]
fn snapshot_document_survives_apply_onto_a_fresh_instance() {
    let (mut host, _a, b, component) = marker_host();
    {
        let object = host.scene.object_mut(component).expect("marker object");
        object.set("position", Value::Vec3(Vec3::new(4.0, 5.0, 6.0)));
        object.set("label", Value::String("copied".to_string()));
        object.set("target", Value::Ref(ObjectRef::Node(b)));
    }
    let original = host.scene.object(component).expect("marker object").clone();
    let document = snapshot::snapshot(&original, &host.context());

    let mut replica = merlin_bridge::reflect::ObjectInstance::with_defaults(
        original.ty(),
        &host.registry,
    );
    let ctx = host.context();
    let (report, _checkpoint) = snapshot::apply(&mut replica, &document, &ctx);
    assert!(report.success, "apply failed: {}", report.message);
    assert_eq!(replica, original);
}

#[test]
fn dead_reference_snapshots_as_null() {
    let (mut host, _a, b, component) = marker_host();
    host.scene.object_mut(component).expect("marker object").set("target", Value::Ref(ObjectRef::Node(b)));
    host.scene.despawn(b).expect("despawn B");

    let object = host.scene.object(component).expect("marker object");
    let ctx = host.context();
    let document = snapshot::snapshot(object, &ctx);
    assert_eq!(document.get("target"), Some(&serde_json::Value::Null));
}

#[test]
fn self_reference_round_trips_without_recursion() {
    let mut host = BridgeHost::new(ResolveScopes::default());
    let core = host.registry.core();
    let linker = host.registry.register(
        TypeDescriptor::class("Scripts.Linker", "GameScripts", core.component).with_member(
            "next",
            core.component,
            FieldFlags::PUBLIC,
        ),
    );
    let node = host.scene.spawn_node("Loop", None, core.node, &host.registry).expect("spawn");
    let component = host.scene.attach_component(node, linker, &host.registry).expect("attach");
    host.scene
        .object_mut(component)
        .expect("linker object")
        .set("next", Value::Ref(ObjectRef::Component(component)));

    let object = host.scene.object(component).expect("linker object").clone();
    let ctx = BridgeContext::new(&host.registry, &host.scene, &host.assets, host.scopes());
    let document = snapshot::snapshot(&object, &ctx);
    assert_eq!(
        document.get("next"),
        Some(&json!({
            "$ref": "scene",
            "instanceId": component,
            "objectPath": "Loop",
            "componentType": "Scripts.Linker"
        }))
    );

    let mut replica = object.clone();
    let (report, _checkpoint) = snapshot::apply(&mut replica, &document, &ctx);
    assert!(report.success, "apply failed: {}", report.message);
    assert_eq!(replica.get("next"), Some(&Value::Ref(ObjectRef::Component(component))));
}
