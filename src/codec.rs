use crate::context::BridgeContext;
use crate::error::BridgeError;
use crate::reflect::{ObjectInstance, TypeHandle, TypeKind};
use crate::refs::{encode_ref, resolve_ref, RefDescriptor};
use crate::value::{Bounds, Color, Rect, Value};
use glam::{Quat, Vec2, Vec3, Vec4};
use serde_json::{json, Map};

// Neutral defaults for missing numeric components on the decode path:
// positional components are 0, the rotation scalar is 1 (identity), alpha
// and size components are 1.
const DEFAULT_POSITION: f32 = 0.0;
const DEFAULT_ROTATION_W: f32 = 1.0;
const DEFAULT_ALPHA: f32 = 1.0;
const DEFAULT_SIZE: f32 = 1.0;

/// Converts one native field value into its JSON form. Reference values
/// delegate to the reference codec; a dead referent becomes JSON null.
pub fn encode(
    value: &Value,
    declared: TypeHandle,
    ctx: &BridgeContext,
) -> Result<serde_json::Value, BridgeError> {
    match value {
        Value::Null => Ok(serde_json::Value::Null),
        Value::Bool(v) => Ok(json!(v)),
        Value::Int(v) => Ok(json!(v)),
        Value::Float(v) => Ok(json!(v)),
        Value::String(v) => Ok(json!(v)),
        Value::Vec2(v) => Ok(json!({ "x": v.x, "y": v.y })),
        Value::Vec3(v) => Ok(json!({ "x": v.x, "y": v.y, "z": v.z })),
        Value::Vec4(v) => Ok(json!({ "x": v.x, "y": v.y, "z": v.z, "w": v.w })),
        Value::Quat(v) => Ok(json!({ "x": v.x, "y": v.y, "z": v.z, "w": v.w })),
        Value::Color(v) => Ok(json!({ "r": v.r, "g": v.g, "b": v.b, "a": v.a })),
        Value::Rect(v) => Ok(json!({ "x": v.x, "y": v.y, "width": v.width, "height": v.height })),
        Value::Bounds(v) => Ok(json!({
            "center": { "x": v.center.x, "y": v.center.y, "z": v.center.z },
            "size": { "x": v.size.x, "y": v.size.y, "z": v.size.z },
        })),
        Value::Enum(discriminant) => {
            if ctx.registry.kind(declared) != TypeKind::Enum {
                return Err(BridgeError::encode(format!(
                    "enum value for non-enum type '{}'",
                    ctx.registry.name(declared)
                )));
            }
            // Discriminants outside the variant table keep their raw
            // number so snapshots survive enum table drift.
            match ctx.registry.variant_name(declared, *discriminant) {
                Some(name) => Ok(json!(name)),
                None => Ok(json!(discriminant)),
            }
        }
        Value::List(items) => {
            let element = ctx.registry.descriptor(declared).element.ok_or_else(|| {
                BridgeError::encode(format!(
                    "list value for non-list type '{}'",
                    ctx.registry.name(declared)
                ))
            })?;
            let mut encoded = Vec::with_capacity(items.len());
            for item in items {
                encoded.push(encode(item, element, ctx)?);
            }
            Ok(serde_json::Value::Array(encoded))
        }
        Value::Ref(reference) => match encode_ref(*reference, ctx) {
            Some(descriptor) => serde_json::to_value(&descriptor)
                .map_err(|err| BridgeError::encode(err.to_string())),
            None => Ok(serde_json::Value::Null),
        },
        Value::Object(instance) => encode_structural(instance, ctx),
    }
}

/// Structural encode for embedded plain aggregates. Shapes the registry
/// cannot describe become a placeholder string naming the type, so a
/// single odd field never takes the rest of a snapshot down.
fn encode_structural(
    instance: &ObjectInstance,
    ctx: &BridgeContext,
) -> Result<serde_json::Value, BridgeError> {
    let ty = instance.ty();
    if ctx.registry.kind(ty) != TypeKind::Struct {
        return Ok(json!(format!("<{}>", ctx.registry.name(ty))));
    }
    let mut out = Map::new();
    for handle in ctx.registry.serialization_chain(ty) {
        for member in &ctx.registry.descriptor(handle).members {
            if !member.snapshot_visible() || out.contains_key(&member.name) {
                continue;
            }
            let value = instance.get(&member.name).cloned().unwrap_or(Value::Null);
            out.insert(member.name.clone(), encode(&value, member.ty, ctx)?);
        }
    }
    Ok(serde_json::Value::Object(out))
}

/// Converts a JSON value into a native field value for the declared type.
/// `Ok(None)` means "leave the field unchanged", the outcome of decoding
/// JSON null into a non-nullable value type.
pub fn decode(
    json: &serde_json::Value,
    declared: TypeHandle,
    ctx: &BridgeContext,
) -> Result<Option<Value>, BridgeError> {
    let kind = ctx.registry.kind(declared);
    if json.is_null() {
        return if kind.is_nullable() { Ok(Some(Value::Null)) } else { Ok(None) };
    }
    match kind {
        TypeKind::Bool => json
            .as_bool()
            .map(|v| Some(Value::Bool(v)))
            .ok_or_else(|| expected("a boolean", json)),
        TypeKind::Int => json
            .as_i64()
            .map(|v| Some(Value::Int(v)))
            .ok_or_else(|| expected("an integer", json)),
        TypeKind::Float => json
            .as_f64()
            .map(|v| Some(Value::Float(v)))
            .ok_or_else(|| expected("a number", json)),
        TypeKind::String => json
            .as_str()
            .map(|v| Some(Value::String(v.to_string())))
            .ok_or_else(|| expected("a string", json)),
        TypeKind::Vec2 => {
            let map = component_map(json)?;
            Ok(Some(Value::Vec2(Vec2::new(
                component(map, "x", DEFAULT_POSITION)?,
                component(map, "y", DEFAULT_POSITION)?,
            ))))
        }
        TypeKind::Vec3 => {
            let map = component_map(json)?;
            Ok(Some(Value::Vec3(Vec3::new(
                component(map, "x", DEFAULT_POSITION)?,
                component(map, "y", DEFAULT_POSITION)?,
                component(map, "z", DEFAULT_POSITION)?,
            ))))
        }
        TypeKind::Vec4 => {
            let map = component_map(json)?;
            Ok(Some(Value::Vec4(Vec4::new(
                component(map, "x", DEFAULT_POSITION)?,
                component(map, "y", DEFAULT_POSITION)?,
                component(map, "z", DEFAULT_POSITION)?,
                component(map, "w", DEFAULT_POSITION)?,
            ))))
        }
        TypeKind::Quat => {
            let map = component_map(json)?;
            Ok(Some(Value::Quat(Quat::from_xyzw(
                component(map, "x", DEFAULT_POSITION)?,
                component(map, "y", DEFAULT_POSITION)?,
                component(map, "z", DEFAULT_POSITION)?,
                component(map, "w", DEFAULT_ROTATION_W)?,
            ))))
        }
        TypeKind::Color => {
            let map = component_map(json)?;
            Ok(Some(Value::Color(Color::new(
                component(map, "r", DEFAULT_POSITION)?,
                component(map, "g", DEFAULT_POSITION)?,
                component(map, "b", DEFAULT_POSITION)?,
                component(map, "a", DEFAULT_ALPHA)?,
            ))))
        }
        TypeKind::Rect => {
            let map = component_map(json)?;
            Ok(Some(Value::Rect(Rect::new(
                component(map, "x", DEFAULT_POSITION)?,
                component(map, "y", DEFAULT_POSITION)?,
                component(map, "width", DEFAULT_SIZE)?,
                component(map, "height", DEFAULT_SIZE)?,
            ))))
        }
        TypeKind::Bounds => {
            let map = component_map(json)?;
            let center = match map.get("center") {
                Some(value) => {
                    let inner = component_map(value)?;
                    Vec3::new(
                        component(inner, "x", DEFAULT_POSITION)?,
                        component(inner, "y", DEFAULT_POSITION)?,
                        component(inner, "z", DEFAULT_POSITION)?,
                    )
                }
                None => Vec3::ZERO,
            };
            let size = match map.get("size") {
                Some(value) => {
                    let inner = component_map(value)?;
                    Vec3::new(
                        component(inner, "x", DEFAULT_SIZE)?,
                        component(inner, "y", DEFAULT_SIZE)?,
                        component(inner, "z", DEFAULT_SIZE)?,
                    )
                }
                None => Vec3::ONE,
            };
            Ok(Some(Value::Bounds(Bounds::new(center, size))))
        }
        TypeKind::Enum => decode_enum(json, declared, ctx).map(Some),
        TypeKind::List => {
            let element = ctx.registry.descriptor(declared).element.ok_or_else(|| {
                BridgeError::decode(format!(
                    "list type '{}' has no element type",
                    ctx.registry.name(declared)
                ))
            })?;
            let items = json
                .as_array()
                .ok_or_else(|| expected("an array", json))?;
            let mut decoded = Vec::with_capacity(items.len());
            for item in items {
                match decode(item, element, ctx)? {
                    Some(value) => decoded.push(value),
                    None => {
                        return Err(BridgeError::decode(format!(
                            "null element for non-nullable '{}'",
                            ctx.registry.name(element)
                        )))
                    }
                }
            }
            Ok(Some(Value::List(decoded)))
        }
        TypeKind::Struct => {
            let map = component_map(json)?;
            let mut instance = ObjectInstance::with_defaults(declared, ctx.registry);
            for handle in ctx.registry.serialization_chain(declared) {
                for member in &ctx.registry.descriptor(handle).members {
                    let Some(entry) = map.get(&member.name) else { continue };
                    if let Some(value) = decode(entry, member.ty, ctx)? {
                        instance.set(member.name.clone(), value);
                    }
                }
            }
            Ok(Some(Value::Object(Box::new(instance))))
        }
        TypeKind::Class => {
            let is_descriptor =
                json.as_object().map(|map| map.contains_key("$ref")).unwrap_or(false);
            if !is_descriptor {
                return Err(BridgeError::decode(format!(
                    "expected a reference descriptor for '{}', got {json}",
                    ctx.registry.name(declared)
                )));
            }
            let descriptor: RefDescriptor = serde_json::from_value(json.clone())
                .map_err(|err| BridgeError::decode(format!("malformed reference descriptor: {err}")))?;
            let reference = resolve_ref(&descriptor, declared, ctx)?;
            Ok(Some(Value::Ref(reference)))
        }
    }
}

fn decode_enum(
    json: &serde_json::Value,
    declared: TypeHandle,
    ctx: &BridgeContext,
) -> Result<Value, BridgeError> {
    if let Some(name) = json.as_str() {
        if let Some(value) = ctx.registry.variant_value(declared, name) {
            return Ok(Value::Enum(value));
        }
        // A numeric string counts as a raw discriminant.
        if let Ok(value) = name.parse::<i32>() {
            return Ok(Value::Enum(value));
        }
        return Err(BridgeError::decode(format!(
            "'{name}' is not a variant of '{}'",
            ctx.registry.name(declared)
        )));
    }
    if let Some(value) = json.as_i64() {
        return Ok(Value::Enum(value as i32));
    }
    Err(expected("an enum name or number", json))
}

fn component_map(json: &serde_json::Value) -> Result<&Map<String, serde_json::Value>, BridgeError> {
    json.as_object().ok_or_else(|| expected("an object", json))
}

fn component(
    map: &Map<String, serde_json::Value>,
    key: &str,
    default: f32,
) -> Result<f32, BridgeError> {
    match map.get(key) {
        None => Ok(default),
        Some(value) => value
            .as_f64()
            .map(|v| v as f32)
            .ok_or_else(|| BridgeError::decode(format!("component '{key}' must be a number, got {value}"))),
    }
}

fn expected(what: &str, json: &serde_json::Value) -> BridgeError {
    BridgeError::decode(format!("expected {what}, got {json}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetDatabase;
    use crate::reflect::{FieldFlags, TypeDescriptor, TypeRegistry};
    use crate::resolve::ResolveScopes;
    use crate::scene::SceneGraph;

    struct Fixture {
        registry: TypeRegistry,
        scene: SceneGraph,
        assets: AssetDatabase,
        scopes: ResolveScopes,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                registry: TypeRegistry::new(),
                scene: SceneGraph::new(),
                assets: AssetDatabase::new(),
                scopes: ResolveScopes::default(),
            }
        }

        fn ctx(&self) -> BridgeContext<'_> {
            BridgeContext::new(&self.registry, &self.scene, &self.assets, &self.scopes)
        }
    }

    fn round_trip(fixture: &Fixture, value: Value, declared: TypeHandle) {
        let ctx = fixture.ctx();
        let encoded = encode(&value, declared, &ctx).expect("encode");
        let decoded = decode(&encoded, declared, &ctx).expect("decode").expect("value produced");
        assert_eq!(decoded, value, "round trip for {encoded}");
    }

    #[test]
    fn geometric_shapes_round_trip() {
        let fixture = Fixture::new();
        let core = fixture.registry.core();
        round_trip(&fixture, Value::Vec2(Vec2::new(1.5, -2.0)), core.vec2);
        round_trip(&fixture, Value::Vec3(Vec3::new(1.0, 2.0, 3.0)), core.vec3);
        round_trip(&fixture, Value::Vec4(Vec4::new(0.1, 0.2, 0.3, 0.4)), core.vec4);
        round_trip(&fixture, Value::Quat(Quat::from_xyzw(0.0, 0.0, 0.0, 1.0)), core.quat);
        round_trip(&fixture, Value::Color(Color::new(0.2, 0.4, 0.6, 0.8)), core.color);
        round_trip(&fixture, Value::Rect(Rect::new(4.0, 8.0, 32.0, 64.0)), core.rect);
        round_trip(
            &fixture,
            Value::Bounds(Bounds::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(4.0, 5.0, 6.0))),
            core.bounds,
        );
    }

    #[test]
    fn vector_shape_uses_named_components() {
        let fixture = Fixture::new();
        let core = fixture.registry.core();
        let ctx = fixture.ctx();
        let encoded = encode(&Value::Vec3(Vec3::new(1.0, 2.0, 3.0)), core.vec3, &ctx).expect("encode");
        assert_eq!(encoded, serde_json::json!({ "x": 1.0, "y": 2.0, "z": 3.0 }));
    }

    #[test]
    fn missing_components_use_neutral_defaults() {
        let fixture = Fixture::new();
        let core = fixture.registry.core();
        let ctx = fixture.ctx();

        let quat = decode(&serde_json::json!({}), core.quat, &ctx).expect("decode").expect("value");
        assert_eq!(quat, Value::Quat(Quat::IDENTITY));

        let color =
            decode(&serde_json::json!({ "r": 0.5 }), core.color, &ctx).expect("decode").expect("value");
        assert_eq!(color, Value::Color(Color::new(0.5, 0.0, 0.0, 1.0)));

        let bounds = decode(&serde_json::json!({ "center": { "x": 2.0 } }), core.bounds, &ctx)
            .expect("decode")
            .expect("value");
        assert_eq!(bounds, Value::Bounds(Bounds::new(Vec3::new(2.0, 0.0, 0.0), Vec3::ONE)));
    }

    #[test]
    fn enums_encode_symbolically_and_decode_loosely() {
        let mut fixture = Fixture::new();
        let mode = fixture.registry.register(TypeDescriptor::enumeration(
            "Scripts.PlayMode",
            "GameScripts",
            vec![("Stopped".to_string(), 0), ("Playing".to_string(), 1), ("Paused".to_string(), 2)],
        ));
        let ctx = fixture.ctx();

        let encoded = encode(&Value::Enum(1), mode, &ctx).expect("encode");
        assert_eq!(encoded, serde_json::json!("Playing"));

        assert_eq!(
            decode(&serde_json::json!("paused"), mode, &ctx).expect("case-insensitive"),
            Some(Value::Enum(2))
        );
        assert_eq!(decode(&serde_json::json!("1"), mode, &ctx).expect("numeric string"), Some(Value::Enum(1)));
        assert_eq!(decode(&serde_json::json!(2), mode, &ctx).expect("raw number"), Some(Value::Enum(2)));

        let err = decode(&serde_json::json!("Rewinding"), mode, &ctx).unwrap_err();
        assert!(matches!(err, BridgeError::Decode(_)));
    }

    #[test]
    fn unknown_discriminant_encodes_as_number() {
        let mut fixture = Fixture::new();
        let mode = fixture.registry.register(TypeDescriptor::enumeration(
            "Scripts.PlayMode",
            "GameScripts",
            vec![("Stopped".to_string(), 0)],
        ));
        let ctx = fixture.ctx();
        let encoded = encode(&Value::Enum(7), mode, &ctx).expect("encode");
        assert_eq!(encoded, serde_json::json!(7));
    }

    #[test]
    fn null_is_noop_for_value_types_and_clears_references() {
        let fixture = Fixture::new();
        let core = fixture.registry.core();
        let ctx = fixture.ctx();

        assert_eq!(decode(&serde_json::Value::Null, core.integer, &ctx).expect("decode"), None);
        assert_eq!(decode(&serde_json::Value::Null, core.vec3, &ctx).expect("decode"), None);
        assert_eq!(
            decode(&serde_json::Value::Null, core.node, &ctx).expect("decode"),
            Some(Value::Null)
        );
    }

    #[test]
    fn lists_encode_recursively() {
        let mut fixture = Fixture::new();
        let core = fixture.registry.core();
        let floats = fixture.registry.list_of(core.number);
        let ctx = fixture.ctx();
        let value = Value::List(vec![Value::Float(1.0), Value::Float(2.5)]);
        let encoded = encode(&value, floats, &ctx).expect("encode");
        assert_eq!(encoded, serde_json::json!([1.0, 2.5]));
        assert_eq!(decode(&encoded, floats, &ctx).expect("decode"), Some(value));
    }

    #[test]
    fn structs_encode_their_visible_members() {
        let mut fixture = Fixture::new();
        let core = fixture.registry.core();
        let span = fixture.registry.register(
            TypeDescriptor::structure("Scripts.Span", "GameScripts")
                .with_member("start", core.number, FieldFlags::PUBLIC)
                .with_member("length", core.number, FieldFlags::PUBLIC)
                .with_member("cache", core.number, FieldFlags::SKIP | FieldFlags::PUBLIC),
        );
        let ctx = fixture.ctx();
        let mut instance = ObjectInstance::with_defaults(span, &fixture.registry);
        instance.set("start", Value::Float(3.0));
        let encoded = encode(&Value::Object(Box::new(instance)), span, &ctx).expect("encode");
        assert_eq!(encoded, serde_json::json!({ "start": 3.0, "length": 0.0 }));
    }

    #[test]
    fn non_descriptor_object_for_reference_type_fails_decode() {
        let fixture = Fixture::new();
        let core = fixture.registry.core();
        let ctx = fixture.ctx();
        let err = decode(&serde_json::json!({ "instanceId": 3 }), core.node, &ctx).unwrap_err();
        assert!(matches!(err, BridgeError::Decode(_)));
    }
}
