use crate::context::BridgeContext;
use crate::error::BridgeError;
use crate::reflect::TypeHandle;
use crate::value::{InstanceId, ObjectRef};
use serde::{Deserialize, Serialize};

/// Symbolic wire form of a live reference. The two tags cover the two
/// addressing domains: transient scene objects and persisted assets. The
/// field spelling is part of the wire contract and must not drift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "$ref")]
pub enum RefDescriptor {
    #[serde(rename = "scene")]
    Scene {
        #[serde(default, rename = "instanceId", skip_serializing_if = "Option::is_none")]
        instance_id: Option<InstanceId>,
        #[serde(default, rename = "objectPath", skip_serializing_if = "Option::is_none")]
        object_path: Option<String>,
        #[serde(default, rename = "componentType", skip_serializing_if = "Option::is_none")]
        component_type: Option<String>,
    },
    #[serde(rename = "asset")]
    Asset {
        #[serde(default, rename = "assetPath", skip_serializing_if = "Option::is_none")]
        asset_path: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        guid: Option<String>,
        #[serde(default, rename = "typeName", skip_serializing_if = "Option::is_none")]
        type_name: Option<String>,
        #[serde(default, rename = "componentType", skip_serializing_if = "Option::is_none")]
        component_type: Option<String>,
    },
}

/// Encodes a live reference as a descriptor. Returns `None` when the
/// referent is gone from the host, which callers serialize as JSON null.
/// Scene descriptors carry both the instance id and the container path so
/// they stay resolvable after a reload stales the id.
pub fn encode_ref(reference: ObjectRef, ctx: &BridgeContext) -> Option<RefDescriptor> {
    match reference {
        ObjectRef::Node(id) => {
            if !ctx.scene.is_node(id) {
                return None;
            }
            Some(RefDescriptor::Scene {
                instance_id: Some(id),
                object_path: ctx.scene.object_path(id),
                component_type: None,
            })
        }
        ObjectRef::Component(id) => {
            let object = ctx.scene.object(id)?;
            let owner = ctx.scene.owner_of(id)?;
            Some(RefDescriptor::Scene {
                instance_id: Some(id),
                object_path: ctx.scene.object_path(owner),
                component_type: Some(ctx.registry.name(object.ty()).to_string()),
            })
        }
        ObjectRef::Asset(guid) => {
            let record = ctx.assets.record(guid)?;
            Some(RefDescriptor::Asset {
                asset_path: Some(record.path.clone()),
                guid: Some(guid.to_string()),
                type_name: (!record.type_name.is_empty()).then(|| record.type_name.clone()),
                component_type: None,
            })
        }
        ObjectRef::AssetPart(guid, index) => {
            let record = ctx.assets.record(guid)?;
            let stored = ctx.assets.load(guid)?;
            let component = match stored {
                crate::assets::StoredObject::Container { components, .. } => components.get(index)?,
                crate::assets::StoredObject::Single(_) => return None,
            };
            Some(RefDescriptor::Asset {
                asset_path: Some(record.path.clone()),
                guid: Some(guid.to_string()),
                type_name: (!record.type_name.is_empty()).then(|| record.type_name.clone()),
                component_type: Some(ctx.registry.name(component.ty()).to_string()),
            })
        }
    }
}

/// Resolves a descriptor back to a live reference, validating that the
/// result is assignable to the declared field type.
pub fn resolve_ref(
    descriptor: &RefDescriptor,
    declared: TypeHandle,
    ctx: &BridgeContext,
) -> Result<ObjectRef, BridgeError> {
    match descriptor {
        RefDescriptor::Scene { instance_id, object_path, component_type } => {
            resolve_scene_ref(*instance_id, object_path.as_deref(), component_type.as_deref(), declared, ctx)
        }
        RefDescriptor::Asset { asset_path, guid, component_type, .. } => {
            resolve_asset_ref(asset_path.as_deref(), guid.as_deref(), component_type.as_deref(), declared, ctx)
        }
    }
}

fn resolve_scene_ref(
    instance_id: Option<InstanceId>,
    object_path: Option<&str>,
    component_type: Option<&str>,
    declared: TypeHandle,
    ctx: &BridgeContext,
) -> Result<ObjectRef, BridgeError> {
    // A descriptor may address an attached component directly by its own
    // instance id.
    if let Some(id) = instance_id {
        if !ctx.scene.is_node(id) {
            if let Some(object) = ctx.scene.object(id) {
                if let Some(hint) = component_type {
                    let hinted = resolve_component_hint(hint, declared, ctx)?;
                    if !ctx.registry.is_assignable(hinted, object.ty()) {
                        return Err(BridgeError::ambiguity(format!(
                            "instance {id} is a '{}', not a '{hint}'",
                            ctx.registry.name(object.ty())
                        )));
                    }
                }
                if !ctx.registry.is_assignable(declared, object.ty()) {
                    return Err(BridgeError::type_mismatch(format!(
                        "instance {id} of type '{}' is not assignable to '{}'",
                        ctx.registry.name(object.ty()),
                        ctx.registry.name(declared)
                    )));
                }
                return Ok(ObjectRef::Component(id));
            }
        }
    }

    // Stale instance ids fall back to the recorded container path.
    let container = match (instance_id, object_path) {
        (Some(id), _) if ctx.scene.is_node(id) => id,
        (_, Some(path)) => ctx
            .scene
            .resolve_path(path)
            .ok_or_else(|| BridgeError::not_found(format!("no node at path '{path}'")))?,
        (Some(id), None) => {
            return Err(BridgeError::not_found(format!("no scene object with instance id {id}")))
        }
        (None, None) => {
            return Err(BridgeError::validation("scene reference requires instanceId or objectPath"))
        }
    };

    let node_object = ctx
        .scene
        .object(container)
        .ok_or_else(|| BridgeError::not_found(format!("node {container} has no object state")))?;

    if ctx.registry.is_assignable(declared, node_object.ty()) {
        return Ok(ObjectRef::Node(container));
    }

    let core = ctx.registry.core();
    if ctx.registry.is_assignable(core.component, declared) {
        let wanted = match component_type {
            Some(hint) => resolve_component_hint(hint, declared, ctx)?,
            None => declared,
        };
        let node_name =
            ctx.scene.node(container).map(|node| node.name.clone()).unwrap_or_default();
        return ctx
            .scene
            .component_of_type(container, wanted, ctx.registry)
            .map(ObjectRef::Component)
            .ok_or_else(|| {
                BridgeError::ambiguity(format!(
                    "node '{node_name}' has no component of type '{}'",
                    ctx.registry.name(wanted)
                ))
            });
    }

    Err(BridgeError::type_mismatch(format!(
        "node of type '{}' is not assignable to '{}'",
        ctx.registry.name(node_object.ty()),
        ctx.registry.name(declared)
    )))
}

fn resolve_asset_ref(
    asset_path: Option<&str>,
    guid: Option<&str>,
    component_type: Option<&str>,
    declared: TypeHandle,
    ctx: &BridgeContext,
) -> Result<ObjectRef, BridgeError> {
    let guid = ctx.assets.locate(asset_path, guid)?;
    let location = ctx.assets.path_for_guid(guid).unwrap_or("<unknown>").to_string();
    let stored = ctx
        .assets
        .load(guid)
        .ok_or_else(|| BridgeError::not_found(format!("asset '{location}' is not loadable")))?;

    let core = ctx.registry.core();
    if ctx.registry.is_assignable(core.component, declared) {
        if let crate::assets::StoredObject::Container { components, .. } = stored {
            let wanted = match component_type {
                Some(hint) => resolve_component_hint(hint, declared, ctx)?,
                None => declared,
            };
            return components
                .iter()
                .position(|component| ctx.registry.is_assignable(wanted, component.ty()))
                .map(|index| ObjectRef::AssetPart(guid, index))
                .ok_or_else(|| {
                    BridgeError::ambiguity(format!(
                        "asset '{location}' has no component of type '{}'",
                        ctx.registry.name(wanted)
                    ))
                });
        }
    }

    let root = stored.root();
    if !ctx.registry.is_assignable(declared, root.ty()) {
        return Err(BridgeError::type_mismatch(format!(
            "asset '{location}' of type '{}' is not assignable to '{}'",
            ctx.registry.name(root.ty()),
            ctx.registry.name(declared)
        )));
    }
    Ok(ObjectRef::Asset(guid))
}

/// An explicit component-type hint must resolve and must be assignable to
/// the declared field type; anything else is an error rather than a silent
/// fallback to an unrelated object.
fn resolve_component_hint(
    hint: &str,
    declared: TypeHandle,
    ctx: &BridgeContext,
) -> Result<TypeHandle, BridgeError> {
    let hinted = ctx
        .resolver()
        .resolve(hint, None)
        .map_err(|_| BridgeError::ambiguity(format!("component type '{hint}' could not be resolved")))?;
    if !ctx.registry.is_assignable(declared, hinted) {
        return Err(BridgeError::type_mismatch(format!(
            "component type '{hint}' is not assignable to '{}'",
            ctx.registry.name(declared)
        )));
    }
    Ok(hinted)
}
