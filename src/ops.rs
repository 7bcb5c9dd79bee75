use crate::assets::AssetDatabase;
use crate::context::BridgeContext;
use crate::error::BridgeError;
use crate::reflect::{ObjectInstance, TypeRegistry};
use crate::resolve::{ResolveScopes, TypeResolver};
use crate::scene::{SceneGraph, StageDoc};
use crate::schema::SchemaDoc;
use crate::snapshot::{self, ApplyReport, Checkpoint};
use crate::value::InstanceId;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::Map;
use uuid::Uuid;

/// How a tool handler names the object it wants to touch: a direct
/// ephemeral id, a hierarchical path, or a persisted location. The asset
/// form is matched last so a bare `{}` fails validation instead of
/// silently addressing nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetAddress {
    Instance {
        #[serde(rename = "instanceId")]
        instance_id: InstanceId,
    },
    Path {
        path: String,
    },
    Asset {
        #[serde(default, rename = "assetPath", skip_serializing_if = "Option::is_none")]
        asset_path: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        guid: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResolvedTarget {
    Scene(InstanceId),
    Asset(Uuid),
}

struct UndoRecord {
    target: ResolvedTarget,
    checkpoint: Checkpoint,
}

/// Owns the host state the bridge operates on and exposes the operation
/// surface tool handlers call. Every failure leaves this boundary as a
/// structured value, never a panic.
pub struct BridgeHost {
    pub registry: TypeRegistry,
    pub scene: SceneGraph,
    pub assets: AssetDatabase,
    scopes: ResolveScopes,
    last_undo: Option<UndoRecord>,
}

impl BridgeHost {
    pub fn new(scopes: ResolveScopes) -> Self {
        Self {
            registry: TypeRegistry::new(),
            scene: SceneGraph::new(),
            assets: AssetDatabase::new(),
            scopes,
            last_undo: None,
        }
    }

    pub fn context(&self) -> BridgeContext<'_> {
        BridgeContext::new(&self.registry, &self.scene, &self.assets, &self.scopes)
    }

    pub fn scopes(&self) -> &ResolveScopes {
        &self.scopes
    }

    fn resolve_target(&self, address: &TargetAddress) -> Result<ResolvedTarget, BridgeError> {
        match address {
            TargetAddress::Instance { instance_id } => {
                if self.scene.object(*instance_id).is_some() {
                    Ok(ResolvedTarget::Scene(*instance_id))
                } else {
                    Err(BridgeError::not_found(format!(
                        "no scene object with instance id {instance_id}"
                    )))
                }
            }
            TargetAddress::Path { path } => self
                .scene
                .resolve_path(path)
                .map(ResolvedTarget::Scene)
                .ok_or_else(|| BridgeError::not_found(format!("no node at path '{path}'"))),
            TargetAddress::Asset { asset_path, guid } => {
                let guid = self.assets.locate(asset_path.as_deref(), guid.as_deref())?;
                if self.assets.load(guid).is_none() {
                    let location = self.assets.path_for_guid(guid).unwrap_or("<unknown>");
                    return Err(BridgeError::not_found(format!(
                        "asset '{location}' is not loadable"
                    )));
                }
                Ok(ResolvedTarget::Asset(guid))
            }
        }
    }

    fn target_object(&self, target: ResolvedTarget) -> Option<&ObjectInstance> {
        match target {
            ResolvedTarget::Scene(id) => self.scene.object(id),
            ResolvedTarget::Asset(guid) => self.assets.load(guid).map(|stored| stored.root()),
        }
    }

    fn store_target_object(&mut self, target: ResolvedTarget, object: ObjectInstance) {
        match target {
            ResolvedTarget::Scene(id) => self.scene.set_object(id, object),
            ResolvedTarget::Asset(guid) => {
                if let Some(stored) = self.assets.load_mut(guid) {
                    *stored.root_mut() = object;
                }
            }
        }
    }

    /// Reads the full field document of the addressed object.
    pub fn read_object(&self, address: &TargetAddress) -> Result<serde_json::Value, BridgeError> {
        let target = self.resolve_target(address)?;
        let object = self
            .target_object(target)
            .ok_or_else(|| BridgeError::not_found("target object disappeared during read"))?;
        let document = snapshot::snapshot(object, &self.context());
        Ok(serde_json::Value::Object(document))
    }

    /// Applies a partial field document to the addressed object. Address
    /// problems fail the whole call before any field is touched; field
    /// problems are reported per key while the rest of the batch lands.
    /// The pre-image checkpoint is retained for `undo_last`.
    pub fn write_object(
        &mut self,
        address: &TargetAddress,
        document: &Map<String, serde_json::Value>,
    ) -> ApplyReport {
        let target = match self.resolve_target(address) {
            Ok(target) => target,
            Err(err) => return ApplyReport::failure(err.to_string()),
        };
        let Some(mut object) = self.target_object(target).cloned() else {
            return ApplyReport::failure("target object disappeared during write");
        };
        let (report, checkpoint) = snapshot::apply(&mut object, document, &self.context());
        self.store_target_object(target, object);
        if !checkpoint.is_empty() {
            self.last_undo = Some(UndoRecord { target, checkpoint });
        }
        report
    }

    /// Reverts the most recent write as a single action.
    pub fn undo_last(&mut self) -> Result<String, BridgeError> {
        let record = self
            .last_undo
            .take()
            .ok_or_else(|| BridgeError::validation("nothing to undo"))?;
        let Some(mut object) = self.target_object(record.target).cloned() else {
            return Err(BridgeError::not_found("undo target no longer exists"));
        };
        record.checkpoint.revert(&mut object);
        self.store_target_object(record.target, object);
        Ok(format!("reverted {} field(s)", record.checkpoint.len()))
    }

    /// Resolves a type name to its fully-qualified form, optionally under
    /// a base-type constraint.
    pub fn resolve_type_name(
        &self,
        name: &str,
        constraint: Option<&str>,
    ) -> Result<String, BridgeError> {
        let resolver = TypeResolver::new(&self.registry, &self.scopes);
        let constraint = match constraint {
            Some(base) => Some(resolver.resolve(base, None)?),
            None => None,
        };
        let handle = resolver.resolve(name, constraint)?;
        Ok(self.registry.name(handle).to_string())
    }

    pub fn load_schema(&mut self, doc: &SchemaDoc) -> Result<()> {
        doc.install(&mut self.registry, &self.scopes)
    }

    /// Builds the live graph from a stage document: nodes first, then
    /// components, then component fields through the normal apply path so
    /// cross-node references resolve.
    pub fn load_stage(&mut self, doc: &StageDoc) -> Result<()> {
        let core = self.registry.core();
        let mut spawned: Vec<InstanceId> = Vec::with_capacity(doc.nodes.len());
        for node in &doc.nodes {
            let parent = match node.parent {
                Some(index) => Some(*spawned.get(index).ok_or_else(|| {
                    anyhow!("stage node '{}' references parent index {index} before it exists", node.name)
                })?),
                None => None,
            };
            let ty = match &node.node_type {
                Some(name) => TypeResolver::new(&self.registry, &self.scopes)
                    .resolve(name, Some(core.node))?,
                None => core.node,
            };
            let id = self.scene.spawn_node(&node.name, parent, ty, &self.registry)?;
            spawned.push(id);
        }

        let mut pending_fields: Vec<(InstanceId, &Map<String, serde_json::Value>)> = Vec::new();
        for (node, id) in doc.nodes.iter().zip(&spawned) {
            for component in &node.components {
                let ty = TypeResolver::new(&self.registry, &self.scopes)
                    .resolve(&component.type_name, Some(core.component))?;
                let component_id = self.scene.attach_component(*id, ty, &self.registry)?;
                if !component.fields.is_empty() {
                    pending_fields.push((component_id, &component.fields));
                }
            }
        }

        for (component_id, fields) in pending_fields {
            let Some(mut object) = self.scene.object(component_id).cloned() else { continue };
            let (report, _checkpoint) = snapshot::apply(&mut object, fields, &self.context());
            self.scene.set_object(component_id, object);
            for error in &report.errors {
                eprintln!("[stage] component {component_id} field '{}': {}", error.field, error.message);
            }
        }
        Ok(())
    }
}
