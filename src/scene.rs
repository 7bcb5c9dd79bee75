use crate::reflect::{ObjectInstance, TypeHandle, TypeRegistry};
use crate::value::InstanceId;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// A named container in the live object graph. Topology (name, parent,
/// children, attached components) lives here; field state lives in the
/// object store under the same instance id.
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub parent: Option<InstanceId>,
    pub children: Vec<InstanceId>,
    pub components: Vec<InstanceId>,
}

/// The runtime addressing domain: container nodes and their attached
/// component instances, keyed by ephemeral instance ids that are only
/// meaningful within the current session.
pub struct SceneGraph {
    nodes: HashMap<InstanceId, Node>,
    roots: Vec<InstanceId>,
    objects: HashMap<InstanceId, ObjectInstance>,
    owners: HashMap<InstanceId, InstanceId>,
    next_id: InstanceId,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            roots: Vec::new(),
            objects: HashMap::new(),
            owners: HashMap::new(),
            next_id: 1,
        }
    }

    fn allocate_id(&mut self) -> InstanceId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn spawn_node(
        &mut self,
        name: &str,
        parent: Option<InstanceId>,
        ty: TypeHandle,
        registry: &TypeRegistry,
    ) -> Result<InstanceId> {
        if !registry.is_assignable(registry.core().node, ty) {
            return Err(anyhow!("'{}' is not a node type", registry.name(ty)));
        }
        if let Some(parent_id) = parent {
            if !self.nodes.contains_key(&parent_id) {
                return Err(anyhow!("parent node {parent_id} does not exist"));
            }
        }
        let id = self.allocate_id();
        self.nodes.insert(
            id,
            Node { name: name.to_string(), parent, children: Vec::new(), components: Vec::new() },
        );
        self.objects.insert(id, ObjectInstance::with_defaults(ty, registry));
        match parent {
            Some(parent_id) => {
                if let Some(node) = self.nodes.get_mut(&parent_id) {
                    node.children.push(id);
                }
            }
            None => self.roots.push(id),
        }
        Ok(id)
    }

    pub fn attach_component(
        &mut self,
        node_id: InstanceId,
        ty: TypeHandle,
        registry: &TypeRegistry,
    ) -> Result<InstanceId> {
        if !registry.is_assignable(registry.core().component, ty) {
            return Err(anyhow!("'{}' is not a component type", registry.name(ty)));
        }
        if !self.nodes.contains_key(&node_id) {
            return Err(anyhow!("node {node_id} does not exist"));
        }
        let id = self.allocate_id();
        self.objects.insert(id, ObjectInstance::with_defaults(ty, registry));
        self.owners.insert(id, node_id);
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.components.push(id);
        }
        Ok(id)
    }

    /// Removes a node, its attached components, and its whole subtree.
    /// References held elsewhere simply go stale.
    pub fn despawn(&mut self, node_id: InstanceId) -> Result<()> {
        let node = self.nodes.remove(&node_id).ok_or_else(|| anyhow!("node {node_id} does not exist"))?;
        self.objects.remove(&node_id);
        for component in &node.components {
            self.objects.remove(component);
            self.owners.remove(component);
        }
        match node.parent {
            Some(parent_id) => {
                if let Some(parent) = self.nodes.get_mut(&parent_id) {
                    parent.children.retain(|child| *child != node_id);
                }
            }
            None => self.roots.retain(|root| *root != node_id),
        }
        for child in node.children {
            if let Some(entry) = self.nodes.get_mut(&child) {
                entry.parent = None;
            }
            self.despawn(child)?;
        }
        Ok(())
    }

    pub fn node(&self, id: InstanceId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn is_node(&self, id: InstanceId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn owner_of(&self, component_id: InstanceId) -> Option<InstanceId> {
        self.owners.get(&component_id).copied()
    }

    pub fn object(&self, id: InstanceId) -> Option<&ObjectInstance> {
        self.objects.get(&id)
    }

    pub fn object_mut(&mut self, id: InstanceId) -> Option<&mut ObjectInstance> {
        self.objects.get_mut(&id)
    }

    /// Replaces the stored object for `id`, used by callers that mutate a
    /// detached clone and write it back.
    pub fn set_object(&mut self, id: InstanceId, object: ObjectInstance) {
        self.objects.insert(id, object);
    }

    pub fn roots(&self) -> &[InstanceId] {
        &self.roots
    }

    /// First attached component whose type is assignable to `wanted`.
    pub fn component_of_type(
        &self,
        node_id: InstanceId,
        wanted: TypeHandle,
        registry: &TypeRegistry,
    ) -> Option<InstanceId> {
        let node = self.nodes.get(&node_id)?;
        node.components.iter().copied().find(|id| {
            self.objects
                .get(id)
                .map(|object| registry.is_assignable(wanted, object.ty()))
                .unwrap_or(false)
        })
    }

    /// Resolves a slash-separated name path. The first segment must name a
    /// top-level node, each following segment an immediate child, exact
    /// match only. Duplicate names resolve to the earliest-inserted match;
    /// any unmatched segment aborts with no partial result.
    pub fn resolve_path(&self, path: &str) -> Option<InstanceId> {
        let segments: SmallVec<[&str; 8]> = path.split('/').collect();
        let mut iter = segments.iter();
        let first = iter.next()?;
        if first.is_empty() {
            return None;
        }
        let mut current = self
            .roots
            .iter()
            .copied()
            .find(|id| self.nodes.get(id).map(|node| node.name == *first).unwrap_or(false))?;
        for segment in iter {
            if segment.is_empty() {
                return None;
            }
            let node = self.nodes.get(&current)?;
            current = node
                .children
                .iter()
                .copied()
                .find(|id| self.nodes.get(id).map(|child| child.name == *segment).unwrap_or(false))?;
        }
        Some(current)
    }

    /// Inverse of `resolve_path` for a live node.
    pub fn object_path(&self, node_id: InstanceId) -> Option<String> {
        let mut segments: SmallVec<[&str; 8]> = SmallVec::new();
        let mut current = Some(node_id);
        while let Some(id) = current {
            let node = self.nodes.get(&id)?;
            segments.push(node.name.as_str());
            current = node.parent;
        }
        segments.reverse();
        Some(segments.join("/"))
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialized form of a stage, loaded by the bridge binary and by tests.
/// Component fields are plain JSON documents applied through the snapshot
/// engine once every node exists, so cross-node references work.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageDoc {
    #[serde(default)]
    pub nodes: Vec<StageNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageNode {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<usize>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<StageComponent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageComponent {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl StageDoc {
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).with_context(|| format!("Reading stage file {}", path.display()))?;
        serde_json::from_slice(&bytes).with_context(|| format!("Parsing stage file {}", path.display()))
    }

    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Creating stage directory {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json.as_bytes())
            .with_context(|| format!("Writing stage file {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with_nodes() -> (TypeRegistry, SceneGraph, InstanceId, InstanceId, InstanceId) {
        let registry = TypeRegistry::new();
        let node_ty = registry.core().node;
        let mut graph = SceneGraph::new();
        let root = graph.spawn_node("Level", None, node_ty, &registry).expect("spawn root");
        let child = graph.spawn_node("Player", Some(root), node_ty, &registry).expect("spawn child");
        let grandchild =
            graph.spawn_node("Weapon", Some(child), node_ty, &registry).expect("spawn grandchild");
        (registry, graph, root, child, grandchild)
    }

    #[test]
    fn path_resolution_walks_children() {
        let (_registry, graph, root, child, grandchild) = graph_with_nodes();
        assert_eq!(graph.resolve_path("Level"), Some(root));
        assert_eq!(graph.resolve_path("Level/Player"), Some(child));
        assert_eq!(graph.resolve_path("Level/Player/Weapon"), Some(grandchild));
    }

    #[test]
    fn unmatched_segment_aborts_resolution() {
        let (_registry, graph, _root, _child, _grandchild) = graph_with_nodes();
        assert_eq!(graph.resolve_path("Level/Enemy"), None);
        assert_eq!(graph.resolve_path("Missing"), None);
        assert_eq!(graph.resolve_path("Level//Weapon"), None);
        assert_eq!(graph.resolve_path(""), None);
    }

    #[test]
    fn duplicate_names_resolve_to_earliest_insertion() {
        let (registry, mut graph, _root, _child, _grandchild) = graph_with_nodes();
        let node_ty = registry.core().node;
        let first = graph.spawn_node("Twin", None, node_ty, &registry).expect("spawn first twin");
        let _second = graph.spawn_node("Twin", None, node_ty, &registry).expect("spawn second twin");
        assert_eq!(graph.resolve_path("Twin"), Some(first));
    }

    #[test]
    fn object_path_round_trips() {
        let (_registry, graph, _root, _child, grandchild) = graph_with_nodes();
        let path = graph.object_path(grandchild).expect("path for live node");
        assert_eq!(path, "Level/Player/Weapon");
        assert_eq!(graph.resolve_path(&path), Some(grandchild));
    }

    #[test]
    fn despawn_removes_subtree_and_components() {
        let (registry, mut graph, root, child, grandchild) = graph_with_nodes();
        let component =
            graph.attach_component(child, registry.core().component, &registry).expect("attach");
        graph.despawn(child).expect("despawn subtree");
        assert!(graph.node(child).is_none());
        assert!(graph.node(grandchild).is_none());
        assert!(graph.object(component).is_none());
        assert!(graph.owner_of(component).is_none());
        assert_eq!(graph.node(root).map(|node| node.children.len()), Some(0));
    }
}
