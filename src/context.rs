use crate::assets::AssetDatabase;
use crate::reflect::TypeRegistry;
use crate::resolve::{ResolveScopes, TypeResolver};
use crate::scene::SceneGraph;

/// Read-only view of the host state a single snapshot/apply call runs
/// against. Borrowed for the duration of one call; the host guarantees
/// exclusive access for that span.
pub struct BridgeContext<'a> {
    pub registry: &'a TypeRegistry,
    pub scene: &'a SceneGraph,
    pub assets: &'a AssetDatabase,
    pub scopes: &'a ResolveScopes,
}

impl<'a> BridgeContext<'a> {
    pub fn new(
        registry: &'a TypeRegistry,
        scene: &'a SceneGraph,
        assets: &'a AssetDatabase,
        scopes: &'a ResolveScopes,
    ) -> Self {
        Self { registry, scene, assets, scopes }
    }

    pub fn resolver(&self) -> TypeResolver<'_> {
        TypeResolver::new(self.registry, self.scopes)
    }
}
