use crate::error::BridgeError;
use crate::reflect::{TypeHandle, TypeRegistry};

/// Namespaces consulted when a type name is not fully qualified. The user
/// scripts namespace is searched before the framework list.
#[derive(Debug, Clone)]
pub struct ResolveScopes {
    pub user_namespace: String,
    pub framework_namespaces: Vec<String>,
}

impl Default for ResolveScopes {
    fn default() -> Self {
        Self {
            user_namespace: "Scripts".to_string(),
            framework_namespaces: vec![
                "Merlin".to_string(),
                "Merlin.Core".to_string(),
                "Merlin.UI".to_string(),
            ],
        }
    }
}

pub struct TypeResolver<'a> {
    registry: &'a TypeRegistry,
    scopes: &'a ResolveScopes,
}

impl<'a> TypeResolver<'a> {
    pub fn new(registry: &'a TypeRegistry, scopes: &'a ResolveScopes) -> Self {
        Self { registry, scopes }
    }

    /// Resolves a type name, first match wins: exact qualified name, the
    /// user scripts namespace, each framework namespace in order, then a
    /// scan of every loaded module matching simple or qualified name.
    /// Candidates failing the `constraint` assignability check are skipped,
    /// not fatal. Opaque modules are skipped silently.
    pub fn resolve(
        &self,
        name: &str,
        constraint: Option<TypeHandle>,
    ) -> Result<TypeHandle, BridgeError> {
        if name.is_empty() {
            return Err(BridgeError::validation("type name must not be empty"));
        }

        if let Some(found) = self.accept(self.registry.lookup(name), constraint) {
            return Ok(found);
        }

        let user_qualified = format!("{}.{}", self.scopes.user_namespace, name);
        if let Some(found) = self.accept(self.registry.lookup(&user_qualified), constraint) {
            return Ok(found);
        }

        for namespace in &self.scopes.framework_namespaces {
            let qualified = format!("{namespace}.{name}");
            if let Some(found) = self.accept(self.registry.lookup(&qualified), constraint) {
                return Ok(found);
            }
        }

        for (handle, descriptor) in self.registry.iter() {
            if self.registry.is_module_opaque(&descriptor.module) {
                continue;
            }
            if descriptor.simple_name() != name && descriptor.name != name {
                continue;
            }
            if let Some(found) = self.accept(Some(handle), constraint) {
                return Ok(found);
            }
        }

        match constraint {
            Some(base) => Err(BridgeError::not_found(format!(
                "no type named '{name}' assignable to '{}'",
                self.registry.name(base)
            ))),
            None => Err(BridgeError::not_found(format!("no type named '{name}'"))),
        }
    }

    fn accept(&self, candidate: Option<TypeHandle>, constraint: Option<TypeHandle>) -> Option<TypeHandle> {
        let candidate = candidate?;
        match constraint {
            Some(base) if !self.registry.is_assignable(base, candidate) => None,
            _ => Some(candidate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::TypeDescriptor;

    fn fixture() -> (TypeRegistry, ResolveScopes) {
        let mut registry = TypeRegistry::new();
        let core = registry.core();
        registry.register(TypeDescriptor::class("Scripts.Health", "GameScripts", core.component));
        registry.register(TypeDescriptor::class("Plugins.Health", "Plugins", core.component));
        registry.register(TypeDescriptor::class("Plugins.Inventory", "Plugins", core.component));
        (registry, ResolveScopes::default())
    }

    #[test]
    fn exact_qualified_name_wins() {
        let (registry, scopes) = fixture();
        let resolver = TypeResolver::new(&registry, &scopes);
        let found = resolver.resolve("Plugins.Health", None).expect("qualified lookup");
        assert_eq!(registry.name(found), "Plugins.Health");
    }

    #[test]
    fn user_namespace_beats_module_scan() {
        let (registry, scopes) = fixture();
        let resolver = TypeResolver::new(&registry, &scopes);
        let found = resolver.resolve("Health", None).expect("short name lookup");
        assert_eq!(registry.name(found), "Scripts.Health");
    }

    #[test]
    fn framework_namespace_resolves_builtins() {
        let (registry, scopes) = fixture();
        let resolver = TypeResolver::new(&registry, &scopes);
        let found = resolver.resolve("Vec3", None).expect("framework lookup");
        assert_eq!(found, registry.core().vec3);
    }

    #[test]
    fn scan_matches_simple_name_outside_known_namespaces() {
        let (registry, scopes) = fixture();
        let resolver = TypeResolver::new(&registry, &scopes);
        let found = resolver.resolve("Inventory", None).expect("scan lookup");
        assert_eq!(registry.name(found), "Plugins.Inventory");
    }

    #[test]
    fn constraint_skips_non_assignable_candidates() {
        let (mut registry, scopes) = fixture();
        let core = registry.core();
        registry.register(TypeDescriptor::class("Scripts.Marker", "GameScripts", core.asset));
        // A component-constrained search must pass over the asset-derived
        // type that shares the simple name.
        registry.register(TypeDescriptor::class("Plugins.Marker", "Plugins", core.component));
        let resolver = TypeResolver::new(&registry, &scopes);
        let found = resolver.resolve("Marker", Some(core.component)).expect("constrained lookup");
        assert_eq!(registry.name(found), "Plugins.Marker");
    }

    #[test]
    fn opaque_modules_are_skipped_silently() {
        let (mut registry, scopes) = fixture();
        let core = registry.core();
        registry.register_module("Generated", true);
        registry.register(TypeDescriptor::class("Generated.Ghost", "Generated", core.component));
        let resolver = TypeResolver::new(&registry, &scopes);
        let err = resolver.resolve("Ghost", None).unwrap_err();
        assert!(matches!(err, BridgeError::NotFound(_)));
    }

    #[test]
    fn missing_name_reports_not_found() {
        let (registry, scopes) = fixture();
        let resolver = TypeResolver::new(&registry, &scopes);
        let err = resolver.resolve("DoesNotExist", None).unwrap_err();
        assert!(err.to_string().contains("DoesNotExist"));
    }
}
