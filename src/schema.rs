use crate::reflect::{FieldFlags, MemberDescriptor, TypeDescriptor, TypeHandle, TypeRegistry};
use crate::resolve::{ResolveScopes, TypeResolver};
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Declarative type descriptions for everything the host application
/// exposes beyond the framework builtins. Loaded once at startup; a later
/// reload re-runs the loader and invalidates the registry index.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchemaDoc {
    #[serde(default)]
    pub modules: Vec<SchemaModule>,
    #[serde(default)]
    pub types: Vec<SchemaType>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchemaModule {
    pub name: String,
    #[serde(default)]
    pub opaque: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchemaType {
    pub name: String,
    pub module: String,
    #[serde(default)]
    pub kind: SchemaTypeKind,
    /// Base type name for classes; defaults to the framework component
    /// base, the overwhelmingly common case for scripted types.
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default)]
    pub members: Vec<SchemaMember>,
    #[serde(default)]
    pub variants: Vec<SchemaVariant>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaTypeKind {
    #[default]
    Class,
    Struct,
    Enum,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchemaMember {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default = "default_true")]
    pub public: bool,
    #[serde(default)]
    pub serialize: bool,
    #[serde(default)]
    pub skip: bool,
    #[serde(default)]
    pub synthesized: bool,
    #[serde(default)]
    pub property: bool,
    #[serde(default)]
    pub read_only: bool,
}

fn default_true() -> bool {
    true
}

impl SchemaMember {
    fn flags(&self) -> FieldFlags {
        let mut flags = FieldFlags::empty();
        if self.public {
            flags |= FieldFlags::PUBLIC;
        }
        if self.serialize {
            flags |= FieldFlags::SERIALIZE;
        }
        if self.skip {
            flags |= FieldFlags::SKIP;
        }
        if self.synthesized {
            flags |= FieldFlags::SYNTHESIZED;
        }
        if self.property {
            flags |= FieldFlags::PROPERTY;
        }
        if self.read_only {
            flags |= FieldFlags::READ_ONLY;
        }
        flags
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchemaVariant {
    pub name: String,
    pub value: i32,
}

impl SchemaDoc {
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).with_context(|| format!("Reading schema file {}", path.display()))?;
        serde_json::from_slice(&bytes).with_context(|| format!("Parsing schema file {}", path.display()))
    }

    /// Installs every declared module and type. Type shells are registered
    /// first so members and bases may reference each other in any order.
    pub fn install(&self, registry: &mut TypeRegistry, scopes: &ResolveScopes) -> Result<()> {
        for module in &self.modules {
            registry.register_module(module.name.clone(), module.opaque);
        }

        let mut handles: Vec<TypeHandle> = Vec::with_capacity(self.types.len());
        for declared in &self.types {
            let shell = match declared.kind {
                SchemaTypeKind::Class => {
                    TypeDescriptor::class(&declared.name, &declared.module, registry.core().component)
                }
                SchemaTypeKind::Struct => TypeDescriptor::structure(&declared.name, &declared.module),
                SchemaTypeKind::Enum => TypeDescriptor::enumeration(
                    &declared.name,
                    &declared.module,
                    declared.variants.iter().map(|v| (v.name.clone(), v.value)).collect(),
                ),
            };
            handles.push(registry.register(shell));
        }

        for (declared, handle) in self.types.iter().zip(handles) {
            if declared.kind == SchemaTypeKind::Enum {
                continue;
            }
            let base = match (&declared.base, declared.kind) {
                (Some(name), SchemaTypeKind::Class) => Some(
                    resolve_name(registry, scopes, name)
                        .with_context(|| format!("Resolving base of '{}'", declared.name))?,
                ),
                _ => None,
            };
            let mut members = Vec::with_capacity(declared.members.len());
            for member in &declared.members {
                let ty = resolve_member_type(registry, scopes, &member.type_name).with_context(
                    || format!("Resolving member '{}.{}'", declared.name, member.name),
                )?;
                members.push(MemberDescriptor { name: member.name.clone(), ty, flags: member.flags() });
            }
            let descriptor = registry.descriptor_mut(handle);
            if let Some(base) = base {
                descriptor.base = Some(base);
            }
            descriptor.members = members;
        }
        Ok(())
    }
}

fn resolve_name(
    registry: &TypeRegistry,
    scopes: &ResolveScopes,
    name: &str,
) -> Result<TypeHandle> {
    TypeResolver::new(registry, scopes)
        .resolve(name, None)
        .map_err(|err| anyhow!("{err}"))
}

/// Member types may use the `List<Inner>` spelling for ordered collections.
fn resolve_member_type(
    registry: &mut TypeRegistry,
    scopes: &ResolveScopes,
    name: &str,
) -> Result<TypeHandle> {
    if let Some(inner) = name.strip_prefix("List<").and_then(|rest| rest.strip_suffix('>')) {
        let element = resolve_name(registry, scopes, inner)?;
        return Ok(registry.list_of(element));
    }
    resolve_name(registry, scopes, name)
}
