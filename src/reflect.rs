use crate::value::Value;
use bitflags::bitflags;
use smallvec::SmallVec;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

/// Opaque handle to a registered runtime type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeHandle(u32);

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FieldFlags: u8 {
        /// Publicly visible member.
        const PUBLIC = 1;
        /// Non-public field explicitly opted into persistence.
        const SERIALIZE = 1 << 1;
        /// Field explicitly opted out of persistence.
        const SKIP = 1 << 2;
        /// Compiler-synthesized backing storage, never surfaced.
        const SYNTHESIZED = 1 << 3;
        /// Accessor-backed member rather than plain storage.
        const PROPERTY = 1 << 4;
        /// Property without a setter.
        const READ_ONLY = 1 << 5;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Bool,
    Int,
    Float,
    String,
    Vec2,
    Vec3,
    Vec4,
    Quat,
    Color,
    Rect,
    Bounds,
    Enum,
    List,
    /// Plain value aggregate, embedded structurally.
    Struct,
    /// Reference-domain object type (nodes, components, assets).
    Class,
}

impl TypeKind {
    pub fn is_reference(self) -> bool {
        matches!(self, TypeKind::Class)
    }

    /// Whether a JSON null decodes to a native null for this kind. For the
    /// remaining kinds "no value" is meaningless and null is a no-op.
    pub fn is_nullable(self) -> bool {
        matches!(self, TypeKind::Class | TypeKind::List | TypeKind::String)
    }
}

#[derive(Debug, Clone)]
pub struct MemberDescriptor {
    pub name: String,
    pub ty: TypeHandle,
    pub flags: FieldFlags,
}

impl MemberDescriptor {
    pub fn is_field(&self) -> bool {
        !self.flags.contains(FieldFlags::PROPERTY)
    }

    pub fn is_writable_property(&self) -> bool {
        self.flags.contains(FieldFlags::PROPERTY) && !self.flags.contains(FieldFlags::READ_ONLY)
    }

    /// Host serialization-visibility rule: public fields unless opted out,
    /// non-public fields only when opted in, synthesized storage never.
    pub fn snapshot_visible(&self) -> bool {
        if !self.is_field() {
            return false;
        }
        if self.flags.intersects(FieldFlags::SKIP | FieldFlags::SYNTHESIZED) {
            return false;
        }
        self.flags.intersects(FieldFlags::PUBLIC | FieldFlags::SERIALIZE)
    }
}

#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    /// Fully-qualified name, e.g. `Scripts.Health`.
    pub name: String,
    /// Owning module, the unit of introspection granularity.
    pub module: String,
    pub base: Option<TypeHandle>,
    pub kind: TypeKind,
    pub members: Vec<MemberDescriptor>,
    /// Symbolic name to discriminant table for `TypeKind::Enum`.
    pub variants: Vec<(String, i32)>,
    /// Element type for `TypeKind::List`.
    pub element: Option<TypeHandle>,
    /// Framework boundary types terminate the member walk and contribute
    /// no members of their own.
    pub boundary: bool,
}

impl TypeDescriptor {
    pub fn class(name: impl Into<String>, module: impl Into<String>, base: TypeHandle) -> Self {
        Self {
            name: name.into(),
            module: module.into(),
            base: Some(base),
            kind: TypeKind::Class,
            members: Vec::new(),
            variants: Vec::new(),
            element: None,
            boundary: false,
        }
    }

    pub fn structure(name: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module: module.into(),
            base: None,
            kind: TypeKind::Struct,
            members: Vec::new(),
            variants: Vec::new(),
            element: None,
            boundary: false,
        }
    }

    pub fn enumeration(
        name: impl Into<String>,
        module: impl Into<String>,
        variants: Vec<(String, i32)>,
    ) -> Self {
        Self {
            name: name.into(),
            module: module.into(),
            base: None,
            kind: TypeKind::Enum,
            members: Vec::new(),
            variants,
            element: None,
            boundary: false,
        }
    }

    pub fn with_member(
        mut self,
        name: impl Into<String>,
        ty: TypeHandle,
        flags: FieldFlags,
    ) -> Self {
        self.members.push(MemberDescriptor { name: name.into(), ty, flags });
        self
    }

    pub fn simple_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone)]
pub struct ModuleInfo {
    pub name: String,
    /// Modules that cannot be introspected (dynamically generated,
    /// reflection-restricted) are skipped silently by every search.
    pub opaque: bool,
}

/// Handles to the framework types every registry carries.
#[derive(Debug, Clone, Copy)]
pub struct CoreTypes {
    pub object: TypeHandle,
    pub node: TypeHandle,
    pub component: TypeHandle,
    pub asset: TypeHandle,
    pub boolean: TypeHandle,
    pub integer: TypeHandle,
    pub number: TypeHandle,
    pub string: TypeHandle,
    pub vec2: TypeHandle,
    pub vec3: TypeHandle,
    pub vec4: TypeHandle,
    pub quat: TypeHandle,
    pub color: TypeHandle,
    pub rect: TypeHandle,
    pub bounds: TypeHandle,
}

const FRAMEWORK_MODULE: &str = "Merlin";

/// Registry of every loaded type descriptor. The qualified-name index is
/// rebuilt lazily after `invalidate`; access is single-threaded alongside
/// the host loop, so interior mutability needs no locking.
pub struct TypeRegistry {
    types: Vec<TypeDescriptor>,
    modules: Vec<ModuleInfo>,
    core: CoreTypes,
    by_name: RefCell<HashMap<String, TypeHandle>>,
    index_stale: Cell<bool>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            types: Vec::new(),
            modules: vec![ModuleInfo { name: FRAMEWORK_MODULE.to_string(), opaque: false }],
            core: CoreTypes {
                object: TypeHandle(0),
                node: TypeHandle(0),
                component: TypeHandle(0),
                asset: TypeHandle(0),
                boolean: TypeHandle(0),
                integer: TypeHandle(0),
                number: TypeHandle(0),
                string: TypeHandle(0),
                vec2: TypeHandle(0),
                vec3: TypeHandle(0),
                vec4: TypeHandle(0),
                quat: TypeHandle(0),
                color: TypeHandle(0),
                rect: TypeHandle(0),
                bounds: TypeHandle(0),
            },
            by_name: RefCell::new(HashMap::new()),
            index_stale: Cell::new(true),
        };
        registry.install_core_types();
        registry
    }

    fn install_core_types(&mut self) {
        let object = self.push(TypeDescriptor {
            name: "Merlin.Object".to_string(),
            module: FRAMEWORK_MODULE.to_string(),
            base: None,
            kind: TypeKind::Class,
            members: Vec::new(),
            variants: Vec::new(),
            element: None,
            boundary: true,
        });
        let boolean = self.push(primitive("bool", TypeKind::Bool));
        let integer = self.push(primitive("int", TypeKind::Int));
        let number = self.push(primitive("float", TypeKind::Float));
        let string = self.push(primitive("string", TypeKind::String));
        let vec2 = self.push(primitive("Merlin.Vec2", TypeKind::Vec2));
        let vec3 = self.push(primitive("Merlin.Vec3", TypeKind::Vec3));
        let vec4 = self.push(primitive("Merlin.Vec4", TypeKind::Vec4));
        let quat = self.push(primitive("Merlin.Quat", TypeKind::Quat));
        let color = self.push(primitive("Merlin.Color", TypeKind::Color));
        let rect = self.push(primitive("Merlin.Rect", TypeKind::Rect));
        let bounds = self.push(primitive("Merlin.Bounds", TypeKind::Bounds));

        let node = self.push(
            TypeDescriptor::class("Merlin.Node", FRAMEWORK_MODULE, object)
                .with_member("active", boolean, FieldFlags::PUBLIC)
                .with_member("tag", string, FieldFlags::PUBLIC)
                .with_member("layer", integer, FieldFlags::PUBLIC),
        );
        let mut component = TypeDescriptor::class("Merlin.Component", FRAMEWORK_MODULE, object);
        component.boundary = true;
        let component = self.push(component);
        let mut asset = TypeDescriptor::class("Merlin.Asset", FRAMEWORK_MODULE, object);
        asset.boundary = true;
        let asset = self.push(asset);

        self.core = CoreTypes {
            object,
            node,
            component,
            asset,
            boolean,
            integer,
            number,
            string,
            vec2,
            vec3,
            vec4,
            quat,
            color,
            rect,
            bounds,
        };
    }

    fn push(&mut self, descriptor: TypeDescriptor) -> TypeHandle {
        let handle = TypeHandle(self.types.len() as u32);
        self.types.push(descriptor);
        self.index_stale.set(true);
        handle
    }

    pub fn core(&self) -> CoreTypes {
        self.core
    }

    pub fn register_module(&mut self, name: impl Into<String>, opaque: bool) {
        let name = name.into();
        if let Some(existing) = self.modules.iter_mut().find(|m| m.name == name) {
            existing.opaque = opaque;
            return;
        }
        self.modules.push(ModuleInfo { name, opaque });
    }

    pub fn register(&mut self, descriptor: TypeDescriptor) -> TypeHandle {
        if !self.modules.iter().any(|m| m.name == descriptor.module) {
            self.modules.push(ModuleInfo { name: descriptor.module.clone(), opaque: false });
        }
        self.push(descriptor)
    }

    /// Finds or registers the list type over `element`.
    pub fn list_of(&mut self, element: TypeHandle) -> TypeHandle {
        for (index, descriptor) in self.types.iter().enumerate() {
            if descriptor.kind == TypeKind::List && descriptor.element == Some(element) {
                return TypeHandle(index as u32);
            }
        }
        let name = format!("List<{}>", self.descriptor(element).name);
        self.push(TypeDescriptor {
            name,
            module: FRAMEWORK_MODULE.to_string(),
            base: None,
            kind: TypeKind::List,
            members: Vec::new(),
            variants: Vec::new(),
            element: Some(element),
            boundary: false,
        })
    }

    pub fn descriptor(&self, handle: TypeHandle) -> &TypeDescriptor {
        &self.types[handle.0 as usize]
    }

    /// Mutable descriptor access for loaders that patch forward references
    /// after registering type shells. Invalidates the name index.
    pub(crate) fn descriptor_mut(&mut self, handle: TypeHandle) -> &mut TypeDescriptor {
        self.index_stale.set(true);
        &mut self.types[handle.0 as usize]
    }

    pub fn kind(&self, handle: TypeHandle) -> TypeKind {
        self.descriptor(handle).kind
    }

    pub fn name(&self, handle: TypeHandle) -> &str {
        &self.descriptor(handle).name
    }

    pub fn iter(&self) -> impl Iterator<Item = (TypeHandle, &TypeDescriptor)> {
        self.types.iter().enumerate().map(|(index, descriptor)| (TypeHandle(index as u32), descriptor))
    }

    pub fn is_module_opaque(&self, module: &str) -> bool {
        self.modules.iter().any(|m| m.name == module && m.opaque)
    }

    /// Drops the derived name index. Call after a module reload; the index
    /// is rebuilt on the next lookup rather than per call.
    pub fn invalidate(&self) {
        self.index_stale.set(true);
    }

    /// Exact lookup by fully-qualified name. Types owned by opaque modules
    /// are invisible here, matching the scan behavior.
    pub fn lookup(&self, qualified: &str) -> Option<TypeHandle> {
        self.ensure_index();
        self.by_name.borrow().get(qualified).copied()
    }

    fn ensure_index(&self) {
        if !self.index_stale.get() {
            return;
        }
        let mut index = HashMap::with_capacity(self.types.len());
        for (position, descriptor) in self.types.iter().enumerate() {
            if self.is_module_opaque(&descriptor.module) {
                continue;
            }
            index.entry(descriptor.name.clone()).or_insert(TypeHandle(position as u32));
        }
        *self.by_name.borrow_mut() = index;
        self.index_stale.set(false);
    }

    /// Whether a value of `candidate` can be stored in a slot declared as
    /// `target`. Follows base links; every type is assignable to itself.
    pub fn is_assignable(&self, target: TypeHandle, candidate: TypeHandle) -> bool {
        let mut current = Some(candidate);
        while let Some(handle) = current {
            if handle == target {
                return true;
            }
            current = self.descriptor(handle).base;
        }
        false
    }

    /// Types whose members participate in a snapshot of `ty`: the chain
    /// from the most-derived type up to (excluding) the first framework
    /// boundary type.
    pub fn serialization_chain(&self, ty: TypeHandle) -> SmallVec<[TypeHandle; 8]> {
        let mut chain = SmallVec::new();
        let mut current = Some(ty);
        while let Some(handle) = current {
            let descriptor = self.descriptor(handle);
            if descriptor.boundary {
                break;
            }
            chain.push(handle);
            current = descriptor.base;
        }
        chain
    }

    pub fn variant_name(&self, ty: TypeHandle, value: i32) -> Option<&str> {
        self.descriptor(ty).variants.iter().find(|(_, v)| *v == value).map(|(name, _)| name.as_str())
    }

    pub fn variant_value(&self, ty: TypeHandle, name: &str) -> Option<i32> {
        self.descriptor(ty)
            .variants
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
            .map(|(_, value)| *value)
    }

    /// Neutral initial value for a freshly created field of `ty`.
    pub fn default_value(&self, ty: TypeHandle) -> Value {
        match self.kind(ty) {
            TypeKind::Bool => Value::Bool(false),
            TypeKind::Int => Value::Int(0),
            TypeKind::Float => Value::Float(0.0),
            TypeKind::String => Value::String(String::new()),
            TypeKind::Vec2 => Value::Vec2(glam::Vec2::ZERO),
            TypeKind::Vec3 => Value::Vec3(glam::Vec3::ZERO),
            TypeKind::Vec4 => Value::Vec4(glam::Vec4::ZERO),
            TypeKind::Quat => Value::Quat(glam::Quat::IDENTITY),
            TypeKind::Color => Value::Color(crate::value::Color::WHITE),
            TypeKind::Rect => Value::Rect(crate::value::Rect::default()),
            TypeKind::Bounds => Value::Bounds(crate::value::Bounds::default()),
            TypeKind::Enum => {
                Value::Enum(self.descriptor(ty).variants.first().map(|(_, v)| *v).unwrap_or(0))
            }
            TypeKind::List => Value::List(Vec::new()),
            TypeKind::Struct => Value::Object(Box::new(ObjectInstance::with_defaults(ty, self))),
            TypeKind::Class => Value::Null,
        }
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn primitive(name: &str, kind: TypeKind) -> TypeDescriptor {
    TypeDescriptor {
        name: name.to_string(),
        module: FRAMEWORK_MODULE.to_string(),
        base: None,
        kind,
        members: Vec::new(),
        variants: Vec::new(),
        element: None,
        boundary: false,
    }
}

/// A live object: a concrete type plus its current field values. Instances
/// are owned by the host (scene graph or asset database); the engine only
/// reads and writes their fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectInstance {
    ty: TypeHandle,
    fields: HashMap<String, Value>,
}

impl ObjectInstance {
    pub fn new(ty: TypeHandle) -> Self {
        Self { ty, fields: HashMap::new() }
    }

    /// Instance with every declared member initialized to its neutral value.
    pub fn with_defaults(ty: TypeHandle, registry: &TypeRegistry) -> Self {
        let mut instance = Self::new(ty);
        for handle in registry.serialization_chain(ty) {
            for member in &registry.descriptor(handle).members {
                if member.flags.contains(FieldFlags::SYNTHESIZED) {
                    continue;
                }
                if !instance.fields.contains_key(&member.name) {
                    instance.fields.insert(member.name.clone(), registry.default_value(member.ty));
                }
            }
        }
        instance
    }

    pub fn ty(&self) -> TypeHandle {
        self.ty
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }
}
