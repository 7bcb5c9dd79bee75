use crate::reflect::ObjectInstance;
use glam::{Quat, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ephemeral identifier of a live scene object (node or attached component).
/// Valid only for the lifetime of the host session.
pub type InstanceId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color { r: 1.0, g: 1.0, b: 1.0, a: 1.0 };

    pub fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub center: Vec3,
    pub size: Vec3,
}

impl Bounds {
    pub fn new(center: Vec3, size: Vec3) -> Self {
        Self { center, size }
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self { center: Vec3::ZERO, size: Vec3::ONE }
    }
}

/// Live reference stored in an object field. References are symbolic ids,
/// never owning pointers, so cyclic graphs cost nothing to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectRef {
    Node(InstanceId),
    Component(InstanceId),
    Asset(Uuid),
    /// A component attached inside a persisted container asset, addressed
    /// by its position in the container's component list.
    AssetPart(Uuid, usize),
}

/// Runtime value of a single object field.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Quat(Quat),
    Color(Color),
    Rect(Rect),
    Bounds(Bounds),
    /// Numeric discriminant; the declared type's variant table supplies the
    /// symbolic name.
    Enum(i32),
    List(Vec<Value>),
    Ref(ObjectRef),
    /// Embedded plain struct value.
    Object(Box<ObjectInstance>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<Vec2> for Value {
    fn from(value: Vec2) -> Self {
        Value::Vec2(value)
    }
}

impl From<Vec3> for Value {
    fn from(value: Vec3) -> Self {
        Value::Vec3(value)
    }
}

impl From<Vec4> for Value {
    fn from(value: Vec4) -> Self {
        Value::Vec4(value)
    }
}

impl From<Quat> for Value {
    fn from(value: Quat) -> Self {
        Value::Quat(value)
    }
}

impl From<Color> for Value {
    fn from(value: Color) -> Self {
        Value::Color(value)
    }
}

impl From<ObjectRef> for Value {
    fn from(value: ObjectRef) -> Self {
        Value::Ref(value)
    }
}
